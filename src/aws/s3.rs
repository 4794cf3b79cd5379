// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: LGPL-3.0-or-later

use super::aws_lib::{build_error, AwsLib};
use super::validate::is_bucket_dns_compatible;
use crate::common::{Error, Service};
use aws_sdk_s3::operation::head_bucket::HeadBucketOutput;
use aws_sdk_s3::operation::head_object::HeadObjectOutput;
use aws_sdk_s3::operation::list_objects_v2::ListObjectsV2Output;
use aws_sdk_s3::operation::put_object::PutObjectOutput;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::{ByteStream, DateTime};
use aws_sdk_s3::types::{
    BucketCannedAcl, BucketLocationConstraint, CreateBucketConfiguration, Delete, Object,
    ObjectIdentifier,
};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A convenient alias for S3 client so consuming code doesn't need to add it to `Cargo.toml`
pub type S3Client = aws_sdk_s3::Client;

/// The body of an object to upload.
#[derive(Debug)]
pub enum PutSource {
    /// In-memory contents.
    Bytes(Vec<u8>),
    /// A local file, streamed.
    File(PathBuf),
}

/// Object operations that can be pre-signed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PresignMethod {
    /// `DeleteObject`
    Delete,
    /// `GetObject`
    Get,
    /// `HeadObject`
    Head,
    /// `PutObject`
    Put,
}

/// Conditional request headers for `head_object`.
#[derive(Clone, Debug, Default)]
pub struct ObjectConditions {
    /// Succeed only if the ETag differs.
    pub if_none_match: Option<String>,
    /// Succeed only if modified after this time.
    pub if_modified_since: Option<DateTime>,
}

/// S3 refuses more keys than this in one `DeleteObjects`.
const DELETE_BATCH: usize = 1000;

/// Percent-encodes each `/`-separated segment of a copy source.
pub fn encode_copy_source(source: &str) -> String {
    source
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Guesses a content type from a file name extension.
pub fn guess_content_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .to_string()
}

/// Policy that lets a CloudFront origin access identity read every object of `bucket`.
pub(crate) fn bucket_policy(bucket: &str, cf_identity: &str) -> String {
    json!({
        "Version": "2008-10-17",
        "Id": "PolicyForCloudFrontPrivateContent",
        "Statement": [{
            "Sid": "1",
            "Effect": "Allow",
            "Principal": {
                "AWS": format!("arn:aws:iam::cloudfront:user/CloudFront Origin Access Identity {cf_identity}")
            },
            "Action": "s3:GetObject",
            "Resource": format!("arn:aws:s3:::{bucket}/*")
        }]
    })
    .to_string()
}

impl AwsLib {
    async fn s3(&self) -> S3Client {
        self.client().await
    }

    /// Returns `true` if `bucket` can be used in virtual-hosted style URLs.
    pub fn is_bucket_dns_compatible(&self, bucket: &str) -> bool {
        is_bucket_dns_compatible(bucket)
    }

    /// Returns `true` if the bucket exists, even if it belongs to someone else.
    pub async fn does_bucket_exist(&self, bucket: &str) -> Result<bool, Error> {
        match self.s3().await.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(e) => {
                let status = e.raw_response().map(|r| r.status().as_u16());
                if e.as_service_error().map_or(false, |e| e.is_not_found()) || status == Some(404)
                {
                    Ok(false)
                } else if status == Some(403) {
                    Ok(true)
                } else {
                    Err(self.sdk_error(Service::S3, format!("does_bucket_exist({bucket})"), e))
                }
            }
        }
    }

    /// Creates a publicly readable bucket. Returns `false` if it already exists.
    pub async fn create_bucket(&self, bucket: &str) -> Result<bool, Error> {
        if !is_bucket_dns_compatible(bucket) {
            return Err(self.invalid(
                Service::S3,
                format!("{bucket}: bucket name is not DNS compatible"),
            ));
        }
        if self.does_bucket_exist(bucket).await? {
            return Ok(false);
        }
        let mut request = self
            .s3()
            .await
            .create_bucket()
            .bucket(bucket)
            .acl(BucketCannedAcl::PublicRead);
        if let Some(region) = self
            .settings()
            .region
            .as_deref()
            .filter(|region| *region != "us-east-1")
        {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(region))
                    .build(),
            );
        }
        request
            .send()
            .await
            .map_err(|e| self.sdk_error(Service::S3, format!("create_bucket({bucket})"), e))?;
        Ok(true)
    }

    /// Retrieves bucket metadata.
    pub async fn head_bucket(&self, bucket: &str) -> Result<HeadBucketOutput, Error> {
        self.s3()
            .await
            .head_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| self.sdk_error(Service::S3, format!("head_bucket({bucket})"), e))
    }

    /// Retrieves object metadata.
    pub async fn head_object(
        &self,
        bucket: &str,
        key: &str,
        conditions: ObjectConditions,
    ) -> Result<HeadObjectOutput, Error> {
        self.s3()
            .await
            .head_object()
            .bucket(bucket)
            .key(key)
            .set_if_none_match(conditions.if_none_match)
            .set_if_modified_since(conditions.if_modified_since)
            .send()
            .await
            .map_err(|e| self.sdk_error(Service::S3, format!("head_object({bucket}, {key})"), e))
    }

    /// Grants the configured CloudFront identity read access. Returns `false` if the bucket
    /// does not exist.
    pub async fn put_bucket_policy(&self, bucket: &str) -> Result<bool, Error> {
        if !self.does_bucket_exist(bucket).await? {
            return Ok(false);
        }
        self.s3()
            .await
            .put_bucket_policy()
            .bucket(bucket)
            .policy(bucket_policy(bucket, &self.settings().cf_identity))
            .send()
            .await
            .map_err(|e| self.sdk_error(Service::S3, format!("put_bucket_policy({bucket})"), e))?;
        Ok(true)
    }

    /// Deletes an (empty) bucket.
    pub async fn delete_bucket(&self, bucket: &str) -> Result<(), Error> {
        self.s3()
            .await
            .delete_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| self.sdk_error(Service::S3, format!("delete_bucket({bucket})"), e))?;
        Ok(())
    }

    /// Returns `true` if the object exists.
    pub async fn does_object_exist(&self, bucket: &str, key: &str) -> Result<bool, Error> {
        match self.s3().await.head_object().bucket(bucket).key(key).send().await {
            Ok(_) => Ok(true),
            Err(e) => {
                let status = e.raw_response().map(|r| r.status().as_u16());
                if e.as_service_error().map_or(false, |e| e.is_not_found()) || status == Some(404)
                {
                    Ok(false)
                } else {
                    Err(self.sdk_error(
                        Service::S3,
                        format!("does_object_exist({bucket}, {key})"),
                        e,
                    ))
                }
            }
        }
    }

    /// Retrieves an object from S3.
    pub async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, Error> {
        let object = self
            .s3()
            .await
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| self.sdk_error(Service::S3, format!("get_object({bucket}, {key})"), e))?;
        let bytes = object
            .body
            .collect()
            .await
            .map_err(|e| build_error(format!("get_object_body({bucket}, {key})"), e))?;
        Ok(bytes.into_bytes().to_vec())
    }

    /// Put an object into the specified S3 bucket. Without a content type, one is guessed
    /// from the file name (or else the key).
    pub async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        source: PutSource,
        content_type: Option<&str>,
    ) -> Result<PutObjectOutput, Error> {
        let call = format!("put_object({bucket}, {key})");
        let (body, guessed) = match source {
            PutSource::Bytes(data) => (ByteStream::from(data), guess_content_type(Path::new(key))),
            PutSource::File(path) => {
                let guessed = guess_content_type(&path);
                let body = ByteStream::from_path(&path)
                    .await
                    .map_err(|e| build_error(call.clone(), e))?;
                (body, guessed)
            }
        };
        self.s3()
            .await
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type.map(str::to_owned).unwrap_or(guessed))
            .body(body)
            .send()
            .await
            .map_err(|e| self.sdk_error(Service::S3, call, e))
    }

    /// Copies `source` (`bucket/key`) to `bucket`/`key`.
    pub async fn copy_object(&self, bucket: &str, key: &str, source: &str) -> Result<(), Error> {
        self.s3()
            .await
            .copy_object()
            .bucket(bucket)
            .key(key)
            .copy_source(encode_copy_source(source))
            .send()
            .await
            .map_err(|e| {
                self.sdk_error(
                    Service::S3,
                    format!("copy_object({bucket}, {key}, {source})"),
                    e,
                )
            })?;
        Ok(())
    }

    /// Deletes an object.
    pub async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), Error> {
        self.s3()
            .await
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| self.sdk_error(Service::S3, format!("delete_object({bucket}, {key})"), e))?;
        Ok(())
    }

    /// Deletes up to 1000 objects in one request.
    pub async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<(), Error> {
        if keys.is_empty() {
            return Ok(());
        }
        let call = format!("delete_objects({bucket}, {} keys)", keys.len());
        let objects = keys
            .iter()
            .map(|key| ObjectIdentifier::builder().key(key).build())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| build_error(call.clone(), e))?;
        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(true)
            .build()
            .map_err(|e| build_error(call.clone(), e))?;
        self.s3()
            .await
            .delete_objects()
            .bucket(bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|e| self.sdk_error(Service::S3, call, e))?;
        Ok(())
    }

    /// Deletes every object under `prefix` whose key passes `filter`. Returns how many.
    pub async fn delete_matching_objects<F: Fn(&str) -> bool>(
        &self,
        bucket: &str,
        prefix: &str,
        filter: F,
    ) -> Result<usize, Error> {
        let keys = self
            .list_all_objects(bucket, prefix)
            .await?
            .into_iter()
            .filter_map(|object| object.key)
            .filter(|key| filter(key))
            .collect::<Vec<_>>();
        for chunk in keys.chunks(DELETE_BATCH) {
            self.delete_objects(bucket, chunk).await?;
        }
        Ok(keys.len())
    }

    /// Lists one page of objects under `prefix`.
    pub async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        max_keys: i32,
    ) -> Result<ListObjectsV2Output, Error> {
        self.s3()
            .await
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .max_keys(max_keys)
            .send()
            .await
            .map_err(|e| self.sdk_error(Service::S3, format!("list_objects({bucket}, {prefix})"), e))
    }

    /// Lists every object under `prefix`, following continuation tokens.
    pub async fn list_all_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<Object>, Error> {
        let mut pages = self
            .s3()
            .await
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .into_paginator()
            .send();
        let mut objects = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| {
                self.sdk_error(Service::S3, format!("list_all_objects({bucket}, {prefix})"), e)
            })?;
            objects.extend(page.contents.unwrap_or_default());
        }
        Ok(objects)
    }

    /// Creates a pre-signed URL for an object operation.
    pub async fn create_presigned_url(
        &self,
        method: PresignMethod,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, Error> {
        let call = format!("create_presigned_url({method:?}, {bucket}, {key})");
        let expiry =
            PresigningConfig::expires_in(expires_in).map_err(|e| build_error(call.clone(), e))?;
        let client = self.s3().await;
        let request = match method {
            PresignMethod::Delete => client
                .delete_object()
                .bucket(bucket)
                .key(key)
                .presigned(expiry)
                .await
                .map_err(|e| self.sdk_error(Service::S3, call, e))?,
            PresignMethod::Get => client
                .get_object()
                .bucket(bucket)
                .key(key)
                .presigned(expiry)
                .await
                .map_err(|e| self.sdk_error(Service::S3, call, e))?,
            PresignMethod::Head => client
                .head_object()
                .bucket(bucket)
                .key(key)
                .presigned(expiry)
                .await
                .map_err(|e| self.sdk_error(Service::S3, call, e))?,
            PresignMethod::Put => client
                .put_object()
                .bucket(bucket)
                .key(key)
                .presigned(expiry)
                .await
                .map_err(|e| self.sdk_error(Service::S3, call, e))?,
        };
        Ok(request.uri().to_string())
    }
}
