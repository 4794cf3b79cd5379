// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: LGPL-3.0-or-later

use super::aws_lib::{build_error, AwsLib};
use crate::common::{Error, Service};
use aws_sdk_cloudfront::operation::create_distribution::CreateDistributionOutput;
use aws_sdk_cloudfront::operation::create_invalidation::CreateInvalidationOutput;
use aws_sdk_cloudfront::operation::get_distribution::GetDistributionOutput;
use aws_sdk_cloudfront::types::{
    Aliases, CacheBehaviors, CookiePreference, DefaultCacheBehavior, DistributionConfig,
    DistributionSummary, ForwardedValues, InvalidationBatch, ItemSelection, Origin, Origins,
    Paths, S3OriginConfig, TrustedSigners, ViewerProtocolPolicy,
};
use base64::prelude::{Engine, BASE64_STANDARD_NO_PAD};
use sha2::{Digest, Sha256};
use tracing::debug;

/// A convenient alias for CloudFront client so consuming code doesn't need to add it to `Cargo.toml`
pub type CloudFrontClient = aws_sdk_cloudfront::Client;

/// Derives an invalidation caller reference from the paths and a timestamp.
pub fn invalidation_reference(paths: &[String], timestamp: &str) -> String {
    let digest = Sha256::digest(format!("{}{timestamp}", paths.join("\x01")));
    BASE64_STANDARD_NO_PAD.encode(format!("{digest:x}"))
}

/// Returns `true` if any alias of the distribution ends with `cname`.
pub fn has_alias_ending_with(summary: &DistributionSummary, cname: &str) -> bool {
    summary
        .aliases()
        .map_or(false, |aliases| aliases.items().iter().any(|alias| alias.ends_with(cname)))
}

impl AwsLib {
    async fn cloudfront(&self) -> CloudFrontClient {
        self.client().await
    }

    fn distribution_config(&self, bucket: &str, domain: &str) -> Result<DistributionConfig, Error> {
        let call = || format!("create_distribution({bucket}, {domain})");
        let origin_id = format!("S3-{bucket}");
        let identity = format!(
            "origin-access-identity/cloudfront/{}",
            self.settings().cf_identity
        );
        let origin = Origin::builder()
            .id(&origin_id)
            .domain_name(format!("{bucket}.s3.amazonaws.com").to_lowercase())
            .s3_origin_config(
                S3OriginConfig::builder()
                    .origin_access_identity(identity)
                    .build(),
            )
            .build()
            .map_err(|e| build_error(call(), e))?;
        let forwarded_values = ForwardedValues::builder()
            .query_string(false)
            .cookies(
                CookiePreference::builder()
                    .forward(ItemSelection::None)
                    .build()
                    .map_err(|e| build_error(call(), e))?,
            )
            .build()
            .map_err(|e| build_error(call(), e))?;
        let cache_behavior = DefaultCacheBehavior::builder()
            .target_origin_id(&origin_id)
            .forwarded_values(forwarded_values)
            .trusted_signers(
                TrustedSigners::builder()
                    .enabled(false)
                    .quantity(0)
                    .build()
                    .map_err(|e| build_error(call(), e))?,
            )
            .viewer_protocol_policy(ViewerProtocolPolicy::AllowAll)
            .min_ttl(0)
            .build()
            .map_err(|e| build_error(call(), e))?;
        let caller_reference = format!(
            "{:x}",
            md5::compute(chrono::Utc::now().timestamp().to_string())
        );
        DistributionConfig::builder()
            .caller_reference(caller_reference)
            .aliases(
                Aliases::builder()
                    .quantity(1)
                    .items(domain)
                    .build()
                    .map_err(|e| build_error(call(), e))?,
            )
            .default_root_object("index.html")
            .origins(
                Origins::builder()
                    .quantity(1)
                    .items(origin)
                    .build()
                    .map_err(|e| build_error(call(), e))?,
            )
            .default_cache_behavior(cache_behavior)
            .cache_behaviors(
                CacheBehaviors::builder()
                    .quantity(0)
                    .build()
                    .map_err(|e| build_error(call(), e))?,
            )
            .comment(format!("Distribution for {bucket}"))
            .enabled(true)
            .build()
            .map_err(|e| build_error(call(), e))
    }

    /// Creates an enabled distribution serving `bucket` under the alias `domain`.
    pub async fn create_distribution(
        &self,
        bucket: &str,
        domain: &str,
    ) -> Result<CreateDistributionOutput, Error> {
        let config = self.distribution_config(bucket, domain)?;
        self.cloudfront()
            .await
            .create_distribution()
            .distribution_config(config)
            .send()
            .await
            .map_err(|e| {
                self.sdk_error(
                    Service::CloudFront,
                    format!("create_distribution({bucket}, {domain})"),
                    e,
                )
            })
    }

    /// Disables a distribution, which must happen before it can be deleted.
    pub async fn disable_distribution(&self, id: &str) -> Result<(), Error> {
        let call = format!("disable_distribution({id})");
        let client = self.cloudfront().await;
        let current = client
            .get_distribution_config()
            .id(id)
            .send()
            .await
            .map_err(|e| self.sdk_error(Service::CloudFront, call.clone(), e))?;
        let Some(mut config) = current.distribution_config else {
            return Err(self.invalid(Service::CloudFront, format!("{id}: no distribution config")));
        };
        config.enabled = false;
        client
            .update_distribution()
            .id(id)
            .set_if_match(current.e_tag)
            .distribution_config(config)
            .send()
            .await
            .map_err(|e| self.sdk_error(Service::CloudFront, call, e))?;
        Ok(())
    }

    /// Deletes a distribution if it is disabled and deployed. Returns `false` otherwise.
    pub async fn delete_distribution(&self, id: &str) -> Result<bool, Error> {
        let call = format!("delete_distribution({id})");
        let output = self.get_distribution(id).await?;
        let deletable = output.distribution().map_or(false, |distribution| {
            distribution.status() == "Deployed"
                && distribution
                    .distribution_config()
                    .map_or(false, |config| !config.enabled())
        });
        if !deletable {
            debug!("{call}: not disabled and deployed");
            return Ok(false);
        }
        self.cloudfront()
            .await
            .delete_distribution()
            .id(id)
            .set_if_match(output.e_tag)
            .send()
            .await
            .map_err(|e| self.sdk_error(Service::CloudFront, call, e))?;
        Ok(true)
    }

    /// Gets a distribution and its ETag.
    pub async fn get_distribution(&self, id: &str) -> Result<GetDistributionOutput, Error> {
        self.cloudfront()
            .await
            .get_distribution()
            .id(id)
            .send()
            .await
            .map_err(|e| self.sdk_error(Service::CloudFront, format!("get_distribution({id})"), e))
    }

    /// Lists every distribution, or only those with an alias ending in `cname`.
    pub async fn list_distributions(
        &self,
        cname: Option<&str>,
    ) -> Result<Vec<DistributionSummary>, Error> {
        let client = self.cloudfront().await;
        let mut distributions = Vec::new();
        let mut marker = None;
        loop {
            let output = client
                .list_distributions()
                .set_marker(marker)
                .send()
                .await
                .map_err(|e| {
                    self.sdk_error(Service::CloudFront, "list_distributions".to_owned(), e)
                })?;
            let Some(list) = output.distribution_list else {
                break;
            };
            distributions.extend(
                list.items
                    .unwrap_or_default()
                    .into_iter()
                    .filter(|summary| cname.map_or(true, |cname| has_alias_ending_with(summary, cname))),
            );
            marker = list.next_marker.filter(|_| list.is_truncated);
            if marker.is_none() {
                break;
            }
        }
        Ok(distributions)
    }

    /// Invalidates cached `paths`. Without a caller reference, one is derived from the paths
    /// and the current time.
    pub async fn create_invalidation(
        &self,
        id: &str,
        paths: Vec<String>,
        caller_reference: Option<String>,
    ) -> Result<CreateInvalidationOutput, Error> {
        if paths.is_empty() {
            return Err(self.invalid(Service::CloudFront, format!("{id}: no paths to invalidate")));
        }
        let call = format!("create_invalidation({id}, {} paths)", paths.len());
        let caller_reference = caller_reference.unwrap_or_else(|| {
            let now = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
            invalidation_reference(&paths, &now)
        });
        let quantity = i32::try_from(paths.len()).unwrap_or(i32::MAX);
        let paths = Paths::builder()
            .quantity(quantity)
            .set_items(Some(paths))
            .build()
            .map_err(|e| build_error(call.clone(), e))?;
        let batch = InvalidationBatch::builder()
            .paths(paths)
            .caller_reference(caller_reference)
            .build()
            .map_err(|e| build_error(call.clone(), e))?;
        self.cloudfront()
            .await
            .create_invalidation()
            .distribution_id(id)
            .invalidation_batch(batch)
            .send()
            .await
            .map_err(|e| self.sdk_error(Service::CloudFront, call, e))
    }
}
