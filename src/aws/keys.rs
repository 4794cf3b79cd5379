// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: LGPL-3.0-or-later

use super::aws_lib::AwsLib;
use super::b64::compact_id;
use crate::common::{AwsSettings, Error, Service};

const S3_PROTOCOL: &str = "s3://";

/// Rendition of an ebook file.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Asset {
    /// Complete book.
    Full,
    /// Sample.
    Preview,
    /// Instructions.
    Manual,
}

impl Asset {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Preview => "preview",
            Self::Manual => "manual",
        }
    }
}

/// Which cover image.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Cover {
    /// Book cover, keyed by manifestation.
    Book,
    /// Social card, keyed by work.
    Social,
    /// Share card, keyed by manifestation.
    Share,
}

impl Cover {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Book => "cover",
            Self::Social => "social/cover",
            Self::Share => "share/cover",
        }
    }
}

/// Identifies stored content either by digests or by a literal key.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ContentKey {
    /// Sharded as `abcd/efgh/<rest of md5><last two of sha>`.
    Digest {
        /// Hex MD5.
        md5: String,
        /// Hex SHA.
        sha: String,
    },
    /// Used as is.
    Key(String),
}

/// Where a published file's rendition lives.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FileSetting {
    /// Setting revision, `0` if absent.
    pub revision: Option<u64>,
    /// Setting path; `e/…` and `t/…` live in the epub bucket.
    pub path: Option<String>,
}

/// An ebook file revision.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct EbookFile {
    /// Owning manifestation.
    pub manifestation_id: u64,
    /// File serial number.
    pub sn: u64,
    /// File version, if published.
    pub version: Option<u64>,
    /// Rendition setting, if published.
    pub setting: Option<FileSetting>,
}

impl EbookFile {
    /// The version and setting, if the file has both (a zero version counts as none).
    fn published(&self) -> Option<(u64, &FileSetting)> {
        let version = self.version.filter(|version| *version != 0)?;
        Some((version, self.setting.as_ref()?))
    }
}

/// A resource whose S3 URI `s3_key` builds.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum S3Location {
    /// `ebook/<sn % 1000>/<sn>`
    Manifestation {
        /// Manifestation serial number.
        sn: u64,
    },
    /// `ebook/<m % 1000>/<m>/<sn>[/<version>_<revision>]`, or the epub bucket for
    /// `e/` and `t/` paths. The version suffix needs both a version and a setting.
    Ebook(EbookFile),
    /// `ebook/<m % 1000>/<m>/<sn>/<version>_<revision>/<asset>`
    EbookAsset(Asset, EbookFile),
    /// `book/<mode>[/<id>]`, mode defaulting to `preview`.
    Book {
        /// Page mode.
        mode: Option<String>,
        /// Book id.
        id: Option<String>,
    },
    /// `<cover>/<first two>/<rest>` of an encoded id.
    Cover(Cover, String),
    /// `campaign/<name>[/<path>]` in the campaign bucket.
    Campaign {
        /// Campaign name.
        name: String,
        /// Path within the campaign.
        path: Option<String>,
    },
    /// `d/<content>` in this environment's document bucket.
    Document(Option<ContentKey>),
    /// `<prefix>/<content>` in the file bucket; prefix defaults to `f`.
    MediaFile(Option<char>, Option<ContentKey>),
    /// `<prefix>/<content>` in the feedback bucket; prefix defaults to `f`.
    Feedback(Option<char>, Option<ContentKey>),
    /// `l/abcd/efgh/<rest>.epub` in the epub bucket.
    Lcp {
        /// Content id.
        content_id: Option<String>,
    },
    /// `ebook`, or the epub bucket for `e/` and `t/` paths.
    EpubPrefix {
        /// Setting path.
        path: Option<String>,
    },
    /// `<prefix>/<user>/<reading>/<file>` in the file bucket; prefix defaults to `u`.
    UserReadingFile {
        /// Prefix, `u` if absent.
        prefix: Option<char>,
        /// Already encoded user id.
        encoded_user_id: String,
        /// Reading id, compactly encoded.
        reading_id: u64,
        /// File id, compactly encoded.
        file_id: u64,
    },
}

/// Inserts `/` after the 4th and 8th character, e.g. `abcd/efgh/ijkl`.
fn shard(id: &str) -> Option<String> {
    if id.len() < 8 || !id.is_ascii() {
        return None;
    }
    Some(format!("{}/{}/{}", &id[..4], &id[4..8], &id[8..]))
}

fn invalid(message: &str) -> Error {
    Error::Invalid(Service::S3, format!("s3_key: {message}"))
}

fn content_segment(content: &ContentKey) -> Result<String, Error> {
    match content {
        ContentKey::Digest { md5, sha } => {
            let tail = sha
                .len()
                .checked_sub(2)
                .and_then(|start| sha.get(start..))
                .ok_or_else(|| invalid("sha too short"))?;
            let sharded = shard(md5).ok_or_else(|| invalid("md5 too short"))?;
            Ok(format!("{sharded}{tail}"))
        }
        ContentKey::Key(key) => Ok(key.clone()),
    }
}

fn ebook_segments(segments: &mut Vec<String>, file: &EbookFile) -> Result<(), Error> {
    if file.manifestation_id == 0 || file.sn == 0 {
        return Err(invalid("no manifestation_id"));
    }
    segments.push((file.manifestation_id % 1000).to_string());
    segments.push(file.manifestation_id.to_string());
    segments.push(file.sn.to_string());
    Ok(())
}

fn version_segment(version: u64, setting: &FileSetting) -> String {
    format!("{version}_{}", setting.revision.unwrap_or(0))
}

fn is_epub_path(path: &str) -> bool {
    path.starts_with("e/") || path.starts_with("t/")
}

/// Builds the `s3://` URI of a resource. `use_cf` selects the CloudFront origin bucket.
pub fn s3_key(
    settings: &AwsSettings,
    location: &S3Location,
    use_cf: bool,
    trailing_slash: bool,
) -> Result<String, Error> {
    let bucket = if use_cf {
        &settings.cf_bucket
    } else {
        &settings.s3_bucket
    };
    let domain = &settings.domain;
    let epub_bucket = format!("{S3_PROTOCOL}epub.{domain}");
    let file_bucket = format!("{S3_PROTOCOL}file.{domain}");
    let mut segments = vec![format!("{S3_PROTOCOL}{bucket}"), "ebook".to_owned()];

    match location {
        S3Location::Manifestation { sn } => {
            if *sn == 0 {
                return Err(invalid("no manifestation_id"));
            }
            segments.push((sn % 1000).to_string());
            segments.push(sn.to_string());
        }
        S3Location::Ebook(file) => {
            ebook_segments(&mut segments, file)?;
            if let Some((version, setting)) = file.published() {
                match setting.path.as_deref().filter(|path| is_epub_path(path)) {
                    Some(path) => {
                        segments = vec![epub_bucket, path.trim_end_matches('/').to_owned()]
                    }
                    None => segments.push(version_segment(version, setting)),
                }
            }
        }
        S3Location::EbookAsset(asset, file) => {
            ebook_segments(&mut segments, file)?;
            let (version, setting) = file
                .published()
                .ok_or_else(|| invalid("file is incomplete"))?;
            segments.push(version_segment(version, setting));
            segments.push(asset.as_str().to_owned());
        }
        S3Location::Book { mode, id } => {
            segments[1] = "book".to_owned();
            segments.push(mode.clone().unwrap_or_else(|| "preview".to_owned()));
            segments.extend(id.clone());
        }
        S3Location::Cover(cover, encoded_id) => {
            if encoded_id.len() <= 2 || !encoded_id.is_ascii() {
                return Err(invalid("no proper id found"));
            }
            segments[1] = cover.as_str().to_owned();
            segments.push(format!("{}/{}", &encoded_id[..2], &encoded_id[2..]));
        }
        S3Location::Campaign { name, path } => {
            if name.is_empty() {
                return Err(invalid("no campaign name"));
            }
            segments = vec![
                format!("{S3_PROTOCOL}campaign.{domain}"),
                "campaign".to_owned(),
                name.clone(),
            ];
            segments.extend(path.clone());
        }
        S3Location::Document(content) => {
            segments = vec![
                format!("{S3_PROTOCOL}doc-{}.{domain}", settings.environment),
                "d".to_owned(),
            ];
            if let Some(content) = content {
                segments.push(content_segment(content)?);
            }
        }
        S3Location::MediaFile(prefix, content) | S3Location::Feedback(prefix, content) => {
            let host = if matches!(location, S3Location::MediaFile(..)) {
                file_bucket
            } else {
                format!("{S3_PROTOCOL}feedback.{domain}")
            };
            segments = vec![host, prefix.unwrap_or('f').to_string()];
            if let Some(content) = content {
                segments.push(content_segment(content)?);
            }
        }
        S3Location::Lcp { content_id } => {
            segments = vec![epub_bucket, "l".to_owned()];
            if let Some(content_id) = content_id.as_deref().filter(|id| !id.is_empty()) {
                let sharded = shard(content_id).ok_or_else(|| invalid("content id too short"))?;
                segments.push(format!("{sharded}.epub"));
            }
        }
        S3Location::EpubPrefix { path } => {
            if path.as_deref().map_or(false, is_epub_path) {
                segments = vec![epub_bucket];
            }
        }
        S3Location::UserReadingFile {
            prefix,
            encoded_user_id,
            reading_id,
            file_id,
        } => {
            segments = vec![
                file_bucket,
                prefix.unwrap_or('u').to_string(),
                encoded_user_id.clone(),
                compact_id(*reading_id),
                compact_id(*file_id),
            ];
        }
    }

    if trailing_slash {
        segments.push(String::new());
    }
    Ok(segments.join("/"))
}

impl AwsLib {
    /// Builds the `s3://` URI of a resource in this application's buckets.
    pub fn s3_key(
        &self,
        location: &S3Location,
        use_cf: bool,
        trailing_slash: bool,
    ) -> Result<String, Error> {
        s3_key(self.settings(), location, use_cf, trailing_slash)
    }
}
