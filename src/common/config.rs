// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: LGPL-3.0-or-later

use super::Error;
use serde::de::DeserializeOwned;
use serde::Deserialize;
#[allow(deprecated)]
use std::env::home_dir;
use std::fs::read_to_string;

/// Configuration parameters for the AWS wrappers.
#[derive(Debug)]
pub struct AwsLibConfig {
    debug_enabled: bool,
    toml: String,
}

impl AwsLibConfig {
    /// Creates a configuration builder.
    pub fn builder() -> AwsLibConfigBuilder {
        AwsLibConfigBuilder {
            config: None,
            debug_enabled: false,
            error: None,
        }
    }

    /// Returns `true` if debug is enabled, either on the builder or as `[aws] debug`.
    pub fn debug(&self) -> bool {
        self.debug_enabled || self.aws_settings().map(|s| s.debug).unwrap_or(false)
    }

    /// Returns configuration parameters.
    pub fn get<T: DeserializeOwned>(&self) -> Result<T, Error> {
        toml::from_str(&self.toml).map_err(|e: toml::de::Error| Error::String(format!("toml: {e}")))
    }

    /// Returns the `[aws]` section, or defaults if it is absent.
    pub fn aws_settings(&self) -> Result<AwsSettings, Error> {
        #[derive(Deserialize)]
        struct ConfigToml {
            #[serde(default)]
            aws: AwsSettings,
        }
        self.get::<ConfigToml>().map(|c| c.aws)
    }

    /// Returns the `[cognito]` section.
    pub fn cognito_settings(&self) -> Result<CognitoSettings, Error> {
        #[derive(Deserialize)]
        struct ConfigToml {
            cognito: Option<CognitoSettings>,
        }
        self.get::<ConfigToml>()?
            .cognito
            .ok_or_else(|| Error::String("[cognito] not configured".to_string()))
    }
}

/// The `[aws]` configuration section.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct AwsSettings {
    /// Named profile in `~/.aws/config`; its region is used unless `region` is set.
    pub profile: Option<String>,
    /// Explicit region.
    pub region: Option<String>,
    /// Static access key (requires `secret_access_key`).
    pub access_key_id: Option<String>,
    /// Static secret key.
    pub secret_access_key: Option<String>,
    /// Endpoint override, e.g. a local emulator.
    pub endpoint_url: Option<String>,
    /// Surface SDK error messages.
    pub debug: bool,
    /// Deployment environment; prefixes queue names and selects key domains.
    pub environment: String,
    /// Site domain used by file buckets.
    pub domain: String,
    /// Default bucket for resource keys.
    pub s3_bucket: String,
    /// Bucket fronted by CloudFront for resource keys.
    pub cf_bucket: String,
    /// CloudFront origin access identity.
    pub cf_identity: String,
    /// Prepended to bare SNS topic names.
    pub sns_topic_prefix: String,
    /// API Gateway management endpoint for websocket connections.
    pub connection_endpoint: Option<String>,
    /// DynamoDB table mapping websocket connections to events.
    pub event_table: Option<String>,
    /// Credentials retries for DynamoDB item calls (at most 6).
    pub dynamodb_retries: usize,
    /// Region SES clients are built for, regardless of `region`.
    pub ses_region: String,
}

impl Default for AwsSettings {
    fn default() -> Self {
        Self {
            profile: None,
            region: None,
            access_key_id: None,
            secret_access_key: None,
            endpoint_url: None,
            debug: false,
            environment: "development".to_string(),
            domain: String::new(),
            s3_bucket: String::new(),
            cf_bucket: String::new(),
            cf_identity: String::new(),
            sns_topic_prefix: String::new(),
            connection_endpoint: None,
            event_table: None,
            dynamodb_retries: 6,
            ses_region: "us-west-2".to_string(),
        }
    }
}

impl AwsSettings {
    /// Returns `true` in the production environment.
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// The `[cognito]` configuration section.
#[derive(Clone, Debug, Deserialize)]
pub struct CognitoSettings {
    /// App client id.
    pub client_id: String,
    /// App client secret, if the client has one.
    pub client_secret: Option<String>,
    /// User pool id.
    pub user_pool_id: String,
    /// Identity pool id.
    pub identity_pool_id: Option<String>,
}

/// Builds an [`AwsLibConfig`] from TOML text or a file. Errors are deferred to `build`.
pub struct AwsLibConfigBuilder {
    config: Option<AwsLibConfig>,
    debug_enabled: bool,
    error: Option<Error>,
}

impl AwsLibConfigBuilder {
    /// Returns the configuration, or the first error met while building it.
    pub fn build(self) -> Result<AwsLibConfig, Error> {
        if let Some(error) = self.error {
            Err(error)
        } else if let Some(mut config) = self.config {
            config.debug_enabled = self.debug_enabled;
            Ok(config)
        } else {
            Err(Error::String("config not set".to_string()))
        }
    }

    /// Surface SDK error messages, whatever `[aws] debug` says.
    pub fn debug(self, debug_enabled: bool) -> Self {
        Self {
            debug_enabled,
            ..self
        }
    }

    /// Reads `file_name` from the home directory, falling back to the working directory.
    pub fn toml_file(self, file_name: &str) -> Self {
        let debug_enabled = self.debug_enabled;
        #[allow(deprecated)]
        let home_path = home_dir()
            .and_then(|pathbuf| pathbuf.to_str().map(|path| format!("{path}/{file_name}")));
        let local_path = format!("./{file_name}");
        let toml = home_path
            .and_then(|path| read_to_string(path).ok())
            .map(Ok)
            .unwrap_or_else(|| {
                read_to_string(&local_path)
                    .map_err(|_| Error::String(format!("{local_path}: cannot read")))
            });
        match toml {
            Ok(toml) => Self {
                config: Some(AwsLibConfig {
                    debug_enabled,
                    toml,
                }),
                debug_enabled,
                error: None,
            },
            Err(e) => Self {
                config: None,
                debug_enabled,
                error: Some(e),
            },
        }
    }

    /// Uses `toml` as the configuration text.
    pub fn toml_str(self, toml: &str) -> Self {
        self.toml_string(toml.to_string())
    }

    /// Like `toml_str`, without copying.
    pub fn toml_string(self, toml: String) -> Self {
        Self {
            config: Some(AwsLibConfig {
                debug_enabled: self.debug_enabled,
                toml,
            }),
            debug_enabled: self.debug_enabled,
            error: None,
        }
    }
}
