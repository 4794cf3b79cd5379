// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later

use crate::common::{AwsLibConfig, AwsSettings, Service};
use aws_config::profile::ProfileFileRegionProvider;
use aws_config::{BehaviorVersion, ConfigLoader, Region, SdkConfig};
use aws_credential_types::Credentials;
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use tracing::debug;

/// Create an AWS config loader with profile, region, static keys and endpoint.
pub fn create_aws_config_loader(settings: &AwsSettings) -> ConfigLoader {
    let mut config_loader = aws_config::defaults(BehaviorVersion::v2023_11_09());
    if let Some(profile_name) = &settings.profile {
        debug!("AWS using profile name {profile_name}");
        let region = ProfileFileRegionProvider::builder()
            .profile_name(profile_name)
            .build();
        config_loader = config_loader.profile_name(profile_name).region(region);
    }
    if let Some(region) = &settings.region {
        config_loader = config_loader.region(Region::new(region.clone()));
    }
    if let (Some(key), Some(secret)) = (&settings.access_key_id, &settings.secret_access_key) {
        config_loader = config_loader.credentials_provider(Credentials::new(
            key.clone(),
            secret.clone(),
            None,
            None,
            "AwsLibConfig",
        ));
    }
    if let Some(endpoint_url) = &settings.endpoint_url {
        config_loader = config_loader.endpoint_url(endpoint_url);
    }
    config_loader
}

/// Load AWS configuration from the `[aws]` section.
pub async fn load_aws_config(config: &AwsLibConfig) -> SdkConfig {
    let settings = config.aws_settings().unwrap_or_default();
    create_aws_config_loader(&settings).load().await
}

/// An AWS service client that the pool knows how to construct.
pub trait ServiceClient: Clone + Send + Sync + 'static {
    /// The pool key of this client.
    const SERVICE: Service;

    /// Build a client from the shared SDK configuration.
    fn from_sdk_config(sdk_config: &SdkConfig, settings: &AwsSettings) -> Self;
}

macro_rules! impl_service_client {
    ($client:ty, $service:expr) => {
        impl ServiceClient for $client {
            const SERVICE: Service = $service;

            fn from_sdk_config(sdk_config: &SdkConfig, _settings: &AwsSettings) -> Self {
                <$client>::new(sdk_config)
            }
        }
    };
}

impl_service_client!(aws_sdk_athena::Client, Service::Athena);
impl_service_client!(aws_sdk_batch::Client, Service::Batch);
impl_service_client!(aws_sdk_cloudfront::Client, Service::CloudFront);
impl_service_client!(aws_sdk_dynamodb::Client, Service::DynamoDb);
impl_service_client!(aws_sdk_sns::Client, Service::Sns);
impl_service_client!(aws_sdk_sqs::Client, Service::Sqs);
#[cfg(feature = "cognito")]
impl_service_client!(aws_sdk_cognitoidentity::Client, Service::CognitoIdentity);
#[cfg(feature = "cognito")]
impl_service_client!(
    aws_sdk_cognitoidentityprovider::Client,
    Service::CognitoIdentityProvider
);

impl ServiceClient for aws_sdk_s3::Client {
    const SERVICE: Service = Service::S3;

    fn from_sdk_config(sdk_config: &SdkConfig, settings: &AwsSettings) -> Self {
        // Emulators rarely resolve virtual-hosted bucket names.
        let s3_config = aws_sdk_s3::config::Builder::from(sdk_config)
            .force_path_style(settings.endpoint_url.is_some())
            .build();
        aws_sdk_s3::Client::from_conf(s3_config)
    }
}

impl ServiceClient for aws_sdk_apigatewaymanagement::Client {
    const SERVICE: Service = Service::ApiGateway;

    fn from_sdk_config(sdk_config: &SdkConfig, settings: &AwsSettings) -> Self {
        let mut builder = aws_sdk_apigatewaymanagement::config::Builder::from(sdk_config);
        if let Some(endpoint) = &settings.connection_endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        aws_sdk_apigatewaymanagement::Client::from_conf(builder.build())
    }
}

impl ServiceClient for aws_sdk_ses::Client {
    const SERVICE: Service = Service::Ses;

    fn from_sdk_config(sdk_config: &SdkConfig, settings: &AwsSettings) -> Self {
        let ses_config = aws_sdk_ses::config::Builder::from(sdk_config)
            .region(Region::new(settings.ses_region.clone()))
            .build();
        aws_sdk_ses::Client::from_conf(ses_config)
    }
}

/// Lazily constructed service clients, at most one per `Service`.
#[derive(Default)]
pub struct ClientPool {
    clients: Mutex<HashMap<Service, Arc<dyn Any + Send + Sync>>>,
    sdk_config: OnceCell<SdkConfig>,
}

impl ClientPool {
    /// Create a pool whose clients are built from the given SDK configuration.
    pub fn with_sdk_config(sdk_config: SdkConfig) -> Self {
        Self {
            clients: Default::default(),
            sdk_config: OnceCell::new_with(Some(sdk_config)),
        }
    }

    /// Returns the cached client, if one has been built or inserted.
    pub fn cached<C: ServiceClient>(&self) -> Option<C> {
        self.clients
            .lock()
            .ok()
            .and_then(|clients| clients.get(&C::SERVICE).cloned())
            .and_then(|client| client.downcast_ref::<C>().cloned())
    }

    /// Returns the client for `C`, building it on first use.
    pub async fn get<C: ServiceClient>(&self, config: &AwsLibConfig, settings: &AwsSettings) -> C {
        if let Some(client) = self.cached::<C>() {
            return client;
        }
        let sdk_config = self
            .sdk_config
            .get_or_init(|| load_aws_config(config))
            .await;
        debug!("creating {} client", C::SERVICE);
        let client = C::from_sdk_config(sdk_config, settings);
        self.insert(client.clone());
        client
    }

    /// Install a client, replacing any cached one for the same service.
    pub fn insert<C: ServiceClient>(&self, client: C) {
        if let Ok(mut clients) = self.clients.lock() {
            clients.insert(C::SERVICE, Arc::new(client));
        }
    }

    /// Returns the number of cached clients.
    pub fn len(&self) -> usize {
        self.clients.lock().map(|clients| clients.len()).unwrap_or(0)
    }

    /// Returns `true` if no client has been built or inserted.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
