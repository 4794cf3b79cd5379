// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: LGPL-3.0-or-later

use super::pool::{ClientPool, ServiceClient};
use super::retry::{is_credentials_failure, FibonacciBackoff};
use crate::common::{AwsLibConfig, AwsSettings, Error, Service};
use aws_config::SdkConfig;
use aws_smithy_runtime_api::client::result::SdkError;
use aws_smithy_types::error::display::DisplayErrorContext;
use aws_smithy_types::error::metadata::ProvideErrorMetadata;
use std::error::Error as StdError;
use std::fmt::Debug;
use std::future::Future;
use tracing::{debug, warn};

/// Façade over the AWS services used by the application.
///
/// Owns its configuration and a pool of service clients, each built on first use.
pub struct AwsLib {
    config: AwsLibConfig,
    settings: AwsSettings,
    debug: bool,
    clients: ClientPool,
}

impl AwsLib {
    /// Create a façade which loads the AWS SDK configuration on first use.
    pub fn new(config: AwsLibConfig) -> Result<Self, Error> {
        Self::with_pool(config, ClientPool::default())
    }

    /// Create a façade whose clients are built from `sdk_config`.
    pub fn with_sdk_config(config: AwsLibConfig, sdk_config: SdkConfig) -> Result<Self, Error> {
        Self::with_pool(config, ClientPool::with_sdk_config(sdk_config))
    }

    fn with_pool(config: AwsLibConfig, clients: ClientPool) -> Result<Self, Error> {
        let settings = config.aws_settings()?;
        let debug = config.debug();
        Ok(Self {
            config,
            settings,
            debug,
            clients,
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &AwsLibConfig {
        &self.config
    }

    /// Returns `true` if SDK error messages are surfaced.
    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Returns the `[aws]` settings.
    pub fn settings(&self) -> &AwsSettings {
        &self.settings
    }

    /// Returns the client pool.
    pub fn clients(&self) -> &ClientPool {
        &self.clients
    }

    /// Returns the client for `C`, building it on first use.
    pub async fn client<C: ServiceClient>(&self) -> C {
        self.clients.get::<C>(&self.config, &self.settings).await
    }

    /// Install a client, e.g. one with a custom endpoint or a stub.
    pub fn insert_client<C: ServiceClient>(&self, client: C) {
        self.clients.insert(client);
    }

    /// Map an SDK failure, surfacing its message only in debug mode.
    pub(crate) fn sdk_error<E, R>(&self, service: Service, call: String, err: SdkError<E, R>) -> Error
    where
        E: ProvideErrorMetadata + StdError + Send + Sync + 'static,
        R: Debug + Send + Sync + 'static,
    {
        let detail = err
            .message()
            .map(str::to_owned)
            .unwrap_or_else(|| DisplayErrorContext(&err).to_string());
        warn!("{service} {call} failed");
        if self.debug {
            debug!("{service} {call}: {detail}");
        }
        let message = self.debug.then_some(detail);
        if is_credentials_failure(&err) {
            Error::Credentials(service, call, message)
        } else {
            Error::Service(service, call, message)
        }
    }

    /// Reject arguments before calling AWS.
    pub(crate) fn invalid(&self, service: Service, message: impl Into<String>) -> Error {
        let message = message.into();
        warn!("{service}: {message}");
        Error::Invalid(service, message)
    }

    /// Run an SDK call, retrying credentials failures with Fibonacci backoff.
    pub(crate) async fn with_credentials_retry<T, E, R, F, Fut>(
        &self,
        service: Service,
        call: String,
        op: F,
    ) -> Result<T, Error>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SdkError<E, R>>>,
        E: ProvideErrorMetadata + StdError + Send + Sync + 'static,
        R: Debug + Send + Sync + 'static,
    {
        let backoff = FibonacciBackoff::new(self.settings.dynamodb_retries);
        let result = backoff
            .retry(&call, op, |e: &SdkError<E, R>| is_credentials_failure(e))
            .await;
        result.map_err(|e| self.sdk_error(service, call, e))
    }
}

/// Map a request or type builder failure.
pub(crate) fn build_error<E: StdError + Send + Sync + 'static>(call: String, e: E) -> Error {
    Error::Anyhow(e.into(), call)
}
