// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: LGPL-3.0-or-later

use super::aws_lib::{build_error, AwsLib};
use crate::common::{Error, Service};
use aws_sdk_athena::types::{
    EncryptionConfiguration, EncryptionOption, QueryExecution, QueryExecutionContext,
    ResultConfiguration,
};

/// A convenient alias for Athena client so consuming code doesn't need to add it to `Cargo.toml`
pub type AthenaClient = aws_sdk_athena::Client;

/// Catalog queried when none is given.
pub const DEFAULT_CATALOG: &str = "AwsDataCatalog";

/// A query to start. Results are written to `output_location`, encrypted with SSE-S3.
#[derive(Clone, Debug, Default)]
pub struct QueryParams {
    /// SQL text.
    pub sql: String,
    /// Database the query runs in.
    pub database: String,
    /// Data catalog, [`DEFAULT_CATALOG`] if absent.
    pub catalog: Option<String>,
    /// `s3://` prefix for result files.
    pub output_location: String,
}

impl AwsLib {
    async fn athena(&self) -> AthenaClient {
        self.client().await
    }

    /// Starts a query, returning its execution id.
    pub async fn start_query_execution(&self, params: QueryParams) -> Result<String, Error> {
        if params.sql.is_empty() {
            return Err(self.invalid(Service::Athena, "QueryString is required"));
        }
        let call = || format!("start_query_execution(db={})", params.database);
        let context = QueryExecutionContext::builder()
            .catalog(params.catalog.as_deref().unwrap_or(DEFAULT_CATALOG))
            .database(&params.database)
            .build();
        let encryption = EncryptionConfiguration::builder()
            .encryption_option(EncryptionOption::SseS3)
            .build()
            .map_err(|e| build_error(call(), e))?;
        let results = ResultConfiguration::builder()
            .encryption_configuration(encryption)
            .output_location(&params.output_location)
            .build();
        let output = self
            .athena()
            .await
            .start_query_execution()
            .query_string(&params.sql)
            .query_execution_context(context)
            .result_configuration(results)
            .send()
            .await
            .map_err(|e| self.sdk_error(Service::Athena, call(), e))?;
        Ok(output.query_execution_id.unwrap_or_default())
    }

    /// Returns the state, statistics and result location of a query.
    pub async fn get_query_execution(
        &self,
        query_execution_id: &str,
    ) -> Result<Option<QueryExecution>, Error> {
        let output = self
            .athena()
            .await
            .get_query_execution()
            .query_execution_id(query_execution_id)
            .send()
            .await
            .map_err(|e| {
                self.sdk_error(
                    Service::Athena,
                    format!("get_query_execution({query_execution_id})"),
                    e,
                )
            })?;
        Ok(output.query_execution)
    }
}
