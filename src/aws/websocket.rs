// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: LGPL-3.0-or-later

use super::aws_lib::AwsLib;
use super::dynamo::{to_dynamo_av, Scan};
use crate::common::{Error, Service};
use aws_sdk_apigatewaymanagement::primitives::Blob;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

/// A convenient alias for websocket client so consuming code doesn't need to add it to `Cargo.toml`
pub type WebsocketClient = aws_sdk_apigatewaymanagement::Client;

/// A row of the event table: a websocket connection and the events it listens to.
#[derive(Debug, Deserialize)]
pub struct EventConnection {
    /// API Gateway connection id.
    #[serde(rename = "connectionId")]
    pub connection_id: String,
}

impl AwsLib {
    /// Send a message to the specified websocket.
    pub async fn post_to_connection(&self, connection_id: &str, data: &[u8]) -> Result<(), Error> {
        self.client::<WebsocketClient>()
            .await
            .post_to_connection()
            .connection_id(connection_id)
            .data(Blob::new(data))
            .send()
            .await
            .map_err(|e| {
                self.sdk_error(
                    Service::ApiGateway,
                    format!("post_to_connection({connection_id})"),
                    e,
                )
            })?;
        Ok(())
    }

    /// Post `data` to every connection listening to `event_id`. Returns one result per
    /// connection.
    pub async fn notify_event(
        &self,
        event_id: &str,
        data: &[u8],
    ) -> Result<Vec<Result<(), Error>>, Error> {
        let Some(table) = self.settings().event_table.clone() else {
            return Err(self.invalid(Service::DynamoDb, "event_table not configured"));
        };
        let scan = Scan {
            filter_expression: Some("contains(events, :eventId)".to_owned()),
            expression_attribute_values: Some(HashMap::from([(
                ":eventId".to_owned(),
                to_dynamo_av(event_id)?,
            )])),
            projection_expression: Some("connectionId, eventId".to_owned()),
            ..Default::default()
        };
        let connections = self.scan_items::<EventConnection>(&table, scan).await?;
        debug!("notify_event({event_id}): {} connections", connections.count);
        let mut results = Vec::with_capacity(connections.count);
        for connection in connections.items {
            results.push(self.post_to_connection(&connection.connection_id, data).await);
        }
        Ok(results)
    }
}
