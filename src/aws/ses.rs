// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: LGPL-3.0-or-later

use super::aws_lib::{build_error, AwsLib};
use crate::common::{Error, Service};
use aws_sdk_ses::primitives::Blob;
use aws_sdk_ses::types::RawMessage;

/// A convenient alias for SES client so consuming code doesn't need to add it to `Cargo.toml`
pub type SesClient = aws_sdk_ses::Client;

/// Splits a comma separated address list, ignoring spaces.
pub fn parse_destinations(destinations: &str) -> Vec<String> {
    destinations
        .replace(' ', "")
        .split(',')
        .filter(|address| !address.is_empty())
        .map(str::to_owned)
        .collect()
}

impl AwsLib {
    /// Sends a MIME message as is, returning its message id. Without `destinations` the
    /// recipients are taken from the message headers.
    pub async fn send_raw_email(
        &self,
        raw_message: impl Into<Vec<u8>>,
        source: Option<&str>,
        destinations: &[String],
    ) -> Result<String, Error> {
        let call = || format!("send_raw_email(to={})", destinations.len());
        let raw_message = RawMessage::builder()
            .data(Blob::new(raw_message))
            .build()
            .map_err(|e| build_error(call(), e))?;
        let output = self
            .client::<SesClient>()
            .await
            .send_raw_email()
            .raw_message(raw_message)
            .set_source(source.filter(|s| !s.is_empty()).map(str::to_owned))
            .set_destinations((!destinations.is_empty()).then(|| destinations.to_vec()))
            .send()
            .await
            .map_err(|e| self.sdk_error(Service::Ses, call(), e))?;
        Ok(output.message_id)
    }
}
