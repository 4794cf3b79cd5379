// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: LGPL-3.0-or-later

use super::aws_lib::AwsLib;
use crate::common::{Error, Service};
use serde::Deserialize;
use tracing::debug;

/// Published list of CloudFront edge addresses.
pub const CLOUDFRONT_IP_LIST_URL: &str =
    "https://d7uri8nf7uskq.cloudfront.net/tools/list-cloudfront-ips";

#[derive(Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct CloudFrontIpList {
    cloudfront_global_ip_list: Vec<String>,
    cloudfront_regional_edge_ip_list: Vec<String>,
}

/// Merges the global and regional edge CIDR blocks of a CloudFront IP list document.
pub fn parse_ip_ranges(body: &str) -> Result<Vec<String>, Error> {
    let list: CloudFrontIpList = serde_json::from_str(body)
        .map_err(|e| Error::String(format!("ip_ranges: invalid response: {e}")))?;
    let mut ranges = list.cloudfront_global_ip_list;
    ranges.extend(list.cloudfront_regional_edge_ip_list);
    Ok(ranges)
}

impl AwsLib {
    /// Fetches the CIDR blocks of an AWS service. Only `CLOUDFRONT` is supported.
    pub async fn ip_ranges(&self, service: &str) -> Result<Vec<String>, Error> {
        let url = match service {
            "CLOUDFRONT" => CLOUDFRONT_IP_LIST_URL,
            _ => {
                return Err(self.invalid(
                    Service::CloudFront,
                    format!("Unsupported AWS service: {service}"),
                ))
            }
        };
        let call = format!("ip_ranges({service})");
        let response = reqwest::get(url)
            .await
            .map_err(|e| Error::Anyhow(e.into(), call.clone()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::String(format!(
                "Failed to get ip ranges of AWS {service}: {status}"
            )));
        }
        let body = response
            .text()
            .await
            .map_err(|e| Error::Anyhow(e.into(), call))?;
        let ranges = parse_ip_ranges(&body)?;
        debug!("ip_ranges({service}): {} ranges", ranges.len());
        Ok(ranges)
    }
}
