// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: LGPL-3.0-or-later

use regex::Regex;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use std::sync::LazyLock;

static E164_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[1-9]\d{1,14}$").expect("static regex compile"));

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s.]+(\.[^@\s.]+)+$").expect("static regex compile")
});

// Lower case letters, digits, dots and dashes; letter or digit at both ends.
static BUCKET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9][a-z0-9.-]{1,61}[a-z0-9]$").expect("static regex compile")
});

static IPV4_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\d+\.\d+\.\d+$").expect("static regex compile"));

/// Returns `true` if `phone` is an E.164 number.
pub fn is_e164(phone: &str) -> bool {
    E164_RE.is_match(phone)
}

/// Returns `true` if `bucket` can be addressed as a DNS label: 3 to 63 lower case letters,
/// digits, dots and dashes, starting and ending with a letter or digit, and not an IP address.
pub fn is_bucket_dns_compatible(bucket: &str) -> bool {
    BUCKET_RE.is_match(bucket) && !IPV4_RE.is_match(bucket)
}

/// Returns `true` if `email` looks like `local@domain.tld`.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Returns `true` if `message` should be published with `MessageStructure=json`, that is,
/// it is a JSON object with a `default` member.
pub fn is_sns_json_message(message: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(message)
        .ok()
        .and_then(|json| json.get("default").map(|value| !value.is_null()))
        .unwrap_or(false)
}

/// SNS subscription protocols.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SubscriptionProtocol {
    /// Mobile push via an application endpoint ARN.
    Application,
    /// Email with a plain text body.
    Email,
    /// Email with a JSON body.
    EmailJson,
    /// HTTP POST.
    Http,
    /// HTTPS POST.
    Https,
    /// AWS Lambda function ARN.
    Lambda,
    /// Text message to an E.164 number.
    Sms,
    /// SQS queue ARN.
    Sqs,
}

impl SubscriptionProtocol {
    /// The protocol name used by SNS.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Application => "application",
            Self::Email => "email",
            Self::EmailJson => "email-json",
            Self::Http => "http",
            Self::Https => "https",
            Self::Lambda => "lambda",
            Self::Sms => "sms",
            Self::Sqs => "sqs",
        }
    }

    /// Check that `endpoint` has the shape this protocol requires. On failure returns the
    /// name of the expected format.
    pub fn validate_endpoint(&self, endpoint: &str) -> Result<(), &'static str> {
        let valid = match self {
            Self::Http | Self::Https => endpoint.starts_with(&format!("{}://", self.as_str())),
            Self::Email | Self::EmailJson => is_valid_email(endpoint),
            Self::Sms => is_e164(endpoint),
            Self::Sqs | Self::Lambda => endpoint.starts_with(&format!("arn:aws:{}", self.as_str())),
            Self::Application => endpoint.starts_with("arn:aws:sns"),
        };
        if valid {
            Ok(())
        } else {
            Err(match self {
                Self::Http | Self::Https => self.as_str(),
                Self::Email | Self::EmailJson => "email",
                Self::Sms => "E.164",
                Self::Sqs | Self::Lambda | Self::Application => "ARN",
            })
        }
    }
}

impl Display for SubscriptionProtocol {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionProtocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "application" => Self::Application,
            "email" => Self::Email,
            "email-json" => Self::EmailJson,
            "http" => Self::Http,
            "https" => Self::Https,
            "lambda" => Self::Lambda,
            "sms" => Self::Sms,
            "sqs" => Self::Sqs,
            _ => return Err(format!("unsupported protocol: {s}")),
        })
    }
}
