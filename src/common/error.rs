// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::fmt::{Display, Formatter};

#[cfg(feature = "aws")]
/// A convenient alias for Anyhow so consuming code doesn't need to add to `Cargo.toml`
pub type AnyhowError = anyhow::Error;

#[cfg(feature = "aws")]
/// A convenient alias for Serde Dynamo error so consuming code doesn't need to add to `Cargo.toml`
pub type SerdeError = serde_dynamo::Error;

/// The AWS service a call (and therefore a failure) belongs to.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Service {
    /// API Gateway management (websocket connections).
    ApiGateway,
    /// Amazon Athena.
    Athena,
    /// AWS Batch.
    Batch,
    /// Amazon CloudFront.
    CloudFront,
    /// Amazon Cognito identity pools.
    CognitoIdentity,
    /// Amazon Cognito user pools.
    CognitoIdentityProvider,
    /// Amazon DynamoDB.
    DynamoDb,
    /// Amazon S3.
    S3,
    /// Amazon SES.
    Ses,
    /// Amazon SNS.
    Sns,
    /// Amazon SQS.
    Sqs,
}

impl Display for Service {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::ApiGateway => "ApiGatewayManagementApi",
            Self::Athena => "Athena",
            Self::Batch => "Batch",
            Self::CloudFront => "CloudFront",
            Self::CognitoIdentity => "CognitoIdentity",
            Self::CognitoIdentityProvider => "CognitoIdentityProvider",
            Self::DynamoDb => "DynamoDb",
            Self::S3 => "S3",
            Self::Ses => "Ses",
            Self::Sns => "Sns",
            Self::Sqs => "Sqs",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
/// An enum that encapsulates a variety of error types.
///
/// Service failures carry the SDK's message only when debug is enabled, otherwise
/// callers see which service and call failed but not why.
///
/// # Example
///
/// Error::Invalid(Service::Sns, "PhoneNumber should use E.164 format".to_string())
pub enum Error {
    #[cfg(feature = "aws")]
    /// Anyhow error
    Anyhow(AnyhowError, String),
    /// Credentials could not be resolved, even after retrying.
    Credentials(Service, String, Option<String>),
    /// Arguments were rejected before any AWS call was made.
    Invalid(Service, String),
    #[cfg(feature = "aws")]
    /// Serde (serialization or deserialization) error
    Serde(SerdeError),
    /// An AWS call failed.
    Service(Service, String, Option<String>),
    /// String error.
    String(String),
}

impl Error {
    /// Returns the message surfaced by the failure, if any.
    pub fn message(&self) -> Option<&str> {
        match self {
            Error::Credentials(_, _, message) | Error::Service(_, _, message) => message.as_deref(),
            Error::Invalid(_, message) | Error::String(message) => Some(message),
            #[cfg(feature = "aws")]
            _ => None,
        }
    }

    /// Returns the AWS service the failure originated from, if any.
    pub fn service(&self) -> Option<Service> {
        match self {
            Error::Credentials(service, _, _)
            | Error::Invalid(service, _)
            | Error::Service(service, _, _) => Some(*service),
            _ => None,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            Error::Credentials(service, call, Some(message)) => {
                write!(f, "{service} {call}: credentials unavailable: {message}")
            }
            Error::Credentials(service, call, None) => {
                write!(f, "{service} {call}: credentials unavailable")
            }
            Error::Invalid(service, message) => write!(f, "{service}: {message}"),
            Error::Service(service, call, Some(message)) => {
                write!(f, "{service} {call} failed: {message}")
            }
            Error::Service(service, call, None) => write!(f, "{service} {call} failed"),
            Error::String(s) => Display::fmt(&s, f),
            #[cfg(feature = "aws")]
            Error::Anyhow(e, s) => write!(f, "{s}: {e}"),
            #[cfg(feature = "aws")]
            Error::Serde(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for Error {}
