// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: LGPL-3.0-or-later

#![warn(missing_docs)]
//! This crate wraps the AWS services an application uses (S3, CloudFront, SQS, Dynamo DB,
//! SNS, Batch, Cognito, Athena, SES and API Gateway websockets) behind one configured
//! façade that returns typed errors.

#[cfg(feature = "aws")]
/// A façade which provides access to AWS services.
pub mod aws;
#[cfg(feature = "aws")]
pub use aws::*;

/// Types common to multiple wrappers.
pub mod common;
pub use common::*;
