// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: LGPL-3.0-or-later

#[cfg(feature = "toml")]
mod config;
/// An enum that encapsulates a variety of error types.
mod error;

#[cfg(feature = "toml")]
pub use self::config::{AwsLibConfig, AwsLibConfigBuilder, AwsSettings, CognitoSettings};
pub use self::error::{Error, Service};
#[cfg(feature = "aws")]
pub use self::error::{AnyhowError, SerdeError};
