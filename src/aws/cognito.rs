// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: LGPL-3.0-or-later

use super::aws_lib::AwsLib;
use crate::common::{Error, Service};
use aws_sdk_cognitoidentityprovider::operation::admin_initiate_auth::AdminInitiateAuthOutput;
use aws_sdk_cognitoidentityprovider::operation::list_users::ListUsersOutput;
use aws_sdk_cognitoidentityprovider::types::{AttributeType, AuthFlowType};
use base64::prelude::{Engine, BASE64_STANDARD};
use hmac::{Hmac, Mac};
use sha2::Sha256;

/// A convenient alias for Cognito user pool client so consuming code doesn't need to add it to `Cargo.toml`
pub type CognitoIdpClient = aws_sdk_cognitoidentityprovider::Client;

/// A convenient alias for Cognito identity pool client so consuming code doesn't need to add it to `Cargo.toml`
pub type CognitoIdentityClient = aws_sdk_cognitoidentity::Client;

/// `SECRET_HASH` authentication parameter: base64 of HMAC-SHA256 over username followed
/// by client id, keyed with the client secret.
pub fn secret_hash(client_secret: &str, username: &str, client_id: &str) -> Result<String, Error> {
    let mut mac = Hmac::<Sha256>::new_from_slice(client_secret.as_bytes())
        .map_err(|e| Error::String(format!("secret_hash: {e}")))?;
    mac.update(username.as_bytes());
    mac.update(client_id.as_bytes());
    Ok(BASE64_STANDARD.encode(mac.finalize().into_bytes()))
}

impl AwsLib {
    /// Signs in with a username and password on behalf of the user.
    pub async fn admin_initiate_auth(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AdminInitiateAuthOutput, Error> {
        let cognito = self.config().cognito_settings()?;
        let mut request = self
            .client::<CognitoIdpClient>()
            .await
            .admin_initiate_auth()
            .auth_flow(AuthFlowType::AdminNoSrpAuth)
            .client_id(&cognito.client_id)
            .user_pool_id(&cognito.user_pool_id)
            .auth_parameters("USERNAME", username)
            .auth_parameters("PASSWORD", password);
        if let Some(client_secret) = &cognito.client_secret {
            request = request.auth_parameters(
                "SECRET_HASH",
                secret_hash(client_secret, username, &cognito.client_id)?,
            );
        }
        request.send().await.map_err(|e| {
            self.sdk_error(
                Service::CognitoIdentityProvider,
                format!("admin_initiate_auth({username})"),
                e,
            )
        })
    }

    /// Returns the attributes of the user the access token belongs to.
    pub async fn get_user(&self, access_token: &str) -> Result<Vec<AttributeType>, Error> {
        let output = self
            .client::<CognitoIdpClient>()
            .await
            .get_user()
            .access_token(access_token)
            .send()
            .await
            .map_err(|e| self.sdk_error(Service::CognitoIdentityProvider, "get_user".to_owned(), e))?;
        Ok(output.user_attributes().to_vec())
    }

    /// Lists users of the configured pool.
    pub async fn list_users(
        &self,
        attributes: Option<Vec<String>>,
        limit: Option<i32>,
    ) -> Result<ListUsersOutput, Error> {
        let cognito = self.config().cognito_settings()?;
        self.client::<CognitoIdpClient>()
            .await
            .list_users()
            .user_pool_id(&cognito.user_pool_id)
            .set_attributes_to_get(attributes)
            .set_limit(limit)
            .send()
            .await
            .map_err(|e| {
                self.sdk_error(Service::CognitoIdentityProvider, "list_users".to_owned(), e)
            })
    }

    /// Signs the user out of every device.
    pub async fn global_sign_out(&self, access_token: &str) -> Result<(), Error> {
        self.client::<CognitoIdpClient>()
            .await
            .global_sign_out()
            .access_token(access_token)
            .send()
            .await
            .map_err(|e| {
                self.sdk_error(
                    Service::CognitoIdentityProvider,
                    "global_sign_out".to_owned(),
                    e,
                )
            })?;
        Ok(())
    }

    /// Creates (or returns) an identity in the configured identity pool.
    pub async fn get_identity_id(&self) -> Result<String, Error> {
        let cognito = self.config().cognito_settings()?;
        let Some(identity_pool_id) = cognito.identity_pool_id else {
            return Err(self.invalid(Service::CognitoIdentity, "identity_pool_id not configured"));
        };
        let output = self
            .client::<CognitoIdentityClient>()
            .await
            .get_id()
            .identity_pool_id(&identity_pool_id)
            .send()
            .await
            .map_err(|e| {
                self.sdk_error(
                    Service::CognitoIdentity,
                    format!("get_identity_id({identity_pool_id})"),
                    e,
                )
            })?;
        Ok(output.identity_id.unwrap_or_default())
    }
}
