// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: LGPL-3.0-or-later

use super::aws_lib::AwsLib;
use crate::common::{Error, Service};
use aws_sdk_sqs::operation::change_message_visibility_batch::ChangeMessageVisibilityBatchOutput;
use aws_sdk_sqs::operation::delete_message_batch::DeleteMessageBatchOutput;
use aws_sdk_sqs::operation::send_message_batch::SendMessageBatchOutput;
use aws_sdk_sqs::types::{
    ChangeMessageVisibilityBatchRequestEntry, DeleteMessageBatchRequestEntry, Message,
    MessageSystemAttributeName, QueueAttributeName, SendMessageBatchRequestEntry,
};
use std::collections::HashMap;

/// A convenient alias for SQS client so consuming code doesn't need to add it to `Cargo.toml`
pub type SqsClient = aws_sdk_sqs::Client;

/// Optional `ReceiveMessage` parameters.
#[derive(Clone, Debug, Default)]
pub struct ReceiveOptions {
    /// 1 to 10.
    pub max_number_of_messages: Option<i32>,
    /// Seconds received messages stay hidden.
    pub visibility_timeout: Option<i32>,
    /// Long polling, in seconds.
    pub wait_time_seconds: Option<i32>,
    /// System attributes to return with each message.
    pub attribute_names: Option<Vec<MessageSystemAttributeName>>,
}

/// Prefixes `name` with the environment, as every queue of this application is.
pub fn queue_name(environment: &str, name: &str) -> String {
    format!("{environment}_{name}")
}

impl AwsLib {
    async fn sqs(&self) -> SqsClient {
        self.client().await
    }

    fn queue_name(&self, name: &str) -> String {
        queue_name(&self.settings().environment, name)
    }

    /// Creates a queue, returning its URL.
    pub async fn create_queue(
        &self,
        name: &str,
        attributes: Option<HashMap<QueueAttributeName, String>>,
    ) -> Result<String, Error> {
        let output = self
            .sqs()
            .await
            .create_queue()
            .queue_name(self.queue_name(name))
            .set_attributes(attributes)
            .send()
            .await
            .map_err(|e| self.sdk_error(Service::Sqs, format!("create_queue({name})"), e))?;
        Ok(output.queue_url.unwrap_or_default())
    }

    /// Looks up the URL of a queue, optionally owned by another account.
    pub async fn get_queue_url(&self, name: &str, owner: Option<&str>) -> Result<String, Error> {
        let output = self
            .sqs()
            .await
            .get_queue_url()
            .queue_name(self.queue_name(name))
            .set_queue_owner_aws_account_id(owner.map(str::to_owned))
            .send()
            .await
            .map_err(|e| self.sdk_error(Service::Sqs, format!("get_queue_url({name})"), e))?;
        Ok(output.queue_url.unwrap_or_default())
    }

    /// Lists queue URLs of this environment, optionally under a name prefix.
    pub async fn list_queues(&self, prefix: Option<&str>) -> Result<Vec<String>, Error> {
        let environment = &self.settings().environment;
        let prefix = prefix.filter(|p| !p.is_empty()).map(|prefix| {
            if prefix.starts_with(environment.as_str()) {
                prefix.to_owned()
            } else {
                self.queue_name(prefix)
            }
        });
        let output = self
            .sqs()
            .await
            .list_queues()
            .set_queue_name_prefix(prefix)
            .send()
            .await
            .map_err(|e| self.sdk_error(Service::Sqs, "list_queues".to_owned(), e))?;
        Ok(output.queue_urls.unwrap_or_default())
    }

    /// Sends a message, returning its id once SQS confirms the body's MD5.
    pub async fn send_message(
        &self,
        queue_url: &str,
        body: &str,
        delay_seconds: Option<i32>,
    ) -> Result<String, Error> {
        let output = self
            .sqs()
            .await
            .send_message()
            .queue_url(queue_url)
            .message_body(body)
            .set_delay_seconds(delay_seconds)
            .send()
            .await
            .map_err(|e| self.sdk_error(Service::Sqs, format!("send_message({queue_url})"), e))?;
        let expected = format!("{:x}", md5::compute(body));
        if output.md5_of_message_body.as_deref() == Some(expected.as_str()) {
            Ok(output.message_id.unwrap_or_default())
        } else {
            Err(self.invalid(Service::Sqs, "MD5 of message not matched"))
        }
    }

    /// Sends up to 10 messages.
    pub async fn send_message_batch(
        &self,
        queue_url: &str,
        entries: Vec<SendMessageBatchRequestEntry>,
    ) -> Result<SendMessageBatchOutput, Error> {
        self.sqs()
            .await
            .send_message_batch()
            .queue_url(queue_url)
            .set_entries(Some(entries))
            .send()
            .await
            .map_err(|e| self.sdk_error(Service::Sqs, format!("send_message_batch({queue_url})"), e))
    }

    /// Receives messages; empty if none are available.
    pub async fn receive_message(
        &self,
        queue_url: &str,
        options: ReceiveOptions,
    ) -> Result<Vec<Message>, Error> {
        let output = self
            .sqs()
            .await
            .receive_message()
            .queue_url(queue_url)
            .set_max_number_of_messages(options.max_number_of_messages)
            .set_visibility_timeout(options.visibility_timeout)
            .set_wait_time_seconds(options.wait_time_seconds)
            .set_message_system_attribute_names(options.attribute_names)
            .send()
            .await
            .map_err(|e| self.sdk_error(Service::Sqs, format!("receive_message({queue_url})"), e))?;
        Ok(output.messages.unwrap_or_default())
    }

    /// Deletes a received message.
    pub async fn delete_message(&self, queue_url: &str, receipt_handle: &str) -> Result<(), Error> {
        self.sqs()
            .await
            .delete_message()
            .queue_url(queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| self.sdk_error(Service::Sqs, format!("delete_message({queue_url})"), e))?;
        Ok(())
    }

    /// Changes how long a received message stays hidden.
    pub async fn change_message_visibility(
        &self,
        queue_url: &str,
        receipt_handle: &str,
        visibility_timeout: i32,
    ) -> Result<(), Error> {
        self.sqs()
            .await
            .change_message_visibility()
            .queue_url(queue_url)
            .receipt_handle(receipt_handle)
            .visibility_timeout(visibility_timeout)
            .send()
            .await
            .map_err(|e| {
                self.sdk_error(
                    Service::Sqs,
                    format!("change_message_visibility({queue_url})"),
                    e,
                )
            })?;
        Ok(())
    }

    /// Changes the visibility of up to 10 messages.
    pub async fn change_message_visibility_batch(
        &self,
        queue_url: &str,
        entries: Vec<ChangeMessageVisibilityBatchRequestEntry>,
    ) -> Result<ChangeMessageVisibilityBatchOutput, Error> {
        self.sqs()
            .await
            .change_message_visibility_batch()
            .queue_url(queue_url)
            .set_entries(Some(entries))
            .send()
            .await
            .map_err(|e| {
                self.sdk_error(
                    Service::Sqs,
                    format!("change_message_visibility_batch({queue_url})"),
                    e,
                )
            })
    }

    /// Deletes up to 10 messages.
    pub async fn delete_message_batch(
        &self,
        queue_url: &str,
        entries: Vec<DeleteMessageBatchRequestEntry>,
    ) -> Result<DeleteMessageBatchOutput, Error> {
        self.sqs()
            .await
            .delete_message_batch()
            .queue_url(queue_url)
            .set_entries(Some(entries))
            .send()
            .await
            .map_err(|e| {
                self.sdk_error(Service::Sqs, format!("delete_message_batch({queue_url})"), e)
            })
    }
}
