// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: LGPL-3.0-or-later

use super::aws_lib::AwsLib;
use super::validate::{is_e164, is_sns_json_message, SubscriptionProtocol};
use crate::common::{Error, Service};
use aws_sdk_sns::operation::list_subscriptions_by_topic::ListSubscriptionsByTopicOutput;
use aws_sdk_sns::operation::list_topics::ListTopicsOutput;
use aws_sdk_sns::types::Subscription;

/// A convenient alias for SNS client so consuming code doesn't need to add it to `Cargo.toml`
pub type SnsClient = aws_sdk_sns::Client;

/// Parameters of `publish`. Exactly one target must be set.
#[derive(Clone, Debug, Default)]
pub struct PublishParams {
    /// The message, or a JSON object with a `default` member and per-protocol overrides.
    pub message: String,
    /// Email subject.
    pub subject: Option<String>,
    /// E.164 phone number for a text message.
    pub phone_number: Option<String>,
    /// Platform endpoint ARN.
    pub target_arn: Option<String>,
    /// Topic ARN.
    pub topic_arn: Option<String>,
}

impl PublishParams {
    /// Validates the message and target, returning the `MessageStructure` to use.
    pub fn validate(&self) -> Result<Option<&'static str>, String> {
        if self.message.is_empty() {
            return Err(r#"Missing parameter, "Message" is required."#.to_owned());
        }
        let targets = [&self.phone_number, &self.target_arn, &self.topic_arn]
            .iter()
            .filter(|target| target.is_some())
            .count();
        if targets != 1 {
            return Err(
                r#"Invalid parameter, only one of "PhoneNumber", "TargetArn", "TopicArn" should exist"#
                    .to_owned(),
            );
        }
        if self.phone_number.as_deref().map_or(false, |phone| !is_e164(phone)) {
            return Err("PhoneNumber should use E.164 format.".to_owned());
        }
        Ok(is_sns_json_message(&self.message).then_some("json"))
    }
}

/// Prepends `prefix` unless `topic` already starts with it.
pub fn prefixed_topic(prefix: &str, topic: &str) -> String {
    if topic.starts_with(prefix) {
        topic.to_owned()
    } else {
        format!("{prefix}{topic}")
    }
}

impl AwsLib {
    async fn sns(&self) -> SnsClient {
        self.client().await
    }

    fn topic_arn(&self, topic: &str) -> String {
        prefixed_topic(&self.settings().sns_topic_prefix, topic)
    }

    /// Publishes a message to a phone number, endpoint or topic. Returns the message id.
    pub async fn publish(&self, params: PublishParams) -> Result<String, Error> {
        let structure = params
            .validate()
            .map_err(|message| self.invalid(Service::Sns, message))?;
        let output = self
            .sns()
            .await
            .publish()
            .message(params.message)
            .set_message_structure(structure.map(str::to_owned))
            .set_subject(params.subject)
            .set_phone_number(params.phone_number)
            .set_target_arn(params.target_arn)
            .set_topic_arn(params.topic_arn)
            .send()
            .await
            .map_err(|e| self.sdk_error(Service::Sns, "publish".to_owned(), e))?;
        Ok(output.message_id.unwrap_or_default())
    }

    /// Subscribes `endpoint` to a topic. Returns the subscription ARN (or "pending
    /// confirmation").
    pub async fn subscribe(
        &self,
        endpoint: &str,
        protocol: &str,
        topic_arn: &str,
    ) -> Result<String, Error> {
        let protocol: SubscriptionProtocol = protocol
            .parse()
            .map_err(|message: String| self.invalid(Service::Sns, message))?;
        protocol.validate_endpoint(endpoint).map_err(|format| {
            self.invalid(Service::Sns, format!("Endpoint format is not {format}"))
        })?;
        let output = self
            .sns()
            .await
            .subscribe()
            .endpoint(endpoint)
            .protocol(protocol.as_str())
            .topic_arn(topic_arn)
            .send()
            .await
            .map_err(|e| self.sdk_error(Service::Sns, format!("subscribe({topic_arn})"), e))?;
        Ok(output.subscription_arn.unwrap_or_default())
    }

    /// Deletes a subscription.
    pub async fn unsubscribe(&self, subscription_arn: &str) -> Result<(), Error> {
        self.sns()
            .await
            .unsubscribe()
            .subscription_arn(subscription_arn)
            .send()
            .await
            .map_err(|e| {
                self.sdk_error(Service::Sns, format!("unsubscribe({subscription_arn})"), e)
            })?;
        Ok(())
    }

    /// Lists one page of topics.
    pub async fn list_topics(&self, next_token: Option<String>) -> Result<ListTopicsOutput, Error> {
        self.sns()
            .await
            .list_topics()
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| self.sdk_error(Service::Sns, "list_topics".to_owned(), e))
    }

    /// Lists one page of a topic's subscriptions.
    pub async fn list_subscriptions_by_topic(
        &self,
        topic_arn: &str,
        next_token: Option<String>,
    ) -> Result<ListSubscriptionsByTopicOutput, Error> {
        self.sns()
            .await
            .list_subscriptions_by_topic()
            .topic_arn(topic_arn)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| {
                self.sdk_error(
                    Service::Sns,
                    format!("list_subscriptions_by_topic({topic_arn})"),
                    e,
                )
            })
    }

    /// Sends a text message.
    pub async fn sms(&self, phone: &str, message: &str) -> Result<String, Error> {
        self.publish(PublishParams {
            message: message.to_owned(),
            phone_number: Some(phone.to_owned()),
            ..Default::default()
        })
        .await
    }

    /// Publishes to a topic of this application.
    pub async fn publish_to_topic(
        &self,
        topic: &str,
        message: &str,
        subject: Option<&str>,
    ) -> Result<String, Error> {
        self.publish(PublishParams {
            message: message.to_owned(),
            subject: subject.map(str::to_owned),
            topic_arn: Some(self.topic_arn(topic)),
            ..Default::default()
        })
        .await
    }

    /// Subscribes `endpoint` to a topic of this application.
    pub async fn subscribe_to_topic(
        &self,
        endpoint: &str,
        protocol: &str,
        topic: &str,
    ) -> Result<String, Error> {
        self.subscribe(endpoint, protocol, &self.topic_arn(topic))
            .await
    }

    /// Lists the ARNs of every topic, or only those starting with the (prefixed) `prefix`.
    pub async fn list_topic_arns(&self, prefix: Option<&str>) -> Result<Vec<String>, Error> {
        let prefix = prefix
            .filter(|prefix| !prefix.is_empty())
            .map(|prefix| self.topic_arn(prefix));
        let mut arns = Vec::new();
        let mut next_token = None;
        loop {
            let page = self.list_topics(next_token).await?;
            arns.extend(
                page.topics
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|topic| topic.topic_arn)
                    .filter(|arn| prefix.as_deref().map_or(true, |prefix| arn.starts_with(prefix))),
            );
            next_token = page.next_token;
            if next_token.is_none() {
                break;
            }
        }
        Ok(arns)
    }

    /// Lists every subscription of a topic of this application.
    pub async fn list_all_subscriptions_by_topic(
        &self,
        topic: &str,
    ) -> Result<Vec<Subscription>, Error> {
        let topic_arn = self.topic_arn(topic);
        let mut subscriptions = Vec::new();
        let mut next_token = None;
        loop {
            let page = self
                .list_subscriptions_by_topic(&topic_arn, next_token)
                .await?;
            subscriptions.extend(page.subscriptions.unwrap_or_default());
            next_token = page.next_token;
            if next_token.is_none() {
                break;
            }
        }
        Ok(subscriptions)
    }
}
