// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later

use super::aws_lib::AwsLib;
use super::dynamo::to_dynamo_av;
use crate::common::{Error, Service};
use aws_sdk_dynamodb::operation::update_item::builders::UpdateItemFluentBuilder;
use serde::Serialize;
use std::collections::HashSet;

impl AwsLib {
    /// Return Dynamo DB update builder (for tables that have no range key).
    pub async fn update_item<T: Serialize>(
        &self,
        table: &str,
        hash_name: &str,
        hash_value: T,
    ) -> Result<DynamoUpdateBuilder<'_>, Error> {
        let ddb_builder = self
            .dynamo_update(table, hash_name)
            .await
            .key(hash_name, to_dynamo_av(hash_value)?);
        Ok(DynamoUpdateBuilder::new(
            self,
            format!("update_item(t={table}, h={hash_name})"),
            ddb_builder,
            [hash_name],
        ))
    }

    /// Return Dynamo DB update builder for ranged tables.
    pub async fn update_ranged_item<T: Serialize, U: Serialize>(
        &self,
        table: &str,
        hash_name: &str,
        hash_value: T,
        range_name: &str,
        range_value: U,
    ) -> Result<DynamoUpdateBuilder<'_>, Error> {
        let ddb_builder = self
            .dynamo_update(table, hash_name)
            .await
            .key(hash_name, to_dynamo_av(hash_value)?)
            .key(range_name, to_dynamo_av(range_value)?);
        Ok(DynamoUpdateBuilder::new(
            self,
            format!("update_item(t={table}, h={hash_name}, r={range_name})"),
            ddb_builder,
            [hash_name, range_name],
        ))
    }

    async fn dynamo_update(&self, table: &str, hash_name: &str) -> UpdateItemFluentBuilder {
        self.client::<aws_sdk_dynamodb::Client>()
            .await
            .update_item()
            .table_name(table)
            .condition_expression(format!("attribute_exists(#{hash_name})"))
            .expression_attribute_names(format!("#{hash_name}"), hash_name)
    }
}

/// Builder for Dynamo DB update. Only updates existing items.
pub struct DynamoUpdateBuilder<'a> {
    lib: &'a AwsLib,
    call: String,
    ddb_builder: UpdateItemFluentBuilder,
    expressions: Vec<String>,
    keys: HashSet<String>,
    removals: Vec<String>,
    updates: Vec<(String, String)>,
}

impl<'a> DynamoUpdateBuilder<'a> {
    fn new<const N: usize>(
        lib: &'a AwsLib,
        call: String,
        ddb_builder: UpdateItemFluentBuilder,
        keys: [&str; N],
    ) -> Self {
        Self {
            lib,
            call,
            ddb_builder,
            expressions: Default::default(),
            keys: keys.into_iter().map(str::to_owned).collect(),
            removals: Default::default(),
            updates: Default::default(),
        }
    }

    /// Specify an attribute for the update that will always be set.
    pub fn attribute<T: Serialize>(
        mut self,
        attribute_name: &str,
        value: T,
    ) -> Result<Self, Error> {
        self.validate_unique_key(attribute_name)?;
        let name_key = format!("#{attribute_name}");
        let value_key = format!(":{attribute_name}");
        self.ddb_builder = self
            .ddb_builder
            .expression_attribute_names(&name_key, attribute_name)
            .expression_attribute_values(&value_key, to_dynamo_av(value)?);
        self.updates.push((name_key, value_key));
        Ok(self)
    }

    /// Specify an optional attribute for the update; `None` removes it.
    pub fn optional_attribute<T: Serialize>(
        mut self,
        attribute_name: &str,
        value: Option<T>,
    ) -> Result<Self, Error> {
        if let Some(value) = value {
            self.attribute(attribute_name, value)
        } else {
            self.validate_unique_key(attribute_name)?;
            let name_key = format!("#{attribute_name}");
            self.ddb_builder = self
                .ddb_builder
                .expression_attribute_names(&name_key, attribute_name);
            self.removals.push(name_key);
            Ok(self)
        }
    }

    /// Specify an attribute that wont be set if it equals its default value.
    pub fn skippable_attribute<T: Default + PartialEq + Serialize>(
        self,
        attribute_name: &str,
        value: T,
    ) -> Result<Self, Error> {
        let value = (value != T::default()).then_some(value);
        self.optional_attribute(attribute_name, value)
    }

    /// Specify an update expression.  For example:
    /// "x = if_not_exists(y, :z)")
    pub fn update_expression(mut self, expr: &str) -> Self {
        self.expressions.push(expr.to_string());
        self
    }

    /// Specify an attribute that is used in expressions but not persisted.
    pub fn volatile_attribute<T: Serialize>(
        mut self,
        attribute_name: &str,
        value: T,
    ) -> Result<Self, Error> {
        self.validate_unique_key(attribute_name)?;
        let value_key = format!(":{attribute_name}");
        self.ddb_builder = self
            .ddb_builder
            .expression_attribute_values(&value_key, to_dynamo_av(value)?);
        Ok(self)
    }

    /// Returns the update expression `send` would use.
    pub fn expression(&self) -> String {
        let updates = if self.updates.is_empty() && self.expressions.is_empty() {
            Default::default()
        } else {
            format!(
                "SET {}",
                self.updates
                    .iter()
                    .map(|(name_key, value_key)| format!("{name_key} = {value_key}"))
                    .chain(self.expressions.iter().cloned())
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        };
        let removals = if self.removals.is_empty() {
            Default::default()
        } else {
            format!("REMOVE {}", self.removals.join(", "))
        };
        if removals.is_empty() {
            updates
        } else if updates.is_empty() {
            removals
        } else {
            format!("{updates} {removals}")
        }
    }

    /// Start the Dynamo DB update, retrying if credentials are unavailable. Returns the
    /// update expression; nothing is sent if it is empty.
    pub async fn send(self) -> Result<String, Error> {
        let expr = self.expression();
        if !expr.is_empty() {
            let request = self.ddb_builder.update_expression(&expr);
            self.lib
                .with_credentials_retry(Service::DynamoDb, self.call, || request.clone().send())
                .await?;
        }
        Ok(expr)
    }

    fn validate_unique_key(&mut self, attribute_name: &str) -> Result<(), Error> {
        if self.keys.insert(attribute_name.to_string()) {
            Ok(())
        } else {
            Err(self.lib.invalid(
                Service::DynamoDb,
                format!("{attribute_name}: duplicate attribute name"),
            ))
        }
    }
}
