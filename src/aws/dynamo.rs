// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later

use super::aws_lib::{build_error, AwsLib};
use crate::common::{Error, Service};
use aws_sdk_dynamodb::operation::create_table::CreateTableOutput;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, AttributeValue, BillingMode, KeySchemaElement, KeyType,
    KeysAndAttributes, PutRequest, ScalarAttributeType, WriteRequest,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_dynamo::Item;
use std::collections::HashMap;
use tracing::warn;

/// A convenient alias for Dynamo DB client so consuming code doesn't need to add it to `Cargo.toml`
pub type DynamoDbClient = aws_sdk_dynamodb::Client;

/// A raw Dynamo DB item or key.
pub type AttributeMap = HashMap<String, AttributeValue>;

/// `BatchGetItem` accepts at most this many keys.
const BATCH_GET_LIMIT: usize = 100;
/// `BatchWriteItem` accepts at most this many requests.
const BATCH_WRITE_LIMIT: usize = 25;

/// Key schema of a new table. Tables are created with on-demand billing.
#[derive(Clone, Debug)]
pub struct TableSpec {
    /// Table name.
    pub name: String,
    /// Hash (partition) key name and type.
    pub hash_key: (String, ScalarAttributeType),
    /// Range (sort) key name and type, if any.
    pub range_key: Option<(String, ScalarAttributeType)>,
}

/// A key condition on a single hash key and an optional range key interval.
#[derive(Clone, Debug)]
pub struct Query {
    /// Hash key name and value.
    pub hash: (String, AttributeValue),
    /// Range key name and inclusive bounds.
    pub range: Option<(String, Option<AttributeValue>, Option<AttributeValue>)>,
    /// Secondary index to query instead of the table.
    pub index_name: Option<String>,
    /// Maximum items evaluated.
    pub limit: Option<i32>,
    /// `false` returns items in descending range key order.
    pub scan_forward: bool,
    /// Continue after this key.
    pub exclusive_start_key: Option<AttributeMap>,
}

impl Query {
    /// Query every item with the given hash key.
    pub fn hash<T: Serialize>(hash_name: &str, hash_value: T) -> Result<Self, Error> {
        Ok(Self {
            hash: (hash_name.to_owned(), to_dynamo_av(hash_value)?),
            range: None,
            index_name: None,
            limit: None,
            scan_forward: true,
            exclusive_start_key: None,
        })
    }

    /// Restrict the range key to `lo..=hi`, either end optional.
    pub fn range<T: Serialize>(
        mut self,
        range_name: &str,
        lo: Option<T>,
        hi: Option<T>,
    ) -> Result<Self, Error> {
        let lo = lo.map(to_dynamo_av).transpose()?;
        let hi = hi.map(to_dynamo_av).transpose()?;
        self.range = Some((range_name.to_owned(), lo, hi));
        Ok(self)
    }

    fn key_condition(&self) -> &'static str {
        match &self.range {
            None | Some((_, None, None)) => "#h = :hv",
            Some((_, Some(_), None)) => "#h = :hv AND #r >= :lo",
            Some((_, None, Some(_))) => "#h = :hv AND #r <= :hi",
            Some((_, Some(_), Some(_))) => "#h = :hv AND #r BETWEEN :lo AND :hi",
        }
    }
}

/// One page of query results.
#[derive(Debug)]
pub struct QueryPage<O> {
    /// Decoded items.
    pub items: Vec<O>,
    /// Pass back as `exclusive_start_key` to continue.
    pub last_evaluated_key: Option<AttributeMap>,
}

/// Optional scan filter.
#[derive(Clone, Debug, Default)]
pub struct Scan {
    /// E.g. `contains(#events, :event)`.
    pub filter_expression: Option<String>,
    /// Placeholder names used by the filter.
    pub expression_attribute_names: Option<HashMap<String, String>>,
    /// Placeholder values used by the filter.
    pub expression_attribute_values: Option<AttributeMap>,
    /// Attributes to return.
    pub projection_expression: Option<String>,
}

/// Every item a scan returned, across all pages.
#[derive(Debug)]
pub struct ScanResult<O> {
    /// Decoded items.
    pub items: Vec<O>,
    /// Number of items.
    pub count: usize,
}

impl AwsLib {
    async fn dynamo(&self) -> DynamoDbClient {
        self.client().await
    }

    /// Creates a table with on-demand billing.
    pub async fn create_table(&self, spec: &TableSpec) -> Result<CreateTableOutput, Error> {
        let call = format!("create_table(t={})", spec.name);
        let mut request = self
            .dynamo()
            .await
            .create_table()
            .table_name(&spec.name)
            .billing_mode(BillingMode::PayPerRequest);
        let keys = std::iter::once((&spec.hash_key, KeyType::Hash))
            .chain(spec.range_key.as_ref().map(|range| (range, KeyType::Range)));
        for ((name, kind), key_type) in keys {
            let definition = AttributeDefinition::builder()
                .attribute_name(name)
                .attribute_type(kind.clone())
                .build()
                .map_err(|e| build_error(call.clone(), e))?;
            let element = KeySchemaElement::builder()
                .attribute_name(name)
                .key_type(key_type)
                .build()
                .map_err(|e| build_error(call.clone(), e))?;
            request = request.attribute_definitions(definition).key_schema(element);
        }
        self.with_credentials_retry(Service::DynamoDb, call, || request.clone().send())
            .await
    }

    /// Put an item into the specified Dynamo DB table.
    pub async fn put_item<I: Serialize>(&self, table: &str, item: I) -> Result<(), Error> {
        let item: AttributeMap = to_dynamo_item(item)?;
        let request = self
            .dynamo()
            .await
            .put_item()
            .table_name(table)
            .set_item(Some(item));
        self.with_credentials_retry(Service::DynamoDb, format!("put_item(t={table})"), || {
            request.clone().send()
        })
        .await?;
        Ok(())
    }

    /// Gets the item with the specified key (hash, or hash and range), if any.
    pub async fn get_item<K: Serialize, O: DeserializeOwned>(
        &self,
        table: &str,
        key: K,
    ) -> Result<Option<O>, Error> {
        let key: AttributeMap = to_dynamo_item(key)?;
        let request = self
            .dynamo()
            .await
            .get_item()
            .consistent_read(true)
            .table_name(table)
            .set_key(Some(key));
        let output = self
            .with_credentials_retry(Service::DynamoDb, format!("get_item(t={table})"), || {
                request.clone().send()
            })
            .await?;
        output
            .item
            .map(|item| serde_dynamo::from_item(item).map_err(Error::Serde))
            .transpose()
    }

    /// Query one page of items from the specified Dynamo DB table.
    pub async fn query_item<O: DeserializeOwned>(
        &self,
        table: &str,
        query: Query,
    ) -> Result<QueryPage<O>, Error> {
        let mut request = self
            .dynamo()
            .await
            .query()
            .table_name(table)
            .key_condition_expression(query.key_condition())
            .expression_attribute_names("#h", &query.hash.0)
            .expression_attribute_values(":hv", query.hash.1.clone())
            .scan_index_forward(query.scan_forward)
            .set_index_name(query.index_name.clone())
            .set_limit(query.limit)
            .set_exclusive_start_key(query.exclusive_start_key.clone());
        // Secondary indexes don't support consistent reads.
        if query.index_name.is_none() {
            request = request.consistent_read(true);
        }
        if let Some((range_name, lo, hi)) = query.range {
            if lo.is_some() || hi.is_some() {
                request = request.expression_attribute_names("#r", range_name);
            }
            if let Some(lo) = lo {
                request = request.expression_attribute_values(":lo", lo);
            }
            if let Some(hi) = hi {
                request = request.expression_attribute_values(":hi", hi);
            }
        }
        let call = format!("query_item(t={table}, h={})", query.hash.0);
        let output = self
            .with_credentials_retry(Service::DynamoDb, call, || request.clone().send())
            .await?;
        let items = output
            .items
            .unwrap_or_default()
            .into_iter()
            .map(|item| serde_dynamo::from_item(item).map_err(Error::Serde))
            .collect::<Result<Vec<O>, Error>>()?;
        Ok(QueryPage {
            items,
            last_evaluated_key: output.last_evaluated_key,
        })
    }

    /// Query every page of items.
    pub async fn query_all<O: DeserializeOwned>(
        &self,
        table: &str,
        mut query: Query,
    ) -> Result<Vec<O>, Error> {
        let mut ret = Vec::new();
        loop {
            let page = self.query_item(table, query.clone()).await?;
            ret.extend(page.items);
            match page.last_evaluated_key {
                Some(key) => query.exclusive_start_key = Some(key),
                None => break,
            }
        }
        Ok(ret)
    }

    /// Deletes the item with the specified key, if any.
    pub async fn delete_item<K: Serialize>(&self, table: &str, key: K) -> Result<(), Error> {
        let key: AttributeMap = to_dynamo_item(key)?;
        let request = self
            .dynamo()
            .await
            .delete_item()
            .table_name(table)
            .set_key(Some(key));
        self.with_credentials_retry(Service::DynamoDb, format!("delete_item(t={table})"), || {
            request.clone().send()
        })
        .await?;
        Ok(())
    }

    /// Scan and return items from the specified Dynamo DB table, following every page.
    pub async fn scan_items<O: DeserializeOwned>(
        &self,
        table: &str,
        scan: Scan,
    ) -> Result<ScanResult<O>, Error> {
        let client = self.dynamo().await;
        let mut items = Vec::new();
        let mut last_evaluated_key = None;
        loop {
            let output = client
                .scan()
                .table_name(table)
                .set_filter_expression(scan.filter_expression.clone())
                .set_expression_attribute_names(scan.expression_attribute_names.clone())
                .set_expression_attribute_values(scan.expression_attribute_values.clone())
                .set_projection_expression(scan.projection_expression.clone())
                .set_exclusive_start_key(last_evaluated_key)
                .send()
                .await
                .map_err(|e| self.sdk_error(Service::DynamoDb, format!("scan_items(t={table})"), e))?;
            for item in output.items.unwrap_or_default() {
                items.push(serde_dynamo::from_item(item).map_err(Error::Serde)?);
            }
            last_evaluated_key = output.last_evaluated_key.filter(|key| !key.is_empty());
            if last_evaluated_key.is_none() {
                break;
            }
        }
        Ok(ScanResult {
            count: items.len(),
            items,
        })
    }

    /// Gets many items by key, 100 keys per request. Missing items are skipped.
    pub async fn batch_get_items<K: Serialize, O: DeserializeOwned>(
        &self,
        table: &str,
        keys: Vec<K>,
    ) -> Result<Vec<O>, Error> {
        let call = format!("batch_get_items(t={table})");
        let keys = keys
            .into_iter()
            .map(to_dynamo_item)
            .collect::<Result<Vec<AttributeMap>, Error>>()?;
        let client = self.dynamo().await;
        let mut ret = Vec::new();
        for chunk in keys.chunks(BATCH_GET_LIMIT) {
            let keys_and_attributes = KeysAndAttributes::builder()
                .set_keys(Some(chunk.to_vec()))
                .consistent_read(true)
                .build()
                .map_err(|e| build_error(call.clone(), e))?;
            let mut output = client
                .batch_get_item()
                .request_items(table, keys_and_attributes)
                .send()
                .await
                .map_err(|e| self.sdk_error(Service::DynamoDb, call.clone(), e))?;
            if output
                .unprocessed_keys
                .as_ref()
                .map_or(false, |unprocessed| !unprocessed.is_empty())
            {
                warn!("{call}: some keys were not processed");
            }
            let items = output
                .responses
                .as_mut()
                .and_then(|responses| responses.remove(table))
                .unwrap_or_default();
            for item in items {
                ret.push(serde_dynamo::from_item(item).map_err(Error::Serde)?);
            }
        }
        Ok(ret)
    }

    /// Puts many items, 25 per request. Returns how many were left unprocessed.
    pub async fn batch_write_items<I: Serialize>(
        &self,
        table: &str,
        items: Vec<I>,
    ) -> Result<usize, Error> {
        let call = format!("batch_write_items(t={table})");
        let requests = items
            .into_iter()
            .map(|item| -> Result<WriteRequest, Error> {
                let put = PutRequest::builder()
                    .set_item(Some(to_dynamo_item(item)?))
                    .build()
                    .map_err(|e| build_error(call.clone(), e))?;
                Ok(WriteRequest::builder().put_request(put).build())
            })
            .collect::<Result<Vec<_>, Error>>()?;
        let client = self.dynamo().await;
        let mut unprocessed = 0;
        for chunk in requests.chunks(BATCH_WRITE_LIMIT) {
            let output = client
                .batch_write_item()
                .request_items(table, chunk.to_vec())
                .send()
                .await
                .map_err(|e| self.sdk_error(Service::DynamoDb, call.clone(), e))?;
            unprocessed += output
                .unprocessed_items
                .as_ref()
                .and_then(|items| items.get(table))
                .map_or(0, Vec::len);
        }
        if unprocessed > 0 {
            warn!("{call}: {unprocessed} items were not processed");
        }
        Ok(unprocessed)
    }
}

/// Packs a Dynamo DB `AttributeValue`.
pub fn to_dynamo_av<T: Serialize>(value: T) -> Result<AttributeValue, Error> {
    serde_dynamo::to_attribute_value(value).map_err(Error::Serde)
}

/// Packs a Dynamo DB item.
pub fn to_dynamo_item<T: Serialize, I: From<Item>>(value: T) -> Result<I, Error> {
    serde_dynamo::to_item(value).map_err(Error::Serde)
}
