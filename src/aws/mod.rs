// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later

/// A wrapper around Athena client.
mod athena;
/// The façade type and error mapping shared by every service.
mod aws_lib;
/// Compact URL safe base 64 ids.
mod b64;
/// A wrapper around Batch client.
mod batch;
/// A wrapper around CloudFront client.
mod cloudfront;
#[cfg(feature = "cognito")]
/// A wrapper around Cognito user and identity pool clients.
mod cognito;
/// A wrapper around Dynamo DB client updates.
mod ddbupdate;
/// A wrapper around Dynamo DB client.
mod dynamo;
#[cfg(feature = "ip_ranges")]
/// Published AWS address ranges.
mod ip_ranges;
/// `s3://` URIs of application resources.
mod keys;
/// Lazily built service clients.
mod pool;
/// Fibonacci backoff for credentials failures.
mod retry;
/// A wrapper around S3 client.
mod s3;
/// A wrapper around SES client.
mod ses;
/// A wrapper around SNS client.
mod sns;
/// A wrapper around SQS client.
mod sqs;
/// Unit tests.
mod tests;
/// Argument validation done before calling AWS.
mod validate;
/// A wrapper to send messages to a websocket via AWS API Gateway.
mod websocket;

pub use crate::aws::athena::{AthenaClient, QueryParams, DEFAULT_CATALOG};
pub use crate::aws::aws_lib::AwsLib;
pub use crate::aws::b64::{compact_id, compact_id_to_u64};
pub use crate::aws::batch::{
    parse_job_status, BatchClient, DescribedJobs, JobDefinition, JobSubmission,
};
pub use crate::aws::cloudfront::{has_alias_ending_with, invalidation_reference, CloudFrontClient};
#[cfg(feature = "cognito")]
pub use crate::aws::cognito::{secret_hash, CognitoIdentityClient, CognitoIdpClient};
pub use crate::aws::ddbupdate::DynamoUpdateBuilder;
pub use crate::aws::dynamo::{
    to_dynamo_av, to_dynamo_item, AttributeMap, DynamoDbClient, Query, QueryPage, Scan,
    ScanResult, TableSpec,
};
#[cfg(feature = "ip_ranges")]
pub use crate::aws::ip_ranges::{parse_ip_ranges, CLOUDFRONT_IP_LIST_URL};
pub use crate::aws::keys::{s3_key, Asset, ContentKey, Cover, EbookFile, FileSetting, S3Location};
pub use crate::aws::pool::{create_aws_config_loader, load_aws_config, ClientPool, ServiceClient};
pub use crate::aws::retry::{is_credentials_failure, FibonacciBackoff, FIBONACCI_DELAYS};
pub use crate::aws::s3::{
    encode_copy_source, guess_content_type, ObjectConditions, PresignMethod, PutSource, S3Client,
};
pub use crate::aws::ses::{parse_destinations, SesClient};
pub use crate::aws::sns::{prefixed_topic, PublishParams, SnsClient};
pub use crate::aws::sqs::{queue_name, ReceiveOptions, SqsClient};
pub use crate::aws::validate::{
    is_bucket_dns_compatible, is_e164, is_sns_json_message, is_valid_email, SubscriptionProtocol,
};
pub use crate::aws::websocket::{EventConnection, WebsocketClient};
