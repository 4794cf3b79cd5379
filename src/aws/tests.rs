// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: LGPL-3.0-or-later

#[cfg(test)]
mod aws_tests {
    use crate::aws::s3::bucket_policy;
    use crate::aws::{
        compact_id, compact_id_to_u64, encode_copy_source, guess_content_type,
        invalidation_reference, is_bucket_dns_compatible, is_credentials_failure, is_e164,
        is_sns_json_message, is_valid_email, parse_destinations, parse_job_status, prefixed_topic,
        queue_name, s3_key, Asset, AwsLib, ContentKey, Cover, EbookFile, FibonacciBackoff,
        FileSetting, PublishParams, QueryParams, S3Location, SesClient, SnsClient, SqsClient,
        SubscriptionProtocol, FIBONACCI_DELAYS,
    };
    use crate::common::{AwsLibConfig, AwsSettings, Error, Service};
    use aws_credential_types::provider::error::CredentialsError;
    use aws_config::{BehaviorVersion, Region, SdkConfig};
    use aws_sdk_apigatewaymanagement::operation::post_to_connection::{
        PostToConnectionError, PostToConnectionOutput,
    };
    use aws_sdk_apigatewaymanagement::types::error::GoneException;
    use aws_sdk_athena::operation::get_query_execution::GetQueryExecutionOutput;
    use aws_sdk_athena::operation::start_query_execution::StartQueryExecutionOutput;
    use aws_sdk_athena::types::{
        EncryptionOption, QueryExecution, QueryExecutionState, QueryExecutionStatus,
    };
    use aws_sdk_batch::operation::describe_jobs::DescribeJobsOutput;
    use aws_sdk_cloudfront::operation::delete_distribution::DeleteDistributionOutput;
    use aws_sdk_cloudfront::operation::get_distribution::GetDistributionOutput;
    use aws_sdk_cloudfront::operation::list_distributions::ListDistributionsOutput;
    use aws_sdk_cloudfront::types::{
        Aliases, Distribution, DistributionConfig, DistributionList, DistributionSummary,
        HttpVersion, PriceClass,
    };
    use aws_sdk_dynamodb::operation::get_item::{GetItemError, GetItemOutput};
    use aws_sdk_dynamodb::operation::scan::ScanOutput;
    use aws_sdk_dynamodb::operation::update_item::UpdateItemOutput;
    use aws_sdk_dynamodb::types::AttributeValue;
    use aws_sdk_s3::operation::create_bucket::CreateBucketOutput;
    use aws_sdk_s3::operation::get_object::GetObjectError;
    use aws_sdk_s3::operation::head_bucket::{HeadBucketError, HeadBucketOutput};
    use aws_sdk_s3::operation::put_bucket_policy::PutBucketPolicyOutput;
    use aws_sdk_s3::types::error::NotFound;
    use aws_sdk_ses::operation::send_raw_email::SendRawEmailOutput;
    use aws_sdk_sns::operation::publish::PublishOutput;
    use aws_sdk_sqs::operation::create_queue::CreateQueueOutput;
    use aws_sdk_sqs::operation::send_message::SendMessageOutput;
    use aws_smithy_mocks::{mock, mock_client, RuleMode};
    use aws_smithy_runtime_api::client::orchestrator::HttpResponse;
    use aws_smithy_runtime_api::client::result::SdkError;
    use aws_smithy_runtime_api::http::StatusCode;
    use aws_smithy_types::body::SdkBody;
    use aws_smithy_types::error::ErrorMetadata;
    use aws_smithy_types::DateTime;
    use serde::Deserialize;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::time::Instant;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn new_lib(toml: &str, debug: bool) -> AwsLib {
        init_tracing();
        let config = AwsLibConfig::builder()
            .debug(debug)
            .toml_str(toml)
            .build()
            .expect("config");
        AwsLib::new(config).expect("aws lib")
    }

    fn connection(id: &str) -> HashMap<String, AttributeValue> {
        HashMap::from([
            ("connectionId".to_owned(), AttributeValue::S(id.to_owned())),
            (
                "eventId".to_owned(),
                AttributeValue::Ss(vec!["e1".to_owned()]),
            ),
        ])
    }

    fn credentials_failure() -> SdkError<GetItemError, HttpResponse> {
        SdkError::construction_failure(CredentialsError::not_loaded("no credentials"))
    }

    fn counter() -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        (count.clone(), count)
    }

    #[test]
    fn validate_tests() {
        assert!(is_e164("+886912345678"));
        assert!(is_e164("14155552671"));
        assert!(!is_e164("+0912345678"));
        assert!(!is_e164("+1"));
        assert!(!is_e164("+1234567890123456"));
        assert!(!is_e164("+1-415-555"));
        assert!(!is_e164("+886912345678\n"));
        assert!(!is_e164(""));

        assert!(is_bucket_dns_compatible("my-bucket.assets"));
        assert!(!is_bucket_dns_compatible("ab"));
        assert!(!is_bucket_dns_compatible("My_Bucket"));
        assert!(!is_bucket_dns_compatible("-bucket"));
        assert!(!is_bucket_dns_compatible("bucket."));
        assert!(!is_bucket_dns_compatible("192.168.1.1"));
        assert!(!is_bucket_dns_compatible(&"a".repeat(64)));

        assert!(is_valid_email("reader@example.com"));
        assert!(is_valid_email("first.last+tag@mail.example.co.uk"));
        assert!(!is_valid_email("reader@example"));
        assert!(!is_valid_email("reader@example."));
        assert!(!is_valid_email("reader@@example.com"));
        assert!(!is_valid_email("reader example@example.com"));
        assert!(!is_valid_email("@example.com"));

        assert!(is_sns_json_message(r#"{"default": "hi", "sms": "hi"}"#));
        assert!(!is_sns_json_message(r#"{"sms": "hi"}"#));
        assert!(!is_sns_json_message(r#"{"default": null}"#));
        assert!(!is_sns_json_message("default"));
    }

    #[test]
    fn subscription_protocol_tests() {
        use SubscriptionProtocol::*;
        assert_eq!("email-json".parse::<SubscriptionProtocol>(), Ok(EmailJson));
        assert!("fax".parse::<SubscriptionProtocol>().is_err());

        assert_eq!(Https.validate_endpoint("https://example.com/hook"), Ok(()));
        assert_eq!(Https.validate_endpoint("http://example.com/hook"), Err("https"));
        assert_eq!(Email.validate_endpoint("a@b.co"), Ok(()));
        assert_eq!(Email.validate_endpoint("a.b.co"), Err("email"));
        assert_eq!(Sms.validate_endpoint("+886912345678"), Ok(()));
        assert_eq!(Sms.validate_endpoint("0912345678"), Err("E.164"));
        assert_eq!(Sqs.validate_endpoint("arn:aws:sqs:us-east-1:1:q"), Ok(()));
        assert_eq!(Lambda.validate_endpoint("arn:aws:sqs:us-east-1:1:q"), Err("ARN"));
        assert_eq!(Application.validate_endpoint("arn:aws:sns:us-east-1:1:app"), Ok(()));
    }

    #[test]
    fn backoff_tests() {
        let delays = |backoff: FibonacciBackoff| backoff.delays().map(|d| d.as_secs()).collect::<Vec<_>>();
        assert_eq!(delays(FibonacciBackoff::full()), FIBONACCI_DELAYS);
        assert_eq!(delays(FibonacciBackoff::new(2)), [1, 1]);
        assert_eq!(delays(FibonacciBackoff::new(100)), FIBONACCI_DELAYS);
        assert!(delays(FibonacciBackoff::none()).is_empty());
        assert_eq!(FibonacciBackoff::full().max_attempts(), 7);
        assert_eq!(FIBONACCI_DELAYS.iter().sum::<u64>(), 20);
    }

    #[test]
    fn credentials_failure_tests() {
        assert!(is_credentials_failure(&credentials_failure()));
        let service: SdkError<GetItemError, HttpResponse> =
            SdkError::construction_failure(std::io::Error::other("not credentials"));
        assert!(!is_credentials_failure(&service));
    }

    #[tokio::test(start_paused = true)]
    async fn retry_full_budget_tests() {
        let (attempts, seen) = counter();
        let start = Instant::now();
        let result: Result<(), _> = FibonacciBackoff::full()
            .retry(
                "get_item",
                || {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    async { Err(credentials_failure()) }
                },
                |e: &SdkError<GetItemError, HttpResponse>| is_credentials_failure(e),
            )
            .await;
        assert!(result.is_err());
        assert_eq!(seen.load(Ordering::SeqCst), 7);
        assert_eq!(start.elapsed(), Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn retry_recovers_tests() {
        let (attempts, seen) = counter();
        let start = Instant::now();
        let result = FibonacciBackoff::full()
            .retry(
                "get_item",
                || {
                    let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if attempt < 3 {
                            Err(credentials_failure())
                        } else {
                            Ok(attempt)
                        }
                    }
                },
                |e: &SdkError<GetItemError, HttpResponse>| is_credentials_failure(e),
            )
            .await;
        assert_eq!(result.ok(), Some(3));
        assert_eq!(seen.load(Ordering::SeqCst), 4);
        assert_eq!(start.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn credentials_retry_budget_tests() {
        let lib = new_lib("[aws]\ndynamodb_retries = 2\n", false);
        let (attempts, seen) = counter();
        let start = Instant::now();
        let result = lib
            .with_credentials_retry(Service::DynamoDb, "get_item(t=t)".to_owned(), || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(credentials_failure()) }
            })
            .await;
        assert!(matches!(
            result,
            Err(Error::Credentials(Service::DynamoDb, _, None))
        ));
        assert_eq!(seen.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Row {
        id: String,
        n: u32,
    }

    #[derive(serde::Serialize)]
    struct RowKey<'a> {
        id: &'a str,
    }

    #[tokio::test(start_paused = true)]
    async fn dynamo_service_error_not_retried_tests() {
        let lib = new_lib("[aws]\n", false);
        let (calls, seen) = counter();
        let get_item = mock!(aws_sdk_dynamodb::Client::get_item)
            .match_requests(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                true
            })
            .then_error(|| {
                GetItemError::generic(
                    ErrorMetadata::builder()
                        .code("ValidationException")
                        .message("bad key")
                        .build(),
                )
            });
        lib.insert_client(mock_client!(
            aws_sdk_dynamodb,
            RuleMode::MatchAny,
            &[&get_item]
        ));
        let start = Instant::now();
        let result = lib.get_item::<_, Row>("rows", RowKey { id: "a" }).await;
        assert!(matches!(
            result,
            Err(Error::Service(Service::DynamoDb, _, None))
        ));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn dynamo_get_item_tests() {
        let lib = new_lib("[aws]\n", false);
        let get_item = mock!(aws_sdk_dynamodb::Client::get_item)
            .match_requests(|r| {
                r.table_name() == Some("rows")
                    && r.key
                        .as_ref()
                        .and_then(|key| key.get("id"))
                        .map_or(false, |id| id == &AttributeValue::S("a".to_owned()))
            })
            .then_output(|| {
                GetItemOutput::builder()
                    .item("id", AttributeValue::S("a".to_owned()))
                    .item("n", AttributeValue::N("3".to_owned()))
                    .build()
            });
        lib.insert_client(mock_client!(
            aws_sdk_dynamodb,
            RuleMode::Sequential,
            &[&get_item]
        ));
        let row: Option<Row> = lib.get_item("rows", RowKey { id: "a" }).await.expect("get_item");
        assert_eq!(
            row,
            Some(Row {
                id: "a".to_owned(),
                n: 3
            })
        );
    }

    #[tokio::test]
    async fn dynamo_update_tests() {
        let lib = new_lib("[aws]\n", false);
        let expected = "SET #title = :title, n = if_not_exists(n, :zero) REMOVE #gone";
        let update_item = mock!(aws_sdk_dynamodb::Client::update_item)
            .match_requests(move |r| r.update_expression() == Some(expected))
            .then_output(|| UpdateItemOutput::builder().build());
        lib.insert_client(mock_client!(
            aws_sdk_dynamodb,
            RuleMode::Sequential,
            &[&update_item]
        ));

        let duplicate = lib
            .update_item("books", "id", "b1")
            .await
            .expect("builder")
            .attribute("id", "b2");
        assert!(matches!(duplicate, Err(Error::Invalid(Service::DynamoDb, _))));

        let expr = lib
            .update_item("books", "id", "b1")
            .await
            .expect("builder")
            .attribute("title", "Dune")
            .expect("title")
            .optional_attribute::<u32>("gone", None)
            .expect("gone")
            .update_expression("n = if_not_exists(n, :zero)")
            .volatile_attribute("zero", 0)
            .expect("zero")
            .send()
            .await
            .expect("send");
        assert_eq!(expr, expected);
    }

    #[tokio::test]
    async fn create_bucket_skips_tests() {
        let lib = new_lib("[aws]\n", false);
        let (calls, seen) = counter();
        let head_bucket = mock!(aws_sdk_s3::Client::head_bucket)
            .then_output(|| HeadBucketOutput::builder().build());
        let create_bucket = mock!(aws_sdk_s3::Client::create_bucket)
            .match_requests(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                true
            })
            .then_output(|| CreateBucketOutput::builder().build());
        lib.insert_client(mock_client!(
            aws_sdk_s3,
            RuleMode::MatchAny,
            &[&head_bucket, &create_bucket]
        ));

        assert!(matches!(
            lib.create_bucket("Not_Dns").await,
            Err(Error::Invalid(Service::S3, _))
        ));
        assert!(!lib.create_bucket("existing-bucket").await.expect("exists"));
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn create_bucket_tests() {
        let lib = new_lib("[aws]\n", false);
        let head_bucket = mock!(aws_sdk_s3::Client::head_bucket)
            .then_error(|| HeadBucketError::NotFound(NotFound::builder().build()));
        let create_bucket = mock!(aws_sdk_s3::Client::create_bucket)
            .match_requests(|r| {
                r.bucket() == Some("new-bucket")
                    && r.acl() == Some(&aws_sdk_s3::types::BucketCannedAcl::PublicRead)
            })
            .then_output(|| CreateBucketOutput::builder().build());
        lib.insert_client(mock_client!(
            aws_sdk_s3,
            RuleMode::Sequential,
            &[&head_bucket, &create_bucket]
        ));
        assert!(lib.create_bucket("new-bucket").await.expect("created"));
    }

    async fn get_object_failure(debug: bool) -> Error {
        let lib = new_lib("[aws]\n", debug);
        let get_object = mock!(aws_sdk_s3::Client::get_object).then_error(|| {
            GetObjectError::generic(
                ErrorMetadata::builder()
                    .code("AccessDenied")
                    .message("Access Denied")
                    .build(),
            )
        });
        lib.insert_client(mock_client!(
            aws_sdk_s3,
            RuleMode::Sequential,
            &[&get_object]
        ));
        lib.get_object("bucket", "key")
            .await
            .expect_err("get_object should fail")
    }

    #[tokio::test]
    async fn debug_message_tests() {
        let quiet = get_object_failure(false).await;
        assert!(matches!(quiet, Error::Service(Service::S3, _, None)));
        assert_eq!(quiet.message(), None);
        assert_eq!(quiet.to_string(), "S3 get_object(bucket, key) failed");

        let loud = get_object_failure(true).await;
        assert_eq!(loud.message(), Some("Access Denied"));
        assert_eq!(loud.service(), Some(Service::S3));
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if let Ok(mut captured) = self.0.lock() {
                captured.extend_from_slice(buf);
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    async fn logged_get_object_failure(debug: bool) -> String {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new("awslib=debug"))
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);
        get_object_failure(debug).await;
        let bytes = captured.0.lock().expect("captured").clone();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    #[tokio::test]
    async fn sdk_error_logging_tests() {
        let quiet = logged_get_object_failure(false).await;
        assert!(quiet.contains("S3 get_object(bucket, key) failed"));
        assert!(!quiet.contains("Access Denied"));

        let loud = logged_get_object_failure(true).await;
        assert!(loud.contains("S3 get_object(bucket, key): Access Denied"));
    }

    #[test]
    fn s3_helpers_tests() {
        assert_eq!(
            encode_copy_source("bucket/dir name/a+b.txt"),
            "bucket/dir%20name/a%2Bb.txt"
        );
        assert_eq!(guess_content_type("a/b.png".as_ref()), "image/png");
        assert_eq!(
            guess_content_type("a/b.zzqq".as_ref()),
            "application/octet-stream"
        );
        let policy: serde_json::Value =
            serde_json::from_str(&bucket_policy("books", "E123")).expect("json");
        assert_eq!(
            policy["Statement"][0]["Resource"],
            serde_json::json!("arn:aws:s3:::books/*")
        );
        assert_eq!(
            policy["Statement"][0]["Principal"]["AWS"],
            serde_json::json!(
                "arn:aws:iam::cloudfront:user/CloudFront Origin Access Identity E123"
            )
        );
    }

    #[tokio::test]
    async fn sns_publish_validation_tests() {
        let lib = new_lib("[aws]\n", true);
        let (calls, seen) = counter();
        let publish = mock!(aws_sdk_sns::Client::publish)
            .match_requests(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                true
            })
            .then_output(|| PublishOutput::builder().message_id("m-1").build());
        lib.insert_client(mock_client!(aws_sdk_sns, RuleMode::MatchAny, &[&publish]));

        let missing = lib
            .publish(PublishParams {
                topic_arn: Some("arn:aws:sns:us-east-1:1:t".to_owned()),
                ..Default::default()
            })
            .await;
        assert!(matches!(missing, Err(Error::Invalid(Service::Sns, _))));

        let two_targets = lib
            .publish(PublishParams {
                message: "hi".to_owned(),
                topic_arn: Some("arn:aws:sns:us-east-1:1:t".to_owned()),
                target_arn: Some("arn:aws:sns:us-east-1:1:endpoint".to_owned()),
                ..Default::default()
            })
            .await;
        assert!(matches!(two_targets, Err(Error::Invalid(Service::Sns, _))));

        let bad_phone = lib.sms("0912-345-678", "hi").await.expect_err("bad phone");
        assert_eq!(bad_phone.message(), Some("PhoneNumber should use E.164 format."));

        assert_eq!(seen.load(Ordering::SeqCst), 0);
        assert_eq!(lib.sms("+886912345678", "hi").await.expect("sms"), "m-1");
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn sns_message_structure_tests() {
        let lib = new_lib(
            "[aws]\nsns_topic_prefix = \"arn:aws:sns:us-east-1:123:\"\n",
            false,
        );
        let json = mock!(aws_sdk_sns::Client::publish)
            .match_requests(|r| {
                r.message_structure() == Some("json")
                    && r.topic_arn() == Some("arn:aws:sns:us-east-1:123:alerts")
            })
            .then_output(|| PublishOutput::builder().message_id("json").build());
        let plain = mock!(aws_sdk_sns::Client::publish)
            .match_requests(|r| r.message_structure().is_none() && r.subject() == Some("Hello"))
            .then_output(|| PublishOutput::builder().message_id("plain").build());
        lib.insert_client(mock_client!(
            aws_sdk_sns,
            RuleMode::Sequential,
            &[&json, &plain]
        ));

        let id = lib
            .publish_to_topic("alerts", r#"{"default": "hi", "email": "hello"}"#, None)
            .await
            .expect("json publish");
        assert_eq!(id, "json");
        let id = lib
            .publish_to_topic("arn:aws:sns:us-east-1:123:alerts", "hi", Some("Hello"))
            .await
            .expect("plain publish");
        assert_eq!(id, "plain");
    }

    #[tokio::test]
    async fn sns_subscribe_validation_tests() {
        let lib = new_lib("[aws]\n", false);
        let topic = "arn:aws:sns:us-east-1:1:t";
        let cases = [
            ("ftp://example.com", "https", "Endpoint format is not https"),
            ("reader.example.com", "email", "Endpoint format is not email"),
            ("+0123", "sms", "Endpoint format is not E.164"),
            ("arn:aws:sqs:us-east-1:1:q", "lambda", "Endpoint format is not ARN"),
            ("anything", "fax", "unsupported protocol: fax"),
        ];
        for (endpoint, protocol, message) in cases {
            let error = lib
                .subscribe(endpoint, protocol, topic)
                .await
                .expect_err(protocol);
            assert!(matches!(error, Error::Invalid(Service::Sns, _)));
            assert_eq!(error.message(), Some(message));
        }
        assert_eq!(prefixed_topic("arn:p:", "t"), "arn:p:t");
        assert_eq!(prefixed_topic("arn:p:", "arn:p:t"), "arn:p:t");
    }

    #[tokio::test]
    async fn sqs_send_message_tests() {
        let lib = new_lib("[aws]\n", false);
        let matched = mock!(aws_sdk_sqs::Client::send_message).then_output(|| {
            SendMessageOutput::builder()
                .md5_of_message_body("5eb63bbbe01eeed093cb22bb8f5acdc3")
                .message_id("msg-1")
                .build()
        });
        let mismatched = mock!(aws_sdk_sqs::Client::send_message).then_output(|| {
            SendMessageOutput::builder()
                .md5_of_message_body("00000000000000000000000000000000")
                .message_id("msg-2")
                .build()
        });
        lib.insert_client(mock_client!(
            aws_sdk_sqs,
            RuleMode::Sequential,
            &[&matched, &mismatched]
        ));
        let url = "https://sqs.us-east-1.amazonaws.com/1/development_jobs";
        assert_eq!(
            lib.send_message(url, "hello world", None).await.expect("sent"),
            "msg-1"
        );
        let error = lib
            .send_message(url, "hello world", Some(5))
            .await
            .expect_err("md5 mismatch");
        assert_eq!(error.message(), Some("MD5 of message not matched"));
    }

    #[tokio::test]
    async fn sqs_queue_prefix_tests() {
        let lib = new_lib("[aws]\nenvironment = \"testing\"\n", false);
        let create_queue = mock!(aws_sdk_sqs::Client::create_queue)
            .match_requests(|r| r.queue_name() == Some("testing_jobs"))
            .then_output(|| CreateQueueOutput::builder().queue_url("url").build());
        lib.insert_client(mock_client!(
            aws_sdk_sqs,
            RuleMode::Sequential,
            &[&create_queue]
        ));
        assert_eq!(lib.create_queue("jobs", None).await.expect("queue"), "url");
        assert_eq!(queue_name("production", "mail"), "production_mail");
    }

    #[tokio::test]
    async fn batch_describe_jobs_tests() {
        let lib = new_lib("[aws]\n", false);
        let chunks = Arc::new(Mutex::new(Vec::new()));
        let seen = chunks.clone();
        let describe_jobs = mock!(aws_sdk_batch::Client::describe_jobs)
            .match_requests(move |r| {
                if let Ok(mut chunks) = chunks.lock() {
                    chunks.push(r.jobs.as_ref().map_or(0, Vec::len));
                }
                true
            })
            .then_output(|| DescribeJobsOutput::builder().build());
        lib.insert_client(mock_client!(
            aws_sdk_batch,
            RuleMode::MatchAny,
            &[&describe_jobs]
        ));
        let ids = (0..250).map(|i| format!("job-{i}")).collect::<Vec<_>>();
        let described = lib.describe_jobs(&ids).await.expect("describe");
        assert!(described.errors.is_empty());
        assert_eq!(*seen.lock().expect("chunks"), [100, 100, 50]);

        assert!(matches!(
            lib.describe_jobs(&[]).await,
            Err(Error::Invalid(Service::Batch, _))
        ));
    }

    #[tokio::test]
    async fn batch_validation_tests() {
        let lib = new_lib("[aws]\n", false);
        assert!(parse_job_status("RUNNABLE").is_some());
        assert!(parse_job_status("running").is_none());
        assert!(matches!(
            lib.list_jobs("queue", "DONE", 100, None).await,
            Err(Error::Invalid(Service::Batch, _))
        ));
        assert!(matches!(
            lib.list_jobs("", "RUNNING", 100, None).await,
            Err(Error::Invalid(Service::Batch, _))
        ));
        assert!(matches!(
            lib.cancel_job("job-1", "").await,
            Err(Error::Invalid(Service::Batch, _))
        ));
        assert!(matches!(
            lib.terminate_job("", "stop").await,
            Err(Error::Invalid(Service::Batch, _))
        ));
    }

    #[tokio::test]
    async fn cloudfront_invalidation_tests() {
        let lib = new_lib("[aws]\n", false);
        assert!(matches!(
            lib.create_invalidation("E1", Vec::new(), None).await,
            Err(Error::Invalid(Service::CloudFront, _))
        ));
        let paths = vec!["/a".to_owned(), "/b".to_owned()];
        let reference = invalidation_reference(&paths, "2024-01-02 03:04:05");
        assert_eq!(
            reference,
            "OTM0ODIyZjJkODU4NGVlOGJmMzk4ZjgyZjFlZDRlOTcxMGE1MzVhYjEyYmY0MzhhZmY1OTkxMGQ0OWUyN2M0Ng"
        );
    }

    #[cfg(feature = "cognito")]
    #[test]
    fn cognito_secret_hash_tests() {
        assert_eq!(
            crate::aws::secret_hash("secret", "alice", "client123").expect("hmac"),
            "oKHO337pkuh1r3zUNCZ1oCL3YgM0Yi2nkcAZsKQTIH8="
        );
    }

    #[test]
    fn compact_id_tests() {
        for (n, s) in [
            (0, "AA"),
            (5, "BQ"),
            (255, "_w"),
            (256, "AAE"),
            (300, "LAE"),
            (70000, "cBEBAA"),
            (5000000000, "APIFKgEAAAA"),
        ] {
            assert_eq!(compact_id(n), s);
            assert_eq!(compact_id_to_u64(s), Some(n));
        }
        assert_eq!(compact_id_to_u64("AAA"), None);
        assert_eq!(compact_id_to_u64("not base64!"), None);
    }

    #[test]
    fn s3_key_tests() {
        let settings = AwsSettings {
            s3_bucket: "books".to_owned(),
            cf_bucket: "cdn-books".to_owned(),
            domain: "example.com".to_owned(),
            ..Default::default()
        };
        let setting = FileSetting {
            revision: Some(2),
            path: None,
        };
        let file = EbookFile {
            manifestation_id: 2001,
            sn: 7,
            version: Some(3),
            setting: Some(setting.clone()),
        };
        let key = |location: S3Location, use_cf: bool, trailing_slash: bool| {
            s3_key(&settings, &location, use_cf, trailing_slash)
        };

        assert_eq!(
            key(S3Location::Manifestation { sn: 12345 }, false, true).expect("manifestation"),
            "s3://books/ebook/345/12345/"
        );
        assert!(key(S3Location::Manifestation { sn: 0 }, false, false).is_err());
        assert_eq!(
            key(S3Location::Ebook(file.clone()), false, false).expect("ebook"),
            "s3://books/ebook/1/2001/7/3_2"
        );
        assert_eq!(
            key(
                S3Location::Ebook(EbookFile {
                    setting: Some(FileSetting {
                        path: Some("e/abc/".to_owned()),
                        ..setting.clone()
                    }),
                    ..file.clone()
                }),
                false,
                false
            )
            .expect("epub"),
            "s3://epub.example.com/e/abc"
        );
        assert_eq!(
            key(
                S3Location::Ebook(EbookFile {
                    setting: Some(FileSetting {
                        path: Some("x/abc".to_owned()),
                        revision: None,
                    }),
                    ..file.clone()
                }),
                false,
                false
            )
            .expect("other path"),
            "s3://books/ebook/1/2001/7/3_0"
        );
        // A version alone, without a setting, stops at the file serial number.
        assert_eq!(
            key(
                S3Location::Ebook(EbookFile {
                    manifestation_id: 1234,
                    sn: 7,
                    version: Some(3),
                    setting: None,
                }),
                false,
                true
            )
            .expect("unpublished"),
            "s3://books/ebook/234/1234/7/"
        );
        assert_eq!(
            key(
                S3Location::Ebook(EbookFile {
                    version: Some(0),
                    ..file.clone()
                }),
                false,
                false
            )
            .expect("version zero"),
            "s3://books/ebook/1/2001/7"
        );
        assert!(key(
            S3Location::Ebook(EbookFile {
                sn: 0,
                ..file.clone()
            }),
            false,
            false
        )
        .is_err());
        assert_eq!(
            key(
                S3Location::EbookAsset(
                    Asset::Full,
                    EbookFile {
                        setting: Some(FileSetting::default()),
                        ..file.clone()
                    }
                ),
                true,
                false
            )
            .expect("asset"),
            "s3://cdn-books/ebook/1/2001/7/3_0/full"
        );
        for incomplete in [
            EbookFile {
                version: None,
                ..file.clone()
            },
            EbookFile {
                setting: None,
                ..file.clone()
            },
        ] {
            let error = key(S3Location::EbookAsset(Asset::Preview, incomplete), false, false)
                .expect_err("incomplete");
            assert_eq!(error.message(), Some("s3_key: file is incomplete"));
        }
        assert_eq!(
            key(
                S3Location::Book {
                    mode: None,
                    id: Some("42".to_owned())
                },
                false,
                true
            )
            .expect("book"),
            "s3://books/book/preview/42/"
        );
        assert_eq!(
            key(S3Location::Cover(Cover::Social, "AbCdEf".to_owned()), false, false)
                .expect("cover"),
            "s3://books/social/cover/Ab/CdEf"
        );
        assert!(key(S3Location::Cover(Cover::Book, "Ab".to_owned()), false, false).is_err());
        assert!(key(
            S3Location::Campaign {
                name: String::new(),
                path: None
            },
            false,
            false
        )
        .is_err());
        assert_eq!(
            key(
                S3Location::Document(Some(ContentKey::Digest {
                    md5: "0123456789abcdef".to_owned(),
                    sha: "ffee99".to_owned(),
                })),
                false,
                false
            )
            .expect("document"),
            "s3://doc-development.example.com/d/0123/4567/89abcdef99"
        );
        assert_eq!(
            key(
                S3Location::MediaFile(Some('m'), Some(ContentKey::Key("k".to_owned()))),
                false,
                false
            )
            .expect("media"),
            "s3://file.example.com/m/k"
        );
        assert_eq!(
            key(
                S3Location::Lcp {
                    content_id: Some("abcdefgh1234".to_owned())
                },
                false,
                false
            )
            .expect("lcp"),
            "s3://epub.example.com/l/abcd/efgh/1234.epub"
        );
        assert_eq!(
            key(
                S3Location::UserReadingFile {
                    prefix: None,
                    encoded_user_id: "U1".to_owned(),
                    reading_id: 300,
                    file_id: 5,
                },
                false,
                false
            )
            .expect("reading file"),
            "s3://file.example.com/u/U1/LAE/BQ"
        );
    }

    #[cfg(feature = "ip_ranges")]
    #[test]
    fn ip_ranges_tests() {
        let body = r#"{
            "CLOUDFRONT_GLOBAL_IP_LIST": ["120.52.22.96/27", "205.251.249.0/24"],
            "CLOUDFRONT_REGIONAL_EDGE_IP_LIST": ["13.113.196.64/26"]
        }"#;
        assert_eq!(
            crate::aws::parse_ip_ranges(body).expect("ranges"),
            ["120.52.22.96/27", "205.251.249.0/24", "13.113.196.64/26"]
        );
        assert!(crate::aws::parse_ip_ranges("{}").is_err());
    }

    #[cfg(feature = "ip_ranges")]
    #[tokio::test]
    async fn ip_ranges_unknown_service_tests() {
        let lib = new_lib("[aws]\n", false);
        assert!(matches!(
            lib.ip_ranges("EC2").await,
            Err(Error::Invalid(Service::CloudFront, _))
        ));
    }

    #[tokio::test]
    async fn client_pool_tests() {
        init_tracing();
        let config = AwsLibConfig::builder()
            .toml_str("[aws]
")
            .build()
            .expect("config");
        let sdk_config = SdkConfig::builder()
            .region(Region::new("ap-northeast-1"))
            .behavior_version(BehaviorVersion::latest())
            .build();
        let lib = AwsLib::with_sdk_config(config, sdk_config).expect("aws lib");
        assert!(lib.clients().is_empty());
        let first = lib.client::<SnsClient>().await;
        let _ = lib.client::<SnsClient>().await;
        assert_eq!(lib.clients().len(), 1);
        assert_eq!(
            first.config().region().map(|region| region.as_ref()),
            Some("ap-northeast-1")
        );
        let _ = lib.client::<SqsClient>().await;
        assert_eq!(lib.clients().len(), 2);
        let ses = lib.client::<SesClient>().await;
        assert_eq!(
            ses.config().region().map(|region| region.as_ref()),
            Some("us-west-2")
        );
    }

    #[tokio::test]
    async fn notify_event_unconfigured_tests() {
        let lib = new_lib("[aws]
", false);
        assert!(matches!(
            lib.notify_event("e1", b"hi").await,
            Err(Error::Invalid(Service::DynamoDb, _))
        ));
    }

    #[tokio::test]
    async fn notify_event_tests() {
        let lib = new_lib("[aws]\nevent_table = \"events\"\n", false);
        let scan = mock!(aws_sdk_dynamodb::Client::scan)
            .match_requests(|r| {
                r.table_name() == Some("events")
                    && r.filter_expression() == Some("contains(events, :eventId)")
            })
            .then_output(|| {
                ScanOutput::builder()
                    .items(connection("c1"))
                    .items(connection("c2"))
                    .count(2)
                    .build()
            });
        let delivered = mock!(aws_sdk_apigatewaymanagement::Client::post_to_connection)
            .match_requests(|r| r.connection_id() == Some("c1"))
            .then_output(|| PostToConnectionOutput::builder().build());
        let gone = mock!(aws_sdk_apigatewaymanagement::Client::post_to_connection)
            .match_requests(|r| r.connection_id() == Some("c2"))
            .then_error(|| PostToConnectionError::GoneException(GoneException::builder().build()));
        lib.insert_client(mock_client!(aws_sdk_dynamodb, RuleMode::Sequential, &[&scan]));
        lib.insert_client(mock_client!(
            aws_sdk_apigatewaymanagement,
            RuleMode::Sequential,
            &[&delivered, &gone]
        ));

        let results = lib.notify_event("e1", b"hi").await.expect("notify");
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(Error::Service(Service::ApiGateway, _, None))
        ));
    }
    fn distribution(status: &str, enabled: bool) -> Distribution {
        Distribution::builder()
            .id("E1")
            .arn("arn:aws:cloudfront::1:distribution/E1")
            .status(status)
            .last_modified_time(DateTime::from_secs(0))
            .in_progress_invalidation_batches(0)
            .domain_name("d1.cloudfront.net")
            .distribution_config(
                DistributionConfig::builder()
                    .caller_reference("ref")
                    .comment("")
                    .enabled(enabled)
                    .build()
                    .expect("distribution config"),
            )
            .build()
            .expect("distribution")
    }

    #[tokio::test]
    async fn delete_distribution_tests() {
        let lib = new_lib("[aws]\n", false);
        let (deletes, seen) = counter();
        let get = |status: &'static str, enabled: bool| {
            mock!(aws_sdk_cloudfront::Client::get_distribution).then_output(move || {
                GetDistributionOutput::builder()
                    .distribution(distribution(status, enabled))
                    .e_tag("ETAG1")
                    .build()
            })
        };
        let in_progress = get("InProgress", false);
        let enabled = get("Deployed", true);
        let deletable = get("Deployed", false);
        let delete = mock!(aws_sdk_cloudfront::Client::delete_distribution)
            .match_requests(move |r| {
                deletes.fetch_add(1, Ordering::SeqCst);
                r.id() == Some("E1") && r.if_match() == Some("ETAG1")
            })
            .then_output(|| DeleteDistributionOutput::builder().build());
        lib.insert_client(mock_client!(
            aws_sdk_cloudfront,
            RuleMode::Sequential,
            &[&in_progress, &enabled, &deletable, &delete]
        ));

        assert!(!lib.delete_distribution("E1").await.expect("in progress"));
        assert!(!lib.delete_distribution("E1").await.expect("enabled"));
        assert_eq!(seen.load(Ordering::SeqCst), 0);
        assert!(lib.delete_distribution("E1").await.expect("deleted"));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    fn summary(id: &str, alias: &str) -> DistributionSummary {
        DistributionSummary::builder()
            .id(id)
            .arn(format!("arn:aws:cloudfront::1:distribution/{id}"))
            .status("Deployed")
            .last_modified_time(DateTime::from_secs(0))
            .domain_name(format!("{id}.cloudfront.net"))
            .aliases(
                Aliases::builder()
                    .quantity(1)
                    .items(alias)
                    .build()
                    .expect("aliases"),
            )
            .comment("")
            .price_class(PriceClass::PriceClassAll)
            .enabled(true)
            .web_acl_id("")
            .http_version(HttpVersion::Http2)
            .is_ipv6_enabled(false)
            .staging(false)
            .build()
            .expect("summary")
    }

    #[tokio::test]
    async fn list_distributions_tests() {
        let lib = new_lib("[aws]\n", false);
        let first = mock!(aws_sdk_cloudfront::Client::list_distributions)
            .match_requests(|r| r.marker().is_none())
            .then_output(|| {
                ListDistributionsOutput::builder()
                    .distribution_list(
                        DistributionList::builder()
                            .marker("")
                            .next_marker("page-2")
                            .max_items(2)
                            .is_truncated(true)
                            .quantity(2)
                            .items(summary("D1", "cdn.example.com"))
                            .items(summary("D2", "cdn.example.org"))
                            .build()
                            .expect("first page"),
                    )
                    .build()
            });
        let second = mock!(aws_sdk_cloudfront::Client::list_distributions)
            .match_requests(|r| r.marker() == Some("page-2"))
            .then_output(|| {
                ListDistributionsOutput::builder()
                    .distribution_list(
                        DistributionList::builder()
                            .marker("page-2")
                            .next_marker("ignored")
                            .max_items(2)
                            .is_truncated(false)
                            .quantity(1)
                            .items(summary("D3", "img.example.com"))
                            .build()
                            .expect("second page"),
                    )
                    .build()
            });
        lib.insert_client(mock_client!(
            aws_sdk_cloudfront,
            RuleMode::Sequential,
            &[&first, &second]
        ));
        let ids = lib
            .list_distributions(Some("example.com"))
            .await
            .expect("list")
            .iter()
            .map(|summary| summary.id().to_owned())
            .collect::<Vec<_>>();
        assert_eq!(ids, ["D1", "D3"]);
    }

    #[tokio::test]
    async fn does_bucket_exist_tests() {
        let lib = new_lib("[aws]\n", false);
        let forbidden = mock!(aws_sdk_s3::Client::head_bucket).then_http_response(|| {
            HttpResponse::new(
                StatusCode::try_from(403).expect("status"),
                SdkBody::empty(),
            )
        });
        let missing = mock!(aws_sdk_s3::Client::head_bucket)
            .then_error(|| HeadBucketError::NotFound(NotFound::builder().build()));
        lib.insert_client(mock_client!(
            aws_sdk_s3,
            RuleMode::Sequential,
            &[&forbidden, &missing]
        ));
        assert!(lib.does_bucket_exist("someone-elses").await.expect("403"));
        assert!(!lib.does_bucket_exist("nobody").await.expect("404"));
    }

    #[tokio::test]
    async fn put_bucket_policy_missing_bucket_tests() {
        let lib = new_lib("[aws]\ncf_identity = \"E123\"\n", false);
        let (puts, seen) = counter();
        let head_bucket = mock!(aws_sdk_s3::Client::head_bucket)
            .then_error(|| HeadBucketError::NotFound(NotFound::builder().build()));
        let put_policy = mock!(aws_sdk_s3::Client::put_bucket_policy)
            .match_requests(move |_| {
                puts.fetch_add(1, Ordering::SeqCst);
                true
            })
            .then_output(|| PutBucketPolicyOutput::builder().build());
        lib.insert_client(mock_client!(
            aws_sdk_s3,
            RuleMode::MatchAny,
            &[&head_bucket, &put_policy]
        ));
        assert!(!lib.put_bucket_policy("gone").await.expect("missing bucket"));
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }

    #[cfg(feature = "cognito")]
    async fn auth_parameters(toml: &str) -> HashMap<String, String> {
        use aws_sdk_cognitoidentityprovider::operation::admin_initiate_auth::AdminInitiateAuthOutput;

        let lib = new_lib(toml, false);
        let seen = Arc::new(Mutex::new(HashMap::new()));
        let params = seen.clone();
        let initiate = mock!(aws_sdk_cognitoidentityprovider::Client::admin_initiate_auth)
            .match_requests(move |r| {
                if let (Ok(mut params), Some(auth)) = (params.lock(), r.auth_parameters()) {
                    params.clone_from(auth);
                }
                r.client_id() == Some("client123")
            })
            .then_output(|| AdminInitiateAuthOutput::builder().build());
        lib.insert_client(mock_client!(
            aws_sdk_cognitoidentityprovider,
            RuleMode::Sequential,
            &[&initiate]
        ));
        lib.admin_initiate_auth("alice", "hunter2")
            .await
            .expect("admin_initiate_auth");
        let params = seen.lock().expect("params").clone();
        params
    }

    #[cfg(feature = "cognito")]
    #[tokio::test]
    async fn admin_initiate_auth_tests() {
        let with_secret = auth_parameters(
            "[cognito]\nclient_id = \"client123\"\nclient_secret = \"secret\"\nuser_pool_id = \"pool\"\n",
        )
        .await;
        assert_eq!(with_secret.get("USERNAME").map(String::as_str), Some("alice"));
        assert_eq!(
            with_secret.get("SECRET_HASH").map(String::as_str),
            Some("oKHO337pkuh1r3zUNCZ1oCL3YgM0Yi2nkcAZsKQTIH8=")
        );

        let without_secret =
            auth_parameters("[cognito]\nclient_id = \"client123\"\nuser_pool_id = \"pool\"\n")
                .await;
        assert_eq!(without_secret.get("PASSWORD").map(String::as_str), Some("hunter2"));
        assert!(!without_secret.contains_key("SECRET_HASH"));
    }

    #[tokio::test]
    async fn athena_query_tests() {
        let lib = new_lib("[aws]\n", false);
        let start = mock!(aws_sdk_athena::Client::start_query_execution)
            .match_requests(|r| {
                let context = r.query_execution_context();
                let results = r.result_configuration();
                r.query_string() == Some("SELECT 1")
                    && context.and_then(|c| c.catalog()) == Some("AwsDataCatalog")
                    && context.and_then(|c| c.database()) == Some("logs")
                    && results.and_then(|c| c.output_location()) == Some("s3://results/")
                    && results
                        .and_then(|c| c.encryption_configuration())
                        .map(|e| e.encryption_option())
                        == Some(&EncryptionOption::SseS3)
            })
            .then_output(|| {
                StartQueryExecutionOutput::builder()
                    .query_execution_id("q-1")
                    .build()
            });
        let get = mock!(aws_sdk_athena::Client::get_query_execution)
            .match_requests(|r| r.query_execution_id() == Some("q-1"))
            .then_output(|| {
                GetQueryExecutionOutput::builder()
                    .query_execution(
                        QueryExecution::builder()
                            .query_execution_id("q-1")
                            .status(
                                QueryExecutionStatus::builder()
                                    .state(QueryExecutionState::Succeeded)
                                    .build(),
                            )
                            .build(),
                    )
                    .build()
            });
        lib.insert_client(mock_client!(
            aws_sdk_athena,
            RuleMode::Sequential,
            &[&start, &get]
        ));

        assert!(matches!(
            lib.start_query_execution(QueryParams::default()).await,
            Err(Error::Invalid(Service::Athena, _))
        ));
        let id = lib
            .start_query_execution(QueryParams {
                sql: "SELECT 1".to_owned(),
                database: "logs".to_owned(),
                catalog: None,
                output_location: "s3://results/".to_owned(),
            })
            .await
            .expect("start");
        assert_eq!(id, "q-1");
        let execution = lib
            .get_query_execution(&id)
            .await
            .expect("get")
            .expect("execution");
        assert_eq!(
            execution.status().and_then(|s| s.state()),
            Some(&QueryExecutionState::Succeeded)
        );
    }

    #[tokio::test]
    async fn ses_send_raw_email_tests() {
        let lib = new_lib("[aws]\n", false);
        let raw = b"Subject: hi\r\n\r\nhello".to_vec();
        let expected = raw.clone();
        let addressed = mock!(aws_sdk_ses::Client::send_raw_email)
            .match_requests(move |r| {
                r.source() == Some("noreply@example.com")
                    && r.destinations.as_deref()
                        == Some(&["a@example.com".to_owned(), "b@example.com".to_owned()][..])
                    && r.raw_message().map(|m| m.data().as_ref()) == Some(&expected[..])
            })
            .then_output(|| {
                SendRawEmailOutput::builder()
                    .message_id("ses-1")
                    .build()
                    .expect("output")
            });
        let from_headers = mock!(aws_sdk_ses::Client::send_raw_email)
            .match_requests(|r| r.source().is_none() && r.destinations.is_none())
            .then_output(|| {
                SendRawEmailOutput::builder()
                    .message_id("ses-2")
                    .build()
                    .expect("output")
            });
        lib.insert_client(mock_client!(
            aws_sdk_ses,
            RuleMode::Sequential,
            &[&addressed, &from_headers]
        ));

        let destinations = parse_destinations(" a@example.com, b@example.com,");
        assert_eq!(destinations, ["a@example.com", "b@example.com"]);
        let id = lib
            .send_raw_email(raw.clone(), Some("noreply@example.com"), &destinations)
            .await
            .expect("addressed");
        assert_eq!(id, "ses-1");
        let id = lib
            .send_raw_email(raw, Some(""), &[])
            .await
            .expect("from headers");
        assert_eq!(id, "ses-2");
    }
}
