// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: LGPL-3.0-or-later

use super::aws_lib::AwsLib;
use crate::common::{Error, Service};
use aws_sdk_batch::operation::cancel_job::CancelJobOutput;
use aws_sdk_batch::operation::deregister_job_definition::DeregisterJobDefinitionOutput;
use aws_sdk_batch::operation::describe_job_queues::DescribeJobQueuesOutput;
use aws_sdk_batch::operation::list_jobs::ListJobsOutput;
use aws_sdk_batch::operation::register_job_definition::RegisterJobDefinitionOutput;
use aws_sdk_batch::operation::submit_job::SubmitJobOutput;
use aws_sdk_batch::operation::terminate_job::TerminateJobOutput;
use aws_sdk_batch::types::{
    ContainerOverrides, ContainerProperties, JobDefinitionType, JobDetail, JobStatus,
    RetryStrategy,
};
use std::collections::HashMap;
use tracing::warn;

/// A convenient alias for Batch client so consuming code doesn't need to add it to `Cargo.toml`
pub type BatchClient = aws_sdk_batch::Client;

/// `DescribeJobs` accepts at most this many ids.
const DESCRIBE_JOBS_LIMIT: usize = 100;

/// A job definition to register.
#[derive(Clone, Debug)]
pub struct JobDefinition {
    /// Name; registering it again creates a new revision.
    pub name: String,
    /// Container or multi-node.
    pub kind: JobDefinitionType,
    /// Image, command and resources.
    pub container_properties: Option<ContainerProperties>,
    /// Default parameter substitutions.
    pub parameters: Option<HashMap<String, String>>,
    /// Attempts before the job fails.
    pub retry_strategy: Option<RetryStrategy>,
}

/// A job to submit.
#[derive(Clone, Debug, Default)]
pub struct JobSubmission {
    /// Job name.
    pub job_name: String,
    /// Queue name or ARN.
    pub job_queue: String,
    /// Definition `name[:revision]` or ARN.
    pub job_definition: String,
    /// Parameter substitutions.
    pub parameters: Option<HashMap<String, String>>,
    /// Command and environment overrides.
    pub container_overrides: Option<ContainerOverrides>,
}

/// Result of `describe_jobs`: the jobs of every chunk that succeeded, plus one error per
/// chunk that failed.
#[derive(Debug, Default)]
pub struct DescribedJobs {
    /// Jobs found.
    pub jobs: Vec<JobDetail>,
    /// Failed chunks.
    pub errors: Vec<Error>,
}

/// Parses a job status such as `RUNNING`.
pub fn parse_job_status(status: &str) -> Option<JobStatus> {
    JobStatus::values()
        .iter()
        .any(|known| *known == status)
        .then(|| JobStatus::from(status))
}

impl AwsLib {
    async fn batch(&self) -> BatchClient {
        self.client().await
    }

    /// Describes job queues.
    pub async fn describe_job_queues(
        &self,
        queues: Vec<String>,
    ) -> Result<DescribeJobQueuesOutput, Error> {
        if queues.is_empty() {
            return Err(self.invalid(Service::Batch, "no job queues to describe"));
        }
        self.batch()
            .await
            .describe_job_queues()
            .set_job_queues(Some(queues))
            .send()
            .await
            .map_err(|e| self.sdk_error(Service::Batch, "describe_job_queues".to_owned(), e))
    }

    /// Registers a job definition.
    pub async fn register_job_definition(
        &self,
        definition: JobDefinition,
    ) -> Result<RegisterJobDefinitionOutput, Error> {
        let call = format!("register_job_definition({})", definition.name);
        self.batch()
            .await
            .register_job_definition()
            .job_definition_name(definition.name)
            .r#type(definition.kind)
            .set_container_properties(definition.container_properties)
            .set_parameters(definition.parameters)
            .set_retry_strategy(definition.retry_strategy)
            .send()
            .await
            .map_err(|e| self.sdk_error(Service::Batch, call, e))
    }

    /// Deregisters a job definition (`name:revision` or ARN).
    pub async fn deregister_job_definition(
        &self,
        definition: &str,
    ) -> Result<DeregisterJobDefinitionOutput, Error> {
        if definition.is_empty() {
            return Err(self.invalid(Service::Batch, "job definition is required"));
        }
        self.batch()
            .await
            .deregister_job_definition()
            .job_definition(definition)
            .send()
            .await
            .map_err(|e| {
                self.sdk_error(
                    Service::Batch,
                    format!("deregister_job_definition({definition})"),
                    e,
                )
            })
    }

    /// Submits a job.
    pub async fn submit_job(&self, job: JobSubmission) -> Result<SubmitJobOutput, Error> {
        let call = format!("submit_job({}, {})", job.job_name, job.job_queue);
        self.batch()
            .await
            .submit_job()
            .job_name(job.job_name)
            .job_queue(job.job_queue)
            .job_definition(job.job_definition)
            .set_parameters(job.parameters)
            .set_container_overrides(job.container_overrides)
            .send()
            .await
            .map_err(|e| self.sdk_error(Service::Batch, call, e))
    }

    /// Cancels a job that hasn't started.
    pub async fn cancel_job(&self, job_id: &str, reason: &str) -> Result<CancelJobOutput, Error> {
        if job_id.is_empty() || reason.is_empty() {
            return Err(self.invalid(Service::Batch, "job id and reason are required"));
        }
        self.batch()
            .await
            .cancel_job()
            .job_id(job_id)
            .reason(reason)
            .send()
            .await
            .map_err(|e| self.sdk_error(Service::Batch, format!("cancel_job({job_id})"), e))
    }

    /// Terminates a job, even if it is running.
    pub async fn terminate_job(
        &self,
        job_id: &str,
        reason: &str,
    ) -> Result<TerminateJobOutput, Error> {
        if job_id.is_empty() || reason.is_empty() {
            return Err(self.invalid(Service::Batch, "job id and reason are required"));
        }
        self.batch()
            .await
            .terminate_job()
            .job_id(job_id)
            .reason(reason)
            .send()
            .await
            .map_err(|e| self.sdk_error(Service::Batch, format!("terminate_job({job_id})"), e))
    }

    /// Lists one page of jobs in a queue with the given status.
    pub async fn list_jobs(
        &self,
        queue: &str,
        status: &str,
        max_results: i32,
        next_token: Option<String>,
    ) -> Result<ListJobsOutput, Error> {
        if queue.is_empty() {
            return Err(self.invalid(Service::Batch, "job queue is required"));
        }
        let Some(job_status) = parse_job_status(status) else {
            return Err(self.invalid(Service::Batch, format!("{status}: unknown job status")));
        };
        self.batch()
            .await
            .list_jobs()
            .job_queue(queue)
            .job_status(job_status)
            .max_results(max_results)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| self.sdk_error(Service::Batch, format!("list_jobs({queue}, {status})"), e))
    }

    /// Describes jobs, 100 ids per request. A failed request doesn't stop the others.
    pub async fn describe_jobs(&self, ids: &[String]) -> Result<DescribedJobs, Error> {
        if ids.is_empty() {
            return Err(self.invalid(Service::Batch, "no job ids to describe"));
        }
        let client = self.batch().await;
        let mut described = DescribedJobs::default();
        for chunk in ids.chunks(DESCRIBE_JOBS_LIMIT) {
            match client.describe_jobs().set_jobs(Some(chunk.to_vec())).send().await {
                Ok(output) => described.jobs.extend(output.jobs.unwrap_or_default()),
                Err(e) => {
                    let call = format!("describe_jobs({} ids)", chunk.len());
                    warn!("{call}: chunk failed, continuing");
                    described.errors.push(self.sdk_error(Service::Batch, call, e));
                }
            }
        }
        Ok(described)
    }
}
