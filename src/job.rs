use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum_macros::EnumString;
use tokio::time::Instant;

use crate::error::{Error, Result, TransportError};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    strum_macros::Display,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    NotSubmitted,
    Starting,
    Enqueued,
    Running,
    Completed,
    Canceled,
    CancellationRequested,
    Failed,
}

impl JobState {
    /// No transition leaves a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Canceled | JobState::Failed
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub job_state: JobState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,
}

impl JobStatus {
    pub fn new(job_state: JobState) -> Self {
        Self {
            job_state,
            error_message: None,
            query_type: None,
            started_at: None,
            ended_at: None,
            row_count: None,
        }
    }

    pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }
}

/// Arrow type names reported in the result schema. Names this enum does not list are kept
/// verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldTypeName {
    Struct,
    List,
    Union,
    Integer,
    Bigint,
    Float,
    Double,
    Varchar,
    Varbinary,
    Boolean,
    Decimal,
    Time,
    Date,
    Timestamp,
    #[serde(rename = "INTERVAL DAY TO SECOND")]
    IntervalDayToSecond,
    #[serde(rename = "INTERVAL YEAR TO MONTH")]
    IntervalYearToMonth,
    #[serde(untagged)]
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldType {
    pub name: FieldTypeName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_schema: Option<Vec<Field>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub r#type: FieldType,
}

/// Rows and column schema of a completed job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResults {
    pub row_count: u64,
    #[serde(default)]
    pub schema: Vec<Field>,
    #[serde(default)]
    pub rows: Vec<serde_json::Map<String, serde_json::Value>>,
}

/// A job accepted by the query service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    id: String,
    sql: String,
}

impl JobHandle {
    pub fn new(id: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            sql: sql.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The submitted SQL, kept for diagnostics.
    pub fn sql(&self) -> &str {
        &self.sql
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub poll_interval: Duration,
    pub page: Page,
    /// Bounds the total wait. Checked between polls only, so the actual wait can
    /// exceed it by up to one `poll_interval`.
    pub timeout: Option<Duration>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            page: Page::default(),
            timeout: None,
        }
    }
}

#[async_trait]
pub trait JobStatusSource: Send + Sync {
    async fn fetch_status(&self, job_id: &str) -> std::result::Result<JobStatus, TransportError>;

    /// Only valid once `fetch_status` reported [`JobState::Completed`].
    async fn fetch_result(
        &self,
        job_id: &str,
        page: &Page,
    ) -> std::result::Result<JobResults, TransportError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Wait,
    FetchResults,
    Fail(Option<String>),
    TimedOut,
}

fn next_step(status: &JobStatus, elapsed: Duration, timeout: Option<Duration>) -> Step {
    match status.job_state {
        JobState::Completed => Step::FetchResults,
        JobState::Failed | JobState::Canceled => Step::Fail(
            status
                .error_message
                .clone()
                .filter(|message| !message.is_empty()),
        ),
        _ if timeout.is_some_and(|timeout| elapsed > timeout) => Step::TimedOut,
        _ => Step::Wait,
    }
}

/// Polls a submitted job until it reaches a terminal state.
///
/// Reaching the timeout only stops the local wait, the remote job is left running.
pub struct JobTracker<'a, S: ?Sized> {
    source: &'a S,
}

impl<'a, S: JobStatusSource + ?Sized> JobTracker<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }

    pub async fn run_to_completion(
        &self,
        job: &JobHandle,
        options: &RunOptions,
    ) -> Result<JobResults> {
        let start = Instant::now();
        loop {
            tokio::time::sleep(options.poll_interval).await;
            let status = self.source.fetch_status(job.id()).await?;
            let elapsed = start.elapsed();
            log::debug!(
                "Job {} is {} after {:.2?}",
                job.id(),
                status.job_state,
                elapsed
            );

            match next_step(&status, elapsed, options.timeout) {
                Step::Wait => {}
                Step::FetchResults => {
                    return Ok(self.source.fetch_result(job.id(), &options.page).await?);
                }
                Step::Fail(message) => return Err(Error::JobFailed { message }),
                Step::TimedOut => {
                    return Err(Error::Timeout {
                        elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                        sql: job.sql().to_owned(),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    const SECOND: Duration = Duration::from_secs(1);

    #[test]
    fn test_terminal_states() {
        let terminal = [JobState::Completed, JobState::Canceled, JobState::Failed];
        for state in [
            JobState::NotSubmitted,
            JobState::Starting,
            JobState::Enqueued,
            JobState::Running,
            JobState::Completed,
            JobState::Canceled,
            JobState::CancellationRequested,
            JobState::Failed,
        ] {
            assert_eq!(state.is_terminal(), terminal.contains(&state), "{}", state);
        }
    }

    #[test]
    fn test_state_names() {
        assert_eq!(
            JobState::from_str("CANCELLATION_REQUESTED").unwrap(),
            JobState::CancellationRequested
        );
        assert_eq!(JobState::NotSubmitted.to_string(), "NOT_SUBMITTED");
    }

    #[test]
    fn test_next_step() {
        let running = JobStatus::new(JobState::Running);
        assert_eq!(next_step(&running, SECOND, None), Step::Wait);
        assert_eq!(next_step(&running, SECOND, Some(SECOND)), Step::Wait);
        assert_eq!(
            next_step(&running, SECOND + Duration::from_millis(1), Some(SECOND)),
            Step::TimedOut
        );
        let enqueued = JobStatus::new(JobState::Enqueued);
        assert_eq!(
            next_step(&enqueued, 2 * SECOND, Some(SECOND)),
            Step::TimedOut
        );

        let completed = JobStatus::new(JobState::Completed);
        assert_eq!(
            next_step(&completed, 2 * SECOND, Some(SECOND)),
            Step::FetchResults
        );

        let failed = JobStatus::new(JobState::Failed).with_error_message("boom");
        assert_eq!(
            next_step(&failed, 2 * SECOND, Some(SECOND)),
            Step::Fail(Some("boom".to_owned()))
        );
        let canceled = JobStatus::new(JobState::Canceled).with_error_message("");
        assert_eq!(next_step(&canceled, SECOND, None), Step::Fail(None));
    }

    #[test]
    fn test_decode_job_status() {
        let status: JobStatus = serde_json::from_str(
            r#"{
                "jobState": "FAILED",
                "queryType": "REST",
                "startedAt": "2018-03-12T10:00:00.000Z",
                "endedAt": "2018-03-12T10:00:01.000Z",
                "errorMessage": "Table 'nope' not found"
            }"#,
        )
        .unwrap();
        assert_eq!(status.job_state, JobState::Failed);
        assert_eq!(status.error_message.as_deref(), Some("Table 'nope' not found"));
        assert_eq!(status.row_count, None);
    }

    #[test]
    fn test_decode_job_results() {
        let results: JobResults = serde_json::from_str(
            r#"{
                "rowCount": 1,
                "schema": [
                    {"name": "id", "type": {"name": "BIGINT"}},
                    {"name": "price", "type": {"name": "DECIMAL", "precision": 10, "scale": 2}},
                    {"name": "span", "type": {"name": "INTERVAL DAY TO SECOND"}},
                    {"name": "geo", "type": {"name": "GEOMETRY"}}
                ],
                "rows": [{"id": 1, "price": 9.99, "span": null, "geo": null}]
            }"#,
        )
        .unwrap();
        assert_eq!(results.row_count, 1);
        let type_names = results
            .schema
            .iter()
            .map(|field| field.r#type.name.clone())
            .collect::<Vec<_>>();
        assert_eq!(
            type_names,
            vec![
                FieldTypeName::Bigint,
                FieldTypeName::Decimal,
                FieldTypeName::IntervalDayToSecond,
                FieldTypeName::Other("GEOMETRY".to_owned())
            ]
        );
        let geo = serde_json::to_value(&results.schema[3]).unwrap();
        assert_eq!(geo["type"]["name"], "GEOMETRY");
        assert_eq!(results.schema[1].r#type.scale, Some(2));
        assert_eq!(results.rows[0]["id"], serde_json::json!(1));
    }
}
