use std::sync::{
    Mutex,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::TransportError;
use crate::job::{JobResults, JobStatus, JobStatusSource, Page};

pub const PARSING_TESTS_FILE: &str = "tests/parsing_tests.toml";
pub const REFERENCES_TESTS_FILE: &str = "tests/references_tests.toml";

#[derive(Deserialize, Debug, Clone)]
pub struct TestParsing {
    pub sql: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct TestParsingData {
    pub tests: Vec<TestParsing>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct TestReferences {
    pub sql: String,
    pub references: Vec<Vec<String>>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct TestReferencesData {
    pub tests: Vec<TestReferences>,
}

/// Job source replaying a fixed list of statuses. The last one repeats forever.
pub struct ScriptedStatusSource {
    statuses: Vec<std::result::Result<JobStatus, u16>>,
    results: JobResults,
    result_error: Option<u16>,
    status_calls: AtomicUsize,
    result_calls: AtomicUsize,
    last_page: Mutex<Option<Page>>,
}

impl ScriptedStatusSource {
    pub fn new(statuses: Vec<JobStatus>, results: JobResults) -> Self {
        Self {
            statuses: statuses.into_iter().map(Ok).collect(),
            results,
            result_error: None,
            status_calls: AtomicUsize::new(0),
            result_calls: AtomicUsize::new(0),
            last_page: Mutex::new(None),
        }
    }

    /// Replies to the status poll number `poll` (zero based) with an HTTP error.
    pub fn with_remote_error(mut self, poll: usize, status: u16) -> Self {
        self.statuses.insert(poll.min(self.statuses.len()), Err(status));
        self
    }

    /// Replies to every result fetch with an HTTP error.
    pub fn with_result_error(mut self, status: u16) -> Self {
        self.result_error = Some(status);
        self
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn result_calls(&self) -> usize {
        self.result_calls.load(Ordering::SeqCst)
    }

    /// Page of the last result fetch.
    pub fn last_page(&self) -> Option<Page> {
        self.last_page.lock().ok().and_then(|page| *page)
    }
}

#[async_trait]
impl JobStatusSource for ScriptedStatusSource {
    async fn fetch_status(&self, _job_id: &str) -> std::result::Result<JobStatus, TransportError> {
        let call = self.status_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self
            .statuses
            .get(call)
            .or_else(|| self.statuses.last())
            .ok_or_else(|| TransportError::Remote {
                status: 404,
                message: "no scripted status".to_owned(),
            })?;
        match scripted {
            Ok(status) => Ok(status.clone()),
            Err(status) => Err(TransportError::Remote {
                status: *status,
                message: "scripted failure".to_owned(),
            }),
        }
    }

    async fn fetch_result(
        &self,
        _job_id: &str,
        page: &Page,
    ) -> std::result::Result<JobResults, TransportError> {
        self.result_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last_page) = self.last_page.lock() {
            *last_page = Some(*page);
        }
        match self.result_error {
            Some(status) => Err(TransportError::Remote {
                status,
                message: "scripted failure".to_owned(),
            }),
            None => Ok(self.results.clone()),
        }
    }
}
