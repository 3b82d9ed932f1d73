use std::time::Duration;

use dremio_sql::{
    error::{Error, TransportError},
    job::{JobHandle, JobResults, JobState, JobStatus, JobTracker, Page, RunOptions},
    test_utils::ScriptedStatusSource,
};
use tokio::time::Instant;

fn results() -> JobResults {
    serde_json::from_value(serde_json::json!({
        "rowCount": 2,
        "schema": [{"name": "id", "type": {"name": "INTEGER"}}],
        "rows": [{"id": 1}, {"id": 2}]
    }))
    .expect("Cannot decode job results")
}

fn statuses(states: &[JobState]) -> Vec<JobStatus> {
    states.iter().map(|state| JobStatus::new(*state)).collect()
}

fn job() -> JobHandle {
    JobHandle::new("1d2f-3a", "select id from space.t")
}

#[tokio::test(start_paused = true)]
async fn test_completes_after_running() {
    let source = ScriptedStatusSource::new(
        statuses(&[JobState::Running, JobState::Running, JobState::Completed]),
        results(),
    );
    let options = RunOptions {
        page: Page {
            offset: Some(0),
            limit: Some(100),
        },
        ..RunOptions::default()
    };

    let out = JobTracker::new(&source)
        .run_to_completion(&job(), &options)
        .await
        .unwrap();

    assert_eq!(out, results());
    assert_eq!(source.status_calls(), 3);
    assert_eq!(source.result_calls(), 1);
    assert_eq!(source.last_page(), Some(options.page));
}

#[tokio::test(start_paused = true)]
async fn test_waits_through_non_terminal_states() {
    let source = ScriptedStatusSource::new(
        statuses(&[
            JobState::NotSubmitted,
            JobState::Starting,
            JobState::Enqueued,
            JobState::Running,
            JobState::CancellationRequested,
            JobState::Completed,
        ]),
        results(),
    );

    let start = Instant::now();
    let out = JobTracker::new(&source)
        .run_to_completion(&job(), &RunOptions::default())
        .await;

    assert!(out.is_ok());
    assert_eq!(source.status_calls(), 6);
    // one poll interval before every status fetch
    assert!(start.elapsed() >= Duration::from_millis(60));
}

#[tokio::test(start_paused = true)]
async fn test_failed_job() {
    let mut script = statuses(&[JobState::Running]);
    script.push(JobStatus::new(JobState::Failed).with_error_message("boom"));
    let source = ScriptedStatusSource::new(script, results());

    let err = JobTracker::new(&source)
        .run_to_completion(&job(), &RunOptions::default())
        .await
        .unwrap_err();

    match err {
        Error::JobFailed { message } => assert_eq!(message.as_deref(), Some("boom")),
        err => panic!("Expected a failed job, got {:?}", err),
    }
    assert_eq!(source.status_calls(), 2);
    assert_eq!(source.result_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_no_results_for_unsuccessful_terminal_states() {
    for terminal in [
        JobStatus::new(JobState::Failed),
        JobStatus::new(JobState::Failed).with_error_message(""),
        JobStatus::new(JobState::Canceled),
        JobStatus::new(JobState::Canceled).with_error_message("Query cancelled by user"),
    ] {
        let expected = terminal.error_message.clone().filter(|m| !m.is_empty());
        let source = ScriptedStatusSource::new(vec![terminal], results());

        let err = JobTracker::new(&source)
            .run_to_completion(&job(), &RunOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::JobFailed { ref message } if *message == expected));
        assert_eq!(source.result_calls(), 0);
    }
}

#[tokio::test(start_paused = true)]
async fn test_timeout() {
    let source = ScriptedStatusSource::new(statuses(&[JobState::Running]), results());
    let options = RunOptions {
        poll_interval: Duration::from_millis(10),
        timeout: Some(Duration::from_secs(1)),
        ..RunOptions::default()
    };

    let start = Instant::now();
    let err = JobTracker::new(&source)
        .run_to_completion(&job(), &options)
        .await
        .unwrap_err();
    let waited = start.elapsed();

    match err {
        Error::Timeout { elapsed_ms, sql } => {
            assert!(elapsed_ms > 1000);
            assert_eq!(sql, "select id from space.t");
        }
        err => panic!("Expected a timeout, got {:?}", err),
    }
    assert!(waited > Duration::from_secs(1));
    assert!(waited <= Duration::from_millis(1020));
    assert!(source.status_calls() >= 1);
    assert_eq!(source.result_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_terminal_state_wins_over_timeout() {
    let source = ScriptedStatusSource::new(
        statuses(&[JobState::Running, JobState::Completed]),
        results(),
    );
    let options = RunOptions {
        poll_interval: Duration::from_millis(50),
        timeout: Some(Duration::from_millis(60)),
        ..RunOptions::default()
    };

    let out = JobTracker::new(&source)
        .run_to_completion(&job(), &options)
        .await;

    assert!(out.is_ok());
    assert_eq!(source.result_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_transport_error_propagates() {
    let source = ScriptedStatusSource::new(
        statuses(&[JobState::Running, JobState::Completed]),
        results(),
    )
    .with_remote_error(1, 503);

    let err = JobTracker::new(&source)
        .run_to_completion(&job(), &RunOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Transport(TransportError::Remote { status: 503, .. })
    ));
    assert_eq!(source.status_calls(), 2);
    assert_eq!(source.result_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_result_fetch_error_propagates() {
    let source = ScriptedStatusSource::new(statuses(&[JobState::Completed]), results())
        .with_result_error(500);

    let err = JobTracker::new(&source)
        .run_to_completion(&job(), &RunOptions::default())
        .await
        .unwrap_err();

    match err {
        Error::Transport(TransportError::Remote { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "scripted failure");
        }
        err => panic!("Expected a remote error, got {:?}", err),
    }
    assert_eq!(source.status_calls(), 1);
    assert_eq!(source.result_calls(), 1);
}
