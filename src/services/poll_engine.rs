//! Background poll engine for merge request lifecycle detection.
//!
//! This module drives a lifecycle aggregate on a schedule:
//! - Polls immediately on start, then at a configurable interval
//! - Forwards emitted events, in order, to an mpsc channel
//! - Accepts manual trigger and stop commands through a `PollHandle`
//!
//! A failed poll is logged and recorded in `PollStatus`; the engine does not
//! retry and simply polls again on the next tick.

use crate::error::AppError;
use crate::models::MergeRequestEvent;
use crate::services::merge_request_source::MergeRequestSource;
use crate::services::mr_lifecycle::MergeRequestLifecycleAggregate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{self, MissedTickBehavior};

/// Default poll interval in seconds.
///
/// Half the lookback window, so consecutive windows overlap.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 15;

/// Poll engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Poll interval in seconds.
    pub interval_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_POLL_INTERVAL_SECS,
        }
    }
}

impl PollConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.interval_secs == 0 {
            return Err(AppError::invalid_input_field(
                "Poll interval must be at least one second",
                "interval_secs",
            ));
        }
        Ok(())
    }
}

/// Status of the poll engine.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PollStatus {
    /// Whether a poll is currently running.
    pub is_polling: bool,

    /// Reference time of the last completed poll.
    pub last_poll_time: Option<DateTime<Utc>>,

    /// Error of the last poll, cleared by the next successful one.
    pub last_error: Option<String>,

    /// Number of events emitted by the last poll.
    pub last_event_count: usize,

    /// Number of events emitted since start.
    pub total_events: u64,
}

/// Commands that can be sent to the poll engine.
#[derive(Debug)]
pub enum PollCommand {
    /// Poll immediately.
    TriggerPoll,

    /// Stop the poll engine.
    Stop,
}

/// Lightweight handle for controlling the background poll engine.
///
/// The engine stops once every handle is dropped.
#[derive(Debug, Clone)]
pub struct PollHandle {
    command_tx: mpsc::Sender<PollCommand>,
    status: Arc<RwLock<PollStatus>>,
}

impl PollHandle {
    /// Trigger an immediate poll.
    pub async fn trigger_poll(&self) -> Result<(), AppError> {
        self.command_tx
            .send(PollCommand::TriggerPoll)
            .await
            .map_err(|_| AppError::internal("Poll engine not running"))
    }

    /// Stop the poll engine.
    pub async fn stop(&self) -> Result<(), AppError> {
        self.command_tx
            .send(PollCommand::Stop)
            .await
            .map_err(|_| AppError::internal("Poll engine not running"))
    }

    /// Get the current status.
    pub async fn status(&self) -> PollStatus {
        self.status.read().await.clone()
    }
}

/// Background poll engine owning one lifecycle aggregate.
pub struct PollEngine<S> {
    aggregate: MergeRequestLifecycleAggregate<S>,
    status: Arc<RwLock<PollStatus>>,
    events_tx: mpsc::Sender<MergeRequestEvent>,
}

impl<S> PollEngine<S>
where
    S: MergeRequestSource + Send + Sync + 'static,
{
    /// Start the background poll loop.
    ///
    /// Spawns a task that owns the aggregate and polls it at the configured
    /// interval. Must be called within a tokio runtime.
    pub fn start_background(
        aggregate: MergeRequestLifecycleAggregate<S>,
        config: PollConfig,
        events_tx: mpsc::Sender<MergeRequestEvent>,
    ) -> Result<PollHandle, AppError> {
        config.validate()?;

        let (command_tx, mut command_rx) = mpsc::channel::<PollCommand>(16);
        let status = Arc::new(RwLock::new(PollStatus::default()));

        let mut engine = PollEngine {
            aggregate,
            status: status.clone(),
            events_tx,
        };

        tokio::spawn(async move {
            let project_id = engine.aggregate.project_id();
            log::info!(
                "Poll engine started for project {}, interval={}s",
                project_id,
                config.interval_secs
            );

            // The first tick completes immediately, giving the initial poll.
            let mut interval = time::interval(Duration::from_secs(config.interval_secs));
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if !engine.run_poll().await {
                            break;
                        }
                    }
                    cmd = command_rx.recv() => {
                        match cmd {
                            Some(PollCommand::TriggerPoll) => {
                                log::debug!("Manual poll triggered for project {}", project_id);
                                if !engine.run_poll().await {
                                    break;
                                }
                            }
                            Some(PollCommand::Stop) | None => break,
                        }
                    }
                }
            }
            log::info!("Poll engine stopped for project {}", project_id);
        });

        Ok(PollHandle { command_tx, status })
    }

    /// Run a single poll and forward its events.
    ///
    /// Returns `false` once the event receiver has gone away.
    async fn run_poll(&mut self) -> bool {
        self.status.write().await.is_polling = true;

        let now = Utc::now();
        let result = self.aggregate.poll(now).await;

        let events = {
            let mut status = self.status.write().await;
            status.is_polling = false;
            status.last_poll_time = Some(now);

            match result {
                Ok(events) => {
                    status.last_error = None;
                    status.last_event_count = events.len();
                    status.total_events += events.len() as u64;
                    events
                }
                Err(e) => {
                    log::warn!(
                        "Poll failed for project {}: {}",
                        self.aggregate.project_id(),
                        e
                    );
                    status.last_error = Some(e.to_string());
                    status.last_event_count = 0;
                    Vec::new()
                }
            }
        };

        for event in events {
            if self.events_tx.send(event).await.is_err() {
                log::warn!(
                    "Event receiver dropped for project {}",
                    self.aggregate.project_id()
                );
                return false;
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MergeRequestId, MergeRequestStatus, ProjectId};
    use crate::services::test_utils::{snapshot, ScriptedSource};
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    fn hourly() -> PollConfig {
        PollConfig {
            interval_secs: 3600,
        }
    }

    async fn wait_for_first_poll(handle: &PollHandle) -> PollStatus {
        timeout(WAIT, async {
            loop {
                let status = handle.status().await;
                if status.last_poll_time.is_some() && !status.is_polling {
                    return status;
                }
                time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = PollConfig::default();
        assert_eq!(config.interval_secs, DEFAULT_POLL_INTERVAL_SECS);
        assert!(config.validate().is_ok());

        let parsed: PollConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let aggregate =
            MergeRequestLifecycleAggregate::new(ProjectId(42), ScriptedSource::default());
        let (events_tx, _events_rx) = mpsc::channel(8);

        let config = PollConfig { interval_secs: 0 };
        let err = PollEngine::start_background(aggregate, config, events_tx).unwrap_err();

        assert!(matches!(err, AppError::InvalidInput { .. }));
    }

    #[test]
    fn test_poll_status_initial() {
        let status = PollStatus::default();

        assert!(!status.is_polling);
        assert!(status.last_poll_time.is_none());
        assert_eq!(status.total_events, 0);
    }

    #[tokio::test]
    async fn test_initial_poll_forwards_events() {
        let source = ScriptedSource::default()
            .respond(Ok(vec![snapshot(73, 123, 456, MergeRequestStatus::Opened)]));
        let aggregate = MergeRequestLifecycleAggregate::new(ProjectId(42), source);
        let (events_tx, mut events_rx) = mpsc::channel(8);

        let handle = PollEngine::start_background(aggregate, hourly(), events_tx).unwrap();

        let event = timeout(WAIT, events_rx.recv()).await.unwrap().unwrap();
        assert_eq!(event.merge_request_id(), MergeRequestId(73));
        assert_eq!(event.project_id(), ProjectId(42));

        let status = handle.status().await;
        assert_eq!(status.last_event_count, 1);
        assert_eq!(status.total_events, 1);
        assert!(status.last_error.is_none());
    }

    #[tokio::test]
    async fn test_failed_poll_is_recorded_and_engine_keeps_running() {
        let source = ScriptedSource::default()
            .respond(Err(AppError::gitlab_api_full(
                "Rate limit exceeded",
                429,
                "/projects/42/merge_requests",
            )))
            .respond(Ok(vec![snapshot(74, 678, 700, MergeRequestStatus::Opened)]));
        let aggregate = MergeRequestLifecycleAggregate::new(ProjectId(42), source);
        let (events_tx, mut events_rx) = mpsc::channel(8);

        let handle = PollEngine::start_background(aggregate, hourly(), events_tx).unwrap();

        let status = wait_for_first_poll(&handle).await;
        assert!(status.last_error.unwrap().contains("Rate limit exceeded"));
        assert_eq!(status.total_events, 0);

        handle.trigger_poll().await.unwrap();
        let event = timeout(WAIT, events_rx.recv()).await.unwrap().unwrap();
        assert_eq!(event.merge_request_id(), MergeRequestId(74));
        assert!(handle.status().await.last_error.is_none());
    }

    #[tokio::test]
    async fn test_stop_command_stops_engine() {
        let aggregate =
            MergeRequestLifecycleAggregate::new(ProjectId(42), ScriptedSource::default());
        let (events_tx, mut events_rx) = mpsc::channel(8);

        let handle = PollEngine::start_background(aggregate, hourly(), events_tx).unwrap();
        handle.stop().await.unwrap();

        // The sender is dropped together with the engine.
        assert!(timeout(WAIT, events_rx.recv()).await.unwrap().is_none());
        assert!(matches!(
            handle.trigger_poll().await,
            Err(AppError::Internal { .. })
        ));
    }

    #[tokio::test]
    async fn test_engine_stops_when_receiver_dropped() {
        let source = ScriptedSource::default()
            .respond(Ok(vec![snapshot(73, 123, 456, MergeRequestStatus::Opened)]));
        let aggregate = MergeRequestLifecycleAggregate::new(ProjectId(42), source);
        let (events_tx, events_rx) = mpsc::channel(8);
        drop(events_rx);

        let handle = PollEngine::start_background(aggregate, hourly(), events_tx).unwrap();

        let stopped = timeout(WAIT, async {
            while handle.trigger_poll().await.is_ok() {
                time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(stopped.is_ok());
    }

    #[tokio::test]
    async fn test_engine_stops_when_all_handles_dropped() {
        let aggregate =
            MergeRequestLifecycleAggregate::new(ProjectId(42), ScriptedSource::default());
        let (events_tx, mut events_rx) = mpsc::channel(8);

        let handle = PollEngine::start_background(aggregate, hourly(), events_tx).unwrap();
        let second = handle.clone();
        drop(handle);
        drop(second);

        // The sender is dropped together with the engine.
        assert!(timeout(WAIT, events_rx.recv()).await.unwrap().is_none());
    }
}
