//! Merge request lifecycle aggregate.
//!
//! Keeps the last known status of every merge request of one project and
//! turns poll results into a minimal stream of transition events:
//! - An MR seen opened for the first time yields `Opened`
//! - A tracked opened MR seen closed, locked or merged yields `Finalized`
//! - Everything else is a no-op, so repeated polls are idempotent
//!
//! State lives in memory only and entries are never evicted. Long-running
//! hosts that care about growth must recreate the aggregate.

use crate::error::AppError;
use crate::models::{
    MergeRequestEvent, MergeRequestFinalizedEvent, MergeRequestId, MergeRequestOpenedEvent,
    MergeRequestSnapshot, MergeRequestStatus, ProjectId,
};
use crate::services::merge_request_source::MergeRequestSource;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How far back each poll looks for updated merge requests.
pub const POLL_LOOKBACK_SECS: i64 = 30;

/// What to do when a finalized merge request is reported opened again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReopenPolicy {
    /// Finalized is terminal: a reopened MR produces no further events.
    #[default]
    Ignore,

    /// A reopened MR is tracked again and emits a fresh `Opened` event.
    EmitOpened,
}

/// Lower bound of the `updated_after` window for a poll at `now`.
///
/// Clamped to the earliest representable time.
pub fn lookback_boundary(now: DateTime<Utc>) -> DateTime<Utc> {
    now.checked_sub_signed(Duration::seconds(POLL_LOOKBACK_SECS))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Lifecycle state of the merge requests of a single project.
///
/// Not shareable between tasks: `poll` takes `&mut self`, so one owner
/// drives it (see `PollEngine`).
#[derive(Debug)]
pub struct MergeRequestLifecycleAggregate<S> {
    project_id: ProjectId,
    source: S,
    reopen_policy: ReopenPolicy,
    statuses: HashMap<MergeRequestId, MergeRequestStatus>,
}

impl<S> MergeRequestLifecycleAggregate<S> {
    /// Create an aggregate with no tracked merge requests.
    pub fn new(project_id: ProjectId, source: S) -> Self {
        Self {
            project_id,
            source,
            reopen_policy: ReopenPolicy::default(),
            statuses: HashMap::new(),
        }
    }

    pub fn with_reopen_policy(mut self, reopen_policy: ReopenPolicy) -> Self {
        self.reopen_policy = reopen_policy;
        self
    }

    pub fn project_id(&self) -> ProjectId {
        self.project_id
    }

    pub fn reopen_policy(&self) -> ReopenPolicy {
        self.reopen_policy
    }

    /// Last status recorded for a merge request, if it was ever tracked.
    pub fn status_of(&self, merge_request_id: MergeRequestId) -> Option<MergeRequestStatus> {
        self.statuses.get(&merge_request_id).copied()
    }

    /// Number of merge requests tracked so far.
    pub fn tracked_count(&self) -> usize {
        self.statuses.len()
    }

    /// Apply a previously emitted event.
    ///
    /// Always overwrites the recorded status. Events that do not fit the
    /// current state are logged but never rejected; the next poll reconciles.
    pub fn apply(&mut self, event: &MergeRequestEvent) {
        let previous = self.status_of(event.merge_request_id());

        match event {
            MergeRequestEvent::Opened(ev) => {
                if let Some(status) = previous {
                    log::warn!(
                        "Project {}: opened event for MR {} already tracked as {}",
                        self.project_id,
                        ev.merge_request_id,
                        status
                    );
                }
            }
            MergeRequestEvent::Finalized(ev) => {
                if previous.is_none() {
                    log::warn!(
                        "Project {}: {} event for MR {} that was never opened",
                        self.project_id,
                        ev.status,
                        ev.merge_request_id
                    );
                }
            }
        }

        self.record(event);
    }

    /// Apply a sequence of events in order.
    pub fn replay<'a, I>(&mut self, events: I)
    where
        I: IntoIterator<Item = &'a MergeRequestEvent>,
    {
        for event in events {
            self.apply(event);
        }
    }

    fn record(&mut self, event: &MergeRequestEvent) {
        let status = match event {
            MergeRequestEvent::Opened(_) => MergeRequestStatus::Opened,
            MergeRequestEvent::Finalized(ev) => ev.status,
        };
        self.statuses.insert(event.merge_request_id(), status);
    }

    /// Decide which event, if any, a snapshot produces against current state.
    fn transition(&self, mr: &MergeRequestSnapshot) -> Option<MergeRequestEvent> {
        let opened = || {
            MergeRequestEvent::Opened(MergeRequestOpenedEvent {
                merge_request_id: mr.id,
                project_id: self.project_id,
                date_time: mr.created_at,
            })
        };

        match (mr.status, self.status_of(mr.id)) {
            (MergeRequestStatus::Opened, None) => Some(opened()),
            (MergeRequestStatus::Opened, Some(last))
                if last.is_finalized() && self.reopen_policy == ReopenPolicy::EmitOpened =>
            {
                Some(opened())
            }
            (MergeRequestStatus::Opened, Some(_)) => None,
            (status, Some(MergeRequestStatus::Opened)) => {
                Some(MergeRequestEvent::Finalized(MergeRequestFinalizedEvent {
                    merge_request_id: mr.id,
                    project_id: self.project_id,
                    date_time: mr.updated_at,
                    status,
                }))
            }
            // Unknown, or already finalized.
            (_, _) => None,
        }
    }
}

impl<S: MergeRequestSource> MergeRequestLifecycleAggregate<S> {
    /// Fetch merge requests updated in the lookback window before `now` and
    /// return the transitions they reveal, in source order.
    ///
    /// `Ok(vec![])` means nothing changed. A failed query returns the error
    /// and leaves state untouched.
    pub async fn poll(&mut self, now: DateTime<Utc>) -> Result<Vec<MergeRequestEvent>, AppError> {
        let updated_after = lookback_boundary(now);

        let snapshots = self
            .source
            .list_merge_requests(self.project_id, updated_after)
            .await?;

        log::debug!(
            "Project {}: {} MR(s) updated since {}",
            self.project_id,
            snapshots.len(),
            updated_after
        );

        let mut events = Vec::new();
        for mr in &snapshots {
            if let Some(event) = self.transition(mr) {
                log::info!(
                    "Project {}: MR {} {} -> {}",
                    self.project_id,
                    mr.id,
                    event.name(),
                    mr.status
                );
                self.record(&event);
                events.push(event);
            }
        }

        Ok(events)
    }
}
