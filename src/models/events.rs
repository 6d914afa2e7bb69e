//! Merge request lifecycle events.
//!
//! Emitted by the lifecycle aggregate when a poll detects a transition, and
//! fed back into it on replay. Downstream consumers route on `name()` or on
//! the serialized `type` tag.

use super::merge_request::{MergeRequestId, MergeRequestStatus, ProjectId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Event: merge_request_opened
pub const MERGE_REQUEST_OPENED_EVENT: &str = "merge_request_opened";

/// Event: merge_request_finalized
/// Emitted once when an MR leaves the opened state (closed, locked or merged).
pub const MERGE_REQUEST_FINALIZED_EVENT: &str = "merge_request_finalized";

/// A merge request was seen opened for the first time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRequestOpenedEvent {
    pub merge_request_id: MergeRequestId,
    pub project_id: ProjectId,
    /// MR creation time.
    pub date_time: DateTime<Utc>,
}

/// A tracked merge request reached a final status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRequestFinalizedEvent {
    pub merge_request_id: MergeRequestId,
    pub project_id: ProjectId,
    /// MR update time at which the final status was observed.
    pub date_time: DateTime<Utc>,
    pub status: MergeRequestStatus,
}

/// Lifecycle transition of a merge request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MergeRequestEvent {
    #[serde(rename = "merge_request_opened")]
    Opened(MergeRequestOpenedEvent),

    #[serde(rename = "merge_request_finalized")]
    Finalized(MergeRequestFinalizedEvent),
}

impl MergeRequestEvent {
    /// Stable event name for routing.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Opened(_) => MERGE_REQUEST_OPENED_EVENT,
            Self::Finalized(_) => MERGE_REQUEST_FINALIZED_EVENT,
        }
    }

    pub fn merge_request_id(&self) -> MergeRequestId {
        match self {
            Self::Opened(ev) => ev.merge_request_id,
            Self::Finalized(ev) => ev.merge_request_id,
        }
    }

    pub fn project_id(&self) -> ProjectId {
        match self {
            Self::Opened(ev) => ev.project_id,
            Self::Finalized(ev) => ev.project_id,
        }
    }

    pub fn date_time(&self) -> DateTime<Utc> {
        match self {
            Self::Opened(ev) => ev.date_time,
            Self::Finalized(ev) => ev.date_time,
        }
    }
}

impl From<MergeRequestOpenedEvent> for MergeRequestEvent {
    fn from(event: MergeRequestOpenedEvent) -> Self {
        Self::Opened(event)
    }
}

impl From<MergeRequestFinalizedEvent> for MergeRequestEvent {
    fn from(event: MergeRequestFinalizedEvent) -> Self {
        Self::Finalized(event)
    }
}
