//! Data models for merge request lifecycle tracking.
//!
//! Snapshots are what a poll observes; events are what the lifecycle
//! aggregate emits and replays.

pub mod events;
pub mod merge_request;

// Re-exports for convenient access
pub use events::{
    MergeRequestEvent, MergeRequestFinalizedEvent, MergeRequestOpenedEvent,
    MERGE_REQUEST_FINALIZED_EVENT, MERGE_REQUEST_OPENED_EVENT,
};
pub use merge_request::{MergeRequestId, MergeRequestSnapshot, MergeRequestStatus, ProjectId};
