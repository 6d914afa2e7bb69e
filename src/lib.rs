//! MR Preview Bot - GitLab merge request lifecycle detection.
//!
//! Polls a GitLab project for merge requests and emits an event whenever one
//! is opened or finalized (closed, locked or merged). The events are meant to
//! drive ephemeral preview environments further downstream.

pub mod error;
pub mod models;
pub mod services;

pub use error::AppError;
pub use models::{
    MergeRequestEvent, MergeRequestFinalizedEvent, MergeRequestId, MergeRequestOpenedEvent,
    MergeRequestSnapshot, MergeRequestStatus, ProjectId,
};
pub use services::{
    GitLabClient, GitLabClientConfig, MergeRequestLifecycleAggregate, MergeRequestSource,
    PollConfig, PollEngine, PollHandle, PollStatus, ReopenPolicy,
};
