//! Business logic services.
//!
//! This module contains the merge request lifecycle aggregate, the GitLab
//! client it polls through, and the background engine that schedules polls.
//!
//! The aggregate only depends on the `MergeRequestSource` trait, so it can be
//! tested without network access.

pub mod gitlab_client;
pub mod merge_request_source;
pub mod mr_lifecycle;
pub mod poll_engine;

#[cfg(test)]
pub(crate) mod test_utils;

pub use gitlab_client::{GitLabClient, GitLabClientConfig};
pub use merge_request_source::MergeRequestSource;
pub use mr_lifecycle::{MergeRequestLifecycleAggregate, ReopenPolicy, POLL_LOOKBACK_SECS};
pub use poll_engine::{PollConfig, PollEngine, PollHandle, PollStatus};
