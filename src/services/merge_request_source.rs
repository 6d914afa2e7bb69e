//! Remote query contract used by the lifecycle aggregate.

use crate::error::AppError;
use crate::models::{MergeRequestSnapshot, ProjectId};
use chrono::{DateTime, Utc};
use std::future::Future;

/// Lists the merge requests of a project.
///
/// Implementations return every merge request updated at or after
/// `updated_after`. The order of the returned snapshots is preserved in the
/// events emitted by a poll.
pub trait MergeRequestSource {
    fn list_merge_requests(
        &self,
        project_id: ProjectId,
        updated_after: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<MergeRequestSnapshot>, AppError>> + Send;
}
