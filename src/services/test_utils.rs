//! Scripted merge request source for unit tests.

use crate::error::AppError;
use crate::models::{MergeRequestId, MergeRequestSnapshot, MergeRequestStatus, ProjectId};
use crate::services::merge_request_source::MergeRequestSource;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Mutex;

/// Replays queued responses in order and records every query.
///
/// Once the queue is empty every further query returns an empty batch.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    responses: Mutex<VecDeque<Result<Vec<MergeRequestSnapshot>, AppError>>>,
    calls: Mutex<Vec<(ProjectId, DateTime<Utc>)>>,
}

impl ScriptedSource {
    pub fn respond(self, response: Result<Vec<MergeRequestSnapshot>, AppError>) -> Self {
        self.responses.lock().unwrap().push_back(response);
        self
    }

    pub fn calls(&self) -> Vec<(ProjectId, DateTime<Utc>)> {
        self.calls.lock().unwrap().clone()
    }
}

impl MergeRequestSource for ScriptedSource {
    fn list_merge_requests(
        &self,
        project_id: ProjectId,
        updated_after: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<MergeRequestSnapshot>, AppError>> + Send {
        self.calls.lock().unwrap().push((project_id, updated_after));
        let response = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()));
        std::future::ready(response)
    }
}

pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

pub fn snapshot(
    id: i64,
    created: i64,
    updated: i64,
    status: MergeRequestStatus,
) -> MergeRequestSnapshot {
    MergeRequestSnapshot {
        id: MergeRequestId(id),
        created_at: at(created),
        updated_at: at(updated),
        status,
    }
}
