//! GitLab API client.
//!
//! Provides an HTTP client for GitLab API v4 that lists the merge requests
//! of a project and serves as the lifecycle aggregate's `MergeRequestSource`.

use crate::error::AppError;
use crate::models::{MergeRequestId, MergeRequestSnapshot, ProjectId};
use crate::services::merge_request_source::MergeRequestSource;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{header, Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Page size requested from GitLab. Only the first page is read.
const PER_PAGE: u32 = 100;

/// GitLab API client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitLabClientConfig {
    /// Base URL of the GitLab instance (e.g., `https://gitlab.com`).
    pub base_url: String,

    /// Personal access token for authentication.
    #[serde(skip_serializing)]
    pub token: String,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for GitLabClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            token: String::new(),
            timeout_secs: 30,
        }
    }
}

/// GitLab API client.
#[derive(Debug, Clone)]
pub struct GitLabClient {
    client: Client,
    config: GitLabClientConfig,
}

/// Query parameters for listing project merge requests.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectMergeRequestsQuery {
    /// Filter by state: `opened`, `closed`, `locked`, `merged`, `all`.
    pub state: String,

    /// Return MRs updated at or after this date (ISO 8601).
    pub updated_after: String,

    /// Ordering field: `created_at` or `updated_at`.
    pub order_by: String,

    /// Sort direction: `asc` or `desc`.
    pub sort: String,

    /// Number of items per page (max 100).
    pub per_page: u32,
}

impl ProjectMergeRequestsQuery {
    /// All MRs updated since `updated_after`, oldest update first.
    pub fn updated_since(updated_after: DateTime<Utc>) -> Self {
        Self {
            state: "all".to_string(),
            updated_after: updated_after.to_rfc3339_opts(SecondsFormat::Secs, true),
            order_by: "updated_at".to_string(),
            sort: "asc".to_string(),
            per_page: PER_PAGE,
        }
    }
}

/// GitLab merge request from API.
///
/// Only the fields needed for lifecycle tracking are read.
#[derive(Debug, Clone, Deserialize)]
pub struct GitLabMergeRequest {
    pub iid: i64,
    pub state: String,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<GitLabMergeRequest> for MergeRequestSnapshot {
    type Error = AppError;

    fn try_from(mr: GitLabMergeRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            id: MergeRequestId(mr.iid),
            created_at: parse_iso_timestamp(&mr.created_at, "created_at")?,
            updated_at: parse_iso_timestamp(&mr.updated_at, "updated_at")?,
            status: mr.state.parse()?,
        })
    }
}

/// Parse an ISO 8601 timestamp as returned by GitLab.
fn parse_iso_timestamp(s: &str, field: &str) -> Result<DateTime<Utc>, AppError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            AppError::invalid_input_field(format!("Invalid timestamp '{}': {}", s, e), field)
        })
}

impl GitLabClient {
    /// Create a new GitLab client.
    pub fn new(config: GitLabClientConfig) -> Result<Self, AppError> {
        let mut headers = header::HeaderMap::new();

        let token_value = header::HeaderValue::from_str(&config.token)
            .map_err(|_| AppError::authentication("Invalid token format"))?;
        headers.insert("PRIVATE-TOKEN", token_value);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Get the base URL for API requests.
    fn api_url(&self, path: &str) -> String {
        format!(
            "{}/api/v4{}",
            self.config.base_url.trim_end_matches('/'),
            path
        )
    }

    /// Handle API response errors.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: Response,
        endpoint: &str,
    ) -> Result<T, AppError> {
        let status = response.status();

        if status.is_success() {
            response
                .json::<T>()
                .await
                .map_err(|e| AppError::internal(format!("Failed to parse response: {}", e)))
        } else if status == StatusCode::UNAUTHORIZED {
            Err(AppError::authentication("GitLab token expired or revoked"))
        } else {
            let status_code = status.as_u16();
            let body = response.text().await.unwrap_or_default();
            // GitLab returns errors as {"message": "..."} or {"error": "..."}
            let body_message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| {
                    v.get("message").or_else(|| v.get("error")).map(|m| match m.as_str() {
                        Some(s) => s.to_string(),
                        // Sometimes "message" is an object like {"base":["msg"]}
                        None => m.to_string(),
                    })
                });

            let message = match (status, body_message) {
                (StatusCode::FORBIDDEN, _) => "Access denied".to_string(),
                (StatusCode::NOT_FOUND, _) => "Resource not found".to_string(),
                (StatusCode::TOO_MANY_REQUESTS, _) => "Rate limit exceeded".to_string(),
                (_, Some(msg)) => msg,
                _ => format!("Request failed ({}): {}", status_code, body),
            };

            Err(AppError::gitlab_api_full(message, status_code, endpoint))
        }
    }

    /// List merge requests of a project updated at or after `updated_after`.
    pub async fn list_project_merge_requests(
        &self,
        project_id: ProjectId,
        updated_after: DateTime<Utc>,
    ) -> Result<Vec<GitLabMergeRequest>, AppError> {
        let endpoint = format!("/projects/{}/merge_requests", project_id);
        let url = self.api_url(&endpoint);
        let query = ProjectMergeRequestsQuery::updated_since(updated_after);

        let response = self.client.get(&url).query(&query).send().await?;
        self.handle_response(response, &endpoint).await
    }

    async fn merge_request_snapshots(
        &self,
        project_id: ProjectId,
        updated_after: DateTime<Utc>,
    ) -> Result<Vec<MergeRequestSnapshot>, AppError> {
        self.list_project_merge_requests(project_id, updated_after)
            .await?
            .into_iter()
            .map(MergeRequestSnapshot::try_from)
            .collect()
    }
}

impl MergeRequestSource for GitLabClient {
    fn list_merge_requests(
        &self,
        project_id: ProjectId,
        updated_after: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<MergeRequestSnapshot>, AppError>> + Send {
        self.merge_request_snapshots(project_id, updated_after)
    }
}
