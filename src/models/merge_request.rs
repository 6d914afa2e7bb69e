//! Merge request model.

use crate::error::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// GitLab project ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub i64);

/// Project-scoped merge request number (GitLab `iid`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MergeRequestId(pub i64);

impl std::fmt::Display for ProjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for MergeRequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "!{}", self.0)
    }
}

/// State of a merge request as reported by GitLab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeRequestStatus {
    Opened,
    Closed,
    Locked,
    Merged,
}

impl MergeRequestStatus {
    /// Any status other than `Opened` is final for lifecycle tracking.
    pub fn is_finalized(self) -> bool {
        self != Self::Opened
    }
}

impl FromStr for MergeRequestStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "opened" => Ok(Self::Opened),
            "closed" => Ok(Self::Closed),
            "locked" => Ok(Self::Locked),
            "merged" => Ok(Self::Merged),
            other => Err(AppError::invalid_input_field(
                format!("Unknown merge request state '{}'", other),
                "state",
            )),
        }
    }
}

impl std::fmt::Display for MergeRequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Opened => write!(f, "opened"),
            Self::Closed => write!(f, "closed"),
            Self::Locked => write!(f, "locked"),
            Self::Merged => write!(f, "merged"),
        }
    }
}

/// Point-in-time view of a merge request returned by a poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRequestSnapshot {
    /// Project-scoped MR number.
    pub id: MergeRequestId,

    /// MR creation time.
    pub created_at: DateTime<Utc>,

    /// MR last update time.
    pub updated_at: DateTime<Utc>,

    /// Current state.
    pub status: MergeRequestStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_str() {
        assert_eq!("opened".parse::<MergeRequestStatus>().unwrap(), MergeRequestStatus::Opened);
        assert_eq!("MERGED".parse::<MergeRequestStatus>().unwrap(), MergeRequestStatus::Merged);
        assert_eq!("Closed".parse::<MergeRequestStatus>().unwrap(), MergeRequestStatus::Closed);
        assert_eq!("locked".parse::<MergeRequestStatus>().unwrap(), MergeRequestStatus::Locked);
    }

    #[test]
    fn test_status_from_unknown_str_is_rejected() {
        let err = "draft".parse::<MergeRequestStatus>().unwrap_err();
        assert!(matches!(err, AppError::InvalidInput { .. }));
        assert!(err.to_string().contains("draft"));
    }

    #[test]
    fn test_status_display() {
        assert_eq!(MergeRequestStatus::Opened.to_string(), "opened");
        assert_eq!(MergeRequestStatus::Locked.to_string(), "locked");
        assert_eq!(MergeRequestStatus::Merged.to_string(), "merged");
    }

    #[test]
    fn test_is_finalized() {
        assert!(!MergeRequestStatus::Opened.is_finalized());
        assert!(MergeRequestStatus::Closed.is_finalized());
        assert!(MergeRequestStatus::Locked.is_finalized());
        assert!(MergeRequestStatus::Merged.is_finalized());
    }

    #[test]
    fn test_ids_serialize_transparently() {
        assert_eq!(serde_json::to_string(&MergeRequestId(73)).unwrap(), "73");
        assert_eq!(serde_json::to_string(&ProjectId(42)).unwrap(), "42");
        assert_eq!(MergeRequestId(73).to_string(), "!73");
    }
}
