//! Submission record and its status machine

use crate::errors::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Editorial status of a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Submitted,
    UnderReview,
    RevisionsRequired,
    Accepted,
    Rejected,
}

impl SubmissionStatus {
    pub const ALL: [SubmissionStatus; 5] = [
        SubmissionStatus::Submitted,
        SubmissionStatus::UnderReview,
        SubmissionStatus::RevisionsRequired,
        SubmissionStatus::Accepted,
        SubmissionStatus::Rejected,
    ];

    /// Statuses in which a reviewer may still file a review without prior assignment
    pub const REVIEWABLE: [SubmissionStatus; 2] =
        [SubmissionStatus::Submitted, SubmissionStatus::UnderReview];

    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Submitted => "submitted",
            SubmissionStatus::UnderReview => "under_review",
            SubmissionStatus::RevisionsRequired => "revisions_required",
            SubmissionStatus::Accepted => "accepted",
            SubmissionStatus::Rejected => "rejected",
        }
    }

    /// Accepted and rejected submissions leave this subsystem for good
    pub fn is_terminal(&self) -> bool {
        matches!(self, SubmissionStatus::Accepted | SubmissionStatus::Rejected)
    }

    /// Statuses an editor may move a submission to from this one
    pub fn successors(&self) -> &'static [SubmissionStatus] {
        use SubmissionStatus::*;
        match self {
            Submitted => &[UnderReview],
            UnderReview => &[RevisionsRequired, Accepted, Rejected],
            RevisionsRequired => &[Submitted, UnderReview, Accepted, Rejected],
            Accepted | Rejected => &[],
        }
    }

    pub fn can_transition_to(&self, next: SubmissionStatus) -> bool {
        self.successors().contains(&next)
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubmissionStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SubmissionStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| AppError::Validation {
                message: format!("Unknown submission status: {}", s),
                field: Some("status".to_string()),
            })
    }
}

/// A manuscript record moving through the editorial pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub id: Uuid,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub keywords: Vec<String>,
    pub author_id: Uuid,
    pub co_authors: Vec<String>,
    pub status: SubmissionStatus,
    pub manuscript_reference: String,
    pub editor_comments: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Submission {
    pub fn is_authored_by(&self, user_id: Uuid) -> bool {
        self.author_id == user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states_have_no_successors() {
        for status in SubmissionStatus::ALL {
            assert_eq!(status.is_terminal(), status.successors().is_empty());
        }
    }

    #[test]
    fn test_transition_table() {
        use SubmissionStatus::*;
        assert!(Submitted.can_transition_to(UnderReview));
        assert!(!Submitted.can_transition_to(Accepted));
        assert!(UnderReview.can_transition_to(RevisionsRequired));
        assert!(!UnderReview.can_transition_to(Submitted));
        assert!(RevisionsRequired.can_transition_to(Submitted));
        assert!(RevisionsRequired.can_transition_to(Accepted));
        assert!(!Accepted.can_transition_to(Rejected));

        // no status is its own successor
        for status in SubmissionStatus::ALL {
            assert!(!status.can_transition_to(status));
        }
    }

    #[test]
    fn test_status_string_roundtrip() {
        for status in SubmissionStatus::ALL {
            assert_eq!(status.as_str().parse::<SubmissionStatus>().unwrap(), status);
        }
        assert!("published".parse::<SubmissionStatus>().is_err());
    }
}
