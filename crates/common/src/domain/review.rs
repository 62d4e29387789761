//! Review record and recommendation values

use crate::errors::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A reviewer's verdict on a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Accept,
    MinorRevisions,
    MajorRevisions,
    Reject,
}

impl Recommendation {
    pub const ALL: [Recommendation; 4] = [
        Recommendation::Accept,
        Recommendation::MinorRevisions,
        Recommendation::MajorRevisions,
        Recommendation::Reject,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::Accept => "accept",
            Recommendation::MinorRevisions => "minor_revisions",
            Recommendation::MajorRevisions => "major_revisions",
            Recommendation::Reject => "reject",
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Recommendation {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Recommendation::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| AppError::Validation {
                message: format!("Unknown recommendation: {}", s),
                field: Some("recommendation".to_string()),
            })
    }
}

/// One reviewer's evaluation of a submission, pending or completed.
///
/// `assigned_by` is set when an editor created the review through
/// assignment; direct reviews leave it empty. `submitted_at` being set is
/// what marks a review as completed, and once set it never changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub submission_id: Uuid,
    pub reviewer_id: Uuid,
    pub assigned_by: Option<Uuid>,
    pub comments: Option<String>,
    pub recommendation: Option<Recommendation>,
    pub created_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl Review {
    /// A review created by assignment, awaiting the reviewer
    pub fn pending(submission_id: Uuid, reviewer_id: Uuid, assigned_by: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            submission_id,
            reviewer_id,
            assigned_by: Some(assigned_by),
            comments: None,
            recommendation: None,
            created_at: Utc::now(),
            submitted_at: None,
        }
    }

    /// A review created and completed in one step
    pub fn direct(submission_id: Uuid, reviewer_id: Uuid, completion: &ReviewCompletion) -> Self {
        Self {
            id: Uuid::new_v4(),
            submission_id,
            reviewer_id,
            assigned_by: None,
            comments: Some(completion.comments.clone()),
            recommendation: Some(completion.recommendation),
            created_at: completion.submitted_at,
            submitted_at: Some(completion.submitted_at),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.submitted_at.is_some()
    }

    pub fn was_assigned(&self) -> bool {
        self.assigned_by.is_some()
    }
}

/// The write-once payload that completes a review
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewCompletion {
    pub comments: String,
    pub recommendation: Recommendation,
    pub submitted_at: DateTime<Utc>,
}

/// Aggregate over the completed reviews of one submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewSummary {
    pub submission_id: Uuid,
    pub total: usize,
    pub recommendations: BTreeMap<Recommendation, usize>,
}

impl ReviewSummary {
    /// Summarise reviews; pending ones are ignored and every recommendation
    /// value is present in the table, zero if unused.
    pub fn from_reviews<'a>(
        submission_id: Uuid,
        reviews: impl IntoIterator<Item = &'a Review>,
    ) -> Self {
        let mut recommendations: BTreeMap<Recommendation, usize> =
            Recommendation::ALL.into_iter().map(|r| (r, 0)).collect();
        let mut total = 0;

        for review in reviews.into_iter().filter(|r| r.is_completed()) {
            if let Some(recommendation) = review.recommendation {
                *recommendations.entry(recommendation).or_insert(0) += 1;
                total += 1;
            }
        }

        Self {
            submission_id,
            total,
            recommendations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completion(recommendation: Recommendation) -> ReviewCompletion {
        ReviewCompletion {
            comments: "ok".to_string(),
            recommendation,
            submitted_at: Utc::now(),
        }
    }

    #[test]
    fn test_empty_summary_is_zero_filled() {
        let id = Uuid::new_v4();
        let reviews: Vec<Review> = Vec::new();
        let summary = ReviewSummary::from_reviews(id, &reviews);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.recommendations.len(), Recommendation::ALL.len());
        assert!(summary.recommendations.values().all(|&n| n == 0));
    }

    #[test]
    fn test_summary_skips_pending_reviews() {
        let id = Uuid::new_v4();
        let reviews = vec![
            Review::pending(id, Uuid::new_v4(), Uuid::new_v4()),
            Review::direct(id, Uuid::new_v4(), &completion(Recommendation::Accept)),
            Review::direct(id, Uuid::new_v4(), &completion(Recommendation::Accept)),
            Review::direct(id, Uuid::new_v4(), &completion(Recommendation::Reject)),
        ];

        let summary = ReviewSummary::from_reviews(id, &reviews);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.recommendations[&Recommendation::Accept], 2);
        assert_eq!(summary.recommendations[&Recommendation::Reject], 1);
        assert_eq!(summary.recommendations[&Recommendation::MinorRevisions], 0);
    }

    #[test]
    fn test_review_origin() {
        let id = Uuid::new_v4();
        let pending = Review::pending(id, Uuid::new_v4(), Uuid::new_v4());
        assert!(pending.was_assigned());
        assert!(!pending.is_completed());

        let direct = Review::direct(id, Uuid::new_v4(), &completion(Recommendation::MajorRevisions));
        assert!(!direct.was_assigned());
        assert!(direct.is_completed());
    }
}
