//! Input shapes accepted by the lifecycle engine
//!
//! Everything here is checked before the store is touched, so a rejected
//! input never leaves a partial write behind.

use crate::auth::Role;
use crate::domain::Recommendation;
use serde::Deserialize;
use std::borrow::Cow;
use std::collections::HashSet;
use validator::{Validate, ValidationError};

/// Longest abstract accepted, in whitespace-separated words
pub const MAX_ABSTRACT_WORDS: usize = 500;
pub const MIN_KEYWORDS: usize = 3;
pub const MAX_KEYWORDS: usize = 10;

/// A manuscript as first submitted by its author
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewSubmission {
    #[validate(length(max = 1000), custom(function = not_blank))]
    pub title: String,

    #[serde(rename = "abstract")]
    #[validate(custom(function = abstract_within_limit))]
    pub abstract_text: String,

    #[validate(custom(function = keyword_set))]
    pub keywords: Vec<String>,

    #[serde(default)]
    pub co_authors: Vec<String>,

    #[validate(custom(function = not_blank))]
    pub manuscript_reference: String,
}

/// A reviewer's completed evaluation
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReviewInput {
    #[validate(length(max = 50000), custom(function = not_blank))]
    pub comments: String,

    pub recommendation: Recommendation,
}

/// A user directory entry as registered by an administrator
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewUser {
    #[validate(length(max = 200), custom(function = not_blank))]
    pub display_name: String,

    #[validate(email)]
    pub email: Option<String>,

    pub role: Role,
}

/// Drop surrounding whitespace from free-text fields
pub(crate) fn tidy(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

fn failure(code: &'static str, message: String) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::from(message));
    error
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(failure("blank", "must not be blank".to_string()));
    }
    Ok(())
}

fn abstract_within_limit(value: &str) -> Result<(), ValidationError> {
    let words = value.split_whitespace().count();
    if words == 0 {
        return Err(failure("blank", "must not be blank".to_string()));
    }
    if words > MAX_ABSTRACT_WORDS {
        return Err(failure(
            "too_long",
            format!("has {} words; at most {} allowed", words, MAX_ABSTRACT_WORDS),
        ));
    }
    Ok(())
}

fn keyword_set(keywords: &[String]) -> Result<(), ValidationError> {
    if !(MIN_KEYWORDS..=MAX_KEYWORDS).contains(&keywords.len()) {
        return Err(failure(
            "count",
            format!(
                "needs between {} and {} keywords, got {}",
                MIN_KEYWORDS,
                MAX_KEYWORDS,
                keywords.len()
            ),
        ));
    }

    let mut seen = HashSet::new();
    for keyword in keywords {
        let normalized = keyword.trim().to_lowercase();
        if normalized.is_empty() {
            return Err(failure("blank", "keywords must not be blank".to_string()));
        }
        if !seen.insert(normalized) {
            return Err(failure(
                "duplicate",
                format!("keyword '{}' appears more than once", keyword.trim()),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission() -> NewSubmission {
        NewSubmission {
            title: "Sparse attention in protein folding".to_string(),
            abstract_text: "We study sparse attention.".to_string(),
            keywords: vec!["attention".into(), "proteins".into(), "sparsity".into()],
            co_authors: vec![],
            manuscript_reference: "sha256:abc".to_string(),
        }
    }

    fn failed_field(input: &NewSubmission) -> Option<String> {
        input
            .validate()
            .err()
            .and_then(|e| e.field_errors().keys().next().map(|k| k.to_string()))
    }

    #[test]
    fn test_valid_submission() {
        assert!(submission().validate().is_ok());
    }

    #[test]
    fn test_blank_title_rejected() {
        let mut input = submission();
        input.title = "   ".to_string();
        assert_eq!(failed_field(&input).as_deref(), Some("title"));
    }

    #[test]
    fn test_abstract_word_limit() {
        let mut input = submission();
        input.abstract_text = vec!["word"; MAX_ABSTRACT_WORDS].join(" ");
        assert!(input.validate().is_ok());

        input.abstract_text = vec!["word"; MAX_ABSTRACT_WORDS + 1].join(" ");
        assert_eq!(failed_field(&input).as_deref(), Some("abstract_text"));

        input.abstract_text = String::new();
        assert_eq!(failed_field(&input).as_deref(), Some("abstract_text"));
    }

    #[test]
    fn test_keyword_bounds() {
        let mut input = submission();
        input.keywords = vec!["a".into(), "b".into()];
        assert_eq!(failed_field(&input).as_deref(), Some("keywords"));

        input.keywords = (0..11).map(|i| format!("k{}", i)).collect();
        assert_eq!(failed_field(&input).as_deref(), Some("keywords"));

        input.keywords = (0..10).map(|i| format!("k{}", i)).collect();
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_duplicate_keywords_rejected() {
        let mut input = submission();
        input.keywords = vec!["Attention".into(), "attention ".into(), "proteins".into()];
        assert_eq!(failed_field(&input).as_deref(), Some("keywords"));
    }

    #[test]
    fn test_missing_manuscript_reference() {
        let mut input = submission();
        input.manuscript_reference = String::new();
        assert_eq!(failed_field(&input).as_deref(), Some("manuscript_reference"));
    }

    #[test]
    fn test_review_requires_comments() {
        let review = ReviewInput {
            comments: " ".to_string(),
            recommendation: Recommendation::Accept,
        };
        assert!(review.validate().is_err());
    }

    #[test]
    fn test_user_email_checked() {
        let user = NewUser {
            display_name: "Ada".to_string(),
            email: Some("not-an-email".to_string()),
            role: Role::Reviewer,
        };
        assert!(user.validate().is_err());
    }

    #[test]
    fn test_tidy_drops_blank_entries() {
        let names = vec![" Grace Hopper ".to_string(), "  ".to_string()];
        assert_eq!(tidy(&names), vec!["Grace Hopper".to_string()]);
    }
}
