//! Domain records shared by the lifecycle engine and every storage backend

mod review;
mod submission;
mod user;

pub use review::{Recommendation, Review, ReviewCompletion, ReviewSummary};
pub use submission::{Submission, SubmissionStatus};
pub use user::UserRecord;
