//! SeaORM entity models
//!
//! Database entities for the PeerDesk journal store

mod review;
mod submission;
mod user;

pub use submission::{
    ActiveModel as SubmissionActiveModel, Column as SubmissionColumn, Entity as SubmissionEntity,
    Model as SubmissionRow,
};

pub use review::{
    ActiveModel as ReviewActiveModel, Column as ReviewColumn, Entity as ReviewEntity,
    Model as ReviewRow,
};

pub use user::{
    ActiveModel as UserActiveModel, Column as UserColumn, Entity as UserEntity, Model as UserRow,
};
