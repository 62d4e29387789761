//! API handlers module

pub mod health;
pub mod manuscripts;
pub mod reviews;
pub mod submissions;
pub mod users;
