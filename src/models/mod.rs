//! Data models.

pub mod credential;
pub mod promotion;
pub mod rollback;
pub mod snapshot;
pub mod workflow;
