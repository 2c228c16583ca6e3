//! Engine services.

pub mod audit_service;
pub mod comparator;
pub mod credential_rewriter;
pub mod gate_service;
pub mod normalizer;
pub mod promotion_service;
pub mod retry;
pub mod rollback_service;
pub mod snapshot_service;
