//! Flowgate - Workflow Promotion Engine
//!
//! Moves automation workflow definitions between isolated runtime
//! environments (dev -> staging -> production) with snapshot-based rollback,
//! content-addressed idempotency, credential rewriting, and policy gates.

pub mod config;
pub mod environments;
pub mod error;
pub mod models;
pub mod ports;
pub mod services;
pub mod store;
pub mod telemetry;
pub mod vcs;

pub use config::Config;
pub use error::{AppError, Result};
