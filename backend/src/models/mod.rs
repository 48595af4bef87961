//! Database models for the LINO back-office
//!
//! Re-exports models from the shared crate

pub use shared::models::*;
