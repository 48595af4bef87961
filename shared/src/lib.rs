//! Shared types and models for the LINO back-office
//!
//! Domain records, pricing and stock calculators, and business-rule
//! validation shared between the backend and the browser (via WASM).

pub mod metrics;
pub mod models;
pub mod types;
pub mod validation;

pub use metrics::*;
pub use models::*;
pub use types::*;
pub use validation::*;
