//! HTTP request handlers

pub mod adjustments;
pub mod alerts;
pub mod analytics;
pub mod dashboard;
pub mod health;
pub mod inventory;
pub mod marketing;
pub mod products;
pub mod profitability;
pub mod purchases;
pub mod raw_materials;
pub mod recipes;
pub mod reporting;
pub mod sales;
pub mod sync;

pub use adjustments::*;
pub use alerts::*;
pub use analytics::*;
pub use dashboard::*;
pub use health::*;
pub use inventory::*;
pub use marketing::*;
pub use products::*;
pub use profitability::*;
pub use purchases::*;
pub use raw_materials::*;
pub use recipes::*;
pub use reporting::*;
pub use sales::*;
pub use sync::*;
