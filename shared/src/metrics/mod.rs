//! Pricing, stock and financial calculators
//!
//! Pure functions over plain numbers. The backend feeds them aggregates
//! read from the database; the WASM module feeds them form input.

mod finance;
mod margin;
mod stock;

pub use finance::*;
pub use margin::*;
pub use stock::*;
