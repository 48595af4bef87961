//! WebAssembly module for the LINO back-office
//!
//! Provides client-side computation for:
//! - Margin and suggested price previews on the product form
//! - Stock status badges
//! - Weighted-average cost previews before a purchase is saved
//! - Offline validation of sale lines

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::metrics::*;
pub use shared::models::*;
pub use shared::validation::*;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

fn to_decimal(value: f64) -> Decimal {
    Decimal::try_from(value).unwrap_or(Decimal::ZERO)
}

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// Gross margin percentage for a price and a unit cost
#[wasm_bindgen]
pub fn calculate_margin(price: f64, cost: f64) -> f64 {
    to_f64(margin_percent(to_decimal(price), to_decimal(cost)))
}

/// Margin band label (`critical`, `low`, `acceptable` or `optimal`)
#[wasm_bindgen]
pub fn classify_margin(margin: f64) -> String {
    MarginState::classify(to_decimal(margin)).to_string()
}

/// Price that reaches the target margin over the cost
#[wasm_bindgen]
pub fn calculate_suggested_price(cost: f64, target_margin: f64, round_to_tens: bool) -> f64 {
    to_f64(suggested_price(
        to_decimal(cost),
        to_decimal(target_margin),
        round_to_tens,
    ))
}

/// Stock status label for a product
#[wasm_bindgen]
pub fn classify_stock(stock: i32, minimum_stock: i32) -> String {
    StockStatus::classify(stock, minimum_stock).to_string()
}

/// Unit cost a raw material would have after receiving a purchase
#[wasm_bindgen]
pub fn preview_average_cost(stock: f64, unit_cost: f64, quantity: f64, total_price: f64) -> f64 {
    let quantity = to_decimal(quantity);
    let unit_price = purchase_unit_price(to_decimal(total_price), quantity);
    let after = StockValuation::new(to_decimal(stock), to_decimal(unit_cost)).receive(quantity, unit_price);
    to_f64(after.unit_cost)
}

/// Validate purchase lines, returning the list of problems (empty when valid)
#[wasm_bindgen]
pub fn validate_purchase(lines_json: &str) -> Result<JsValue, JsValue> {
    let lines: Vec<PurchaseLineInput> = serde_json::from_str(lines_json)
        .map_err(|e| JsValue::from_str(&format!("Invalid purchase JSON: {}", e)))?;

    let problems = match validate_purchase_lines(&lines) {
        Ok(()) => Vec::new(),
        Err(violations) => violations.0,
    };
    let json = serde_json::to_string(&problems)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))?;
    Ok(JsValue::from_str(&json))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_margin() {
        assert!((calculate_margin(10000.0, 6500.0) - 35.0).abs() < 0.001);
        assert_eq!(calculate_margin(0.0, 6500.0), 0.0);
    }

    #[test]
    fn test_classify_margin() {
        assert_eq!(classify_margin(5.0), "critico");
        assert_eq!(classify_margin(15.0), "bajo");
        assert_eq!(classify_margin(25.0), "aceptable");
        assert_eq!(classify_margin(40.0), "optimo");
    }

    #[test]
    fn test_suggested_price() {
        assert!((calculate_suggested_price(6500.0, 35.0, false) - 10000.0).abs() < 0.001);
        assert!((calculate_suggested_price(3333.0, 35.0, true) - 5130.0).abs() < 0.001);
    }

    #[test]
    fn test_classify_stock() {
        assert_eq!(classify_stock(0, 5), "agotado");
        assert_eq!(classify_stock(5, 5), "critico");
        assert_eq!(classify_stock(8, 5), "bajo");
        assert_eq!(classify_stock(20, 5), "normal");
    }

    #[test]
    fn test_preview_average_cost() {
        let cost = preview_average_cost(10.0, 8000.0, 30.0, 270000.0);
        assert!((cost - 8750.0).abs() < 0.001);
    }
}
