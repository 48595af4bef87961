//! Route definitions for the LINO back-office API

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState, Config};

/// Create API routes. Every route here requires a bearer token signed with
/// `config.jwt.secret`.
pub fn api_routes(config: Arc<Config>) -> Router<AppState> {
    Router::new()
        // Catalog and stock
        .nest("/products", product_routes(config.clone()))
        .nest("/raw-materials", raw_material_routes(config.clone()))
        .nest("/recipes", recipe_routes(config.clone()))
        // Transactions
        .nest("/sales", sale_routes(config.clone()))
        .nest("/purchases", purchase_routes(config.clone()))
        .nest("/adjustments", adjustment_routes(config.clone()))
        // Alerts and reports
        .nest("/alerts", alert_routes(config.clone()))
        .nest("/analytics", analytics_routes(config.clone()))
        .nest("/profitability", profitability_routes(config.clone()))
        .nest("/inventory", inventory_routes(config.clone()))
        .nest("/dashboard", dashboard_routes(config.clone()))
        .nest("/marketing", marketing_routes(config.clone()))
        // External channels
        .nest("/sync", sync_routes(config.clone()))
        .nest("/export", export_routes(config.clone()))
}

/// Product routes (protected)
fn product_routes(config: Arc<Config>) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_products).post(handlers::create_product),
        )
        .route(
            "/:id",
            get(handlers::get_product)
                .put(handlers::update_product)
                .delete(handlers::delete_product),
        )
        .route("/:id/cost", get(handlers::get_product_cost))
        .route("/:id/production", post(handlers::produce_product))
        .route("/:id/price", post(handlers::apply_product_price))
        .route_layer(middleware::from_fn_with_state(config, auth_middleware))
}

/// Raw material routes (protected)
fn raw_material_routes(config: Arc<Config>) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_raw_materials).post(handlers::create_raw_material),
        )
        .route("/low-stock", get(handlers::list_low_stock_raw_materials))
        .route(
            "/:id",
            get(handlers::get_raw_material).put(handlers::update_raw_material),
        )
        .route("/:id/movements", get(handlers::list_raw_material_movements))
        .route_layer(middleware::from_fn_with_state(config, auth_middleware))
}

/// Recipe routes (protected)
fn recipe_routes(config: Arc<Config>) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_recipes).post(handlers::create_recipe))
        .route(
            "/:id",
            get(handlers::get_recipe)
                .put(handlers::update_recipe)
                .delete(handlers::delete_recipe),
        )
        .route("/:id/cost", get(handlers::get_recipe_cost))
        .route_layer(middleware::from_fn_with_state(config, auth_middleware))
}

/// Sale routes (protected)
fn sale_routes(config: Arc<Config>) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_sales).post(handlers::create_sale))
        .route(
            "/:id",
            get(handlers::get_sale).delete(handlers::delete_sale),
        )
        .route_layer(middleware::from_fn_with_state(config, auth_middleware))
}

/// Purchase routes (protected)
fn purchase_routes(config: Arc<Config>) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_purchases).post(handlers::create_purchase),
        )
        .route(
            "/:id",
            get(handlers::get_purchase).delete(handlers::cancel_purchase),
        )
        .route_layer(middleware::from_fn_with_state(config, auth_middleware))
}

/// Inventory adjustment routes (protected)
fn adjustment_routes(config: Arc<Config>) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_adjustments).post(handlers::create_adjustment),
        )
        .route("/:id", get(handlers::get_adjustment))
        .route_layer(middleware::from_fn_with_state(config, auth_middleware))
}

/// Alert routes (protected)
fn alert_routes(config: Arc<Config>) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_alerts))
        .route("/unread-count", get(handlers::get_unread_alert_count))
        .route("/generate", post(handlers::generate_alerts))
        .route("/mark-all-read", post(handlers::mark_all_alerts_read))
        .route("/:id/read", post(handlers::mark_alert_read))
        .route("/:id/archive", post(handlers::archive_alert))
        .route_layer(middleware::from_fn_with_state(config, auth_middleware))
}

/// Financial analytics routes (protected)
fn analytics_routes(config: Arc<Config>) -> Router<AppState> {
    Router::new()
        .route("/roi", get(handlers::get_roi))
        .route("/break-even", get(handlers::get_break_even))
        .route("/cash-flow", get(handlers::get_cash_flow))
        .route("/rotation", get(handlers::get_rotation))
        .route("/health", get(handlers::get_health))
        .route("/alerts", get(handlers::get_profitability_alerts))
        .route("/cost-evolution", get(handlers::get_cost_evolution))
        .route(
            "/price-recommendations",
            get(handlers::get_price_recommendations),
        )
        .route_layer(middleware::from_fn_with_state(config, auth_middleware))
}

/// Profitability routes (protected)
fn profitability_routes(config: Arc<Config>) -> Router<AppState> {
    Router::new()
        .route("/summary", get(handlers::get_profitability_summary))
        .route("/low-margin", get(handlers::list_low_margin_products))
        .route("/critical", get(handlers::get_critical_products))
        .route(
            "/recommendations",
            get(handlers::list_profitability_recommendations),
        )
        .route("/products", get(handlers::list_product_profitability))
        .route(
            "/settings",
            get(handlers::get_cost_settings).put(handlers::update_cost_settings),
        )
        .route_layer(middleware::from_fn_with_state(config, auth_middleware))
}

/// Inventory KPI routes (protected)
fn inventory_routes(config: Arc<Config>) -> Router<AppState> {
    Router::new()
        .route("/coverage", get(handlers::get_inventory_coverage))
        .route("/critical", get(handlers::get_critical_stock))
        .route("/purchase-cadence", get(handlers::get_purchase_cadence))
        .route("/value", get(handlers::get_inventory_value))
        .route("/rotation", get(handlers::get_inventory_rotation))
        .route("/slow-movers", get(handlers::list_slow_movers))
        .route("/status", get(handlers::list_stock_status))
        .route_layer(middleware::from_fn_with_state(config, auth_middleware))
}

/// Dashboard routes (protected)
fn dashboard_routes(config: Arc<Config>) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::get_dashboard))
        .route("/kpis", get(handlers::get_dashboard_kpis))
        .route("/today", get(handlers::get_today_summary))
        .route("/activity", get(handlers::list_recent_activity))
        .route("/top-products", get(handlers::list_top_products))
        .route("/sales-by-period", get(handlers::get_sales_by_period))
        .route("/top-products-chart", get(handlers::get_top_products_chart))
        .route_layer(middleware::from_fn_with_state(config, auth_middleware))
}

/// Marketing routes (protected)
fn marketing_routes(config: Arc<Config>) -> Router<AppState> {
    Router::new()
        .route("/trending", get(handlers::list_trending_products))
        .route("/heroes", get(handlers::list_hero_products))
        .route("/cross-selling", get(handlers::get_cross_selling))
        .route("/low-rotation", get(handlers::list_low_rotation_products))
        .route_layer(middleware::from_fn_with_state(config, auth_middleware))
}

/// Sync feed routes (protected)
fn sync_routes(config: Arc<Config>) -> Router<AppState> {
    Router::new()
        .route("/products", get(handlers::sync_products))
        .route("/products/:id/price", get(handlers::sync_product_price))
        .route(
            "/products/:id/verify-stock",
            get(handlers::verify_product_stock),
        )
        .route("/inventory", get(handlers::sync_inventory))
        .route("/sales", get(handlers::sync_sales))
        .route_layer(middleware::from_fn_with_state(config, auth_middleware))
}

/// Export routes (protected)
fn export_routes(config: Arc<Config>) -> Router<AppState> {
    Router::new()
        .route("/products", get(handlers::export_products))
        .route("/sales", get(handlers::export_sales))
        .route("/raw-materials", get(handlers::export_raw_materials))
        .route_layer(middleware::from_fn_with_state(config, auth_middleware))
}
