//! Business logic services for the LINO back-office

pub mod adjustments;
pub mod alerts;
pub mod analytics;
pub mod dashboard;
pub mod inventory;
pub mod marketing;
pub mod products;
pub mod profitability;
pub mod purchases;
pub mod raw_materials;
pub mod recipes;
pub mod reporting;
pub mod sales;
pub mod sales_stats;
pub mod sync;

pub use adjustments::AdjustmentService;
pub use alerts::AlertService;
pub use analytics::AnalyticsService;
pub use dashboard::DashboardService;
pub use inventory::InventoryService;
pub use marketing::MarketingService;
pub use products::ProductService;
pub use profitability::ProfitabilityService;
pub use purchases::PurchaseService;
pub use raw_materials::RawMaterialService;
pub use recipes::RecipeService;
pub use reporting::ReportingService;
pub use sales::SalesService;
pub use sync::SyncService;
