pub mod models;
pub mod finance;
pub mod fulfillment;
pub mod analytics;

pub use models::{FulfillmentStatus, Order, OrderError, PaymentStatus};
pub use finance::FeeSplit;
pub use analytics::ShopAnalytics;
