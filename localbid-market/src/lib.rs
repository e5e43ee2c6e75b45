pub mod models;
pub mod stats;
pub mod rules;
pub mod expiry;

pub use models::{Availability, Bid, BidStatus, NewBid, NewRequest, ProductRequest, RequestStatus};
pub use stats::BidStats;
pub use rules::MarketError;
