pub mod app_config;
pub mod database;
pub mod rows;
pub mod user_repo;
pub mod request_repo;
pub mod bid_repo;
pub mod order_repo;
pub mod notification_repo;
pub mod redis_repo;
pub mod events;
pub mod memory;

pub use app_config::Config;
pub use database::DbClient;
pub use user_repo::{PgProfileRepository, PgUserRepository};
pub use request_repo::PgRequestRepository;
pub use bid_repo::PgBidRepository;
pub use order_repo::PgOrderRepository;
pub use notification_repo::PgNotificationRepository;
pub use redis_repo::RedisClient;
pub use events::EventProducer;
pub use memory::{MemoryRateLimiter, MemoryStore, RecordingPublisher};
