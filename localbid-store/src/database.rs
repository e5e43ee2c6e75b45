use localbid_core::CoreError;
use localbid_market::MarketError;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use tracing::{error, info};

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

impl DbClient {
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&self.pool)
            .await?;
        info!("Migrations completed successfully.");
        Ok(())
    }
}

/// Maps driver errors onto `CoreError`. Unique violations become conflicts
/// named after the constraint that fired; everything else is internal.
pub(crate) fn db_err(e: sqlx::Error) -> CoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            let message = match db.constraint() {
                Some("unique_bid_per_shop") => MarketError::DuplicateBid.to_string(),
                Some("users_email_key") => "Email already registered".to_string(),
                Some("orders_order_number_key") => "Order number collision, please retry".to_string(),
                Some("orders_bid_id_key") => "Bid has already been accepted".to_string(),
                _ => "Resource already exists".to_string(),
            };
            return CoreError::Conflict(message);
        }
    }
    error!(error = %e, "Database error");
    CoreError::InternalError("database error".to_string())
}
