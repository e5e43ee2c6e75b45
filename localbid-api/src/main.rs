use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use localbid_api::{
    app,
    metrics::Metrics,
    state::{AppState, AuthConfig},
    worker,
};
use localbid_core::events::{EventPublisher, LoggingPublisher};
use localbid_store::{
    app_config::Config, DbClient, EventProducer, PgBidRepository, PgNotificationRepository,
    PgOrderRepository, PgProfileRepository, PgRequestRepository, PgUserRepository, RedisClient,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "localbid_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting LocalBid API on port {}", config.server.port);

    // Postgres
    let db = DbClient::new(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;
    let pool = db.pool.clone();

    // Redis Connection
    let redis_client = RedisClient::new(&config.redis.url)
        .await
        .context("Failed to connect to Redis")?;

    // Kafka Connection
    let publisher: Arc<dyn EventPublisher> = if config.kafka.brokers.is_empty() {
        tracing::warn!("No Kafka brokers configured, events are only logged");
        Arc::new(LoggingPublisher)
    } else {
        Arc::new(EventProducer::new(&config.kafka.brokers).context("Failed to create Kafka producer")?)
    };

    // SSE Broadcast Channel
    let (sse_tx, _) = tokio::sync::broadcast::channel(100);

    let requests = Arc::new(PgRequestRepository::new(pool.clone()));

    let app_state = AppState {
        users: Arc::new(PgUserRepository::new(pool.clone())),
        profiles: Arc::new(PgProfileRepository::new(pool.clone())),
        requests: requests.clone(),
        bids: Arc::new(PgBidRepository::new(pool.clone())),
        orders: Arc::new(PgOrderRepository::new(pool.clone())),
        notifications: Arc::new(PgNotificationRepository::new(pool)),
        publisher,
        rate_limiter: Arc::new(redis_client),
        sse_tx,
        metrics: Arc::new(Metrics::new().context("Failed to register metrics")?),
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
            bcrypt_cost: config.auth.bcrypt_cost,
        },
        business_rules: config.business_rules.clone(),
    };

    tokio::spawn(worker::start_expiry_worker(
        requests,
        tokio::time::Duration::from_secs(config.business_rules.expiry_sweep_seconds.max(1)),
    ));

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("Server error")?;

    Ok(())
}
