use std::sync::Arc;

use anyhow::Context as _;
use sea_orm::Database;
use paygate_payments_migration::MigratorTrait as _;
use tracing::info;

use paygate_core::telemetry::init_tracing;
use paygate_payments::config::PaymentsConfig;
use paygate_payments::infra::broker::RedisTransport;
use paygate_payments::infra::db::DbEventStore;
use paygate_payments::infra::wise::WiseClient;
use paygate_payments::router::build_router;
use paygate_payments::state::AppState;
use paygate_payments::usecase::delivery::EventDelivery;
use paygate_payments_migration::Migrator;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let config = PaymentsConfig::from_env().context("load payments configuration")?;
    init_tracing(config.log_format);

    let db = Database::connect(&config.database_url)
        .await
        .context("connect to database")?;
    Migrator::up(&db, None).await.context("run migrations")?;

    let redis = deadpool_redis::Config::from_url(&config.redis_url)
        .create_pool(Some(deadpool_redis::Runtime::Tokio1))
        .context("create Redis pool")?;

    let delivery = Arc::new(EventDelivery::new(
        RedisTransport {
            pool: redis,
            timeout: config.transport_timeout,
        },
        DbEventStore { db: db.clone() },
        config.payment_events_queue.clone(),
        config.recent_events_capacity,
    ));
    delivery.connect().await;
    if let Some(interval) = config.event_reconnect_interval {
        info!(interval_secs = interval.as_secs(), "transport reconnect loop enabled");
        Arc::clone(&delivery).spawn_reconnect_loop(interval);
    }

    let wise = WiseClient::new(
        &config.wise_api_url,
        config.wise_api_key,
        config.wise_profile_id,
        config.provider_timeout,
    )?;

    let state = AppState::new(db, delivery, wise, config.payout_target_currency);

    let router = build_router(state);
    let addr = format!("0.0.0.0:{}", config.payments_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind {addr}"))?;

    info!("payments service listening on {addr}");
    axum::serve(listener, router).await.context("server error")?;
    Ok(())
}
