//! API server entry point.

use std::sync::Arc;

use api::{AppState, Config, LogFormat};
use order_store::{InMemoryOrderStore, OrderStore, OutboxStore, PostgresOrderStore};
use orders::{HttpProductCatalog, HttpUserDirectory, OrderOrchestrator, ProductsClient, UsersClient};
use outbox::{LogPublisher, OutboxDispatcher};
use resilience::BreakerRegistry;
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Opens the configured store: PostgreSQL when `DATABASE_URL` is set,
/// otherwise an in-memory store that is lost on restart.
async fn open_store(config: &Config) -> (Arc<dyn OrderStore>, Arc<dyn OutboxStore>) {
    match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(url)
                .await
                .expect("failed to connect to database");
            let store = Arc::new(PostgresOrderStore::new(pool));
            store
                .run_migrations()
                .await
                .expect("failed to run migrations");
            tracing::info!("using PostgreSQL order store");

            let orders: Arc<dyn OrderStore> = store.clone();
            let outbox: Arc<dyn OutboxStore> = store;
            (orders, outbox)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory order store");
            let store = Arc::new(InMemoryOrderStore::new());

            let orders: Arc<dyn OrderStore> = store.clone();
            let outbox: Arc<dyn OutboxStore> = store;
            (orders, outbox)
        }
    }
}

#[tokio::main]
async fn main() {
    // 1. Load configuration and initialize tracing
    let config = Config::from_env();
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Storage, remote validators and breakers
    let (order_store, outbox_store) = open_store(&config).await;

    let http = reqwest::Client::new();
    let users = HttpUserDirectory::new(http.clone(), &config.users_service_url)
        .expect("invalid USERS_SERVICE_URL");
    let products = HttpProductCatalog::new(http, &config.products_service_url)
        .expect("invalid PRODUCTS_SERVICE_URL");
    let breakers = Arc::new(BreakerRegistry::new(config.breaker_options()));

    let orchestrator = OrderOrchestrator::new(
        order_store,
        UsersClient::new(Arc::new(users), breakers.clone()),
        ProductsClient::new(Arc::new(products), breakers.clone()),
    )
    .with_pricing(config.pricing_policy());
    let state = AppState::new(orchestrator, outbox_store.clone(), breakers);

    // 4. Start the outbox dispatcher
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let dispatcher =
        OutboxDispatcher::new(outbox_store, LogPublisher, config.dispatcher_config())
            .spawn(shutdown_rx);

    // 5. Build the application and serve
    let app = api::create_app(state, metrics_handle);
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    // 6. Let the dispatcher finish its current sweep
    let _ = shutdown_tx.send(true);
    if let Err(err) = dispatcher.await {
        tracing::error!(error = %err, "outbox dispatcher task failed");
    }

    tracing::info!("server shut down gracefully");
}
