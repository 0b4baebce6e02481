use anyhow::Context;
use pawline_config::load as load_config;
use pawline_history::{prepare_database, run_migrations, SqliteHistoryStore};
use pawline_relay::{Relay, RelaySettings};
use pawline_server::{build_router, AppState};
use tokio::{net::TcpListener, signal};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_env_filter(env_filter)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    info!("starting Pawline chat relay");

    let config = load_config().context("failed to load configuration")?;

    let db_pool = prepare_database(&config.database).await?;
    run_migrations(&db_pool).await?;

    let store = SqliteHistoryStore::new(db_pool);
    let (relay_handle, relay) = Relay::new(store, RelaySettings::from(config.relay.clone()));
    tokio::spawn(relay.run());

    let app = build_router(AppState::new(relay_handle));

    let address = format!("{}:{}", config.http.address, config.http.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind http listener on {address}"))?;

    info!(%address, "http server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server error")?;

    info!("relay shut down");
    Ok(())
}

fn shutdown_signal() -> impl std::future::Future<Output = ()> {
    async {
        if let Err(error) = signal::ctrl_c().await {
            error!(?error, "failed to listen for shutdown signal");
        }
        info!("shutdown signal received");
    }
}
