use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use burstwatch_api::routes::create_router;
use burstwatch_api::state::AppState;
use burstwatch_common::config::AppConfig;
use burstwatch_engine::registry::AddressRegistry;
use burstwatch_engine::state::WalletStateStore;
use burstwatch_notifier::{LogSink, NotificationSink, WebhookSink};
use burstwatch_poller::fetcher::{FetchPolicy, ResilientFetcher};
use burstwatch_poller::rate_limiter::KeyRotator;
use burstwatch_poller::scheduler::{BatchPollScheduler, SchedulerConfig};
use burstwatch_poller::source::ExplorerSource;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "burstwatch_poller=info,burstwatch_engine=info,burstwatch_api=info,burstwatch_notifier=info,tower_http=info"
                    .into()
            }),
        )
        .json()
        .init();

    tracing::info!("Burstwatch starting...");

    // Load configuration
    let config = AppConfig::from_env()?;

    let registry = AddressRegistry::load(&config.registry_path)?;
    let states = WalletStateStore::default();

    let keys = Arc::new(KeyRotator::new(
        config.explorer_api_keys.clone(),
        config.key_spacing(),
    )?);
    tracing::info!(
        keys = keys.len(),
        spacing_ms = config.key_spacing_ms,
        "API key rotation configured"
    );

    let source = Arc::new(ExplorerSource::new(config.explorer_api_url.clone())?);
    let fetcher = Arc::new(
        ResilientFetcher::new(source, keys, FetchPolicy::from_config(&config))
            .with_height_floor(config.height_floor),
    );

    let sink: Arc<dyn NotificationSink> = match &config.webhook_url {
        Some(url) => Arc::new(WebhookSink::new(url.clone())?),
        None => {
            tracing::warn!("WEBHOOK_URL not set, notifications will only be logged");
            Arc::new(LogSink)
        }
    };

    let scheduler = BatchPollScheduler::new(
        fetcher,
        states.clone(),
        registry.clone(),
        sink,
        SchedulerConfig::from_config(&config),
    );

    let cancel = CancellationToken::new();

    // Command API
    let app = create_router(AppState::new(registry, states))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());
    let listener = tokio::net::TcpListener::bind(&config.api_bind_addr).await?;
    tracing::info!(addr = %config.api_bind_addr, "API server listening");

    let api_cancel = cancel.clone();
    let api = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { api_cancel.cancelled().await })
            .await
    });

    // Graceful shutdown on Ctrl+C
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            return;
        }
        tracing::info!("Received shutdown signal, stopping gracefully...");
        signal_cancel.cancel();
    });

    scheduler.run(cancel.clone()).await;

    cancel.cancel();
    match api.await {
        Ok(Err(e)) => tracing::error!(error = %e, "API server exited with error"),
        Err(e) => tracing::error!(error = %e, "API server task panicked"),
        Ok(Ok(())) => {}
    }

    tracing::info!("Burstwatch stopped.");
    Ok(())
}
