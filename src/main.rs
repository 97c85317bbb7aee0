use mimalloc::MiMalloc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = dbpanel::config::Config::load()?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cfg.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        database_url = %cfg.database_url,
        upload_root = %cfg.upload_root.display(),
        upload_url_prefix = %cfg.upload_url_prefix,
        watermark = %cfg.watermark_file.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "<none>".to_string()),
        loglevel = %cfg.loglevel,
    );
    if cfg.panel_key.is_empty() {
        warn!("PANEL_PANEL_KEY is not set; every API request will be rejected");
    }

    let state = dbpanel::router::PanelState::build(&cfg).await?;
    info!(drivers = ?state.drivers.names(), clients = ?state.uploader.registry().names(), "panel ready");
    let app = dbpanel::router::panel_router(state);

    let listener = TcpListener::bind(&cfg.listen_addr).await?;
    info!("HTTP server listening on {}", cfg.listen_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for shutdown signal");
            }
            info!("shutting down");
        })
        .await?;
    Ok(())
}
