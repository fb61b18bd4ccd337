use firstboot::{
    config::AppConfig,
    db,
    probe::{self, SearchPath},
    setup,
};
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Initialize logging first
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "firstboot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting firstboot v{}", env!("CARGO_PKG_VERSION"));

    // Probes may only recommend changes; apply them before the snapshot is shared
    let mut config = AppConfig::load()?;
    let report = probe::run_probes(&config, &SearchPath::from_env());
    for change in report.overrides() {
        config.apply(change);
    }
    let config = config.freeze();
    info!(
        extractor = %config.scanner.extractor,
        unavailable_integrations = report.unavailable_integrations.len(),
        "Configuration loaded"
    );

    let pool = db::connect(&config.database).await?;
    info!("Database connected: {}", config.database.url);

    db::init_db(&pool).await?;

    let outcome = match setup::run_initial_setup(&pool, config).await {
        Ok(outcome) => outcome,
        Err(e) => {
            if e.is_fatal_invariant() {
                error!("Store is in an unknown state, refusing to start: {}", e);
            } else {
                error!("Initial setup failed: {}", e);
            }
            pool.close().await;
            return Err(e.into());
        }
    };
    setup::report(&outcome);
    if let Ok(json) = serde_json::to_string(&outcome) {
        debug!(outcome = %json, "Initial setup result");
    }

    let state = setup::bootstrap_state(&pool).await?;
    info!(%state, "Store ready");

    pool.close().await;
    Ok(())
}
