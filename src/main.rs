use std::sync::Arc;

use drip_engine::config::{EngineConfig, JobSchedule};
use drip_engine::http::{EngineState, engine_routes};
use drip_engine::store::{LibSqlBackend, NurtureStore};
use drip_engine::transport::{HttpSmsTransport, SmsTransport};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = EngineConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  required: DRIP_PROVIDER_URL, DRIP_PROVIDER_TOKEN, DRIP_FROM_NUMBER");
        std::process::exit(1);
    });

    eprintln!("📨 Drip Engine v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Webhook: http://0.0.0.0:{}/webhook/sms", config.bind_port);
    eprintln!(
        "   Jobs: POST /jobs/sweep (every {}), POST /jobs/expire-snoozes (every {})",
        describe_schedule(&config.sweep_schedule),
        describe_schedule(&config.expire_schedule),
    );

    // ── Database ─────────────────────────────────────────────────────────
    let db_path = std::path::Path::new(&config.db_path);
    let store: Arc<dyn NurtureStore> =
        Arc::new(LibSqlBackend::new_local(db_path).await.unwrap_or_else(|e| {
            eprintln!("Error: Failed to open database at {}: {}", config.db_path, e);
            std::process::exit(1);
        }));
    eprintln!("   Database: {}", config.db_path);

    // ── Transport ────────────────────────────────────────────────────────
    let transport: Arc<dyn SmsTransport> = Arc::new(HttpSmsTransport::new(
        config.provider.clone(),
        config.transport_timeout,
    ));
    eprintln!(
        "   Provider: {} (from {})\n",
        config.provider.base_url, config.provider.from_number
    );

    let state = EngineState::new(&config, store, transport);

    // ── Internal job tickers ─────────────────────────────────────────────
    // External schedulers can also hit the /jobs routes; overlapping runs
    // are safe, so the built-in tickers are just a floor.
    let _sweep_handle = spawn_sweep_ticker(&state, config.sweep_schedule.clone());
    let _expire_handle = spawn_expire_ticker(&state, config.expire_schedule.clone());

    // ── HTTP server ──────────────────────────────────────────────────────
    let app = engine_routes(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.bind_port)).await?;
    tracing::info!(port = config.bind_port, "Drip engine started");
    axum::serve(listener, app).await?;

    Ok(())
}

fn describe_schedule(schedule: &JobSchedule) -> String {
    match schedule {
        JobSchedule::Every(interval) => format!("{}s", interval.as_secs()),
        JobSchedule::Cron(expr) => format!("cron {expr}"),
    }
}

/// Spawn the sweep background loop. The first tick waits one full
/// period — startup isn't a send trigger.
fn spawn_sweep_ticker(
    state: &EngineState,
    schedule: JobSchedule,
) -> tokio::task::JoinHandle<()> {
    let sweeper = Arc::clone(&state.sweeper);
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(schedule.next_delay()).await;
            if let Err(e) = sweeper.run_once().await {
                tracing::error!(error = %e, "Nurture sweep failed");
            }
        }
    })
}

/// Spawn the snooze-expiry background loop.
fn spawn_expire_ticker(
    state: &EngineState,
    schedule: JobSchedule,
) -> tokio::task::JoinHandle<()> {
    let expirer = Arc::clone(&state.expirer);
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(schedule.next_delay()).await;
            if let Err(e) = expirer.run_once(false).await {
                tracing::error!(error = %e, "Snooze expiry failed");
            }
        }
    })
}
