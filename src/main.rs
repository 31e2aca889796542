use anyhow::Result;
use solar_planner::{config, controller, telemetry};
use config::Config;
use telemetry::init_tracing;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cfg = Config::load()?;
    init_tracing(&cfg.telemetry);
    info!(
        slot_length_minutes = cfg.planner.slot_length_minutes,
        slot_count = cfg.planner.slot_count,
        timezone = %cfg.planner.timezone,
        "starting solar planner"
    );

    let app_state = controller::AppState::new(cfg).await?;

    telemetry::shutdown_signal().await;

    let status = app_state.orchestrator.dispatch_status().await;
    warn!(
        runs = status.run_count,
        started = status.started_count,
        errors = status.error_count,
        "shutdown complete"
    );
    Ok(())
}
