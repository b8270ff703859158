use anyhow::Result;
use tracing::{info, warn};
use vpp_dispatch::{api, config, controller, telemetry};
use config::Config;
use telemetry::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cfg = Config::load()?;

    let app_state = controller::AppState::new(cfg.clone()).await?;
    let app = api::router(app_state.clone(), &cfg);

    let addr = cfg.server.socket_addr()?;

    if cfg.server.host == "0.0.0.0" {
        warn!(
            "Server binding to 0.0.0.0 - service will be accessible from network! \
            Bind to 127.0.0.1 unless behind a firewall/reverse proxy."
        );
    }

    info!(%addr, "starting VPP dispatch service");

    controller::spawn_controller_tasks(&app_state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(telemetry::shutdown_signal())
        .await?;

    warn!("shutdown complete");
    Ok(())
}
