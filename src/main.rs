use dotenvy::dotenv;
use tracing::info;

use stripe_sync::infra::{
    app::create_app,
    config::AppConfig,
    resync::run_resync_loop,
    setup::{init_app_state, init_tracing},
};
use std::net::SocketAddr;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = AppConfig::from_env()?;
    init_tracing(config.log_file.as_deref())?;

    let resync_every = config.resync_interval_secs;
    let app_state = init_app_state(config).await?;

    let bind_addr = app_state.config.bind_addr;

    if resync_every > 0 {
        let subscription_use_cases = app_state.subscription_use_cases.clone();
        tokio::spawn(async move {
            run_resync_loop(subscription_use_cases, resync_every).await;
        });
    }

    let app = create_app(app_state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Backend listening at {}", &listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
