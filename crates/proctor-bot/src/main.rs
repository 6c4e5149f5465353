mod cli;
mod commands;
mod flows;
mod poller;
mod state;

use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cli::Cli;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    proctor_observe::tracing_setup::init_tracing(cli.otel)
        .map_err(|e| anyhow::anyhow!("tracing setup failed: {e}"))?;

    let config = cli.load_config()?;
    let secrets = cli.secrets();
    let app = AppState::init(&config, &secrets, cli.in_memory).await?;

    let cancel = CancellationToken::new();

    let sse_worker = {
        let channel = Arc::clone(&app.channel);
        let registry = Arc::clone(&app.registry);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            channel
                .run(
                    move |push| {
                        let registry = Arc::clone(&registry);
                        async move { registry.handle_push(&push).await }
                    },
                    cancel,
                )
                .await;
        })
    };

    info!(api = %config.api_base_url, "proctor bot running");

    tokio::select! {
        _ = poller::run(
            Arc::clone(&app.telegram),
            Arc::clone(&app.router),
            app.poll_timeout_secs,
            cancel.clone(),
        ) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    cancel.cancel();
    let _ = sse_worker.await;
    proctor_observe::tracing_setup::shutdown_tracing();
    Ok(())
}
