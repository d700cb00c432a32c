use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;

use time_delay_queue::config::Settings;
use time_delay_queue::server::{create_app, AppState};
use time_delay_queue::tasks::PurgeTask;
use time_delay_queue::telemetry::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::new()?;

    // Initialize tracing
    init_tracing(&settings.telemetry)?;
    tracing::info!(
        delay_ms = settings.queue.delay_ms,
        purge_interval_ms = settings.queue.purge_interval_ms,
        "Configuration loaded"
    );

    // Create application state
    let state = AppState::new(settings.clone());

    // Start purge task in background
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let purge_task = PurgeTask::new(
        settings.queue.purge_interval(),
        Arc::clone(&state.registry),
        shutdown_tx.subscribe(),
    );
    let purge_handle = tokio::spawn(async move {
        purge_task.run().await;
    });

    let app = create_app(state);

    // Start server
    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_handler(shutdown_tx))
        .await?;

    tracing::info!("Waiting for background tasks to finish...");
    let _ = purge_handle.await;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal_handler(shutdown_tx: broadcast::Sender<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }

    // Stop background tasks
    let _ = shutdown_tx.send(());
}
