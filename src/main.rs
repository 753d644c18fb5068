use std::net::SocketAddr;

use dotenvy::dotenv;
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};

use rebill::application::ports::{reminder_flags::ReminderFlagStore, task_queue::TaskQueue};
use rebill::infra::{
    app::create_app,
    setup::{init_runtime, Runtime},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let Runtime {
        state,
        reaper,
        worker,
        queue,
        flags,
        pool,
    } = init_runtime().await?;

    // One process-wide cancellation signal, fanned out to every actor.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let reaper_handle = tokio::spawn(reaper.run(shutdown_rx.clone()));
    let worker_handle = tokio::spawn(worker.run(shutdown_rx.clone()));

    let bind_addr = state.config.bind_addr;
    let shutdown_grace = state.config.shutdown_grace;
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Backend listening at {}", listener.local_addr()?);

    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    let mut serve_shutdown = shutdown_rx.clone();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let _ = serve_shutdown.changed().await;
    })
    .await?;

    // Bounded drain for the background actors, then close the clients in
    // order: queue, key-value store, document store.
    let drain = async {
        let _ = reaper_handle.await;
        let _ = worker_handle.await;
    };
    if tokio::time::timeout(shutdown_grace, drain).await.is_err() {
        warn!("Background actors did not drain within the shutdown grace period");
    }

    if let Err(e) = queue.close().await {
        warn!(error = %e, "Queue client close failed");
    }
    if let Err(e) = flags.close().await {
        warn!(error = %e, "Key-value client close failed");
    }
    pool.close().await;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
