use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::info;

use slotwise::app::AppState;
use slotwise::config::Config;
use slotwise::{observability, seed, wire};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    observability::init(config.metrics_port)?;

    let tls_acceptor = slotwise::tls::load_tls_acceptor(config.tls.as_ref())?;
    let state = AppState::new(config.policy.clone(), config.blocked_time);

    if let Some(path) = &config.seed_file {
        let summary = seed::apply_seed(seed::load_seed(path)?, &state.tenants, &state.store)?;
        info!(
            "seeded {} tenants: {} day_hours, {} closures, {} bookings, {} blocked_time from {}",
            summary.tenants,
            summary.day_hours,
            summary.closures,
            summary.bookings,
            summary.blocked_time,
            path.display()
        );
    }

    let max_connections = config.max_connections;
    let semaphore = Arc::new(Semaphore::new(max_connections));

    let addr = config.listen_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("slotwise listening on {addr}");
    info!("  max_connections: {max_connections}");
    info!("  tls: {}", if tls_acceptor.is_some() { "enabled" } else { "disabled" });
    info!("  lookup: {:?}", config.policy.lookup);
    info!(
        "  default hours: {}-{}",
        config.policy.default_open.format("%H:%M"),
        config.policy.default_close.format("%H:%M")
    );
    info!("  conflict sources: {:?}", state.engine.source_kinds());
    info!("  metrics: {}", config.metrics_port.map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics")));

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (socket, peer) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::error!("accept error: {e}");
                        continue;
                    }
                };

                let Ok(permit) = semaphore.clone().try_acquire_owned() else {
                    tracing::warn!("connection limit reached, rejecting {peer}");
                    metrics::counter!(observability::CONNECTIONS_REJECTED_TOTAL).increment(1);
                    continue;
                };

                tracing::debug!("connection from {peer}");
                metrics::counter!(observability::CONNECTIONS_TOTAL).increment(1);
                metrics::gauge!(observability::CONNECTIONS_ACTIVE).increment(1.0);
                let state = state.clone();
                let password = config.password.clone();
                let tls = tls_acceptor.clone();

                tokio::spawn(async move {
                    if let Err(e) = wire::process_connection(socket, state, password, tls).await {
                        tracing::error!("connection error from {peer}: {e}");
                    }
                    metrics::gauge!(observability::CONNECTIONS_ACTIVE).decrement(1.0);
                    drop(permit);
                });
            }
            _ = &mut shutdown => {
                info!("shutdown signal received, stopping accept loop");
                break;
            }
        }
    }

    drain(&semaphore, max_connections, Duration::from_secs(10)).await;
    info!("slotwise stopped");
    Ok(())
}

/// Resolves on ctrl-c, or SIGTERM where available.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
                return;
            }
            Err(e) => tracing::warn!("cannot register SIGTERM handler: {e}"),
        }
    }
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("cannot listen for ctrl-c: {e}");
    }
}

/// Waits until every connection permit is returned or `timeout` passes.
async fn drain(semaphore: &Semaphore, max_connections: usize, timeout: Duration) {
    info!("draining connections...");
    let drained = tokio::time::timeout(timeout, async {
        while semaphore.available_permits() < max_connections {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    })
    .await;
    match drained {
        Ok(()) => info!("all connections drained"),
        Err(_) => {
            let open = max_connections - semaphore.available_permits();
            tracing::warn!("drain timeout, {open} connections still open");
        }
    }
}
