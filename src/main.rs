use std::sync::Arc;

use ride_request_notifier::{
    NotifierResult,
    handlers,
    state::{AppConfig, AppState},
    telemetry::init_logging,
};

#[tokio::main]
async fn main() -> NotifierResult<()> {
    let config = AppConfig::from_env()?;
    init_logging(config.log_format);

    let addr = (config.host.clone(), config.port);
    let app_state = AppState::new(config).await?;
    let app = handlers::router(Arc::new(app_state));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = on_signal("ctrl-c", tokio::signal::ctrl_c());

    #[cfg(unix)]
    let terminate = on_signal("SIGTERM", async {
        let mut signal = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        signal.recv().await;
        Ok::<(), std::io::Error>(())
    });

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Resolves when `signal` fires. If the handler cannot be installed it
/// never resolves, leaving shutdown to the other signals.
async fn on_signal<E: std::fmt::Display>(name: &str, signal: impl Future<Output = Result<(), E>>) {
    if let Err(e) = signal.await {
        tracing::error!("Failed to listen for {}: {}", name, e);
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_signal_resolves_when_fired() {
        let fired = on_signal("test", async { Ok::<(), std::io::Error>(()) });
        assert!(tokio::time::timeout(Duration::from_millis(100), fired).await.is_ok());
    }

    #[tokio::test]
    async fn test_failed_handler_install_never_resolves() {
        let broken = on_signal("test", async { Err::<(), _>(std::io::Error::other("no signal support")) });
        assert!(tokio::time::timeout(Duration::from_millis(100), broken).await.is_err());
    }
}
