use tracing::info;

/// Waits for whichever of interrupt/terminate/quit arrives first. On
/// non-Unix targets only Ctrl-C (interrupt) is observable.
pub async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut interrupt = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
        let mut terminate = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        let mut quit = signal(SignalKind::quit()).expect("failed to install SIGQUIT handler");

        tokio::select! {
            _ = interrupt.recv() => info!(signal = "SIGINT", "shutdown signal received"),
            _ = terminate.recv() => info!(signal = "SIGTERM", "shutdown signal received"),
            _ = quit.recv() => info!(signal = "SIGQUIT", "shutdown signal received"),
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!(signal = "CTRL_C", "shutdown signal received");
    }
}
