//! CLI utility functions

use miette::{IntoDiagnostic, Result};
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub fn create_tokio_runtime() -> Result<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .into_diagnostic()
}

/// Cancel `halt` on the first SIGINT or SIGTERM.
pub async fn shutdown_signal(halt: CancellationToken) -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate()).into_diagnostic()?;
        let mut sigint = signal(SignalKind::interrupt()).into_diagnostic()?;
        tokio::select! {
            _ = sigterm.recv() => info!("SIGTERM received, beginning shutdown"),
            _ = sigint.recv() => info!("SIGINT received, beginning shutdown"),
            _ = halt.cancelled() => return Ok(()),
        }
    }

    #[cfg(not(unix))]
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.into_diagnostic()?;
            info!("Ctrl-C received, beginning shutdown");
        }
        _ = halt.cancelled() => return Ok(()),
    }

    halt.cancel();
    Ok(())
}
