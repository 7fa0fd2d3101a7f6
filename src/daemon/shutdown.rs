use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Cancels `cancelation` once the process is asked to stop. On unix both SIGINT and SIGTERM count,
/// the latter is what `dailystreak stop` sends.
pub async fn detect_shutdown(cancelation: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                select! {
                    _ = tokio::signal::ctrl_c() => info!("Received interrupt"),
                    _ = terminate.recv() => info!("Received terminate"),
                    _ = cancelation.cancelled() => (),
                };
            }
            Err(e) => {
                tracing::warn!("Can't listen for SIGTERM {e:?}");
                select! {
                    _ = tokio::signal::ctrl_c() => info!("Received interrupt"),
                    _ = cancelation.cancelled() => (),
                };
            }
        }
    }
    #[cfg(not(unix))]
    {
        select! {
            _ = tokio::signal::ctrl_c() => info!("Received interrupt"),
            _ = cancelation.cancelled() => (),
        };
    }
    cancelation.cancel();
}
