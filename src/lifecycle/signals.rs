//! OS signal handling.
//!
//! SIGINT/SIGTERM become terminate triggers, SIGUSR1 becomes a reload
//! trigger. Reload triggers are coalesced: while one is still queued,
//! further SIGUSR1s are dropped.

use tokio::sync::mpsc;

/// Receivers for the two signal-driven trigger kinds.
pub struct SignalTriggers {
    pub terminate: mpsc::Receiver<()>,
    pub reload: mpsc::Receiver<()>,
}

/// Install signal handlers and forward them on a background task.
#[cfg(unix)]
pub fn listen() -> std::io::Result<SignalTriggers> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut user1 = signal(SignalKind::user_defined1())?;

    let (terminate_tx, terminate_rx) = mpsc::channel(1);
    let (reload_tx, reload_rx) = mpsc::channel(1);

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = interrupt.recv() => {
                    tracing::info!(signal = "SIGINT", "Received termination signal");
                    let _ = terminate_tx.try_send(());
                }
                _ = terminate.recv() => {
                    tracing::info!(signal = "SIGTERM", "Received termination signal");
                    let _ = terminate_tx.try_send(());
                }
                _ = user1.recv() => {
                    tracing::info!(signal = "SIGUSR1", "Received reload signal");
                    if reload_tx.try_send(()).is_err() {
                        tracing::debug!("Reload already pending");
                    }
                }
            }
        }
    });

    Ok(SignalTriggers {
        terminate: terminate_rx,
        reload: reload_rx,
    })
}

/// Ctrl+C only; there is no reload signal on this platform.
#[cfg(not(unix))]
pub fn listen() -> std::io::Result<SignalTriggers> {
    let (terminate_tx, terminate_rx) = mpsc::channel(1);
    let (reload_tx, reload_rx) = mpsc::channel(1);

    tokio::spawn(async move {
        let _reload_tx = reload_tx;
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!(signal = "ctrl-c", "Received termination signal");
            let _ = terminate_tx.send(()).await;
        }
    });

    Ok(SignalTriggers {
        terminate: terminate_rx,
        reload: reload_rx,
    })
}
