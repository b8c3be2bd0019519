//! Shutdown signal handling
//!
//! The first Ctrl-C (or SIGTERM on Unix) asks the running session to wind
//! down. Later signals are delivered again, so a second Ctrl-C can be used
//! to abort a wind-down that hangs.

use std::io;

use tokio::sync::mpsc;
use tracing::debug;

/// Receiver of OS shutdown requests
pub struct ShutdownSignal {
    receiver: mpsc::Receiver<()>,
}

impl ShutdownSignal {
    /// Start listening for shutdown signals. Must be called inside a runtime.
    pub fn new() -> Result<Self, io::Error> {
        let (tx, rx) = mpsc::channel(4);

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let mut sigterm = signal(SignalKind::terminate())?;
            let tx_term = tx.clone();
            tokio::spawn(async move {
                while sigterm.recv().await.is_some() {
                    debug!("received SIGTERM");
                    if tx_term.send(()).await.is_err() {
                        break;
                    }
                }
            });
        }

        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                debug!("received Ctrl-C");
                if tx.send(()).await.is_err() {
                    break;
                }
            }
        });

        Ok(Self { receiver: rx })
    }

    /// Wait for the next shutdown request
    pub async fn recv(&mut self) {
        if self.receiver.recv().await.is_none() {
            std::future::pending::<()>().await;
        }
    }
}
