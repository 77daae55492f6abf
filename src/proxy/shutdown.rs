use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio::sync::Notify;

/// Coordinates process shutdown and tracks exchanges still in flight.
///
/// An exchange counts as in flight from the moment it is accepted until its
/// audit record is persisted, which for streamed responses is after the
/// HTTP handler has already returned.
pub struct ShutdownManager {
    shutdown: AtomicBool,
    notify: Notify,
    in_flight: AtomicUsize,
}

impl ShutdownManager {
    pub fn new() -> Self {
        Self {
            shutdown: AtomicBool::new(false),
            notify: Notify::new(),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Wait for SIGINT or SIGTERM, then signal shutdown.
    pub async fn wait_for_signal(&self) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
            tokio::select! {
                result = signal::ctrl_c() => result?,
                _ = sigterm.recv() => {},
            }
        }

        #[cfg(not(unix))]
        {
            signal::ctrl_c().await?;
        }

        tracing::info!("shutdown signal received");
        self.signal_shutdown();
        Ok(())
    }

    pub fn signal_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    pub async fn wait_for_shutdown(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_shutting_down() {
                return;
            }
            notified.await;
        }
    }

    /// Register an exchange; it stays in flight until the guard drops.
    pub fn track(self: &Arc<Self>) -> InFlightGuard {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        InFlightGuard {
            shutdown: Arc::clone(self),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Returns `true` when every exchange finished before the timeout.
    pub async fn wait_for_in_flight(&self, timeout: Duration) -> bool {
        let active = self.in_flight();
        if active > 0 {
            tracing::info!(active, "waiting for in-flight exchanges");
        }

        let start = tokio::time::Instant::now();
        while start.elapsed() < timeout {
            if self.in_flight() == 0 {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        let remaining = self.in_flight();
        if remaining > 0 {
            tracing::warn!(remaining, "forced shutdown after grace period");
        }
        remaining == 0
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}

pub struct InFlightGuard {
    shutdown: Arc<ShutdownManager>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.shutdown.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
