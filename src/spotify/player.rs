use std::{sync::Arc, time::Duration};

use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{MissedTickBehavior, interval, timeout},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{spotify::catalog::RemoteCatalogClient, types::PlaybackState};

/// Owns a running now-playing poller. Dropping the handle stops it.
pub struct PollerHandle {
    cancel: CancellationToken,
    updates: watch::Receiver<Option<PlaybackState>>,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    pub fn updates(&self) -> watch::Receiver<Option<PlaybackState>> {
        self.updates.clone()
    }

    /// Stops polling. Calling it again does nothing.
    pub fn stop(&self) {
        if !self.cancel.is_cancelled() {
            debug!("stopping now-playing poller");
            self.cancel.cancel();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stops the poller and waits for its task to exit.
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "poller task ended abnormally");
            }
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Polls the currently-playing endpoint every `every`.
///
/// A poll that takes longer than `fetch_timeout` is abandoned and the last
/// known state is published again instead.
pub fn spawn_poller(
    client: Arc<RemoteCatalogClient>,
    every: Duration,
    fetch_timeout: Duration,
) -> PollerHandle {
    let cancel = CancellationToken::new();
    let (tx, updates) = watch::channel(None);

    let token = cancel.clone();
    let task = tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_known: Option<PlaybackState> = None;

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let polled = tokio::select! {
                _ = token.cancelled() => break,
                polled = timeout(fetch_timeout, client.get_currently_playing()) => polled,
            };

            match polled {
                Ok(state) => {
                    last_known = state.clone();
                    tx.send_replace(state);
                }
                Err(_) => {
                    debug!("now-playing poll timed out, keeping last known state");
                    tx.send_replace(last_known.clone());
                }
            }
        }
        debug!("now-playing poller exited");
    });

    PollerHandle {
        cancel,
        updates,
        task: Some(task),
    }
}
