//! Bootstrap synchronization
//!
//! Pull-based reconciliation of the mirror against the server, run right
//! after startup or reconnection and then periodically as a safety net for
//! change-stream events missed while disconnected.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::ClientResult;
use crate::http::ApiClient;
use crate::mirror::MirrorStore;

/// Pulls authoritative state into the mirror
#[derive(Clone)]
pub struct BootstrapSync {
    api: ApiClient,
    mirror: MirrorStore,
    in_flight: Arc<AtomicBool>,
}

impl BootstrapSync {
    pub fn new(api: ApiClient, mirror: MirrorStore) -> Self {
        Self {
            api,
            mirror,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Reconcile the mirror against a full server pull
    ///
    /// Single-flight: overlapping triggers (reconnect plus the periodic
    /// timer) collapse into one pull. Returns `false` when skipped.
    pub async fn reconcile(&self) -> ClientResult<bool> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(false);
        }

        let result = self.run_pull().await;
        self.in_flight.store(false, Ordering::SeqCst);
        result.map(|_| true)
    }

    async fn run_pull(&self) -> ClientResult<()> {
        let menu = self.api.fetch_menu().await?;
        let orders = self.api.fetch_active_orders().await?;

        self.mirror.replace_menu(&menu)?;
        self.mirror.reconcile_orders(&orders)?;

        tracing::info!(
            menu_entries = menu.len(),
            active_orders = orders.len(),
            "bootstrap reconciliation complete"
        );
        Ok(())
    }

    /// Run `reconcile` every `interval` until the token is cancelled
    pub fn spawn_periodic(&self, interval: Duration, cancel: CancellationToken) {
        let this = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = this.reconcile().await {
                            tracing::warn!("periodic bootstrap failed: {e}");
                        }
                    }
                    _ = cancel.cancelled() => break,
                }
            }
        });
    }
}
