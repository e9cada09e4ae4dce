//! Background expiry sweep.
//!
//! Scans only catch expiry lazily, when a terminal happens to present the
//! code. The reaper closes the gap: it periodically reclassifies stale
//! pending credentials so dashboards and history converge without waiting
//! for a scan.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use gatepass_core::{AnomalyKind, Clock, GateEvent, Outcome, Role};
use gatepass_realtime::{EventRouter, Scope};
use gatepass_store::{ClaimResult, CredentialStore};

use crate::config::GateConfig;
use crate::error::Result;

/// Periodic sweeper for stale pending credentials.
pub struct ExpiryReaper<S> {
    store: Arc<S>,
    router: EventRouter,
    clock: Arc<dyn Clock>,
    interval: Duration,
}

impl<S: CredentialStore + 'static> ExpiryReaper<S> {
    pub fn new(
        store: Arc<S>,
        router: EventRouter,
        clock: Arc<dyn Clock>,
        config: &GateConfig,
    ) -> Self {
        Self {
            store,
            router,
            clock,
            interval: Duration::from_millis(config.reaper_interval_ms),
        }
    }

    /// One sweep pass. Returns how many credentials were reclassified.
    ///
    /// Each candidate goes through the same claim primitive terminals use,
    /// so a sweep racing a live scan still produces exactly one terminal
    /// transition. Losing the race is expected and skipped silently.
    pub async fn sweep_once(&self) -> Result<usize> {
        let now = self.clock.now_millis();
        let stale = self.store.expired_pending(now).await?;
        let mut swept = 0;

        for credential in stale {
            // `expires_at < now` held when the candidate was listed, and the
            // claim re-checks it under the same `now`: the requested outcome
            // is overridden to `Expired` with no decider recorded.
            match self
                .store
                .claim(&credential.code, Outcome::Deny, None, now)
                .await?
            {
                ClaimResult::Claimed(credential) => {
                    swept += 1;
                    tracing::info!(
                        credential = %credential.id,
                        order = %credential.order_ref,
                        "expired stale credential"
                    );
                    // Routine housekeeping: admins only, no security alert.
                    self.router.publish(
                        &Scope::Role(Role::Admin),
                        &GateEvent::Anomaly {
                            kind: AnomalyKind::ExpiredSweep,
                            credential_id: Some(credential.id),
                            order_ref: Some(credential.order_ref.clone()),
                            terminal: None,
                            at: now,
                        },
                    );
                }
                // A terminal decided between listing and claiming.
                ClaimResult::AlreadyDecided(_) | ClaimResult::NotFound => {}
            }
        }

        Ok(swept)
    }

    /// Run the sweep on an interval until the handle shuts it down.
    pub fn spawn(self) -> ReaperHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let interval = self.interval;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick fires immediately; skip it so startup does not
            // race store initialization.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(error) = self.sweep_once().await {
                            tracing::error!(%error, "expiry sweep failed");
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        tracing::debug!("expiry reaper shutting down");
                        break;
                    }
                }
            }
        });

        ReaperHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

/// Handle to a spawned reaper task.
pub struct ReaperHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReaperHandle {
    /// Signal shutdown and wait for the task to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}
