// src/reaper.rs

//! Background sweeps that drop dead registry entries and delete anonymous
//! accounts that were abandoned before any real progress was made.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{
    config::ReaperConfig, models::client::ClientProfile, registry::SessionRegistry,
    store::ClientStore,
};

#[derive(Clone)]
pub struct ReaperService {
    registry: Arc<SessionRegistry>,
    clients: Arc<dyn ClientStore>,
    config: ReaperConfig,
}

/// Running sweep tasks. Dropping it leaves them running until the runtime stops.
pub struct ReaperHandle {
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl ReaperHandle {
    /// Stops both sweeps and waits for an in-flight pass to finish.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::error!("Reaper task ended abnormally: {}", e);
            }
        }
    }
}

impl ReaperService {
    pub fn new(
        registry: Arc<SessionRegistry>,
        clients: Arc<dyn ClientStore>,
        config: ReaperConfig,
    ) -> Self {
        Self {
            registry,
            clients,
            config,
        }
    }

    /// Young, disposable accounts without progress may be deleted.
    fn is_reapable(&self, profile: &ClientProfile, now: DateTime<Utc>) -> bool {
        let grace = chrono::Duration::from_std(self.config.grace_period)
            .unwrap_or(chrono::Duration::MAX);

        profile.is_disposable(&self.config.test_account_prefix)
            && profile.practice_index < self.config.min_practice_index
            && now.signed_duration_since(profile.created_at) > grace
    }

    /// Drops registry entries whose transport is gone, deleting the owning
    /// account when it is reapable. Returns the number of entries dropped.
    pub async fn sweep_orphans(&self, now: DateTime<Utc>) -> usize {
        let mut dropped = 0;

        for handle in self.registry.snapshot() {
            if handle.is_connected() {
                continue;
            }

            match self.clients.get_client(handle.client_id).await {
                Ok(Some(profile)) if self.is_reapable(&profile, now) => {
                    match self.clients.delete_client(profile.client_id).await {
                        Ok(_) => tracing::info!(
                            "Deleted orphaned anonymous account client_id={}",
                            profile.client_id
                        ),
                        Err(e) => tracing::error!(
                            "Failed to delete orphaned account client_id={}: {:?}",
                            profile.client_id,
                            e
                        ),
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(
                        "Failed to load orphaned client_id={}: {:?}",
                        handle.client_id,
                        e
                    );
                }
            }

            if self
                .registry
                .unregister(handle.client_id, handle.connection_id)
            {
                dropped += 1;
            }
        }

        if dropped > 0 {
            tracing::info!("Orphan sweep dropped {} stale handler(s)", dropped);
        }
        dropped
    }

    /// Deletes reapable accounts that have no registered handler. Returns the
    /// number of accounts deleted.
    pub async fn sweep_forgotten(&self, now: DateTime<Utc>) -> usize {
        let candidates = match self
            .clients
            .list_disposable_clients(&self.config.test_account_prefix)
            .await
        {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::error!("Failed to list disposable accounts: {:?}", e);
                return 0;
            }
        };

        let mut deleted = 0;
        for profile in candidates {
            if !self.is_reapable(&profile, now) || self.registry.contains(profile.client_id) {
                continue;
            }

            match self.clients.delete_client(profile.client_id).await {
                Ok(true) => {
                    deleted += 1;
                    tracing::debug!("Deleted forgotten account client_id={}", profile.client_id);
                }
                Ok(false) => {}
                Err(e) => tracing::error!(
                    "Failed to delete forgotten account client_id={}: {:?}",
                    profile.client_id,
                    e
                ),
            }
        }

        if deleted > 0 {
            tracing::info!("Forgotten-account sweep deleted {} account(s)", deleted);
        }
        deleted
    }

    /// Starts both sweeps on their own intervals.
    pub fn spawn(self) -> ReaperHandle {
        let shutdown = CancellationToken::new();

        let orphans = {
            let service = self.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(service.config.orphan_interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = ticker.tick() => {
                            service.sweep_orphans(Utc::now()).await;
                        }
                    }
                }
                tracing::debug!("Orphan sweep stopped");
            })
        };

        let forgotten = {
            let service = self;
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(service.config.forgotten_interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = ticker.tick() => {
                            service.sweep_forgotten(Utc::now()).await;
                        }
                    }
                }
                tracing::debug!("Forgotten-account sweep stopped");
            })
        };

        ReaperHandle {
            shutdown,
            tasks: vec![orphans, forgotten],
        }
    }
}
