// src/registry.rs

//! Process-wide map of active sessions, one per client.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::session::SessionMode;

/// Shared handle to a running connection handler.
///
/// Cloning is cheap; all clones observe and control the same connection.
#[derive(Debug, Clone)]
pub struct HandlerHandle {
    pub connection_id: Uuid,
    pub client_id: Uuid,
    pub mode: SessionMode,
    abort: CancellationToken,
    closed: CancellationToken,
    connected: Arc<AtomicBool>,
}

impl HandlerHandle {
    pub fn new(client_id: Uuid, mode: SessionMode) -> Self {
        Self {
            connection_id: Uuid::new_v4(),
            client_id,
            mode,
            abort: CancellationToken::new(),
            closed: CancellationToken::new(),
            connected: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Asks the handler to close its transport. Idempotent.
    pub fn abort(&self) {
        if !self.abort.is_cancelled() {
            tracing::warn!(
                "Abort requested for {} connection {} of client_id={}",
                self.mode,
                self.connection_id,
                self.client_id
            );
        }
        self.abort.cancel();
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.is_cancelled()
    }

    /// Resolves once `abort` has been called.
    pub async fn aborted(&self) {
        self.abort.cancelled().await
    }

    /// Called by the handler itself once its transport is gone.
    pub fn mark_closed(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.closed.cancel();
    }

    /// Flags the transport as gone while the handler is still tearing down.
    pub fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Waits until the handler reports its transport closed. Returns false on timeout.
    pub async fn wait_closed(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.closed.cancelled())
            .await
            .is_ok()
    }
}

/// Enforces at most one active handler per client id.
#[derive(Default)]
pub struct SessionRegistry {
    handlers: DashMap<Uuid, HandlerHandle>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `handle` as the active handler of its client.
    ///
    /// A previous handler for the same client is aborted before the new one is
    /// installed and returned so the caller can wait for it to close. The map
    /// shard stays locked for the whole swap, so concurrent registrations for
    /// one id are serialized.
    pub fn register(&self, handle: HandlerHandle) -> Option<HandlerHandle> {
        match self.handlers.entry(handle.client_id) {
            Entry::Occupied(mut entry) => {
                let previous = entry.get().clone();
                previous.abort();
                entry.insert(handle);
                Some(previous)
            }
            Entry::Vacant(entry) => {
                entry.insert(handle);
                None
            }
        }
    }

    /// Removes the entry of `client_id` only if it still belongs to `connection_id`.
    pub fn unregister(&self, client_id: Uuid, connection_id: Uuid) -> bool {
        self.handlers
            .remove_if(&client_id, |_, handle| handle.connection_id == connection_id)
            .is_some()
    }

    /// Point-in-time copy of all entries; holds no lock once returned.
    pub fn snapshot(&self) -> Vec<HandlerHandle> {
        self.handlers
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn get(&self, client_id: Uuid) -> Option<HandlerHandle> {
        self.handlers.get(&client_id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, client_id: Uuid) -> bool {
        self.handlers.contains_key(&client_id)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Aborts every registered handler and waits up to `timeout` for each to
    /// close its transport. Returns how many did not close in time.
    pub async fn shutdown(&self, timeout: Duration) -> usize {
        let handles = self.snapshot();
        for handle in &handles {
            handle.abort();
        }

        join_all(handles.iter().map(|handle| handle.wait_closed(timeout)))
            .await
            .into_iter()
            .filter(|closed| !closed)
            .count()
    }
}
