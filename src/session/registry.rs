//! Session registry: the client-side cache of the server's session list
//! plus the "currently selected" session.
//!
//! The registry guarantees that after a deletion the selection never points
//! at a session that no longer exists. Dependents that key only on the
//! selection's identity still get notified when a deletion happens while
//! nothing was selected: the `forced_clears` counter bumps, so the signal
//! value changes even though the selection itself did not.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{Mutex, RwLock, watch};
use tracing::{debug, warn};

use crate::api::{ChatSession, PageResult};
use crate::client::{Result, SessionDirectory};

// ============================================================================
// Signals
// ============================================================================

/// Snapshot of the selection state, published on every observable change.
///
/// A dependent sees a change when either the selected id differs or
/// `forced_clears` has advanced — the latter disambiguates "still nothing
/// selected" from "a mutation invalidated the view, reset it".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SelectionSignal {
    /// Currently selected session, if any.
    pub current: Option<i64>,
    /// Monotonic count of reconciliations that fired while nothing was
    /// selected.
    pub forced_clears: u64,
}

#[derive(Default)]
struct RegistryState {
    sessions: Vec<ChatSession>,
    current: Option<i64>,
    forced_clears: u64,
}

impl RegistryState {
    fn signal(&self) -> SelectionSignal {
        SelectionSignal {
            current: self.current,
            forced_clears: self.forced_clears,
        }
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Client-side registry of chat sessions.
///
/// Thread-safe and cheap to clone. `refresh()` is the only cache mutator;
/// concurrent refreshes serialize and the last completed fetch wins.
#[derive(Clone)]
pub struct SessionRegistry {
    directory: Arc<dyn SessionDirectory>,
    state: Arc<RwLock<RegistryState>>,
    /// Serializes refresh() calls end to end (fetch + swap).
    refresh_lock: Arc<Mutex<()>>,
    changes: Arc<watch::Sender<SelectionSignal>>,
}

impl SessionRegistry {
    /// Create a registry backed by the given directory.
    #[must_use]
    pub fn new(directory: Arc<dyn SessionDirectory>) -> Self {
        let (changes, _) = watch::channel(SelectionSignal::default());
        Self {
            directory,
            state: Arc::new(RwLock::new(RegistryState::default())),
            refresh_lock: Arc::new(Mutex::new(())),
            changes: Arc::new(changes),
        }
    }

    /// Subscribe to selection changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SelectionSignal> {
        self.changes.subscribe()
    }

    // ------------------------------------------------------------------------
    // Cache
    // ------------------------------------------------------------------------

    /// Re-fetch the session list and replace the cache atomically.
    ///
    /// The server may answer with a bare array or a pagination envelope;
    /// both are accepted. Any other shape degrades to an empty cache with a
    /// logged anomaly — a broken listing must not take the view down.
    pub async fn refresh(&self) -> Result<()> {
        let _guard = self.refresh_lock.lock().await;

        let value = self.directory.fetch_sessions().await?;
        let sessions = match normalize_session_list(value) {
            Some(sessions) => sessions,
            None => {
                warn!("session list response had an unexpected shape; clearing cache");
                Vec::new()
            }
        };

        debug!(count = sessions.len(), "session cache refreshed");
        self.state.write().await.sessions = sessions;
        Ok(())
    }

    /// The cached session list, most recent refresh.
    pub async fn sessions(&self) -> Vec<ChatSession> {
        self.state.read().await.sessions.clone()
    }

    // ------------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------------

    /// Delete a session server-side, refresh the cache, and reconcile the
    /// selection.
    ///
    /// A selection that no longer resolves is cleared (an observable
    /// change). A selection that was already empty bumps `forced_clears`
    /// instead, so identity-keyed dependents still re-evaluate. A selection
    /// that still resolves is left untouched and nothing is signalled.
    pub async fn delete(&self, session_id: i64) -> Result<()> {
        self.directory.delete_session(session_id).await?;
        self.refresh().await?;

        let mut state = self.state.write().await;
        match state.current {
            Some(selected) if !state.sessions.iter().any(|s| s.id == selected) => {
                debug!(session_id = selected, "selection no longer resolves; clearing");
                state.current = None;
                self.changes.send_replace(state.signal());
            }
            Some(_) => {}
            None => {
                state.forced_clears += 1;
                self.changes.send_replace(state.signal());
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------------

    /// Select a session.
    pub async fn select(&self, session_id: i64) {
        let mut state = self.state.write().await;
        state.current = Some(session_id);
        self.changes.send_replace(state.signal());
    }

    /// Clear the selection.
    pub async fn clear_selection(&self) {
        let mut state = self.state.write().await;
        state.current = None;
        self.changes.send_replace(state.signal());
    }

    /// The currently selected session, if any.
    pub async fn current(&self) -> Option<i64> {
        self.state.read().await.current
    }

    /// How many forced clears have fired since construction.
    pub async fn forced_clears(&self) -> u64 {
        self.state.read().await.forced_clears
    }
}

/// Normalize the session list payload.
///
/// Accepts a bare array or a `{records: [...]}` pagination envelope.
/// Returns `None` for every other shape (including null).
fn normalize_session_list(value: Value) -> Option<Vec<ChatSession>> {
    match value {
        Value::Array(_) => serde_json::from_value(value).ok(),
        Value::Object(_) => serde_json::from_value::<PageResult<ChatSession>>(value)
            .ok()
            .map(|page| page.records),
        _ => None,
    }
}
