//! Observable application auth state.

use crate::rpc::Profile;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Who the application believes is signed in.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthStatus {
    Anonymous,
    Authenticated(Profile),
}

/// Point-in-time view of [`AppAuthState`].
#[derive(Debug, Clone, PartialEq)]
pub struct AppAuthSnapshot {
    /// Set once startup has decided the initial auth status.
    pub ready: bool,
    pub status: AuthStatus,
}

impl AppAuthSnapshot {
    pub fn is_authenticated(&self) -> bool {
        matches!(self.status, AuthStatus::Authenticated(_))
    }

    pub fn profile(&self) -> Option<&Profile> {
        match &self.status {
            AuthStatus::Authenticated(profile) => Some(profile),
            AuthStatus::Anonymous => None,
        }
    }
}

/// Application auth state shared with the UI.
///
/// Starts not ready and anonymous. Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct AppAuthState {
    tx: Arc<watch::Sender<AppAuthSnapshot>>,
}

impl Default for AppAuthState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppAuthState {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(AppAuthSnapshot {
            ready: false,
            status: AuthStatus::Anonymous,
        });
        Self { tx: Arc::new(tx) }
    }

    /// Current state.
    pub fn snapshot(&self) -> AppAuthSnapshot {
        self.tx.borrow().clone()
    }

    /// Receive every subsequent change.
    pub fn subscribe(&self) -> watch::Receiver<AppAuthSnapshot> {
        self.tx.subscribe()
    }

    pub fn is_ready(&self) -> bool {
        self.tx.borrow().ready
    }

    pub fn set_authenticated(&self, profile: Profile) {
        debug!(user_id = %profile.id, "App auth state: authenticated");
        self.tx.send_modify(|snapshot| {
            snapshot.status = AuthStatus::Authenticated(profile);
        });
    }

    /// Drop the signed-in user.
    pub fn clear_auth(&self) {
        debug!("App auth state: anonymous");
        self.tx.send_if_modified(|snapshot| {
            let changed = snapshot.status != AuthStatus::Anonymous;
            snapshot.status = AuthStatus::Anonymous;
            changed
        });
    }

    /// Mark startup as finished. Returns false if it already was.
    pub fn mark_ready(&self) -> bool {
        let newly_ready = self.tx.send_if_modified(|snapshot| {
            let newly_ready = !snapshot.ready;
            snapshot.ready = true;
            newly_ready
        });
        if !newly_ready {
            warn!("Auth state was already marked ready");
        }
        newly_ready
    }
}
