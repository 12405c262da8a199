//! Session state fan-out
//!
//! One pump task owns the subscription to the auth change stream and applies
//! every event to the mounts registered for that client. Each mount gets its
//! own watch channel; dropping the mount removes its sender from the registry,
//! which closes the channel for anyone still observing it.

use moka::future::Cache;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::{AuthChange, AuthClient, SessionContext};
use crate::config::SessionConfig;
use crate::models::{ClientId, SessionState};

type MountRegistry = HashMap<ClientId, HashMap<u64, watch::Sender<SessionState>>>;

/// Process-wide view of every client's session state.
pub struct SessionHub {
    auth: Arc<AuthClient>,
    known: Cache<ClientId, SessionState>,
    mounts: Mutex<MountRegistry>,
    next_mount: AtomicU64,
}

impl SessionHub {
    /// Create the hub and start pumping the auth change stream into it.
    ///
    /// The pump holds only a weak reference and stops once the hub is dropped
    /// or the stream closes.
    pub fn spawn(auth: Arc<AuthClient>, config: &SessionConfig) -> Arc<Self> {
        let mut changes = auth.subscribe();
        let hub = Arc::new(Self {
            auth,
            known: Cache::builder().time_to_idle(config.max_age()).build(),
            mounts: Mutex::new(HashMap::new()),
            next_mount: AtomicU64::new(1),
        });

        let weak = Arc::downgrade(&hub);
        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) => {
                        let Some(hub) = weak.upgrade() else { break };
                        hub.apply(change).await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Session change stream lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!("Session change pump stopped");
        });

        hub
    }

    pub fn auth(&self) -> &Arc<AuthClient> {
        &self.auth
    }

    fn registry(&self) -> MutexGuard<'_, MountRegistry> {
        self.mounts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up the client's user; any failure degrades to `Anonymous`.
    async fn fetch_state(auth: &AuthClient, client: &ClientId) -> SessionState {
        match auth.current_user(client).await {
            Ok(user) => SessionState::from_user(user),
            Err(e) => {
                debug!(client = %client, error = %e, "Session lookup failed; treating as anonymous");
                SessionState::Anonymous
            }
        }
    }

    /// Apply one change-stream event to the client's known state and mounts
    pub(crate) async fn apply(&self, change: AuthChange) {
        let state = SessionState::from_user(change.user);
        debug!(client = %change.client, event = ?change.event, "Applying session change");
        self.known.insert(change.client.clone(), state.clone()).await;
        self.publish(&change.client, &state);
    }

    fn publish(&self, client: &ClientId, state: &SessionState) {
        let registry = self.registry();
        for sender in registry.get(client).into_iter().flat_map(HashMap::values) {
            sender.send_replace(state.clone());
        }
    }

    /// Record a state the caller has just established, ahead of the pump
    pub async fn remember(&self, client: &ClientId, state: SessionState) {
        self.known.insert(client.clone(), state).await;
    }

    /// Last known state for the client, fetched and recorded on first use
    pub async fn resolve(&self, client: &ClientId) -> SessionState {
        if let Some(state) = self.known.get(client).await {
            return state;
        }
        let state = Self::fetch_state(&self.auth, client).await;
        self.known.insert(client.clone(), state.clone()).await;
        state
    }

    /// Resolve the client's state together with its access token.
    ///
    /// A state that claims a user while no token is left is corrected to
    /// `Anonymous`.
    pub async fn context(&self, client: &ClientId) -> SessionContext {
        let state = self.resolve(client).await;
        self.attach_token(client, state).await
    }

    /// Like [`context`](Self::context), but checks the user with the auth
    /// service instead of trusting the last known state.
    ///
    /// A token revoked remotely shows up here as `Anonymous`; the auth client
    /// drops the session and its `SignedOut` reaches every mount.
    pub async fn verified_context(&self, client: &ClientId) -> SessionContext {
        let state = Self::fetch_state(&self.auth, client).await;
        self.known.insert(client.clone(), state.clone()).await;
        self.attach_token(client, state).await
    }

    async fn attach_token(&self, client: &ClientId, mut state: SessionState) -> SessionContext {
        let mut access_token = None;

        if state.user().is_some() {
            access_token = self.auth.access_token(client).await;
            if access_token.is_none() {
                state = SessionState::Anonymous;
                self.known.insert(client.clone(), state.clone()).await;
            }
        }

        SessionContext {
            client: client.clone(),
            state,
            access_token,
        }
    }

    /// Register a new consumer of the client's session state.
    ///
    /// The mount starts `Unknown`; one lookup is spawned to resolve it.
    pub fn mount(self: &Arc<Self>, client: &ClientId) -> SessionMount {
        let id = self.next_mount.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = watch::channel(SessionState::Unknown);
        self.registry().entry(client.clone()).or_default().insert(id, sender);

        let auth = self.auth.clone();
        let weak = Arc::downgrade(self);
        let fetch_client = client.clone();
        tokio::spawn(async move {
            let state = Self::fetch_state(&auth, &fetch_client).await;
            if let Some(hub) = weak.upgrade() {
                hub.deliver(&fetch_client, id, state);
            }
        });

        SessionMount {
            hub: Arc::downgrade(self),
            client: client.clone(),
            id,
            receiver,
        }
    }

    /// Hand the initial lookup result to a mount.
    ///
    /// Only an `Unknown` mount takes it; a change-stream event applied while
    /// the lookup was in flight is newer and stays.
    fn deliver(&self, client: &ClientId, id: u64, state: SessionState) {
        match self.registry().get(client).and_then(|mounts| mounts.get(&id)) {
            Some(sender) => {
                let applied = sender.send_if_modified(|current| {
                    if current.is_known() {
                        false
                    } else {
                        *current = state;
                        true
                    }
                });
                if !applied {
                    debug!(client = %client, mount = id, "Lookup result superseded by a session change");
                }
            }
            None => debug!(client = %client, mount = id, "Dropping lookup result for unmounted consumer"),
        }
    }

    fn unmount(&self, client: &ClientId, id: u64) {
        let mut registry = self.registry();
        if let Some(mounts) = registry.get_mut(client) {
            mounts.remove(&id);
            if mounts.is_empty() {
                registry.remove(client);
            }
        }
    }

    /// Number of live mounts across all clients
    pub fn mount_count(&self) -> usize {
        self.registry().values().map(HashMap::len).sum()
    }
}

/// A registered consumer of one client's session state.
///
/// Unregisters itself when dropped.
pub struct SessionMount {
    hub: Weak<SessionHub>,
    client: ClientId,
    id: u64,
    receiver: watch::Receiver<SessionState>,
}

impl SessionMount {
    pub fn client(&self) -> &ClientId {
        &self.client
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        self.receiver.borrow().clone()
    }

    /// Wait for the next state change; `None` once the mount is gone
    pub async fn changed(&mut self) -> Option<SessionState> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }

    /// A handle that keeps reading this mount's channel after it is dropped
    pub fn observer(&self) -> watch::Receiver<SessionState> {
        self.receiver.clone()
    }
}

impl Drop for SessionMount {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.unmount(&self.client, self.id);
        }
    }
}
