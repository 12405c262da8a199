//! Per-client auth state
//!
//! Plays the role the hosted service's browser SDK plays on the client: it
//! stores the tokens for each client, refreshes them when they expire and
//! announces every identity change on a broadcast channel.

use moka::future::Cache;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::models::{AuthSession, ClientId, User};
use crate::remote::{AuthService, RemoteResult, SignUpRequest};

/// Capacity of the change stream; slower receivers skip ahead
const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// Kind of identity change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn,
    TokenRefreshed,
    SignedOut,
}

/// One change-stream event: the client's new identity, or its absence.
#[derive(Debug, Clone)]
pub struct AuthChange {
    pub client: ClientId,
    pub event: AuthEvent,
    pub user: Option<User>,
}

/// Result of creating an account
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
    /// The service issued a session right away
    SignedIn(User),
    /// The service wants the address confirmed first
    ConfirmationRequired,
}

/// Token store and change notifier for every client.
pub struct AuthClient {
    remote: Arc<dyn AuthService>,
    sessions: Cache<ClientId, AuthSession>,
    changes: broadcast::Sender<AuthChange>,
}

impl AuthClient {
    pub fn new(remote: Arc<dyn AuthService>, config: &SessionConfig) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            remote,
            sessions: Cache::builder().time_to_idle(config.max_age()).build(),
            changes,
        }
    }

    /// Subscribe to the change stream
    pub fn subscribe(&self) -> broadcast::Receiver<AuthChange> {
        self.changes.subscribe()
    }

    fn emit(&self, client: &ClientId, event: AuthEvent, user: Option<User>) {
        // No receivers is fine; nothing is mounted yet.
        let _ = self.changes.send(AuthChange {
            client: client.clone(),
            event,
            user,
        });
    }

    /// Sign in with email and password and bind the session to `client`
    pub async fn sign_in(&self, client: &ClientId, email: &str, password: &str) -> RemoteResult<User> {
        let session = self.remote.sign_in_with_password(email, password).await?;
        let user = session.user.clone();
        self.sessions.insert(client.clone(), session).await;

        info!(client = %client, user_id = %user.id, "Signed in");
        self.emit(client, AuthEvent::SignedIn, Some(user.clone()));
        Ok(user)
    }

    /// Create an account; signs the client in when the service issues a session
    pub async fn sign_up(&self, client: &ClientId, request: &SignUpRequest) -> RemoteResult<SignUpOutcome> {
        match self.remote.sign_up(request).await? {
            Some(session) => {
                let user = session.user.clone();
                self.sessions.insert(client.clone(), session).await;
                info!(client = %client, user_id = %user.id, "Signed up");
                self.emit(client, AuthEvent::SignedIn, Some(user.clone()));
                Ok(SignUpOutcome::SignedIn(user))
            }
            None => {
                info!(client = %client, "Sign-up awaiting email confirmation");
                Ok(SignUpOutcome::ConfirmationRequired)
            }
        }
    }

    /// Sign the client out.
    ///
    /// The local session is cleared and `SignedOut` emitted even when the
    /// remote revocation fails.
    pub async fn sign_out(&self, client: &ClientId) {
        let Some(session) = self.sessions.remove(client).await else {
            debug!(client = %client, "Sign-out without a session");
            return;
        };

        if let Err(e) = self.remote.sign_out(&session.access_token).await {
            warn!(client = %client, error = %e, "Remote sign-out failed; local session cleared anyway");
        }

        info!(client = %client, user_id = %session.user.id, "Signed out");
        self.emit(client, AuthEvent::SignedOut, None);
    }

    /// Current user of `client`, validated with the auth service.
    ///
    /// Expired tokens are refreshed first. A rejected token or failed refresh
    /// clears the session and yields `None`; transport failures propagate.
    pub async fn current_user(&self, client: &ClientId) -> RemoteResult<Option<User>> {
        let Some(session) = self.session(client).await? else {
            return Ok(None);
        };

        match self.remote.get_user(&session.access_token).await? {
            Some(user) => Ok(Some(user)),
            None => {
                self.drop_session(client).await;
                Ok(None)
            }
        }
    }

    /// Access token for `client`, refreshed if expired
    pub async fn access_token(&self, client: &ClientId) -> Option<String> {
        match self.session(client).await {
            Ok(session) => session.map(|s| s.access_token),
            Err(e) => {
                warn!(client = %client, error = %e, "Could not refresh session");
                None
            }
        }
    }

    /// Stored session for `client`, refreshing it when the access token has expired.
    async fn session(&self, client: &ClientId) -> RemoteResult<Option<AuthSession>> {
        let Some(session) = self.sessions.get(client).await else {
            return Ok(None);
        };
        if !session.is_expired() {
            return Ok(Some(session));
        }

        let Some(refresh_token) = session.refresh_token.as_deref() else {
            self.drop_session(client).await;
            return Ok(None);
        };

        match self.remote.refresh_session(refresh_token).await {
            Ok(fresh) => {
                debug!(client = %client, "Access token refreshed");
                self.sessions.insert(client.clone(), fresh.clone()).await;
                self.emit(client, AuthEvent::TokenRefreshed, Some(fresh.user.clone()));
                Ok(Some(fresh))
            }
            Err(e) if e.is_unauthorized() => {
                debug!(client = %client, error = %e, "Refresh rejected");
                self.drop_session(client).await;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn drop_session(&self, client: &ClientId) {
        if self.sessions.remove(client).await.is_some() {
            self.emit(client, AuthEvent::SignedOut, None);
        }
    }
}
