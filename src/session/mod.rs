//! Client session synchronization
//!
//! - `AuthClient` keeps each browser client's auth tokens and broadcasts an
//!   `AuthChange` whenever a client signs in, refreshes or signs out.
//! - `SessionHub` holds the single subscription to that stream and mirrors it
//!   into per-client state for mounted consumers and rendered pages.
//! - `SessionContext` is the explicit per-request view handed to page services.

mod auth;
mod hub;

pub use auth::{AuthChange, AuthClient, AuthEvent, SignUpOutcome};
pub use hub::{SessionHub, SessionMount};

use crate::models::{ClientId, SessionState, User};

/// Who is making this request, resolved once and passed to every service.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub client: ClientId,
    pub state: SessionState,
    /// Bearer token for backend requests made on the client's behalf
    pub access_token: Option<String>,
}

impl SessionContext {
    /// Context for a client with no session
    pub fn anonymous(client: ClientId) -> Self {
        Self {
            client,
            state: SessionState::Anonymous,
            access_token: None,
        }
    }

    pub fn user(&self) -> Option<&User> {
        self.state.user()
    }

    pub fn token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }
}
