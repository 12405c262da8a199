//! Session model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::User;

/// Opaque per-browser identifier carried in the client cookie.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(String);

impl ClientId {
    /// Generate a fresh random client id
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Accept an id read back from a cookie.
    ///
    /// Returns `None` for values that could not have been generated here.
    pub fn parse(value: &str) -> Option<Self> {
        let valid = value.len() == 32 && value.chars().all(|c| c.is_ascii_hexdigit());
        valid.then(|| Self(value.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tokens issued by the auth service for one signed-in client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Access token expiry, when the service reported one
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub user: User,
}

impl AuthSession {
    /// Check if the access token has expired
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Utc::now())
    }
}

/// What a consumer knows about "who is signed in".
///
/// `Unknown` means the first lookup has not resolved yet and is distinct from
/// `Anonymous`; identity-dependent UI must render nothing while unknown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "user", rename_all = "snake_case")]
pub enum SessionState {
    Unknown,
    Authenticated(User),
    Anonymous,
}

impl SessionState {
    pub fn from_user(user: Option<User>) -> Self {
        match user {
            Some(user) => Self::Authenticated(user),
            None => Self::Anonymous,
        }
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            Self::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_client_id_roundtrip() {
        let id = ClientId::generate();
        assert_eq!(ClientId::parse(id.as_str()), Some(id));
    }

    #[test]
    fn test_client_id_rejects_garbage() {
        assert!(ClientId::parse("").is_none());
        assert!(ClientId::parse("not-a-client-id").is_none());
        assert!(ClientId::parse(&"z".repeat(32)).is_none());
    }

    #[test]
    fn test_session_state_serialization() {
        let state = SessionState::Authenticated(User::new("u-1", None));
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["status"], "authenticated");
        assert_eq!(json["user"]["id"], "u-1");

        let json = serde_json::to_value(SessionState::Unknown).unwrap();
        assert_eq!(json["status"], "unknown");
    }

    #[test]
    fn test_auth_session_expiry() {
        let mut session = AuthSession {
            access_token: "t".to_string(),
            refresh_token: None,
            expires_at: None,
            user: User::new("u-1", None),
        };
        assert!(!session.is_expired());

        session.expires_at = Some(Utc::now() - Duration::seconds(1));
        assert!(session.is_expired());

        session.expires_at = Some(Utc::now() + Duration::hours(1));
        assert!(!session.is_expired());
    }
}
