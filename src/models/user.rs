//! User model
//!
//! The identity returned by the hosted auth service. Only the fields this
//! application reads are kept; everything else in the auth payload is ignored.

use serde::{Deserialize, Serialize};

/// Authenticated user identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Auth user id (uuid string)
    pub id: String,
    /// Email address, absent for phone or anonymous sign-ins
    #[serde(default)]
    pub email: Option<String>,
}

impl User {
    pub fn new(id: impl Into<String>, email: Option<String>) -> Self {
        Self {
            id: id.into(),
            email,
        }
    }
}
