//! Profile model

use serde::{Deserialize, Serialize};

/// One profile per authenticated user, created outside this application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Primary key, equal to the auth user id
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl Profile {
    /// Letter shown in place of a missing avatar.
    pub fn initial(&self) -> String {
        self.username
            .chars()
            .next()
            .map(|c| c.to_uppercase().collect())
            .unwrap_or_else(|| "?".to_string())
    }
}
