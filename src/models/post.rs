//! Post model
//!
//! Posts are created by the composer and read by the home, list, detail and
//! profile pages. This application never updates or deletes them.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// A post row as stored in the posts table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// Numeric identifier assigned by the backend
    pub id: i64,
    pub title: String,
    pub content: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Owning user id (auth user uuid)
    pub user_id: String,
}

/// Author columns embedded through the `profiles:user_id(username)` join.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorRef {
    pub username: String,
}

/// Key the author profile is embedded under, whatever the profiles table is called.
pub const AUTHOR_EMBED: &str = "profiles";

/// A post together with its joined author profile.
///
/// `profiles` is `None` when the owning user has no profile row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostWithAuthor {
    #[serde(flatten)]
    pub post: Post,
    #[serde(default)]
    pub profiles: Option<AuthorRef>,
}

impl PostWithAuthor {
    /// Display name of the author, falling back to "anonymous".
    pub fn author_name(&self) -> &str {
        self.profiles
            .as_ref()
            .map(|p| p.username.as_str())
            .filter(|name| !name.is_empty())
            .unwrap_or("익명")
    }
}

/// Narrow projection used by the profile page (`id, title, created_at`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostSummary {
    pub id: i64,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// Row written by the composer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub user_id: String,
    /// ISO-8601 timestamp with millisecond precision and a `Z` suffix
    pub created_at: String,
}

impl NewPost {
    /// Build a new post row stamped with the current time.
    pub fn new(title: impl Into<String>, content: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self::at(title, content, user_id, Utc::now())
    }

    /// Build a new post row stamped with the given time.
    pub fn at(
        title: impl Into<String>,
        content: impl Into<String>,
        user_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            user_id: user_id.into(),
            created_at: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}
