//! Profile page service

use serde::Serialize;
use std::sync::Arc;

use super::{FetchState, PostService};
use crate::config::SiteConfig;
use crate::models::{PostSummary, Profile};
use crate::remote::{decode_rows, DataService, RemoteError, Select};
use crate::session::SessionContext;

/// Loaded profile page data.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProfileView {
    /// `None` when the profile row is missing or could not be read
    pub profile: Option<Profile>,
    /// Letter shown when there is no avatar
    pub initial: String,
    pub posts: Vec<PostSummary>,
}

/// What the profile page should do
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileOutcome {
    /// No authenticated session; nothing was queried
    RedirectToLogin,
    Loaded(ProfileView),
}

pub struct ProfileService {
    data: Arc<dyn DataService>,
    posts: Arc<PostService>,
    profiles_table: String,
}

impl ProfileService {
    pub fn new(data: Arc<dyn DataService>, posts: Arc<PostService>, site: &SiteConfig) -> Self {
        Self {
            data,
            posts,
            profiles_table: site.profiles_table.clone(),
        }
    }

    pub fn profile_query(&self, user_id: &str) -> Select {
        Select::from(&self.profiles_table).eq("id", user_id)
    }

    /// Load the signed-in user's profile and posts.
    ///
    /// The posts query only runs once the profile read succeeded with a row.
    pub async fn load(&self, context: &SessionContext) -> ProfileOutcome {
        let Some(user) = context.user() else {
            return ProfileOutcome::RedirectToLogin;
        };

        let fetched = self.fetch_profile(&user.id, context.token()).await;
        let profile = match FetchState::from_result("profile", fetched) {
            FetchState::Success(profile) => Some(profile),
            _ => None,
        };

        let posts = match profile {
            Some(_) => self
                .posts
                .by_author(&user.id, context.token())
                .await
                .displayed()
                .unwrap_or_default(),
            None => Vec::new(),
        };

        let initial = profile
            .as_ref()
            .map(Profile::initial)
            .unwrap_or_else(|| "?".to_string());

        ProfileOutcome::Loaded(ProfileView {
            profile,
            initial,
            posts,
        })
    }

    /// First profile row for the user; no row at all is an error
    async fn fetch_profile(&self, user_id: &str, access_token: Option<&str>) -> Result<Profile, RemoteError> {
        let rows = self.data.select(&self.profile_query(user_id), access_token).await?;
        decode_rows::<Profile>(rows)?
            .into_iter()
            .next()
            .ok_or_else(|| RemoteError::api(406, "profile row not found"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClientId, SessionState, User};
    use crate::remote::MemoryBackend;
    use serde_json::json;

    fn services(backend: &Arc<MemoryBackend>) -> ProfileService {
        let site = SiteConfig::default();
        let posts = Arc::new(PostService::new(backend.clone(), &site));
        ProfileService::new(backend.clone(), posts, &site)
    }

    fn signed_in(user: &User) -> SessionContext {
        SessionContext {
            client: ClientId::generate(),
            state: SessionState::Authenticated(user.clone()),
            access_token: Some("token".to_string()),
        }
    }

    #[tokio::test]
    async fn test_anonymous_redirects_without_queries() {
        let backend = Arc::new(MemoryBackend::new());

        let outcome = services(&backend)
            .load(&SessionContext::anonymous(ClientId::generate()))
            .await;

        assert_eq!(outcome, ProfileOutcome::RedirectToLogin);
        assert_eq!(backend.select_calls(), 0);
    }

    #[tokio::test]
    async fn test_loads_profile_and_posts() {
        let backend = Arc::new(MemoryBackend::new());
        let user = backend.add_user("a@b.c", "secret1");
        backend.add_profile(&user.id, "alice", None);
        backend.add_row(
            "posts",
            json!({ "title": "hello", "content": "c", "user_id": user.id, "created_at": "2024-01-01T00:00:00Z" }),
        );

        let ProfileOutcome::Loaded(view) = services(&backend).load(&signed_in(&user)).await else {
            panic!("expected a loaded profile");
        };

        assert_eq!(view.profile.map(|p| p.username), Some("alice".to_string()));
        assert_eq!(view.initial, "A");
        assert_eq!(view.posts.len(), 1);
        assert_eq!(view.posts[0].title, "hello");
    }

    #[tokio::test]
    async fn test_missing_profile_skips_posts_query() {
        let backend = Arc::new(MemoryBackend::new());
        let user = backend.add_user("a@b.c", "secret1");

        let ProfileOutcome::Loaded(view) = services(&backend).load(&signed_in(&user)).await else {
            panic!("expected a loaded profile");
        };

        assert_eq!(view.profile, None);
        assert_eq!(view.initial, "?");
        assert!(view.posts.is_empty());
        assert_eq!(backend.select_calls(), 1);
        assert_eq!(backend.recorded_selects()[0].table, "profiles");
    }

    #[tokio::test]
    async fn test_failed_profile_read_shows_empty() {
        let backend = Arc::new(MemoryBackend::new());
        let user = backend.add_user("a@b.c", "secret1");
        backend.add_profile(&user.id, "alice", None);
        backend.fail_reads(true);

        let ProfileOutcome::Loaded(view) = services(&backend).load(&signed_in(&user)).await else {
            panic!("expected a loaded profile");
        };

        assert_eq!(view, ProfileView { initial: "?".to_string(), ..ProfileView::default() });
        assert_eq!(backend.select_calls(), 1);
    }
}
