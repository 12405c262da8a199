//! Post service
//!
//! Reads for the home, list, detail and profile pages, and the single write
//! issued by the composer. Every read goes to the configured posts table.

use std::sync::Arc;
use tracing::debug;

use super::FetchState;
use crate::config::SiteConfig;
use crate::models::{NewPost, Post, PostSummary, PostWithAuthor, AUTHOR_EMBED};
use crate::remote::{decode_rows, DataService, Direction, Join, RemoteResult, Select};

/// Post queries against the hosted data service
pub struct PostService {
    data: Arc<dyn DataService>,
    posts_table: String,
    profiles_table: String,
    home_limit: usize,
}

impl PostService {
    pub fn new(data: Arc<dyn DataService>, site: &SiteConfig) -> Self {
        Self {
            data,
            posts_table: site.posts_table.clone(),
            profiles_table: site.profiles_table.clone(),
            home_limit: site.home_limit,
        }
    }

    pub fn posts_table(&self) -> &str {
        &self.posts_table
    }

    fn author_join(&self) -> Join {
        Join::new(&self.profiles_table, "user_id", &["username"]).alias(AUTHOR_EMBED)
    }

    /// Newest posts for the home page
    pub fn recent_query(&self) -> Select {
        Select::from(&self.posts_table)
            .order("created_at", Direction::Desc)
            .limit(self.home_limit)
    }

    /// Every post with its author, newest first
    pub fn list_query(&self) -> Select {
        Select::from(&self.posts_table)
            .join(self.author_join())
            .order("created_at", Direction::Desc)
    }

    /// One post with its author
    pub fn detail_query(&self, id: i64) -> Select {
        Select::from(&self.posts_table)
            .join(self.author_join())
            .eq("id", id)
    }

    /// A user's posts projected to `id, title, created_at`, newest first
    pub fn by_author_query(&self, user_id: &str) -> Select {
        Select::from(&self.posts_table)
            .columns(&["id", "title", "created_at"])
            .eq("user_id", user_id)
            .order("created_at", Direction::Desc)
    }

    pub async fn recent(&self) -> FetchState<Vec<Post>> {
        let result = self.fetch(&self.recent_query(), None).await;
        FetchState::from_result("recent posts", result)
    }

    pub async fn list(&self) -> FetchState<Vec<PostWithAuthor>> {
        let result = self.fetch(&self.list_query(), None).await;
        FetchState::from_result("post list", result)
    }

    /// A single post; `Success(None)` when no row matches
    pub async fn get(&self, id: i64) -> FetchState<Option<PostWithAuthor>> {
        let result = self
            .fetch::<PostWithAuthor>(&self.detail_query(id), None)
            .await
            .map(|rows| rows.into_iter().next());
        FetchState::from_result("post detail", result)
    }

    pub async fn by_author(&self, user_id: &str, access_token: Option<&str>) -> FetchState<Vec<PostSummary>> {
        let result = self.fetch(&self.by_author_query(user_id), access_token).await;
        FetchState::from_result("author posts", result)
    }

    /// Insert a post as the owner of `access_token`
    pub async fn create(&self, post: &NewPost, access_token: &str) -> RemoteResult<()> {
        let row = serde_json::to_value(post)?;
        self.data.insert(&self.posts_table, row, Some(access_token)).await?;
        debug!(table = %self.posts_table, user_id = %post.user_id, "Post created");
        Ok(())
    }

    async fn fetch<T: serde::de::DeserializeOwned>(
        &self,
        query: &Select,
        access_token: Option<&str>,
    ) -> RemoteResult<Vec<T>> {
        let rows = self.data.select(query, access_token).await?;
        decode_rows(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryBackend;
    use serde_json::json;

    fn service(backend: &Arc<MemoryBackend>) -> PostService {
        PostService::new(backend.clone(), &SiteConfig::default())
    }

    fn seed_post(backend: &MemoryBackend, title: &str, user_id: &str, created_at: &str) -> i64 {
        backend.add_row(
            "posts",
            json!({ "title": title, "content": "body", "user_id": user_id, "created_at": created_at }),
        )
    }

    #[test]
    fn test_recent_query_shape() {
        let backend = Arc::new(MemoryBackend::new());
        let query = service(&backend).recent_query();
        assert_eq!(query.table, "posts");
        assert_eq!(query.select_clause(), "*");
        assert_eq!(query.limit, Some(5));
    }

    #[test]
    fn test_list_query_embeds_author() {
        let backend = Arc::new(MemoryBackend::new());
        let query = service(&backend).list_query();
        assert_eq!(query.select_clause(), "*,profiles:user_id(username)");
        assert_eq!(query.limit, None);
    }

    #[test]
    fn test_custom_posts_table_is_used_everywhere() {
        let backend = Arc::new(MemoryBackend::new());
        let site = SiteConfig {
            posts_table: "my-blog".to_string(),
            ..SiteConfig::default()
        };
        let service = PostService::new(backend, &site);
        assert_eq!(service.recent_query().table, "my-blog");
        assert_eq!(service.list_query().table, "my-blog");
        assert_eq!(service.detail_query(1).table, "my-blog");
        assert_eq!(service.by_author_query("u").table, "my-blog");
    }

    #[tokio::test]
    async fn test_recent_returns_newest_five() {
        let backend = Arc::new(MemoryBackend::new());
        for day in 1..=7 {
            seed_post(&backend, &format!("post {day}"), "u-1", &format!("2024-01-0{day}T00:00:00Z"));
        }

        let posts = service(&backend).recent().await.displayed().unwrap();

        let titles: Vec<_> = posts.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, ["post 7", "post 6", "post 5", "post 4", "post 3"]);
    }

    #[tokio::test]
    async fn test_list_falls_back_to_anonymous_author() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_profile("u-1", "alice", None);
        seed_post(&backend, "by alice", "u-1", "2024-01-02T00:00:00Z");
        seed_post(&backend, "by ghost", "u-2", "2024-01-01T00:00:00Z");

        let posts = service(&backend).list().await.displayed().unwrap();

        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].author_name(), "alice");
        assert_eq!(posts[1].author_name(), "익명");
    }

    #[tokio::test]
    async fn test_custom_profiles_table_still_finds_authors() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_row("people", json!({ "id": "u-1", "username": "alice" }));
        seed_post(&backend, "by alice", "u-1", "2024-01-01T00:00:00Z");
        let site = SiteConfig {
            profiles_table: "people".to_string(),
            ..SiteConfig::default()
        };
        let service = PostService::new(backend.clone(), &site);

        assert_eq!(service.list_query().select_clause(), "*,profiles:people!user_id(username)");
        let posts = service.list().await.displayed().unwrap();

        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].author_name(), "alice");
    }

    #[tokio::test]
    async fn test_failed_reads_display_empty() {
        let backend = Arc::new(MemoryBackend::new());
        seed_post(&backend, "hidden", "u-1", "2024-01-01T00:00:00Z");
        backend.fail_reads(true);
        let service = service(&backend);

        let recent = service.recent().await;
        assert!(recent.is_failure());
        assert_eq!(recent.displayed(), Some(Vec::new()));
        assert_eq!(service.list().await.displayed(), Some(Vec::new()));
    }

    #[tokio::test]
    async fn test_get_missing_post() {
        let backend = Arc::new(MemoryBackend::new());
        let id = seed_post(&backend, "present", "u-1", "2024-01-01T00:00:00Z");
        let service = service(&backend);

        assert!(matches!(service.get(id).await, FetchState::Success(Some(_))));
        assert_eq!(service.get(id + 100).await, FetchState::Success(None));
    }

    #[tokio::test]
    async fn test_by_author_filters_and_projects() {
        let backend = Arc::new(MemoryBackend::new());
        seed_post(&backend, "mine old", "u-1", "2024-01-01T00:00:00Z");
        seed_post(&backend, "theirs", "u-2", "2024-01-02T00:00:00Z");
        seed_post(&backend, "mine new", "u-1", "2024-01-03T00:00:00Z");

        let posts = service(&backend).by_author("u-1", None).await.displayed().unwrap();

        let titles: Vec<_> = posts.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, ["mine new", "mine old"]);
    }
}
