//! Read-only pages: home, post list, post detail and the 404 fallback

use axum::{
    extract::{Path, State},
    http::Uri,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tera::Context as TeraContext;

use super::middleware::{AppState, PageError};
use super::responses::{not_found_page, page};
use crate::models::PostWithAuthor;
use crate::services::FetchState;
use crate::session::SessionContext;

/// A post as shown in the list and detail pages
#[derive(Debug, Serialize)]
struct PostItem {
    id: i64,
    title: String,
    content: String,
    created_at: DateTime<Utc>,
    author: String,
}

impl From<PostWithAuthor> for PostItem {
    fn from(row: PostWithAuthor) -> Self {
        let author = row.author_name().to_string();
        Self {
            id: row.post.id,
            title: row.post.title,
            content: row.post.content,
            created_at: row.post.created_at,
            author,
        }
    }
}

/// GET / - Newest posts
pub async fn home(State(state): State<AppState>, session: SessionContext) -> Result<impl IntoResponse, PageError> {
    let posts = state.post_service.recent().await.displayed().unwrap_or_default();

    let mut context = TeraContext::new();
    context.insert("posts", &posts);
    page(&state, "home.html", &context, "/", &session)
}

/// GET /posts - Every post with its author
pub async fn list(State(state): State<AppState>, session: SessionContext) -> Result<impl IntoResponse, PageError> {
    let posts: Vec<PostItem> = state
        .post_service
        .list()
        .await
        .displayed()
        .unwrap_or_default()
        .into_iter()
        .map(PostItem::from)
        .collect();

    let mut context = TeraContext::new();
    context.insert("posts", &posts);
    page(&state, "posts.html", &context, "/posts", &session)
}

/// GET /posts/{id} - One post; unknown or unreadable ids are a 404
pub async fn detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
    session: SessionContext,
) -> Result<Response, PageError> {
    let path = format!("/posts/{}", id);
    let Ok(id) = id.parse::<i64>() else {
        return not_found_page(&state, &path, &session);
    };

    match state.post_service.get(id).await {
        FetchState::Success(Some(post)) => {
            let mut context = TeraContext::new();
            context.insert("post", &PostItem::from(post));
            Ok(page(&state, "post.html", &context, &path, &session)?.into_response())
        }
        _ => not_found_page(&state, &path, &session),
    }
}

/// Fallback for unmatched routes
pub async fn not_found(State(state): State<AppState>, uri: Uri, session: SessionContext) -> Result<Response, PageError> {
    not_found_page(&state, uri.path(), &session)
}
