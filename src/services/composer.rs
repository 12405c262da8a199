//! Post composer
//!
//! Validates the form, checks for a signed-in user and writes the post. The
//! form state returned to the page decides what is shown next: an inline
//! error with the fields kept, or cleared fields with the confirmation dialog.

use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

use super::PostService;
use crate::models::NewPost;
use crate::session::SessionContext;

/// Shown when a post is submitted without a session
pub const LOGIN_REQUIRED: &str = "로그인이 필요합니다.";

/// Shown when the title or content is empty
pub const FIELDS_REQUIRED: &str = "제목과 내용을 입력하세요.";

/// Composer form state rendered by the page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ComposerForm {
    pub title: String,
    pub content: String,
    pub error: Option<String>,
    /// Show the "post created" dialog
    pub confirmation: bool,
}

impl ComposerForm {
    fn rejected(title: String, content: String, message: impl Into<String>) -> Self {
        Self {
            title,
            content,
            error: Some(message.into()),
            confirmation: false,
        }
    }

    fn submitted() -> Self {
        Self {
            confirmation: true,
            ..Self::default()
        }
    }
}

pub struct Composer {
    posts: Arc<PostService>,
}

impl Composer {
    pub fn new(posts: Arc<PostService>) -> Self {
        Self { posts }
    }

    /// Submit a new post on behalf of the session's user
    pub async fn submit(&self, context: &SessionContext, title: String, content: String) -> ComposerForm {
        if title.is_empty() || content.is_empty() {
            return ComposerForm::rejected(title, content, FIELDS_REQUIRED);
        }

        let (Some(user), Some(token)) = (context.user(), context.token()) else {
            return ComposerForm::rejected(title, content, LOGIN_REQUIRED);
        };

        let post = NewPost::new(title, content, user.id.clone());
        match self.posts.create(&post, token).await {
            Ok(()) => {
                info!(user_id = %user.id, title = %post.title, "New post published");
                ComposerForm::submitted()
            }
            Err(e) => {
                error!(user_id = %user.id, error = %e, "Failed to publish post");
                ComposerForm::rejected(post.title, post.content, e.to_string())
            }
        }
    }
}
