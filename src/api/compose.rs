//! Post composer pages

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Form,
};
use serde::Deserialize;
use tera::Context as TeraContext;

use super::middleware::{AppState, PageError, VerifiedSession};
use super::responses::{page, see_other_no_store};
use crate::services::ComposerForm;
use crate::session::SessionContext;

/// Submitted composer fields
#[derive(Debug, Deserialize)]
pub struct ComposeInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

fn render_form(state: &AppState, session: &SessionContext, form: &ComposerForm) -> Result<Response, PageError> {
    let mut context = TeraContext::new();
    context.insert("form", form);
    Ok(page(state, "compose.html", &context, "/posts/new", session)?.into_response())
}

/// GET /posts/new - Empty composer
pub async fn form(
    State(state): State<AppState>,
    VerifiedSession(session): VerifiedSession,
) -> Result<Response, PageError> {
    render_form(&state, &session, &ComposerForm::default())
}

/// POST /posts/new - Publish a post
pub async fn submit(
    State(state): State<AppState>,
    VerifiedSession(session): VerifiedSession,
    Form(input): Form<ComposeInput>,
) -> Result<Response, PageError> {
    let form = state.composer.submit(&session, input.title, input.content).await;
    render_form(&state, &session, &form)
}

/// POST /posts/new/confirm - Dismiss the confirmation and go to a fresh list
pub async fn confirm() -> Response {
    see_other_no_store("/posts")
}
