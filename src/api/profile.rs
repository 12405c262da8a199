//! Profile page

use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use tera::Context as TeraContext;

use super::middleware::{AppState, PageError, VerifiedSession};
use super::responses::page;
use crate::services::ProfileOutcome;

/// GET /profile - The signed-in user's profile and posts
pub async fn show(
    State(state): State<AppState>,
    VerifiedSession(session): VerifiedSession,
) -> Result<Response, PageError> {
    match state.profile_service.load(&session).await {
        ProfileOutcome::RedirectToLogin => Ok(Redirect::to("/login").into_response()),
        ProfileOutcome::Loaded(view) => {
            let mut context = TeraContext::new();
            context.insert("view", &view);
            Ok(page(&state, "profile.html", &context, "/profile", &session)?.into_response())
        }
    }
}
