//! Response helpers shared by the page handlers

use axum::{
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
};
use tera::Context as TeraContext;

use super::middleware::{AppState, PageError};
use crate::session::SessionContext;
use crate::theme::StandardTemplateVars;

/// Render a page template with the standard variables for `session`
pub fn page(
    state: &AppState,
    template: &str,
    context: &TeraContext,
    request_path: &str,
    session: &SessionContext,
) -> Result<Html<String>, PageError> {
    let vars = StandardTemplateVars::new(request_path, session.state.clone());
    let html = state.theme_engine.render_page(template, context, &vars)?;
    Ok(Html(html))
}

/// Render the "not found" page with status 404
pub fn not_found_page(state: &AppState, request_path: &str, session: &SessionContext) -> Result<Response, PageError> {
    let html = page(state, "not_found.html", &TeraContext::new(), request_path, session)?;
    Ok((StatusCode::NOT_FOUND, html).into_response())
}

/// 303 redirect whose target must be regenerated rather than served from cache
pub fn see_other_no_store(location: &'static str) -> Response {
    (
        StatusCode::SEE_OTHER,
        [(header::LOCATION, location), (header::CACHE_CONTROL, "no-store")],
    )
        .into_response()
}
