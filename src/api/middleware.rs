//! API middleware
//!
//! Contains:
//! - Shared application state
//! - Client identity (the per-browser cookie every session is keyed by)
//! - Extractors for the client id and its resolved session
//! - The page error type

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderValue, StatusCode},
    middleware::Next,
    response::{Html, IntoResponse, Response},
};
use std::sync::Arc;

use crate::config::{Config, SessionConfig};
use crate::models::ClientId;
use crate::remote::Remote;
use crate::services::{Composer, PostService, ProfileService};
use crate::session::{AuthClient, SessionContext, SessionHub};
use crate::theme::{ThemeEngine, ThemeError};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<SessionHub>,
    pub post_service: Arc<PostService>,
    pub profile_service: Arc<ProfileService>,
    pub composer: Arc<Composer>,
    pub theme_engine: Arc<ThemeEngine>,
    pub session_config: Arc<SessionConfig>,
}

impl AppState {
    /// Wire the services for `config` on top of `remote`.
    ///
    /// Starts the session hub's change pump, so a Tokio runtime must be running.
    pub fn build(config: &Config, remote: Remote) -> Result<Self, ThemeError> {
        let auth = Arc::new(AuthClient::new(remote.auth, &config.session));
        let hub = SessionHub::spawn(auth, &config.session);

        let post_service = Arc::new(PostService::new(remote.data.clone(), &config.site));
        let profile_service = Arc::new(ProfileService::new(remote.data, post_service.clone(), &config.site));
        let composer = Arc::new(Composer::new(post_service.clone()));
        let theme_engine = Arc::new(ThemeEngine::new(&config.theme, &config.site)?);

        Ok(Self {
            hub,
            post_service,
            profile_service,
            composer,
            theme_engine,
            session_config: Arc::new(config.session.clone()),
        })
    }
}

/// Errors that abort a page render
#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error("{0}")]
    Theme(#[from] ThemeError),

    /// The client identity middleware did not run for this route
    #[error("client identity missing from request")]
    MissingClient,
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "Page failed to render");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Html(ThemeEngine::simple_error_page(&self.to_string())),
        )
            .into_response()
    }
}

/// Read the client id cookie named `cookie_name`
fn extract_client_id(parts: &Parts, cookie_name: &str) -> Option<ClientId> {
    let cookie_header = parts.headers.get(header::COOKIE)?.to_str().ok()?;
    cookie_header
        .split(';')
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(name, _)| *name == cookie_name)
        .and_then(|(_, value)| ClientId::parse(value))
}

fn client_cookie(config: &SessionConfig, client: &ClientId) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        config.cookie_name,
        client,
        config.max_age().as_secs()
    )
}

/// Client identity middleware
///
/// Attaches the request's `ClientId`, issuing a fresh one (and its cookie)
/// when the browser did not send a valid one.
pub async fn client_identity(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let (mut parts, body) = request.into_parts();

    let (client, issued) = match extract_client_id(&parts, &state.session_config.cookie_name) {
        Some(client) => (client, false),
        None => (ClientId::generate(), true),
    };
    parts.extensions.insert(client.clone());

    let mut response = next.run(Request::from_parts(parts, body)).await;

    if issued {
        tracing::debug!(client = %client, "Issued client id");
        match HeaderValue::from_str(&client_cookie(&state.session_config, &client)) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => tracing::warn!(error = %e, "Could not encode client cookie"),
        }
    }

    response
}

impl<S: Send + Sync> FromRequestParts<S> for ClientId {
    type Rejection = PageError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<ClientId>()
            .cloned()
            .ok_or(PageError::MissingClient)
    }
}

impl FromRequestParts<AppState> for SessionContext {
    type Rejection = PageError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let client = ClientId::from_request_parts(parts, state).await?;
        Ok(state.hub.context(&client).await)
    }
}

/// Session context checked against the auth service for this request.
///
/// For pages that act on the user's identity, where a stale cached state
/// would hide a remotely revoked token.
pub struct VerifiedSession(pub SessionContext);

impl FromRequestParts<AppState> for VerifiedSession {
    type Rejection = PageError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let client = ClientId::from_request_parts(parts, state).await?;
        Ok(Self(state.hub.verified_context(&client).await))
    }
}
