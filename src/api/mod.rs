//! API layer - HTTP handlers and routing
//!
//! Server-rendered pages for the blog:
//! - Home, post list and post detail
//! - Post composer
//! - Profile
//! - Sign-in, sign-up and sign-out
//! - Live auth button updates (server-sent events)
//! - Embedded static assets

pub mod auth;
pub mod compose;
pub mod middleware;
pub mod pages;
pub mod profile;
pub mod responses;
pub mod session_events;
pub mod static_files;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower_http::{compression::CompressionLayer, trace::TraceLayer};

pub use middleware::{AppState, PageError};

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(pages::home))
        .route("/posts", get(pages::list))
        .route("/posts/new", get(compose::form).post(compose::submit))
        .route("/posts/new/confirm", post(compose::confirm))
        .route("/posts/{id}", get(pages::detail))
        .route("/profile", get(profile::show))
        .route("/login", get(auth::login_form).post(auth::login))
        .route("/signup", get(auth::signup_form).post(auth::signup))
        .route("/logout", post(auth::logout))
        .route("/session/events", get(session_events::events))
        .route("/static/{*path}", get(static_files::serve_static))
        .fallback(pages::not_found)
        // Every request, the fallback included, carries a client id
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::client_identity,
        ))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
