//! Sign-in, sign-up and sign-out
//!
//! Credentials are checked by the hosted auth service; the resulting session
//! is bound to the browser's client id.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Form,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tera::Context as TeraContext;

use super::middleware::{AppState, PageError};
use super::responses::{page, see_other_no_store};
use crate::models::{ClientId, SessionState};
use crate::remote::SignUpRequest;
use crate::session::{SessionContext, SignUpOutcome};

static EMAIL_RE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok());

fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.as_ref().is_some_and(|re| re.is_match(email))
}

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Default, Deserialize)]
pub struct LoginInput {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SignUpInput {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub username: String,
}

impl SignUpInput {
    /// First problem with the submitted fields, if any
    fn validate(&self) -> Result<(), &'static str> {
        if !is_valid_email(self.email.trim()) {
            return Err("올바른 이메일 주소를 입력하세요.");
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err("비밀번호는 6자 이상이어야 합니다.");
        }
        if self.username.trim().is_empty() {
            return Err("사용자 이름을 입력하세요.");
        }
        Ok(())
    }
}

fn render_login(state: &AppState, session: &SessionContext, email: &str, error: Option<&str>) -> Result<Response, PageError> {
    let mut context = TeraContext::new();
    context.insert("email", email);
    context.insert("error", &error);
    Ok(page(state, "login.html", &context, "/login", session)?.into_response())
}

fn render_signup(
    state: &AppState,
    session: &SessionContext,
    input: &SignUpInput,
    error: Option<&str>,
    confirmation_sent: bool,
) -> Result<Response, PageError> {
    let mut context = TeraContext::new();
    context.insert("email", &input.email);
    context.insert("username", &input.username);
    context.insert("error", &error);
    context.insert("confirmation_sent", &confirmation_sent);
    Ok(page(state, "signup.html", &context, "/signup", session)?.into_response())
}

/// GET /login
pub async fn login_form(State(state): State<AppState>, session: SessionContext) -> Result<Response, PageError> {
    render_login(&state, &session, "", None)
}

/// POST /login
pub async fn login(
    State(state): State<AppState>,
    session: SessionContext,
    Form(input): Form<LoginInput>,
) -> Result<Response, PageError> {
    let email = input.email.trim();
    if email.is_empty() || input.password.is_empty() {
        return render_login(&state, &session, email, Some("이메일과 비밀번호를 입력하세요."));
    }

    match state.hub.auth().sign_in(&session.client, email, &input.password).await {
        Ok(user) => {
            state
                .hub
                .remember(&session.client, SessionState::Authenticated(user))
                .await;
            Ok(see_other_no_store("/"))
        }
        Err(e) => {
            tracing::info!(email = %email, error = %e, "Sign-in rejected");
            render_login(&state, &session, email, Some(&e.to_string()))
        }
    }
}

/// GET /signup
pub async fn signup_form(State(state): State<AppState>, session: SessionContext) -> Result<Response, PageError> {
    render_signup(&state, &session, &SignUpInput::default(), None, false)
}

/// POST /signup
pub async fn signup(
    State(state): State<AppState>,
    session: SessionContext,
    Form(input): Form<SignUpInput>,
) -> Result<Response, PageError> {
    if let Err(message) = input.validate() {
        return render_signup(&state, &session, &input, Some(message), false);
    }

    let request = SignUpRequest {
        email: input.email.trim().to_string(),
        password: input.password.clone(),
        username: input.username.trim().to_string(),
    };

    match state.hub.auth().sign_up(&session.client, &request).await {
        Ok(SignUpOutcome::SignedIn(user)) => {
            state
                .hub
                .remember(&session.client, SessionState::Authenticated(user))
                .await;
            Ok(see_other_no_store("/"))
        }
        Ok(SignUpOutcome::ConfirmationRequired) => render_signup(&state, &session, &input, None, true),
        Err(e) => {
            tracing::info!(email = %request.email, error = %e, "Sign-up rejected");
            render_signup(&state, &session, &input, Some(&e.to_string()), false)
        }
    }
}

/// POST /logout
///
/// Waits for the sign-out to finish, then sends the browser home with its
/// cached pages discarded.
pub async fn logout(State(state): State<AppState>, client: ClientId) -> Response {
    state.hub.auth().sign_out(&client).await;
    state.hub.remember(&client, SessionState::Anonymous).await;

    (
        StatusCode::SEE_OTHER,
        [
            (header::LOCATION, "/"),
            (header::CACHE_CONTROL, "no-store"),
            (header::HeaderName::from_static("clear-site-data"), "\"cache\""),
        ],
    )
        .into_response()
}
