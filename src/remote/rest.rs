//! PostgREST + GoTrue client for the hosted backend.

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use super::{extract_error_message, AuthService, DataService, RemoteError, RemoteResult, Select, SignUpRequest};
use crate::models::{AuthSession, User};

/// Token payload returned by the password and refresh grants.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    /// Unix seconds
    #[serde(default)]
    expires_at: Option<i64>,
    user: User,
}

impl TokenResponse {
    fn into_session(self) -> AuthSession {
        let expires_at = self
            .expires_at
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .or_else(|| self.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)));

        AuthSession {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user,
        }
    }
}

/// Parse a sign-up body, which is a token payload when the project
/// auto-confirms accounts and a bare user otherwise.
fn parse_sign_up(body: serde_json::Value) -> RemoteResult<Option<AuthSession>> {
    if body.get("access_token").is_some() {
        let token: TokenResponse = serde_json::from_value(body)?;
        Ok(Some(token.into_session()))
    } else {
        Ok(None)
    }
}

/// HTTP client for the hosted backend.
#[derive(Clone)]
pub struct RestBackend {
    http_client: reqwest::Client,
    api_url: String,
    anon_key: String,
}

impl RestBackend {
    /// Create a new client.
    ///
    /// # Arguments
    /// * `api_url` - The project API URL (e.g., `https://xyz.supabase.co`)
    /// * `anon_key` - The anonymous API key
    pub fn new(api_url: &str, anon_key: &str) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("myblog/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http_client,
            api_url: api_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
        })
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.api_url, table)
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.api_url, path)
    }

    fn bearer(&self, access_token: Option<&str>) -> String {
        format!("Bearer {}", access_token.unwrap_or(&self.anon_key))
    }

    /// Turn a non-success response into an `Api` error carrying the service's message.
    async fn check_response(&self, response: reqwest::Response) -> RemoteResult<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        warn!(status, body = %body, "Backend request failed");
        Err(RemoteError::api(status, extract_error_message(&body)))
    }

    async fn token_grant(&self, grant_type: &str, body: serde_json::Value) -> RemoteResult<AuthSession> {
        let url = self.auth_url("token");

        let response = self
            .http_client
            .post(&url)
            .query(&[("grant_type", grant_type)])
            .header("apikey", &self.anon_key)
            .json(&body)
            .send()
            .await?;

        let response = self.check_response(response).await.map_err(|e| match e {
            RemoteError::Api { status: 400, message } => RemoteError::Unauthorized(message),
            other => other,
        })?;
        let token: TokenResponse = response.json().await?;
        Ok(token.into_session())
    }
}

#[async_trait]
impl AuthService for RestBackend {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> RemoteResult<AuthSession> {
        debug!(email = %email, "Attempting email/password login");
        let session = self
            .token_grant(
                "password",
                serde_json::json!({ "email": email, "password": password }),
            )
            .await?;
        debug!(user_id = %session.user.id, "Login successful");
        Ok(session)
    }

    async fn sign_up(&self, request: &SignUpRequest) -> RemoteResult<Option<AuthSession>> {
        let url = self.auth_url("signup");

        debug!(email = %request.email, "Creating account");

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({
                "email": request.email,
                "password": request.password,
                "data": { "username": request.username },
            }))
            .send()
            .await?;

        let response = self.check_response(response).await?;
        let body: serde_json::Value = response.json().await?;
        parse_sign_up(body)
    }

    async fn get_user(&self, access_token: &str) -> RemoteResult<Option<User>> {
        let response = self
            .http_client
            .get(self.auth_url("user"))
            .header("apikey", &self.anon_key)
            .header("Authorization", self.bearer(Some(access_token)))
            .send()
            .await?;

        let status = response.status().as_u16();
        if status == 401 || status == 403 {
            debug!(status, "Access token rejected");
            return Ok(None);
        }

        let response = self.check_response(response).await?;
        let user: User = response.json().await?;
        Ok(Some(user))
    }

    async fn refresh_session(&self, refresh_token: &str) -> RemoteResult<AuthSession> {
        self.token_grant(
            "refresh_token",
            serde_json::json!({ "refresh_token": refresh_token }),
        )
        .await
    }

    async fn sign_out(&self, access_token: &str) -> RemoteResult<()> {
        let response = self
            .http_client
            .post(self.auth_url("logout"))
            .header("apikey", &self.anon_key)
            .header("Authorization", self.bearer(Some(access_token)))
            .send()
            .await?;

        self.check_response(response).await?;
        Ok(())
    }
}

#[async_trait]
impl DataService for RestBackend {
    async fn select(&self, query: &Select, access_token: Option<&str>) -> RemoteResult<Vec<serde_json::Value>> {
        let url = self.rest_url(&query.table);

        debug!(table = %query.table, select = %query.select_clause(), "Querying backend");

        let response = self
            .http_client
            .get(&url)
            .query(&query.to_query_pairs())
            .header("apikey", &self.anon_key)
            .header("Authorization", self.bearer(access_token))
            .send()
            .await?;

        let response = self.check_response(response).await?;
        let rows: Vec<serde_json::Value> = response.json().await?;
        Ok(rows)
    }

    async fn insert(&self, table: &str, row: serde_json::Value, access_token: Option<&str>) -> RemoteResult<()> {
        let url = self.rest_url(table);

        debug!(table, "Inserting row");

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.anon_key)
            .header("Authorization", self.bearer(access_token))
            .header("Prefer", "return=minimal")
            .json(&row)
            .send()
            .await?;

        self.check_response(response).await?;
        Ok(())
    }
}

impl std::fmt::Debug for RestBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestBackend")
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_strip_trailing_slash() {
        let backend = RestBackend::new("https://abc.supabase.co/", "anon").unwrap();
        assert_eq!(backend.rest_url("posts"), "https://abc.supabase.co/rest/v1/posts");
        assert_eq!(backend.auth_url("user"), "https://abc.supabase.co/auth/v1/user");
    }

    #[test]
    fn test_bearer_falls_back_to_anon_key() {
        let backend = RestBackend::new("https://abc.supabase.co", "anon").unwrap();
        assert_eq!(backend.bearer(None), "Bearer anon");
        assert_eq!(backend.bearer(Some("jwt")), "Bearer jwt");
    }

    #[test]
    fn test_token_response_uses_absolute_expiry() {
        let token: TokenResponse = serde_json::from_value(serde_json::json!({
            "access_token": "jwt",
            "token_type": "bearer",
            "expires_in": 3600,
            "expires_at": 1_700_000_000,
            "refresh_token": "r",
            "user": { "id": "u-1", "email": "a@b.c", "aud": "authenticated" }
        }))
        .unwrap();

        let session = token.into_session();

        assert_eq!(session.access_token, "jwt");
        assert_eq!(session.refresh_token.as_deref(), Some("r"));
        assert_eq!(session.expires_at.map(|t| t.timestamp()), Some(1_700_000_000));
        assert_eq!(session.user.id, "u-1");
    }

    #[test]
    fn test_parse_sign_up_with_session() {
        let body = serde_json::json!({
            "access_token": "jwt",
            "expires_in": 3600,
            "user": { "id": "u-1" }
        });
        let session = parse_sign_up(body).unwrap().unwrap();
        assert_eq!(session.user.id, "u-1");
        assert!(session.expires_at.is_some());
    }

    #[test]
    fn test_parse_sign_up_pending_confirmation() {
        let body = serde_json::json!({
            "id": "u-1",
            "email": "a@b.c",
            "confirmation_sent_at": "2024-01-01T00:00:00Z"
        });
        assert!(parse_sign_up(body).unwrap().is_none());
    }
}
