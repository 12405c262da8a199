//! Remote data client
//!
//! All persistence and authentication is delegated to a hosted
//! backend-as-a-service. This module defines the two service surfaces the
//! application uses and provides two implementations:
//! - `RestBackend`: PostgREST + GoTrue over HTTP (reqwest)
//! - `MemoryBackend`: in-process tables for local runs and tests
//!
//! The backend is selected based on configuration.
//!
//! # Usage
//!
//! ```rust,ignore
//! use myblog::remote::{create_backend, Direction, Select};
//! use myblog::config::RemoteConfig;
//!
//! let remote = create_backend(&RemoteConfig::default())?;
//! let rows = remote.data.select(&Select::from("posts").order("created_at", Direction::Desc), None).await?;
//! ```

mod error;
pub mod memory;
pub mod query;
pub mod rest;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

use crate::config::{RemoteConfig, RemoteDriver};
use crate::models::{AuthSession, User};

pub use error::{extract_error_message, RemoteError, RemoteResult};
pub use memory::MemoryBackend;
pub use query::{Direction, Join, Select};
pub use rest::RestBackend;

/// Credentials and metadata for a new account.
#[derive(Debug, Clone, Serialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    /// Stored in user metadata; the profile row is created out of band
    pub username: String,
}

/// Authentication surface of the hosted service.
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Exchange email and password for a session
    async fn sign_in_with_password(&self, email: &str, password: &str) -> RemoteResult<AuthSession>;

    /// Create an account.
    ///
    /// Returns `None` when the service requires email confirmation before a
    /// session is issued.
    async fn sign_up(&self, request: &SignUpRequest) -> RemoteResult<Option<AuthSession>>;

    /// Look up the user owning `access_token`; `None` if the token is rejected
    async fn get_user(&self, access_token: &str) -> RemoteResult<Option<User>>;

    /// Trade a refresh token for a new session
    async fn refresh_session(&self, refresh_token: &str) -> RemoteResult<AuthSession>;

    /// Revoke the session behind `access_token`
    async fn sign_out(&self, access_token: &str) -> RemoteResult<()>;
}

/// Row-oriented data surface of the hosted service.
///
/// `access_token` is the signed-in user's token when there is one; requests
/// without it run with the anonymous key.
#[async_trait]
pub trait DataService: Send + Sync {
    /// Run a read query, returning rows in the requested order
    async fn select(&self, query: &Select, access_token: Option<&str>) -> RemoteResult<Vec<serde_json::Value>>;

    /// Insert one row
    async fn insert(&self, table: &str, row: serde_json::Value, access_token: Option<&str>) -> RemoteResult<()>;
}

/// Handles to both service surfaces of one backend.
#[derive(Clone)]
pub struct Remote {
    pub data: Arc<dyn DataService>,
    pub auth: Arc<dyn AuthService>,
}

impl Remote {
    /// Wrap a backend implementing both surfaces
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: DataService + AuthService + 'static,
    {
        Self {
            data: backend.clone(),
            auth: backend,
        }
    }
}

/// Create the backend selected by configuration.
pub fn create_backend(config: &RemoteConfig) -> anyhow::Result<Remote> {
    match config.driver {
        RemoteDriver::Memory => {
            tracing::warn!("Using the in-memory backend; data is lost on restart");
            Ok(Remote::from_backend(Arc::new(MemoryBackend::with_demo_data())))
        }
        RemoteDriver::Rest => {
            let backend = RestBackend::new(&config.url, &config.anon_key)?;
            tracing::info!(url = %config.url, "Using hosted backend");
            Ok(Remote::from_backend(Arc::new(backend)))
        }
    }
}

/// Decode raw rows into a typed model.
pub fn decode_rows<T: DeserializeOwned>(rows: Vec<serde_json::Value>) -> RemoteResult<Vec<T>> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(RemoteError::from))
        .collect()
}
