//! Remote backend error types

use thiserror::Error;

/// Errors surfaced by the hosted data and auth services.
///
/// `Display` yields the bare message so composer failures can be shown
/// verbatim in the page.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// No session, or the service rejected the credentials/token
    #[error("{0}")]
    Unauthorized(String),

    /// Non-success response from the service
    #[error("{message}")]
    Api { status: u16, message: String },

    /// Transport failure
    #[error("{0}")]
    Http(#[from] reqwest::Error),

    /// Payload did not match the expected row shape
    #[error("{0}")]
    Decode(#[from] serde_json::Error),
}

impl RemoteError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        match self {
            Self::Unauthorized(_) => true,
            Self::Api { status, .. } => *status == 401 || *status == 403,
            Self::Http(e) => e
                .status()
                .is_some_and(|s| s.as_u16() == 401 || s.as_u16() == 403),
            Self::Decode(_) => false,
        }
    }
}

/// Result type alias using RemoteError.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Pull a human-readable message out of a PostgREST or GoTrue error body.
///
/// Both services answer with JSON objects but disagree on the field name.
pub fn extract_error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["message", "msg", "error_description", "error"] {
            if let Some(message) = value.get(key).and_then(|v| v.as_str()) {
                if !message.is_empty() {
                    return message.to_string();
                }
            }
        }
    }
    body.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_postgrest_message() {
        let body = r#"{"code":"42501","details":null,"hint":null,"message":"new row violates row-level security policy for table \"posts\""}"#;
        assert_eq!(
            extract_error_message(body),
            "new row violates row-level security policy for table \"posts\""
        );
    }

    #[test]
    fn test_extract_gotrue_messages() {
        assert_eq!(extract_error_message(r#"{"msg":"Invalid login credentials"}"#), "Invalid login credentials");
        assert_eq!(
            extract_error_message(r#"{"error":"invalid_grant","error_description":"Invalid Refresh Token"}"#),
            "Invalid Refresh Token"
        );
    }

    #[test]
    fn test_extract_plain_body() {
        assert_eq!(extract_error_message(" upstream timeout \n"), "upstream timeout");
    }

    #[test]
    fn test_display_is_bare_message() {
        let err = RemoteError::api(400, "title is too long");
        assert_eq!(err.to_string(), "title is too long");
        assert!(!err.is_unauthorized());
        assert!(RemoteError::api(401, "jwt expired").is_unauthorized());
    }
}
