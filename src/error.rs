//! Crate-level error type.

use thiserror::Error;

/// Errors surfaced by the server, its connections and its configuration.
///
/// Contact-form validation failures are not errors in this sense: they are
/// ordinary 400 responses produced by [`crate::contact::validate`].
#[derive(Debug, Error)]
pub enum SmartOpsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The configuration file could not be read, parsed or validated.
    #[error("config error ({path}): {detail}")]
    Config { path: String, detail: String },

    /// The inbound HTTP request could not be parsed.
    #[error("malformed request: {0}")]
    BadRequest(String),

    #[error("request larger than {limit} bytes")]
    PayloadTooLarge { limit: usize },

    /// The contact delivery collaborator rejected a submission.
    #[error("contact delivery failed: {0}")]
    Delivery(String),
}

pub type Result<T> = std::result::Result<T, SmartOpsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display_names_path() {
        let err = SmartOpsError::Config {
            path: "smartops.toml".to_string(),
            detail: "port out of range".to_string(),
        };
        assert_eq!(err.to_string(), "config error (smartops.toml): port out of range");
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::AddrInUse, "taken");
        let err: SmartOpsError = io.into();
        assert!(matches!(err, SmartOpsError::Io(_)));
        assert!(err.to_string().contains("taken"));
    }

    #[test]
    fn test_json_error_converts() {
        let parse = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: SmartOpsError = parse.into();
        assert!(err.to_string().starts_with("JSON error"));
    }
}
