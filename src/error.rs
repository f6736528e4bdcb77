use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Authentication failed: {0}")]
    AuthFailure(String),

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Backend error ({status}): {message}")]
    Backend { status: u16, message: String },

    #[error("JSON deserialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl GatewayError {
    /// Stable label for logs and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::NotFound(_) => "not_found",
            GatewayError::InvalidInput(_) => "invalid_input",
            GatewayError::AuthFailure(_) => "auth_failure",
            GatewayError::Transport(_) => "transport",
            GatewayError::Backend { .. } => "backend",
            GatewayError::Serialization(_) => "serialization",
            GatewayError::Config(_) => "config",
        }
    }
}

impl From<toml::de::Error> for GatewayError {
    fn from(err: toml::de::Error) -> Self {
        GatewayError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_labels() {
        assert_eq!(GatewayError::NotFound("x".into()).kind(), "not_found");
        assert_eq!(
            GatewayError::Backend { status: 500, message: "boom".into() }.kind(),
            "backend"
        );
    }

    #[test]
    fn test_backend_message_keeps_status() {
        let err = GatewayError::Backend { status: 503, message: "unavailable".into() };
        assert_eq!(err.to_string(), "Backend error (503): unavailable");
    }
}
