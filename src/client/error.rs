// client/error.rs
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ClientError {
    #[error("Authentication required. Please log in.")]
    AuthenticationRequired,

    #[error("Request failed: {message}")]
    UpstreamRequestFailed {
        status: Option<u16>,
        message: String,
    },
}

impl ClientError {
    pub fn upstream(status: Option<u16>, message: impl Into<String>) -> Self {
        ClientError::UpstreamRequestFailed {
            status,
            message: message.into(),
        }
    }

    /// Network level failures: connection refused, timeouts, broken bodies.
    pub fn transport(err: reqwest::Error) -> Self {
        ClientError::UpstreamRequestFailed {
            status: err.status().map(|status| status.as_u16()),
            message: err.to_string(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::AuthenticationRequired => None,
            ClientError::UpstreamRequestFailed { status, .. } => *status,
        }
    }

    /// The single readable line shown to the user.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::AuthenticationRequired => self.to_string(),
            ClientError::UpstreamRequestFailed {
                status: Some(status),
                message,
            } => format!("{} (HTTP {})", message, status),
            ClientError::UpstreamRequestFailed { status: None, message } => message.clone(),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::transport(err)
    }
}
