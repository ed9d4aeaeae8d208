use shared::error::ApiException;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid API base url {url:?}: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("session cookie is not a valid header value")]
    InvalidSessionCookie,
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server responded with {status}: {source}")]
    Server {
        status: u16,
        #[source]
        source: ApiException,
    },
    #[error("malformed response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("{}", .0.join("; "))]
    Validation(Vec<String>),
}

impl ClientError {
    pub fn server(status: u16, message: impl Into<String>) -> Self {
        ClientError::Server {
            status,
            source: ApiException::new(message),
        }
    }

    /// Text shown to the user. Server-provided messages pass through verbatim.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Server { source, .. } => source.message.clone(),
            other => other.to_string(),
        }
    }
}
