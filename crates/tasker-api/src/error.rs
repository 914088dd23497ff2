use tasker_core::TaskerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} responded {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("unexpected {service} payload: {source}")]
    Payload {
        service: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid base address '{url}': {reason}")]
    BaseAddress { url: String, reason: String },

    #[error("{0}")]
    Identity(String),
}

impl From<ApiError> for TaskerError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::Status { status, body, .. } => TaskerError::Gateway {
                status: Some(status),
                message: body,
            },
            ApiError::Http(err) => TaskerError::Gateway {
                status: err.status().map(|s| s.as_u16()),
                message: err.to_string(),
            },
            ApiError::BaseAddress { .. } => TaskerError::Config(e.to_string()),
            other => TaskerError::gateway(other.to_string()),
        }
    }
}
