use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskerError {
    #[error("canceled by user")]
    Aborted,

    #[error("active parent not found: {0}")]
    ParentNotFound(String),

    #[error("failed to assign work item {id}: {reason}")]
    FailedToAssign { id: i64, reason: String },

    #[error("unable to parse page markup: {0}")]
    Markup(String),

    #[error("unable to determine parent work item ID from wiki page title '{0}'")]
    ParentIdFromTitle(String),

    #[error("page structure changed: {0}")]
    Structure(String),

    #[error("invalid table (part) number {part}: page has {total} task table(s)")]
    InvalidPart { part: usize, total: usize },

    #[error("wiki page not found: {0}")]
    PageNotFound(String),

    #[error("more than one page titled '{title}' in space '{space}'")]
    AmbiguousPage { space: String, title: String },

    #[error("background fetch failed: {0}")]
    Worker(String),

    #[error("not configured: create .tasker.yaml in the current or home directory")]
    NotConfigured,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{}", gateway_message(*status, message))]
    Gateway {
        status: Option<u16>,
        message: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn gateway_message(status: Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("remote service responded {code}: {message}"),
        None => format!("remote service error: {message}"),
    }
}

impl TaskerError {
    pub fn gateway(message: impl Into<String>) -> Self {
        TaskerError::Gateway {
            status: None,
            message: message.into(),
        }
    }

    /// True for 401/403 responses from either remote service.
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            TaskerError::Gateway {
                status: Some(401 | 403),
                ..
            }
        )
    }
}

pub type Result<T> = std::result::Result<T, TaskerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_error_keeps_remote_text_verbatim() {
        let err = TaskerError::Gateway {
            status: Some(401),
            message: "TF400813: not authorized".into(),
        };
        assert_eq!(
            err.to_string(),
            "remote service responded 401: TF400813: not authorized"
        );
        assert!(err.is_unauthorized());
        assert!(!TaskerError::gateway("boom").is_unauthorized());
    }
}
