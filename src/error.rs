use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid query: {0}")]
    Validation(String),

    #[error("unknown variable {variable:?} for dataset {dataset}")]
    UnknownVariable { variable: String, dataset: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("request rejected by the archive: {message}{}", fmt_reason(.reason))]
    Api {
        message: String,
        reason: Option<String>,
    },

    #[error("unexpected task state: {0}")]
    UnexpectedState(String),

    #[error("download size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: u64, actual: u64 },
}

fn fmt_reason(reason: &Option<String>) -> String {
    reason.as_deref().map(|r| format!(" ({r})")).unwrap_or_default()
}

impl Error {
    /// True for failures raised while talking to the archive, as opposed to
    /// rejecting the query before any network activity.
    pub fn is_retrieval(&self) -> bool {
        !matches!(
            self,
            Error::Validation(_) | Error::UnknownVariable { .. } | Error::Config(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn api_error_includes_reason_when_present() {
        let e = Error::Api {
            message: "the request you have submitted is not valid".into(),
            reason: Some("Ambiguous parameter: day".into()),
        };
        assert_eq!(
            e.to_string(),
            "request rejected by the archive: the request you have submitted is not valid (Ambiguous parameter: day)"
        );

        let e = Error::Api {
            message: "quota exceeded".into(),
            reason: None,
        };
        assert_eq!(e.to_string(), "request rejected by the archive: quota exceeded");
    }

    #[test]
    fn classifies_retrieval_errors() {
        assert!(!Error::Validation("x".into()).is_retrieval());
        assert!(!Error::Config("x".into()).is_retrieval());
        assert!(Error::UnexpectedState("paused".into()).is_retrieval());
        assert!(Error::SizeMismatch { expected: 1, actual: 0 }.is_retrieval());
    }
}
