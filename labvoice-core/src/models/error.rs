use thiserror::Error;

/// Errors surfaced by the credential pool, one-shot requests and live sessions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LabError {
    /// The pool was configured without a single usable credential.
    #[error("no API credentials configured")]
    PoolExhausted,

    #[error("quota or permission error (status {status:?}): {message}")]
    QuotaOrPermission { status: Option<u16>, message: String },

    #[error("transient error: {0}")]
    Transient(String),

    #[error("all credentials failed after {attempts} attempts: {last}")]
    AllCredentialsFailed { attempts: usize, last: Box<LabError> },

    #[error("connect failed: {0}")]
    Connect(String),

    #[error("channel error: {0}")]
    Channel(String),

    #[error("channel closed")]
    ChannelClosed,

    #[error("device not available")]
    DeviceNotAvailable,

    #[error("permission denied")]
    PermissionDenied,

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl LabError {
    /// Classify a failed call by HTTP-style status and message.
    ///
    /// 429 and 403, or a message mentioning 429, are attributed to the credential.
    pub fn from_status(status: Option<u16>, message: impl Into<String>) -> Self {
        let message = message.into();
        let quota = matches!(status, Some(429) | Some(403)) || message.contains("429");
        if quota {
            Self::QuotaOrPermission { status, message }
        } else {
            Self::Transient(message)
        }
    }

    /// Whether this failure should suspend the credential that produced it.
    pub fn is_quota_or_permission(&self) -> bool {
        matches!(self, Self::QuotaOrPermission { .. })
    }
}

impl From<serde_json::Error> for LabError {
    fn from(err: serde_json::Error) -> Self {
        Self::Transient(format!("malformed JSON reply: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_rate_limit_and_forbidden() {
        assert!(LabError::from_status(Some(429), "slow down").is_quota_or_permission());
        assert!(LabError::from_status(Some(403), "forbidden").is_quota_or_permission());
    }

    #[test]
    fn classifies_429_in_message_without_status() {
        let err = LabError::from_status(None, "got 429 RESOURCE_EXHAUSTED");
        assert!(err.is_quota_or_permission());
    }

    #[test]
    fn other_failures_are_transient() {
        assert_eq!(
            LabError::from_status(Some(500), "boom"),
            LabError::Transient("boom".into())
        );
        assert!(!LabError::from_status(None, "connection reset").is_quota_or_permission());
    }

    #[test]
    fn json_errors_become_transient() {
        let err: LabError = serde_json::from_str::<serde_json::Value>("{nope").unwrap_err().into();
        assert!(matches!(err, LabError::Transient(_)));
    }
}
