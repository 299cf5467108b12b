use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Speaker of a transcript message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

/// One transcript entry. `timestamp` is when its first fragment arrived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            role,
            text: text.into(),
            timestamp,
        }
    }
}
