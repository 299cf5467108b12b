use std::fmt;
use std::sync::Arc;

/// An API secret. Cheap to clone; formatting only ever shows a short prefix.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credential(Arc<str>);

impl Credential {
    pub fn new(secret: impl AsRef<str>) -> Self {
        Self(Arc::from(secret.as_ref()))
    }

    /// The raw secret, for handing to a connection constructor.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// First five characters followed by an ellipsis, for logs.
    pub fn redacted(&self) -> String {
        let prefix: String = self.0.chars().take(5).collect();
        format!("{}...", prefix)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&self.redacted()).finish()
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}
