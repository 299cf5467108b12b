use async_trait::async_trait;

use crate::credentials::Credential;
use crate::models::error::LabError;
use crate::request::generation::GenerateRequest;

/// One-shot generation call bound to a single credential.
#[async_trait]
pub trait GenerateClient: Send + Sync {
    /// Returns the raw reply text. Failures should be classified with
    /// [`LabError::from_status`] so quota errors rotate the credential.
    async fn generate(&self, request: &GenerateRequest) -> Result<String, LabError>;
}

/// Builds a fresh client handle for each attempt.
pub trait GenerateConnector: Send + Sync {
    type Client: GenerateClient;

    fn connect(&self, credential: &Credential) -> Self::Client;
}
