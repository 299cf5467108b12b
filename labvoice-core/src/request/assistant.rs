use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::executor::ResilientExecutor;
use super::generation::{parse_json_reply, GenerateRequest};
use crate::credentials::{Credential, CredentialPool, SelectionStrategy};
use crate::models::config::DEFAULT_GENERATE_MODEL;
use crate::models::error::LabError;
use crate::traits::generate_client::{GenerateClient, GenerateConnector};

/// A parsed reply stamped with a fresh id and creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record<T> {
    pub id: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    #[serde(flatten)]
    pub value: T,
}

impl<T> Record<T> {
    pub fn new(value: T) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            value,
        }
    }
}

/// Entry point for the generation service.
///
/// One-shot calls go through the [`ResilientExecutor`] and resolve to `None`
/// once the retry budget is spent. Live sessions draw their credential here
/// with the random strategy.
pub struct LabAssistant<C: GenerateConnector> {
    executor: ResilientExecutor,
    connector: C,
    model: String,
}

impl<C: GenerateConnector> LabAssistant<C> {
    pub fn new(pool: Arc<CredentialPool>, connector: C) -> Self {
        Self {
            executor: ResilientExecutor::new(pool),
            connector,
            model: DEFAULT_GENERATE_MODEL.into(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn pool(&self) -> &Arc<CredentialPool> {
        self.executor.pool()
    }

    /// An empty request for the configured model.
    pub fn request(&self) -> GenerateRequest {
        GenerateRequest::new(self.model.clone())
    }

    /// Credential for a long-lived session.
    pub fn live_credential(&self) -> Result<Credential, LabError> {
        let credential = self.pool().next(SelectionStrategy::Random)?;
        log::info!("starting live session with key {}", credential);
        Ok(credential)
    }

    /// Raw reply text, retried across the pool.
    pub async fn generate_text(&self, request: &GenerateRequest) -> Result<String, LabError> {
        self.executor
            .execute_connected(&self.connector, move |client| async move {
                client.generate(request).await
            })
            .await
    }

    /// Parsed JSON reply, or `None` when every attempt failed.
    ///
    /// A reply that does not parse counts as a failed attempt.
    pub async fn generate_json<T: DeserializeOwned>(&self, request: &GenerateRequest) -> Option<T> {
        let result = self
            .executor
            .execute_connected(&self.connector, move |client| async move {
                let text = client.generate(request).await?;
                parse_json_reply::<T>(&text)
            })
            .await;

        match result {
            Ok(value) => Some(value),
            Err(err) => {
                log::error!("one-shot request failed: {}", err);
                None
            }
        }
    }

    /// Like [`generate_json`](Self::generate_json), stamped as a [`Record`].
    pub async fn generate_record<T: DeserializeOwned>(
        &self,
        request: &GenerateRequest,
    ) -> Option<Record<T>> {
        self.generate_json(request).await.map(Record::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Plate {
        organism_suspicion: String,
    }

    /// Replies are popped in call order; each call records its key.
    #[derive(Clone, Default)]
    struct Scripted {
        replies: Arc<Mutex<VecDeque<Result<String, LabError>>>>,
        keys: Arc<Mutex<Vec<String>>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<String, LabError>>) -> Self {
            Self {
                replies: Arc::new(Mutex::new(replies.into())),
                keys: Arc::default(),
            }
        }
    }

    struct ScriptedClient {
        key: String,
        script: Scripted,
    }

    #[async_trait]
    impl GenerateClient for ScriptedClient {
        async fn generate(&self, _request: &GenerateRequest) -> Result<String, LabError> {
            self.script.keys.lock().push(self.key.clone());
            self.script
                .replies
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(LabError::Transient("script exhausted".into())))
        }
    }

    impl GenerateConnector for Scripted {
        type Client = ScriptedClient;

        fn connect(&self, credential: &Credential) -> ScriptedClient {
            ScriptedClient {
                key: credential.expose().to_string(),
                script: self.clone(),
            }
        }
    }

    fn assistant(keys: &[&str], script: Scripted) -> LabAssistant<Scripted> {
        LabAssistant::new(Arc::new(CredentialPool::new(keys.iter())), script)
    }

    #[tokio::test]
    async fn malformed_reply_is_retried_on_next_key() {
        let script = Scripted::new(vec![
            Ok("not json at all".into()),
            Ok("```json\n{\"organism_suspicion\": \"E. coli\"}\n```".into()),
        ]);
        let assistant = assistant(&["A", "B"], script.clone());
        let request = assistant.request().text("analyze").expect_json();

        let plate: Option<Plate> = assistant.generate_json(&request).await;

        assert_eq!(plate.unwrap().organism_suspicion, "E. coli");
        assert_eq!(*script.keys.lock(), vec!["A".to_string(), "B".to_string()]);
        assert_eq!(assistant.pool().available_count(), 2);
    }

    #[tokio::test]
    async fn exhausted_budget_resolves_to_none() {
        let script = Scripted::new(vec![
            Err(LabError::from_status(Some(429), "quota")),
            Err(LabError::from_status(Some(429), "quota")),
            Err(LabError::from_status(Some(429), "quota")),
        ]);
        let assistant = assistant(&["A", "B"], script.clone());

        let plate: Option<Plate> = assistant.generate_json(&assistant.request()).await;

        assert!(plate.is_none());
        assert_eq!(script.keys.lock().len(), 3);
        assert_eq!(assistant.pool().available_count(), 0);
    }

    #[tokio::test]
    async fn records_carry_id_and_timestamp() {
        let script = Scripted::new(vec![Ok("{\"organism_suspicion\": \"Candida\"}".into())]);
        let assistant = assistant(&["A"], script);

        let record: Record<Plate> = assistant.generate_record(&assistant.request()).await.unwrap();

        assert_eq!(record.value.organism_suspicion, "Candida");
        assert_eq!(record.id.len(), 36);
        assert!(record.timestamp > 0);
    }

    #[tokio::test]
    async fn generate_text_surfaces_all_failed() {
        let assistant = assistant(&["A"], Scripted::new(vec![]));
        let err = assistant.generate_text(&assistant.request()).await.unwrap_err();
        assert!(matches!(err, LabError::AllCredentialsFailed { attempts: 3, .. }));
    }

    #[test]
    fn live_credential_requires_keys() {
        let empty = assistant(&[], Scripted::default());
        assert_eq!(empty.live_credential(), Err(LabError::PoolExhausted));
        let single = assistant(&["A"], Scripted::default());
        assert_eq!(single.live_credential().unwrap().expose(), "A");
    }
}
