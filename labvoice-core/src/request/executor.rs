use std::future::Future;
use std::sync::Arc;

use crate::credentials::{Credential, CredentialPool, SelectionStrategy};
use crate::models::error::LabError;
use crate::traits::generate_client::GenerateConnector;

/// Minimum number of attempts regardless of pool size.
pub const MIN_ATTEMPTS: usize = 3;

/// Runs one-shot operations in a bounded retry loop over the credential pool.
///
/// Attempts are strictly sequential. Each one draws a fresh round-robin
/// credential; quota and permission failures suspend that credential,
/// any other failure is retried on the next one without suspension.
#[derive(Debug, Clone)]
pub struct ResilientExecutor {
    pool: Arc<CredentialPool>,
}

impl ResilientExecutor {
    pub fn new(pool: Arc<CredentialPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Arc<CredentialPool> {
        &self.pool
    }

    /// `max(3, available credentials)`, sampled when a call starts.
    pub fn attempt_budget(&self) -> usize {
        MIN_ATTEMPTS.max(self.pool.available_count())
    }

    pub async fn execute<T, F, Fut>(&self, mut op: F) -> Result<T, LabError>
    where
        F: FnMut(Credential) -> Fut,
        Fut: Future<Output = Result<T, LabError>>,
    {
        let attempts = self.attempt_budget();
        let mut last_error = None;

        for attempt in 1..=attempts {
            let credential = self.pool.next(SelectionStrategy::RoundRobin)?;
            match op(credential.clone()).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    log::warn!(
                        "attempt {}/{} failed with key {}: {}",
                        attempt,
                        attempts,
                        credential,
                        err
                    );
                    if err.is_quota_or_permission() {
                        self.pool.suspend(&credential);
                    }
                    last_error = Some(err);
                }
            }
        }

        Err(LabError::AllCredentialsFailed {
            attempts,
            last: Box::new(
                last_error.unwrap_or_else(|| LabError::Transient("no attempt was made".into())),
            ),
        })
    }

    /// Like [`execute`](Self::execute), but hands `op` a fresh client bound
    /// to each attempt's credential.
    pub async fn execute_connected<C, T, F, Fut>(&self, connector: &C, mut op: F) -> Result<T, LabError>
    where
        C: GenerateConnector,
        F: FnMut(C::Client) -> Fut,
        Fut: Future<Output = Result<T, LabError>>,
    {
        self.execute(|credential| op(connector.connect(&credential))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use parking_lot::Mutex;

    fn quota() -> LabError {
        LabError::from_status(Some(429), "RESOURCE_EXHAUSTED")
    }

    #[tokio::test]
    async fn quota_on_every_key_exhausts_budget_and_suspends_all() {
        let pool = Arc::new(CredentialPool::new(["A", "B", "C", "D"]));
        let executor = ResilientExecutor::new(pool.clone());
        let tried = Mutex::new(Vec::new());

        let result: Result<(), LabError> = executor
            .execute(|credential| {
                tried.lock().push(credential);
                async { Err(quota()) }
            })
            .await;

        let tried = tried.into_inner();
        assert_eq!(tried.len(), 4);
        assert_eq!(tried.iter().collect::<HashSet<_>>().len(), 4);
        assert!(tried.iter().all(|c| pool.is_suspended(c)));
        match result {
            Err(LabError::AllCredentialsFailed { attempts, last }) => {
                assert_eq!(attempts, 4);
                assert!(last.is_quota_or_permission());
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn small_pools_still_get_three_attempts() {
        let pool = Arc::new(CredentialPool::new(["A"]));
        let executor = ResilientExecutor::new(pool.clone());
        let calls = Mutex::new(0usize);

        let result: Result<(), LabError> = executor
            .execute(|_| {
                *calls.lock() += 1;
                async { Err(quota()) }
            })
            .await;

        assert_eq!(*calls.lock(), 3);
        assert!(matches!(result, Err(LabError::AllCredentialsFailed { attempts: 3, .. })));
        assert!(pool.is_suspended(&Credential::new("A")));
    }

    #[tokio::test]
    async fn transient_errors_rotate_without_suspending() {
        let pool = Arc::new(CredentialPool::new(["A", "B", "C"]));
        let executor = ResilientExecutor::new(pool.clone());
        let tried = Mutex::new(Vec::new());

        let result = executor
            .execute(|credential| {
                let mut tried = tried.lock();
                tried.push(credential.clone());
                let attempt = tried.len();
                async move {
                    if attempt < 3 {
                        Err(LabError::Transient("connection reset".into()))
                    } else {
                        Ok(credential)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), Credential::new("C"));
        assert_eq!(pool.available_count(), 3);
    }

    #[tokio::test]
    async fn success_after_quota_failure_uses_next_key() {
        let pool = Arc::new(CredentialPool::new(["A", "B"]));
        let executor = ResilientExecutor::new(pool.clone());

        let result = executor
            .execute(|credential| async move {
                if credential.expose() == "A" {
                    Err(LabError::from_status(Some(403), "forbidden"))
                } else {
                    Ok(credential.expose().to_string())
                }
            })
            .await;

        assert_eq!(result.unwrap(), "B");
        assert!(pool.is_suspended(&Credential::new("A")));
        assert!(!pool.is_suspended(&Credential::new("B")));
    }

    #[tokio::test]
    async fn empty_pool_fails_immediately() {
        let pool = Arc::new(CredentialPool::new(Vec::<String>::new()));
        let executor = ResilientExecutor::new(pool);
        let calls = Mutex::new(0usize);

        let result: Result<(), LabError> = executor
            .execute(|_| {
                *calls.lock() += 1;
                async { Ok(()) }
            })
            .await;

        assert_eq!(result, Err(LabError::PoolExhausted));
        assert_eq!(*calls.lock(), 0);
    }
}
