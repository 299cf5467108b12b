use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rand::Rng;

use super::credential::Credential;
use crate::models::config::PoolConfig;
use crate::models::error::LabError;
use crate::traits::clock::{Clock, SystemClock};

/// Primary configuration slot read by [`CredentialPool::from_env`].
pub const PRIMARY_SLOT: &str = "API_KEY";

/// Prefix of the numbered slots `GENAI_TOKEN_1..=GENAI_TOKEN_20`.
pub const NUMBERED_SLOT_PREFIX: &str = "GENAI_TOKEN_";

pub const NUMBERED_SLOT_COUNT: usize = 20;

/// How the pool picks among unsuspended credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionStrategy {
    /// Cycle through the unsuspended credentials. For short one-shot calls.
    #[default]
    RoundRobin,
    /// Uniform pick. For long-lived sessions, so they leave the cursor alone.
    Random,
}

/// Rotation cursor and suspension expiries, guarded together so selection
/// never observes a half-applied suspension.
#[derive(Debug, Default)]
struct PoolState {
    cursor: usize,
    suspended: HashMap<Credential, Instant>,
}

impl PoolState {
    /// Lazily evicts an expired suspension on lookup. A key is still
    /// suspended at the exact instant its suspension ends.
    fn is_suspended(&mut self, credential: &Credential, now: Instant) -> bool {
        match self.suspended.get(credential) {
            Some(&until) if now <= until => true,
            Some(_) => {
                self.suspended.remove(credential);
                false
            }
            None => false,
        }
    }

    fn available(&mut self, credentials: &[Credential], now: Instant) -> Vec<Credential> {
        credentials
            .iter()
            .filter(|c| !self.is_suspended(c, now))
            .cloned()
            .collect()
    }
}

/// Process-wide set of interchangeable API credentials.
///
/// The credential list is fixed at construction; only suspension state and
/// the rotation cursor change afterwards.
pub struct CredentialPool {
    credentials: Vec<Credential>,
    state: Mutex<PoolState>,
    config: PoolConfig,
    clock: Arc<dyn Clock>,
}

impl CredentialPool {
    /// Build a pool from raw secrets. Blank entries are skipped, duplicates
    /// keep their first position.
    pub fn new<I, S>(secrets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::with_clock(secrets, PoolConfig::default(), Arc::new(SystemClock))
    }

    pub fn with_clock<I, S>(secrets: I, config: PoolConfig, clock: Arc<dyn Clock>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut credentials: Vec<Credential> = Vec::new();
        for secret in secrets {
            let secret = secret.as_ref().trim();
            if secret.is_empty() {
                continue;
            }
            let credential = Credential::new(secret);
            if !credentials.contains(&credential) {
                credentials.push(credential);
            }
        }

        log::info!("credential pool initialized with {} keys", credentials.len());

        Self {
            credentials,
            state: Mutex::new(PoolState::default()),
            config,
            clock,
        }
    }

    /// Build a pool from named configuration slots, in slot order.
    pub fn from_slots<I, K, V>(slots: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let secrets: Vec<String> = slots
            .into_iter()
            .filter(|(_, value)| !value.as_ref().trim().is_empty())
            .map(|(name, value)| {
                log::debug!("credential slot {} is set", name.as_ref());
                value.as_ref().to_string()
            })
            .collect();
        Self::new(secrets)
    }

    /// Read [`PRIMARY_SLOT`] then `GENAI_TOKEN_1..=20` from the environment.
    pub fn from_env() -> Self {
        let names = std::iter::once(PRIMARY_SLOT.to_string()).chain(
            (1..=NUMBERED_SLOT_COUNT).map(|i| format!("{}{}", NUMBERED_SLOT_PREFIX, i)),
        );
        let slots: Vec<(String, String)> = names
            .filter_map(|name| std::env::var(&name).ok().map(|value| (name, value)))
            .collect();
        Self::from_slots(slots)
    }

    /// Number of configured credentials, suspended or not.
    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    /// Count of credentials not currently suspended.
    pub fn available_count(&self) -> usize {
        let now = self.clock.now();
        let mut state = self.state.lock();
        self.credentials
            .iter()
            .filter(|c| !state.is_suspended(c, now))
            .count()
    }

    pub fn is_suspended(&self, credential: &Credential) -> bool {
        let now = self.clock.now();
        self.state.lock().is_suspended(credential, now)
    }

    /// Select the next credential.
    ///
    /// Fails only when the pool is empty. When every credential is suspended
    /// the first-configured one is returned anyway.
    pub fn next(&self, strategy: SelectionStrategy) -> Result<Credential, LabError> {
        if self.credentials.is_empty() {
            log::error!("no API keys available");
            return Err(LabError::PoolExhausted);
        }

        let now = self.clock.now();
        let mut state = self.state.lock();
        let available = state.available(&self.credentials, now);

        if available.is_empty() {
            log::warn!("all keys suspended, forcing reuse of primary key");
            return Ok(self.credentials[0].clone());
        }

        let credential = match strategy {
            SelectionStrategy::Random => {
                let index = rand::rng().random_range(0..available.len());
                available[index].clone()
            }
            SelectionStrategy::RoundRobin => {
                let credential = available[state.cursor % available.len()].clone();
                state.cursor = state.cursor.wrapping_add(1);
                credential
            }
        };
        Ok(credential)
    }

    /// Suspend for the configured duration.
    pub fn suspend(&self, credential: &Credential) {
        self.suspend_for(credential, self.config.suspension);
    }

    /// Mark `credential` unusable until `now + duration`. Re-suspending
    /// replaces the previous expiry.
    pub fn suspend_for(&self, credential: &Credential, duration: Duration) {
        if !self.credentials.contains(credential) {
            log::debug!("ignoring suspension of unknown key {}", credential);
            return;
        }
        log::warn!("suspending key {} for {:?}", credential, duration);
        let until = self.clock.now() + duration;
        self.state.lock().suspended.insert(credential.clone(), until);
    }
}

impl std::fmt::Debug for CredentialPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialPool")
            .field("credentials", &self.credentials)
            .field("suspension", &self.config.suspension)
            .finish()
    }
}
