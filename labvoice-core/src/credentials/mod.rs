pub mod credential;
pub mod pool;

pub use credential::Credential;
pub use pool::{CredentialPool, SelectionStrategy};
