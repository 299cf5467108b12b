pub mod assistant;
pub mod executor;
pub mod generation;

pub use assistant::{LabAssistant, Record};
pub use executor::ResilientExecutor;
pub use generation::{parse_json_reply, strip_json_fences, ContentPart, GenerateRequest};
