pub mod instruction;
pub mod live;
pub mod wire;

pub use instruction::compose_system_instruction;
pub use live::LiveSession;
pub use wire::{LiveConnectConfig, MediaChunk, Modality, ServerMessage};
