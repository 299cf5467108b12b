pub mod capture_source;
pub mod clock;
pub mod duplex;
pub mod generate_client;
pub mod playback_sink;
pub mod session_delegate;
