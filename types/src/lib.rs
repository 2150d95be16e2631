pub mod media;
pub mod messages;
pub mod session;

pub use media::MediaChunk;
pub use messages::{ClientMessage, ServerContent, ServerMessage};
pub use session::SessionConfig;
