pub mod capture;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod native;
pub mod playback;
pub mod session;
pub mod transcript;
pub mod transport;

pub use nimbus_live_types as types;
pub use nimbus_live_utils as utils;

pub use error::{DeviceError, SessionError, TransportError};
pub use session::{LiveSession, SessionState};
pub use transcript::{PartialCaption, Turn};
pub use types::SessionConfig;
