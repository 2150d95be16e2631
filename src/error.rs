/// Failure to acquire local capture or playback hardware. Fatal to session
/// start; never retried automatically.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DeviceError {
    #[error("capture permission denied: {0}")]
    PermissionDenied(String),
    #[error("device unavailable: {0}")]
    Unavailable(String),
}

/// Failure of the remote session channel. Fatal to the current session; the
/// caller may start a new one, no automatic reconnect is attempted.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("failed to open session transport: {0}")]
    ConnectFailed(String),
    #[error("session transport fault: {0}")]
    Fault(String),
}

/// Everything `LiveSession::start` can surface.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("a session is already starting or active")]
    AlreadyActive,
    #[error("session start cancelled by stop()")]
    Cancelled,
}
