use thiserror::Error;

/// Errors surfaced by the Huddle SDK.
///
/// `InvalidArgument` and `TrackReleased` are contract violations raised
/// synchronously at the call site, before any engine state is touched.
/// The remaining variants wrap failures reported by the engine or by the
/// token service.
#[derive(Debug, Error)]
pub enum HuddleError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("track has been released: {0}")]
    TrackReleased(String),
    #[error("not connected to a room")]
    NotConnected,
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("engine error: {0}")]
    Engine(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("http error: {0}")]
    Http(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}
