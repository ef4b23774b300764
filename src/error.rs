//! Error types for the media-session library.
//!
//! Variants map to specific failure modes across the stack:
//!
//! - **Lifecycle**: [`InvalidState`](Error::InvalidState) — a definite answer
//!   was required from an already-closed entity (e.g. `get_stats()`).
//! - **Handler**: [`NotFound`](Error::NotFound) — an unknown handler-local id,
//!   [`ConnectionRejected`](Error::ConnectionRejected) — the owning session
//!   layer rejected the transport-setup handshake.
//! - **Contract misuse**: [`Programming`](Error::Programming) — e.g. calling
//!   [`Handler::run`](crate::handler::Handler::run) twice, or sending before
//!   it was called at all.
//! - **Listeners**: [`ListenerFault`](Error::ListenerFault) — returned by a
//!   listener to signal failure during an emission; contained and logged by
//!   [`EventEmitter::safe_emit`](crate::events::EventEmitter::safe_emit),
//!   propagated by [`EventEmitter::emit`](crate::events::EventEmitter::emit).
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Operation attempted on a closed entity where a definite answer is
    /// required.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    /// No track/stream is registered under the given handler-local id.
    #[error("local id not found: {0}")]
    NotFound(String),

    /// The API contract was violated by the caller.
    #[error("programming error: {0}")]
    Programming(&'static str),

    /// The session layer rejected the `@connect` handshake.
    #[error("transport connect rejected: {0}")]
    ConnectionRejected(String),

    /// An event listener failed during emission.
    #[error("listener fault: {0}")]
    ListenerFault(String),
}

/// Convenience alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
