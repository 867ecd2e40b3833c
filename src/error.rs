use std::sync::Arc;

/// Result type used throughout the selection core.
///
/// A standard Rust `Result` whose error variant is the crate-specific [`Error`] enum.
pub type Result<T> = std::result::Result<T, Error>;

/// Enum representing possible errors surfaced by the selection core.
///
/// Absence of an eligible advertisement is *not* an error; it is represented by
/// [`GeneratedAdvertisement::Empty`](crate::GeneratedAdvertisement::Empty).
#[derive(thiserror::Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// A collaborator store failed to serve a lookup. Propagated unchanged; the core
    /// performs no retry and no fallback.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// An I/O error.
    #[error(transparent)]
    // std::io::Error is not clonable, so we're wrapping it in an Arc.
    Io(Arc<std::io::Error>),
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(Arc::new(value))
    }
}

/// Error returned by content and targeting-group stores.
#[derive(thiserror::Error, Debug, Clone)]
#[non_exhaustive]
pub enum StoreError {
    /// The backing store cannot serve reads right now.
    #[error("store unavailable: {reason}")]
    Unavailable {
        /// Human-readable description of the failure.
        reason: String,
    },
}
