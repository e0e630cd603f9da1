//! Error types for consent-sync.

use thiserror::Error;

use consent_core::StoreError;

/// Why the device identifier could not be obtained.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    /// The platform identifier service does not exist on this device.
    #[error("device identifier service unavailable: {0}")]
    PlatformUnavailable(String),

    /// The service exists but the user must repair or grant access first.
    #[error("device identifier service needs user action: {0}")]
    PlatformNeedsUserAction(String),

    /// The caller or the service is in a state where no identifier can be produced.
    #[error("device identifier in invalid state: {0}")]
    InvalidState(String),
}

/// The request never produced an HTTP status (DNS, connect, TLS, timeout).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("transport failure: {0}")]
pub struct TransportError(pub String);

/// All errors that can arise from a synchronization attempt.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("device identifier unavailable: {0}")]
    IdentifierUnavailable(#[from] IdentifierError),

    /// The remote sink answered with a non-2xx status.
    #[error("remote rejected consent with HTTP {status_code}")]
    RemoteRejected { status_code: u16 },

    #[error("remote unreachable: {0}")]
    TransportUnavailable(#[from] TransportError),

    #[error("local state error: {0}")]
    Store(#[from] StoreError),

    #[error("cannot record an undefined consent status")]
    UndefinedStatus,

    /// The background task panicked or was aborted.
    #[error("sync task did not complete: {0}")]
    Task(String),
}

impl SyncError {
    /// Whether repeating the same request later can plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::TransportUnavailable(_) => true,
            SyncError::RemoteRejected { status_code } => {
                matches!(status_code, 408 | 429 | 500..=599)
            }
            _ => false,
        }
    }
}
