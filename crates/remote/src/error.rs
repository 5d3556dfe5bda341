//! Remote service error type.

use thiserror::Error;

/// Errors returned by the remote workflow and module services.
///
/// Callers treat both variants the same way (roll back, report); the split
/// only tells the user whether trying again might help.
/// - `Rejected`: the server refused the request.
/// - `Unavailable`: the request never got a usable answer.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RemoteError {
    /// The server understood the request and refused it.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// Transport failure or unusable response.
    #[error("service unavailable: {0}")]
    Unavailable(String),
}
