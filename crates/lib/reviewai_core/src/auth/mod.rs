//! Device authentication: token issuance, verification and refresh.

pub mod device;
pub mod token;

use thiserror::Error;

/// Token verification and issuance errors.
///
/// Callers switch on the variant to pick the response; only `Expired` asks
/// the client to refresh.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("Invalid token format")]
    InvalidFormat,

    #[error("Malformed token payload: {0}")]
    Malformed(String),

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Token expired")]
    Expired,

    #[error("Invalid token type")]
    WrongType,

    #[error("Token encoding failed: {0}")]
    Encode(String),
}
