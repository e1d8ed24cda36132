// ============================================================================
// Error Taxonomy
// ============================================================================
//
// Every component error maps onto one of these kinds. Failures are atomic
// aborts: the runtime discards all state written by the failing transaction.
//
// ============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad input shape or wrong lifecycle phase. Caller-fixable.
    Precondition,
    /// Wrong resolver or missing role.
    Unauthorized,
    /// Insufficient balance, double resolution, duplicate initialization.
    Invariant,
    /// Price worse than the caller's limit.
    Slippage,
    /// No price exists for the requested trade.
    NoValidPrice,
    /// Arithmetic overflow or a quote that did not converge.
    Numeric,
}

impl ErrorKind {
    /// HTTP status used by the service layer.
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::Precondition => 400,
            ErrorKind::Unauthorized => 403,
            ErrorKind::Invariant => 409,
            ErrorKind::Slippage => 422,
            ErrorKind::NoValidPrice => 422,
            ErrorKind::Numeric => 500,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Precondition => "precondition",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Invariant => "invariant",
            ErrorKind::Slippage => "slippage",
            ErrorKind::NoValidPrice => "no_valid_price",
            ErrorKind::Numeric => "numeric",
        };
        f.write_str(s)
    }
}

/// Shared by every component error so the runtime can classify failures
/// without knowing which component raised them.
pub trait Classify {
    fn kind(&self) -> ErrorKind;
}
