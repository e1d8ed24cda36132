// ============================================================================
// Market Maker - Fixed Product AMM over conditional positions
// ============================================================================
//
// A pool holds one reserve per outcome position and keeps the product of
// reserves constant across trades:
//
//   Π q[i] = k
//
// Buying outcome i: the net investment is split into every outcome (adding
// to every reserve) and the buyer takes enough of outcome i to restore k.
// Selling is the inverse: the seller adds outcome i tokens, the pool merges
// a common amount of every outcome back into collateral.
//
// Settlement uses exact integer arithmetic only (see `math`). The iterative
// solver in `quote` is advisory and never settles a trade.
//
// ============================================================================

pub mod factory;
pub mod fpmm;
pub mod math;
pub mod quote;

pub use factory::{FactoryEvent, FixedProductMarketMakerFactory};
pub use fpmm::{FixedProductMarketMaker, PoolEvent};
pub use math::{calc_buy_amount, calc_sell_amount, ONE};
pub use quote::{calc_sell_return, spot_prices};

use crate::collateral::TokenError;
use crate::error::{Classify, ErrorKind};
use crate::positions::LedgerError;
use std::fmt;

/// Treasury share of fees is expressed in basis points.
pub const TREASURY_PERCENT_DENOMINATOR: u64 = 10_000;

/// Upper bound on the number of outcome positions one pool may track.
pub const MAX_POOL_OUTCOMES: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarketMakerError {
    Precondition(String),
    Unauthorized(String),
    Invariant(String),
    Slippage(String),
    NoValidPrice(String),
    Numeric(String),
    Ledger(LedgerError),
    Collateral(TokenError),
}

impl MarketMakerError {
    pub fn precondition(reason: impl Into<String>) -> Self {
        MarketMakerError::Precondition(reason.into())
    }

    pub fn numeric(reason: impl Into<String>) -> Self {
        MarketMakerError::Numeric(reason.into())
    }

    pub fn reason(&self) -> String {
        match self {
            MarketMakerError::Precondition(r)
            | MarketMakerError::Unauthorized(r)
            | MarketMakerError::Invariant(r)
            | MarketMakerError::Slippage(r)
            | MarketMakerError::NoValidPrice(r)
            | MarketMakerError::Numeric(r) => r.clone(),
            MarketMakerError::Ledger(e) => e.reason(),
            MarketMakerError::Collateral(e) => e.to_string(),
        }
    }
}

impl fmt::Display for MarketMakerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reason())
    }
}

impl std::error::Error for MarketMakerError {}

impl Classify for MarketMakerError {
    fn kind(&self) -> ErrorKind {
        match self {
            MarketMakerError::Precondition(_) => ErrorKind::Precondition,
            MarketMakerError::Unauthorized(_) => ErrorKind::Unauthorized,
            MarketMakerError::Invariant(_) => ErrorKind::Invariant,
            MarketMakerError::Slippage(_) => ErrorKind::Slippage,
            MarketMakerError::NoValidPrice(_) => ErrorKind::NoValidPrice,
            MarketMakerError::Numeric(_) => ErrorKind::Numeric,
            MarketMakerError::Ledger(e) => e.kind(),
            MarketMakerError::Collateral(e) => e.kind(),
        }
    }
}

impl From<LedgerError> for MarketMakerError {
    fn from(e: LedgerError) -> Self {
        MarketMakerError::Ledger(e)
    }
}

impl From<TokenError> for MarketMakerError {
    fn from(e: TokenError) -> Self {
        MarketMakerError::Collateral(e)
    }
}

impl From<crate::positions::CurveError> for MarketMakerError {
    fn from(e: crate::positions::CurveError) -> Self {
        MarketMakerError::Ledger(e.into())
    }
}
