/// Conditional Markets
/// Conditional outcome tokens, fixed-product market makers and a social
/// resolution oracle, exported as a library crate

pub mod collateral;
pub mod config;
pub mod error;
pub mod event_log;
pub mod market_maker;
pub mod oracle;
pub mod positions;
pub mod runtime;

pub mod app_state;
pub mod handlers;
pub mod models;

pub use collateral::{Token, TokenBank, TokenError, TokenEvent};
pub use config::Config;
pub use error::{Classify, ErrorKind};
pub use market_maker::{
    calc_buy_amount, calc_sell_amount, calc_sell_return, spot_prices, FactoryEvent,
    FixedProductMarketMaker, FixedProductMarketMakerFactory, MarketMakerError, PoolEvent, ONE,
};
pub use oracle::{
    AttestationVerifier, Ed25519Verifier, OracleError, OracleEvent, PermissiveVerifier, Proof,
    Question, QuestionParams, Role, SocialOracle, Status, VerifierType,
};
pub use positions::{
    condition_id, position_id, CollectionId, Condition, ConditionalTokens, CurvePoint,
    LedgerError, LedgerEvent, Resolution,
};
pub use runtime::{Chain, ChainError, Genesis};
