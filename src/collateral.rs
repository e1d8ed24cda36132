// ============================================================================
// Collateral Bank
// ============================================================================
//
// Fungible collateral assets with ERC-20 semantics. Each asset is keyed by
// its address; accounts hold balances and grant allowances to spenders.
//
// Assets are native-backed wrappers: `deposit` converts an account's native
// balance into tokens and `withdraw` converts back, so total supply always
// equals the native value locked in the asset.
//
// ============================================================================

use crate::event_log::EventLog;
use crate::error::{Classify, ErrorKind};
use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    UnknownAsset(Address),
    AssetExists(Address),
    InsufficientBalance { account: Address, needed: U256, available: U256 },
    InsufficientAllowance { owner: Address, spender: Address, needed: U256, available: U256 },
    Overflow(&'static str),
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::UnknownAsset(a) => write!(f, "unknown collateral asset {}", a),
            TokenError::AssetExists(a) => write!(f, "collateral asset {} already registered", a),
            TokenError::InsufficientBalance { account, needed, available } => write!(
                f,
                "insufficient balance for {}: needed {}, available {}",
                account, needed, available
            ),
            TokenError::InsufficientAllowance { owner, spender, needed, available } => write!(
                f,
                "insufficient allowance from {} to {}: needed {}, available {}",
                owner, spender, needed, available
            ),
            TokenError::Overflow(what) => write!(f, "overflow in {}", what),
        }
    }
}

impl std::error::Error for TokenError {}

impl Classify for TokenError {
    fn kind(&self) -> ErrorKind {
        match self {
            TokenError::UnknownAsset(_) => ErrorKind::Precondition,
            TokenError::AssetExists(_) => ErrorKind::Invariant,
            TokenError::InsufficientBalance { .. } => ErrorKind::Invariant,
            TokenError::InsufficientAllowance { .. } => ErrorKind::Invariant,
            TokenError::Overflow(_) => ErrorKind::Numeric,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TokenEvent {
    Transfer { asset: Address, from: Address, to: Address, value: U256 },
    Approval { asset: Address, owner: Address, spender: Address, value: U256 },
    Deposit { asset: Address, account: Address, value: U256 },
    Withdrawal { asset: Address, account: Address, value: U256 },
}

// ============================================================================
// TOKEN
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Token {
    pub symbol: String,
    pub total_supply: U256,
    balances: HashMap<Address, U256>,
    /// owner -> spender -> remaining allowance
    allowances: HashMap<Address, HashMap<Address, U256>>,
}

impl Token {
    pub fn new(symbol: &str) -> Self {
        Self { symbol: symbol.to_string(), ..Default::default() }
    }

    pub fn balance_of(&self, account: &Address) -> U256 {
        self.balances.get(account).copied().unwrap_or_default()
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> U256 {
        self.allowances
            .get(owner)
            .and_then(|m| m.get(spender))
            .copied()
            .unwrap_or_default()
    }

    pub(crate) fn debit(&mut self, account: Address, amount: U256) -> Result<(), TokenError> {
        let available = self.balance_of(&account);
        if available < amount {
            return Err(TokenError::InsufficientBalance { account, needed: amount, available });
        }
        self.balances.insert(account, available - amount);
        Ok(())
    }

    pub(crate) fn credit(&mut self, account: Address, amount: U256) -> Result<(), TokenError> {
        let current = self.balance_of(&account);
        let updated = current
            .checked_add(amount)
            .ok_or(TokenError::Overflow("token balance"))?;
        self.balances.insert(account, updated);
        Ok(())
    }

    pub fn mint(&mut self, to: Address, amount: U256) -> Result<(), TokenError> {
        self.total_supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(TokenError::Overflow("token supply"))?;
        self.credit(to, amount)
    }

    pub fn burn(&mut self, from: Address, amount: U256) -> Result<(), TokenError> {
        self.debit(from, amount)?;
        self.total_supply -= amount;
        Ok(())
    }

    pub fn approve(&mut self, owner: Address, spender: Address, amount: U256) {
        self.allowances.entry(owner).or_default().insert(spender, amount);
    }

    pub fn transfer(&mut self, from: Address, to: Address, amount: U256) -> Result<(), TokenError> {
        self.debit(from, amount)?;
        self.credit(to, amount)
    }

    /// Consumes allowance of `spender` over `owner`'s balance. Owners spend
    /// their own balance freely and `U256::MAX` allowances are never
    /// decremented.
    pub fn spend_allowance(
        &mut self,
        owner: Address,
        spender: Address,
        amount: U256,
    ) -> Result<(), TokenError> {
        if spender == owner {
            return Ok(());
        }
        let available = self.allowance(&owner, &spender);
        if available < amount {
            return Err(TokenError::InsufficientAllowance {
                owner,
                spender,
                needed: amount,
                available,
            });
        }
        if available != U256::MAX {
            self.approve(owner, spender, available - amount);
        }
        Ok(())
    }
}

// ============================================================================
// BANK
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenBank {
    tokens: HashMap<Address, Token>,
    /// Native value held by each account outside any token.
    native: HashMap<Address, U256>,
    events: EventLog<TokenEvent>,
}

impl TokenBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, asset: Address, symbol: &str) -> Result<(), TokenError> {
        if self.tokens.contains_key(&asset) {
            return Err(TokenError::AssetExists(asset));
        }
        self.tokens.insert(asset, Token::new(symbol));
        info!("🪙 Registered collateral {} ({})", symbol, asset);
        Ok(())
    }

    pub fn is_registered(&self, asset: &Address) -> bool {
        self.tokens.contains_key(asset)
    }

    pub fn token(&self, asset: &Address) -> Option<&Token> {
        self.tokens.get(asset)
    }

    fn token_mut(&mut self, asset: Address) -> Result<&mut Token, TokenError> {
        self.tokens.get_mut(&asset).ok_or(TokenError::UnknownAsset(asset))
    }

    pub fn events(&self) -> &[TokenEvent] {
        self.events.as_slice()
    }

    pub(crate) fn event_log_mut(&mut self) -> &mut EventLog<TokenEvent> {
        &mut self.events
    }

    // ---------------------------------------------------------------- native

    pub fn native_balance(&self, account: &Address) -> U256 {
        self.native.get(account).copied().unwrap_or_default()
    }

    /// Credits native value to an account (dev faucet / genesis allocation).
    pub fn fund_native(&mut self, account: Address, amount: U256) -> Result<(), TokenError> {
        let updated = self
            .native_balance(&account)
            .checked_add(amount)
            .ok_or(TokenError::Overflow("native balance"))?;
        self.native.insert(account, updated);
        debug!("Funded {} with {} native", account, amount);
        Ok(())
    }

    /// Wraps native value into `asset`.
    pub fn deposit(&mut self, asset: Address, account: Address, amount: U256) -> Result<(), TokenError> {
        let available = self.native_balance(&account);
        if available < amount {
            return Err(TokenError::InsufficientBalance { account, needed: amount, available });
        }
        self.token_mut(asset)?.mint(account, amount)?;
        self.native.insert(account, available - amount);
        self.events.push(TokenEvent::Deposit { asset, account, value: amount });
        debug!("{} deposited {} into {}", account, amount, asset);
        Ok(())
    }

    /// Unwraps `asset` back into native value.
    pub fn withdraw(&mut self, asset: Address, account: Address, amount: U256) -> Result<(), TokenError> {
        self.token_mut(asset)?.burn(account, amount)?;
        let native = self.native_balance(&account) + amount;
        self.native.insert(account, native);
        self.events.push(TokenEvent::Withdrawal { asset, account, value: amount });
        debug!("{} withdrew {} from {}", account, amount, asset);
        Ok(())
    }

    // ----------------------------------------------------------------- erc20

    pub fn balance_of(&self, asset: &Address, account: &Address) -> U256 {
        self.tokens
            .get(asset)
            .map(|t| t.balance_of(account))
            .unwrap_or_default()
    }

    pub fn allowance(&self, asset: &Address, owner: &Address, spender: &Address) -> U256 {
        self.tokens
            .get(asset)
            .map(|t| t.allowance(owner, spender))
            .unwrap_or_default()
    }

    pub fn total_supply(&self, asset: &Address) -> U256 {
        self.tokens.get(asset).map(|t| t.total_supply).unwrap_or_default()
    }

    pub fn approve(
        &mut self,
        asset: Address,
        owner: Address,
        spender: Address,
        amount: U256,
    ) -> Result<(), TokenError> {
        self.token_mut(asset)?.approve(owner, spender, amount);
        self.events.push(TokenEvent::Approval { asset, owner, spender, value: amount });
        Ok(())
    }

    pub fn transfer(
        &mut self,
        asset: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), TokenError> {
        self.token_mut(asset)?.transfer(from, to, amount)?;
        self.events.push(TokenEvent::Transfer { asset, from, to, value: amount });
        Ok(())
    }

    /// Moves `amount` from `from` to `to` on behalf of `spender`.
    pub fn transfer_from(
        &mut self,
        asset: Address,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), TokenError> {
        let token = self.token_mut(asset)?;
        token.spend_allowance(from, spender, amount)?;
        token.transfer(from, to, amount)?;
        self.events.push(TokenEvent::Transfer { asset, from, to, value: amount });
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
