// ============================================================================
// Chain Runtime - serialized, atomic transactions over every component
// ============================================================================
//
// Components mutate their own state as they go and may leave partial writes
// behind when they fail midway. `Chain::execute` snapshots the world (minus
// the event logs, which are detached first) before each transaction and
// restores it on any error, so a failed call commits nothing.
//
//   execute(tx) = detach logs → snapshot → tx(&mut chain)
//                 → Ok:  reattach logs ahead of new events, height += 1
//                 → Err: restore snapshot, reattach logs
//
// Time is an explicit clock moved by the host (`sync_clock` / `advance`),
// never read from the OS inside a transaction.
//
// ============================================================================

use crate::collateral::{TokenBank, TokenError, TokenEvent};
use crate::error::{Classify, ErrorKind};
use crate::event_log::EventLog;
use crate::market_maker::{
    FactoryEvent, FixedProductMarketMaker, FixedProductMarketMakerFactory, MarketMakerError, PoolEvent,
};
use crate::oracle::{OracleError, OracleEvent, Proof, QuestionParams, Role, SocialOracle, Status, VerifierType};
use crate::positions::{derive_address, CollectionId, ConditionalTokens, LedgerError, LedgerEvent};
use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    Collateral(TokenError),
    Ledger(LedgerError),
    MarketMaker(MarketMakerError),
    Oracle(OracleError),
    UnknownPool(Address),
}

impl ChainError {
    pub fn reason(&self) -> String {
        match self {
            ChainError::Collateral(e) => e.to_string(),
            ChainError::Ledger(e) => e.reason(),
            ChainError::MarketMaker(e) => e.reason(),
            ChainError::Oracle(e) => e.reason(),
            ChainError::UnknownPool(a) => format!("unknown pool {}", a),
        }
    }
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reason())
    }
}

impl std::error::Error for ChainError {}

impl Classify for ChainError {
    fn kind(&self) -> ErrorKind {
        match self {
            ChainError::Collateral(e) => e.kind(),
            ChainError::Ledger(e) => e.kind(),
            ChainError::MarketMaker(e) => e.kind(),
            ChainError::Oracle(e) => e.kind(),
            ChainError::UnknownPool(_) => ErrorKind::Precondition,
        }
    }
}

impl From<TokenError> for ChainError {
    fn from(e: TokenError) -> Self {
        ChainError::Collateral(e)
    }
}

impl From<LedgerError> for ChainError {
    fn from(e: LedgerError) -> Self {
        ChainError::Ledger(e)
    }
}

impl From<MarketMakerError> for ChainError {
    fn from(e: MarketMakerError) -> Self {
        ChainError::MarketMaker(e)
    }
}

impl From<OracleError> for ChainError {
    fn from(e: OracleError) -> Self {
        ChainError::Oracle(e)
    }
}

// ============================================================================
// GENESIS
// ============================================================================

/// Parameters fixed at chain creation.
#[derive(Debug, Clone)]
pub struct Genesis {
    pub time: u64,
    pub oracle_admin: Address,
    pub verifier: VerifierType,
    pub min_votes: u64,
}

/// Well-known component addresses, derived from fixed labels.
pub fn ledger_address() -> Address {
    derive_address(b"conditional-tokens", 0)
}

pub fn factory_address() -> Address {
    derive_address(b"fixed-product-market-maker-factory", 0)
}

pub fn oracle_address() -> Address {
    derive_address(b"social-oracle", 0)
}

/// Wrapped native collateral registered at genesis.
pub fn weth_address() -> Address {
    derive_address(b"wrapped-ether", 0)
}

// ============================================================================
// CHAIN
// ============================================================================

/// Event logs held aside while a transaction runs.
struct History {
    bank: EventLog<TokenEvent>,
    ledger: EventLog<LedgerEvent>,
    factory: EventLog<FactoryEvent>,
    oracle: EventLog<OracleEvent>,
    pools: Vec<(Address, EventLog<PoolEvent>)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chain {
    pub bank: TokenBank,
    pub ledger: ConditionalTokens,
    pub factory: FixedProductMarketMakerFactory,
    pub oracle: SocialOracle,
    now: u64,
    /// Committed transactions.
    height: u64,
}

impl Chain {
    pub fn new(genesis: Genesis) -> Result<Self, ChainError> {
        let mut bank = TokenBank::new();
        bank.register(weth_address(), "WETH")?;
        let oracle = SocialOracle::new(
            oracle_address(),
            genesis.oracle_admin,
            genesis.verifier,
            genesis.min_votes,
        )?;
        Ok(Self {
            bank,
            ledger: ConditionalTokens::new(ledger_address()),
            factory: FixedProductMarketMakerFactory::new(factory_address()),
            oracle,
            now: genesis.time,
            height: 0,
        })
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    /// Moves the clock forward. Time never goes backwards.
    pub fn advance(&mut self, seconds: u64) -> u64 {
        self.now = self.now.saturating_add(seconds);
        debug!("⏱️  Clock advanced {}s to {}", seconds, self.now);
        self.now
    }

    /// Pulls the clock up to `wall` when the wall clock is ahead.
    pub fn sync_clock(&mut self, wall: u64) -> u64 {
        if wall > self.now {
            self.now = wall;
        }
        self.now
    }

    /// Runs `tx` atomically.
    pub fn execute<T, E>(
        &mut self,
        label: &str,
        tx: impl FnOnce(&mut Chain) -> Result<T, E>,
    ) -> Result<T, ChainError>
    where
        E: Into<ChainError>,
    {
        let history = self.detach_events();
        let snapshot = self.clone();
        match tx(self) {
            Ok(value) => {
                self.attach_events(history);
                self.height += 1;
                debug!("✅ {} committed at height {}", label, self.height);
                Ok(value)
            }
            Err(e) => {
                let err: ChainError = e.into();
                *self = snapshot;
                self.attach_events(history);
                warn!("↩️  {} reverted ({}): {}", label, err.kind(), err);
                Err(err)
            }
        }
    }

    fn detach_events(&mut self) -> History {
        History {
            bank: self.bank.event_log_mut().take(),
            ledger: self.ledger.event_log_mut().take(),
            factory: self.factory.event_log_mut().take(),
            oracle: self.oracle.event_log_mut().take(),
            pools: self
                .factory
                .pools_mut()
                .map(|p| (p.address, p.event_log_mut().take()))
                .collect(),
        }
    }

    fn attach_events(&mut self, history: History) {
        self.bank.event_log_mut().restore(history.bank);
        self.ledger.event_log_mut().restore(history.ledger);
        self.factory.event_log_mut().restore(history.factory);
        self.oracle.event_log_mut().restore(history.oracle);
        for (address, log) in history.pools {
            if let Some(pool) = self.factory.pool_mut(&address) {
                pool.event_log_mut().restore(log);
            }
        }
    }

    pub fn pool(&self, address: &Address) -> Result<&FixedProductMarketMaker, ChainError> {
        self.factory.pool(address).ok_or(ChainError::UnknownPool(*address))
    }

    /// Runs `f` with a pool and the ledger and bank it trades against.
    fn with_pool<T>(
        &mut self,
        pool: Address,
        f: impl FnOnce(
            &mut FixedProductMarketMaker,
            &mut ConditionalTokens,
            &mut TokenBank,
        ) -> Result<T, MarketMakerError>,
    ) -> Result<T, ChainError> {
        let Chain { factory, ledger, bank, .. } = self;
        let pool = factory.pool_mut(&pool).ok_or(ChainError::UnknownPool(pool))?;
        Ok(f(pool, ledger, bank)?)
    }

    // ------------------------------------------------------------------------
    // Collateral
    // ------------------------------------------------------------------------

    /// Dev faucet: credits native value.
    pub fn faucet(&mut self, account: Address, amount: U256) -> Result<(), ChainError> {
        self.execute("faucet", |c| c.bank.fund_native(account, amount))
    }

    pub fn deposit(&mut self, sender: Address, asset: Address, amount: U256) -> Result<(), ChainError> {
        self.execute("deposit", |c| c.bank.deposit(asset, sender, amount))
    }

    pub fn withdraw(&mut self, sender: Address, asset: Address, amount: U256) -> Result<(), ChainError> {
        self.execute("withdraw", |c| c.bank.withdraw(asset, sender, amount))
    }

    pub fn approve_collateral(
        &mut self,
        sender: Address,
        asset: Address,
        spender: Address,
        amount: U256,
    ) -> Result<(), ChainError> {
        self.execute("approve", |c| c.bank.approve(asset, sender, spender, amount))
    }

    pub fn transfer_collateral(
        &mut self,
        sender: Address,
        asset: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), ChainError> {
        self.execute("transfer", |c| c.bank.transfer(asset, sender, to, amount))
    }

    // ------------------------------------------------------------------------
    // Conditional ledger
    // ------------------------------------------------------------------------

    pub fn prepare_condition(
        &mut self,
        oracle: Address,
        question_id: B256,
        outcome_slot_count: usize,
    ) -> Result<B256, ChainError> {
        self.execute("prepareCondition", |c| {
            c.ledger.prepare_condition(oracle, question_id, outcome_slot_count)
        })
    }

    pub fn report_payouts(
        &mut self,
        sender: Address,
        question_id: B256,
        payouts: &[U256],
    ) -> Result<B256, ChainError> {
        self.execute("reportPayouts", |c| c.ledger.report_payouts(sender, question_id, payouts))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn split_position(
        &mut self,
        sender: Address,
        collateral: Address,
        parent: CollectionId,
        condition_id: B256,
        partition: &[U256],
        amount: U256,
    ) -> Result<(), ChainError> {
        self.execute("splitPosition", |c| {
            let Chain { ledger, bank, .. } = c;
            ledger.split_position(bank, sender, collateral, parent, condition_id, partition, amount)
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn merge_positions(
        &mut self,
        sender: Address,
        collateral: Address,
        parent: CollectionId,
        condition_id: B256,
        partition: &[U256],
        amount: U256,
    ) -> Result<(), ChainError> {
        self.execute("mergePositions", |c| {
            let Chain { ledger, bank, .. } = c;
            ledger.merge_positions(bank, sender, collateral, parent, condition_id, partition, amount)
        })
    }

    pub fn redeem_positions(
        &mut self,
        sender: Address,
        collateral: Address,
        parent: CollectionId,
        condition_id: B256,
        index_sets: &[U256],
    ) -> Result<U256, ChainError> {
        self.execute("redeemPositions", |c| {
            let Chain { ledger, bank, .. } = c;
            ledger.redeem_positions(bank, sender, collateral, parent, condition_id, index_sets)
        })
    }

    pub fn set_approval_for_all(
        &mut self,
        sender: Address,
        operator: Address,
        approved: bool,
    ) -> Result<(), ChainError> {
        self.execute("setApprovalForAll", |c| {
            c.ledger.set_approval_for_all(sender, operator, approved);
            Ok::<(), LedgerError>(())
        })
    }

    pub fn safe_transfer_from(
        &mut self,
        sender: Address,
        from: Address,
        to: Address,
        id: U256,
        amount: U256,
    ) -> Result<(), ChainError> {
        self.execute("safeTransferFrom", |c| {
            c.ledger.safe_transfer_from(sender, from, to, id, amount)
        })
    }

    pub fn safe_batch_transfer_from(
        &mut self,
        sender: Address,
        from: Address,
        to: Address,
        ids: &[U256],
        amounts: &[U256],
    ) -> Result<(), ChainError> {
        self.execute("safeBatchTransferFrom", |c| {
            c.ledger.safe_batch_transfer_from(sender, from, to, ids, amounts)
        })
    }

    // ------------------------------------------------------------------------
    // Market maker
    // ------------------------------------------------------------------------

    pub fn create_pool(
        &mut self,
        creator: Address,
        collateral: Address,
        condition_ids: Vec<B256>,
        fee: U256,
        treasury_percent: u64,
        treasury: Address,
    ) -> Result<Address, ChainError> {
        self.execute("createFixedProductMarketMaker", |c| {
            c.factory.create_fixed_product_market_maker(
                &c.ledger,
                &c.bank,
                creator,
                collateral,
                condition_ids,
                fee,
                treasury_percent,
                treasury,
            )
        })
    }

    pub fn add_funding(
        &mut self,
        sender: Address,
        pool: Address,
        amount: U256,
        distribution_hint: &[U256],
    ) -> Result<U256, ChainError> {
        self.execute("addFunding", |c| {
            c.with_pool(pool, |p, ledger, bank| {
                Ok(p.add_funding(ledger, bank, sender, amount, distribution_hint)?.shares)
            })
        })
    }

    pub fn remove_funding(
        &mut self,
        sender: Address,
        pool: Address,
        shares: U256,
    ) -> Result<Vec<U256>, ChainError> {
        self.execute("removeFunding", |c| {
            c.with_pool(pool, |p, ledger, bank| p.remove_funding(ledger, bank, sender, shares))
        })
    }

    pub fn buy(
        &mut self,
        sender: Address,
        pool: Address,
        investment: U256,
        outcome_index: usize,
        min_outcome_tokens: U256,
    ) -> Result<U256, ChainError> {
        self.execute("buy", |c| {
            c.with_pool(pool, |p, ledger, bank| {
                p.buy(ledger, bank, sender, investment, outcome_index, min_outcome_tokens)
            })
        })
    }

    pub fn sell(
        &mut self,
        sender: Address,
        pool: Address,
        return_amount: U256,
        outcome_index: usize,
        max_outcome_tokens: U256,
    ) -> Result<U256, ChainError> {
        self.execute("sell", |c| {
            c.with_pool(pool, |p, ledger, bank| {
                p.sell(ledger, bank, sender, return_amount, outcome_index, max_outcome_tokens)
            })
        })
    }

    pub fn withdraw_fees(&mut self, sender: Address, pool: Address) -> Result<U256, ChainError> {
        self.execute("withdrawFees", |c| {
            c.with_pool(pool, |p, _, bank| p.withdraw_fees(bank, sender))
        })
    }

    pub fn transfer_shares(
        &mut self,
        sender: Address,
        pool: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), ChainError> {
        self.execute("transferShares", |c| {
            c.with_pool(pool, |p, _, _| p.transfer(sender, to, amount))
        })
    }

    pub fn approve_shares(
        &mut self,
        sender: Address,
        pool: Address,
        spender: Address,
        amount: U256,
    ) -> Result<(), ChainError> {
        self.execute("approveShares", |c| {
            c.with_pool(pool, |p, _, _| {
                p.approve(sender, spender, amount);
                Ok(())
            })
        })
    }

    pub fn transfer_shares_from(
        &mut self,
        sender: Address,
        pool: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), ChainError> {
        self.execute("transferSharesFrom", |c| {
            c.with_pool(pool, |p, _, _| p.transfer_from(sender, from, to, amount))
        })
    }

    // ------------------------------------------------------------------------
    // Oracle
    // ------------------------------------------------------------------------

    pub fn initialize_question(
        &mut self,
        question_id: B256,
        params: QuestionParams,
    ) -> Result<B256, ChainError> {
        self.execute("initializeQuestion", |c| {
            let now = c.now;
            c.oracle.initialize_question(&mut c.ledger, question_id, params, now)
        })
    }

    pub fn finalize_question(&mut self, question_id: B256, proofs: &[Proof]) -> Result<Status, ChainError> {
        self.execute("finalizeQuestion", |c| {
            let now = c.now;
            c.oracle.finalize_question(&mut c.ledger, question_id, proofs, now)
        })
    }

    pub fn vote(&mut self, sender: Address, question_id: B256, outcome_idx: usize) -> Result<Status, ChainError> {
        self.execute("vote", |c| c.oracle.vote(&mut c.ledger, sender, question_id, outcome_idx))
    }

    pub fn grant_role(&mut self, sender: Address, role: Role, account: Address) -> Result<(), ChainError> {
        self.execute("grantRole", |c| c.oracle.grant_role(sender, role, account))
    }

    pub fn revoke_role(&mut self, sender: Address, role: Role, account: Address) -> Result<(), ChainError> {
        self.execute("revokeRole", |c| c.oracle.revoke_role(sender, role, account))
    }

    pub fn renounce_role(&mut self, sender: Address, role: Role, account: Address) -> Result<(), ChainError> {
        self.execute("renounceRole", |c| c.oracle.renounce_role(sender, role, account))
    }
}
