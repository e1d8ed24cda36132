// ============================================================================
// Fixed Product Market Maker Pool
// ============================================================================
//
// The pool is an ordinary account on the ledger: it holds its reserves as
// position balances at its own address and goes through the public
// split/merge/transfer entry points like any other holder.
//
// Fees:
//   - Treasury receives `fee × treasuryPercent / 10000` at trade time
//   - The rest accrues to LPs through a fee-per-share accumulator
//
//     withdrawable(a) = credit(a) + shares(a) × (feePerShare − checkpoint(a)) / ONE
//
//   Any change to an account's share balance settles its pending fees first.
//
// ============================================================================

use super::math::{self, FundingPlan, ONE};
use super::{quote, MarketMakerError, MAX_POOL_OUTCOMES, TREASURY_PERCENT_DENOMINATOR};
use crate::collateral::{Token, TokenBank};
use crate::event_log::EventLog;
use crate::positions::{basic_partition, position_id, CollectionId, ConditionalTokens};
use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PoolEvent {
    FundingAdded {
        funder: Address,
        amounts_added: Vec<U256>,
        shares_minted: U256,
    },
    FundingRemoved {
        funder: Address,
        amounts_removed: Vec<U256>,
        collateral_removed_from_fee_pool: U256,
        shares_burnt: U256,
    },
    Buy {
        buyer: Address,
        investment_amount: U256,
        fee_amount: U256,
        outcome_index: usize,
        outcome_tokens_bought: U256,
    },
    Sell {
        seller: Address,
        return_amount: U256,
        fee_amount: U256,
        outcome_index: usize,
        outcome_tokens_sold: U256,
    },
    FeesWithdrawn {
        account: Address,
        amount: U256,
    },
    Transfer {
        from: Address,
        to: Address,
        value: U256,
    },
    Approval {
        owner: Address,
        spender: Address,
        value: U256,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixedProductMarketMaker {
    pub address: Address,
    pub creator: Address,
    pub collateral: Address,
    pub condition_ids: Vec<B256>,
    /// Fee fraction of `ONE`.
    pub fee: U256,
    /// Basis points of every fee sent to `treasury`.
    pub treasury_percent: u64,
    pub treasury: Address,
    outcome_slot_counts: Vec<usize>,
    /// Collections at each conditioning depth; `levels[0]` is the root and
    /// the last level holds one collection per pool outcome.
    levels: Vec<Vec<CollectionId>>,
    position_ids: Vec<U256>,
    shares: Token,
    fee_per_share: U256,
    fee_checkpoints: HashMap<Address, U256>,
    fee_credits: HashMap<Address, U256>,
    events: EventLog<PoolEvent>,
}

impl FixedProductMarketMaker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        address: Address,
        creator: Address,
        ledger: &ConditionalTokens,
        collateral: Address,
        condition_ids: Vec<B256>,
        fee: U256,
        treasury_percent: u64,
        treasury: Address,
    ) -> Result<Self, MarketMakerError> {
        if condition_ids.is_empty() {
            return Err(MarketMakerError::precondition("no conditions given"));
        }
        if fee >= ONE {
            return Err(MarketMakerError::precondition("fee must be less than ONE"));
        }
        if treasury_percent > TREASURY_PERCENT_DENOMINATOR {
            return Err(MarketMakerError::precondition(
                "treasury percent exceeds 10000 basis points",
            ));
        }

        let mut outcome_slot_counts = Vec::with_capacity(condition_ids.len());
        let mut levels = vec![vec![CollectionId::ROOT]];
        for condition_id in &condition_ids {
            let slots = ledger.get_outcome_slot_count(condition_id);
            if slots == 0 {
                return Err(MarketMakerError::precondition(format!(
                    "condition {} not prepared",
                    condition_id
                )));
            }
            let current = levels.last().map(Vec::len).unwrap_or(1);
            if current.saturating_mul(slots) > MAX_POOL_OUTCOMES {
                return Err(MarketMakerError::precondition("too many pool outcomes"));
            }
            let mut next = Vec::with_capacity(current * slots);
            for parent in levels.last().into_iter().flatten() {
                for index_set in basic_partition(slots) {
                    next.push(CollectionId::derive(*parent, *condition_id, index_set)?);
                }
            }
            outcome_slot_counts.push(slots);
            levels.push(next);
        }

        let position_ids = levels
            .last()
            .into_iter()
            .flatten()
            .map(|collection| position_id(collateral, *collection))
            .collect();

        Ok(Self {
            address,
            creator,
            collateral,
            condition_ids,
            fee,
            treasury_percent,
            treasury,
            outcome_slot_counts,
            levels,
            position_ids,
            shares: Token::new("FPMM"),
            fee_per_share: U256::ZERO,
            fee_checkpoints: HashMap::new(),
            fee_credits: HashMap::new(),
            events: EventLog::new(),
        })
    }

    // ============================================================ queries

    pub fn position_ids(&self) -> &[U256] {
        &self.position_ids
    }

    pub fn position_id(&self, index: usize) -> Option<U256> {
        self.position_ids.get(index).copied()
    }

    pub fn outcome_count(&self) -> usize {
        self.position_ids.len()
    }

    pub fn pool_balances(&self, ledger: &ConditionalTokens) -> Vec<U256> {
        self.position_ids
            .iter()
            .map(|id| ledger.balance_of(&self.address, id))
            .collect()
    }

    pub fn events(&self) -> &[PoolEvent] {
        self.events.as_slice()
    }

    pub(crate) fn event_log_mut(&mut self) -> &mut EventLog<PoolEvent> {
        &mut self.events
    }

    pub fn calc_buy_amount(
        &self,
        ledger: &ConditionalTokens,
        investment: U256,
        outcome_index: usize,
    ) -> Result<U256, MarketMakerError> {
        math::calc_buy_amount(&self.pool_balances(ledger), investment, outcome_index, self.fee)
    }

    pub fn calc_sell_amount(
        &self,
        ledger: &ConditionalTokens,
        return_amount: U256,
        outcome_index: usize,
    ) -> Result<U256, MarketMakerError> {
        math::calc_sell_amount(&self.pool_balances(ledger), return_amount, outcome_index, self.fee)
    }

    /// Advisory collateral quote for selling `tokens` of one outcome.
    pub fn calc_sell_return(
        &self,
        ledger: &ConditionalTokens,
        tokens: U256,
        outcome_index: usize,
    ) -> Result<U256, MarketMakerError> {
        quote::calc_sell_return(&self.pool_balances(ledger), tokens, outcome_index, self.fee)
    }

    // ========================================================= LP shares

    pub fn total_supply(&self) -> U256 {
        self.shares.total_supply
    }

    pub fn balance_of(&self, account: &Address) -> U256 {
        self.shares.balance_of(account)
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> U256 {
        self.shares.allowance(owner, spender)
    }

    pub fn approve(&mut self, owner: Address, spender: Address, amount: U256) {
        self.shares.approve(owner, spender, amount);
        self.events.push(PoolEvent::Approval { owner, spender, value: amount });
    }

    pub fn transfer(&mut self, from: Address, to: Address, amount: U256) -> Result<(), MarketMakerError> {
        self.settle(from)?;
        self.settle(to)?;
        self.shares.transfer(from, to, amount)?;
        self.events.push(PoolEvent::Transfer { from, to, value: amount });
        Ok(())
    }

    pub fn transfer_from(
        &mut self,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), MarketMakerError> {
        self.shares.spend_allowance(from, spender, amount)?;
        self.transfer(from, to, amount)
    }

    // ============================================================== fees

    fn pending_fees(&self, account: &Address) -> Result<U256, MarketMakerError> {
        let checkpoint = self.fee_checkpoints.get(account).copied().unwrap_or_default();
        let delta = self.fee_per_share - checkpoint;
        Ok(math::mul(self.shares.balance_of(account), delta)? / ONE)
    }

    fn settle(&mut self, account: Address) -> Result<(), MarketMakerError> {
        let owed = self.pending_fees(&account)?;
        if !owed.is_zero() {
            let credit = self.fee_credits.entry(account).or_default();
            *credit = math::add(*credit, owed)?;
        }
        self.fee_checkpoints.insert(account, self.fee_per_share);
        Ok(())
    }

    fn accrue(&mut self, lp_fee: U256) -> Result<(), MarketMakerError> {
        if lp_fee.is_zero() {
            return Ok(());
        }
        let supply = self.shares.total_supply;
        if supply.is_zero() {
            return Err(MarketMakerError::precondition("pool is not funded"));
        }
        self.fee_per_share = math::add(self.fee_per_share, math::mul(lp_fee, ONE)? / supply)?;
        Ok(())
    }

    /// Splits a trade fee into (treasury, LP) parts.
    fn split_fee(&self, fee_amount: U256) -> Result<(U256, U256), MarketMakerError> {
        let treasury_fee = math::mul(fee_amount, U256::from(self.treasury_percent))?
            / U256::from(TREASURY_PERCENT_DENOMINATOR);
        Ok((treasury_fee, fee_amount - treasury_fee))
    }

    pub fn fees_withdrawable_by(&self, account: &Address) -> Result<U256, MarketMakerError> {
        let credit = self.fee_credits.get(account).copied().unwrap_or_default();
        math::add(credit, self.pending_fees(account)?)
    }

    pub fn withdraw_fees(
        &mut self,
        bank: &mut TokenBank,
        account: Address,
    ) -> Result<U256, MarketMakerError> {
        self.settle(account)?;
        let amount = self.fee_credits.remove(&account).unwrap_or_default();
        if !amount.is_zero() {
            bank.transfer(self.collateral, self.address, account, amount)?;
            self.events.push(PoolEvent::FeesWithdrawn { account, amount });
            debug!("💰 {} withdrew {} in fees from pool {}", account, amount, self.address);
        }
        Ok(amount)
    }

    // ======================================================= conditions

    fn split_through_all_conditions(
        &self,
        ledger: &mut ConditionalTokens,
        bank: &mut TokenBank,
        amount: U256,
    ) -> Result<(), MarketMakerError> {
        bank.approve(self.collateral, self.address, ledger.address, amount)?;
        for (depth, condition_id) in self.condition_ids.iter().enumerate() {
            let partition = basic_partition(self.outcome_slot_counts[depth]);
            for parent in &self.levels[depth] {
                ledger.split_position(
                    bank,
                    self.address,
                    self.collateral,
                    *parent,
                    *condition_id,
                    &partition,
                    amount,
                )?;
            }
        }
        Ok(())
    }

    fn merge_through_all_conditions(
        &self,
        ledger: &mut ConditionalTokens,
        bank: &mut TokenBank,
        amount: U256,
    ) -> Result<(), MarketMakerError> {
        for (depth, condition_id) in self.condition_ids.iter().enumerate().rev() {
            let partition = basic_partition(self.outcome_slot_counts[depth]);
            for parent in &self.levels[depth] {
                ledger.merge_positions(
                    bank,
                    self.address,
                    self.collateral,
                    *parent,
                    *condition_id,
                    &partition,
                    amount,
                )?;
            }
        }
        Ok(())
    }

    // ========================================================== funding

    pub fn add_funding(
        &mut self,
        ledger: &mut ConditionalTokens,
        bank: &mut TokenBank,
        funder: Address,
        amount: U256,
        distribution_hint: &[U256],
    ) -> Result<FundingPlan, MarketMakerError> {
        if amount.is_zero() {
            return Err(MarketMakerError::precondition("funding must be non-zero"));
        }
        let supply = self.shares.total_supply;
        let plan = if supply.is_zero() {
            math::initial_funding(self.outcome_count(), amount, distribution_hint)?
        } else {
            if !distribution_hint.is_empty() {
                return Err(MarketMakerError::precondition(
                    "cannot use distribution hint after initial funding",
                ));
            }
            math::proportional_funding(&self.pool_balances(ledger), supply, amount)?
        };

        self.settle(funder)?;
        self.shares.mint(funder, plan.shares)?;

        bank.transfer_from(self.collateral, self.address, funder, self.address, amount)?;
        self.split_through_all_conditions(ledger, bank, amount)?;
        ledger.safe_batch_transfer_from(
            self.address,
            self.address,
            funder,
            &self.position_ids,
            &plan.send_back,
        )?;

        self.events.push(PoolEvent::FundingAdded {
            funder,
            amounts_added: plan.added.clone(),
            shares_minted: plan.shares,
        });
        info!(
            "💧 Pool {}: {} added {} funding, minted {} shares",
            self.address, funder, amount, plan.shares
        );
        Ok(plan)
    }

    /// Burns LP shares for a pro-rata slice of every reserve, paid as
    /// position tokens. Accrued fees are paid out in collateral first.
    pub fn remove_funding(
        &mut self,
        ledger: &mut ConditionalTokens,
        bank: &mut TokenBank,
        funder: Address,
        shares: U256,
    ) -> Result<Vec<U256>, MarketMakerError> {
        let supply = self.shares.total_supply;
        if supply.is_zero() {
            return Err(MarketMakerError::precondition("pool is not funded"));
        }
        let held = self.shares.balance_of(&funder);
        if held < shares {
            return Err(MarketMakerError::Invariant(format!(
                "insufficient pool shares: held {}, requested {}",
                held, shares
            )));
        }

        let send_amounts = self
            .pool_balances(ledger)
            .iter()
            .map(|balance| Ok(math::mul(*balance, shares)? / supply))
            .collect::<Result<Vec<_>, MarketMakerError>>()?;

        self.settle(funder)?;
        let fees = self.fee_credits.remove(&funder).unwrap_or_default();
        self.shares.burn(funder, shares)?;

        if !fees.is_zero() {
            bank.transfer(self.collateral, self.address, funder, fees)?;
        }
        ledger.safe_batch_transfer_from(
            self.address,
            self.address,
            funder,
            &self.position_ids,
            &send_amounts,
        )?;

        self.events.push(PoolEvent::FundingRemoved {
            funder,
            amounts_removed: send_amounts.clone(),
            collateral_removed_from_fee_pool: fees,
            shares_burnt: shares,
        });
        info!(
            "🏧 Pool {}: {} burned {} shares (fees paid {})",
            self.address, funder, shares, fees
        );
        Ok(send_amounts)
    }

    // =========================================================== trades

    #[allow(clippy::too_many_arguments)]
    pub fn buy(
        &mut self,
        ledger: &mut ConditionalTokens,
        bank: &mut TokenBank,
        buyer: Address,
        investment: U256,
        outcome_index: usize,
        min_outcome_tokens: U256,
    ) -> Result<U256, MarketMakerError> {
        let bought = self.calc_buy_amount(ledger, investment, outcome_index)?;
        if bought < min_outcome_tokens {
            return Err(MarketMakerError::Slippage(
                "minimum buy amount not reached".to_string(),
            ));
        }
        let fee_amount = math::buy_fee(investment, self.fee)?;
        let (treasury_fee, lp_fee) = self.split_fee(fee_amount)?;
        self.accrue(lp_fee)?;

        bank.transfer_from(self.collateral, self.address, buyer, self.address, investment)?;
        if !treasury_fee.is_zero() {
            bank.transfer(self.collateral, self.address, self.treasury, treasury_fee)?;
        }
        self.split_through_all_conditions(ledger, bank, investment - fee_amount)?;
        ledger.safe_transfer_from(
            self.address,
            self.address,
            buyer,
            self.position_ids[outcome_index],
            bought,
        )?;

        self.events.push(PoolEvent::Buy {
            buyer,
            investment_amount: investment,
            fee_amount,
            outcome_index,
            outcome_tokens_bought: bought,
        });
        info!(
            "🛒 Pool {}: {} bought {} of outcome {} for {}",
            self.address, buyer, bought, outcome_index, investment
        );
        Ok(bought)
    }

    /// The seller must have approved the pool as an operator on the ledger.
    #[allow(clippy::too_many_arguments)]
    pub fn sell(
        &mut self,
        ledger: &mut ConditionalTokens,
        bank: &mut TokenBank,
        seller: Address,
        return_amount: U256,
        outcome_index: usize,
        max_outcome_tokens: U256,
    ) -> Result<U256, MarketMakerError> {
        let sold = self.calc_sell_amount(ledger, return_amount, outcome_index)?;
        if sold > max_outcome_tokens {
            return Err(MarketMakerError::Slippage(
                "maximum sell amount exceeded".to_string(),
            ));
        }
        let fee_amount = math::sell_fee(return_amount, self.fee)?;
        let (treasury_fee, lp_fee) = self.split_fee(fee_amount)?;
        self.accrue(lp_fee)?;

        ledger.safe_transfer_from(
            self.address,
            seller,
            self.address,
            self.position_ids[outcome_index],
            sold,
        )?;
        self.merge_through_all_conditions(ledger, bank, math::add(return_amount, fee_amount)?)?;
        bank.transfer(self.collateral, self.address, seller, return_amount)?;
        if !treasury_fee.is_zero() {
            bank.transfer(self.collateral, self.address, self.treasury, treasury_fee)?;
        }

        self.events.push(PoolEvent::Sell {
            seller,
            return_amount,
            fee_amount,
            outcome_index,
            outcome_tokens_sold: sold,
        });
        info!(
            "💵 Pool {}: {} sold {} of outcome {} for {}",
            self.address, seller, sold, outcome_index, return_amount
        );
        Ok(sold)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Classify, ErrorKind};

    const WETH: Address = Address::repeat_byte(0xee);
    const LEDGER: Address = Address::repeat_byte(0xc7);
    const POOL: Address = Address::repeat_byte(0x99);
    const ORACLE: Address = Address::repeat_byte(0x0a);
    const CREATOR: Address = Address::repeat_byte(0xc0);
    const INVESTOR1: Address = Address::repeat_byte(0x11);
    const INVESTOR2: Address = Address::repeat_byte(0x12);
    const TRADER: Address = Address::repeat_byte(0x7a);
    const TREASURY: Address = Address::repeat_byte(0x7e);

    fn ether(v: u64) -> U256 {
        U256::from(v) * ONE
    }

    fn milli(v: u64) -> U256 {
        U256::from(v) * ONE / U256::from(1000u64)
    }

    struct Fixture {
        ledger: ConditionalTokens,
        bank: TokenBank,
        pool: FixedProductMarketMaker,
    }

    impl Fixture {
        fn new(outcomes: usize) -> Self {
            let mut ledger = ConditionalTokens::new(LEDGER);
            let mut bank = TokenBank::new();
            bank.register(WETH, "WETH").unwrap();
            let cond = ledger
                .prepare_condition(ORACLE, B256::repeat_byte(0x42), outcomes)
                .unwrap();
            let pool = FixedProductMarketMaker::new(
                POOL, CREATOR, &ledger, WETH, vec![cond], milli(3), 100, TREASURY,
            )
            .unwrap();
            Self { ledger, bank, pool }
        }

        fn wrap_and_approve(&mut self, account: Address, amount: U256) {
            self.bank.fund_native(account, amount).unwrap();
            self.bank.deposit(WETH, account, amount).unwrap();
            self.bank.approve(WETH, account, POOL, amount).unwrap();
        }

        fn fund(&mut self, account: Address, amount: U256, hint: &[U256]) -> FundingPlan {
            self.wrap_and_approve(account, amount);
            self.pool
                .add_funding(&mut self.ledger, &mut self.bank, account, amount, hint)
                .unwrap()
        }

        fn balances(&self) -> Vec<U256> {
            self.pool.pool_balances(&self.ledger)
        }

        fn held(&self, account: Address, index: usize) -> U256 {
            self.ledger.balance_of(&account, &self.pool.position_ids()[index])
        }
    }

    #[test]
    fn test_construction_validates_inputs() {
        let ledger = ConditionalTokens::new(LEDGER);
        let err = FixedProductMarketMaker::new(
            POOL, CREATOR, &ledger, WETH, vec![B256::ZERO], milli(3), 100, TREASURY,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Precondition);

        let mut ledger = ledger;
        let cond = ledger.prepare_condition(ORACLE, B256::ZERO, 2).unwrap();
        assert!(FixedProductMarketMaker::new(POOL, CREATOR, &ledger, WETH, vec![cond], ONE, 0, TREASURY).is_err());
        assert!(FixedProductMarketMaker::new(POOL, CREATOR, &ledger, WETH, vec![cond], U256::ZERO, 10_001, TREASURY).is_err());
    }

    #[test]
    fn test_initial_funding() {
        let mut fx = Fixture::new(3);
        let plan = fx.fund(INVESTOR1, ether(10), &[]);

        assert_eq!(plan.added, vec![ether(10); 3]);
        assert_eq!(plan.shares, ether(10));
        assert_eq!(fx.pool.balance_of(&INVESTOR1), ether(10));
        assert_eq!(fx.balances(), vec![ether(10); 3]);
        assert_eq!(fx.bank.balance_of(&WETH, &INVESTOR1), U256::ZERO);
        assert_eq!(fx.bank.balance_of(&WETH, &LEDGER), ether(10));
        for i in 0..3 {
            assert_eq!(fx.held(INVESTOR1, i), U256::ZERO);
        }
    }

    #[test]
    fn test_buy_collects_fees() {
        let mut fx = Fixture::new(3);
        fx.fund(INVESTOR1, ether(10), &[]);

        let investment = ether(1);
        fx.wrap_and_approve(TRADER, investment);
        let fee_amount = investment * milli(3) / ONE;
        let expected = fx.pool.calc_buy_amount(&fx.ledger, investment, 1).unwrap();

        let bought = fx
            .pool
            .buy(&mut fx.ledger, &mut fx.bank, TRADER, investment, 1, expected)
            .unwrap();
        assert_eq!(bought, expected);
        assert_eq!(fx.held(TRADER, 1), bought);
        assert_eq!(fx.bank.balance_of(&WETH, &TRADER), U256::ZERO);

        let balances = fx.balances();
        for (i, balance) in balances.iter().enumerate() {
            let grown = ether(10) + investment - fee_amount;
            let expected = if i == 1 { grown - bought } else { grown };
            assert_eq!(*balance, expected);
        }

        let treasury_fee = fee_amount * U256::from(100u64) / U256::from(10_000u64);
        assert_eq!(fx.bank.balance_of(&WETH, &TREASURY), treasury_fee);
        assert_eq!(
            fx.pool.fees_withdrawable_by(&INVESTOR1).unwrap(),
            fee_amount - treasury_fee
        );

        let paid = fx.pool.withdraw_fees(&mut fx.bank, INVESTOR1).unwrap();
        assert_eq!(paid, fee_amount - treasury_fee);
        assert_eq!(fx.bank.balance_of(&WETH, &INVESTOR1), paid);
        assert_eq!(fx.pool.fees_withdrawable_by(&INVESTOR1).unwrap(), U256::ZERO);
    }

    #[test]
    fn test_buy_slippage_guard() {
        let mut fx = Fixture::new(2);
        fx.fund(INVESTOR1, ether(10), &[]);
        fx.wrap_and_approve(TRADER, ether(1));
        let quote = fx.pool.calc_buy_amount(&fx.ledger, ether(1), 0).unwrap();

        let err = fx
            .pool
            .buy(&mut fx.ledger, &mut fx.bank, TRADER, ether(1), 0, quote + U256::from(1u8))
            .unwrap_err();
        assert_eq!(err.reason(), "minimum buy amount not reached");
        assert_eq!(err.kind(), ErrorKind::Slippage);
    }

    #[test]
    fn test_sell_returns_exact_collateral() {
        let mut fx = Fixture::new(3);
        fx.fund(INVESTOR1, ether(10), &[]);
        fx.wrap_and_approve(TRADER, ether(1));
        fx.pool
            .buy(&mut fx.ledger, &mut fx.bank, TRADER, ether(1), 1, U256::ZERO)
            .unwrap();
        let before = fx.balances();
        let held = fx.held(TRADER, 1);

        let return_amount = milli(500);
        let fee_amount = return_amount * milli(3) / (ONE - milli(3));
        let to_sell = fx.pool.calc_sell_amount(&fx.ledger, return_amount, 1).unwrap();

        let err = fx
            .pool
            .sell(&mut fx.ledger, &mut fx.bank, TRADER, return_amount, 1, to_sell)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);

        fx.ledger.set_approval_for_all(TRADER, POOL, true);
        let err = fx
            .pool
            .sell(&mut fx.ledger, &mut fx.bank, TRADER, return_amount, 1, to_sell - U256::from(1u8))
            .unwrap_err();
        assert_eq!(err.reason(), "maximum sell amount exceeded");

        let sold = fx
            .pool
            .sell(&mut fx.ledger, &mut fx.bank, TRADER, return_amount, 1, to_sell)
            .unwrap();
        assert_eq!(sold, to_sell);
        assert_eq!(fx.bank.balance_of(&WETH, &TRADER), return_amount);
        assert_eq!(fx.held(TRADER, 1), held - sold);

        let after = fx.balances();
        for i in 0..3 {
            let shrunk = before[i] - return_amount - fee_amount;
            let expected = if i == 1 { shrunk + sold } else { shrunk };
            assert_eq!(after[i], expected);
        }
    }

    #[test]
    fn test_follow_up_funding_keeps_price_ratio() {
        let mut fx = Fixture::new(3);
        fx.fund(INVESTOR1, ether(10), &[]);
        fx.wrap_and_approve(TRADER, ether(1));
        fx.pool
            .buy(&mut fx.ledger, &mut fx.bank, TRADER, ether(1), 1, U256::ZERO)
            .unwrap();
        let before = fx.balances();

        fx.wrap_and_approve(INVESTOR2, ether(5));
        let err = fx
            .pool
            .add_funding(&mut fx.ledger, &mut fx.bank, INVESTOR2, ether(5), &[U256::from(1u8); 3])
            .unwrap_err();
        assert_eq!(err.reason(), "cannot use distribution hint after initial funding");

        let plan = fx
            .pool
            .add_funding(&mut fx.ledger, &mut fx.bank, INVESTOR2, ether(5), &[])
            .unwrap();
        let after = fx.balances();
        assert!(fx.pool.balance_of(&INVESTOR2) > U256::ZERO);
        assert_eq!(fx.bank.balance_of(&WETH, &INVESTOR2), U256::ZERO);

        // after[i] / after[j] == before[i] / before[j] up to one unit
        for i in 0..3 {
            assert!(after[i] > before[i]);
            assert!(after[i] <= before[i] + ether(5));
            assert_eq!(fx.held(INVESTOR2, i), plan.send_back[i]);
            for j in 0..3 {
                let lhs = after[i] * before[j];
                let rhs = after[j] * before[i];
                let diff = if lhs > rhs { lhs - rhs } else { rhs - lhs };
                assert!(diff <= before[i].max(before[j]));
            }
        }
    }

    #[test]
    fn test_remove_funding_pays_fees_and_positions() {
        let mut fx = Fixture::new(3);
        fx.fund(INVESTOR1, ether(10), &[]);
        fx.wrap_and_approve(TRADER, ether(1));
        fx.pool
            .buy(&mut fx.ledger, &mut fx.bank, TRADER, ether(1), 1, U256::ZERO)
            .unwrap();
        let pending = fx.pool.fees_withdrawable_by(&INVESTOR1).unwrap();
        let before = fx.balances();

        let removed = fx
            .pool
            .remove_funding(&mut fx.ledger, &mut fx.bank, INVESTOR1, ether(5))
            .unwrap();
        assert_eq!(fx.pool.balance_of(&INVESTOR1), ether(5));
        assert_eq!(fx.bank.balance_of(&WETH, &INVESTOR1), pending);
        for i in 0..3 {
            assert_eq!(removed[i], before[i] / U256::from(2u8));
            assert_eq!(fx.held(INVESTOR1, i), removed[i]);
        }

        let err = fx
            .pool
            .remove_funding(&mut fx.ledger, &mut fx.bank, INVESTOR1, ether(6))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invariant);
    }

    #[test]
    fn test_share_transfer_settles_fees() {
        let mut fx = Fixture::new(2);
        fx.fund(INVESTOR1, ether(10), &[]);
        fx.wrap_and_approve(TRADER, ether(1));
        fx.pool
            .buy(&mut fx.ledger, &mut fx.bank, TRADER, ether(1), 0, U256::ZERO)
            .unwrap();
        let earned = fx.pool.fees_withdrawable_by(&INVESTOR1).unwrap();

        fx.pool.transfer(INVESTOR1, INVESTOR2, ether(10)).unwrap();
        assert_eq!(fx.pool.fees_withdrawable_by(&INVESTOR1).unwrap(), earned);
        assert_eq!(fx.pool.fees_withdrawable_by(&INVESTOR2).unwrap(), U256::ZERO);

        fx.pool.approve(INVESTOR2, TRADER, ether(1));
        fx.pool.transfer_from(TRADER, INVESTOR2, TRADER, ether(1)).unwrap();
        assert!(fx.pool.transfer_from(TRADER, INVESTOR2, TRADER, U256::from(1u8)).is_err());
    }

    #[test]
    fn test_hinted_funding_skews_prices() {
        let mut fx = Fixture::new(2);
        let plan = fx.fund(INVESTOR1, ether(10), &[U256::from(1u8), U256::from(4u8)]);
        assert_eq!(fx.balances(), vec![milli(2500), ether(10)]);
        assert_eq!(fx.held(INVESTOR1, 0), milli(7500));
        assert_eq!(plan.send_back, vec![milli(7500), U256::ZERO]);
    }

    #[test]
    fn test_multi_condition_pool_uses_cartesian_outcomes() {
        let mut ledger = ConditionalTokens::new(LEDGER);
        let mut bank = TokenBank::new();
        bank.register(WETH, "WETH").unwrap();
        let c1 = ledger.prepare_condition(ORACLE, B256::repeat_byte(1), 2).unwrap();
        let c2 = ledger.prepare_condition(ORACLE, B256::repeat_byte(2), 3).unwrap();
        let mut pool = FixedProductMarketMaker::new(
            POOL, CREATOR, &ledger, WETH, vec![c1, c2], U256::ZERO, 0, TREASURY,
        )
        .unwrap();
        assert_eq!(pool.outcome_count(), 6);

        let collection = CollectionId::combine_all(&[
            CollectionId::for_index_set(c2, U256::from(2u8)),
            CollectionId::for_index_set(c1, U256::from(2u8)),
        ])
        .unwrap();
        assert_eq!(pool.position_id(4), Some(position_id(WETH, collection)));

        bank.fund_native(INVESTOR1, ether(3)).unwrap();
        bank.deposit(WETH, INVESTOR1, ether(3)).unwrap();
        bank.approve(WETH, INVESTOR1, POOL, ether(3)).unwrap();
        pool.add_funding(&mut ledger, &mut bank, INVESTOR1, ether(3), &[]).unwrap();
        assert_eq!(pool.pool_balances(&ledger), vec![ether(3); 6]);
        assert_eq!(bank.balance_of(&WETH, &LEDGER), ether(3));

        pool.remove_funding(&mut ledger, &mut bank, INVESTOR1, ether(3)).unwrap();
        assert_eq!(pool.pool_balances(&ledger), vec![U256::ZERO; 6]);
        assert_eq!(pool.total_supply(), U256::ZERO);
    }
}
