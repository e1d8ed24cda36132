// ============================================================================
// Exact Pool Math
// ============================================================================
//
// Buy (fee taken from the investment):
//
//   x        = investment − investment·fee/ONE
//   e        = q[i]·ONE
//   e        = ⌈e·q[j] / (q[j] + x)⌉            for every j ≠ i
//   bought   = q[i] + x − ⌈e/ONE⌉
//
// Sell (fee added on top of the return):
//
//   R        = returnAmount·ONE / (ONE − fee)
//   e        = q[i]·ONE
//   e        = ⌈e·q[j] / (q[j] − R)⌉            for every j ≠ i
//   sold     = R + ⌈e/ONE⌉ − q[i]
//
// Rounding always favors the pool. Every step is checked; overflow is a
// numeric error, never a wrap.
//
// ============================================================================

use super::MarketMakerError;
use alloy_primitives::{uint, U256};

/// Fixed-point unit for fee fractions.
pub const ONE: U256 = uint!(1_000_000_000_000_000_000_U256);

pub fn ceildiv(x: U256, y: U256) -> U256 {
    if x.is_zero() {
        U256::ZERO
    } else {
        (x - U256::from(1u8)) / y + U256::from(1u8)
    }
}

pub(crate) fn mul(a: U256, b: U256) -> Result<U256, MarketMakerError> {
    a.checked_mul(b)
        .ok_or_else(|| MarketMakerError::numeric("multiplication overflow"))
}

pub(crate) fn add(a: U256, b: U256) -> Result<U256, MarketMakerError> {
    a.checked_add(b)
        .ok_or_else(|| MarketMakerError::numeric("addition overflow"))
}

fn check_outcome(balances: &[U256], outcome_index: usize) -> Result<(), MarketMakerError> {
    if outcome_index >= balances.len() {
        return Err(MarketMakerError::precondition("invalid outcome index"));
    }
    Ok(())
}

/// Fee charged on a buy of `investment`.
pub fn buy_fee(investment: U256, fee: U256) -> Result<U256, MarketMakerError> {
    Ok(mul(investment, fee)? / ONE)
}

/// Fee charged on a sell returning `return_amount`.
pub fn sell_fee(return_amount: U256, fee: U256) -> Result<U256, MarketMakerError> {
    Ok(mul(return_amount, fee)? / (ONE - fee))
}

/// Outcome tokens received for `investment` collateral.
pub fn calc_buy_amount(
    balances: &[U256],
    investment: U256,
    outcome_index: usize,
    fee: U256,
) -> Result<U256, MarketMakerError> {
    check_outcome(balances, outcome_index)?;
    let net = investment - buy_fee(investment, fee)?;
    let buy_balance = balances[outcome_index];

    let mut ending = mul(buy_balance, ONE)?;
    for (j, balance) in balances.iter().enumerate() {
        if j == outcome_index {
            continue;
        }
        let denominator = add(*balance, net)?;
        if denominator.is_zero() {
            return Err(MarketMakerError::NoValidPrice(
                "must have non-zero balances".to_string(),
            ));
        }
        ending = ceildiv(mul(ending, *balance)?, denominator);
    }
    if ending.is_zero() {
        return Err(MarketMakerError::NoValidPrice(
            "must have non-zero balances".to_string(),
        ));
    }

    let gross = add(buy_balance, net)?;
    let ending = ceildiv(ending, ONE);
    gross
        .checked_sub(ending)
        .ok_or_else(|| MarketMakerError::numeric("buy amount underflow"))
}

/// Outcome tokens the seller must hand in to receive `return_amount`.
pub fn calc_sell_amount(
    balances: &[U256],
    return_amount: U256,
    outcome_index: usize,
    fee: U256,
) -> Result<U256, MarketMakerError> {
    check_outcome(balances, outcome_index)?;
    let plus_fees = mul(return_amount, ONE)? / (ONE - fee);
    let sell_balance = balances[outcome_index];

    let mut ending = mul(sell_balance, ONE)?;
    for (j, balance) in balances.iter().enumerate() {
        if j == outcome_index {
            continue;
        }
        if *balance <= plus_fees {
            return Err(MarketMakerError::NoValidPrice(format!(
                "no valid price: reserve {} cannot cover {}",
                j, plus_fees
            )));
        }
        ending = ceildiv(mul(ending, *balance)?, *balance - plus_fees);
    }
    if ending.is_zero() {
        return Err(MarketMakerError::NoValidPrice(
            "must have non-zero balances".to_string(),
        ));
    }

    add(plus_fees, ceildiv(ending, ONE))?
        .checked_sub(sell_balance)
        .ok_or_else(|| MarketMakerError::numeric("sell amount underflow"))
}

/// Outcome of adding `amount` funding to a pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundingPlan {
    /// Added to each reserve.
    pub added: Vec<U256>,
    /// Returned to the funder as position tokens.
    pub send_back: Vec<U256>,
    pub shares: U256,
}

/// Funding an empty pool, optionally skewed by `hint`.
pub fn initial_funding(
    outcomes: usize,
    amount: U256,
    hint: &[U256],
) -> Result<FundingPlan, MarketMakerError> {
    let mut send_back = vec![U256::ZERO; outcomes];
    if !hint.is_empty() {
        if hint.len() != outcomes {
            return Err(MarketMakerError::precondition("hint length off"));
        }
        let max_hint = hint.iter().copied().max().unwrap_or_default();
        if max_hint.is_zero() {
            return Err(MarketMakerError::precondition("must hint a valid distribution"));
        }
        for (i, weight) in hint.iter().enumerate() {
            let remaining = mul(amount, *weight)? / max_hint;
            if remaining.is_zero() {
                return Err(MarketMakerError::precondition("must hint a valid distribution"));
            }
            send_back[i] = amount - remaining;
        }
    }
    let added = send_back.iter().map(|b| amount - *b).collect();
    Ok(FundingPlan { added, send_back, shares: amount })
}

/// Funding a live pool: reserves grow in proportion to their current ratio,
/// measured against the largest reserve.
pub fn proportional_funding(
    balances: &[U256],
    supply: U256,
    amount: U256,
) -> Result<FundingPlan, MarketMakerError> {
    let pool_weight = balances.iter().copied().max().unwrap_or_default();
    if pool_weight.is_zero() {
        return Err(MarketMakerError::NoValidPrice(
            "must have non-zero balances".to_string(),
        ));
    }
    let mut added = Vec::with_capacity(balances.len());
    let mut send_back = Vec::with_capacity(balances.len());
    for balance in balances {
        let remaining = mul(amount, *balance)? / pool_weight;
        added.push(remaining);
        send_back.push(amount - remaining);
    }
    let shares = mul(amount, supply)? / pool_weight;
    Ok(FundingPlan { added, send_back, shares })
}
