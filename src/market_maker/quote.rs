// ============================================================================
// Advisory Quotes (fixed-precision decimals)
// ============================================================================
//
// Selling `a` tokens of outcome i returns the collateral r solving
//
//   f(r) = Π_{j≠i} (q[j] − R) · (q[i] + a − R) − Π q = 0,   R = r / (1 − fee)
//
// f is convex and decreasing on [0, min reserve), so Newton–Raphson from
// r = 0 converges monotonically to the smallest root.
//
// Amounts are divided by the largest reserve before solving, so every
// reserve lies in (0, 1] and products stay in range however deep the pool
// or however many outcomes it has. Results are scaled back to wei.
//
// Nothing here settles a trade.
//
// ============================================================================

use super::{MarketMakerError, ONE};
use alloy_primitives::U256;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

pub const MAX_ITERATIONS: usize = 100;

/// Newton stops once a step is smaller than this fraction of the largest
/// reserve.
const CONVERGENCE_TOLERANCE: Decimal = dec!(0.000000000001);

/// Digits kept below one `unit` when scaling.
const FRACTION_DIGITS: u32 = 27;

fn overflow() -> MarketMakerError {
    MarketMakerError::numeric("decimal overflow in quote")
}

/// `value / unit` as a decimal, truncated after `FRACTION_DIGITS` places.
pub fn ratio(value: U256, unit: U256) -> Result<Decimal, MarketMakerError> {
    if unit.is_zero() {
        return Err(MarketMakerError::numeric("zero scaling unit"));
    }
    let whole = u64::try_from(value / unit).map_err(|_| overflow())?;
    let frac = (value % unit)
        .checked_mul(U256::from(10u8).pow(U256::from(FRACTION_DIGITS)))
        .ok_or_else(overflow)?
        / unit;
    let frac = i128::try_from(u128::try_from(frac).map_err(|_| overflow())?).map_err(|_| overflow())?;
    let frac = Decimal::try_from_i128_with_scale(frac, FRACTION_DIGITS).map_err(|_| overflow())?;
    Decimal::from(whole).checked_add(frac).ok_or_else(overflow)
}

/// `value · unit` in whole wei, rounded toward zero. Negatives clamp to zero.
pub fn unscale(value: Decimal, unit: U256) -> Result<U256, MarketMakerError> {
    if value.is_sign_negative() {
        return Ok(U256::ZERO);
    }
    let mantissa = u128::try_from(value.mantissa()).map_err(|_| overflow())?;
    let divisor = U256::from(10u8).pow(U256::from(value.scale()));
    U256::from(mantissa)
        .checked_mul(unit)
        .map(|v| v / divisor)
        .ok_or_else(overflow)
}

fn product(values: impl IntoIterator<Item = Decimal>) -> Result<Decimal, MarketMakerError> {
    values
        .into_iter()
        .try_fold(Decimal::ONE, |acc, v| acc.checked_mul(v).ok_or_else(overflow))
}

/// Reserves as fractions of the largest one, plus that largest reserve.
fn reserves(balances: &[U256]) -> Result<(U256, Vec<Decimal>), MarketMakerError> {
    if balances.iter().any(|b| b.is_zero()) {
        return Err(MarketMakerError::NoValidPrice(
            "must have non-zero balances".to_string(),
        ));
    }
    let unit = balances.iter().copied().max().unwrap_or_default();
    let q = balances
        .iter()
        .map(|b| ratio(*b, unit))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((unit, q))
}

/// Collateral returned for selling `tokens` of `outcome_index`.
pub fn calc_sell_return(
    balances: &[U256],
    tokens: U256,
    outcome_index: usize,
    fee: U256,
) -> Result<U256, MarketMakerError> {
    if outcome_index >= balances.len() {
        return Err(MarketMakerError::precondition("invalid outcome index"));
    }
    if fee >= ONE {
        return Err(MarketMakerError::precondition("fee must be less than ONE"));
    }
    let (unit, q) = reserves(balances)?;
    let keep = Decimal::ONE - ratio(fee, ONE)?;

    let mut targets = q.clone();
    targets[outcome_index] = targets[outcome_index]
        .checked_add(ratio(tokens, unit)?)
        .ok_or_else(overflow)?;
    let invariant = product(q.iter().copied())?;

    let mut r = Decimal::ZERO;
    for _ in 0..MAX_ITERATIONS {
        let big_r = r.checked_div(keep).ok_or_else(overflow)?;
        let factors: Vec<Decimal> = targets.iter().map(|t| *t - big_r).collect();

        let value = product(factors.iter().copied())?
            .checked_sub(invariant)
            .ok_or_else(overflow)?;

        // d/dR Π (t_k − R) = −Σ_k Π_{l≠k} (t_l − R)
        let mut slope = Decimal::ZERO;
        for k in 0..factors.len() {
            let others = product(
                factors
                    .iter()
                    .enumerate()
                    .filter(|(l, _)| *l != k)
                    .map(|(_, f)| *f),
            )?;
            slope = slope.checked_sub(others).ok_or_else(overflow)?;
        }
        let slope = slope.checked_div(keep).ok_or_else(overflow)?;
        if slope.is_zero() {
            break;
        }

        let step = value.checked_div(slope).ok_or_else(overflow)?;
        r = r.checked_sub(step).ok_or_else(overflow)?;
        if step.abs() < CONVERGENCE_TOLERANCE {
            return unscale(r, unit);
        }
    }

    Err(MarketMakerError::numeric(format!(
        "sell quote did not converge within {} iterations",
        MAX_ITERATIONS
    )))
}

/// Marginal outcome prices; they sum to one.
///
///   price[i] = Π_{j≠i} q[j] / Σ_k Π_{j≠k} q[j]
pub fn spot_prices(balances: &[U256]) -> Result<Vec<Decimal>, MarketMakerError> {
    let (_, q) = reserves(balances)?;
    let weights = (0..q.len())
        .map(|i| {
            product(
                q.iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .map(|(_, v)| *v),
            )
        })
        .collect::<Result<Vec<_>, _>>()?;
    let total = weights
        .iter()
        .try_fold(Decimal::ZERO, |acc, w| acc.checked_add(*w))
        .ok_or_else(overflow)?;
    weights
        .into_iter()
        .map(|w| w.checked_div(total).ok_or_else(overflow))
        .collect()
}
