// ============================================================================
// Resolution & Redemption
// ============================================================================
//
// The resolver reports a payout vector once. Holders then burn their
// positions for
//
//   payout = Σ_sets balance × Σ_{i ∈ set} numerator[i] / denominator
//
// with truncating division per index set. Root payouts are paid in
// collateral, nested payouts are minted as the parent position.
//
// ============================================================================

use super::{
    condition_id, position_id, CollectionId, ConditionalTokens, LedgerError, LedgerEvent,
    Resolution,
};
use crate::collateral::TokenBank;
use alloy_primitives::{Address, B256, U256};
use tracing::{info, warn};

impl ConditionalTokens {
    /// Resolves the condition identified by `(sender, question_id,
    /// payouts.len())`. Only the resolver the condition was prepared for can
    /// reach it.
    pub fn report_payouts(
        &mut self,
        sender: Address,
        question_id: B256,
        payouts: &[U256],
    ) -> Result<B256, LedgerError> {
        let slots = payouts.len();
        if slots <= 1 {
            return Err(LedgerError::precondition(
                "there should be more than one outcome slot",
            ));
        }
        let id = condition_id(sender, question_id, slots);

        let condition = self.condition_mut(&id).ok_or_else(|| {
            LedgerError::Unauthorized("condition not prepared or found".to_string())
        })?;
        if condition.outcome_slot_count != slots {
            return Err(LedgerError::Unauthorized(
                "condition not prepared or found".to_string(),
            ));
        }
        if condition.is_resolved() {
            warn!("Rejected second report for condition {}", id);
            return Err(LedgerError::invariant("payout denominator already set"));
        }

        let mut denominator = U256::ZERO;
        for numerator in payouts {
            denominator = denominator
                .checked_add(*numerator)
                .ok_or_else(|| LedgerError::Numeric("payout denominator overflow".to_string()))?;
        }
        if denominator.is_zero() {
            return Err(LedgerError::precondition("payout is all zeroes"));
        }

        condition.resolution = Resolution::Resolved {
            numerators: payouts.to_vec(),
            denominator,
        };
        self.emit(LedgerEvent::ConditionResolution {
            condition_id: id,
            oracle: sender,
            question_id,
            outcome_slot_count: slots,
            payout_numerators: payouts.to_vec(),
        });
        info!("⚖️  Condition {} resolved with payouts {:?}", id, payouts);
        Ok(id)
    }

    pub fn redeem_positions(
        &mut self,
        bank: &mut TokenBank,
        sender: Address,
        collateral: Address,
        parent_collection_id: CollectionId,
        condition_id: B256,
        index_sets: &[U256],
    ) -> Result<U256, LedgerError> {
        let condition = self
            .condition(&condition_id)
            .ok_or_else(|| LedgerError::precondition("result for condition not received yet"))?;
        let (numerators, denominator) = match &condition.resolution {
            Resolution::Resolved { numerators, denominator } => (numerators.clone(), *denominator),
            Resolution::Unresolved => {
                return Err(LedgerError::precondition(
                    "result for condition not received yet",
                ))
            }
        };
        let full = condition.full_index_set();

        let mut total_payout = U256::ZERO;
        for index_set in index_sets {
            if index_set.is_zero() || *index_set >= full {
                return Err(LedgerError::precondition("got invalid index set"));
            }
            let id = self.child_position(collateral, parent_collection_id, condition_id, *index_set)?;

            let numerator = numerators
                .iter()
                .enumerate()
                .filter(|(slot, _)| index_set.bit(*slot))
                .fold(U256::ZERO, |acc, (_, n)| acc + *n);

            let stake = self.balance_of(&sender, &id);
            if stake.is_zero() {
                continue;
            }
            let share = stake
                .checked_mul(numerator)
                .ok_or_else(|| LedgerError::Numeric("payout overflow".to_string()))?
                / denominator;
            total_payout = total_payout
                .checked_add(share)
                .ok_or_else(|| LedgerError::Numeric("payout overflow".to_string()))?;
            self.burn(sender, id, stake)?;
        }

        if !total_payout.is_zero() {
            if parent_collection_id.is_root() {
                bank.transfer(collateral, self.address, sender, total_payout)?;
            } else {
                self.mint(sender, position_id(collateral, parent_collection_id), total_payout)?;
            }
        }

        self.emit(LedgerEvent::PayoutRedemption {
            redeemer: sender,
            collateral,
            parent_collection_id,
            condition_id,
            index_sets: index_sets.to_vec(),
            payout: total_payout,
        });
        info!("🏆 Redeem: {} received {} from condition {}", sender, total_payout, condition_id);
        Ok(total_payout)
    }
}

// ============================================================================
// TESTS
// ============================================================================
