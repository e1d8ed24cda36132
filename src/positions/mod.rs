// ============================================================================
// Conditional Ledger
// ============================================================================
//
// Conditional outcome tokens ("positions") for combinatorial prediction
// markets.
//
//   Condition  = (resolver, questionId, outcomeSlotCount)
//   Collection = one or more index sets, possibly across conditions
//   Position   = (collateral, collection)
//
// Core Invariant:
//   Root positions are backed 1:1 by collateral held by the ledger; nested
//   positions are backed 1:1 by their parent position.
//
// Lifecycle:
//   prepare -> split/merge/transfer (any number) -> report -> redeem
//
// Resolution is write-once: a condition moves from Unresolved to Resolved
// exactly once and never back.
//
// ============================================================================

pub mod curve;
pub mod ids;
pub mod redeem;
pub mod split;

pub use curve::{CurveError, CurvePoint};
pub use ids::{
    basic_partition, condition_id, derive_address, full_index_set, keccak256_packed, position_id,
    CollectionId,
};

use crate::collateral::TokenError;
use crate::error::{Classify, ErrorKind};
use crate::event_log::EventLog;
use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::{debug, info};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Index sets are 256-bit masks.
pub const MAX_OUTCOME_SLOTS: usize = 256;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    Precondition(String),
    Unauthorized(String),
    Invariant(String),
    Numeric(String),
    Collateral(TokenError),
}

impl LedgerError {
    pub fn precondition(reason: impl Into<String>) -> Self {
        LedgerError::Precondition(reason.into())
    }

    pub fn invariant(reason: impl Into<String>) -> Self {
        LedgerError::Invariant(reason.into())
    }

    pub fn reason(&self) -> String {
        match self {
            LedgerError::Precondition(r)
            | LedgerError::Unauthorized(r)
            | LedgerError::Invariant(r)
            | LedgerError::Numeric(r) => r.clone(),
            LedgerError::Collateral(e) => e.to_string(),
        }
    }
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reason())
    }
}

impl std::error::Error for LedgerError {}

impl Classify for LedgerError {
    fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Precondition(_) => ErrorKind::Precondition,
            LedgerError::Unauthorized(_) => ErrorKind::Unauthorized,
            LedgerError::Invariant(_) => ErrorKind::Invariant,
            LedgerError::Numeric(_) => ErrorKind::Numeric,
            LedgerError::Collateral(e) => e.kind(),
        }
    }
}

impl From<TokenError> for LedgerError {
    fn from(e: TokenError) -> Self {
        LedgerError::Collateral(e)
    }
}

impl From<CurveError> for LedgerError {
    fn from(e: CurveError) -> Self {
        LedgerError::Precondition(e.to_string())
    }
}

// ============================================================================
// CONDITION
// ============================================================================

/// Payout state of a condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Resolution {
    Unresolved,
    Resolved { numerators: Vec<U256>, denominator: U256 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    pub oracle: Address,
    pub question_id: B256,
    pub outcome_slot_count: usize,
    pub resolution: Resolution,
}

impl Condition {
    pub fn is_resolved(&self) -> bool {
        matches!(self.resolution, Resolution::Resolved { .. })
    }

    pub fn full_index_set(&self) -> U256 {
        full_index_set(self.outcome_slot_count)
    }
}

// ============================================================================
// EVENTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LedgerEvent {
    ConditionPreparation {
        condition_id: B256,
        oracle: Address,
        question_id: B256,
        outcome_slot_count: usize,
    },
    ConditionResolution {
        condition_id: B256,
        oracle: Address,
        question_id: B256,
        outcome_slot_count: usize,
        payout_numerators: Vec<U256>,
    },
    PositionSplit {
        stakeholder: Address,
        collateral: Address,
        parent_collection_id: CollectionId,
        condition_id: B256,
        partition: Vec<U256>,
        amount: U256,
    },
    PositionsMerge {
        stakeholder: Address,
        collateral: Address,
        parent_collection_id: CollectionId,
        condition_id: B256,
        partition: Vec<U256>,
        amount: U256,
    },
    PayoutRedemption {
        redeemer: Address,
        collateral: Address,
        parent_collection_id: CollectionId,
        condition_id: B256,
        index_sets: Vec<U256>,
        payout: U256,
    },
    TransferSingle {
        operator: Address,
        from: Address,
        to: Address,
        id: U256,
        value: U256,
    },
    TransferBatch {
        operator: Address,
        from: Address,
        to: Address,
        ids: Vec<U256>,
        values: Vec<U256>,
    },
    ApprovalForAll {
        owner: Address,
        operator: Address,
        approved: bool,
    },
}

// ============================================================================
// LEDGER
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionalTokens {
    /// Account that custodies root collateral.
    pub address: Address,
    conditions: HashMap<B256, Condition>,
    /// position id -> holder -> balance
    balances: HashMap<U256, HashMap<Address, U256>>,
    supply: HashMap<U256, U256>,
    /// owner -> approved operators
    operators: HashMap<Address, HashSet<Address>>,
    events: EventLog<LedgerEvent>,
}

impl ConditionalTokens {
    pub fn new(address: Address) -> Self {
        info!("📒 Conditional ledger initialized at {}", address);
        Self {
            address,
            conditions: HashMap::new(),
            balances: HashMap::new(),
            supply: HashMap::new(),
            operators: HashMap::new(),
            events: EventLog::new(),
        }
    }

    // ------------------------------------------------------------ conditions

    pub fn prepare_condition(
        &mut self,
        oracle: Address,
        question_id: B256,
        outcome_slot_count: usize,
    ) -> Result<B256, LedgerError> {
        if outcome_slot_count > MAX_OUTCOME_SLOTS {
            return Err(LedgerError::precondition("too many outcome slots"));
        }
        if outcome_slot_count <= 1 {
            return Err(LedgerError::precondition(
                "there should be more than one outcome slot",
            ));
        }
        let id = condition_id(oracle, question_id, outcome_slot_count);
        if self.conditions.contains_key(&id) {
            return Err(LedgerError::invariant("condition already prepared"));
        }

        self.conditions.insert(
            id,
            Condition {
                oracle,
                question_id,
                outcome_slot_count,
                resolution: Resolution::Unresolved,
            },
        );
        self.events.push(LedgerEvent::ConditionPreparation {
            condition_id: id,
            oracle,
            question_id,
            outcome_slot_count,
        });
        info!("📋 Condition {} prepared ({} outcomes, oracle {})", id, outcome_slot_count, oracle);
        Ok(id)
    }

    pub fn condition(&self, condition_id: &B256) -> Option<&Condition> {
        self.conditions.get(condition_id)
    }

    pub(crate) fn condition_mut(&mut self, condition_id: &B256) -> Option<&mut Condition> {
        self.conditions.get_mut(condition_id)
    }

    /// Zero for an unknown condition.
    pub fn get_outcome_slot_count(&self, condition_id: &B256) -> usize {
        self.conditions
            .get(condition_id)
            .map(|c| c.outcome_slot_count)
            .unwrap_or(0)
    }

    /// Zero until the condition is resolved.
    pub fn payout_denominator(&self, condition_id: &B256) -> U256 {
        match self.conditions.get(condition_id).map(|c| &c.resolution) {
            Some(Resolution::Resolved { denominator, .. }) => *denominator,
            _ => U256::ZERO,
        }
    }

    pub fn payout_numerator(&self, condition_id: &B256, index: usize) -> U256 {
        match self.conditions.get(condition_id).map(|c| &c.resolution) {
            Some(Resolution::Resolved { numerators, .. }) => {
                numerators.get(index).copied().unwrap_or_default()
            }
            _ => U256::ZERO,
        }
    }

    /// All numerators; zeros while unresolved.
    pub fn payout_numerators(&self, condition_id: &B256) -> Vec<U256> {
        match self.conditions.get(condition_id) {
            Some(Condition { resolution: Resolution::Resolved { numerators, .. }, .. }) => {
                numerators.clone()
            }
            Some(c) => vec![U256::ZERO; c.outcome_slot_count],
            None => Vec::new(),
        }
    }

    pub fn conditions(&self) -> impl Iterator<Item = (&B256, &Condition)> {
        self.conditions.iter()
    }

    // ------------------------------------------------------------- pure ids

    pub fn get_collection_id(
        &self,
        parent_collection_id: CollectionId,
        condition_id: B256,
        index_set: U256,
    ) -> Result<CollectionId, LedgerError> {
        Ok(CollectionId::derive(parent_collection_id, condition_id, index_set)?)
    }

    pub fn get_position_id(&self, collateral: Address, collection_id: CollectionId) -> U256 {
        position_id(collateral, collection_id)
    }

    // -------------------------------------------------------------- balances

    pub fn balance_of(&self, owner: &Address, id: &U256) -> U256 {
        self.balances
            .get(id)
            .and_then(|holders| holders.get(owner))
            .copied()
            .unwrap_or_default()
    }

    pub fn balance_of_batch(
        &self,
        owners: &[Address],
        ids: &[U256],
    ) -> Result<Vec<U256>, LedgerError> {
        if owners.len() != ids.len() {
            return Err(LedgerError::precondition(
                "ERC1155: accounts and ids length mismatch",
            ));
        }
        Ok(owners
            .iter()
            .zip(ids)
            .map(|(owner, id)| self.balance_of(owner, id))
            .collect())
    }

    pub fn total_supply(&self, id: &U256) -> U256 {
        self.supply.get(id).copied().unwrap_or_default()
    }

    /// Every non-zero position held by `owner`.
    pub fn positions_of(&self, owner: &Address) -> Vec<(U256, U256)> {
        let mut held: Vec<(U256, U256)> = self
            .balances
            .iter()
            .filter_map(|(id, holders)| {
                holders
                    .get(owner)
                    .filter(|b| !b.is_zero())
                    .map(|b| (*id, *b))
            })
            .collect();
        held.sort();
        held
    }

    pub fn set_approval_for_all(&mut self, owner: Address, operator: Address, approved: bool) {
        let set = self.operators.entry(owner).or_default();
        if approved {
            set.insert(operator);
        } else {
            set.remove(&operator);
        }
        self.events.push(LedgerEvent::ApprovalForAll { owner, operator, approved });
        debug!("{} {} operator {}", owner, if approved { "approved" } else { "revoked" }, operator);
    }

    pub fn is_approved_for_all(&self, owner: &Address, operator: &Address) -> bool {
        self.operators
            .get(owner)
            .map(|set| set.contains(operator))
            .unwrap_or(false)
    }

    fn ensure_operator(&self, operator: &Address, from: &Address) -> Result<(), LedgerError> {
        if operator == from || self.is_approved_for_all(from, operator) {
            Ok(())
        } else {
            Err(LedgerError::Unauthorized(
                "ERC1155: caller is not owner nor approved".to_string(),
            ))
        }
    }

    pub fn safe_transfer_from(
        &mut self,
        operator: Address,
        from: Address,
        to: Address,
        id: U256,
        amount: U256,
    ) -> Result<(), LedgerError> {
        self.ensure_operator(&operator, &from)?;
        self.move_balance(from, to, id, amount)?;
        self.events.push(LedgerEvent::TransferSingle { operator, from, to, id, value: amount });
        Ok(())
    }

    /// All transfers succeed or none are applied.
    pub fn safe_batch_transfer_from(
        &mut self,
        operator: Address,
        from: Address,
        to: Address,
        ids: &[U256],
        amounts: &[U256],
    ) -> Result<(), LedgerError> {
        if ids.len() != amounts.len() {
            return Err(LedgerError::precondition(
                "ERC1155: ids and values length mismatch",
            ));
        }
        self.ensure_operator(&operator, &from)?;

        let mut required: HashMap<U256, U256> = HashMap::new();
        for (id, amount) in ids.iter().zip(amounts) {
            let total = required.entry(*id).or_default();
            *total = total
                .checked_add(*amount)
                .ok_or_else(|| LedgerError::Numeric("batch amount overflow".to_string()))?;
        }
        for (id, total) in &required {
            if self.balance_of(&from, id) < *total {
                return Err(LedgerError::invariant(
                    "ERC1155: insufficient balance for transfer",
                ));
            }
        }

        for (id, amount) in ids.iter().zip(amounts) {
            self.move_balance(from, to, *id, *amount)?;
        }
        self.events.push(LedgerEvent::TransferBatch {
            operator,
            from,
            to,
            ids: ids.to_vec(),
            values: amounts.to_vec(),
        });
        Ok(())
    }

    fn move_balance(
        &mut self,
        from: Address,
        to: Address,
        id: U256,
        amount: U256,
    ) -> Result<(), LedgerError> {
        let available = self.balance_of(&from, &id);
        if available < amount {
            return Err(LedgerError::invariant(
                "ERC1155: insufficient balance for transfer",
            ));
        }
        let holders = self.balances.entry(id).or_default();
        holders.insert(from, available - amount);
        let to_balance = holders.get(&to).copied().unwrap_or_default();
        holders.insert(to, to_balance + amount);
        Ok(())
    }

    pub(crate) fn mint(&mut self, to: Address, id: U256, amount: U256) -> Result<(), LedgerError> {
        let supply = self
            .total_supply(&id)
            .checked_add(amount)
            .ok_or_else(|| LedgerError::Numeric("position supply overflow".to_string()))?;
        self.supply.insert(id, supply);
        let holders = self.balances.entry(id).or_default();
        let balance = holders.get(&to).copied().unwrap_or_default();
        holders.insert(to, balance + amount);
        Ok(())
    }

    pub(crate) fn burn(&mut self, from: Address, id: U256, amount: U256) -> Result<(), LedgerError> {
        let available = self.balance_of(&from, &id);
        if available < amount {
            return Err(LedgerError::invariant("ERC1155: burn amount exceeds balance"));
        }
        self.balances.entry(id).or_default().insert(from, available - amount);
        let supply = self.total_supply(&id);
        self.supply.insert(id, supply - amount);
        Ok(())
    }

    pub(crate) fn emit(&mut self, event: LedgerEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[LedgerEvent] {
        self.events.as_slice()
    }

    pub(crate) fn event_log_mut(&mut self) -> &mut EventLog<LedgerEvent> {
        &mut self.events
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> Address {
        Address::repeat_byte(b)
    }

    #[test]
    fn test_prepare_condition() {
        let mut ledger = ConditionalTokens::new(addr(0xc7));
        let id = ledger.prepare_condition(addr(1), B256::repeat_byte(7), 3).unwrap();

        assert_eq!(id, condition_id(addr(1), B256::repeat_byte(7), 3));
        assert_eq!(ledger.get_outcome_slot_count(&id), 3);
        assert_eq!(ledger.payout_denominator(&id), U256::ZERO);
        assert_eq!(ledger.payout_numerators(&id), vec![U256::ZERO; 3]);
        assert!(matches!(ledger.events()[0], LedgerEvent::ConditionPreparation { .. }));
    }

    #[test]
    fn test_prepare_condition_rejects_bad_slot_counts() {
        let mut ledger = ConditionalTokens::new(addr(0xc7));
        let q = B256::repeat_byte(7);
        assert_eq!(
            ledger.prepare_condition(addr(1), q, 1).unwrap_err().reason(),
            "there should be more than one outcome slot"
        );
        assert_eq!(
            ledger.prepare_condition(addr(1), q, 257).unwrap_err().reason(),
            "too many outcome slots"
        );
        ledger.prepare_condition(addr(1), q, 256).unwrap();
    }

    #[test]
    fn test_prepare_condition_is_not_repeatable() {
        let mut ledger = ConditionalTokens::new(addr(0xc7));
        ledger.prepare_condition(addr(1), B256::ZERO, 2).unwrap();
        let err = ledger.prepare_condition(addr(1), B256::ZERO, 2).unwrap_err();
        assert_eq!(err.reason(), "condition already prepared");
        assert_eq!(err.kind(), ErrorKind::Invariant);

        // Different resolver means a different condition.
        ledger.prepare_condition(addr(2), B256::ZERO, 2).unwrap();
    }

    #[test]
    fn test_transfer_requires_owner_or_operator() {
        let mut ledger = ConditionalTokens::new(addr(0xc7));
        let id = U256::from(42u64);
        ledger.mint(addr(1), id, U256::from(10u64)).unwrap();

        let err = ledger
            .safe_transfer_from(addr(2), addr(1), addr(3), id, U256::from(1u64))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);

        ledger.set_approval_for_all(addr(1), addr(2), true);
        ledger.safe_transfer_from(addr(2), addr(1), addr(3), id, U256::from(4u64)).unwrap();
        assert_eq!(ledger.balance_of(&addr(1), &id), U256::from(6u64));
        assert_eq!(ledger.balance_of(&addr(3), &id), U256::from(4u64));
        assert_eq!(ledger.total_supply(&id), U256::from(10u64));
    }

    #[test]
    fn test_batch_transfer_is_all_or_nothing() {
        let mut ledger = ConditionalTokens::new(addr(0xc7));
        let (a, b) = (U256::from(1u64), U256::from(2u64));
        ledger.mint(addr(1), a, U256::from(5u64)).unwrap();
        ledger.mint(addr(1), b, U256::from(5u64)).unwrap();

        let err = ledger
            .safe_batch_transfer_from(
                addr(1),
                addr(1),
                addr(2),
                &[a, b, b],
                &[U256::from(5u64), U256::from(3u64), U256::from(3u64)],
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invariant);
        assert_eq!(ledger.balance_of(&addr(1), &a), U256::from(5u64));
        assert_eq!(ledger.balance_of(&addr(2), &a), U256::ZERO);

        ledger
            .safe_batch_transfer_from(addr(1), addr(1), addr(2), &[a, b], &[U256::from(5u64), U256::from(2u64)])
            .unwrap();
        assert_eq!(
            ledger.balance_of_batch(&[addr(2), addr(2)], &[a, b]).unwrap(),
            vec![U256::from(5u64), U256::from(2u64)]
        );
        assert!(ledger.balance_of_batch(&[addr(2)], &[a, b]).is_err());
    }
}
