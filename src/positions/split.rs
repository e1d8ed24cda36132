// ============================================================================
// Split & Merge
// ============================================================================
//
// Splitting converts one unit of a source into one unit of every position in
// a partition:
//
//   full partition, root parent    : collateral        -> children
//   full partition, nested parent  : parent position   -> children
//   partial partition              : union position    -> children
//
// Merging is the exact inverse. The source is debited before anything is
// credited.
//
// ============================================================================

use super::{CollectionId, ConditionalTokens, LedgerError, LedgerEvent};
use crate::collateral::TokenBank;
use alloy_primitives::{Address, B256, U256};
use tracing::info;

/// What a validated partition covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PartitionShape {
    pub full_index_set: U256,
    pub union: U256,
}

impl PartitionShape {
    pub fn is_full(&self) -> bool {
        self.union == self.full_index_set
    }
}

impl ConditionalTokens {
    pub(crate) fn validate_partition(
        &self,
        condition_id: &B256,
        partition: &[U256],
    ) -> Result<PartitionShape, LedgerError> {
        if partition.len() <= 1 {
            return Err(LedgerError::precondition("got empty or singleton partition"));
        }
        let slots = self.get_outcome_slot_count(condition_id);
        if slots == 0 {
            return Err(LedgerError::precondition("condition not prepared yet"));
        }

        let full_index_set = super::full_index_set(slots);
        let mut free = full_index_set;
        for index_set in partition {
            if index_set.is_zero() || *index_set >= full_index_set {
                return Err(LedgerError::precondition("got invalid index set"));
            }
            if (*index_set & free) != *index_set {
                return Err(LedgerError::precondition("partition not disjoint"));
            }
            free ^= *index_set;
        }
        Ok(PartitionShape { full_index_set, union: full_index_set ^ free })
    }

    /// Position id of `index_set` under `parent` for `collateral`.
    pub(crate) fn child_position(
        &self,
        collateral: Address,
        parent: CollectionId,
        condition_id: B256,
        index_set: U256,
    ) -> Result<U256, LedgerError> {
        let collection = CollectionId::derive(parent, condition_id, index_set)?;
        Ok(super::position_id(collateral, collection))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn split_position(
        &mut self,
        bank: &mut TokenBank,
        sender: Address,
        collateral: Address,
        parent_collection_id: CollectionId,
        condition_id: B256,
        partition: &[U256],
        amount: U256,
    ) -> Result<(), LedgerError> {
        let shape = self.validate_partition(&condition_id, partition)?;
        let children = partition
            .iter()
            .map(|set| self.child_position(collateral, parent_collection_id, condition_id, *set))
            .collect::<Result<Vec<_>, _>>()?;

        if !shape.is_full() {
            let source =
                self.child_position(collateral, parent_collection_id, condition_id, shape.union)?;
            self.burn(sender, source, amount)?;
        } else if parent_collection_id.is_root() {
            let custodian = self.address;
            bank.transfer_from(collateral, custodian, sender, custodian, amount)?;
        } else {
            let source = super::position_id(collateral, parent_collection_id);
            self.burn(sender, source, amount)?;
        }

        for id in children {
            self.mint(sender, id, amount)?;
        }

        self.emit(LedgerEvent::PositionSplit {
            stakeholder: sender,
            collateral,
            parent_collection_id,
            condition_id,
            partition: partition.to_vec(),
            amount,
        });
        info!(
            "✂️  Split: {} split {} of {} into {} positions (condition {})",
            sender,
            amount,
            collateral,
            partition.len(),
            condition_id
        );
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn merge_positions(
        &mut self,
        bank: &mut TokenBank,
        sender: Address,
        collateral: Address,
        parent_collection_id: CollectionId,
        condition_id: B256,
        partition: &[U256],
        amount: U256,
    ) -> Result<(), LedgerError> {
        let shape = self.validate_partition(&condition_id, partition)?;

        for index_set in partition {
            let id = self.child_position(collateral, parent_collection_id, condition_id, *index_set)?;
            self.burn(sender, id, amount)?;
        }

        if !shape.is_full() {
            let target =
                self.child_position(collateral, parent_collection_id, condition_id, shape.union)?;
            self.mint(sender, target, amount)?;
        } else if parent_collection_id.is_root() {
            bank.transfer(collateral, self.address, sender, amount)?;
        } else {
            let target = super::position_id(collateral, parent_collection_id);
            self.mint(sender, target, amount)?;
        }

        self.emit(LedgerEvent::PositionsMerge {
            stakeholder: sender,
            collateral,
            parent_collection_id,
            condition_id,
            partition: partition.to_vec(),
            amount,
        });
        info!(
            "🔗 Merge: {} merged {} of {} positions (condition {})",
            sender,
            amount,
            partition.len(),
            condition_id
        );
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
