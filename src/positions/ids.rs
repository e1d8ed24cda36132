// ============================================================================
// Identifier Derivation
// ============================================================================
//
//   conditionId  = keccak256(resolver ‖ questionId ‖ uint256(outcomeSlotCount))
//   collectionId = encode(decode(parent) + hashToCurve(keccak256(conditionId ‖ indexSet)))
//   positionId   = keccak256(collateral ‖ collectionId)
//
// Tight EVM packing: addresses are 20 bytes, words
// are 32 bytes big-endian.
//
// ============================================================================

use super::curve::{CurveError, CurvePoint};
use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::fmt;

/// Keccak-256 over the concatenation of `parts`.
pub fn keccak256_packed(parts: &[&[u8]]) -> B256 {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    B256::from_slice(&hasher.finalize())
}

/// Deterministic account address derived from a label and a nonce.
pub fn derive_address(label: &[u8], nonce: u64) -> Address {
    let hash = keccak256_packed(&[label, &nonce.to_be_bytes()]);
    Address::from_slice(&hash[12..])
}

pub fn condition_id(resolver: Address, question_id: B256, outcome_slot_count: usize) -> B256 {
    let count = U256::from(outcome_slot_count).to_be_bytes::<32>();
    keccak256_packed(&[resolver.as_slice(), question_id.as_slice(), &count])
}

/// Position token id for `collection_id` backed by `collateral`.
pub fn position_id(collateral: Address, collection_id: CollectionId) -> U256 {
    let word = collection_id.0.to_be_bytes::<32>();
    let hash = keccak256_packed(&[collateral.as_slice(), &word]);
    U256::from_be_bytes(hash.0)
}

/// Bitmask with the lowest `outcome_slot_count` bits set.
pub fn full_index_set(outcome_slot_count: usize) -> U256 {
    if outcome_slot_count >= 256 {
        U256::MAX
    } else {
        (U256::from(1u8) << outcome_slot_count) - U256::from(1u8)
    }
}

/// Index sets `[1, 2, 4, ...]`, one per outcome slot.
pub fn basic_partition(outcome_slot_count: usize) -> Vec<U256> {
    (0..outcome_slot_count)
        .map(|i| U256::from(1u8) << i)
        .collect()
}

// ============================================================================
// COLLECTION ID
// ============================================================================

/// A compressed curve point naming a set of outcome index sets, possibly
/// spanning several conditions. `CollectionId::ROOT` (zero) is the empty
/// collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionId(pub U256);

impl CollectionId {
    pub const ROOT: CollectionId = CollectionId(U256::ZERO);

    pub fn is_root(&self) -> bool {
        self.0.is_zero()
    }

    /// The collection for `index_set` of `condition_id` alone.
    pub fn for_index_set(condition_id: B256, index_set: U256) -> CollectionId {
        let seed = keccak256_packed(&[condition_id.as_slice(), &index_set.to_be_bytes::<32>()]);
        CollectionId(CurvePoint::from_seed(seed).encode())
    }

    /// `parent` refined by `index_set` of `condition_id`.
    pub fn derive(
        parent: CollectionId,
        condition_id: B256,
        index_set: U256,
    ) -> Result<CollectionId, CurveError> {
        parent.combine(CollectionId::for_index_set(condition_id, index_set))
    }

    /// Point addition of the two collections.
    pub fn combine(self, other: CollectionId) -> Result<CollectionId, CurveError> {
        let a = CurvePoint::decode(self.0)?;
        let b = CurvePoint::decode(other.0)?;
        Ok(CollectionId((a + b).encode()))
    }

    /// Order-independent combination of any number of collections.
    pub fn combine_all(ids: &[CollectionId]) -> Result<CollectionId, CurveError> {
        let points = ids
            .iter()
            .map(|id| CurvePoint::decode(id.0))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CollectionId(CurvePoint::sum(points).encode()))
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#066x}", self.0)
    }
}

impl From<U256> for CollectionId {
    fn from(word: U256) -> Self {
        CollectionId(word)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, b256, uint};

    const ORACLE: Address = address!("000000000000000000000000000000000000000a");
    const COLLATERAL: Address = address!("00000000000000000000000000000000000000cc");
    const QUESTION: B256 = b256!("1111111111111111111111111111111111111111111111111111111111111111");

    #[test]
    fn test_keccak_empty_input() {
        assert_eq!(
            keccak256_packed(&[]),
            b256!("c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470")
        );
    }

    #[test]
    fn test_condition_id_packing() {
        assert_eq!(
            condition_id(ORACLE, QUESTION, 2),
            b256!("4262625053e097d4f0283b7711d0d507865441477c23c4c869fd581276ca069d")
        );
        assert_ne!(condition_id(ORACLE, QUESTION, 2), condition_id(ORACLE, QUESTION, 3));
    }

    #[test]
    fn test_collection_ids_for_binary_condition() {
        let cond = condition_id(ORACLE, QUESTION, 2);
        assert_eq!(
            CollectionId::for_index_set(cond, U256::from(1u8)).0,
            uint!(0x6f9c32c6d96be19f7461a28aac8ce03619e8a6eb53a4d93ecc19ae9d2dc55f34_U256)
        );
        assert_eq!(
            CollectionId::for_index_set(cond, U256::from(2u8)).0,
            uint!(0x6730bad661fa37d37b5fc35323a2f147b1b65a27dae51cf0e0a5fef6bddeb343_U256)
        );
    }

    #[test]
    fn test_nested_collection_matches_combination() {
        let cond = condition_id(ORACLE, QUESTION, 2);
        let a = CollectionId::for_index_set(cond, U256::from(1u8));
        let b = CollectionId::for_index_set(cond, U256::from(2u8));

        let nested = CollectionId::derive(a, cond, U256::from(2u8)).unwrap();
        assert_eq!(
            nested.0,
            uint!(0x16ddbb8fddfef020ec90ac7f874264c240006de1cbe4fa05db342aa350ddd0_U256)
        );
        assert_eq!(nested, b.combine(a).unwrap());
        assert_eq!(nested, CollectionId::combine_all(&[b, a]).unwrap());
    }

    #[test]
    fn test_combination_is_order_independent() {
        let c1 = condition_id(ORACLE, QUESTION, 3);
        let c2 = condition_id(ORACLE, B256::repeat_byte(0x22), 4);
        let a = CollectionId::for_index_set(c1, U256::from(0b011u8));
        let b = CollectionId::for_index_set(c2, U256::from(0b1000u8));
        let c = CollectionId::for_index_set(c2, U256::from(0b0001u8));

        assert_eq!(a.combine(b).unwrap(), b.combine(a).unwrap());
        assert_eq!(
            CollectionId::combine_all(&[a, b, c]).unwrap(),
            CollectionId::combine_all(&[c, b, a]).unwrap()
        );
    }

    #[test]
    fn test_root_is_identity() {
        let cond = condition_id(ORACLE, QUESTION, 2);
        let a = CollectionId::for_index_set(cond, U256::from(1u8));
        assert_eq!(CollectionId::derive(CollectionId::ROOT, cond, U256::from(1u8)).unwrap(), a);
        assert_eq!(CollectionId::combine_all(&[]).unwrap(), CollectionId::ROOT);
    }

    #[test]
    fn test_position_id() {
        let cond = condition_id(ORACLE, QUESTION, 2);
        let a = CollectionId::for_index_set(cond, U256::from(1u8));
        assert_eq!(
            position_id(COLLATERAL, a),
            uint!(0x9e320d600bd55554e921c82ed1d237449af544a127eff48fe772be0e5cda0d67_U256)
        );
    }

    #[test]
    fn test_index_set_helpers() {
        assert_eq!(full_index_set(2), U256::from(3u8));
        assert_eq!(full_index_set(256), U256::MAX);
        assert_eq!(
            basic_partition(3),
            vec![U256::from(1u8), U256::from(2u8), U256::from(4u8)]
        );
    }
}
