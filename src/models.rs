// Request and response models for the HTTP API.
//
// Every state-changing request names its caller in `sender`. Amounts and ids
// are 256-bit integers, accepted as decimal or 0x-prefixed hex strings.

use crate::oracle::{Proof, Role};
use crate::positions::CollectionId;
use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

// ===== DEV =====

#[derive(Debug, Clone, Deserialize)]
pub struct FaucetRequest {
    pub account: Address,
    pub amount: U256,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdvanceClockRequest {
    pub seconds: u64,
}

// ===== COLLATERAL =====

#[derive(Debug, Clone, Deserialize)]
pub struct DepositRequest {
    pub sender: Address,
    /// Defaults to the wrapped native collateral.
    #[serde(default)]
    pub asset: Option<Address>,
    pub amount: U256,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollateralApproveRequest {
    pub sender: Address,
    #[serde(default)]
    pub asset: Option<Address>,
    pub spender: Address,
    pub amount: U256,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollateralTransferRequest {
    pub sender: Address,
    #[serde(default)]
    pub asset: Option<Address>,
    pub to: Address,
    pub amount: U256,
}

// ===== CONDITIONS =====

#[derive(Debug, Clone, Deserialize)]
pub struct PrepareConditionRequest {
    pub oracle: Address,
    pub question_id: B256,
    pub outcome_slot_count: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportPayoutsRequest {
    pub sender: Address,
    pub question_id: B256,
    pub payouts: Vec<U256>,
}

/// Body of split and merge.
#[derive(Debug, Clone, Deserialize)]
pub struct PartitionRequest {
    pub sender: Address,
    #[serde(default)]
    pub collateral: Option<Address>,
    #[serde(default)]
    pub parent_collection_id: CollectionId,
    pub condition_id: B256,
    pub partition: Vec<U256>,
    pub amount: U256,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedeemRequest {
    pub sender: Address,
    #[serde(default)]
    pub collateral: Option<Address>,
    #[serde(default)]
    pub parent_collection_id: CollectionId,
    pub condition_id: B256,
    pub index_sets: Vec<U256>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectionIdRequest {
    #[serde(default)]
    pub parent_collection_id: CollectionId,
    pub condition_id: B256,
    pub index_set: U256,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PositionIdRequest {
    #[serde(default)]
    pub collateral: Option<Address>,
    pub collection_id: CollectionId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionView {
    pub condition_id: B256,
    pub oracle: Address,
    pub question_id: B256,
    pub outcome_slot_count: usize,
    pub payout_numerators: Vec<U256>,
    pub payout_denominator: U256,
}

// ===== POSITIONS =====

#[derive(Debug, Clone, Deserialize)]
pub struct BalanceBatchRequest {
    pub owners: Vec<Address>,
    pub ids: Vec<U256>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PositionTransferRequest {
    pub sender: Address,
    pub from: Address,
    pub to: Address,
    pub id: U256,
    pub amount: U256,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PositionBatchTransferRequest {
    pub sender: Address,
    pub from: Address,
    pub to: Address,
    pub ids: Vec<U256>,
    pub amounts: Vec<U256>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApprovalForAllRequest {
    pub sender: Address,
    pub operator: Address,
    pub approved: bool,
}

// ===== POOLS =====

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePoolRequest {
    pub sender: Address,
    #[serde(default)]
    pub collateral: Option<Address>,
    pub condition_ids: Vec<B256>,
    pub fee: U256,
    #[serde(default)]
    pub treasury_percent: u64,
    #[serde(default)]
    pub treasury: Address,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FundingRequest {
    pub sender: Address,
    pub amount: U256,
    #[serde(default)]
    pub distribution_hint: Vec<U256>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DefundingRequest {
    pub sender: Address,
    pub shares: U256,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuyRequest {
    pub sender: Address,
    pub investment_amount: U256,
    pub outcome_index: usize,
    #[serde(default)]
    pub min_outcome_tokens_to_buy: U256,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SellRequest {
    pub sender: Address,
    pub return_amount: U256,
    pub outcome_index: usize,
    pub max_outcome_tokens_to_sell: U256,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteKind {
    /// Tokens received for an investment.
    Buy,
    /// Tokens required for a collateral return.
    Sell,
    /// Advisory collateral returned for selling tokens.
    SellReturn,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuoteRequest {
    pub kind: QuoteKind,
    pub amount: U256,
    pub outcome_index: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SenderRequest {
    pub sender: Address,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShareTransferRequest {
    pub sender: Address,
    #[serde(default)]
    pub from: Option<Address>,
    pub to: Address,
    pub amount: U256,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShareApproveRequest {
    pub sender: Address,
    pub spender: Address,
    pub amount: U256,
}

#[derive(Debug, Clone, Serialize)]
pub struct PoolView {
    pub address: Address,
    pub creator: Address,
    pub collateral: Address,
    pub condition_ids: Vec<B256>,
    pub fee: U256,
    pub treasury_percent: u64,
    pub treasury: Address,
    pub position_ids: Vec<U256>,
    pub balances: Vec<U256>,
    pub total_supply: U256,
}

// ===== ORACLE =====

#[derive(Debug, Clone, Deserialize)]
pub struct InitializeQuestionRequest {
    pub question_id: B256,
    pub outcome_slot_count: usize,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub postprocess_keys: Vec<String>,
    pub consensus_percent: u8,
    pub resolution_time: u64,
    pub automatic: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FinalizeQuestionRequest {
    #[serde(default)]
    pub proofs: Vec<Proof>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VoteRequest {
    pub sender: Address,
    pub outcome_idx: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoleRequest {
    pub sender: Address,
    pub role: Role,
    pub account: Address,
}
