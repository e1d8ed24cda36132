// HTTP request handlers for the conditional markets API

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use alloy_primitives::{Address, B256, U256};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::MutexGuard;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::app_state::{wall_clock, AppState, SharedState};
use crate::error::{Classify, ErrorKind};
use crate::market_maker::quote;
use crate::models::*;
use crate::oracle::{QuestionParams, Role, Status};
use crate::positions::position_id;
use crate::runtime::weth_address;

// ===== ERRORS =====

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: Option<ErrorKind>,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, kind: None, message: message.into() }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self { status: StatusCode::NOT_FOUND, kind: None, message: message.into() }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self { status: StatusCode::INTERNAL_SERVER_ERROR, kind: None, message: message.into() }
    }
}

impl<E> From<E> for ApiError
where
    E: Classify + fmt::Display,
{
    fn from(e: E) -> Self {
        let kind = e.kind();
        Self {
            status: StatusCode::from_u16(kind.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            kind: Some(kind),
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "success": false,
            "error": self.message,
            "kind": self.kind,
        }));
        (self.status, body).into_response()
    }
}

type ApiResult = Result<Json<Value>, ApiError>;

/// Locks the state; outside dev mode the chain clock is first pulled up to
/// wall time.
fn lock(state: &SharedState) -> Result<MutexGuard<'_, AppState>, ApiError> {
    let mut app = state.lock().map_err(|_| ApiError::internal("state lock poisoned"))?;
    if !app.config.dev_mode {
        app.chain.sync_clock(wall_clock());
    }
    Ok(app)
}

fn parse<T: FromStr>(what: &str, raw: &str) -> Result<T, ApiError>
where
    T::Err: fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| ApiError::bad_request(format!("invalid {} '{}': {}", what, raw, e)))
}

// ===== HEALTH & DEV =====

pub async fn health_check() -> &'static str {
    "Conditional Markets - Online ✅"
}

pub async fn get_chain(State(state): State<SharedState>) -> ApiResult {
    let app = lock(&state)?;
    let chain = &app.chain;
    Ok(Json(json!({
        "height": chain.height(),
        "now": chain.now(),
        "ledger": chain.ledger.address,
        "factory": chain.factory.address,
        "oracle": chain.oracle.address,
        "collateral": weth_address(),
        "min_votes": chain.oracle.min_votes,
    })))
}

pub async fn faucet(State(state): State<SharedState>, Json(req): Json<FaucetRequest>) -> ApiResult {
    let mut app = lock(&state)?;
    app.chain.faucet(req.account, req.amount)?;
    app.log_activity("🚰", "FAUCET", &format!("{} +{}", req.account, req.amount));
    Ok(Json(json!({
        "success": true,
        "account": req.account,
        "native_balance": app.chain.bank.native_balance(&req.account),
    })))
}

pub async fn advance_clock(
    State(state): State<SharedState>,
    Json(req): Json<AdvanceClockRequest>,
) -> ApiResult {
    let mut app = lock(&state)?;
    if !app.config.dev_mode {
        return Err(ApiError::bad_request("clock follows wall time; /dev/advance needs DEV_MODE"));
    }
    let now = app.chain.advance(req.seconds);
    Ok(Json(json!({ "success": true, "now": now })))
}

pub async fn get_events(State(state): State<SharedState>) -> ApiResult {
    let app = lock(&state)?;
    let chain = &app.chain;
    let pools: serde_json::Map<String, Value> = chain
        .factory
        .pools()
        .map(|p| (p.address.to_string(), json!(p.events())))
        .collect();
    Ok(Json(json!({
        "collateral": chain.bank.events(),
        "ledger": chain.ledger.events(),
        "factory": chain.factory.events(),
        "pools": pools,
        "oracle": chain.oracle.events(),
    })))
}

pub async fn get_activity(State(state): State<SharedState>) -> ApiResult {
    let app = lock(&state)?;
    Ok(Json(json!({ "activity": app.activity })))
}

// ===== COLLATERAL =====

pub async fn deposit(State(state): State<SharedState>, Json(req): Json<DepositRequest>) -> ApiResult {
    let mut app = lock(&state)?;
    let asset = req.asset.unwrap_or_else(weth_address);
    app.chain.deposit(req.sender, asset, req.amount)?;
    app.log_activity("🪙", "DEPOSIT", &format!("{} wrapped {}", req.sender, req.amount));
    Ok(Json(json!({
        "success": true,
        "balance": app.chain.bank.balance_of(&asset, &req.sender),
    })))
}

pub async fn withdraw(State(state): State<SharedState>, Json(req): Json<DepositRequest>) -> ApiResult {
    let mut app = lock(&state)?;
    let asset = req.asset.unwrap_or_else(weth_address);
    app.chain.withdraw(req.sender, asset, req.amount)?;
    app.log_activity("🪙", "WITHDRAW", &format!("{} unwrapped {}", req.sender, req.amount));
    Ok(Json(json!({
        "success": true,
        "balance": app.chain.bank.balance_of(&asset, &req.sender),
    })))
}

pub async fn approve_collateral(
    State(state): State<SharedState>,
    Json(req): Json<CollateralApproveRequest>,
) -> ApiResult {
    let mut app = lock(&state)?;
    let asset = req.asset.unwrap_or_else(weth_address);
    app.chain.approve_collateral(req.sender, asset, req.spender, req.amount)?;
    Ok(Json(json!({
        "success": true,
        "allowance": app.chain.bank.allowance(&asset, &req.sender, &req.spender),
    })))
}

pub async fn transfer_collateral(
    State(state): State<SharedState>,
    Json(req): Json<CollateralTransferRequest>,
) -> ApiResult {
    let mut app = lock(&state)?;
    let asset = req.asset.unwrap_or_else(weth_address);
    app.chain.transfer_collateral(req.sender, asset, req.to, req.amount)?;
    app.log_activity("💸", "TRANSFER", &format!("{} → {} | {}", req.sender, req.to, req.amount));
    Ok(Json(json!({ "success": true })))
}

pub async fn get_collateral_balance(
    State(state): State<SharedState>,
    Path((asset, account)): Path<(String, String)>,
) -> ApiResult {
    let asset: Address = parse("asset", &asset)?;
    let account: Address = parse("account", &account)?;
    let app = lock(&state)?;
    Ok(Json(json!({
        "asset": asset,
        "account": account,
        "balance": app.chain.bank.balance_of(&asset, &account),
        "native_balance": app.chain.bank.native_balance(&account),
    })))
}

// ===== CONDITIONS =====

pub async fn prepare_condition(
    State(state): State<SharedState>,
    Json(req): Json<PrepareConditionRequest>,
) -> ApiResult {
    let mut app = lock(&state)?;
    let condition_id =
        app.chain
            .prepare_condition(req.oracle, req.question_id, req.outcome_slot_count)?;
    app.log_activity("📋", "CONDITION_PREPARED", &condition_id.to_string());
    Ok(Json(json!({ "success": true, "condition_id": condition_id })))
}

pub async fn report_payouts(
    State(state): State<SharedState>,
    Json(req): Json<ReportPayoutsRequest>,
) -> ApiResult {
    let mut app = lock(&state)?;
    let condition_id = app.chain.report_payouts(req.sender, req.question_id, &req.payouts)?;
    app.log_activity("⚖️", "CONDITION_RESOLVED", &condition_id.to_string());
    Ok(Json(json!({ "success": true, "condition_id": condition_id })))
}

pub async fn split_position(
    State(state): State<SharedState>,
    Json(req): Json<PartitionRequest>,
) -> ApiResult {
    let mut app = lock(&state)?;
    let collateral = req.collateral.unwrap_or_else(weth_address);
    app.chain.split_position(
        req.sender,
        collateral,
        req.parent_collection_id,
        req.condition_id,
        &req.partition,
        req.amount,
    )?;
    app.log_activity("✂️", "SPLIT", &format!("{} split {}", req.sender, req.amount));
    Ok(Json(json!({ "success": true })))
}

pub async fn merge_positions(
    State(state): State<SharedState>,
    Json(req): Json<PartitionRequest>,
) -> ApiResult {
    let mut app = lock(&state)?;
    let collateral = req.collateral.unwrap_or_else(weth_address);
    app.chain.merge_positions(
        req.sender,
        collateral,
        req.parent_collection_id,
        req.condition_id,
        &req.partition,
        req.amount,
    )?;
    app.log_activity("🔗", "MERGE", &format!("{} merged {}", req.sender, req.amount));
    Ok(Json(json!({ "success": true })))
}

pub async fn redeem_positions(
    State(state): State<SharedState>,
    Json(req): Json<RedeemRequest>,
) -> ApiResult {
    let mut app = lock(&state)?;
    let collateral = req.collateral.unwrap_or_else(weth_address);
    let payout = app.chain.redeem_positions(
        req.sender,
        collateral,
        req.parent_collection_id,
        req.condition_id,
        &req.index_sets,
    )?;
    app.log_activity("🎉", "REDEEM", &format!("{} redeemed {}", req.sender, payout));
    Ok(Json(json!({ "success": true, "payout": payout })))
}

pub async fn get_condition(
    State(state): State<SharedState>,
    Path(condition_id): Path<String>,
) -> ApiResult {
    let condition_id: B256 = parse("condition id", &condition_id)?;
    let app = lock(&state)?;
    let ledger = &app.chain.ledger;
    let condition = ledger
        .condition(&condition_id)
        .ok_or_else(|| ApiError::not_found(format!("condition {} not prepared", condition_id)))?;
    Ok(Json(json!(ConditionView {
        condition_id,
        oracle: condition.oracle,
        question_id: condition.question_id,
        outcome_slot_count: condition.outcome_slot_count,
        payout_numerators: ledger.payout_numerators(&condition_id),
        payout_denominator: ledger.payout_denominator(&condition_id),
    })))
}

pub async fn get_collection_id(
    State(state): State<SharedState>,
    Json(req): Json<CollectionIdRequest>,
) -> ApiResult {
    let app = lock(&state)?;
    let collection_id =
        app.chain
            .ledger
            .get_collection_id(req.parent_collection_id, req.condition_id, req.index_set)?;
    Ok(Json(json!({ "collection_id": collection_id })))
}

pub async fn get_position_id(Json(req): Json<PositionIdRequest>) -> ApiResult {
    let collateral = req.collateral.unwrap_or_else(weth_address);
    Ok(Json(json!({ "position_id": position_id(collateral, req.collection_id) })))
}

// ===== POSITIONS =====

pub async fn get_positions(
    State(state): State<SharedState>,
    Path(owner): Path<String>,
) -> ApiResult {
    let owner: Address = parse("owner", &owner)?;
    let app = lock(&state)?;
    let positions: Vec<Value> = app
        .chain
        .ledger
        .positions_of(&owner)
        .into_iter()
        .map(|(id, balance)| json!({ "position_id": id, "balance": balance }))
        .collect();
    Ok(Json(json!({ "owner": owner, "positions": positions })))
}

pub async fn get_position_balance(
    State(state): State<SharedState>,
    Path((owner, id)): Path<(String, String)>,
) -> ApiResult {
    let owner: Address = parse("owner", &owner)?;
    let id: U256 = parse("position id", &id)?;
    let app = lock(&state)?;
    Ok(Json(json!({
        "owner": owner,
        "position_id": id,
        "balance": app.chain.ledger.balance_of(&owner, &id),
        "total_supply": app.chain.ledger.total_supply(&id),
    })))
}

pub async fn balance_of_batch(
    State(state): State<SharedState>,
    Json(req): Json<BalanceBatchRequest>,
) -> ApiResult {
    let app = lock(&state)?;
    let balances = app.chain.ledger.balance_of_batch(&req.owners, &req.ids)?;
    Ok(Json(json!({ "balances": balances })))
}

pub async fn transfer_position(
    State(state): State<SharedState>,
    Json(req): Json<PositionTransferRequest>,
) -> ApiResult {
    let mut app = lock(&state)?;
    app.chain
        .safe_transfer_from(req.sender, req.from, req.to, req.id, req.amount)?;
    app.log_activity("📦", "POSITION_TRANSFER", &format!("{} → {} | {}", req.from, req.to, req.amount));
    Ok(Json(json!({ "success": true })))
}

pub async fn batch_transfer_positions(
    State(state): State<SharedState>,
    Json(req): Json<PositionBatchTransferRequest>,
) -> ApiResult {
    let mut app = lock(&state)?;
    app.chain
        .safe_batch_transfer_from(req.sender, req.from, req.to, &req.ids, &req.amounts)?;
    app.log_activity("📦", "POSITION_BATCH_TRANSFER", &format!("{} → {} | {} ids", req.from, req.to, req.ids.len()));
    Ok(Json(json!({ "success": true })))
}

pub async fn set_approval_for_all(
    State(state): State<SharedState>,
    Json(req): Json<ApprovalForAllRequest>,
) -> ApiResult {
    let mut app = lock(&state)?;
    app.chain.set_approval_for_all(req.sender, req.operator, req.approved)?;
    Ok(Json(json!({ "success": true, "approved": req.approved })))
}

// ===== POOLS =====

fn pool_view(app: &AppState, address: &Address) -> Result<PoolView, ApiError> {
    let chain = &app.chain;
    let pool = chain
        .factory
        .pool(address)
        .ok_or_else(|| ApiError::not_found(format!("pool {} not found", address)))?;
    Ok(PoolView {
        address: pool.address,
        creator: pool.creator,
        collateral: pool.collateral,
        condition_ids: pool.condition_ids.clone(),
        fee: pool.fee,
        treasury_percent: pool.treasury_percent,
        treasury: pool.treasury,
        position_ids: pool.position_ids().to_vec(),
        balances: pool.pool_balances(&chain.ledger),
        total_supply: pool.total_supply(),
    })
}

pub async fn create_pool(
    State(state): State<SharedState>,
    Json(req): Json<CreatePoolRequest>,
) -> ApiResult {
    let mut app = lock(&state)?;
    let collateral = req.collateral.unwrap_or_else(weth_address);
    let address = app.chain.create_pool(
        req.sender,
        collateral,
        req.condition_ids,
        req.fee,
        req.treasury_percent,
        req.treasury,
    )?;
    app.log_activity("🏭", "POOL_CREATED", &address.to_string());
    Ok(Json(json!({ "success": true, "pool": address })))
}

pub async fn list_pools(State(state): State<SharedState>) -> ApiResult {
    let app = lock(&state)?;
    let addresses: Vec<Address> = app.chain.factory.pools().map(|p| p.address).collect();
    let pools = addresses
        .iter()
        .map(|a| pool_view(&app, a))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(json!({ "pools": pools })))
}

pub async fn get_pool(State(state): State<SharedState>, Path(address): Path<String>) -> ApiResult {
    let address: Address = parse("pool", &address)?;
    let app = lock(&state)?;
    Ok(Json(json!(pool_view(&app, &address)?)))
}

pub async fn add_funding(
    State(state): State<SharedState>,
    Path(address): Path<String>,
    Json(req): Json<FundingRequest>,
) -> ApiResult {
    let pool: Address = parse("pool", &address)?;
    let mut app = lock(&state)?;
    let shares = app
        .chain
        .add_funding(req.sender, pool, req.amount, &req.distribution_hint)?;
    app.log_activity("💧", "FUNDING_ADDED", &format!("{} → {} | {}", req.sender, pool, req.amount));
    Ok(Json(json!({ "success": true, "shares_minted": shares })))
}

pub async fn remove_funding(
    State(state): State<SharedState>,
    Path(address): Path<String>,
    Json(req): Json<DefundingRequest>,
) -> ApiResult {
    let pool: Address = parse("pool", &address)?;
    let mut app = lock(&state)?;
    let amounts = app.chain.remove_funding(req.sender, pool, req.shares)?;
    app.log_activity("🏧", "FUNDING_REMOVED", &format!("{} ← {} | {} shares", req.sender, pool, req.shares));
    Ok(Json(json!({ "success": true, "amounts_removed": amounts })))
}

pub async fn buy(
    State(state): State<SharedState>,
    Path(address): Path<String>,
    Json(req): Json<BuyRequest>,
) -> ApiResult {
    let pool: Address = parse("pool", &address)?;
    let mut app = lock(&state)?;
    let bought = app.chain.buy(
        req.sender,
        pool,
        req.investment_amount,
        req.outcome_index,
        req.min_outcome_tokens_to_buy,
    )?;
    app.log_activity(
        "🛒",
        "BUY",
        &format!("{} bought {} of outcome {}", req.sender, bought, req.outcome_index),
    );
    Ok(Json(json!({ "success": true, "outcome_tokens_bought": bought })))
}

pub async fn sell(
    State(state): State<SharedState>,
    Path(address): Path<String>,
    Json(req): Json<SellRequest>,
) -> ApiResult {
    let pool: Address = parse("pool", &address)?;
    let mut app = lock(&state)?;
    let sold = app.chain.sell(
        req.sender,
        pool,
        req.return_amount,
        req.outcome_index,
        req.max_outcome_tokens_to_sell,
    )?;
    app.log_activity(
        "💵",
        "SELL",
        &format!("{} sold {} of outcome {}", req.sender, sold, req.outcome_index),
    );
    Ok(Json(json!({ "success": true, "outcome_tokens_sold": sold })))
}

pub async fn quote_pool(
    State(state): State<SharedState>,
    Path(address): Path<String>,
    Json(req): Json<QuoteRequest>,
) -> ApiResult {
    let pool: Address = parse("pool", &address)?;
    let app = lock(&state)?;
    let chain = &app.chain;
    let pool = chain.pool(&pool)?;
    let amount = match req.kind {
        QuoteKind::Buy => pool.calc_buy_amount(&chain.ledger, req.amount, req.outcome_index)?,
        QuoteKind::Sell => pool.calc_sell_amount(&chain.ledger, req.amount, req.outcome_index)?,
        QuoteKind::SellReturn => {
            pool.calc_sell_return(&chain.ledger, req.amount, req.outcome_index)?
        }
    };
    Ok(Json(json!({ "amount": amount })))
}

pub async fn get_prices(State(state): State<SharedState>, Path(address): Path<String>) -> ApiResult {
    let pool: Address = parse("pool", &address)?;
    let app = lock(&state)?;
    let balances = app.chain.pool(&pool)?.pool_balances(&app.chain.ledger);
    let prices = quote::spot_prices(&balances)?;
    Ok(Json(json!({ "pool": pool, "prices": prices })))
}

pub async fn get_fees(
    State(state): State<SharedState>,
    Path((address, account)): Path<(String, String)>,
) -> ApiResult {
    let pool: Address = parse("pool", &address)?;
    let account: Address = parse("account", &account)?;
    let app = lock(&state)?;
    let pool = app.chain.pool(&pool)?;
    Ok(Json(json!({
        "account": account,
        "fees_withdrawable": pool.fees_withdrawable_by(&account)?,
        "shares": pool.balance_of(&account),
    })))
}

pub async fn withdraw_fees(
    State(state): State<SharedState>,
    Path(address): Path<String>,
    Json(req): Json<SenderRequest>,
) -> ApiResult {
    let pool: Address = parse("pool", &address)?;
    let mut app = lock(&state)?;
    let amount = app.chain.withdraw_fees(req.sender, pool)?;
    app.log_activity("💰", "FEES_WITHDRAWN", &format!("{} ← {} | {}", req.sender, pool, amount));
    Ok(Json(json!({ "success": true, "amount": amount })))
}

pub async fn transfer_shares(
    State(state): State<SharedState>,
    Path(address): Path<String>,
    Json(req): Json<ShareTransferRequest>,
) -> ApiResult {
    let pool: Address = parse("pool", &address)?;
    let mut app = lock(&state)?;
    match req.from {
        Some(from) => app
            .chain
            .transfer_shares_from(req.sender, pool, from, req.to, req.amount)?,
        None => app.chain.transfer_shares(req.sender, pool, req.to, req.amount)?,
    }
    Ok(Json(json!({ "success": true })))
}

pub async fn approve_shares(
    State(state): State<SharedState>,
    Path(address): Path<String>,
    Json(req): Json<ShareApproveRequest>,
) -> ApiResult {
    let pool: Address = parse("pool", &address)?;
    let mut app = lock(&state)?;
    app.chain.approve_shares(req.sender, pool, req.spender, req.amount)?;
    Ok(Json(json!({ "success": true })))
}

// ===== ORACLE =====

pub async fn initialize_question(
    State(state): State<SharedState>,
    Json(req): Json<InitializeQuestionRequest>,
) -> ApiResult {
    let mut app = lock(&state)?;
    let params = QuestionParams {
        outcome_slot_count: req.outcome_slot_count,
        sources: req.sources,
        postprocess_keys: req.postprocess_keys,
        consensus_percent: req.consensus_percent,
        resolution_time: req.resolution_time,
        automatic: req.automatic,
    };
    let condition_id = app.chain.initialize_question(req.question_id, params)?;
    app.log_activity("❓", "QUESTION_INITIALIZED", &req.question_id.to_string());
    Ok(Json(json!({ "success": true, "condition_id": condition_id })))
}

pub async fn get_question(
    State(state): State<SharedState>,
    Path(question_id): Path<String>,
) -> ApiResult {
    let question_id: B256 = parse("question id", &question_id)?;
    let app = lock(&state)?;
    match app.chain.oracle.question(&question_id) {
        Some(q) => Ok(Json(json!({
            "question_id": q.question_id,
            "status": q.status,
            "status_code": q.status.code(),
            "outcome_slot_count": q.outcome_slot_count,
            "api_sources": q.api_sources,
            "consensus_percent": q.consensus_percent,
            "resolution_time": q.resolution_time,
            "automatic": q.automatic,
            "winner_idx": q.winner_idx,
            "votes": q.votes,
            "voters": q.voters.len(),
        }))),
        None => Ok(Json(json!({
            "question_id": question_id,
            "status": Status::Invalid,
            "status_code": Status::Invalid.code(),
        }))),
    }
}

pub async fn finalize_question(
    State(state): State<SharedState>,
    Path(question_id): Path<String>,
    Json(req): Json<FinalizeQuestionRequest>,
) -> ApiResult {
    let question_id: B256 = parse("question id", &question_id)?;
    let mut app = lock(&state)?;
    let status = app.chain.finalize_question(question_id, &req.proofs)?;
    app.log_activity("🏁", "QUESTION_FINALIZE", &format!("{} → {:?}", question_id, status));
    Ok(Json(json!({
        "success": true,
        "status": status,
        "winner_idx": app.chain.oracle.question(&question_id).and_then(|q| q.winner_idx),
    })))
}

pub async fn vote(
    State(state): State<SharedState>,
    Path(question_id): Path<String>,
    Json(req): Json<VoteRequest>,
) -> ApiResult {
    let question_id: B256 = parse("question id", &question_id)?;
    let mut app = lock(&state)?;
    let status = app.chain.vote(req.sender, question_id, req.outcome_idx)?;
    app.log_activity("🗳️", "VOTE", &format!("{} → {} on {}", req.sender, req.outcome_idx, question_id));
    Ok(Json(json!({ "success": true, "status": status })))
}

pub async fn grant_role(State(state): State<SharedState>, Json(req): Json<RoleRequest>) -> ApiResult {
    let mut app = lock(&state)?;
    app.chain.grant_role(req.sender, req.role, req.account)?;
    app.log_activity("🔑", "ROLE_GRANTED", &format!("{} {}", req.account, req.role));
    Ok(Json(json!({ "success": true })))
}

pub async fn revoke_role(State(state): State<SharedState>, Json(req): Json<RoleRequest>) -> ApiResult {
    let mut app = lock(&state)?;
    app.chain.revoke_role(req.sender, req.role, req.account)?;
    app.log_activity("🔒", "ROLE_REVOKED", &format!("{} {}", req.account, req.role));
    Ok(Json(json!({ "success": true })))
}

pub async fn renounce_role(State(state): State<SharedState>, Json(req): Json<RoleRequest>) -> ApiResult {
    let mut app = lock(&state)?;
    app.chain.renounce_role(req.sender, req.role, req.account)?;
    Ok(Json(json!({ "success": true })))
}

pub async fn get_role_members(
    State(state): State<SharedState>,
    Path(role): Path<String>,
) -> ApiResult {
    let role = match role.to_ascii_uppercase().as_str() {
        "ADMIN" => Role::Admin,
        "VOTER" => Role::Voter,
        other => return Err(ApiError::bad_request(format!("unknown role '{}'", other))),
    };
    let app = lock(&state)?;
    Ok(Json(json!({ "role": role, "members": app.chain.oracle.members(role) })))
}

// ===== ROUTER =====

pub fn router(state: SharedState) -> Router {
    Router::new()
        // ===== HEALTH & DEV =====
        .route("/", get(health_check))
        .route("/health", get(health_check))
        .route("/chain", get(get_chain))
        .route("/events", get(get_events))
        .route("/activity", get(get_activity))
        .route("/dev/faucet", post(faucet))
        .route("/dev/advance", post(advance_clock))
        // ===== COLLATERAL =====
        .route("/collateral/deposit", post(deposit))
        .route("/collateral/withdraw", post(withdraw))
        .route("/collateral/approve", post(approve_collateral))
        .route("/collateral/transfer", post(transfer_collateral))
        .route("/collateral/:asset/balance/:account", get(get_collateral_balance))
        // ===== CONDITIONS =====
        .route("/conditions", post(prepare_condition))
        .route("/conditions/report", post(report_payouts))
        .route("/conditions/split", post(split_position))
        .route("/conditions/merge", post(merge_positions))
        .route("/conditions/redeem", post(redeem_positions))
        .route("/conditions/:id", get(get_condition))
        .route("/ids/collection", post(get_collection_id))
        .route("/ids/position", post(get_position_id))
        // ===== POSITIONS =====
        .route("/positions/batch", post(balance_of_batch))
        .route("/positions/transfer", post(transfer_position))
        .route("/positions/batch-transfer", post(batch_transfer_positions))
        .route("/positions/approval", post(set_approval_for_all))
        .route("/positions/:owner", get(get_positions))
        .route("/positions/:owner/:id", get(get_position_balance))
        // ===== POOLS =====
        .route("/pools", get(list_pools).post(create_pool))
        .route("/pools/:address", get(get_pool))
        .route("/pools/:address/fund", post(add_funding))
        .route("/pools/:address/defund", post(remove_funding))
        .route("/pools/:address/buy", post(buy))
        .route("/pools/:address/sell", post(sell))
        .route("/pools/:address/quote", post(quote_pool))
        .route("/pools/:address/prices", get(get_prices))
        .route("/pools/:address/fees/withdraw", post(withdraw_fees))
        .route("/pools/:address/fees/:account", get(get_fees))
        .route("/pools/:address/shares/transfer", post(transfer_shares))
        .route("/pools/:address/shares/approve", post(approve_shares))
        // ===== ORACLE =====
        .route("/oracle/questions", post(initialize_question))
        .route("/oracle/questions/:id", get(get_question))
        .route("/oracle/questions/:id/finalize", post(finalize_question))
        .route("/oracle/questions/:id/vote", post(vote))
        .route("/oracle/roles/grant", post(grant_role))
        .route("/oracle/roles/revoke", post(revoke_role))
        .route("/oracle/roles/renounce", post(renounce_role))
        .route("/oracle/roles/:role", get(get_role_members))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
