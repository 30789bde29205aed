// HTTP request handlers for the Crowdcast API

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde_json::{json, Value};

use crate::app_state::SharedState;
use crate::errors::MarketError;
use crate::external::Asset;
use crate::models::*;

/// Map engine errors to HTTP status codes. Missing resources are 404,
/// authorization failures 403, arithmetic faults 500, everything else is
/// a plain client error.
fn status_for(err: &MarketError) -> StatusCode {
    match err {
        MarketError::MarketNotFound(_) | MarketError::CommitmentNotFound { .. } => {
            StatusCode::NOT_FOUND
        }
        MarketError::Unauthorized | MarketError::NotWhitelisted => StatusCode::FORBIDDEN,
        MarketError::Overflow => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    }
}

fn reject(err: MarketError) -> (StatusCode, Json<Value>) {
    (
        status_for(&err),
        Json(json!({ "success": false, "error": err.to_string() })),
    )
}

fn asset_from(token: &Option<String>) -> Asset {
    match token {
        Some(addr) => Asset::Token(addr.clone()),
        None => Asset::Native,
    }
}

type ApiResult = Result<Json<Value>, (StatusCode, Json<Value>)>;

// ===== MARKET ENDPOINTS =====

pub async fn create_market(
    State(state): State<SharedState>,
    Json(payload): Json<CreateMarketRequest>,
) -> ApiResult {
    let mut app_state = state.lock().unwrap();
    let market_id = app_state
        .engine
        .create_market(&payload.creator, payload.params)
        .map_err(reject)?;
    Ok(Json(json!({ "success": true, "market_id": market_id })))
}

pub async fn get_markets(State(state): State<SharedState>) -> Json<Value> {
    let app_state = state.lock().unwrap();
    let markets: Vec<Value> = app_state
        .engine
        .registry
        .all()
        .into_iter()
        .filter_map(|market| {
            let state = app_state.engine.consensus.get(market.id).ok()?;
            let phase = app_state.engine.market_phase(market.id).ok()?;
            serde_json::to_value(MarketView::build(market, state, phase)).ok()
        })
        .collect();
    Json(json!({ "markets": markets }))
}

pub async fn get_market(
    State(state): State<SharedState>,
    Path(id): Path<u64>,
) -> ApiResult {
    let app_state = state.lock().unwrap();
    let (market, consensus, phase) = app_state.engine.market_view(id).map_err(reject)?;
    let view = MarketView::build(market, consensus, phase);
    Ok(Json(json!({ "market": view })))
}

// ===== LIFECYCLE ENDPOINTS =====

pub async fn commit(
    State(state): State<SharedState>,
    Path(id): Path<u64>,
    Json(payload): Json<CommitRequest>,
) -> ApiResult {
    let mut app_state = state.lock().unwrap();
    let receipt = app_state
        .engine
        .commit(
            &payload.committer,
            id,
            payload.commitment_hash,
            payload.wager,
            payload.proof.as_deref(),
        )
        .map_err(reject)?;
    Ok(Json(json!({
        "success": true,
        "commitment_id": receipt.commitment_id,
        "wager": receipt.wager,
        "weight": receipt.weight,
    })))
}

pub async fn reveal(
    State(state): State<SharedState>,
    Path((id, commitment_id)): Path<(u64, u64)>,
    Json(payload): Json<RevealRequest>,
) -> ApiResult {
    let mut app_state = state.lock().unwrap();
    app_state
        .engine
        .reveal(
            id,
            commitment_id,
            &payload.commitment_hash,
            payload.position,
            &payload.nonce,
        )
        .map_err(reject)?;
    Ok(Json(json!({ "success": true, "position": payload.position })))
}

pub async fn resolve(
    State(state): State<SharedState>,
    Path(id): Path<u64>,
    Json(payload): Json<ResolveRequest>,
) -> ApiResult {
    let mut app_state = state.lock().unwrap();
    let summary = app_state
        .engine
        .resolve(id, payload.proposed_threshold)
        .map_err(reject)?;
    Ok(Json(json!({
        "success": true,
        "consensus_position": summary.consensus_position,
        "winning_threshold": summary.winning_threshold,
        "winning_commitments": summary.winning_commitments,
        "winning_wagers": summary.winning_wagers,
        "target_rank": summary.target_rank,
    })))
}

pub async fn claim(
    State(state): State<SharedState>,
    Path((id, commitment_id)): Path<(u64, u64)>,
) -> ApiResult {
    let mut app_state = state.lock().unwrap();
    let payout = app_state.engine.claim(id, commitment_id).map_err(reject)?;
    Ok(Json(json!({ "success": true, "payout": payout })))
}

pub async fn add_winnings(
    State(state): State<SharedState>,
    Path(id): Path<u64>,
    Json(payload): Json<AddWinningsRequest>,
) -> ApiResult {
    let mut app_state = state.lock().unwrap();
    let total = app_state
        .engine
        .add_winnings(&payload.funder, id, payload.amount)
        .map_err(reject)?;
    Ok(Json(json!({ "success": true, "total_winnings": total })))
}

// ===== COMMITMENT QUERIES =====

pub async fn get_commitment(
    State(state): State<SharedState>,
    Path((id, commitment_id)): Path<(u64, u64)>,
) -> ApiResult {
    let app_state = state.lock().unwrap();
    let commitment = app_state
        .engine
        .commitments
        .get(id, commitment_id)
        .map_err(reject)?;
    Ok(Json(json!({ "commitment": commitment })))
}

pub async fn get_owner_commitments(
    State(state): State<SharedState>,
    Path((id, owner)): Path<(u64, String)>,
) -> ApiResult {
    let app_state = state.lock().unwrap();
    // 404 on unknown markets, empty list on unknown owners
    app_state.engine.registry.get(id).map_err(reject)?;
    let commitments = app_state.engine.commitments_for_owner(id, &owner);
    Ok(Json(json!({ "owner": owner, "commitments": commitments })))
}

// ===== VAULT ENDPOINTS =====

pub async fn deposit(
    State(state): State<SharedState>,
    Json(payload): Json<DepositRequest>,
) -> ApiResult {
    let mut app_state = state.lock().unwrap();
    let asset = asset_from(&payload.token);
    let balance = app_state
        .engine
        .vault
        .deposit(&asset, &payload.account, payload.amount)
        .map_err(reject)?;
    Ok(Json(json!({
        "success": true,
        "account": payload.account,
        "balance": balance,
    })))
}

pub async fn get_balance(
    State(state): State<SharedState>,
    Path(account): Path<String>,
) -> Json<Value> {
    let app_state = state.lock().unwrap();
    let balance = app_state.engine.vault.balance_of(&Asset::Native, &account);
    Json(json!({ "account": account, "balance": balance }))
}

// ===== OBSERVABILITY ENDPOINTS =====

pub async fn get_events(State(state): State<SharedState>) -> Json<Value> {
    let app_state = state.lock().unwrap();
    Json(json!({ "events": app_state.engine.events() }))
}

pub async fn get_activity(State(state): State<SharedState>) -> Json<Value> {
    let app_state = state.lock().unwrap();
    Json(json!({ "activity": app_state.engine.activity() }))
}

pub async fn get_stats(State(state): State<SharedState>) -> Json<Value> {
    let app_state = state.lock().unwrap();
    Json(json!({ "stats": app_state.engine.stats() }))
}

// ===== ADMIN ENDPOINTS =====

pub async fn update_params(
    State(state): State<SharedState>,
    Json(payload): Json<UpdateParamsRequest>,
) -> ApiResult {
    let mut app_state = state.lock().unwrap();
    app_state
        .engine
        .update_params(&payload.caller, payload.config)
        .map_err(reject)?;
    Ok(Json(json!({ "success": true })))
}
