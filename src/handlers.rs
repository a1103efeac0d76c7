// HTTP request handlers for the Predictum API

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::Json,
};

use crate::app_state::SharedState;
use crate::error::LedgerError;
use crate::market_resolve::listing::{MarketPage, MarketQuery};
use crate::models::*;

// ===== HELPERS =====

fn parse_market_id(raw: &str) -> Result<u64, LedgerError> {
    raw.trim()
        .parse()
        .map_err(|_| LedgerError::Validation(format!("invalid market id '{}'", raw)))
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, LedgerError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| LedgerError::Validation(rejection.body_text()))
}

// ===== MARKET ENDPOINTS =====

pub async fn get_markets(
    State(state): State<SharedState>,
    Query(params): Query<MarketListParams>,
) -> Result<Json<MarketPage>, LedgerError> {
    let query = MarketQuery::from_params(&params)?;
    Ok(Json(state.ledger.list_markets(&query)?))
}

pub async fn get_market(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<MarketView>, LedgerError> {
    let market = state.ledger.get_market(parse_market_id(&id)?)?;
    Ok(Json(market.into()))
}

pub async fn create_market(
    State(state): State<SharedState>,
    payload: Result<Json<CreateMarketRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MarketView>), LedgerError> {
    let new_market = json_body(payload)?.into_new_market()?;
    let market = state.ledger.create_market(new_market)?;
    Ok((StatusCode::CREATED, Json(market.into())))
}

pub async fn resolve_market(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    payload: Result<Json<ResolveRequest>, JsonRejection>,
) -> Result<Json<ResolveResponse>, LedgerError> {
    let market_id = parse_market_id(&id)?;
    let request = json_body(payload)?;
    let market = state.ledger.resolve_market(market_id, request.outcome)?;
    Ok(Json(ResolveResponse { success: true, market: market.into() }))
}

pub async fn quote(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    params: Result<Query<QuoteParams>, QueryRejection>,
) -> Result<Json<Quote>, LedgerError> {
    let market_id = parse_market_id(&id)?;
    let Query(params) = params.map_err(|rejection| LedgerError::Validation(rejection.body_text()))?;
    Ok(Json(state.ledger.quote(market_id, params.outcome, params.amount)?))
}

// ===== BETTING ENDPOINTS =====

pub async fn place_bet(
    State(state): State<SharedState>,
    payload: Result<Json<BetRequest>, JsonRejection>,
) -> Result<Json<BetResponse>, LedgerError> {
    let request = json_body(payload)?;
    let receipt = state.ledger.place_bet(request.market_id, request.outcome, request.amount)?;
    Ok(Json(BetResponse {
        success: true,
        market: receipt.market.into(),
        balance: receipt.balance,
        shares: receipt.shares,
    }))
}

pub async fn claim_winnings(
    State(state): State<SharedState>,
    Path(market_id): Path<String>,
) -> Result<Json<ClaimResponse>, LedgerError> {
    let receipt = state.ledger.claim_winnings(parse_market_id(&market_id)?)?;
    Ok(Json(ClaimResponse { success: true, payout: receipt.payout, balance: receipt.balance }))
}

// ===== ACCOUNT ENDPOINTS =====

pub async fn get_positions(State(state): State<SharedState>) -> Json<Vec<Position>> {
    Json(state.ledger.positions())
}

pub async fn get_balance(State(state): State<SharedState>) -> Json<BalanceResponse> {
    Json(BalanceResponse { balance: state.ledger.balance() })
}

pub async fn health_check() -> &'static str {
    "Predictum Ledger - Online ✅"
}
