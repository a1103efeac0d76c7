// Data models for the Predictum prediction market ledger

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::LedgerError;

// ============================================================================
// OUTCOME & STATUS
// ============================================================================

/// One side of a binary market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Yes,
    No,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Yes => "Yes",
            Outcome::No => "No",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Outcome {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Yes" | "yes" | "YES" => Ok(Outcome::Yes),
            "No" | "no" | "NO" => Ok(Outcome::No),
            other => Err(LedgerError::Validation(format!("invalid outcome '{}'", other))),
        }
    }
}

/// Market lifecycle status
///
/// Flow: Active → Locked → Resolved
///          └──────────────↗
///
/// `Cancelled` is declared for wire compatibility; nothing transitions into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarketStatus {
    Active,
    Locked,
    Resolved,
    Cancelled,
}

impl MarketStatus {
    /// Bets are only accepted while Active
    pub fn accepts_bets(&self) -> bool {
        matches!(self, MarketStatus::Active)
    }

    /// Active or Locked: still waiting for a winner
    pub fn is_open(&self) -> bool {
        matches!(self, MarketStatus::Active | MarketStatus::Locked)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, MarketStatus::Resolved | MarketStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MarketStatus::Active => "Active",
            MarketStatus::Locked => "Locked",
            MarketStatus::Resolved => "Resolved",
            MarketStatus::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for MarketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MarketStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Active" => Ok(MarketStatus::Active),
            "Locked" => Ok(MarketStatus::Locked),
            "Resolved" => Ok(MarketStatus::Resolved),
            "Cancelled" => Ok(MarketStatus::Cancelled),
            other => Err(LedgerError::Validation(format!("invalid status '{}'", other))),
        }
    }
}

// ============================================================================
// MARKET
// ============================================================================

/// Binary prediction market
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Market {
    pub id: u64,
    pub question: String,
    pub category: String,
    pub status: MarketStatus,
    pub end_time: DateTime<Utc>,
    pub yes_pool: f64,
    pub no_pool: f64,
    pub total_yes_shares: f64,
    pub total_no_shares: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winning_outcome: Option<Outcome>,
    pub created_at: DateTime<Utc>,
}

impl Market {
    pub fn total_pool(&self) -> f64 {
        self.yes_pool + self.no_pool
    }

    /// (pool, total shares) for one side
    pub fn side(&self, outcome: Outcome) -> (f64, f64) {
        match outcome {
            Outcome::Yes => (self.yes_pool, self.total_yes_shares),
            Outcome::No => (self.no_pool, self.total_no_shares),
        }
    }

    /// Add a stake and its shares to one side
    pub fn credit_side(&mut self, outcome: Outcome, stake: f64, shares: f64) {
        match outcome {
            Outcome::Yes => {
                self.yes_pool += stake;
                self.total_yes_shares += shares;
            }
            Outcome::No => {
                self.no_pool += stake;
                self.total_no_shares += shares;
            }
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.end_time <= now
    }

    /// Implied odds from pool shares; even when nothing has been staked
    pub fn odds(&self) -> Odds {
        let total = self.total_pool();
        if total <= 0.0 {
            return Odds { yes_odds: 0.5, no_odds: 0.5 };
        }
        Odds {
            yes_odds: self.yes_pool / total,
            no_odds: self.no_pool / total,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Odds {
    pub yes_odds: f64,
    pub no_odds: f64,
}

/// Market as returned over the API, with odds attached
#[derive(Debug, Clone, Serialize)]
pub struct MarketView {
    #[serde(flatten)]
    pub market: Market,
    pub odds: Odds,
}

impl From<Market> for MarketView {
    fn from(market: Market) -> Self {
        let odds = market.odds();
        Self { market, odds }
    }
}

/// Input for market creation, from the API or a generator
#[derive(Debug, Clone, PartialEq)]
pub struct NewMarket {
    pub question: String,
    pub category: String,
    pub end_time: DateTime<Utc>,
    pub yes_pool: f64,
    pub no_pool: f64,
}

impl NewMarket {
    pub fn new(question: impl Into<String>, category: impl Into<String>, end_time: DateTime<Utc>) -> Self {
        Self {
            question: question.into(),
            category: category.into(),
            end_time,
            yes_pool: 0.0,
            no_pool: 0.0,
        }
    }

    pub fn with_pools(mut self, yes_pool: f64, no_pool: f64) -> Self {
        self.yes_pool = yes_pool;
        self.no_pool = no_pool;
        self
    }
}

// ============================================================================
// POSITION
// ============================================================================

/// The user's accumulated stake in one market
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub market_id: u64,
    pub yes_shares: f64,
    pub no_shares: f64,
    pub yes_amount: f64,
    pub no_amount: f64,
    pub claimed: bool,
}

impl Position {
    pub fn new(market_id: u64) -> Self {
        Self {
            market_id,
            yes_shares: 0.0,
            no_shares: 0.0,
            yes_amount: 0.0,
            no_amount: 0.0,
            claimed: false,
        }
    }

    pub fn record(&mut self, outcome: Outcome, stake: f64, shares: f64) {
        match outcome {
            Outcome::Yes => {
                self.yes_shares += shares;
                self.yes_amount += stake;
            }
            Outcome::No => {
                self.no_shares += shares;
                self.no_amount += stake;
            }
        }
    }

    pub fn shares(&self, outcome: Outcome) -> f64 {
        match outcome {
            Outcome::Yes => self.yes_shares,
            Outcome::No => self.no_shares,
        }
    }
}

// ============================================================================
// OPERATION RESULTS
// ============================================================================

#[derive(Debug, Clone)]
pub struct BetReceipt {
    pub market: Market,
    pub position: Position,
    pub shares: f64,
    pub balance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClaimReceipt {
    pub payout: f64,
    pub balance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub market_id: u64,
    pub outcome: Outcome,
    pub amount: f64,
    pub shares: f64,
    pub potential_payout: f64,
}

// ============================================================================
// REQUEST/RESPONSE STRUCTS
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BetRequest {
    pub market_id: u64,
    pub outcome: Outcome,
    pub amount: f64,
}

#[derive(Debug, Serialize)]
pub struct BetResponse {
    pub success: bool,
    pub market: MarketView,
    pub balance: f64,
    pub shares: f64,
}

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub outcome: Outcome,
}

#[derive(Debug, Serialize)]
pub struct ResolveResponse {
    pub success: bool,
    pub market: MarketView,
}

#[derive(Debug, Serialize)]
pub struct ClaimResponse {
    pub success: bool,
    pub payout: f64,
    pub balance: f64,
}

/// POST /api/markets request body
///
/// ```json
/// {
///   "question": "Will Bitcoin reach $150,000 by June?",
///   "category": "Crypto",
///   "endTime": "2026-06-30T23:59:59Z"
/// }
/// ```
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMarketRequest {
    pub question: String,
    #[serde(default)]
    pub category: String,
    pub end_time: String,
}

impl CreateMarketRequest {
    /// Validate the payload and parse the RFC 3339 end time
    pub fn into_new_market(self) -> Result<NewMarket, LedgerError> {
        let end_time = DateTime::parse_from_rfc3339(self.end_time.trim())
            .map_err(|_| LedgerError::Validation("invalid end time format".into()))?
            .with_timezone(&Utc);
        Ok(NewMarket::new(self.question, self.category, end_time))
    }
}

/// GET /api/markets query string; every field is optional and lenient
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketListParams {
    pub status: Option<String>,
    pub category: Option<String>,
    pub sort_by: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct QuoteParams {
    pub outcome: Outcome,
    pub amount: f64,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub balance: f64,
}
