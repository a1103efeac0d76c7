// Ledger Service - the operations consumed by the HTTP layer and the scheduler
//
// Each mutating operation is a single MarketStore transaction; relay events
// are dispatched only after that transaction has committed.

use chrono::{DateTime, Utc};

use crate::error::LedgerError;
use crate::ledger::MarketStore;
use crate::market_resolve::listing::{self, MarketPage, MarketQuery};
use crate::market_resolve::{pricing, settlement};
use crate::models::{
    BetReceipt, ClaimReceipt, Market, MarketStatus, NewMarket, Outcome, Position, Quote,
};
use crate::relay::{RelayEvent, RelayHandle};

pub struct LedgerService {
    store: MarketStore,
    relay: RelayHandle,
}

impl LedgerService {
    pub fn new(store: MarketStore, relay: RelayHandle) -> Self {
        Self { store, relay }
    }

    // ========================================================================
    // READS
    // ========================================================================

    pub fn list_markets(&self, query: &MarketQuery) -> Result<MarketPage, LedgerError> {
        self.list_markets_at(query, Utc::now())
    }

    /// Listing as seen at `now`; expired Active markets are locked first
    pub fn list_markets_at(
        &self,
        query: &MarketQuery,
        now: DateTime<Utc>,
    ) -> Result<MarketPage, LedgerError> {
        self.lock_expired(now)?;
        let markets: Vec<Market> = self.store.read(|s| s.markets().cloned().collect());
        Ok(listing::select(markets, query))
    }

    pub fn get_market(&self, id: u64) -> Result<Market, LedgerError> {
        self.get_market_at(id, Utc::now())
    }

    pub fn get_market_at(&self, id: u64, now: DateTime<Utc>) -> Result<Market, LedgerError> {
        let market = self
            .store
            .read(|s| s.market(id).cloned())
            .ok_or(LedgerError::MarketNotFound(id))?;

        if market.status == MarketStatus::Active && market.is_expired(now) {
            self.lock_expired(now)?;
            return self
                .store
                .read(|s| s.market(id).cloned())
                .ok_or(LedgerError::MarketNotFound(id));
        }
        Ok(market)
    }

    pub fn positions(&self) -> Vec<Position> {
        self.store.read(|s| s.positions().cloned().collect())
    }

    pub fn balance(&self) -> f64 {
        self.store.read(|s| s.balance())
    }

    pub fn market_count(&self) -> usize {
        self.store.read(|s| s.markets().count())
    }

    /// Markets the scheduler should resolve: Active or Locked, past end time
    pub fn expired_open_markets(&self, now: DateTime<Utc>) -> Vec<Market> {
        self.store.read(|s| {
            s.expired_open(now)
                .into_iter()
                .filter_map(|id| s.market(id).cloned())
                .collect()
        })
    }

    /// Shares and potential payout for a prospective bet
    pub fn quote(&self, market_id: u64, outcome: Outcome, amount: f64) -> Result<Quote, LedgerError> {
        validate_amount(amount)?;
        let market = self
            .store
            .read(|s| s.market(market_id).cloned())
            .ok_or(LedgerError::MarketNotFound(market_id))?;

        let (pool, total_shares) = market.side(outcome);
        let shares = pricing::shares_for_stake(pool, total_shares, amount)?;
        let potential_payout = (market.total_pool() + amount) * amount / (pool + amount);

        Ok(Quote { market_id, outcome, amount, shares, potential_payout })
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    /// Advisory Active → Locked for every expired market. Idempotent.
    fn lock_expired(&self, now: DateTime<Utc>) -> Result<(), LedgerError> {
        if self.store.read(|s| s.lockable(now)).is_empty() {
            return Ok(());
        }

        let locked = self.store.transact(|tx| {
            let ids = tx.committed().lockable(now);
            for id in &ids {
                if let Some(mut market) = tx.market(*id) {
                    market.status = MarketStatus::Locked;
                    tx.put_market(market);
                }
            }
            Ok(ids)
        })?;

        if !locked.is_empty() {
            tracing::info!(markets = ?locked, "🔒 Locked expired markets");
        }
        Ok(())
    }

    pub fn create_market(&self, new_market: NewMarket) -> Result<Market, LedgerError> {
        let question = new_market.question.trim().to_string();
        if question.is_empty() {
            return Err(LedgerError::Validation("question must not be empty".into()));
        }
        for pool in [new_market.yes_pool, new_market.no_pool] {
            if !pool.is_finite() || pool < 0.0 {
                return Err(LedgerError::Validation(format!("invalid seed pool {}", pool)));
            }
        }

        let market = self.store.transact(|tx| {
            let market = Market {
                id: tx.allocate_market_id(),
                question,
                category: new_market.category.trim().to_string(),
                status: MarketStatus::Active,
                end_time: new_market.end_time,
                yes_pool: new_market.yes_pool,
                no_pool: new_market.no_pool,
                total_yes_shares: pricing::seeded_shares(new_market.yes_pool),
                total_no_shares: pricing::seeded_shares(new_market.no_pool),
                winning_outcome: None,
                created_at: Utc::now(),
            };
            tx.put_market(market.clone());
            Ok(market)
        })?;

        tracing::info!(
            market_id = market.id,
            question = %market.question,
            category = %market.category,
            end_time = %market.end_time,
            "📊 Market created"
        );
        self.relay.dispatch(RelayEvent::MarketCreated {
            question: market.question.clone(),
            category: market.category.clone(),
            end_time: market.end_time,
        });
        Ok(market)
    }

    pub fn place_bet(&self, market_id: u64, outcome: Outcome, amount: f64) -> Result<BetReceipt, LedgerError> {
        validate_amount(amount)?;

        let receipt = self.store.transact(|tx| {
            let mut market = tx.market(market_id).ok_or(LedgerError::MarketNotFound(market_id))?;
            if !market.status.accepts_bets() {
                return Err(LedgerError::InvalidState(format!(
                    "market {} is {}, not accepting bets",
                    market_id, market.status
                )));
            }

            let balance = tx.balance();
            if amount > balance {
                return Err(LedgerError::InsufficientFunds { balance, requested: amount });
            }

            let (pool, total_shares) = market.side(outcome);
            let shares = pricing::shares_for_stake(pool, total_shares, amount)?;
            market.credit_side(outcome, amount, shares);

            let mut position = tx.position(market_id).unwrap_or_else(|| Position::new(market_id));
            position.record(outcome, amount, shares);

            tx.put_market(market.clone());
            tx.put_position(position.clone());
            tx.set_balance(balance - amount);

            Ok(BetReceipt { market, position, shares, balance: balance - amount })
        })?;

        tracing::info!(
            market_id,
            %outcome,
            amount,
            shares = receipt.shares,
            balance = receipt.balance,
            "🎯 Bet placed"
        );
        self.relay.dispatch(RelayEvent::BetPlaced { market_id, outcome, amount });
        Ok(receipt)
    }

    /// Set the winning outcome. A market resolves exactly once.
    pub fn resolve_market(&self, market_id: u64, outcome: Outcome) -> Result<Market, LedgerError> {
        let market = self.store.transact(|tx| {
            let mut market = tx.market(market_id).ok_or(LedgerError::MarketNotFound(market_id))?;
            if market.status.is_terminal() {
                return Err(LedgerError::InvalidState(format!(
                    "market {} is already {}",
                    market_id, market.status
                )));
            }

            market.status = MarketStatus::Resolved;
            market.winning_outcome = Some(outcome);
            tx.put_market(market.clone());
            Ok(market)
        })?;

        tracing::info!(market_id, %outcome, total_pool = market.total_pool(), "✅ Market resolved");
        self.relay.dispatch(RelayEvent::MarketResolved { market_id, outcome });
        Ok(market)
    }

    pub fn claim_winnings(&self, market_id: u64) -> Result<ClaimReceipt, LedgerError> {
        let receipt = self.store.transact(|tx| {
            let market = tx.market(market_id).ok_or(LedgerError::MarketNotFound(market_id))?;
            let mut position = tx.position(market_id).ok_or(LedgerError::PositionNotFound(market_id))?;

            if market.status != MarketStatus::Resolved {
                return Err(LedgerError::InvalidState(format!(
                    "market {} is {}, not resolved",
                    market_id, market.status
                )));
            }
            if position.claimed {
                return Err(LedgerError::AlreadyClaimed(market_id));
            }

            let payout = settlement::payout(&market, &position);
            if payout <= 0.0 {
                return Err(LedgerError::NoWinnings(market_id));
            }

            position.claimed = true;
            let balance = tx.balance() + payout;
            tx.put_position(position);
            tx.set_balance(balance);

            Ok(ClaimReceipt { payout, balance })
        })?;

        tracing::info!(market_id, payout = receipt.payout, balance = receipt.balance, "💰 Winnings claimed");
        Ok(receipt)
    }
}

fn validate_amount(amount: f64) -> Result<(), LedgerError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(LedgerError::Validation(format!("amount must be positive, got {}", amount)));
    }
    Ok(())
}
