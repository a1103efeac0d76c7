/// Market Store - authoritative holder of markets, positions and the balance
///
/// All state lives behind one `RwLock`. Readers share it; every mutation runs
/// inside [`MarketStore::transact`], which holds the write lock for the whole
/// read-modify-write:
///
/// 1. the closure reads and stages changes on a [`LedgerTx`]
/// 2. staged records are committed to [`LedgerStorage`]
/// 3. only then are they applied in memory
///
/// An error at any step leaves both memory and storage untouched, and two
/// transactions never observe each other half-applied.
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::LedgerError;
use crate::models::{Market, MarketStatus, Position};
use crate::storage::{Changeset, LedgerSnapshot, LedgerStorage};

// ============================================================================
// LEDGER STATE
// ============================================================================

/// Committed ledger contents
#[derive(Debug, Clone, Default)]
pub struct LedgerState {
    markets: BTreeMap<u64, Market>,
    positions: BTreeMap<u64, Position>,
    balance: f64,
    next_market_id: u64,
}

impl LedgerState {
    fn from_snapshot(snapshot: LedgerSnapshot) -> Self {
        let markets: BTreeMap<u64, Market> =
            snapshot.markets.into_iter().map(|m| (m.id, m)).collect();
        let next_market_id = markets.keys().next_back().map_or(1, |id| id + 1);
        Self {
            markets,
            positions: snapshot.positions.into_iter().map(|p| (p.market_id, p)).collect(),
            balance: snapshot.balance,
            next_market_id,
        }
    }

    pub fn market(&self, id: u64) -> Option<&Market> {
        self.markets.get(&id)
    }

    pub fn markets(&self) -> impl Iterator<Item = &Market> {
        self.markets.values()
    }

    pub fn position(&self, market_id: u64) -> Option<&Position> {
        self.positions.get(&market_id)
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    /// Active markets whose end time has passed
    pub fn lockable(&self, now: DateTime<Utc>) -> Vec<u64> {
        self.markets
            .values()
            .filter(|m| m.status == MarketStatus::Active && m.is_expired(now))
            .map(|m| m.id)
            .collect()
    }

    /// Active or Locked markets whose end time has passed
    pub fn expired_open(&self, now: DateTime<Utc>) -> Vec<u64> {
        self.markets
            .values()
            .filter(|m| m.status.is_open() && m.is_expired(now))
            .map(|m| m.id)
            .collect()
    }

    fn apply(&mut self, staged: Staged) {
        for (id, market) in staged.markets {
            self.markets.insert(id, market);
        }
        for (id, position) in staged.positions {
            self.positions.insert(id, position);
        }
        if let Some(balance) = staged.balance {
            self.balance = balance;
        }
        self.next_market_id = staged.next_market_id;
    }
}

// ============================================================================
// TRANSACTION
// ============================================================================

#[derive(Debug, Default)]
struct Staged {
    markets: BTreeMap<u64, Market>,
    positions: BTreeMap<u64, Position>,
    balance: Option<f64>,
    next_market_id: u64,
}

impl Staged {
    fn changeset(&self) -> Changeset {
        Changeset {
            markets: self.markets.values().cloned().collect(),
            positions: self.positions.values().cloned().collect(),
            balance: self.balance,
        }
    }
}

/// Staged view of the ledger inside one write transaction.
///
/// Reads see staged changes first, then committed state.
pub struct LedgerTx<'a> {
    base: &'a LedgerState,
    staged: Staged,
}

impl<'a> LedgerTx<'a> {
    fn new(base: &'a LedgerState) -> Self {
        Self {
            base,
            staged: Staged { next_market_id: base.next_market_id, ..Staged::default() },
        }
    }

    /// Committed state, without this transaction's changes
    pub fn committed(&self) -> &LedgerState {
        self.base
    }

    pub fn market(&self, id: u64) -> Option<Market> {
        self.staged.markets.get(&id).or_else(|| self.base.market(id)).cloned()
    }

    pub fn put_market(&mut self, market: Market) {
        self.staged.markets.insert(market.id, market);
    }

    pub fn position(&self, market_id: u64) -> Option<Position> {
        self.staged
            .positions
            .get(&market_id)
            .or_else(|| self.base.position(market_id))
            .cloned()
    }

    pub fn put_position(&mut self, position: Position) {
        self.staged.positions.insert(position.market_id, position);
    }

    pub fn balance(&self) -> f64 {
        self.staged.balance.unwrap_or(self.base.balance)
    }

    pub fn set_balance(&mut self, balance: f64) {
        self.staged.balance = Some(balance);
    }

    pub fn allocate_market_id(&mut self) -> u64 {
        let id = self.staged.next_market_id;
        self.staged.next_market_id += 1;
        id
    }
}

// ============================================================================
// MARKET STORE
// ============================================================================

pub struct MarketStore {
    state: RwLock<LedgerState>,
    storage: Arc<dyn LedgerStorage>,
}

impl MarketStore {
    /// Open the store over `storage`, creating a fresh ledger funded with
    /// `initial_balance` if nothing has been persisted yet.
    pub fn open(storage: Arc<dyn LedgerStorage>, initial_balance: f64) -> Result<Self, LedgerError> {
        let state = match storage.load()? {
            Some(snapshot) => {
                tracing::info!(
                    markets = snapshot.markets.len(),
                    positions = snapshot.positions.len(),
                    balance = snapshot.balance,
                    "📒 Loaded persisted ledger"
                );
                LedgerState::from_snapshot(snapshot)
            }
            None => {
                storage.commit(&Changeset { balance: Some(initial_balance), ..Changeset::default() })?;
                tracing::info!(balance = initial_balance, "📒 Started fresh ledger");
                LedgerState { balance: initial_balance, next_market_id: 1, ..LedgerState::default() }
            }
        };

        Ok(Self { state: RwLock::new(state), storage })
    }

    /// Run `f` under the shared lock
    pub fn read<R>(&self, f: impl FnOnce(&LedgerState) -> R) -> R {
        f(&self.state.read())
    }

    /// Run `f` as one serialisable unit of work under the exclusive lock
    pub fn transact<R>(
        &self,
        f: impl FnOnce(&mut LedgerTx<'_>) -> Result<R, LedgerError>,
    ) -> Result<R, LedgerError> {
        let mut state = self.state.write();

        let (result, staged) = {
            let mut tx = LedgerTx::new(&state);
            let result = f(&mut tx)?;
            (result, tx.staged)
        };

        let changes = staged.changeset();
        if !changes.is_empty() {
            self.storage.commit(&changes)?;
        }
        state.apply(staged);
        Ok(result)
    }
}
