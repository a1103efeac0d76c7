// Persistence for the ledger's three collections.
//
// The `MarketStore` stays authoritative in memory and hands every committed
// transaction to a `LedgerStorage` as a `Changeset` before applying it. A
// failed commit aborts the transaction.

use parking_lot::Mutex;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Transactional, Tree};
use std::path::Path;
use thiserror::Error;

use crate::models::{Market, Position};

const MARKETS_TREE: &str = "markets";
const POSITIONS_TREE: &str = "positions";
const META_TREE: &str = "meta";
const BALANCE_KEY: &str = "balance";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sled::Error),

    #[error("transaction aborted: {0}")]
    Transaction(String),

    #[error("failed to encode record: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Everything persisted about the ledger
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerSnapshot {
    pub markets: Vec<Market>,
    pub positions: Vec<Position>,
    pub balance: f64,
}

/// Records touched by one committed transaction
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Changeset {
    pub markets: Vec<Market>,
    pub positions: Vec<Position>,
    pub balance: Option<f64>,
}

impl Changeset {
    pub fn is_empty(&self) -> bool {
        self.markets.is_empty() && self.positions.is_empty() && self.balance.is_none()
    }
}

/// Storage backend for markets, positions and the balance.
///
/// `commit` must apply the whole changeset or none of it.
pub trait LedgerStorage: Send + Sync {
    /// Load persisted state; `None` for a ledger that was never written.
    fn load(&self) -> Result<Option<LedgerSnapshot>, StorageError>;

    fn commit(&self, changes: &Changeset) -> Result<(), StorageError>;
}

// ============================================================================
// IN-MEMORY STORAGE
// ============================================================================

/// Keeps the last committed snapshot in memory; nothing survives a restart
#[derive(Debug, Default)]
pub struct MemoryStorage {
    snapshot: Mutex<Option<LedgerSnapshot>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: LedgerSnapshot) -> Self {
        Self { snapshot: Mutex::new(Some(snapshot)) }
    }
}

impl LedgerStorage for MemoryStorage {
    fn load(&self) -> Result<Option<LedgerSnapshot>, StorageError> {
        Ok(self.snapshot.lock().clone())
    }

    fn commit(&self, changes: &Changeset) -> Result<(), StorageError> {
        let mut guard = self.snapshot.lock();
        let snapshot = guard.get_or_insert_with(LedgerSnapshot::default);

        for market in &changes.markets {
            match snapshot.markets.iter_mut().find(|m| m.id == market.id) {
                Some(existing) => *existing = market.clone(),
                None => snapshot.markets.push(market.clone()),
            }
        }
        for position in &changes.positions {
            match snapshot.positions.iter_mut().find(|p| p.market_id == position.market_id) {
                Some(existing) => *existing = position.clone(),
                None => snapshot.positions.push(position.clone()),
            }
        }
        if let Some(balance) = changes.balance {
            snapshot.balance = balance;
        }
        Ok(())
    }
}

// ============================================================================
// SLED STORAGE
// ============================================================================

/// sled-backed storage: one tree per collection, keyed by big-endian market id
pub struct SledStorage {
    db: sled::Db,
    markets: Tree,
    positions: Tree,
    meta: Tree,
}

impl SledStorage {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        Self::from_db(sled::open(path)?)
    }

    pub fn from_db(db: sled::Db) -> Result<Self, StorageError> {
        Ok(Self {
            markets: db.open_tree(MARKETS_TREE)?,
            positions: db.open_tree(POSITIONS_TREE)?,
            meta: db.open_tree(META_TREE)?,
            db,
        })
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }

    fn encode_all<T: serde::Serialize>(
        records: &[T],
        key: impl Fn(&T) -> u64,
    ) -> Result<Vec<([u8; 8], Vec<u8>)>, StorageError> {
        records
            .iter()
            .map(|r| Ok((key(r).to_be_bytes(), serde_json::to_vec(r)?)))
            .collect()
    }
}

impl LedgerStorage for SledStorage {
    fn load(&self) -> Result<Option<LedgerSnapshot>, StorageError> {
        let balance = match self.meta.get(BALANCE_KEY)? {
            Some(raw) => serde_json::from_slice::<f64>(&raw)?,
            None => return Ok(None),
        };

        let markets = self
            .markets
            .iter()
            .values()
            .map(|raw| Ok(serde_json::from_slice::<Market>(&raw?)?))
            .collect::<Result<Vec<_>, StorageError>>()?;
        let positions = self
            .positions
            .iter()
            .values()
            .map(|raw| Ok(serde_json::from_slice::<Position>(&raw?)?))
            .collect::<Result<Vec<_>, StorageError>>()?;

        Ok(Some(LedgerSnapshot { markets, positions, balance }))
    }

    fn commit(&self, changes: &Changeset) -> Result<(), StorageError> {
        if changes.is_empty() {
            return Ok(());
        }

        // Encode outside the transaction closure, which sled may retry
        let markets = Self::encode_all(&changes.markets, |m| m.id)?;
        let positions = Self::encode_all(&changes.positions, |p| p.market_id)?;
        let balance = changes.balance.map(|b| serde_json::to_vec(&b)).transpose()?;

        (&self.markets, &self.positions, &self.meta)
            .transaction(|(market_tree, position_tree, meta_tree)| {
                for (key, value) in &markets {
                    market_tree.insert(&key[..], value.as_slice())?;
                }
                for (key, value) in &positions {
                    position_tree.insert(&key[..], value.as_slice())?;
                }
                if let Some(value) = &balance {
                    meta_tree.insert(BALANCE_KEY, value.as_slice())?;
                }
                Ok::<(), ConflictableTransactionError<()>>(())
            })
            .map_err(|e: TransactionError<()>| match e {
                TransactionError::Storage(inner) => StorageError::Database(inner),
                TransactionError::Abort(()) => StorageError::Transaction("aborted".into()),
            })?;

        Ok(())
    }
}
