// Application state: builds the store, relay and ledger service from config

use chrono::Utc;
use std::sync::Arc;

use crate::config::Config;
use crate::error::LedgerError;
use crate::generator::{demo_markets, MarketGenerator, PriceFeedGenerator, TemplateGenerator};
use crate::ledger::MarketStore;
use crate::relay::{spawn_relay_worker, HttpRelay, RelayHandle};
use crate::service::LedgerService;
use crate::storage::{LedgerStorage, MemoryStorage, SledStorage};

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub ledger: Arc<LedgerService>,
    sled: Option<Arc<SledStorage>>,
}

impl AppState {
    /// Open storage, start the relay worker and seed an empty ledger.
    ///
    /// Must be called inside a tokio runtime.
    pub fn from_config(config: &Config) -> Result<Self, LedgerError> {
        tracing::info!("🚀 Initializing Predictum ledger...");

        let (storage, sled) = match &config.data_dir {
            Some(dir) => {
                let sled = Arc::new(SledStorage::open(dir)?);
                tracing::info!(path = %dir.display(), "💾 Using sled storage");
                (sled.clone() as Arc<dyn LedgerStorage>, Some(sled))
            }
            None => {
                tracing::info!("💾 Using in-memory storage (DATA_DIR not set)");
                (Arc::new(MemoryStorage::new()) as Arc<dyn LedgerStorage>, None)
            }
        };

        let relay = HttpRelay::new(config.relay_url.clone());
        relay.log_status();
        let (relay_handle, _worker) = spawn_relay_worker(Arc::new(relay));

        let store = MarketStore::open(storage, config.initial_balance)?;
        let state = Self {
            ledger: Arc::new(LedgerService::new(store, relay_handle)),
            sled,
        };

        if config.seed_markets {
            state.seed_demo_markets()?;
        }
        Ok(state)
    }

    /// In-memory state with the relay disabled
    pub fn in_memory(initial_balance: f64) -> Result<Self, LedgerError> {
        let store = MarketStore::open(Arc::new(MemoryStorage::new()), initial_balance)?;
        Ok(Self {
            ledger: Arc::new(LedgerService::new(store, RelayHandle::disabled())),
            sled: None,
        })
    }

    /// Insert the demo markets if the ledger has none; returns how many were added
    pub fn seed_demo_markets(&self) -> Result<usize, LedgerError> {
        if self.ledger.market_count() > 0 {
            return Ok(0);
        }

        let markets = demo_markets(Utc::now());
        let count = markets.len();
        for market in markets {
            self.ledger.create_market(market)?;
        }
        tracing::info!(count, "🌱 Seeded demo markets");
        Ok(count)
    }

    /// Generator for the scheduler: live prices when a feed is configured
    pub fn market_generator(config: &Config) -> Arc<dyn MarketGenerator> {
        match &config.price_feed_url {
            Some(url) => {
                tracing::info!(%url, "📈 Generating markets from price feed");
                Arc::new(PriceFeedGenerator::new(url.clone()))
            }
            None => Arc::new(TemplateGenerator::new()),
        }
    }

    /// Flush persistent storage, if any
    pub fn flush(&self) {
        if let Some(sled) = &self.sled {
            match sled.flush() {
                Ok(()) => tracing::info!("✅ Storage flushed"),
                Err(e) => tracing::error!(error = %e, "❌ Failed to flush storage"),
            }
        }
    }
}
