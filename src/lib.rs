/// Predictum - binary prediction market ledger and settlement engine
/// Exports all modules for use as a library crate

pub mod app_state;
pub mod config;
pub mod error;
pub mod generator;
pub mod handlers;
pub mod ledger;
pub mod market_resolve;
pub mod models;
pub mod relay;
pub mod routes;
pub mod scheduler;
pub mod service;
pub mod storage;

pub use app_state::{AppState, SharedState};
pub use config::{Config, ConfigError, LogFormat, LoggingConfig};
pub use error::{ErrorKind, LedgerError};
pub use generator::{MarketGenerator, PriceFeedGenerator, TemplateGenerator};
pub use ledger::MarketStore;
pub use market_resolve::{MarketPage, MarketQuery, SortOrder};
pub use models::{Market, MarketStatus, NewMarket, Outcome, Position};
pub use relay::{ChainRelay, HttpRelay, RelayEvent, RelayHandle};
pub use scheduler::{CoinFlipResolver, LifecycleScheduler, OutcomeResolver, SchedulerConfig, SchedulerHandle};
pub use service::LedgerService;
pub use storage::{LedgerStorage, MemoryStorage, SledStorage, StorageError};
