// Lifecycle scheduler: periodic market generation and resolution of expired
// markets.
//
// Both timers run in one background task. Resolution goes through
// `LedgerService::resolve_market`, the same transaction an explicit
// resolve call uses, and each expired market is handled on its own so one
// failure does not stop the rest of the batch.

use chrono::{DateTime, Utc};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::generator::MarketGenerator;
use crate::models::{Market, Outcome};
use crate::service::LedgerService;

/// Decides the winner of an expired market
pub trait OutcomeResolver: Send + Sync {
    fn resolve(&self, market: &Market) -> Outcome;
}

/// Fair coin: Yes and No with equal probability
#[derive(Debug, Clone, Copy, Default)]
pub struct CoinFlipResolver;

impl OutcomeResolver for CoinFlipResolver {
    fn resolve(&self, _market: &Market) -> Outcome {
        if rand::thread_rng().gen_bool(0.5) {
            Outcome::Yes
        } else {
            Outcome::No
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub create_interval: Duration,
    pub resolve_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            create_interval: Duration::from_secs(300),
            resolve_interval: Duration::from_secs(300),
        }
    }
}

/// Outcome of one resolution pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolutionReport {
    pub resolved: Vec<(u64, Outcome)>,
    pub failed: Vec<u64>,
}

pub struct LifecycleScheduler {
    ledger: Arc<LedgerService>,
    resolver: Arc<dyn OutcomeResolver>,
    generator: Arc<dyn MarketGenerator>,
    config: SchedulerConfig,
}

impl LifecycleScheduler {
    pub fn new(
        ledger: Arc<LedgerService>,
        resolver: Arc<dyn OutcomeResolver>,
        generator: Arc<dyn MarketGenerator>,
        config: SchedulerConfig,
    ) -> Self {
        Self { ledger, resolver, generator, config }
    }

    /// Resolve every Active or Locked market whose end time is at or before `now`
    pub fn resolve_expired(&self, now: DateTime<Utc>) -> ResolutionReport {
        let expired = self.ledger.expired_open_markets(now);
        let mut report = ResolutionReport::default();
        if expired.is_empty() {
            return report;
        }

        tracing::info!(count = expired.len(), "🔍 Found expired markets to resolve");

        for market in expired {
            let outcome = self.resolver.resolve(&market);
            match self.ledger.resolve_market(market.id, outcome) {
                Ok(_) => report.resolved.push((market.id, outcome)),
                Err(e) => {
                    tracing::error!(market_id = market.id, error = %e, "❌ Failed to resolve market");
                    report.failed.push(market.id);
                }
            }
        }
        report
    }

    /// Ask the generator for a market and create it
    pub async fn generate_market(&self) -> Option<Market> {
        let new_market = match self.generator.next_market(Utc::now()).await {
            Ok(new_market) => new_market,
            Err(e) => {
                tracing::warn!(error = %e, "⚠️  Market generator failed");
                return None;
            }
        };

        match self.ledger.create_market(new_market) {
            Ok(market) => Some(market),
            Err(e) => {
                tracing::error!(error = %e, "❌ Failed to create generated market");
                None
            }
        }
    }

    /// Spawn the background loop
    pub fn start(self) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tracing::info!(
            create_every_secs = self.config.create_interval.as_secs(),
            resolve_every_secs = self.config.resolve_interval.as_secs(),
            "🔮 Lifecycle scheduler started"
        );
        let task = tokio::spawn(self.run(shutdown_rx));
        SchedulerHandle { shutdown: shutdown_tx, task }
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut create_timer = tokio::time::interval(self.config.create_interval);
        create_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut resolve_timer = tokio::time::interval(self.config.resolve_interval);
        resolve_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // first ticks complete immediately
        create_timer.tick().await;
        resolve_timer.tick().await;

        loop {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = resolve_timer.tick() => {
                    let report = self.resolve_expired(Utc::now());
                    if !report.resolved.is_empty() || !report.failed.is_empty() {
                        tracing::info!(
                            resolved = report.resolved.len(),
                            failed = report.failed.len(),
                            "Resolution pass complete"
                        );
                    }
                }
                _ = create_timer.tick() => {
                    self.generate_market().await;
                }
            }
        }

        tracing::info!("🔮 Lifecycle scheduler stopped");
    }
}

pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signal the loop and wait for the pass in progress to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "scheduler task ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{GeneratorError, TemplateGenerator};
    use crate::ledger::MarketStore;
    use crate::models::{MarketStatus, NewMarket};
    use crate::relay::RelayHandle;
    use crate::storage::{Changeset, LedgerSnapshot, LedgerStorage, MemoryStorage, StorageError};
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;

    struct Always(Outcome);

    impl OutcomeResolver for Always {
        fn resolve(&self, _market: &Market) -> Outcome {
            self.0
        }
    }

    struct BrokenGenerator;

    #[async_trait]
    impl MarketGenerator for BrokenGenerator {
        async fn next_market(&self, _now: DateTime<Utc>) -> Result<NewMarket, GeneratorError> {
            Err(GeneratorError::EmptyFeed)
        }
    }

    /// Fails the commit that resolves one market
    struct PoisonedMarket {
        inner: MemoryStorage,
        market_id: u64,
    }

    impl LedgerStorage for PoisonedMarket {
        fn load(&self) -> Result<Option<LedgerSnapshot>, StorageError> {
            self.inner.load()
        }

        fn commit(&self, changes: &Changeset) -> Result<(), StorageError> {
            let resolves_target = changes
                .markets
                .iter()
                .any(|m| m.id == self.market_id && m.status == MarketStatus::Resolved);
            if resolves_target {
                return Err(StorageError::Unavailable("write failed".into()));
            }
            self.inner.commit(changes)
        }
    }

    fn ledger_with(storage: Arc<dyn LedgerStorage>) -> Arc<LedgerService> {
        let store = MarketStore::open(storage, 1000.0).unwrap();
        Arc::new(LedgerService::new(store, RelayHandle::disabled()))
    }

    fn scheduler(ledger: Arc<LedgerService>, generator: Arc<dyn MarketGenerator>) -> LifecycleScheduler {
        LifecycleScheduler::new(ledger, Arc::new(Always(Outcome::Yes)), generator, SchedulerConfig::default())
    }

    fn add_market(ledger: &LedgerService, ends_in: ChronoDuration) -> u64 {
        ledger
            .create_market(NewMarket::new("Q?", "Test", Utc::now() + ends_in))
            .unwrap()
            .id
    }

    #[test]
    fn test_resolves_only_expired_open_markets() {
        let ledger = ledger_with(Arc::new(MemoryStorage::new()));
        let past = add_market(&ledger, ChronoDuration::hours(-1));
        let locked = add_market(&ledger, ChronoDuration::minutes(-5));
        let future = add_market(&ledger, ChronoDuration::days(1));
        let done = add_market(&ledger, ChronoDuration::hours(-2));
        ledger.resolve_market(done, Outcome::No).unwrap();
        // a listing locks the expired ones first
        ledger.get_market(locked).unwrap();

        let report = scheduler(ledger.clone(), Arc::new(TemplateGenerator::new())).resolve_expired(Utc::now());

        assert_eq!(report.resolved, vec![(past, Outcome::Yes), (locked, Outcome::Yes)]);
        assert!(report.failed.is_empty());
        assert_eq!(ledger.get_market(future).unwrap().status, MarketStatus::Active);
        assert_eq!(ledger.get_market(done).unwrap().winning_outcome, Some(Outcome::No));
    }

    #[test]
    fn test_one_failure_does_not_abort_the_batch() {
        let ledger = ledger_with(Arc::new(PoisonedMarket { inner: MemoryStorage::new(), market_id: 1 }));
        add_market(&ledger, ChronoDuration::hours(-3));
        add_market(&ledger, ChronoDuration::hours(-2));
        add_market(&ledger, ChronoDuration::hours(-1));

        let report = scheduler(ledger.clone(), Arc::new(TemplateGenerator::new())).resolve_expired(Utc::now());

        assert_eq!(report.failed, vec![1]);
        assert_eq!(report.resolved.len(), 2);
        assert_eq!(ledger.get_market(3).unwrap().status, MarketStatus::Resolved);
        let untouched = ledger.get_market(1).unwrap();
        assert!(untouched.status.is_open());
        assert_eq!(untouched.winning_outcome, None);
    }

    #[test]
    fn test_coin_flip_produces_both_outcomes() {
        let ledger = ledger_with(Arc::new(MemoryStorage::new()));
        let id = add_market(&ledger, ChronoDuration::hours(1));
        let market = ledger.get_market(id).unwrap();

        let resolver = CoinFlipResolver;
        let outcomes: Vec<Outcome> = (0..200).map(|_| resolver.resolve(&market)).collect();
        assert!(outcomes.contains(&Outcome::Yes));
        assert!(outcomes.contains(&Outcome::No));
    }

    #[tokio::test]
    async fn test_generate_market() {
        let ledger = ledger_with(Arc::new(MemoryStorage::new()));
        let created = scheduler(ledger.clone(), Arc::new(TemplateGenerator::new()))
            .generate_market()
            .await
            .unwrap();
        assert_eq!(ledger.get_market(created.id).unwrap().question, created.question);
        assert_eq!(created.total_yes_shares, created.yes_pool * 1000.0);

        assert!(scheduler(ledger, Arc::new(BrokenGenerator)).generate_market().await.is_none());
    }

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let ledger = ledger_with(Arc::new(MemoryStorage::new()));
        let expired = add_market(&ledger, ChronoDuration::hours(-1));

        let config = SchedulerConfig {
            create_interval: Duration::from_millis(20),
            resolve_interval: Duration::from_millis(20),
        };
        let handle = LifecycleScheduler::new(
            ledger.clone(),
            Arc::new(Always(Outcome::No)),
            Arc::new(TemplateGenerator::new()),
            config,
        )
        .start();

        tokio::time::sleep(Duration::from_millis(150)).await;
        handle.shutdown().await;

        assert_eq!(ledger.get_market(expired).unwrap().winning_outcome, Some(Outcome::No));
        let count = ledger.list_markets(&Default::default()).unwrap().pagination.total;
        assert!(count > 1);

        // nothing more is created once stopped
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(ledger.list_markets(&Default::default()).unwrap().pagination.total, count);
    }
}
