// Market generators used by the lifecycle scheduler and start-up seeding.

pub mod price_feed;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;

use crate::models::NewMarket;

pub use price_feed::PriceFeedGenerator;

#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error("price feed request failed: {0}")]
    FeedUnavailable(#[from] reqwest::Error),

    #[error("price feed returned status {status}: {body}")]
    FeedRejected { status: u16, body: String },

    #[error("price feed returned no coins")]
    EmptyFeed,
}

/// Source of new markets for the scheduler
#[async_trait]
pub trait MarketGenerator: Send + Sync {
    async fn next_market(&self, now: DateTime<Utc>) -> Result<NewMarket, GeneratorError>;
}

// ============================================================================
// TEMPLATE GENERATOR
// ============================================================================

/// Seeded pools are drawn from this range on each side
pub const TEMPLATE_POOL_MIN: u32 = 500;
pub const TEMPLATE_POOL_MAX: u32 = 4500;

struct Template {
    question: &'static str,
    category: &'static str,
    hours: i64,
}

const fn template(question: &'static str, category: &'static str, hours: i64) -> Template {
    Template { question, category, hours }
}

const DAY: i64 = 24;

static TEMPLATES: &[Template] = &[
    // Crypto
    template("Will Bitcoin price be above $95,000 in 24 hours?", "Crypto", DAY),
    template("Will Bitcoin dominance exceed 60% this month?", "Crypto", 30 * DAY),
    template("Will Bitcoin ETF inflows exceed $1B this week?", "Crypto", 7 * DAY),
    template("Will Bitcoin break $120,000 this quarter?", "Crypto", 90 * DAY),
    template("Will Ethereum surpass $6,000 by end of this week?", "Crypto", 7 * DAY),
    template("Will Ethereum gas fees drop below 20 gwei today?", "Crypto", 12),
    template("Will Ethereum staking exceed 40M ETH in the next 60 days?", "Crypto", 60 * DAY),
    template("Will Solana reach $250 in the next 30 days?", "Crypto", 30 * DAY),
    template("Will Cardano reach $2 this quarter?", "Crypto", 90 * DAY),
    template("Will Dogecoin reach $1 in the next 60 days?", "Crypto", 60 * DAY),
    template("Will Polygon (MATIC) reach $3 in next 60 days?", "Crypto", 60 * DAY),
    template("Will Avalanche (AVAX) surpass $100 this quarter?", "Crypto", 90 * DAY),
    template("Will Chainlink (LINK) reach $50 in the next 90 days?", "Crypto", 90 * DAY),
    // Sports
    template("Will Real Madrid win their next La Liga match?", "Sports", 3 * DAY),
    template("Will Manchester City top the Premier League table this month?", "Sports", 30 * DAY),
    template("Will Barcelona advance to the Champions League semifinals?", "Sports", 60 * DAY),
    template("Will Liverpool win their next 3 matches?", "Sports", 14 * DAY),
    template("Will PSG win their next Ligue 1 match?", "Sports", 5 * DAY),
    template("Will any team score 3+ goals in today's matches?", "Sports", 18),
    template("Will Bayern Munich keep a clean sheet this weekend?", "Sports", 3 * DAY),
    template("Will Lakers win their next home game?", "Sports", 4 * DAY),
    template("Will Warriors win their next home game?", "Sports", 5 * DAY),
    template("Will Celtics win 5 games in a row this month?", "Sports", 30 * DAY),
    template("Will any player score 50+ points this week?", "Sports", 7 * DAY),
    template("Will Patriots win their next NFL game?", "Sports", 5 * DAY),
    template("Will Chiefs win their next NFL game?", "Sports", 5 * DAY),
    // Binary
    template("Will Fed raise interest rates in next meeting?", "Binary", 45 * DAY),
    template("Will S&P 500 close at a record high this week?", "Binary", 7 * DAY),
    template("Will unemployment rate drop below 3.5% this quarter?", "Binary", 90 * DAY),
    template("Will Apple announce new product in next 30 days?", "Binary", 30 * DAY),
    template("Will Tesla stock reach $300 by end of month?", "Binary", 30 * DAY),
    template("Will oil prices exceed $100/barrel this week?", "Binary", 7 * DAY),
    template("Will gold price reach $2500/oz in next 60 days?", "Binary", 60 * DAY),
];

/// Picks a static question template with random seeded pools
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateGenerator;

impl TemplateGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn generate(&self, now: DateTime<Utc>) -> NewMarket {
        self.generate_with(&mut rand::thread_rng(), now)
    }

    pub fn generate_with<R: Rng + ?Sized>(&self, rng: &mut R, now: DateTime<Utc>) -> NewMarket {
        // TEMPLATES is a non-empty static
        let picked = TEMPLATES.choose(rng).unwrap_or(&TEMPLATES[0]);
        let yes_pool = rng.gen_range(TEMPLATE_POOL_MIN..TEMPLATE_POOL_MAX) as f64;
        let no_pool = rng.gen_range(TEMPLATE_POOL_MIN..TEMPLATE_POOL_MAX) as f64;

        NewMarket::new(picked.question, picked.category, now + Duration::hours(picked.hours))
            .with_pools(yes_pool, no_pool)
    }
}

#[async_trait]
impl MarketGenerator for TemplateGenerator {
    async fn next_market(&self, now: DateTime<Utc>) -> Result<NewMarket, GeneratorError> {
        Ok(self.generate(now))
    }
}

// ============================================================================
// DEMO SEED
// ============================================================================

/// Markets inserted into an empty ledger at start-up
pub fn demo_markets(now: DateTime<Utc>) -> Vec<NewMarket> {
    vec![
        NewMarket::new(
            "Will Manchester United beat Arsenal in the Premier League match?",
            "Sports",
            now + Duration::days(3),
        )
        .with_pools(1250.0, 850.0),
        NewMarket::new("Will Bitcoin reach $100,000 by the end of the month?", "Crypto", now + Duration::days(30))
            .with_pools(3400.0, 2100.0),
        NewMarket::new("Will Lakers win the NBA Championship this season?", "Sports", now + Duration::days(120))
            .with_pools(890.0, 1560.0),
        NewMarket::new("Will Ethereum price be above $5,000 by next week?", "Crypto", now + Duration::days(7))
            .with_pools(2200.0, 1800.0),
        NewMarket::new("Will Real Madrid advance to Champions League Final?", "Sports", now + Duration::hours(2))
            .with_pools(1800.0, 900.0),
        NewMarket::new("Will the Fed cut interest rates at the next meeting?", "Binary", now + Duration::days(45))
            .with_pools(1500.0, 2500.0),
    ]
}
