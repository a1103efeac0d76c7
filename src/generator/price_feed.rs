// Price Feed Generator - crypto markets built from live CoinGecko prices
//
// Falls back to the template generator whenever the feed cannot be used.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::Client;
use serde::Deserialize;

use super::{GeneratorError, MarketGenerator, TemplateGenerator};
use crate::models::NewMarket;

pub const DEFAULT_FEED_URL: &str = "https://api.coingecko.com/api/v3";

/// Coins considered per generation, by market cap
pub const TOP_COINS: usize = 15;

const FEED_TIMEOUT_SECS: u64 = 10;

/// One row of `/coins/markets`; CoinGecko sends nulls for missing stats
#[derive(Debug, Clone, Deserialize)]
pub struct CoinPrice {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub current_price: f64,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub price_change_percentage_24h: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuestionShape {
    AboveInADay,
    ReachByNextWeek,
    BreakByMonthEnd,
    StayAboveTwoDays,
}

impl QuestionShape {
    const ALL: [QuestionShape; 4] = [
        QuestionShape::AboveInADay,
        QuestionShape::ReachByNextWeek,
        QuestionShape::BreakByMonthEnd,
        QuestionShape::StayAboveTwoDays,
    ];

    fn target(self, price: f64) -> f64 {
        match self {
            QuestionShape::AboveInADay => price * 1.05,
            QuestionShape::ReachByNextWeek => price * 1.10,
            QuestionShape::BreakByMonthEnd => price * 1.20,
            QuestionShape::StayAboveTwoDays => price * 0.95,
        }
    }

    fn duration(self) -> Duration {
        match self {
            QuestionShape::AboveInADay => Duration::hours(24),
            QuestionShape::ReachByNextWeek => Duration::days(7),
            QuestionShape::BreakByMonthEnd => Duration::days(30),
            QuestionShape::StayAboveTwoDays => Duration::hours(48),
        }
    }

    fn question(self, coin: &str, target: &str) -> String {
        match self {
            QuestionShape::AboveInADay => format!("Will {} price be above {} in 24 hours?", coin, target),
            QuestionShape::ReachByNextWeek => format!("Will {} reach {} by next week?", coin, target),
            QuestionShape::BreakByMonthEnd => format!("Will {} break {} by end of month?", coin, target),
            QuestionShape::StayAboveTwoDays => format!("Will {} stay above {} for next 48 hours?", coin, target),
        }
    }
}

/// Dollar price with precision scaled to magnitude
pub fn format_price(price: f64) -> String {
    if price >= 1000.0 {
        format!("${:.0}", price)
    } else if price >= 1.0 {
        format!("${:.2}", price)
    } else {
        format!("${:.4}", price)
    }
}

fn base_pool(market_cap: f64) -> f64 {
    if market_cap > 100_000_000_000.0 {
        3000.0
    } else if market_cap > 10_000_000_000.0 {
        2000.0
    } else {
        1000.0
    }
}

pub struct PriceFeedGenerator {
    base_url: String,
    client: Client,
    fallback: TemplateGenerator,
}

impl PriceFeedGenerator {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(FEED_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            fallback: TemplateGenerator::new(),
        }
    }

    /// Top coins by market cap
    pub async fn fetch_top_coins(&self, limit: usize) -> Result<Vec<CoinPrice>, GeneratorError> {
        let url = format!(
            "{}/coins/markets?vs_currency=usd&order=market_cap_desc&per_page={}&page=1&sparkline=false",
            self.base_url, limit
        );

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GeneratorError::FeedRejected { status: status.as_u16(), body });
        }

        let coins: Vec<CoinPrice> = response.json().await?;
        if coins.is_empty() {
            return Err(GeneratorError::EmptyFeed);
        }
        Ok(coins)
    }

    /// Build a market around one coin's current price
    pub fn market_for_coin<R: Rng + ?Sized>(rng: &mut R, coin: &CoinPrice, now: DateTime<Utc>) -> NewMarket {
        let shape = *QuestionShape::ALL.choose(rng).unwrap_or(&QuestionShape::AboveInADay);
        let target = format_price(shape.target(coin.current_price));

        let base = base_pool(coin.market_cap.unwrap_or(0.0));
        let mut yes_pool = base + rng.gen_range(0..2000) as f64;
        let mut no_pool = base + rng.gen_range(0..2000) as f64;

        match coin.price_change_percentage_24h {
            Some(change) if change > 5.0 => yes_pool *= 1.3,
            Some(change) if change < -5.0 => no_pool *= 1.3,
            _ => {}
        }

        NewMarket::new(shape.question(&coin.name, &target), "Crypto", now + shape.duration())
            .with_pools(yes_pool, no_pool)
    }

    fn pick(&self, coins: &[CoinPrice], now: DateTime<Utc>) -> Option<NewMarket> {
        let mut rng = rand::thread_rng();
        let coin = coins.choose(&mut rng)?;
        Some(Self::market_for_coin(&mut rng, coin, now))
    }
}

#[async_trait]
impl MarketGenerator for PriceFeedGenerator {
    async fn next_market(&self, now: DateTime<Utc>) -> Result<NewMarket, GeneratorError> {
        match self.fetch_top_coins(TOP_COINS).await {
            Ok(coins) => {
                for coin in &coins {
                    tracing::debug!(
                        coin = %coin.name,
                        symbol = %coin.symbol,
                        price = coin.current_price,
                        change_24h = coin.price_change_percentage_24h.unwrap_or(0.0),
                        "price feed quote"
                    );
                }
                if let Some(market) = self.pick(&coins, now) {
                    return Ok(market);
                }
                Ok(self.fallback.generate(now))
            }
            Err(e) => {
                tracing::warn!(error = %e, "⚠️  Price feed unavailable, using template market");
                Ok(self.fallback.generate(now))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn coin(price: f64, cap: f64, change: Option<f64>) -> CoinPrice {
        CoinPrice {
            id: "bitcoin".into(),
            symbol: "btc".into(),
            name: "Bitcoin".into(),
            current_price: price,
            market_cap: Some(cap),
            price_change_percentage_24h: change,
        }
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(101_234.56), "$101235");
        assert_eq!(format_price(1000.0), "$1000");
        assert_eq!(format_price(2.345), "$2.35");
        assert_eq!(format_price(1.0), "$1.00");
        assert_eq!(format_price(0.123456), "$0.1235");
    }

    #[test]
    fn test_base_pool_tiers() {
        assert_eq!(base_pool(1.5e12), 3000.0);
        assert_eq!(base_pool(5e10), 2000.0);
        assert_eq!(base_pool(1e9), 1000.0);
    }

    #[test]
    fn test_market_for_coin() {
        let mut rng = StdRng::seed_from_u64(11);
        let now = Utc::now();

        for _ in 0..100 {
            let market = PriceFeedGenerator::market_for_coin(&mut rng, &coin(95_000.0, 1.8e12, None), now);
            assert_eq!(market.category, "Crypto");
            assert!(market.question.contains("Bitcoin"));
            assert!(market.end_time > now);
            assert!((3000.0..5000.0).contains(&market.yes_pool));
            assert!((3000.0..5000.0).contains(&market.no_pool));
        }
    }

    #[test]
    fn test_trend_boosts_one_side() {
        let now = Utc::now();
        let bullish = coin(2.0, 1e9, Some(12.0));
        let bearish = coin(2.0, 1e9, Some(-8.0));

        for seed in 0..20 {
            let up = PriceFeedGenerator::market_for_coin(&mut StdRng::seed_from_u64(seed), &bullish, now);
            let down = PriceFeedGenerator::market_for_coin(&mut StdRng::seed_from_u64(seed), &bearish, now);
            // same draws, different side boosted
            assert!(up.yes_pool >= 1300.0);
            assert!((up.no_pool * 1.3 - down.no_pool).abs() < 1e-9);
            assert!((down.yes_pool * 1.3 - up.yes_pool).abs() < 1e-9);
        }
    }

    #[test]
    fn test_feed_row_with_nulls() {
        let raw = r#"[{"id":"x","symbol":"x","name":"X","current_price":0.5,
                       "market_cap":null,"price_change_percentage_24h":null,"total_volume":3}]"#;
        let coins: Vec<CoinPrice> = serde_json::from_str(raw).unwrap();
        assert_eq!(coins[0].market_cap, None);
        assert_eq!(coins[0].price_change_percentage_24h, None);
    }

    #[tokio::test]
    async fn test_unreachable_feed_falls_back_to_templates() {
        let generator = PriceFeedGenerator::new("http://127.0.0.1:1");
        let market = generator.next_market(Utc::now()).await.unwrap();
        assert!(!market.question.is_empty());
        assert!(market.yes_pool >= 500.0);
    }
}
