use crate::models::{Market, Outcome, Position};

/// Payout owed to `position` in a resolved market.
///
/// Winners split the combined pool pro rata by shares on the winning side,
/// rounded down to whole tokens. Anything else pays zero, including a market
/// without a winning outcome.
pub fn payout(market: &Market, position: &Position) -> f64 {
    let Some(winner) = market.winning_outcome else {
        return 0.0;
    };

    let held = position.shares(winner);
    let outstanding = match winner {
        Outcome::Yes => market.total_yes_shares,
        Outcome::No => market.total_no_shares,
    };
    if held <= 0.0 || outstanding <= 0.0 {
        return 0.0;
    }

    (market.total_pool() * held / outstanding).floor()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MarketStatus;
    use chrono::Utc;

    fn resolved(winner: Outcome, yes_pool: f64, no_pool: f64) -> Market {
        Market {
            id: 1,
            question: "Q?".into(),
            category: "Test".into(),
            status: MarketStatus::Resolved,
            end_time: Utc::now(),
            yes_pool,
            no_pool,
            total_yes_shares: yes_pool * 1000.0,
            total_no_shares: no_pool * 1000.0,
            winning_outcome: Some(winner),
            created_at: Utc::now(),
        }
    }

    fn position(yes_shares: f64, no_shares: f64) -> Position {
        Position {
            yes_shares,
            no_shares,
            yes_amount: yes_shares / 1000.0,
            no_amount: no_shares / 1000.0,
            ..Position::new(1)
        }
    }

    #[test]
    fn test_sole_winner_takes_pool() {
        let market = resolved(Outcome::Yes, 100.0, 0.0);
        assert_eq!(payout(&market, &position(100_000.0, 0.0)), 100.0);
    }

    #[test]
    fn test_winner_share_of_both_pools() {
        // 50 of 200 Yes tokens, pool total 300 → 75
        let market = resolved(Outcome::Yes, 200.0, 100.0);
        assert_eq!(payout(&market, &position(50_000.0, 0.0)), 75.0);
    }

    #[test]
    fn test_no_side_wins() {
        let market = resolved(Outcome::No, 1500.0, 2500.0);
        // 80 / 2500 × 4000 = 128
        assert_eq!(payout(&market, &position(0.0, 80_000.0)), 128.0);
    }

    #[test]
    fn test_loser_gets_nothing() {
        let market = resolved(Outcome::No, 100.0, 100.0);
        assert_eq!(payout(&market, &position(100_000.0, 0.0)), 0.0);
    }

    #[test]
    fn test_payout_is_floored() {
        // 10 / 30 × 31 = 10.33…
        let market = resolved(Outcome::Yes, 30.0, 1.0);
        assert_eq!(payout(&market, &position(10_000.0, 0.0)), 10.0);
    }

    #[test]
    fn test_unresolved_pays_zero() {
        let mut market = resolved(Outcome::Yes, 100.0, 0.0);
        market.winning_outcome = None;
        assert_eq!(payout(&market, &position(100_000.0, 0.0)), 0.0);
    }

    #[test]
    fn test_payouts_never_exceed_pool() {
        let market = resolved(Outcome::Yes, 7.0, 13.0);
        let holders = [1_000.0, 2_500.0, 3_500.0];
        let total: f64 = holders.iter().map(|s| payout(&market, &position(*s, 0.0))).sum();
        assert!(total <= market.total_pool());
        for s in holders {
            assert!(payout(&market, &position(s, 0.0)) <= market.total_pool().floor());
        }
    }
}
