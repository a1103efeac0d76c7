use crate::error::LedgerError;

// ============================================================================
// PRICING CONSTANTS
// ============================================================================

/// Shares issued per token for the first stake on an empty side.
///
/// Every later stake is priced at `totalShares / pool`, which the update rule
/// keeps equal to this constant, so the marginal price never moves with depth.
pub const BOOTSTRAP_MULTIPLIER: f64 = 1000.0;

/// Shares issued for `stake` on one side, given that side's state *before*
/// the stake is added.
pub fn shares_for_stake(pool: f64, total_shares: f64, stake: f64) -> Result<f64, LedgerError> {
    if total_shares == 0.0 {
        return Ok(stake * BOOTSTRAP_MULTIPLIER);
    }
    if pool <= 0.0 {
        return Err(LedgerError::Internal(format!(
            "pool is {} while {} shares are outstanding",
            pool, total_shares
        )));
    }
    Ok(stake * total_shares / pool)
}

/// Share total for a pool seeded outside of betting (generators, demo data)
pub fn seeded_shares(pool: f64) -> f64 {
    pool * BOOTSTRAP_MULTIPLIER
}
