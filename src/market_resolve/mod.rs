// ============================================================================
// Market Resolve Module - Pricing, Settlement & Listing
// ============================================================================
//
//   - pricing: shares issued for a stake against a pari-mutuel pool
//   - settlement: payout owed to a position once a market resolves
//   - listing: filter, sort and paginate market snapshots
//
// ============================================================================

pub mod listing;
pub mod pricing;
pub mod settlement;

pub use listing::{MarketPage, MarketQuery, Pagination, SortOrder};
pub use pricing::{shares_for_stake, BOOTSTRAP_MULTIPLIER};
pub use settlement::payout;
