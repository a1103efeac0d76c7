use serde::Serialize;
use std::str::FromStr;

use crate::error::LedgerError;
use crate::models::{Market, MarketListParams, MarketStatus, MarketView};

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;

/// Listing order for GetMarkets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Most recently created first
    Newest,
    /// Soonest end time first
    #[default]
    EndingSoon,
    /// Largest combined pool first
    Popular,
    /// By question text
    Alphabetical,
}

impl FromStr for SortOrder {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "newest" => Ok(SortOrder::Newest),
            "ending-soon" => Ok(SortOrder::EndingSoon),
            "popular" => Ok(SortOrder::Popular),
            "alphabetical" => Ok(SortOrder::Alphabetical),
            other => Err(LedgerError::Validation(format!("invalid sort order '{}'", other))),
        }
    }
}

/// Filter, order and page selection for a market listing
#[derive(Debug, Clone, PartialEq)]
pub struct MarketQuery {
    pub status: Option<MarketStatus>,
    pub category: Option<String>,
    pub sort: SortOrder,
    pub page: usize,
    pub limit: usize,
}

impl Default for MarketQuery {
    fn default() -> Self {
        Self {
            status: None,
            category: None,
            sort: SortOrder::default(),
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl MarketQuery {
    pub fn with_page(mut self, page: usize, limit: usize) -> Self {
        self.page = page.max(1);
        self.limit = bounded_limit(limit);
        self
    }

    /// Build from raw query parameters.
    ///
    /// Unparsable page/limit values fall back to defaults; an unknown status
    /// or sort order is rejected.
    pub fn from_params(params: &MarketListParams) -> Result<Self, LedgerError> {
        let status = non_empty(&params.status)
            .map(str::parse::<MarketStatus>)
            .transpose()?;
        let sort = non_empty(&params.sort_by)
            .map(str::parse::<SortOrder>)
            .transpose()?
            .unwrap_or_default();
        let page = non_empty(&params.page)
            .and_then(|p| p.parse::<usize>().ok())
            .filter(|p| *p > 0)
            .unwrap_or(1);
        let limit = non_empty(&params.limit)
            .and_then(|l| l.parse::<usize>().ok())
            .unwrap_or(DEFAULT_PAGE_SIZE);

        Ok(Self {
            status,
            category: non_empty(&params.category).map(str::to_string),
            sort,
            ..Self::default()
        }
        .with_page(page, limit))
    }

    fn matches(&self, market: &Market) -> bool {
        self.status.map_or(true, |s| market.status == s)
            && self.category.as_deref().map_or(true, |c| market.category == c)
    }
}

/// Page sizes outside 1..=MAX_PAGE_SIZE fall back to the default
fn bounded_limit(limit: usize) -> usize {
    if (1..=MAX_PAGE_SIZE).contains(&limit) {
        limit
    } else {
        DEFAULT_PAGE_SIZE
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// One page of a market listing
#[derive(Debug, Clone, Serialize)]
pub struct MarketPage {
    pub markets: Vec<MarketView>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub total_pages: usize,
}

/// Filter, sort and slice a snapshot of markets
pub fn select(mut markets: Vec<Market>, query: &MarketQuery) -> MarketPage {
    markets.retain(|m| query.matches(m));

    match query.sort {
        SortOrder::Newest => markets.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        SortOrder::EndingSoon => markets.sort_by(|a, b| a.end_time.cmp(&b.end_time)),
        SortOrder::Popular => {
            markets.sort_by(|a, b| b.total_pool().total_cmp(&a.total_pool()))
        }
        SortOrder::Alphabetical => markets.sort_by(|a, b| a.question.cmp(&b.question)),
    }

    let total = markets.len();
    let page_number = query.page.max(1);
    let limit = bounded_limit(query.limit);
    let start = (page_number - 1).saturating_mul(limit);

    let page: Vec<MarketView> = markets
        .into_iter()
        .skip(start)
        .take(limit)
        .map(MarketView::from)
        .collect();

    MarketPage {
        markets: page,
        pagination: Pagination {
            page: page_number,
            limit,
            total,
            total_pages: total.div_ceil(limit),
        },
    }
}
