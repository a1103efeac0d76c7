/// Chain Relay - best-effort mirror of ledger operations onto the chain service
///
/// The ledger never waits on the relay. Committed operations are pushed onto
/// an unbounded channel by [`RelayHandle::dispatch`]; a background worker
/// drains it and submits each event. Failures are logged and dropped.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::models::Outcome;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Timeout for relay calls
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("relay request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("relay rejected operation (status {status}): {body}")]
    Rejected { status: u16, body: String },
}

// ============================================================================
// EVENTS
// ============================================================================

/// A committed ledger operation to mirror
#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    MarketCreated {
        question: String,
        category: String,
        end_time: DateTime<Utc>,
    },
    BetPlaced {
        market_id: u64,
        outcome: Outcome,
        amount: f64,
    },
    MarketResolved {
        market_id: u64,
        outcome: Outcome,
    },
}

impl RelayEvent {
    /// Path under the relay base URL
    pub fn path(&self) -> &'static str {
        match self {
            RelayEvent::MarketCreated { .. } => "/linera/create-market",
            RelayEvent::BetPlaced { .. } => "/linera/place-bet",
            RelayEvent::MarketResolved { .. } => "/linera/resolve-market",
        }
    }

    /// JSON body understood by the chain service
    pub fn payload(&self) -> serde_json::Value {
        match self {
            RelayEvent::MarketCreated { question, category, end_time } => json!({
                "question": question,
                "category": category,
                "end_time": end_time.timestamp_micros(),
            }),
            RelayEvent::BetPlaced { market_id, outcome, amount } => json!({
                "market_id": market_id,
                "outcome": outcome,
                // chain amounts are whole tokens
                "amount": amount.trunc() as u64,
            }),
            RelayEvent::MarketResolved { market_id, outcome } => json!({
                "market_id": market_id,
                "outcome": outcome,
            }),
        }
    }
}

// ============================================================================
// RELAY
// ============================================================================

#[async_trait]
pub trait ChainRelay: Send + Sync {
    async fn submit(&self, event: &RelayEvent) -> Result<(), RelayError>;
}

/// HTTP relay to the chain service.
///
/// Runs in mock mode (accepts and logs every event) when no endpoint is set.
pub struct HttpRelay {
    endpoint_url: Option<String>,
    client: Client,
}

impl HttpRelay {
    pub fn new(endpoint_url: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            endpoint_url: endpoint_url.map(|u| u.trim_end_matches('/').to_string()),
            client,
        }
    }

    pub fn is_mock_mode(&self) -> bool {
        self.endpoint_url.is_none()
    }

    /// Log connection status (call on startup)
    pub fn log_status(&self) {
        match &self.endpoint_url {
            Some(url) => tracing::info!(%url, "🔗 Chain relay enabled"),
            None => tracing::info!("⚠️  Chain relay in mock mode (RELAY_URL not set)"),
        }
    }
}

#[async_trait]
impl ChainRelay for HttpRelay {
    async fn submit(&self, event: &RelayEvent) -> Result<(), RelayError> {
        let Some(base) = &self.endpoint_url else {
            tracing::debug!(?event, "relay mock mode, skipping submit");
            return Ok(());
        };

        let response = self
            .client
            .post(format!("{}{}", base, event.path()))
            .json(&event.payload())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::Rejected { status: status.as_u16(), body });
        }
        Ok(())
    }
}

// ============================================================================
// DISPATCH
// ============================================================================

/// Fire-and-forget entry point held by the ledger service
#[derive(Clone, Debug, Default)]
pub struct RelayHandle {
    tx: Option<mpsc::UnboundedSender<RelayEvent>>,
}

impl RelayHandle {
    /// A handle that drops every event
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// A handle feeding an existing channel
    pub fn from_sender(tx: mpsc::UnboundedSender<RelayEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn dispatch(&self, event: RelayEvent) {
        if let Some(tx) = &self.tx {
            if let Err(e) = tx.send(event) {
                tracing::warn!(event = ?e.0, "relay worker is gone, dropping event");
            }
        }
    }
}

/// Spawn the worker that submits dispatched events one at a time.
///
/// The worker exits once every [`RelayHandle`] clone is dropped.
pub fn spawn_relay_worker(relay: Arc<dyn ChainRelay>) -> (RelayHandle, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<RelayEvent>();

    let worker = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match relay.submit(&event).await {
                Ok(()) => tracing::info!(path = event.path(), "✅ Relayed operation"),
                Err(e) => tracing::warn!(path = event.path(), error = %e, "⚠️  Failed to relay operation"),
            }
        }
        tracing::debug!("relay worker stopped");
    });

    (RelayHandle::from_sender(tx), worker)
}
