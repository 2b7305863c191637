use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::{AnalysisError, IngestError};
use crate::query::{self, AnalyzeRequest};
use crate::snapshot::{self, Element};
use crate::store::QuoteStore;
use crate::types::{Quote, TimestampMs, now_ms};

/// The engine value: store handle, immutable configuration, and the
/// tracked-ticker set. Constructed once at startup and threaded through
/// every component; nothing here is process-global.
pub struct OrderFlowEngine {
	store: Arc<dyn QuoteStore>,
	config: EngineConfig,
	tracked: RwLock<HashMap<String, TimestampMs>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineStats {
	pub tracked_tickers: usize,
	pub store_tickers: usize,
}

impl OrderFlowEngine {
	#[must_use]
	pub fn new(store: Arc<dyn QuoteStore>, config: EngineConfig) -> Self {
		Self { store, config, tracked: RwLock::new(HashMap::new()) }
	}

	pub(crate) fn store(&self) -> &dyn QuoteStore {
		self.store.as_ref()
	}

	pub(crate) const fn config(&self) -> &EngineConfig {
		&self.config
	}

	/// Publisher write path: validates, normalizes the ticker, appends to
	/// the store, and marks the ticker as tracked.
	pub async fn ingest(&self, quote: Quote) -> Result<(), IngestError> {
		let ticker = quote.ticker.trim().to_uppercase();
		if !query::is_valid_ticker(&ticker) {
			return Err(IngestError::InvalidTicker(quote.ticker));
		}
		if quote.bid_price <= 0.0 {
			return Err(IngestError::NonPositiveBid(quote.bid_price));
		}
		if quote.ask_price < quote.bid_price {
			return Err(IngestError::CrossedBook { bid: quote.bid_price, ask: quote.ask_price });
		}

		self.store.append(Quote { ticker: ticker.clone(), ..quote }).await?;

		// Membership update only; the lock never spans store I/O.
		self.tracked.write().await.insert(ticker, now_ms());
		Ok(())
	}

	pub async fn tracked_tickers(&self) -> Vec<String> {
		let tracked = self.tracked.read().await;
		let mut tickers: Vec<String> = tracked.keys().cloned().collect();
		tickers.sort();
		tickers
	}

	/// Drops tickers that have been quiet longer than the configured idle
	/// window. Returns the evicted symbols.
	pub(crate) async fn evict_idle(&self, now: TimestampMs) -> Vec<String> {
		let idle_ms = self.config.tracked_idle_evict_seconds as TimestampMs * 1000;
		let mut tracked = self.tracked.write().await;
		let evicted: Vec<String> = tracked
			.iter()
			.filter(|(_, last_seen)| now - **last_seen > idle_ms)
			.map(|(ticker, _)| ticker.clone())
			.collect();
		for ticker in &evicted {
			tracked.remove(ticker);
		}
		evicted
	}

	pub async fn stats(&self) -> EngineStats {
		let tracked_tickers = self.tracked.read().await.len();
		let store_tickers = self.store.tickers().await.map_or(0, |tickers| tickers.len());
		EngineStats { tracked_tickers, store_tickers }
	}

	/// The one query operation. Always renders a document; every failure
	/// mode is encoded in the document rather than an error return.
	pub async fn analyze_order_flow(&self, request: &AnalyzeRequest, deadline: Duration) -> String {
		let now = now_ms();
		match tokio::time::timeout(deadline, self.analyze_at(request, now)).await {
			Ok(document) => document.render(),
			Err(_) => {
				debug!(ticker = %request.ticker, "analysis deadline exceeded, abandoning reads");
				let error = AnalysisError::Timeout { deadline_ms: deadline.as_millis() as u64 };
				let history = query::parse_history(request.history.as_deref()).unwrap_or(query::DEFAULT_HISTORY_SECS);
				snapshot::error_snapshot(request.ticker.trim(), history, &error, now).render()
			},
		}
	}

	/// Deterministic analysis at an explicit instant: same store state and
	/// same `now` produce an identical document.
	pub async fn analyze_at(&self, request: &AnalyzeRequest, now: TimestampMs) -> Element {
		let history_secs = match query::parse_history(request.history.as_deref()) {
			Ok(seconds) => seconds,
			Err(error) => {
				return snapshot::error_snapshot(request.ticker.trim(), query::DEFAULT_HISTORY_SECS, &error, now);
			},
		};

		let ticker = match query::normalize_ticker(&request.ticker) {
			Ok(ticker) => ticker,
			Err(error) => return snapshot::error_snapshot(request.ticker.trim(), history_secs, &error, now),
		};

		match query::gather(self.store.as_ref(), &ticker, history_secs, request.include_patterns, now).await {
			Ok(data) => snapshot::compose(&data),
			Err(error) => snapshot::error_snapshot(&ticker, history_secs, &error, now),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::store::MemoryStore;
	use async_trait::async_trait;

	use crate::error::StoreError;
	use crate::types::{BehaviorFlags, Pattern, PriceLevel, Side, Window, WindowMetrics};

	fn engine() -> OrderFlowEngine {
		OrderFlowEngine::new(Arc::new(MemoryStore::new()), EngineConfig::default())
	}

	fn quote(ticker: &str, timestamp: TimestampMs, bid_price: f64) -> Quote {
		Quote { ticker: ticker.to_string(), timestamp, bid_price, ask_price: bid_price + 0.02, bid_size: 1_000, ask_size: 1_000 }
	}

	#[tokio::test]
	async fn ingest_normalizes_and_tracks() {
		let engine = engine();
		engine.ingest(quote("spy", 1_000, 450.00)).await.unwrap();

		assert_eq!(engine.tracked_tickers().await, vec!["SPY".to_string()]);
		assert!(engine.store().latest("SPY").await.unwrap().is_some());
	}

	#[tokio::test]
	async fn ingest_rejects_bad_quotes() {
		let engine = engine();
		assert!(engine.ingest(quote("BRK.B", 1_000, 450.00)).await.is_err());
		assert!(engine.ingest(quote("SPY", 1_000, 0.0)).await.is_err());

		let crossed = Quote { ask_price: 449.00, ..quote("SPY", 1_000, 450.00) };
		assert!(engine.ingest(crossed).await.is_err());
	}

	#[tokio::test]
	async fn idle_tickers_are_evicted() {
		let engine = engine();
		engine.ingest(quote("SPY", 1_000, 450.00)).await.unwrap();

		let idle_cutoff = now_ms() + 700_000;
		let evicted = engine.evict_idle(idle_cutoff).await;
		assert_eq!(evicted, vec!["SPY".to_string()]);
		assert!(engine.tracked_tickers().await.is_empty());
	}

	#[tokio::test]
	async fn analyze_no_data_snapshot() {
		let engine = engine();
		let request = AnalyzeRequest::new("ZZZZ");
		let document = engine.analyze_at(&request, 1_000_000).await;

		assert_eq!(document.attribute("error"), Some("true"));
		let rendered = document.render();
		assert!(rendered.contains("code=\"NoData\""));
		assert_eq!(rendered.matches("<suggestion>").count(), 3);
	}

	#[tokio::test]
	async fn analyze_invalid_history_snapshot() {
		let engine = engine();
		let mut request = AnalyzeRequest::new("SPY");
		request.history = Some("3fortnights".to_string());

		let rendered = engine.analyze_at(&request, 1_000_000).await.render();
		assert!(rendered.contains("error=\"true\""));
		assert!(rendered.contains("code=\"InvalidHistory\""));
	}

	#[tokio::test]
	async fn analyze_invalid_ticker_snapshot() {
		let engine = engine();
		let rendered = engine.analyze_at(&AnalyzeRequest::new("BRK.B"), 1_000_000).await.render();
		assert!(rendered.contains("code=\"InvalidTicker\""));
	}

	/// Store stub whose every read fails.
	struct DownStore;

	#[async_trait]
	impl QuoteStore for DownStore {
		async fn append(&self, _quote: Quote) -> Result<(), StoreError> {
			Err(StoreError::Unavailable { reason: "connection refused".to_string() })
		}
		async fn latest(&self, _ticker: &str) -> Result<Option<Quote>, StoreError> {
			Err(StoreError::Unavailable { reason: "connection refused".to_string() })
		}
		async fn range(&self, _ticker: &str, _from_ms: TimestampMs, _to_ms: TimestampMs) -> Result<Vec<Quote>, StoreError> {
			Err(StoreError::Unavailable { reason: "connection refused".to_string() })
		}
		async fn prune_quotes(&self, _ticker: &str, _older_than_ms: TimestampMs) -> Result<usize, StoreError> {
			Err(StoreError::Unavailable { reason: "connection refused".to_string() })
		}
		async fn tickers(&self) -> Result<Vec<String>, StoreError> {
			Err(StoreError::Unavailable { reason: "connection refused".to_string() })
		}
		async fn put_metrics(
			&self,
			_ticker: &str,
			_metrics: WindowMetrics,
			_expires_at_ms: TimestampMs,
		) -> Result<(), StoreError> {
			Err(StoreError::Unavailable { reason: "connection refused".to_string() })
		}
		async fn metrics(
			&self,
			_ticker: &str,
			_window: Window,
			_now_ms: TimestampMs,
		) -> Result<Option<WindowMetrics>, StoreError> {
			Err(StoreError::Unavailable { reason: "connection refused".to_string() })
		}
		async fn put_behaviors(
			&self,
			_ticker: &str,
			_flags: BehaviorFlags,
			_expires_at_ms: TimestampMs,
		) -> Result<(), StoreError> {
			Err(StoreError::Unavailable { reason: "connection refused".to_string() })
		}
		async fn behaviors(&self, _ticker: &str, _now_ms: TimestampMs) -> Result<Option<BehaviorFlags>, StoreError> {
			Err(StoreError::Unavailable { reason: "connection refused".to_string() })
		}
		async fn put_levels(
			&self,
			_ticker: &str,
			_side: Side,
			_levels: Vec<PriceLevel>,
			_expires_at_ms: TimestampMs,
		) -> Result<(), StoreError> {
			Err(StoreError::Unavailable { reason: "connection refused".to_string() })
		}
		async fn levels(&self, _ticker: &str, _side: Side, _now_ms: TimestampMs) -> Result<Vec<PriceLevel>, StoreError> {
			Err(StoreError::Unavailable { reason: "connection refused".to_string() })
		}
		async fn append_patterns(&self, _ticker: &str, _patterns: Vec<Pattern>) -> Result<(), StoreError> {
			Err(StoreError::Unavailable { reason: "connection refused".to_string() })
		}
		async fn patterns_between(
			&self,
			_ticker: &str,
			_from_ms: TimestampMs,
			_to_ms: TimestampMs,
		) -> Result<Vec<Pattern>, StoreError> {
			Err(StoreError::Unavailable { reason: "connection refused".to_string() })
		}
		async fn prune_patterns(&self, _ticker: &str, _older_than_ms: TimestampMs) -> Result<usize, StoreError> {
			Err(StoreError::Unavailable { reason: "connection refused".to_string() })
		}
	}

	#[tokio::test]
	async fn analyze_store_unavailable_snapshot() {
		let engine = OrderFlowEngine::new(Arc::new(DownStore), EngineConfig::default());
		let rendered = engine.analyze_at(&AnalyzeRequest::new("SPY"), 1_000_000).await.render();
		assert!(rendered.contains("error=\"true\""));
		assert!(rendered.contains("code=\"StoreUnavailable\""));
	}
}
