use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::QuoteStore;
use crate::error::StoreError;
use crate::types::{BehaviorFlags, Pattern, PriceLevel, Quote, Side, TimestampMs, Window, WindowMetrics};

#[derive(Debug, Clone)]
struct Slot<T> {
	value: T,
	expires_at_ms: TimestampMs,
}

impl<T: Clone> Slot<T> {
	fn live(&self, now_ms: TimestampMs) -> Option<T> {
		(self.expires_at_ms > now_ms).then(|| self.value.clone())
	}
}

#[derive(Debug, Default)]
struct TickerShard {
	quotes: BTreeMap<TimestampMs, Quote>,
	latest: Option<Quote>,
	metrics: HashMap<Window, Slot<WindowMetrics>>,
	behaviors: Option<Slot<BehaviorFlags>>,
	bid_levels: Option<Slot<Vec<PriceLevel>>>,
	ask_levels: Option<Slot<Vec<PriceLevel>>>,
	patterns: Vec<Pattern>,
}

impl TickerShard {
	fn level_slot(&mut self, side: Side) -> &mut Option<Slot<Vec<PriceLevel>>> {
		match side {
			Side::Ask => &mut self.ask_levels,
			_ => &mut self.bid_levels,
		}
	}
}

/// In-memory realization of the quote store contract: a `BTreeMap` keyed by
/// timestamp as the ordered set, a cached latest quote as the fast path,
/// and expiring slots for derived records.
#[derive(Debug, Default)]
pub struct MemoryStore {
	shards: RwLock<HashMap<String, TickerShard>>,
}

impl MemoryStore {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl QuoteStore for MemoryStore {
	async fn append(&self, quote: Quote) -> Result<(), StoreError> {
		let mut shards = self.shards.write().await;
		let shard = shards.entry(quote.ticker.clone()).or_default();

		if shard.latest.as_ref().is_none_or(|latest| quote.timestamp >= latest.timestamp) {
			shard.latest = Some(quote.clone());
		}
		shard.quotes.insert(quote.timestamp, quote);

		Ok(())
	}

	async fn latest(&self, ticker: &str) -> Result<Option<Quote>, StoreError> {
		let shards = self.shards.read().await;
		Ok(shards.get(ticker).and_then(|shard| shard.latest.clone()))
	}

	async fn range(&self, ticker: &str, from_ms: TimestampMs, to_ms: TimestampMs) -> Result<Vec<Quote>, StoreError> {
		let shards = self.shards.read().await;
		let Some(shard) = shards.get(ticker) else {
			return Ok(Vec::new());
		};

		Ok(shard.quotes.range(from_ms..=to_ms).map(|(_, quote)| quote.clone()).collect())
	}

	async fn prune_quotes(&self, ticker: &str, older_than_ms: TimestampMs) -> Result<usize, StoreError> {
		let mut shards = self.shards.write().await;
		let Some(shard) = shards.get_mut(ticker) else {
			return Ok(0);
		};

		let before = shard.quotes.len();
		shard.quotes = shard.quotes.split_off(&older_than_ms);
		if shard.quotes.is_empty() {
			shard.latest = None;
		}
		Ok(before - shard.quotes.len())
	}

	async fn tickers(&self) -> Result<Vec<String>, StoreError> {
		let shards = self.shards.read().await;
		Ok(shards.iter().filter(|(_, shard)| !shard.quotes.is_empty()).map(|(ticker, _)| ticker.clone()).collect())
	}

	async fn put_metrics(
		&self,
		ticker: &str,
		metrics: WindowMetrics,
		expires_at_ms: TimestampMs,
	) -> Result<(), StoreError> {
		let mut shards = self.shards.write().await;
		let shard = shards.entry(ticker.to_string()).or_default();
		shard.metrics.insert(metrics.window, Slot { value: metrics, expires_at_ms });
		Ok(())
	}

	async fn metrics(
		&self,
		ticker: &str,
		window: Window,
		now_ms: TimestampMs,
	) -> Result<Option<WindowMetrics>, StoreError> {
		let shards = self.shards.read().await;
		Ok(shards.get(ticker).and_then(|shard| shard.metrics.get(&window)).and_then(|slot| slot.live(now_ms)))
	}

	async fn put_behaviors(
		&self,
		ticker: &str,
		flags: BehaviorFlags,
		expires_at_ms: TimestampMs,
	) -> Result<(), StoreError> {
		let mut shards = self.shards.write().await;
		let shard = shards.entry(ticker.to_string()).or_default();
		shard.behaviors = Some(Slot { value: flags, expires_at_ms });
		Ok(())
	}

	async fn behaviors(&self, ticker: &str, now_ms: TimestampMs) -> Result<Option<BehaviorFlags>, StoreError> {
		let shards = self.shards.read().await;
		Ok(shards.get(ticker).and_then(|shard| shard.behaviors.as_ref()).and_then(|slot| slot.live(now_ms)))
	}

	async fn put_levels(
		&self,
		ticker: &str,
		side: Side,
		levels: Vec<PriceLevel>,
		expires_at_ms: TimestampMs,
	) -> Result<(), StoreError> {
		let mut shards = self.shards.write().await;
		let shard = shards.entry(ticker.to_string()).or_default();
		*shard.level_slot(side) = Some(Slot { value: levels, expires_at_ms });
		Ok(())
	}

	async fn levels(&self, ticker: &str, side: Side, now_ms: TimestampMs) -> Result<Vec<PriceLevel>, StoreError> {
		let shards = self.shards.read().await;
		let Some(shard) = shards.get(ticker) else {
			return Ok(Vec::new());
		};

		let slot = match side {
			Side::Ask => shard.ask_levels.as_ref(),
			_ => shard.bid_levels.as_ref(),
		};
		Ok(slot.and_then(|slot| slot.live(now_ms)).unwrap_or_default())
	}

	async fn append_patterns(&self, ticker: &str, patterns: Vec<Pattern>) -> Result<(), StoreError> {
		if patterns.is_empty() {
			return Ok(());
		}

		let mut shards = self.shards.write().await;
		let shard = shards.entry(ticker.to_string()).or_default();
		shard.patterns.extend(patterns);
		shard.patterns.sort_by_key(|pattern| pattern.timestamp);
		Ok(())
	}

	async fn patterns_between(
		&self,
		ticker: &str,
		from_ms: TimestampMs,
		to_ms: TimestampMs,
	) -> Result<Vec<Pattern>, StoreError> {
		let shards = self.shards.read().await;
		let Some(shard) = shards.get(ticker) else {
			return Ok(Vec::new());
		};

		Ok(shard
			.patterns
			.iter()
			.filter(|pattern| pattern.timestamp >= from_ms && pattern.timestamp <= to_ms)
			.cloned()
			.collect())
	}

	async fn prune_patterns(&self, ticker: &str, older_than_ms: TimestampMs) -> Result<usize, StoreError> {
		let mut shards = self.shards.write().await;
		let Some(shard) = shards.get_mut(ticker) else {
			return Ok(0);
		};

		let before = shard.patterns.len();
		shard.patterns.retain(|pattern| pattern.timestamp >= older_than_ms);
		Ok(before - shard.patterns.len())
	}
}
