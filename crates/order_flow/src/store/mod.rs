mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::types::{BehaviorFlags, Pattern, PriceLevel, Quote, Side, TimestampMs, Window, WindowMetrics};

/// Abstraction over any ordered-set + hashmap store: quotes keyed by
/// timestamp per ticker, a latest-quote fast path, and TTL'd slots for
/// derived records. Realizations may be in-memory, a sorted-set-capable
/// KV service, or an RPC shim fronting one.
///
/// Appends are single-writer-per-ticker (the publisher); derived slots are
/// single-writer-per-ticker-per-slot (the processor). Slot writes are
/// atomic: a reader sees the previous full record or the new one, never a
/// mix. Expiry stamps are absolute; reads filter against the caller's
/// `now_ms` so a frozen store yields reproducible answers.
#[async_trait]
pub trait QuoteStore: Send + Sync {
	/// Inserts by timestamp; an equal-timestamp entry is overwritten.
	async fn append(&self, quote: Quote) -> Result<(), StoreError>;

	/// Most recent full quote for the ticker.
	async fn latest(&self, ticker: &str) -> Result<Option<Quote>, StoreError>;

	/// Time-ascending quotes with `from_ms <= timestamp <= to_ms`.
	async fn range(&self, ticker: &str, from_ms: TimestampMs, to_ms: TimestampMs) -> Result<Vec<Quote>, StoreError>;

	/// Removes quotes strictly older than the cutoff. Idempotent.
	async fn prune_quotes(&self, ticker: &str, older_than_ms: TimestampMs) -> Result<usize, StoreError>;

	/// Tickers with any stored quotes.
	async fn tickers(&self) -> Result<Vec<String>, StoreError>;

	async fn put_metrics(
		&self,
		ticker: &str,
		metrics: WindowMetrics,
		expires_at_ms: TimestampMs,
	) -> Result<(), StoreError>;

	async fn metrics(
		&self,
		ticker: &str,
		window: Window,
		now_ms: TimestampMs,
	) -> Result<Option<WindowMetrics>, StoreError>;

	async fn put_behaviors(
		&self,
		ticker: &str,
		flags: BehaviorFlags,
		expires_at_ms: TimestampMs,
	) -> Result<(), StoreError>;

	async fn behaviors(&self, ticker: &str, now_ms: TimestampMs) -> Result<Option<BehaviorFlags>, StoreError>;

	async fn put_levels(
		&self,
		ticker: &str,
		side: Side,
		levels: Vec<PriceLevel>,
		expires_at_ms: TimestampMs,
	) -> Result<(), StoreError>;

	async fn levels(&self, ticker: &str, side: Side, now_ms: TimestampMs) -> Result<Vec<PriceLevel>, StoreError>;

	/// Appends already-suppressed patterns to the ticker's time-ordered log.
	async fn append_patterns(&self, ticker: &str, patterns: Vec<Pattern>) -> Result<(), StoreError>;

	/// Patterns with `from_ms <= timestamp <= to_ms`, time-ascending.
	async fn patterns_between(
		&self,
		ticker: &str,
		from_ms: TimestampMs,
		to_ms: TimestampMs,
	) -> Result<Vec<Pattern>, StoreError>;

	/// Removes patterns strictly older than the cutoff. Idempotent.
	async fn prune_patterns(&self, ticker: &str, older_than_ms: TimestampMs) -> Result<usize, StoreError>;
}
