//! Background derivation loop. One tick walks every tracked ticker,
//! refreshes the derived slots in the store, and prunes expired data.
//! The tick itself is a plain step function driven by an external
//! scheduler, so tests can run it at explicit instants.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::engine::OrderFlowEngine;
use crate::error::StoreError;
use crate::types::{Pattern, Side, TimestampMs, Window, now_ms};
use crate::{behavior, levels, metrics, patterns};

/// Behavior flags are refreshed from the 60 s window each tick.
const BEHAVIOR_TTL_MS: TimestampMs = Window::Secs60.millis() * 10;

const LEVEL_TTL_MS: TimestampMs = 3_600_000;

const STATS_INTERVAL_SECS: u64 = 60;

/// Quotes considered when judging recent behavior.
const BEHAVIOR_LOOKBACK: usize = 20;

fn worker_limit() -> usize {
	std::thread::available_parallelism().map_or(4, std::num::NonZeroUsize::get)
}

/// Drives ticks at the configured cadence until the task is dropped.
pub async fn run(engine: Arc<OrderFlowEngine>) {
	let tick_duration = Duration::from_secs_f64(engine_interval(&engine));
	let mut tick_timer = interval(tick_duration);
	let mut stats_timer = interval(Duration::from_secs(STATS_INTERVAL_SECS));

	info!(interval_ms = tick_duration.as_millis() as u64, "starting order-flow processor");

	loop {
		tokio::select! {
			_ = tick_timer.tick() => {
				let started = Instant::now();
				run_tick(&engine, now_ms()).await;
				debug!(elapsed_ms = started.elapsed().as_millis() as u64, "processor tick complete");
			}

			_ = stats_timer.tick() => {
				let stats = engine.stats().await;
				info!(
					tracked = stats.tracked_tickers,
					stored = stats.store_tickers,
					"processor stats"
				);
			}
		}
	}
}

fn engine_interval(engine: &OrderFlowEngine) -> f64 {
	engine.config().processor_interval_seconds
}

/// One processor tick at an explicit instant. Per-ticker work fans out over
/// a bounded pool; one ticker's failure never aborts the others.
pub async fn run_tick(engine: &OrderFlowEngine, now: TimestampMs) {
	let tickers = engine.tracked_tickers().await;
	let soft_deadline = Duration::from_secs_f64(engine_interval(engine));

	stream::iter(tickers)
		.for_each_concurrent(worker_limit(), |ticker| async move {
			match tokio::time::timeout(soft_deadline, process_ticker(engine, &ticker, now)).await {
				Ok(Ok(())) => {},
				Ok(Err(error)) => {
					warn!(ticker = %ticker, error = %error, "derivation failed, will retry next tick");
				},
				Err(_) => {
					warn!(ticker = %ticker, "derivation exceeded the tick deadline, skipped");
				},
			}
		})
		.await;

	let evicted = engine.evict_idle(now).await;
	if !evicted.is_empty() {
		info!(count = evicted.len(), "evicted idle tickers");
	}
}

/// Derivation order per ticker: 10 s metrics, then the 60 s family, then
/// the 5 min family, then pruning.
async fn process_ticker(engine: &OrderFlowEngine, ticker: &str, now: TimestampMs) -> Result<(), StoreError> {
	let store = engine.store();
	let config = engine.config();

	let quotes = store.range(ticker, now - Window::Min5.millis(), now).await?;
	if quotes.len() >= 2 {
		let mut candidates: Vec<Pattern> = Vec::new();

		let tail = metrics::window_slice(&quotes, Window::Secs10, now);
		let short = metrics::compute(Window::Secs10, tail, config.large_size_threshold);
		store.put_metrics(ticker, short, now + Window::Secs10.millis() * 10).await?;

		if metrics::covers_window(&quotes, Window::Secs60, now) {
			let tail = metrics::window_slice(&quotes, Window::Secs60, now);
			let medium = metrics::compute(Window::Secs60, tail, config.large_size_threshold);

			let recent = &tail[tail.len().saturating_sub(BEHAVIOR_LOOKBACK)..];
			let flags = behavior::analyze(&medium, recent);

			let tick_size = config.tick_size_for(ticker);
			candidates.extend(patterns::detect(tail, &medium, tick_size));

			store.put_metrics(ticker, medium, now + Window::Secs60.millis() * 10).await?;
			store.put_behaviors(ticker, flags, now + BEHAVIOR_TTL_MS).await?;
		}

		if metrics::covers_window(&quotes, Window::Min5, now) {
			let long = metrics::compute(Window::Min5, &quotes, config.large_size_threshold);
			store.put_metrics(ticker, long, now + Window::Min5.millis() * 10).await?;

			let tick_size = config.tick_size_for(ticker);
			for side in [Side::Bid, Side::Ask] {
				let previous = store.levels(ticker, side, now).await?;
				let current = levels::compute_levels(&quotes, side, tick_size);
				candidates.extend(levels::detect_sweeps(&previous, &current, side, now));
				store.put_levels(ticker, side, current, now + LEVEL_TTL_MS).await?;
			}
		}

		if !candidates.is_empty() {
			let log_from = now - Window::Min5.millis() - patterns::SUPPRESSION_WINDOW_MS;
			let recent_log = store.patterns_between(ticker, log_from, now).await?;
			let fresh = patterns::suppress(candidates, &recent_log);
			if !fresh.is_empty() {
				debug!(ticker = %ticker, count = fresh.len(), "new patterns detected");
			}
			store.append_patterns(ticker, fresh).await?;
		}
	}

	let quote_cutoff = now - engine.config().quote_ttl_seconds as TimestampMs * 1000;
	store.prune_quotes(ticker, quote_cutoff).await?;
	let pattern_cutoff = now - engine.config().pattern_ttl_seconds as TimestampMs * 1000;
	store.prune_patterns(ticker, pattern_cutoff).await?;

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::EngineConfig;
	use crate::query::AnalyzeRequest;
	use crate::store::MemoryStore;
	use crate::types::{PatternKind, Quote, round4};

	fn engine() -> Arc<OrderFlowEngine> {
		Arc::new(OrderFlowEngine::new(Arc::new(MemoryStore::new()), EngineConfig::default()))
	}

	async fn feed(engine: &OrderFlowEngine, quotes: Vec<Quote>) {
		for quote in quotes {
			engine.ingest(quote).await.unwrap();
		}
	}

	fn quote(timestamp: TimestampMs, bid_price: f64, ask_price: f64, bid_size: u64, ask_size: u64) -> Quote {
		Quote { ticker: "SPY".to_string(), timestamp, bid_price, ask_price, bid_size, ask_size }
	}

	/// Scenario: bid stepping up a cent every six seconds for a minute,
	/// offer pinned, bid size building 5000 -> 8000.
	fn rising_bid_feed(now: TimestampMs) -> Vec<Quote> {
		(0..=60)
			.map(|i| {
				let bid = 450.10 + 0.01 * f64::from(i / 6);
				let bid_size = 5_000 + (3_000 * u64::from(i as u32)) / 60;
				quote(now - 60_000 + TimestampMs::from(i) * 1_000, round4(bid), 450.30, bid_size, 2_000)
			})
			.collect()
	}

	#[tokio::test]
	async fn tick_derives_metrics_and_behaviors() {
		let engine = engine();
		let now = now_ms();
		feed(&engine, rising_bid_feed(now)).await;

		run_tick(&engine, now).await;

		let store = engine.store();
		let medium = store.metrics("SPY", Window::Secs60, now).await.unwrap().unwrap();
		assert_eq!(medium.bid_lifts, 10);
		assert_eq!(medium.bid_drops, 0);
		assert_eq!(medium.bid_size_acceleration, crate::types::SizeAcceleration::Increasing);

		let flags = store.behaviors("SPY", now).await.unwrap().unwrap();
		assert!(flags.bid_stacking);
		assert!(flags.momentum_building);

		let logged = store.patterns_between("SPY", now - 60_000, now).await.unwrap();
		assert!(logged.iter().any(|pattern| {
			pattern.kind == PatternKind::MomentumShift
				&& pattern.strength == crate::types::Strength::Strong
				&& pattern.description.starts_with("bullish")
		}));
	}

	#[tokio::test]
	async fn tick_skips_thin_tickers() {
		let engine = engine();
		let now = now_ms();
		feed(&engine, vec![quote(now - 1_000, 450.00, 450.02, 1_000, 1_000)]).await;

		run_tick(&engine, now).await;

		assert!(engine.store().metrics("SPY", Window::Secs10, now).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn tick_is_idempotent_on_frozen_store() {
		let engine = engine();
		let now = now_ms();
		feed(&engine, rising_bid_feed(now)).await;

		run_tick(&engine, now).await;
		let store = engine.store();
		let first_metrics = store.metrics("SPY", Window::Secs60, now).await.unwrap();
		let first_patterns = store.patterns_between("SPY", now - 3_600_000, now).await.unwrap();

		run_tick(&engine, now).await;
		assert_eq!(store.metrics("SPY", Window::Secs60, now).await.unwrap(), first_metrics);
		assert_eq!(store.patterns_between("SPY", now - 3_600_000, now).await.unwrap(), first_patterns);
	}

	#[tokio::test]
	async fn old_quotes_and_patterns_are_pruned() {
		let engine = engine();
		let now = now_ms();
		feed(
			&engine,
			vec![
				quote(now - 4_000_000, 450.00, 450.02, 1_000, 1_000),
				quote(now - 2_000, 450.00, 450.02, 1_000, 1_000),
				quote(now - 1_000, 450.00, 450.02, 1_000, 1_000),
			],
		)
		.await;

		run_tick(&engine, now).await;

		let remaining = engine.store().range("SPY", now - 7_200_000, now).await.unwrap();
		assert_eq!(remaining.len(), 2);
	}

	#[tokio::test]
	async fn five_minute_feed_produces_levels_and_snapshot() {
		let engine = engine();
		let now = now_ms();

		// Five minutes of one-second quotes parked at 449.50 with real size.
		let quotes: Vec<Quote> = (0..=300)
			.map(|i| quote(now - 300_000 + TimestampMs::from(i) * 1_000, 449.50, 449.52, 12_000, 9_000))
			.collect();
		feed(&engine, quotes).await;

		run_tick(&engine, now).await;

		let store = engine.store();
		let bid_levels = store.levels("SPY", Side::Bid, now).await.unwrap();
		assert!(!bid_levels.is_empty());
		assert_eq!(bid_levels[0].price, 449.50);

		let request = AnalyzeRequest::new("SPY");
		let rendered = engine.analyze_at(&request, now).await.render();
		assert!(rendered.contains("history_window=\"300s\""));
		assert!(rendered.contains("<last_5min>"));
		assert!(rendered.contains("449.5000"));
	}

	#[tokio::test]
	async fn deterministic_snapshot_after_processing() {
		let engine = engine();
		let now = now_ms();
		feed(&engine, rising_bid_feed(now)).await;
		run_tick(&engine, now).await;

		let request = AnalyzeRequest::new("SPY");
		let first = engine.analyze_at(&request, now).await.render();
		let second = engine.analyze_at(&request, now).await.render();
		assert_eq!(first, second);
	}
}
