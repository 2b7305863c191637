//! Boolean market-behavior flags over the 60 s window. Each rule is
//! evaluated independently; the flags carry no memory beyond the window.

use crate::types::{BehaviorFlags, Quote, WindowMetrics};

/// Flag when this many of the last ten adjacent pairs agree.
const MIN_AGREEING_PAIRS: usize = 3;

/// Spread must compress by at least this much against the prior ten quotes.
const TIGHTENING_RATIO: f64 = 0.9;

/// Momentum needs the bid lift ratio above this.
const MOMENTUM_LIFT_RATIO: f64 = 1.5;

/// Price velocity floor as a fraction of the current price per second.
const MOMENTUM_VELOCITY_FRACTION: f64 = 0.000_001;

/// `metrics` is the 60 s record; `recent` the last 20 quotes, ascending.
#[must_use]
pub fn analyze(metrics: &WindowMetrics, recent: &[Quote]) -> BehaviorFlags {
	BehaviorFlags {
		bid_stacking: detect_bid_stacking(recent),
		ask_pulling: detect_ask_pulling(recent),
		spread_tightening: detect_spread_tightening(recent),
		momentum_building: detect_momentum_building(metrics, recent),
	}
}

fn last_n(quotes: &[Quote], n: usize) -> &[Quote] {
	&quotes[quotes.len().saturating_sub(n)..]
}

/// Bid size growing quote-over-quote while the bid holds or rises.
fn detect_bid_stacking(recent: &[Quote]) -> bool {
	let agreeing = last_n(recent, 10)
		.windows(2)
		.filter(|pair| pair[1].bid_size > pair[0].bid_size && pair[1].bid_price >= pair[0].bid_price)
		.count();
	agreeing >= MIN_AGREEING_PAIRS
}

/// Ask size shrinking while the ask holds or rises.
fn detect_ask_pulling(recent: &[Quote]) -> bool {
	let agreeing = last_n(recent, 10)
		.windows(2)
		.filter(|pair| pair[1].ask_size < pair[0].ask_size && pair[1].ask_price >= pair[0].ask_price)
		.count();
	agreeing >= MIN_AGREEING_PAIRS
}

fn detect_spread_tightening(recent: &[Quote]) -> bool {
	if recent.len() < 20 {
		return false;
	}

	let tail = last_n(recent, 20);
	let mean_spread = |quotes: &[Quote]| quotes.iter().map(Quote::spread).sum::<f64>() / quotes.len() as f64;
	let prior = mean_spread(&tail[..10]);
	let current = mean_spread(&tail[10..]);

	prior > 0.0 && current < prior * TIGHTENING_RATIO
}

fn detect_momentum_building(metrics: &WindowMetrics, recent: &[Quote]) -> bool {
	if metrics.insufficient_data {
		return false;
	}
	let Some(last) = recent.last() else {
		return false;
	};

	let lift_ratio = f64::from(metrics.bid_lifts) / f64::from(metrics.bid_drops.max(1));
	lift_ratio > MOMENTUM_LIFT_RATIO && metrics.price_velocity > last.mid() * MOMENTUM_VELOCITY_FRACTION
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::metrics;
	use crate::types::{TimestampMs, Window, round4};

	fn quote(timestamp: TimestampMs, bid_price: f64, ask_price: f64, bid_size: u64, ask_size: u64) -> Quote {
		Quote { ticker: "SPY".to_string(), timestamp, bid_price, ask_price, bid_size, ask_size }
	}

	fn flat_feed(n: usize) -> Vec<Quote> {
		(0..n).map(|i| quote(i as TimestampMs * 1_000, 450.00, 450.04, 2_000, 2_000)).collect()
	}

	#[test]
	fn flat_book_raises_nothing() {
		let quotes = flat_feed(20);
		let metrics = metrics::compute(Window::Secs60, &quotes, 10_000);
		let flags = analyze(&metrics, &quotes);
		assert_eq!(flags, BehaviorFlags::default());
	}

	#[test]
	fn bid_stacking_on_growing_sizes() {
		let quotes: Vec<Quote> =
			(0..10).map(|i| quote(i as TimestampMs * 1_000, 450.00, 450.04, 2_000 + 500 * i as u64, 2_000)).collect();
		let metrics = metrics::compute(Window::Secs60, &quotes, 10_000);
		assert!(analyze(&metrics, &quotes).bid_stacking);
	}

	#[test]
	fn bid_stacking_rejected_when_bid_declines() {
		let quotes: Vec<Quote> = (0..10)
			.map(|i| {
				quote(i as TimestampMs * 1_000, round4(450.00 - 0.01 * i as f64), 450.20, 2_000 + 500 * i as u64, 2_000)
			})
			.collect();
		let metrics = metrics::compute(Window::Secs60, &quotes, 10_000);
		assert!(!analyze(&metrics, &quotes).bid_stacking);
	}

	#[test]
	fn ask_pulling_on_shrinking_offers() {
		let quotes: Vec<Quote> =
			(0..10).map(|i| quote(i as TimestampMs * 1_000, 450.00, 450.04, 2_000, 8_000 - 600 * i as u64)).collect();
		let metrics = metrics::compute(Window::Secs60, &quotes, 10_000);
		assert!(analyze(&metrics, &quotes).ask_pulling);
	}

	#[test]
	fn spread_tightening_needs_ten_percent() {
		let mut quotes = Vec::new();
		for i in 0..10 {
			quotes.push(quote(i * 1_000, 450.00, 450.10, 2_000, 2_000));
		}
		for i in 10..20 {
			quotes.push(quote(i * 1_000, 450.00, 450.08, 2_000, 2_000));
		}
		let metrics = metrics::compute(Window::Secs60, &quotes, 10_000);
		assert!(analyze(&metrics, &quotes).spread_tightening);

		// A 5% compression stays below the threshold.
		let mut mild = Vec::new();
		for i in 0..10 {
			mild.push(quote(i * 1_000, 450.00, 450.10, 2_000, 2_000));
		}
		for i in 10..20 {
			mild.push(quote(i * 1_000, 450.00, 450.095, 2_000, 2_000));
		}
		let metrics = metrics::compute(Window::Secs60, &mild, 10_000);
		assert!(!analyze(&metrics, &mild).spread_tightening);
	}

	#[test]
	fn momentum_building_needs_lifts_and_velocity() {
		// Ten upward cent steps over a minute clears both conditions.
		let quotes: Vec<Quote> = (0..60)
			.map(|i| {
				let bid = 450.10 + 0.01 * f64::from((i + 1) / 6);
				quote(TimestampMs::from(i) * 1_000, round4(bid), 450.30, 5_000, 2_000)
			})
			.collect();
		let metrics = metrics::compute(Window::Secs60, &quotes, 10_000);
		assert!(analyze(&metrics, &quotes).momentum_building);

		let flat = flat_feed(60);
		let metrics = metrics::compute(Window::Secs60, &flat, 10_000);
		assert!(!analyze(&metrics, &flat).momentum_building);
	}
}
