//! Microstructure pattern detection over the 60 s window, plus duplicate
//! suppression against the per-ticker pattern log.

use std::collections::HashMap;

use crate::types::{Pattern, PatternKind, Quote, Side, Strength, TimestampMs, WindowMetrics, round_to_tick};

/// Duplicate (kind, side, cent-rounded price) occurrences inside this span
/// collapse to a single log entry.
pub const SUPPRESSION_WINDOW_MS: TimestampMs = 30_000;

const ABSORPTION_MIN_RUN_MS: TimestampMs = 15_000;
const ABSORPTION_MIN_MEAN_SIZE: f64 = 8_000.0;
const ABSORPTION_MODERATE_MEAN_SIZE: f64 = 12_000.0;
const ABSORPTION_STRONG_MEAN_SIZE: f64 = 20_000.0;

const STACKING_MIN_RUN: usize = 5;
const STACKING_MIN_SIZE: u64 = 5_000;

const SHIFT_MIN_RATIO: f64 = 2.0;
const SHIFT_MODERATE_RATIO: f64 = 3.0;
const SHIFT_STRONG_RATIO: f64 = 4.0;

const ICEBERG_MIN_SIZE_DELTA: u64 = 15_000;
const ICEBERG_MAX_PRICE_TICKS: f64 = 2.0;

/// Runs every detector and returns the candidates in kind-alphabetical
/// order, bid side before ask within a kind.
#[must_use]
pub fn detect(quotes: &[Quote], metrics: &WindowMetrics, tick: f64) -> Vec<Pattern> {
	let mut patterns = Vec::new();

	for side in [Side::Bid, Side::Ask] {
		if let Some(pattern) = detect_absorption(quotes, side, tick) {
			patterns.push(pattern);
		}
		if let Some(pattern) = detect_stacking(quotes, side, tick) {
			patterns.push(pattern);
		}
	}

	if let Some(pattern) = detect_momentum_shift(metrics, quotes) {
		patterns.push(pattern);
	}

	patterns.extend(detect_icebergs(quotes, tick));

	patterns.sort_by(compare_emission);
	patterns
}

fn compare_emission(left: &Pattern, right: &Pattern) -> std::cmp::Ordering {
	left.kind
		.cmp(&right.kind)
		.then(left.side.cmp(&right.side))
		.then(left.timestamp.cmp(&right.timestamp))
}

/// A price holding inside one tick for at least 15 s against sustained
/// large displayed size. First qualifying run wins, one pattern per side.
fn detect_absorption(quotes: &[Quote], side: Side, tick: f64) -> Option<Pattern> {
	let mut start = 0;
	while start < quotes.len() {
		let mut low = quotes[start].side_price(side);
		let mut high = low;
		let mut end = start;

		while end + 1 < quotes.len() {
			let price = quotes[end + 1].side_price(side);
			let (next_low, next_high) = (low.min(price), high.max(price));
			if next_high - next_low >= tick {
				break;
			}
			low = next_low;
			high = next_high;
			end += 1;
		}

		let run = &quotes[start..=end];
		let span_ms = run[run.len() - 1].timestamp - run[0].timestamp;
		if span_ms >= ABSORPTION_MIN_RUN_MS {
			let mean_size = run.iter().map(|quote| quote.side_size(side)).sum::<u64>() as f64 / run.len() as f64;
			if mean_size > ABSORPTION_MIN_MEAN_SIZE {
				let strength = if mean_size > ABSORPTION_STRONG_MEAN_SIZE {
					Strength::Strong
				} else if mean_size > ABSORPTION_MODERATE_MEAN_SIZE {
					Strength::Moderate
				} else {
					Strength::Weak
				};
				let last = &run[run.len() - 1];
				let price_level = round_to_tick(last.side_price(side), tick);

				return Some(Pattern {
					kind: PatternKind::Absorption,
					side,
					strength,
					timestamp: last.timestamp,
					price_level: Some(price_level),
					volume: Some(mean_size * run.len() as f64),
					description: format!(
						"{} held {:.2} for {}s at {:.0} average size",
						side.as_str(),
						price_level,
						span_ms / 1_000,
						mean_size
					),
				});
			}
		}

		start = end + 1;
	}

	None
}

/// Five or more consecutive two-sided quotes with the side's displayed
/// size non-decreasing and at least 5000 throughout.
fn detect_stacking(quotes: &[Quote], side: Side, tick: f64) -> Option<Pattern> {
	let mut run_start = 0;
	let mut run_len = 0;

	for (index, quote) in quotes.iter().enumerate() {
		let qualifies = !quote.is_one_sided() && quote.side_size(side) >= STACKING_MIN_SIZE;
		let continues = run_len > 0 && qualifies && quote.side_size(side) >= quotes[index - 1].side_size(side);

		if continues {
			run_len += 1;
			continue;
		}

		// First qualifying run wins; report it once it ends.
		if run_len >= STACKING_MIN_RUN {
			break;
		}
		if qualifies {
			run_start = index;
			run_len = 1;
		} else {
			run_len = 0;
		}
	}

	if run_len < STACKING_MIN_RUN {
		return None;
	}

	let run = &quotes[run_start..run_start + run_len];
	let last = &run[run.len() - 1];
	let last_size = last.side_size(side);
	let strength = if run_len >= 2 * STACKING_MIN_RUN {
		Strength::Strong
	} else if run_len > STACKING_MIN_RUN {
		Strength::Moderate
	} else {
		Strength::Weak
	};

	Some(Pattern {
		kind: PatternKind::Stacking,
		side,
		strength,
		timestamp: last.timestamp,
		price_level: Some(round_to_tick(last.side_price(side), tick)),
		volume: Some(last_size as f64),
		description: format!("{} quotes building the {} to {}", run_len, side.as_str(), last_size),
	})
}

/// Lift/drop imbalance across the window: the dominant direction must be
/// at least twice the opposing count.
fn detect_momentum_shift(metrics: &WindowMetrics, quotes: &[Quote]) -> Option<Pattern> {
	if metrics.insufficient_data {
		return None;
	}

	let dominant = metrics.bid_lifts.max(metrics.ask_drops);
	let opposing = metrics.bid_drops.min(metrics.ask_lifts).max(1);
	let ratio = f64::from(dominant) / f64::from(opposing);
	if ratio < SHIFT_MIN_RATIO {
		return None;
	}

	let bullish = metrics.bid_lifts >= metrics.ask_drops;
	let strength = if ratio >= SHIFT_STRONG_RATIO {
		Strength::Strong
	} else if ratio >= SHIFT_MODERATE_RATIO {
		Strength::Moderate
	} else {
		Strength::Weak
	};

	Some(Pattern {
		kind: PatternKind::MomentumShift,
		side: Side::None,
		strength,
		timestamp: quotes.last().map_or(0, |quote| quote.timestamp),
		price_level: None,
		volume: None,
		description: format!(
			"{} momentum shift, lift/drop ratio {:.1}",
			if bullish { "bullish" } else { "bearish" },
			ratio
		),
	})
}

/// Sudden displayed-size jump on one side without a matching price move:
/// hidden liquidity being revealed or swept. The side whose size changed
/// emits the event, whatever the direction of the change.
fn detect_icebergs(quotes: &[Quote], tick: f64) -> Vec<Pattern> {
	let mut patterns = Vec::new();

	for pair in quotes.windows(2) {
		let (prev, curr) = (&pair[0], &pair[1]);

		for side in [Side::Bid, Side::Ask] {
			let size_delta = curr.side_size(side).abs_diff(prev.side_size(side));
			if size_delta <= ICEBERG_MIN_SIZE_DELTA {
				continue;
			}
			let price_move = (curr.side_price(side) - prev.side_price(side)).abs();
			if price_move > ICEBERG_MAX_PRICE_TICKS * tick {
				continue;
			}

			let vanished = curr.side_size(side) < prev.side_size(side);
			let strength = if size_delta >= 2 * ICEBERG_MIN_SIZE_DELTA { Strength::Strong } else { Strength::Moderate };
			let price_level = round_to_tick(curr.side_price(side), tick);

			patterns.push(Pattern {
				kind: PatternKind::Iceberg,
				side,
				strength,
				timestamp: curr.timestamp,
				price_level: Some(price_level),
				volume: Some(size_delta as f64),
				description: format!(
					"{} size {} by {} at {:.2}",
					side.as_str(),
					if vanished { "swept" } else { "revealed" },
					size_delta,
					price_level
				),
			});
		}
	}

	patterns
}

/// Collapses duplicate candidates (later timestamp wins) and drops any
/// candidate already represented in the recent log.
#[must_use]
pub fn suppress(candidates: Vec<Pattern>, recent_log: &[Pattern]) -> Vec<Pattern> {
	let mut latest: HashMap<_, Pattern> = HashMap::new();
	for candidate in candidates {
		let key = candidate.suppression_key();
		match latest.get(&key) {
			Some(existing) if existing.timestamp >= candidate.timestamp => {},
			_ => {
				latest.insert(key, candidate);
			},
		}
	}

	let mut kept: Vec<Pattern> = latest
		.into_values()
		.filter(|candidate| {
			!recent_log.iter().any(|logged| {
				logged.suppression_key() == candidate.suppression_key()
					&& (candidate.timestamp - logged.timestamp).abs() <= SUPPRESSION_WINDOW_MS
			})
		})
		.collect();

	kept.sort_by(compare_emission);
	kept
}
