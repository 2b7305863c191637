//! Significant resting price levels: per side, a size-weighted,
//! log-dampened scoreboard over the 5 min window, plus sweep events when a
//! top level disappears between consecutive processor ticks.

use std::collections::HashMap;

use crate::types::{Pattern, PatternKind, PriceLevel, Quote, Side, Strength, TimestampMs, round4};

const MIN_APPEARANCES: u32 = 3;
const MIN_TOTAL_SIZE: u64 = 25_000;
const MAX_LEVELS: usize = 10;

/// Only the strongest previous levels are watched for sweeps.
const SWEEP_WATCH_DEPTH: usize = 5;

/// A sweep means more than 75% of the level's size is gone.
const SWEEP_REMAINING_FRACTION: f64 = 0.25;

#[must_use]
pub fn significance(total_size: u64, appearances: u32) -> f64 {
	total_size as f64 * f64::from(1 + appearances).ln()
}

/// Groups the window's quotes by tick-rounded price on one side and keeps
/// the top qualifying levels by significance.
#[must_use]
pub fn compute_levels(quotes: &[Quote], side: Side, tick: f64) -> Vec<PriceLevel> {
	let mut grouped: HashMap<i64, PriceLevel> = HashMap::new();

	for quote in quotes {
		let price = quote.side_price(side);
		if price <= 0.0 {
			continue;
		}
		let key = (price / tick).round() as i64;

		let entry = grouped.entry(key).or_insert_with(|| PriceLevel {
			price: round4(key as f64 * tick),
			appearances: 0,
			total_size: 0,
			last_seen: quote.timestamp,
			significance: 0.0,
		});
		entry.appearances += 1;
		entry.total_size += quote.side_size(side);
		entry.last_seen = entry.last_seen.max(quote.timestamp);
	}

	let mut levels: Vec<PriceLevel> = grouped
		.into_values()
		.filter(|level| level.appearances >= MIN_APPEARANCES && level.total_size >= MIN_TOTAL_SIZE)
		.map(|mut level| {
			level.significance = significance(level.total_size, level.appearances);
			level
		})
		.collect();

	levels.sort_by(|left, right| {
		right
			.significance
			.partial_cmp(&left.significance)
			.unwrap_or(std::cmp::Ordering::Equal)
			.then_with(|| right.price.partial_cmp(&left.price).unwrap_or(std::cmp::Ordering::Equal))
	});
	levels.truncate(MAX_LEVELS);
	levels
}

/// Compares the previous tick's top levels against the fresh scoreboard
/// and emits a sweep for any watched level that lost more than 75% of its
/// size. Levels are matched by price value, never by identity.
#[must_use]
pub fn detect_sweeps(previous: &[PriceLevel], current: &[PriceLevel], side: Side, now_ms: TimestampMs) -> Vec<Pattern> {
	let mut sweeps = Vec::new();

	for watched in previous.iter().take(SWEEP_WATCH_DEPTH) {
		if watched.total_size == 0 {
			continue;
		}

		let remaining = current
			.iter()
			.find(|level| (level.price - watched.price).abs() < f64::EPSILON)
			.map_or(0, |level| level.total_size);

		if (remaining as f64) < watched.total_size as f64 * SWEEP_REMAINING_FRACTION {
			let gone_pct = 100.0 * (1.0 - remaining as f64 / watched.total_size as f64);
			sweeps.push(Pattern {
				kind: PatternKind::Iceberg,
				side,
				strength: if remaining == 0 { Strength::Strong } else { Strength::Moderate },
				timestamp: now_ms,
				price_level: Some(watched.price),
				volume: Some(watched.total_size as f64),
				description: format!("swept {} level {:.2}, {:.0}% of size gone", side.as_str(), watched.price, gone_pct),
			});
		}
	}

	sweeps
}

#[cfg(test)]
mod tests {
	use super::*;

	const TICK: f64 = 0.01;

	fn quote(timestamp: TimestampMs, bid_price: f64, bid_size: u64) -> Quote {
		Quote { ticker: "SPY".to_string(), timestamp, bid_price, ask_price: bid_price + 0.02, bid_size, ask_size: 1_000 }
	}

	#[test]
	fn qualifying_levels_only() {
		let mut quotes = Vec::new();
		// 449.50 appears five times with deep size.
		for i in 0..5 {
			quotes.push(quote(i * 1_000, 449.50, 10_000));
		}
		// 449.40 appears twice: too few appearances.
		quotes.push(quote(6_000, 449.40, 30_000));
		quotes.push(quote(7_000, 449.40, 30_000));
		// 449.30 appears often but too thin.
		for i in 8..14 {
			quotes.push(quote(i * 1_000, 449.30, 1_000));
		}

		let levels = compute_levels(&quotes, Side::Bid, TICK);
		assert_eq!(levels.len(), 1);
		assert_eq!(levels[0].price, 449.50);
		assert_eq!(levels[0].appearances, 5);
		assert_eq!(levels[0].total_size, 50_000);
		assert_eq!(levels[0].last_seen, 4_000);
	}

	#[test]
	fn levels_sorted_by_significance_and_capped() {
		let mut quotes = Vec::new();
		for rung in 0..12_i64 {
			let price = 449.00 + 0.01 * rung as f64;
			for i in 0..(3 + rung) {
				quotes.push(quote(rung * 100_000 + i * 1_000, round4(price), 12_000));
			}
		}

		let levels = compute_levels(&quotes, Side::Bid, TICK);
		assert_eq!(levels.len(), MAX_LEVELS);
		for pair in levels.windows(2) {
			assert!(pair[0].significance >= pair[1].significance);
		}
		// The most-visited rung carries the top score.
		assert_eq!(levels[0].price, 449.11);
	}

	#[test]
	fn significance_monotone_in_size_and_appearances() {
		assert!(significance(30_000, 5) > significance(25_000, 4));
		assert!(significance(25_000, 5) > significance(25_000, 4));
		assert!(significance(30_000, 4) > significance(25_000, 4));
	}

	#[test]
	fn sweep_on_vanished_level() {
		let previous = vec![PriceLevel {
			price: 450.00,
			appearances: 6,
			total_size: 60_000,
			last_seen: 10_000,
			significance: significance(60_000, 6),
		}];

		let sweeps = detect_sweeps(&previous, &[], Side::Bid, 20_000);
		assert_eq!(sweeps.len(), 1);
		assert_eq!(sweeps[0].kind, PatternKind::Iceberg);
		assert_eq!(sweeps[0].price_level, Some(450.00));
		assert_eq!(sweeps[0].strength, Strength::Strong);
	}

	#[test]
	fn no_sweep_when_size_holds() {
		let level = |total_size| PriceLevel {
			price: 450.00,
			appearances: 6,
			total_size,
			last_seen: 10_000,
			significance: significance(total_size, 6),
		};

		assert!(detect_sweeps(&[level(60_000)], &[level(30_000)], Side::Bid, 20_000).is_empty());
		assert_eq!(detect_sweeps(&[level(60_000)], &[level(10_000)], Side::Bid, 20_000).len(), 1);
	}
}
