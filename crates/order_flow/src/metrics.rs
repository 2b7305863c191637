//! Pure window math: a time-ordered quote slice in, a metrics record out.
//! Numeric pitfalls (short slices, empty sides) take explicit
//! `insufficient_data` branches instead of surfacing as errors.

use crate::types::{Quote, SizeAcceleration, TimestampMs, Window, WindowMetrics, round4};

/// Tail of `quotes` whose timestamps fall within the window ending at `now_ms`.
#[must_use]
pub fn window_slice(quotes: &[Quote], window: Window, now_ms: TimestampMs) -> &[Quote] {
	let cutoff = now_ms - window.millis();
	let start = quotes.partition_point(|quote| quote.timestamp < cutoff);
	&quotes[start..]
}

/// True when the slice spans at least the full window duration.
#[must_use]
pub fn covers_window(quotes: &[Quote], window: Window, now_ms: TimestampMs) -> bool {
	quotes.first().is_some_and(|first| first.timestamp <= now_ms - window.millis())
}

#[must_use]
pub fn compute(window: Window, quotes: &[Quote], large_size_threshold: u64) -> WindowMetrics {
	let count = quotes.len();
	let (Some(first), Some(last)) = (quotes.first(), quotes.last()) else {
		return WindowMetrics::insufficient(window, count);
	};
	if count < 2 {
		return WindowMetrics::insufficient(window, count);
	}

	let mut bid_lifts = 0;
	let mut bid_drops = 0;
	let mut ask_lifts = 0;
	let mut ask_drops = 0;
	let mut turnover: u64 = 0;

	for pair in quotes.windows(2) {
		let (prev, curr) = (&pair[0], &pair[1]);

		// Equal-price transitions count as neither a lift nor a drop.
		if curr.bid_price > prev.bid_price {
			bid_lifts += 1;
		} else if curr.bid_price < prev.bid_price {
			bid_drops += 1;
		}
		if curr.ask_price > prev.ask_price {
			ask_lifts += 1;
		} else if curr.ask_price < prev.ask_price {
			ask_drops += 1;
		}

		turnover += curr.bid_size.abs_diff(prev.bid_size) + curr.ask_size.abs_diff(prev.ask_size);
	}

	let seconds = window.seconds() as f64;

	WindowMetrics {
		window,
		bid_price_change: round4(last.bid_price - first.bid_price),
		ask_price_change: round4(last.ask_price - first.ask_price),
		bid_size_change: last.bid_size as i64 - first.bid_size as i64,
		ask_size_change: last.ask_size as i64 - first.ask_size as i64,
		bid_lifts,
		bid_drops,
		ask_lifts,
		ask_drops,
		avg_bid_size: mean_nonzero(quotes, |quote| quote.bid_size),
		avg_ask_size: mean_nonzero(quotes, |quote| quote.ask_size),
		large_bid_count: quotes.iter().filter(|quote| quote.bid_size > large_size_threshold).count() as u32,
		large_ask_count: quotes.iter().filter(|quote| quote.ask_size > large_size_threshold).count() as u32,
		bid_size_acceleration: classify_acceleration(quotes, |quote| quote.bid_size),
		ask_size_acceleration: classify_acceleration(quotes, |quote| quote.ask_size),
		quotes_per_second: count as f64 / seconds,
		price_velocity: (last.mid() - first.mid()).abs() / seconds,
		size_turnover: turnover as f64 / seconds,
		quote_count: count,
		insufficient_data: false,
	}
}

/// Arithmetic mean over quotes where the side is populated; zero when the
/// side never showed size.
fn mean_nonzero(quotes: &[Quote], size_of: impl Fn(&Quote) -> u64) -> f64 {
	let sizes: Vec<u64> = quotes.iter().map(size_of).filter(|size| *size > 0).collect();
	if sizes.is_empty() {
		return 0.0;
	}
	sizes.iter().sum::<u64>() as f64 / sizes.len() as f64
}

/// Halves comparison: second-half mean against the first, with a 20% band.
fn classify_acceleration(quotes: &[Quote], size_of: impl Fn(&Quote) -> u64) -> SizeAcceleration {
	let midpoint = quotes.len() / 2;
	let (first_half, second_half) = quotes.split_at(midpoint);
	if first_half.is_empty() || second_half.is_empty() {
		return SizeAcceleration::Stable;
	}

	let mean = |half: &[Quote]| half.iter().map(&size_of).sum::<u64>() as f64 / half.len() as f64;
	let first_mean = mean(first_half);
	let second_mean = mean(second_half);

	if second_mean > first_mean * 1.2 {
		SizeAcceleration::Increasing
	} else if second_mean < first_mean * 0.8 {
		SizeAcceleration::Decreasing
	} else {
		SizeAcceleration::Stable
	}
}
