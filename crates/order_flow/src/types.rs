use serde::{Deserialize, Serialize};

pub type TimestampMs = i64;

/// Fixed set of analysis windows; every derived record is scoped to one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Window {
	Secs10,
	Secs60,
	Min5,
}

impl Window {
	pub const ALL: [Self; 3] = [Self::Secs10, Self::Secs60, Self::Min5];

	#[must_use]
	pub const fn seconds(self) -> u64 {
		match self {
			Self::Secs10 => 10,
			Self::Secs60 => 60,
			Self::Min5 => 300,
		}
	}

	#[must_use]
	pub const fn millis(self) -> TimestampMs {
		self.seconds() as TimestampMs * 1000
	}

	#[must_use]
	pub const fn label(self) -> &'static str {
		match self {
			Self::Secs10 => "last_10s",
			Self::Secs60 => "last_60s",
			Self::Min5 => "last_5min",
		}
	}
}

/// Immutable top-of-book observation for one ticker at one timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
	pub ticker: String,
	pub timestamp: TimestampMs,
	pub bid_price: f64,
	pub ask_price: f64,
	pub bid_size: u64,
	pub ask_size: u64,
}

impl Quote {
	#[must_use]
	pub fn mid(&self) -> f64 {
		f64::midpoint(self.bid_price, self.ask_price)
	}

	#[must_use]
	pub fn spread(&self) -> f64 {
		self.ask_price - self.bid_price
	}

	/// One-sided quotes participate in metrics but never in stacking.
	#[must_use]
	pub const fn is_one_sided(&self) -> bool {
		self.bid_size == 0 || self.ask_size == 0
	}

	#[must_use]
	pub const fn side_price(&self, side: Side) -> f64 {
		match side {
			Side::Ask => self.ask_price,
			_ => self.bid_price,
		}
	}

	#[must_use]
	pub const fn side_size(&self, side: Side) -> u64 {
		match side {
			Side::Ask => self.ask_size,
			_ => self.bid_size,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Side {
	Bid,
	Ask,
	None,
}

impl Side {
	#[must_use]
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Bid => "bid",
			Self::Ask => "ask",
			Self::None => "none",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Strength {
	Weak,
	Moderate,
	Strong,
}

impl Strength {
	#[must_use]
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Weak => "weak",
			Self::Moderate => "moderate",
			Self::Strong => "strong",
		}
	}
}

// Declaration order matches the alphabetical emission order of the labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PatternKind {
	Absorption,
	Iceberg,
	MomentumShift,
	Stacking,
}

impl PatternKind {
	#[must_use]
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Absorption => "absorption",
			Self::Iceberg => "iceberg",
			Self::MomentumShift => "momentum_shift",
			Self::Stacking => "stacking",
		}
	}
}

/// Discrete microstructure event appended to the per-ticker pattern log.
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
	pub kind: PatternKind,
	pub side: Side,
	pub strength: Strength,
	pub timestamp: TimestampMs,
	pub price_level: Option<f64>,
	pub volume: Option<f64>,
	pub description: String,
}

impl Pattern {
	/// Suppression identity: kind, side, and price level rounded to the cent.
	#[must_use]
	pub fn suppression_key(&self) -> (PatternKind, Side, Option<i64>) {
		(self.kind, self.side, self.price_level.map(|price| (price * 100.0).round() as i64))
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeAcceleration {
	Increasing,
	Stable,
	Decreasing,
}

impl SizeAcceleration {
	#[must_use]
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Increasing => "INCREASING",
			Self::Stable => "STABLE",
			Self::Decreasing => "DECREASING",
		}
	}
}

/// Momentum and size-dynamics summary for one (ticker, window) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowMetrics {
	pub window: Window,
	pub bid_price_change: f64,
	pub ask_price_change: f64,
	pub bid_size_change: i64,
	pub ask_size_change: i64,
	pub bid_lifts: u32,
	pub bid_drops: u32,
	pub ask_lifts: u32,
	pub ask_drops: u32,
	pub avg_bid_size: f64,
	pub avg_ask_size: f64,
	pub large_bid_count: u32,
	pub large_ask_count: u32,
	pub bid_size_acceleration: SizeAcceleration,
	pub ask_size_acceleration: SizeAcceleration,
	pub quotes_per_second: f64,
	pub price_velocity: f64,
	pub size_turnover: f64,
	pub quote_count: usize,
	pub insufficient_data: bool,
}

impl WindowMetrics {
	/// Zero-valued record for windows that cannot be computed.
	#[must_use]
	pub const fn insufficient(window: Window, quote_count: usize) -> Self {
		Self {
			window,
			bid_price_change: 0.0,
			ask_price_change: 0.0,
			bid_size_change: 0,
			ask_size_change: 0,
			bid_lifts: 0,
			bid_drops: 0,
			ask_lifts: 0,
			ask_drops: 0,
			avg_bid_size: 0.0,
			avg_ask_size: 0.0,
			large_bid_count: 0,
			large_ask_count: 0,
			bid_size_acceleration: SizeAcceleration::Stable,
			ask_size_acceleration: SizeAcceleration::Stable,
			quotes_per_second: 0.0,
			price_velocity: 0.0,
			size_turnover: 0.0,
			quote_count,
			insufficient_data: true,
		}
	}
}

/// Market-behavior flags derived fresh each tick from the 60 s window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BehaviorFlags {
	pub bid_stacking: bool,
	pub ask_pulling: bool,
	pub spread_tightening: bool,
	pub momentum_building: bool,
}

/// Weighted score of a resting price on one side of the book.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceLevel {
	pub price: f64,
	pub appearances: u32,
	pub total_size: u64,
	pub last_seen: TimestampMs,
	pub significance: f64,
}

#[must_use]
pub fn now_ms() -> TimestampMs {
	chrono::Utc::now().timestamp_millis()
}

/// ISO-8601 with seconds precision, e.g. `2026-08-01T14:03:07Z`.
#[must_use]
pub fn format_timestamp(ts: TimestampMs) -> String {
	chrono::DateTime::<chrono::Utc>::from_timestamp_millis(ts)
		.unwrap_or_default()
		.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

#[must_use]
pub fn round4(value: f64) -> f64 {
	(value * 10_000.0).round() / 10_000.0
}

#[must_use]
pub fn round2(value: f64) -> f64 {
	(value * 100.0).round() / 100.0
}

#[must_use]
pub fn round_to_tick(price: f64, tick: f64) -> f64 {
	if tick <= 0.0 {
		return price;
	}
	round4((price / tick).round() * tick)
}
