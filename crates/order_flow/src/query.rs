//! Query-side plumbing: request parsing and the data gathering that feeds
//! the snapshot formatter.

use crate::error::AnalysisError;
use crate::snapshot::SnapshotData;
use crate::store::QuoteStore;
use crate::types::{PatternKind, TimestampMs, Window};

/// Accepted history range in seconds; out-of-range values clamp.
const MIN_HISTORY_SECS: u64 = 5;
const MAX_HISTORY_SECS: u64 = 3600;

pub const DEFAULT_HISTORY_SECS: u64 = 300;

/// One analysis request, as received from the RPC surface.
#[derive(Debug, Clone)]
pub struct AnalyzeRequest {
	pub ticker: String,
	pub history: Option<String>,
	pub include_patterns: bool,
}

impl AnalyzeRequest {
	#[must_use]
	pub fn new(ticker: impl Into<String>) -> Self {
		Self { ticker: ticker.into(), history: None, include_patterns: true }
	}
}

#[must_use]
pub fn is_valid_ticker(ticker: &str) -> bool {
	(1..=10).contains(&ticker.len()) && ticker.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Uppercases and validates a ticker symbol.
pub fn normalize_ticker(raw: &str) -> Result<String, AnalysisError> {
	let ticker = raw.trim().to_uppercase();
	if is_valid_ticker(&ticker) {
		Ok(ticker)
	} else {
		Err(AnalysisError::InvalidTicker { input: raw.to_string() })
	}
}

/// Parses a history token like `30s`, `5mins` or `1h` into seconds,
/// clamped to the supported range. A missing token means the default.
pub fn parse_history(raw: Option<&str>) -> Result<u64, AnalysisError> {
	let Some(raw) = raw else {
		return Ok(DEFAULT_HISTORY_SECS);
	};

	let invalid = || AnalysisError::InvalidHistory { input: raw.to_string() };

	let token = raw.trim().to_lowercase();
	let digits_end = token.find(|c: char| !c.is_ascii_digit()).ok_or_else(invalid)?;
	let (digits, unit) = token.split_at(digits_end);

	let value: u64 = digits.parse().map_err(|_| invalid())?;
	if value == 0 {
		return Err(invalid());
	}

	let multiplier = match unit {
		"s" | "sec" | "secs" => 1,
		"m" | "min" | "mins" => 60,
		"h" | "hr" | "hrs" => 3600,
		_ => return Err(invalid()),
	};

	Ok((value.saturating_mul(multiplier)).clamp(MIN_HISTORY_SECS, MAX_HISTORY_SECS))
}

/// Collects everything the formatter needs for one snapshot. Reads only;
/// every store failure propagates as `StoreUnavailable`.
pub(crate) async fn gather(
	store: &dyn QuoteStore,
	ticker: &str,
	history_secs: u64,
	include_patterns: bool,
	now_ms: TimestampMs,
) -> Result<SnapshotData, AnalysisError> {
	let Some(latest) = store.latest(ticker).await? else {
		return Err(AnalysisError::NoData { ticker: ticker.to_string() });
	};

	let from_ms = now_ms - history_secs as TimestampMs * 1000;
	let quote_count = store.range(ticker, from_ms, now_ms).await?.len();
	if quote_count == 0 {
		return Err(AnalysisError::NoData { ticker: ticker.to_string() });
	}

	let mut metrics = Vec::new();
	for window in Window::ALL {
		if window.seconds() > history_secs && window != Window::Secs10 {
			continue;
		}
		let record = store
			.metrics(ticker, window, now_ms)
			.await?
			.unwrap_or_else(|| crate::types::WindowMetrics::insufficient(window, 0));
		metrics.push(record);
	}

	let behaviors = store.behaviors(ticker, now_ms).await?.unwrap_or_default();
	let bid_levels = store.levels(ticker, crate::types::Side::Bid, now_ms).await?;
	let ask_levels = store.levels(ticker, crate::types::Side::Ask, now_ms).await?;

	let window_patterns = store.patterns_between(ticker, from_ms, now_ms).await?;
	let pattern_count = window_patterns.len();
	let sweeps = window_patterns.iter().filter(|pattern| pattern.kind == PatternKind::Iceberg).cloned().collect();
	let patterns = include_patterns.then_some(window_patterns);

	Ok(SnapshotData {
		ticker: ticker.to_string(),
		now_ms,
		history_secs,
		latest,
		quote_count,
		pattern_count,
		metrics,
		behaviors,
		bid_levels,
		ask_levels,
		sweeps,
		patterns,
	})
}
