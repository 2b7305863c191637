use thiserror::Error;

/// Failure of the backing quote store. The store itself never retries;
/// retry policy lives in the processor loop.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
	#[error("backing store unavailable: {reason}")]
	Unavailable { reason: String },
}

/// Publisher-side rejection of an incoming quote.
#[derive(Debug, Error)]
pub enum IngestError {
	#[error("ticker must be 1-10 alphanumeric characters, got {0:?}")]
	InvalidTicker(String),
	#[error("bid price must be positive, got {0}")]
	NonPositiveBid(f64),
	#[error("ask price {ask} is below bid price {bid}")]
	CrossedBook { bid: f64, ask: f64 },
	#[error(transparent)]
	Store(#[from] StoreError),
}

/// Recoverable analysis failures. Every variant renders as an error
/// snapshot document rather than a transport error.
#[derive(Debug, Error)]
pub enum AnalysisError {
	#[error("no quote data available for {ticker} within the lookback window")]
	NoData { ticker: String },
	#[error("invalid ticker symbol: {input:?}")]
	InvalidTicker { input: String },
	#[error("invalid history window: {input:?}")]
	InvalidHistory { input: String },
	#[error("quote store unavailable: {0}")]
	StoreUnavailable(#[from] StoreError),
	#[error("analysis deadline of {deadline_ms}ms exceeded")]
	Timeout { deadline_ms: u64 },
	#[error("internal analysis failure ({code})")]
	Internal { code: &'static str },
}

impl AnalysisError {
	/// Stable machine-readable code carried in the error snapshot.
	#[must_use]
	pub const fn code(&self) -> &'static str {
		match self {
			Self::NoData { .. } => "NoData",
			Self::InvalidTicker { .. } => "InvalidTicker",
			Self::InvalidHistory { .. } => "InvalidHistory",
			Self::StoreUnavailable(_) => "StoreUnavailable",
			Self::Timeout { .. } => "Timeout",
			Self::Internal { .. } => "InternalError",
		}
	}

	#[must_use]
	pub fn possible_causes(&self) -> Vec<String> {
		match self {
			Self::NoData { ticker } => vec![
				format!("No upstream subscription is publishing quotes for {ticker}"),
				"The ticker was evicted after ten minutes without new quotes".to_string(),
				"Market is closed and the quote buffer has fully expired".to_string(),
			],
			Self::InvalidTicker { .. } => {
				vec!["Ticker symbols are 1-10 alphanumeric characters, e.g. SPY or QQQ".to_string()]
			},
			Self::InvalidHistory { .. } => vec![
				"History is a positive integer followed by s, sec, secs, m, min, mins, h, hr or hrs".to_string(),
				"The engine retains at most one hour of quotes".to_string(),
			],
			Self::StoreUnavailable(_) => vec![
				"The quote store backend is down or unreachable".to_string(),
				"A network partition between the engine and its store".to_string(),
			],
			Self::Timeout { .. } => vec!["The store responded slower than the query deadline".to_string()],
			Self::Internal { .. } => vec!["An unexpected derivation failure inside the analysis engine".to_string()],
		}
	}

	#[must_use]
	pub fn suggestions(&self) -> Vec<String> {
		match self {
			Self::NoData { ticker } => vec![
				format!("Confirm the upstream broker is publishing quotes for {ticker}"),
				"Retry once fresh quotes have been ingested".to_string(),
				"Use a shorter history window if the session just started".to_string(),
			],
			Self::InvalidTicker { .. } => vec![
				"Pass the bare exchange symbol in uppercase".to_string(),
				"Strip exchange prefixes and punctuation from the symbol".to_string(),
			],
			Self::InvalidHistory { .. } => vec![
				"Use a form like 30s, 5mins or 1h".to_string(),
				"Stay within the supported range of 5 seconds to 1 hour".to_string(),
			],
			Self::StoreUnavailable(_) => vec![
				"Retry the query after a short delay".to_string(),
				"Check connectivity to the quote store backend".to_string(),
			],
			Self::Timeout { .. } => vec![
				"Retry the query".to_string(),
				"Reduce concurrent query load on the engine".to_string(),
			],
			Self::Internal { .. } => vec!["Report the error code together with the queried ticker".to_string()],
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn codes_are_stable() {
		assert_eq!(AnalysisError::NoData { ticker: "ZZZZ".to_string() }.code(), "NoData");
		assert_eq!(AnalysisError::InvalidHistory { input: "3fortnights".to_string() }.code(), "InvalidHistory");
		assert_eq!(AnalysisError::Timeout { deadline_ms: 500 }.code(), "Timeout");
		assert_eq!(AnalysisError::Internal { code: "derive-metrics" }.code(), "InternalError");
	}

	#[test]
	fn no_data_carries_three_suggestions() {
		let err = AnalysisError::NoData { ticker: "ZZZZ".to_string() };
		assert_eq!(err.suggestions().len(), 3);
		assert_eq!(err.possible_causes().len(), 3);
	}

	#[test]
	fn internal_error_message_has_no_backtrace() {
		let err = AnalysisError::Internal { code: "level-scan" };
		assert_eq!(err.to_string(), "internal analysis failure (level-scan)");
	}
}
