use anyhow::Result;
use serde::Deserialize;
use std::collections::HashMap;

/// Engine configuration. Loaded once at startup and immutable afterwards;
/// the enumerated options are the whole surface, there is no key/value bag.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
	pub processor_interval_seconds: f64,
	pub quote_ttl_seconds: u64,
	pub pattern_ttl_seconds: u64,
	pub tick_size: f64,
	pub tick_size_overrides: HashMap<String, f64>,
	pub large_size_threshold: u64,
	pub tracked_idle_evict_seconds: u64,
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			processor_interval_seconds: 1.0,
			quote_ttl_seconds: 3600,
			pattern_ttl_seconds: 3600,
			tick_size: 0.01,
			tick_size_overrides: HashMap::new(),
			large_size_threshold: 10_000,
			tracked_idle_evict_seconds: 600,
		}
	}
}

impl EngineConfig {
	pub fn validate(&self) -> Result<()> {
		if !(0.1..=10.0).contains(&self.processor_interval_seconds) {
			anyhow::bail!("processor_interval_seconds must be within [0.1, 10]");
		}

		if self.quote_ttl_seconds == 0 {
			anyhow::bail!("quote_ttl_seconds must be positive");
		}

		if self.pattern_ttl_seconds == 0 {
			anyhow::bail!("pattern_ttl_seconds must be positive");
		}

		if self.tick_size <= 0.0 {
			anyhow::bail!("tick_size must be positive");
		}

		for (ticker, tick) in &self.tick_size_overrides {
			if *tick <= 0.0 {
				anyhow::bail!("tick_size override for {ticker} must be positive");
			}
		}

		if self.large_size_threshold == 0 {
			anyhow::bail!("large_size_threshold must be positive");
		}

		if self.tracked_idle_evict_seconds == 0 {
			anyhow::bail!("tracked_idle_evict_seconds must be positive");
		}

		Ok(())
	}

	/// Minimum price increment for a ticker, falling back to the default.
	#[must_use]
	pub fn tick_size_for(&self, ticker: &str) -> f64 {
		self.tick_size_overrides.get(ticker).copied().unwrap_or(self.tick_size)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_pass_validation() {
		let config = EngineConfig::default();
		assert!(config.validate().is_ok());
		assert_eq!(config.quote_ttl_seconds, 3600);
		assert_eq!(config.large_size_threshold, 10_000);
	}

	#[test]
	fn rejects_out_of_range_interval() {
		let config = EngineConfig { processor_interval_seconds: 30.0, ..EngineConfig::default() };
		assert!(config.validate().is_err());

		let config = EngineConfig { processor_interval_seconds: 0.05, ..EngineConfig::default() };
		assert!(config.validate().is_err());
	}

	#[test]
	fn tick_size_override_lookup() {
		let mut config = EngineConfig::default();
		config.tick_size_overrides.insert("BRKA".to_string(), 1.0);
		assert_eq!(config.tick_size_for("BRKA"), 1.0);
		assert_eq!(config.tick_size_for("SPY"), 0.01);
	}

	#[test]
	fn parses_partial_toml() {
		let config: EngineConfig = toml::from_str("processor_interval_seconds = 0.5\nlarge_size_threshold = 20000\n").unwrap();
		assert_eq!(config.processor_interval_seconds, 0.5);
		assert_eq!(config.large_size_threshold, 20_000);
		assert_eq!(config.quote_ttl_seconds, 3600);
	}
}
