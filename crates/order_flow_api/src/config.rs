use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use order_flow::EngineConfig;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
	pub server: ServerConfig,
	pub engine: EngineConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
	pub host: String,
	pub port: u16,
	pub query_deadline_ms: u64,
}

impl Default for Config {
	fn default() -> Self {
		Self { server: ServerConfig::default(), engine: EngineConfig::default() }
	}
}

impl Default for ServerConfig {
	fn default() -> Self {
		Self { host: "0.0.0.0".to_string(), port: 8080, query_deadline_ms: 2_000 }
	}
}

impl Config {
	/// Loads `config.toml` when present; a missing file means defaults.
	pub fn load_or_default(path: &str) -> Result<Self> {
		if !Path::new(path).exists() {
			return Ok(Self::default());
		}

		let content = fs::read_to_string(path).with_context(|| format!("Failed to read config file: {path}"))?;
		let config: Self = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
		config.validate()?;

		Ok(config)
	}

	fn validate(&self) -> Result<()> {
		if self.server.query_deadline_ms == 0 {
			anyhow::bail!("query_deadline_ms must be positive");
		}
		self.engine.validate()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn missing_file_means_defaults() {
		let config = Config::load_or_default("does-not-exist.toml").unwrap();
		assert_eq!(config.server.port, 8080);
		assert_eq!(config.engine.quote_ttl_seconds, 3600);
	}

	#[test]
	fn nested_sections_parse() {
		let config: Config = toml::from_str(
			"[server]\nport = 9000\n\n[engine]\nprocessor_interval_seconds = 0.5\n",
		)
		.unwrap();
		assert_eq!(config.server.port, 9000);
		assert_eq!(config.engine.processor_interval_seconds, 0.5);
		assert_eq!(config.server.query_deadline_ms, 2_000);
	}
}
