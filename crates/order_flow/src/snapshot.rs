//! Snapshot assembly: one tagged element tree, one renderer. Child order,
//! attribute order, and numeric precision are part of the outward contract,
//! so the document is built structurally and never by concatenating
//! optional sections.

use crate::error::AnalysisError;
use crate::types::{
	BehaviorFlags, Pattern, PriceLevel, Quote, TimestampMs, WindowMetrics, format_timestamp, round2,
};

/// One node of the snapshot document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
	name: String,
	attributes: Vec<(String, String)>,
	children: Vec<Element>,
	text: Option<String>,
}

impl Element {
	#[must_use]
	pub fn new(name: impl Into<String>) -> Self {
		Self { name: name.into(), attributes: Vec::new(), children: Vec::new(), text: None }
	}

	#[must_use]
	pub fn attr(mut self, name: &str, value: impl Into<String>) -> Self {
		self.attributes.push((name.to_string(), value.into()));
		self
	}

	#[must_use]
	pub fn text(mut self, value: impl Into<String>) -> Self {
		self.text = Some(value.into());
		self
	}

	#[must_use]
	pub fn child(mut self, child: Self) -> Self {
		self.children.push(child);
		self
	}

	pub fn push(&mut self, child: Self) {
		self.children.push(child);
	}

	/// Attribute lookup, mainly for tests and the coordinator.
	#[must_use]
	pub fn attribute(&self, name: &str) -> Option<&str> {
		self.attributes.iter().find(|(attr, _)| attr == name).map(|(_, value)| value.as_str())
	}

	#[must_use]
	pub fn render(&self) -> String {
		let mut out = String::new();
		self.render_into(&mut out, 0);
		out
	}

	fn render_into(&self, out: &mut String, depth: usize) {
		for _ in 0..depth {
			out.push_str("  ");
		}
		out.push('<');
		out.push_str(&self.name);
		for (name, value) in &self.attributes {
			out.push(' ');
			out.push_str(name);
			out.push_str("=\"");
			push_escaped(out, value);
			out.push('"');
		}

		if self.children.is_empty() && self.text.is_none() {
			out.push_str("/>\n");
			return;
		}

		out.push('>');
		if let Some(text) = &self.text {
			push_escaped(out, text);
		}
		if self.children.is_empty() {
			out.push_str("</");
			out.push_str(&self.name);
			out.push_str(">\n");
			return;
		}

		out.push('\n');
		for child in &self.children {
			child.render_into(out, depth + 1);
		}
		for _ in 0..depth {
			out.push_str("  ");
		}
		out.push_str("</");
		out.push_str(&self.name);
		out.push_str(">\n");
	}
}

fn push_escaped(out: &mut String, raw: &str) {
	for c in raw.chars() {
		match c {
			'&' => out.push_str("&amp;"),
			'<' => out.push_str("&lt;"),
			'>' => out.push_str("&gt;"),
			'"' => out.push_str("&quot;"),
			_ => out.push(c),
		}
	}
}

/// Everything the formatter needs, already gathered from the store.
#[derive(Debug, Clone)]
pub struct SnapshotData {
	pub ticker: String,
	pub now_ms: TimestampMs,
	pub history_secs: u64,
	pub latest: Quote,
	pub quote_count: usize,
	pub pattern_count: usize,
	pub metrics: Vec<WindowMetrics>,
	pub behaviors: BehaviorFlags,
	pub bid_levels: Vec<PriceLevel>,
	pub ask_levels: Vec<PriceLevel>,
	pub sweeps: Vec<Pattern>,
	pub patterns: Option<Vec<Pattern>>,
}

fn fmt_price(value: f64) -> String {
	format!("{value:.4}")
}

fn fmt_ratio(value: f64) -> String {
	format!("{:.2}", round2(value))
}

fn fmt_size(value: f64) -> String {
	format!("{value:.0}")
}

fn yes_no(flag: bool) -> &'static str {
	if flag { "YES" } else { "NO" }
}

/// Composes the full snapshot document. Same data in, same bytes out; only
/// the `timestamp` attribute tracks the clock.
#[must_use]
pub fn compose(data: &SnapshotData) -> Element {
	let mut root = Element::new("order_flow_data")
		.attr("ticker", data.ticker.clone())
		.attr("timestamp", format_timestamp(data.now_ms))
		.attr("current_price", fmt_price(data.latest.mid()))
		.attr("history_window", format!("{}s", data.history_secs));

	root.push(data_summary(data));
	root.push(current_quote(&data.latest));
	root.push(momentum(&data.metrics));
	root.push(size_metrics(&data.metrics));
	root.push(behaviors(data.behaviors));
	root.push(price_levels(data));
	root.push(velocity(&data.metrics));

	if let Some(patterns) = &data.patterns {
		root.push(detected_patterns(patterns, data.history_secs));
	}

	root
}

fn data_summary(data: &SnapshotData) -> Element {
	Element::new("data_summary")
		.child(Element::new("quote_count").text(data.quote_count.to_string()))
		.child(Element::new("window_seconds").text(data.history_secs.to_string()))
		.child(Element::new("pattern_count").text(data.pattern_count.to_string()))
}

fn current_quote(latest: &Quote) -> Element {
	let mid = latest.mid();
	let spread = latest.spread();
	let basis_points = if mid > 0.0 { spread / mid * 10_000.0 } else { 0.0 };
	let ratio = latest.bid_size as f64 / latest.ask_size.max(1) as f64;

	Element::new("current_quote")
		.child(Element::new("bid").attr("price", fmt_price(latest.bid_price)).attr("size", latest.bid_size.to_string()))
		.child(Element::new("ask").attr("price", fmt_price(latest.ask_price)).attr("size", latest.ask_size.to_string()))
		.child(Element::new("bid_ask_ratio").text(fmt_ratio(ratio)))
		.child(Element::new("spread").attr("value", fmt_price(spread)).attr("basis_points", fmt_ratio(basis_points)))
}

fn window_element(record: &WindowMetrics) -> Element {
	let element = Element::new(record.window.label());
	if record.insufficient_data {
		element.attr("insufficient_data", "true")
	} else {
		element
	}
}

fn momentum(metrics: &[WindowMetrics]) -> Element {
	let mut momentum = Element::new("momentum");
	for record in metrics {
		momentum.push(
			window_element(record)
				.child(Element::new("bid_price_change").text(fmt_price(record.bid_price_change)))
				.child(Element::new("ask_price_change").text(fmt_price(record.ask_price_change)))
				.child(Element::new("bid_lifts").text(record.bid_lifts.to_string()))
				.child(Element::new("bid_drops").text(record.bid_drops.to_string()))
				.child(Element::new("ask_lifts").text(record.ask_lifts.to_string()))
				.child(Element::new("ask_drops").text(record.ask_drops.to_string())),
		);
	}
	momentum
}

fn size_metrics(metrics: &[WindowMetrics]) -> Element {
	let mut sizes = Element::new("size_metrics");
	for record in metrics {
		sizes.push(
			window_element(record)
				.child(Element::new("bid_size_change").text(record.bid_size_change.to_string()))
				.child(Element::new("ask_size_change").text(record.ask_size_change.to_string()))
				.child(Element::new("avg_bid_size").text(fmt_size(record.avg_bid_size)))
				.child(Element::new("avg_ask_size").text(fmt_size(record.avg_ask_size)))
				.child(Element::new("large_bid_count").text(record.large_bid_count.to_string()))
				.child(Element::new("large_ask_count").text(record.large_ask_count.to_string()))
				.child(Element::new("bid_size_acceleration").text(record.bid_size_acceleration.as_str()))
				.child(Element::new("ask_size_acceleration").text(record.ask_size_acceleration.as_str()))
				.child(Element::new("size_turnover").text(fmt_ratio(record.size_turnover))),
		);
	}
	sizes
}

fn behaviors(flags: BehaviorFlags) -> Element {
	Element::new("behaviors")
		.child(Element::new("bid_stacking").text(yes_no(flags.bid_stacking)))
		.child(Element::new("ask_pulling").text(yes_no(flags.ask_pulling)))
		.child(Element::new("spread_tightening").text(yes_no(flags.spread_tightening)))
		.child(Element::new("momentum_building").text(yes_no(flags.momentum_building)))
}

fn level_element(level: &PriceLevel) -> Element {
	Element::new("level")
		.attr("price", fmt_price(level.price))
		.attr("total_size", level.total_size.to_string())
		.attr("appearances", level.appearances.to_string())
		.attr("significance", fmt_ratio(level.significance))
}

fn price_levels(data: &SnapshotData) -> Element {
	let mut bid_levels = Element::new("bid_levels");
	for level in &data.bid_levels {
		bid_levels.push(level_element(level));
	}
	let mut ask_levels = Element::new("ask_levels");
	for level in &data.ask_levels {
		ask_levels.push(level_element(level));
	}

	let mut sweeps = Element::new("sweep_events").attr("count", data.sweeps.len().to_string());
	for sweep in &data.sweeps {
		let mut event = Element::new("sweep")
			.attr("side", sweep.side.as_str())
			.attr("strength", sweep.strength.as_str())
			.attr("time", format_timestamp(sweep.timestamp));
		if let Some(price) = sweep.price_level {
			event = event.attr("price", fmt_price(price));
		}
		if let Some(volume) = sweep.volume {
			event = event.attr("volume", fmt_size(volume));
		}
		sweeps.push(event);
	}

	Element::new("price_levels").child(bid_levels).child(ask_levels).child(sweeps)
}

fn velocity(metrics: &[WindowMetrics]) -> Element {
	let mut velocity = Element::new("velocity");
	for record in metrics {
		velocity.push(
			window_element(record)
				.child(Element::new("quotes_per_second").text(fmt_ratio(record.quotes_per_second)))
				.child(Element::new("price_velocity").text(fmt_price(record.price_velocity))),
		);
	}
	velocity
}

fn detected_patterns(patterns: &[Pattern], history_secs: u64) -> Element {
	let mut detected = Element::new("detected_patterns")
		.attr("count", patterns.len().to_string())
		.attr("window", format!("{history_secs}s"));

	for pattern in patterns {
		let mut element = Element::new("pattern")
			.attr("kind", pattern.kind.as_str())
			.attr("side", pattern.side.as_str())
			.attr("strength", pattern.strength.as_str())
			.attr("time", format_timestamp(pattern.timestamp));
		if let Some(price) = pattern.price_level {
			element = element.attr("price_level", fmt_price(price));
		}
		if let Some(volume) = pattern.volume {
			element = element.attr("volume", fmt_size(volume));
		}
		detected.push(element.text(pattern.description.clone()));
	}

	detected
}

/// Error snapshot: the same root element and attribute set, `error="true"`,
/// and a message with causes and suggestions instead of market data. With no
/// quote to derive a mid from, `current_price` renders as zero.
#[must_use]
pub fn error_snapshot(ticker: &str, history_secs: u64, error: &AnalysisError, now_ms: TimestampMs) -> Element {
	let mut causes = Element::new("possible_causes");
	for cause in error.possible_causes() {
		causes.push(Element::new("cause").text(cause));
	}
	let mut suggestions = Element::new("suggestions");
	for suggestion in error.suggestions() {
		suggestions.push(Element::new("suggestion").text(suggestion));
	}

	Element::new("order_flow_data")
		.attr("ticker", ticker)
		.attr("timestamp", format_timestamp(now_ms))
		.attr("current_price", fmt_price(0.0))
		.attr("history_window", format!("{history_secs}s"))
		.attr("error", "true")
		.child(Element::new("error_message").attr("code", error.code()).text(error.to_string()))
		.child(causes)
		.child(suggestions)
}
