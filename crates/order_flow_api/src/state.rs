use std::sync::Arc;
use std::time::Duration;

use order_flow::OrderFlowEngine;

#[derive(Clone)]
pub struct AppState {
	pub engine: Arc<OrderFlowEngine>,
	pub query_deadline: Duration,
}

impl AppState {
	#[must_use]
	pub const fn new(engine: Arc<OrderFlowEngine>, query_deadline: Duration) -> Self {
		Self { engine, query_deadline }
	}
}
