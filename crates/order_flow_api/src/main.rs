use std::sync::Arc;
use std::time::Duration;

use actix_web::{App, HttpServer, web};
use anyhow::Context;
use order_flow::{MemoryStore, OrderFlowEngine, processor};
use tracing::info;

use crate::state::AppState;

mod api;
mod config;
mod cors;
mod state;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
		)
		.init();

	let config = config::Config::load_or_default("config.toml").context("Failed to load configuration")?;
	info!("configuration loaded");

	let store = Arc::new(MemoryStore::new());
	let engine = Arc::new(OrderFlowEngine::new(store, config.engine.clone()));

	tokio::spawn(processor::run(Arc::clone(&engine)));

	let state = AppState::new(engine, Duration::from_millis(config.server.query_deadline_ms));
	let bind = (config.server.host.clone(), config.server.port);
	info!(host = %config.server.host, port = config.server.port, "starting order-flow API");

	HttpServer::new(move || {
		App::new()
			.wrap(cors::build_cors())
			.app_data(web::Data::new(state.clone()))
			.route("/order-flow", web::get().to(api::analyze_order_flow))
			.route("/quotes", web::post().to(api::ingest_quotes))
			.route("/health", web::get().to(api::health))
	})
	.bind(bind)?
	.run()
	.await?;

	Ok(())
}
