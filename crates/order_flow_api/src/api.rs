use actix_web::{Error, HttpResponse, Responder, web};
use order_flow::{AnalyzeRequest, IngestError, Quote};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct OrderFlowQuery {
	pub ticker: String,
	pub history: Option<String>,
	pub include_patterns: Option<bool>,
}

#[derive(Debug, Serialize)]
struct IngestReceipt {
	accepted: usize,
}

/// The one analysis operation. The engine always renders a document, so
/// this handler only ever fails at the transport layer.
pub async fn analyze_order_flow(state: web::Data<AppState>, query: web::Query<OrderFlowQuery>) -> impl Responder {
	let request = AnalyzeRequest {
		ticker: query.ticker.clone(),
		history: query.history.clone(),
		include_patterns: query.include_patterns.unwrap_or(true),
	};

	debug!(ticker = %request.ticker, history = ?request.history, "analyze_order_flow");

	let document = state.engine.analyze_order_flow(&request, state.query_deadline).await;
	HttpResponse::Ok().content_type("application/xml").body(document)
}

/// Publisher write path: a JSON array of quotes appended in order.
pub async fn ingest_quotes(state: web::Data<AppState>, payload: web::Json<Vec<Quote>>) -> Result<impl Responder, Error> {
	let quotes = payload.into_inner();
	let mut accepted = 0;

	for quote in quotes {
		match state.engine.ingest(quote).await {
			Ok(()) => accepted += 1,
			Err(IngestError::Store(err)) => {
				return Err(actix_web::error::ErrorServiceUnavailable(err.to_string()));
			},
			Err(err) => return Err(actix_web::error::ErrorBadRequest(err.to_string())),
		}
	}

	Ok(HttpResponse::Ok().json(IngestReceipt { accepted }))
}

pub async fn health() -> impl Responder {
	HttpResponse::Ok().body("ok")
}
