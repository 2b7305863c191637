//! Order-flow analysis engine: ingests top-of-book quotes per ticker,
//! derives momentum, size-dynamics, behaviors, patterns and significant
//! price levels over rolling windows, and renders deterministic snapshot
//! documents on demand.

pub mod behavior;
pub mod config;
pub mod engine;
pub mod error;
pub mod levels;
pub mod metrics;
pub mod patterns;
pub mod processor;
pub mod query;
pub mod snapshot;
pub mod store;
pub mod types;

pub use config::EngineConfig;
pub use engine::{EngineStats, OrderFlowEngine};
pub use error::{AnalysisError, IngestError, StoreError};
pub use query::AnalyzeRequest;
pub use store::{MemoryStore, QuoteStore};
pub use types::Quote;
