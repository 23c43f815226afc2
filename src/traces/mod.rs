//! Trace-level service health derived from Jaeger query results.

pub mod analyzer;
pub mod models;

pub use analyzer::TraceAnalyzer;
pub use models::{DependencyEdge, ErrorTrace, LatencyStats, TraceSnapshot};
