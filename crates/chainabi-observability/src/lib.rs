//! # chainabi-observability
//!
//! OpenTelemetry metrics and `tracing` setup for ChainABI.
//!
//! ## Built-in metrics
//! - `chainabi.calls_decoded`       counter, tagged with contract and allocation mode
//! - `chainabi.events_decoded`      counter, tagged with event name
//! - `chainabi.decode_errors`       counter, tagged with error kind
//! - `chainabi.allocation_failures` counter
//! - `chainabi.suspensions`         counter, tagged with request kind
//! - `chainabi.decode_latency_ms`   histogram, tagged with operation

pub mod metrics;
pub mod tracing_setup;

pub use metrics::ChainAbiMetrics;
pub use tracing_setup::{init_tracing, try_init_tracing, LogConfig, TracingError};
