//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! registry + dispatch produce:
//!     → tracing events (rule registration, stage outcomes)
//!     → metrics.rs (dispatch counter, registry gauge)
//!
//! Consumers:
//!     → Host log subscriber (stdout, JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - The library only emits; subscribers and recorders are installed by
//!   the host binary, so embedding the engine costs nothing by default
//! - Request ID flows through all dispatch events
//! - Metric labels kept low-cardinality (outcome name only, never URL
//!   patterns)

pub mod metrics;
