//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events inside their component span (logging.rs installs the sink)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout (pretty, compact or JSON lines)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - The library never installs a global subscriber; the binary does
//! - Request ID flows from the transport into the Scope and the request span
//! - Metric updates are cheap when no recorder is installed

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
