//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Plan addresses → Bind sockets → Lifespan Startup → start hook → Serve
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain requests → Lifespan Shutdown → stop hook
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!
//! Hooks (adapter.rs):
//!     FunctionHandle's optional start/stop/alive/ready, with defaults
//! ```
//!
//! # Design Decisions
//! - Fail fast: address and bind errors are fatal before anything runs
//! - Listeners start last (traffic only after the start hook succeeded)
//! - Draining has a deadline; the stop hook runs regardless

pub mod adapter;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use adapter::Adapter;
pub use shutdown::Shutdown;
pub use signals::shutdown_signal;
pub use startup::{serve, Runtime};
