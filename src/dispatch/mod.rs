//! Dispatch subsystem: the state machine between transport and function.
//!
//! # Data Flow
//! ```text
//! transport call(scope, receive, send)
//!     → lifespan:  Startup → start hook → StartupComplete   (LifespanWait → Started)
//!                  Shutdown → stop hook → ShutdownComplete  (→ Stopped)
//!     → request:   not Started          → 503
//!                  non-HTTP kind        → 400
//!                  /health/*            → lifecycle probe
//!                  event mode           → decode → 400 | handler(EventSender)
//!                  plain mode           → handler(raw sink)
//!     → handler failure → error event (event sink) or text 500
//! ```
//!
//! # Design Decisions
//! - One dispatcher per process, shared by every connection, lock-free
//! - Routing is decided per request; only the lifespan moves the state
//! - The sink handed to the handler is chosen per request, never swapped
//!   in place

pub mod dispatcher;

pub use dispatcher::{Dispatcher, State};
