//! Functions runtime.
//!
//! Turns a handler function, or an object with a `handle` operation and
//! optional lifecycle hooks, into an HTTP service with liveness/readiness
//! probes, optionally decoding every request as a CloudEvent.
//!
//! # Architecture Overview
//!
//! ```text
//!     LISTEN_ADDRESS ──▶ net::address::plan ──▶ net::listener::Binder ──▶ BoundSocket[]
//!                                                                            │
//!     Client Request                                                         ▼
//!     ─────────────────▶ http::server (axum) ──Scope + body──▶ dispatch::Dispatcher
//!                                                                   │
//!                            ┌──────────────────────────────────────┼─────────────────┐
//!                            ▼                                      ▼                 ▼
//!                   lifecycle::Adapter                       event::codec      function::Function
//!                 (start/stop/alive/ready)                (decode / encode)      (user code)
//!                                                                   │
//!     Client Response                                               ▼
//!     ◀──────────────── http::response::ResponseBuffer ◀── event::EventSender / raw sink
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod function;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod protocol;

pub use config::{Mode, RuntimeConfig};
pub use dispatch::Dispatcher;
pub use error::{Error, Result};
pub use event::{Data, Event, EventSender};
pub use function::{BoxFuture, Function, FunctionError, FunctionHandle};
pub use health::Health;
pub use lifecycle::{serve, Runtime, Shutdown};
pub use protocol::{MessageSource, ResponseSink, Scope};
