//! HTTP transport subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (listener from net::BoundSocket)
//!     → server.rs (Axum setup, request ID + trace layers)
//!     → request.rs (Scope + streaming BodySource)
//!     → dispatch::Dispatcher::call
//!     → response.rs (ResponseBuffer → axum Response)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{into_dispatch, BodySource, X_REQUEST_ID};
pub use response::ResponseBuffer;
pub use server::HttpServer;
