//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! LISTEN_ADDRESS ("[::]:8080,0.0.0.0:8080")
//!     → address.rs (split, validate, complete IPv4 wildcard)
//!     → listener.rs (bind each spec, v6-only IPv6 sockets)
//!     → BoundSocket list handed to the HTTP layer
//! ```
//!
//! # Design Decisions
//! - Binding happens before the function starts so a port conflict fails
//!   fast, without running user start hooks
//! - Per-address failures are warnings; an empty result is fatal

pub mod address;
pub mod connection;
pub mod listener;

pub use address::{plan, AddressError, Host, ListenSpec};
pub use listener::{Binder, BoundSocket, NoSocketsBoundError};
