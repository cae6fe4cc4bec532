//! Socket binding for planned listen addresses.
//!
//! # Responsibilities
//! - Bind one socket per [`ListenSpec`], IPv6 sockets with `IPV6_V6ONLY`
//! - Skip addresses that cannot be bound, logging the cause
//! - Hand bound, not-yet-listening sockets to the HTTP layer by descriptor
//!
//! # Design Decisions
//! - A single failed address never aborts binding; zero bound sockets does
//! - Sockets are bound eagerly at startup so port conflicts surface before
//!   the function's start hook runs

use std::io;
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};

use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use thiserror::Error;
use tokio::net::TcpListener;

use crate::net::address::{Host, ListenSpec};

/// Returned when every planned address failed to bind.
#[derive(Debug, Error)]
#[error("failed to bind any sockets ({attempted} address(es) attempted)")]
pub struct NoSocketsBoundError {
    /// Number of specs that were tried.
    pub attempted: usize,
}

/// A socket bound to its address but not yet listening.
///
/// Consumed exactly once by [`BoundSocket::into_listener`].
#[derive(Debug)]
pub struct BoundSocket {
    spec: ListenSpec,
    local_addr: SocketAddr,
    socket: Socket,
}

impl BoundSocket {
    /// The spec this socket was bound for.
    pub fn spec(&self) -> &ListenSpec {
        &self.spec
    }

    /// The concrete bound address (resolves port 0 to the assigned port).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Pass-by-descriptor form of this socket, e.g. `fd://7`.
    #[cfg(unix)]
    pub fn descriptor(&self) -> String {
        use std::os::fd::AsRawFd;
        format!("fd://{}", self.socket.as_raw_fd())
    }

    /// Pass-by-descriptor form of this socket.
    #[cfg(not(unix))]
    pub fn descriptor(&self) -> String {
        format!("tcp://{}", self.local_addr)
    }

    /// Start listening and register the socket with the tokio reactor.
    ///
    /// Must be called from within a tokio runtime.
    pub fn into_listener(self, backlog: u32) -> io::Result<TcpListener> {
        let backlog = i32::try_from(backlog).unwrap_or(i32::MAX);
        self.socket.listen(backlog)?;
        self.socket.set_nonblocking(true)?;
        let listener: std::net::TcpListener = self.socket.into();
        TcpListener::from_std(listener)
    }
}

/// Binds planned listen specs into sockets.
#[derive(Debug, Clone)]
pub struct Binder {
    ipv6_available: bool,
    span: tracing::Span,
}

impl Binder {
    /// Create a binder, probing the host for dual-stack IPv6 support.
    pub fn new() -> Self {
        Self {
            ipv6_available: has_dualstack_ipv6(),
            span: tracing::info_span!("binder"),
        }
    }

    /// Override IPv6 availability (mostly useful for tests).
    pub fn with_ipv6(mut self, available: bool) -> Self {
        self.ipv6_available = available;
        self
    }

    /// Use a caller-provided span for this binder's log lines.
    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    /// Bind every spec, skipping the ones that fail.
    pub fn bind(&self, specs: &[ListenSpec]) -> Result<Vec<BoundSocket>, NoSocketsBoundError> {
        let _entered = self.span.enter();
        let mut bound = Vec::with_capacity(specs.len());

        for spec in specs {
            if matches!(spec.host(), Host::Ipv6(_)) && !self.ipv6_available {
                tracing::warn!(address = %spec, "not binding since IPv6 is not available");
                continue;
            }

            match bind_one(spec) {
                Ok(socket) => {
                    tracing::info!(
                        address = %spec,
                        local_addr = %socket.local_addr,
                        descriptor = %socket.descriptor(),
                        "socket bound"
                    );
                    bound.push(socket);
                }
                Err(e) => {
                    tracing::error!(address = %spec, error = %e, "cannot bind socket");
                }
            }
        }

        if bound.is_empty() {
            return Err(NoSocketsBoundError { attempted: specs.len() });
        }
        Ok(bound)
    }
}

impl Default for Binder {
    fn default() -> Self {
        Self::new()
    }
}

/// True when the host can open an IPv6 socket that also accepts IPv4.
///
/// Only used as an "is IPv6 usable at all" probe; bound sockets are always
/// made v6-only.
pub fn has_dualstack_ipv6() -> bool {
    Socket::new(Domain::IPV6, Type::STREAM, Some(Protocol::TCP))
        .and_then(|socket| socket.set_only_v6(false))
        .is_ok()
}

fn bind_one(spec: &ListenSpec) -> io::Result<BoundSocket> {
    let addr = resolve(spec)?;

    let socket = match addr.ip() {
        IpAddr::V6(_) => {
            let socket = Socket::new(Domain::IPV6, Type::STREAM, Some(Protocol::TCP))?;
            if let Err(e) = socket.set_only_v6(true) {
                tracing::warn!(address = %spec, error = %e, "cannot set IPV6_V6ONLY");
            }
            socket
        }
        IpAddr::V4(_) => Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))?,
    };

    socket.bind(&SockAddr::from(addr))?;
    let local_addr = socket
        .local_addr()?
        .as_socket()
        .ok_or_else(|| io::Error::other("bound socket has no inet address"))?;

    Ok(BoundSocket {
        spec: spec.clone(),
        local_addr,
        socket,
    })
}

fn resolve(spec: &ListenSpec) -> io::Result<SocketAddr> {
    match spec.host() {
        Host::Ipv4(ip) => Ok(SocketAddr::new(IpAddr::V4(*ip), spec.port())),
        Host::Ipv6(ip) => Ok(SocketAddr::new(IpAddr::V6(*ip), spec.port())),
        Host::Name(name) => (name.as_str(), spec.port())
            .to_socket_addrs()?
            .find(SocketAddr::is_ipv4)
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::AddrNotAvailable,
                    format!("`{name}` has no IPv4 address"),
                )
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::address::plan;

    #[test]
    fn binds_loopback_on_ephemeral_port() {
        let specs = plan("127.0.0.1:0").unwrap();
        let bound = Binder::new().bind(&specs).unwrap();
        assert_eq!(bound.len(), 1);
        assert!(bound[0].local_addr().ip().is_loopback());
        assert_ne!(bound[0].local_addr().port(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn descriptor_uses_fd_scheme() {
        let bound = Binder::new().bind(&plan("127.0.0.1:0").unwrap()).unwrap();
        assert!(bound[0].descriptor().starts_with("fd://"));
    }

    #[test]
    fn failed_address_is_skipped() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();

        let raw = format!("127.0.0.1:{port},127.0.0.1:0");
        let bound = Binder::new().bind(&plan(&raw).unwrap()).unwrap();
        assert_eq!(bound.len(), 1);
        assert_ne!(bound[0].local_addr().port(), port);
    }

    #[test]
    fn all_failures_raise_no_sockets_bound() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();

        let err = Binder::new()
            .bind(&plan(&format!("127.0.0.1:{port}")).unwrap())
            .unwrap_err();
        assert_eq!(err.attempted, 1);
    }

    #[test]
    fn ipv6_specs_skipped_without_ipv6() {
        let specs = plan("[::1]:0").unwrap();
        let err = Binder::new().with_ipv6(false).bind(&specs).unwrap_err();
        assert_eq!(err.attempted, 1);
    }

    #[test]
    fn empty_plan_is_an_error() {
        assert!(Binder::new().bind(&[]).is_err());
    }

    #[tokio::test]
    async fn bound_socket_becomes_listener() {
        let mut bound = Binder::new().bind(&plan("127.0.0.1:0").unwrap()).unwrap();
        let socket = bound.remove(0);
        let addr = socket.local_addr();
        let listener = socket.into_listener(16).unwrap();
        assert_eq!(listener.local_addr().unwrap(), addr);
    }
}
