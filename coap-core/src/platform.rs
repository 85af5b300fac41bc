//! Platform capability bundle (§4.12).
//!
//! `coap-core` is generic over two capability slots — a [`Clock`] and a
//! [`Socket`] — rather than the message/collection type family a constrained
//! embedded runtime would need. [`coap_msg::Message`] is concrete, so there's
//! nothing left to parameterize there.

use crate::config::Config;
use crate::net::Socket;
use crate::time::Clock;

/// Bundles together the capabilities [`crate::core::Core`] needs from its
/// host environment: a clock, a socket, and runtime configuration.
///
/// `Core` itself only takes a bare clock and socket; this trait is a
/// convenience for applications that want to pass their assembled runtime
/// around as a single value (e.g. through a resource handler registry)
/// instead of threading `Core`'s two generic parameters everywhere.
/// Implementing it is usually a handful of field accessors over a struct
/// that owns a `Core`.
pub trait Platform {
  /// The clock implementation used to time retransmissions and cache
  /// expiry.
  type Clock: Clock;
  /// The socket implementation used to send and receive datagrams.
  type Sock: Socket;

  /// Borrow the clock.
  fn clock(&self) -> &Self::Clock;

  /// Borrow the socket.
  fn socket(&self) -> &Self::Sock;

  /// Borrow the runtime configuration.
  fn config(&self) -> &Config;
}
