use std::net::{SocketAddr, ToSocketAddrs};

/// A datagram buffer
pub type Dgram = Vec<u8>;

/// Data that came from (or is going to) a network socket
#[derive(PartialEq, PartialOrd, Eq, Ord, Hash, Debug, Clone)]
pub struct Addrd<T>(pub T, pub SocketAddr);

impl<T> Addrd<T> {
  /// Borrow the contents of this Addressed
  pub fn as_ref(&self) -> Addrd<&T> {
    Addrd(self.data(), self.addr())
  }

  /// Discard the socket and get the data in this Addressed
  pub fn unwrap(self) -> T {
    self.0
  }

  /// Map the data contained in this Addressed
  pub fn map<R>(self, f: impl FnOnce(T) -> R) -> Addrd<R> {
    Addrd(f(self.0), self.1)
  }

  /// Map the data contained in this Addressed (with a copy of the address)
  pub fn map_with_addr<R>(self, f: impl FnOnce(T, SocketAddr) -> R) -> Addrd<R> {
    Addrd(f(self.0, self.1), self.1)
  }

  /// Borrow the contents of the addressed item
  pub fn data(&self) -> &T {
    &self.0
  }

  /// Mutably borrow the contents of the addressed item
  pub fn data_mut(&mut self) -> &mut T {
    &mut self.0
  }

  /// Copy the socket address for the data
  pub fn addr(&self) -> SocketAddr {
    self.1
  }

  /// Turn the entire structure into something else
  pub fn fold<R>(self, f: impl FnOnce(T, SocketAddr) -> R) -> R {
    f(self.0, self.1)
  }
}

impl<T> AsMut<T> for Addrd<T> {
  fn as_mut(&mut self) -> &mut T {
    &mut self.0
  }
}

/// A CoAP network socket
///
/// This mirrors `std::net::UdpSocket`'s non-blocking surface closely enough
/// that a plain UDP socket (or a DTLS-wrapped one) can implement it directly.
/// One notable difference from `UdpSocket::connect` is that `connect`ing is
/// expected to modify the internal state of a [`Socket`], not yield a
/// connected socket type.
pub trait Socket: Sized {
  /// The error yielded by socket operations
  type Error: std::fmt::Debug;

  /// Get the local address this socket was created from
  fn local_addr(&self) -> SocketAddr;

  /// Bind the socket to an address, without doing any spooky magic things like switching to
  /// non-blocking mode or auto-detecting and joining multicast groups.
  ///
  /// Implementors of `bind_raw` should:
  ///  - yield a socket in a non-blocking state
  ///  - bind to the first address if `addr` yields multiple addresses
  fn bind_raw<A: ToSocketAddrs>(addr: A) -> Result<Self, Self::Error>;

  /// Binds the socket to a local address.
  ///
  /// This function will automatically invoke [`Socket::join_multicast`] if the address
  /// is a multicast address, and should yield a non-blocking socket.
  fn bind<A: ToSocketAddrs>(addr: A) -> Result<Self, Self::Error> {
    let addr = addr.to_socket_addrs().unwrap().next().unwrap();

    let sock = Self::bind_raw(addr)?;
    if addr.ip().is_multicast() {
      sock.join_multicast(addr.ip())?;
    }
    Ok(sock)
  }

  /// Send a message to a remote address
  fn send(&self, msg: Addrd<&[u8]>) -> nb::Result<(), Self::Error>;

  /// Send a message to a remote address, bypassing DTLS/OSCORE transport security.
  ///
  /// If the socket type implementing this trait does not participate
  /// in transport-layer security, this is just an alias for `send`.
  fn insecure_send(&self, msg: Addrd<&[u8]>) -> nb::Result<(), Self::Error> {
    self.send(msg)
  }

  /// Pull a buffered datagram from the socket, along with the address of the sender.
  ///
  /// This clears the internal receiver queue, meaning that subsequent calls
  /// to `peek` or `recv` will block until a new datagram is received.
  fn recv(&self, buffer: &mut [u8]) -> nb::Result<Addrd<usize>, Self::Error>;

  /// Pull a buffered datagram from the socket, along with the address of the sender,
  /// without removing it from the receiver queue.
  fn peek(&self, buffer: &mut [u8]) -> nb::Result<Addrd<usize>, Self::Error>;

  /// Look at who the sender of the message at the top of the receipt queue is.
  ///
  /// # Default Implementation
  /// The default implementation invokes `peek` with a 0-byte capacity buffer and discards
  /// the `usize` returned by that function.
  fn peek_addr(&self) -> nb::Result<SocketAddr, Self::Error> {
    self.peek(&mut []).map(|Addrd(_, addr)| addr)
  }

  /// Poll the socket for a datagram, copying it into an owned [`Dgram`]
  fn poll(&self) -> Result<Option<Addrd<Dgram>>, Self::Error> {
    let mut buf = vec![0u8; 1152];
    let recvd = self.recv(&mut buf);

    match recvd {
      | Ok(Addrd(n, addr)) => {
        buf.truncate(n);
        Ok(Some(Addrd(buf, addr)))
      },
      | Err(nb::Error::WouldBlock) => Ok(None),
      | Err(nb::Error::Other(e)) => Err(e),
    }
  }

  /// Join a multicast group
  fn join_multicast(&self, addr: std::net::IpAddr) -> Result<(), Self::Error>;
}

impl Socket for std::net::UdpSocket {
  type Error = std::io::Error;

  fn local_addr(&self) -> SocketAddr {
    std::net::UdpSocket::local_addr(self).expect("bound socket has a local address")
  }

  fn bind_raw<A: ToSocketAddrs>(addr: A) -> Result<Self, Self::Error> {
    let sock = std::net::UdpSocket::bind(addr)?;
    sock.set_nonblocking(true)?;
    Ok(sock)
  }

  fn send(&self, msg: Addrd<&[u8]>) -> nb::Result<(), Self::Error> {
    std::net::UdpSocket::send_to(self, msg.data(), msg.addr()).map(|_| ())
                                                               .map_err(io_to_nb)
  }

  fn recv(&self, buffer: &mut [u8]) -> nb::Result<Addrd<usize>, Self::Error> {
    std::net::UdpSocket::recv_from(self, buffer).map(|(n, addr)| Addrd(n, addr))
                                                 .map_err(io_to_nb)
  }

  fn peek(&self, buffer: &mut [u8]) -> nb::Result<Addrd<usize>, Self::Error> {
    std::net::UdpSocket::peek_from(self, buffer).map(|(n, addr)| Addrd(n, addr))
                                                 .map_err(io_to_nb)
  }

  fn join_multicast(&self, addr: std::net::IpAddr) -> Result<(), Self::Error> {
    match addr {
      | std::net::IpAddr::V4(addr) => self.join_multicast_v4(&addr, &std::net::Ipv4Addr::UNSPECIFIED),
      | std::net::IpAddr::V6(addr) => self.join_multicast_v6(&addr, 0),
    }
  }
}

fn io_to_nb(e: std::io::Error) -> nb::Error<std::io::Error> {
  match e.kind() {
    | std::io::ErrorKind::WouldBlock => nb::Error::WouldBlock,
    | _ => nb::Error::Other(e),
  }
}
