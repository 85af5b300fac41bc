//! The CoAP runtime (§4.12): ties matching/dedup, reliability, and the
//! network socket together into a single `poll`/`send` surface.

use std::net::SocketAddr;

use coap_msg::{Code, Id, Message, Token, Type};
use embedded_time::Instant;

pub mod error;

pub use error::{Error, What, When};

use crate::block::{szx_for_size, BlockContext, Direction, Kind};
use crate::config::Config;
use crate::matching::{Dedup, Pending, PendingTable, Reply, ReplyTable, RetryDue};
use crate::net::{Addrd, Socket};
use crate::time::Clock;
use crate::token::TokenGenerator;

/// Default capacity of the pending/reply/observer/dedup tables, used by
/// [`Core::new`]. Applications with tighter memory budgets should construct
/// the tables themselves and use [`Core::from_parts`].
pub const DEFAULT_TABLE_CAPACITY: usize = 16;

/// An inbound datagram, post matching. Either it correlates with something
/// we're waiting on, or it's unsolicited and should be routed to a server.
#[derive(Debug)]
pub enum Incoming {
  /// A separate response (or late ACK/RST) correlating with a [`Reply`] we
  /// were waiting on. The reply entry has already been removed from the
  /// table.
  Response(Reply, Message),
  /// An ACK/RST for a [`Pending`] CON we sent. The pending entry has already
  /// been removed from the table.
  Ack(Message),
  /// A request or notification with no matching local state: hand it to the
  /// server/observe layer.
  Unmatched(Message, SocketAddr),
  /// A message whose (peer, ID) we've already processed; the caller should
  /// re-ACK a CON without doing any further side effects, and otherwise drop
  /// it.
  Duplicate(Message, SocketAddr),
  /// A Block2-bearing response wasn't the final block; [`Core`] already sent
  /// the next Block2 request on the caller's behalf. Nothing to do but keep
  /// polling — the eventual [`Incoming::Response`] carries the reassembled
  /// body.
  BlockContinuing(SocketAddr),
}

/// A CONfirmable request that was never ACKed within the configured
/// [`crate::retry::TransmissionParams::max_retransmission`], reported once by
/// [`Core::poll_retries`] and then forgotten.
#[derive(Debug, Clone)]
pub struct TimedOut {
  /// Message ID of the request that timed out.
  pub id: Id,
  /// Token of the request that timed out.
  pub token: Token,
  /// Peer it was sent to.
  pub peer: SocketAddr,
}

/// The CoAP protocol runtime: matching & dedup tables, the reliability
/// engine, and a token/message-ID generator, driving a single [`Socket`].
///
/// `Core` does not know about resources, routing, or request handlers — see
/// [`crate::server`] and [`crate::well_known`] for those. It only knows how
/// to get bytes onto and off of the wire correctly.
#[derive(Debug)]
pub struct Core<C: Clock, S: Socket> {
  config: Config,
  clock: C,
  sock: S,
  tokens: TokenGenerator,
  next_msg_id: u16,
  pending: PendingTable<C>,
  replies: ReplyTable,
  dedup: Dedup<C>,
  /// Per-`(peer, token)` Block2 reassembly state for in-flight requests we
  /// sent. Bounded to [`DEFAULT_TABLE_CAPACITY`] concurrent transfers.
  blocks: Vec<Option<((SocketAddr, Token), BlockContext)>>,
}

impl<C: Clock, S: Socket> Core<C, S> {
  /// Construct a runtime with default-sized matching tables.
  pub fn new(clock: C, sock: S, config: Config) -> Self {
    Self::from_parts(clock,
                      sock,
                      config,
                      PendingTable::new(DEFAULT_TABLE_CAPACITY),
                      ReplyTable::new(DEFAULT_TABLE_CAPACITY),
                      Dedup::new(DEFAULT_TABLE_CAPACITY * 4))
  }

  /// Construct a runtime from already-sized matching tables, for
  /// applications that need to bound memory more precisely than
  /// [`DEFAULT_TABLE_CAPACITY`] allows.
  pub fn from_parts(clock: C,
                     sock: S,
                     config: Config,
                     pending: PendingTable<C>,
                     replies: ReplyTable,
                     dedup: Dedup<C>)
                     -> Self {
    Self { tokens: TokenGenerator::new(config.msg.token_seed),
           config,
           clock,
           sock,
           next_msg_id: 0,
           pending,
           replies,
           dedup,
           blocks: (0..DEFAULT_TABLE_CAPACITY).map(|_| None).collect() }
  }

  /// The runtime configuration this core was built with.
  pub fn config(&self) -> &Config {
    &self.config
  }

  /// Borrow the socket.
  pub fn socket(&self) -> &S {
    &self.sock
  }

  /// Borrow the clock.
  pub fn clock(&self) -> &C {
    &self.clock
  }

  /// The clock's current time, in milliseconds since it was created.
  pub fn now_millis(&self) -> Result<u64, Error<S>> {
    let now = self.now()?;
    Ok(crate::time::Millis::try_from(now.duration_since_epoch()).map(|m| m.0)
                                                                 .unwrap_or(0))
  }

  fn now(&self) -> Result<Instant<C>, Error<S>> {
    use embedded_time::Clock as _;

    self.clock
        .try_now()
        .map_err(|_| When::None.what(What::ClockError))
  }

  fn next_id(&mut self) -> Id {
    let id = Id(self.next_msg_id);
    self.next_msg_id = self.next_msg_id.wrapping_add(1);
    id
  }

  /// Allocate a fresh message ID, for messages built outside of
  /// [`Core::send_req`]/[`Core::send_resp`] (e.g. Observe notifications
  /// built by [`crate::server::resource_notify`]).
  pub fn next_message_id(&mut self) -> Id {
    self.next_id()
  }

  /// Generate the next token, honoring [`crate::config::Msg::token_max_len`].
  pub fn next_token(&mut self) -> Token {
    let full = self.tokens.next_token();
    let len = (self.config.msg.token_max_len as usize).min(8);
    Token(full[..len].to_vec())
  }

  /// Send a request, registering matching state so that its response (or,
  /// for CON, its ACK/RST) can be recognized by [`Core::poll`].
  ///
  /// Returns the `(Id, Token)` the caller can use to correlate a later
  /// [`Incoming::Response`]/[`Incoming::Ack`].
  pub fn send_req(&mut self, mut req: Message, peer: SocketAddr) -> Result<(Id, Token), Error<S>> {
    req.id = self.next_id();
    if req.token.0.is_empty() {
      req.token = self.next_token();
    }

    let id = req.id;
    let token = req.token.clone();

    self.replies
        .insert(Reply { id, token: token.clone(), peer, request: req.clone() })
        .ok_or_else(|| When::SendingMessage(Some(peer), id, token.clone()).what(What::NoMemory))?;

    if req.ty == Type::Con {
      let now = self.now()?;
      self.pending
          .pending_init(req.clone(), peer, now, self.config.msg.con.transmission)
          .ok_or_else(|| {
            When::SendingMessage(Some(peer), id, token.clone()).what(What::NoMemory)
          })?;
    }

    self.send_msg(&req, peer)?;
    Ok((id, token))
  }

  /// Send a response (or any message that doesn't need reply tracking —
  /// piggybacked ACKs, separate responses, RSTs).
  ///
  /// If `resp.ty == Type::Con`, the message is registered as pending so it
  /// will be retransmitted until ACKed, exactly as an outbound request
  /// would be.
  pub fn send_resp(&mut self, resp: Message, peer: SocketAddr) -> Result<(), Error<S>> {
    if resp.ty == Type::Con {
      let now = self.now()?;
      let id = resp.id;
      let token = resp.token.clone();
      self.pending
          .pending_init(resp.clone(), peer, now, self.config.msg.con.transmission)
          .ok_or_else(|| When::SendingMessage(Some(peer), id, token).what(What::NoMemory))?;
    }

    self.send_msg(&resp, peer)?;

    if let Ok(bytes) = coap_msg::TryIntoBytes::try_into_bytes(resp.clone()) {
      self.dedup.cache_response(peer, resp.id, bytes);
    }

    Ok(())
  }

  fn send_msg(&self, msg: &Message, peer: SocketAddr) -> Result<(), Error<S>> {
    let bytes =
      coap_msg::TryIntoBytes::try_into_bytes(msg.clone()).map_err(|_| {
                                                             When::SendingMessage(Some(peer),
                                                                                  msg.id,
                                                                                  msg.token.clone())
                                                               .what(What::BadInput)
                                                           })?;

    nb::block!(self.sock.send(Addrd(bytes.as_slice(), peer))).map_err(|e| {
      When::SendingMessage(Some(peer), msg.id, msg.token.clone()).what(What::SockError(e))
    })
  }

  /// Send an empty CONfirmable message ("CoAP ping"); the peer is expected
  /// to answer with a Reset.
  pub fn ping(&mut self, peer: SocketAddr) -> Result<Id, Error<S>> {
    let id = self.next_id();
    let msg = Message::new(Type::Con, Code::EMPTY, id, Token(Vec::new()));
    self.send_msg(&msg, peer)?;
    Ok(id)
  }

  /// Poll the socket for one datagram, parse it, run it through dedup and
  /// matching, and classify it.
  ///
  /// Returns `Err(nb::Error::WouldBlock)` if no datagram is currently
  /// available.
  pub fn poll(&mut self) -> nb::Result<Incoming, Error<S>> {
    let Addrd(dgram, peer) = self.sock
                                 .poll()
                                 .map_err(|e| When::Polling.what(What::SockError(e)))
                                 .map_err(nb::Error::Other)?
                                 .ok_or(nb::Error::WouldBlock)?;

    let msg: Message =
      coap_msg::TryFromBytes::try_from_bytes(&dgram).map_err(|e| When::Polling.what(What::BadMessage(e)))
                                                     .map_err(nb::Error::Other)?;

    Ok(self.classify(msg, peer))
  }

  fn classify(&mut self, msg: Message, peer: SocketAddr) -> Incoming {
    if self.dedup.is_duplicate(peer, msg.id) {
      if let Some(bytes) = self.dedup.cached_response(peer, msg.id) {
        let _ = nb::block!(self.sock.send(Addrd(bytes, peer)));
      }
      return Incoming::Duplicate(msg, peer);
    }

    self.dedup.observe(&self.clock, peer, msg.id);

    if let Some(ix) = self.pending.pending_received(msg.id, peer) {
      if matches!(msg.ty, Type::Ack | Type::Reset) {
        self.pending.pending_clear(ix);
        return Incoming::Ack(msg);
      }
    }

    if let Some(ix) = self.replies.response_received(&msg, peer) {
      let reply = self.replies.remove(ix).expect("index came from response_received");
      return self.classify_response(reply, msg, peer);
    }

    Incoming::Unmatched(msg, peer)
  }

  /// Run a just-matched response through the Block2 engine (§4.6): a
  /// message with no Block2 option (or mixed classic/Q-Block options) is
  /// handed back as-is; otherwise the block is folded into the transfer's
  /// [`BlockContext`], auto-requesting the next block when more remain.
  fn classify_response(&mut self, reply: Reply, msg: Message, peer: SocketAddr) -> Incoming {
    if crate::block::validate_not_mixed(&msg).is_err() {
      return Incoming::Response(reply, msg);
    }

    let Some(block) = msg.block2() else {
      return Incoming::Response(reply, msg);
    };

    let token = reply.token.clone();
    let max_size = self.config.block.max_unfragmented_size;

    let mut ctx = self.take_block_ctx(peer, &token).unwrap_or_else(|| {
                                                      let szx = szx_for_size(block.size());
                                                      BlockContext::new(Direction::Response, Kind::Classic, szx)
          .expect("szx derived from the wire is always <= 6")
                                                    });

    if ctx.ingest(block.num(), block.more(), &msg.payload.0, None, max_size)
          .is_err()
    {
      return Incoming::Response(reply, msg);
    }

    if ctx.complete() {
      let mut full = msg.clone();
      full.set_payload(coap_msg::Payload(ctx.body().to_vec()));
      Incoming::Response(reply, full)
    } else {
      let next_req = ctx.next_request(&reply.request);
      self.insert_block_ctx(peer, token, ctx);

      match self.send_req(next_req, peer) {
        | Ok(_) => Incoming::BlockContinuing(peer),
        | Err(_) => Incoming::Response(reply, msg),
      }
    }
  }

  fn take_block_ctx(&mut self, peer: SocketAddr, token: &Token) -> Option<BlockContext> {
    self.blocks
        .iter_mut()
        .find(|slot| matches!(slot, Some((key, _)) if key.0 == peer && &key.1 == token))
        .and_then(|slot| slot.take())
        .map(|(_, ctx)| ctx)
  }

  fn insert_block_ctx(&mut self, peer: SocketAddr, token: Token, ctx: BlockContext) {
    let key = (peer, token);

    if let Some(slot) = self.blocks
                            .iter_mut()
                            .find(|slot| matches!(slot, Some((k, _)) if *k == key))
    {
      *slot = Some((key, ctx));
      return;
    }

    if let Some(slot) = self.blocks.iter_mut().find(|s| s.is_none()) {
      *slot = Some((key, ctx));
    }
  }

  /// Drive the reliability engine: retransmit any [`Pending`] CON whose
  /// timer has fired, and report any that have exhausted
  /// [`crate::retry::TransmissionParams::max_retransmission`] as
  /// [`TimedOut`].
  pub fn poll_retries(&mut self) -> Result<Vec<TimedOut>, Error<S>> {
    let now = self.now()?;
    let due = self.pending.pending_cycle(now);
    let mut timed_out = Vec::new();

    for entry in due {
      match entry {
        | RetryDue::Retransmit(ix) => {
          if let Some(Pending { msg, peer, .. }) = self.pending.get(ix) {
            let _ = self.send_msg(msg, *peer);
          }
        },
        | RetryDue::GaveUp(Pending { msg, peer, .. }) => {
          timed_out.push(TimedOut { id: msg.id,
                                    token: msg.token,
                                    peer });
        },
      }
    }

    Ok(timed_out)
  }
}

#[cfg(test)]
mod tests {
  use embedded_time::rate::Fraction;

  use super::*;
  use crate::net::Dgram;

  #[derive(Debug)]
  struct FakeClock(std::cell::Cell<u64>);

  impl embedded_time::Clock for FakeClock {
    type T = u64;
    const SCALING_FACTOR: Fraction = Fraction::new(1, 1000);

    fn try_now(&self) -> Result<Instant<Self>, embedded_time::clock::Error> {
      Ok(Instant::new(self.0.get()))
    }
  }

  #[derive(Debug, Default)]
  struct FakeSocket {
    sent: std::cell::RefCell<Vec<(Vec<u8>, SocketAddr)>>,
    inbox: std::cell::RefCell<Vec<Addrd<Dgram>>>,
  }

  impl Socket for FakeSocket {
    type Error = std::convert::Infallible;

    fn local_addr(&self) -> SocketAddr {
      "127.0.0.1:0".parse().unwrap()
    }

    fn bind_raw<A: std::net::ToSocketAddrs>(_addr: A) -> Result<Self, Self::Error> {
      Ok(Self::default())
    }

    fn send(&self, msg: Addrd<&[u8]>) -> nb::Result<(), Self::Error> {
      self.sent.borrow_mut().push((msg.0.to_vec(), msg.1));
      Ok(())
    }

    fn recv(&self, _buffer: &mut [u8]) -> nb::Result<Addrd<usize>, Self::Error> {
      Err(nb::Error::WouldBlock)
    }

    fn peek(&self, _buffer: &mut [u8]) -> nb::Result<Addrd<usize>, Self::Error> {
      Err(nb::Error::WouldBlock)
    }

    fn poll(&self) -> Result<Option<Addrd<Dgram>>, Self::Error> {
      Ok(self.inbox.borrow_mut().pop())
    }

    fn join_multicast(&self, _addr: std::net::IpAddr) -> Result<(), Self::Error> {
      Ok(())
    }
  }

  fn core() -> Core<FakeClock, FakeSocket> {
    Core::new(FakeClock(std::cell::Cell::new(0)), FakeSocket::default(), Config::default())
  }

  #[test]
  fn send_req_registers_reply() {
    let mut c = core();
    let peer: SocketAddr = "127.0.0.1:5683".parse().unwrap();
    let req = Message::new(Type::Con, Code::GET, Id(0), Token(Vec::new()));
    let (id, token) = c.send_req(req, peer).unwrap();

    let ack = Message::new(Type::Ack, Code::CONTENT, id, token);
    match c.classify(ack, peer) {
      | Incoming::Ack(_) => {},
      | other => panic!("expected Ack, got {other:?}"),
    }
  }

  #[test]
  fn duplicate_detected_on_second_receipt() {
    let mut c = core();
    let peer: SocketAddr = "127.0.0.1:5683".parse().unwrap();
    let msg = Message::new(Type::Con, Code::GET, Id(42), Token(Vec::new()));

    match c.classify(msg.clone(), peer) {
      | Incoming::Unmatched(..) => {},
      | other => panic!("expected Unmatched, got {other:?}"),
    }

    match c.classify(msg, peer) {
      | Incoming::Duplicate(..) => {},
      | other => panic!("expected Duplicate, got {other:?}"),
    }
  }

  #[test]
  fn ping_sends_empty_con() {
    let mut c = core();
    let peer: SocketAddr = "127.0.0.1:5683".parse().unwrap();
    c.ping(peer).unwrap();
    assert_eq!(c.sock.sent.borrow().len(), 1);
  }
}
