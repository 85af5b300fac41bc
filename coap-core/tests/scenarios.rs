//! End-to-end scenarios exercising block-wise transfer, Hop-Limit, Echo
//! freshness, and CON retransmission against the public API.

use std::cell::{Cell, RefCell};
use std::net::SocketAddr;

use coap_core::block::{BlockContext, BlockError, Direction, Kind};
use coap_core::config::Config;
use coap_core::core::Core;
use coap_core::echo::EchoCache;
use coap_core::hop_limit::{proxy_update, HopLimitError};
use coap_core::net::{Addrd, Dgram, Socket};
use coap_msg::{Code, Id, Message, Token, Type};
use embedded_time::rate::Fraction;
use embedded_time::Instant;

#[derive(Debug)]
struct ManualClock(Cell<u64>);

impl ManualClock {
  fn new() -> Self {
    Self(Cell::new(0))
  }

  fn advance(&self, millis: u64) {
    self.0.set(self.0.get() + millis);
  }
}

impl embedded_time::Clock for ManualClock {
  type T = u64;
  const SCALING_FACTOR: Fraction = Fraction::new(1, 1000);

  fn try_now(&self) -> Result<Instant<Self>, embedded_time::clock::Error> {
    Ok(Instant::new(self.0.get()))
  }
}

#[derive(Debug, Default)]
struct LoopbackSocket {
  sent: RefCell<Vec<(Vec<u8>, SocketAddr)>>,
  inbox: RefCell<Vec<Addrd<Dgram>>>,
}

impl Socket for LoopbackSocket {
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

#[test]
fn s3_block1_transfer_of_150_octets_in_32_byte_blocks() {
  let mut ctx = BlockContext::new(Direction::Request, Kind::Classic, 1).unwrap();

  let block_sizes = [32, 32, 32, 32, 22];
  for (k, &size) in block_sizes.iter().enumerate() {
    let more = k + 1 < block_sizes.len();
    let payload = vec![0u8; size];
    ctx.ingest(k as u32, more, &payload, None, 65536).unwrap();

    if more {
      assert_eq!(ctx.offset(), 32 * (k as u32 + 1));
      assert!(!ctx.complete());
    } else {
      assert_eq!(ctx.offset(), 150);
      assert!(ctx.complete());
    }
  }

  assert_eq!(ctx.body().len(), 150);
}

#[test]
fn s4_hop_limit_exhaustion() {
  let mut with_limit = Message::new(Type::Con, Code::GET, Id(1), Token(Vec::new()));
  coap_core::hop_limit::set_hop_limit(&mut with_limit, 1).unwrap();
  assert_eq!(proxy_update(&mut with_limit, 0), Err(HopLimitError::Unreachable));

  let mut without_limit = Message::new(Type::Con, Code::GET, Id(2), Token(Vec::new()));
  proxy_update(&mut without_limit, 32).unwrap();
  assert_eq!(without_limit.hop_limit(), Some(32));
}

#[test]
fn s6_block2_etag_mismatch_aborts() {
  let mut ctx = BlockContext::new(Direction::Response, Kind::Classic, 0).unwrap();

  ctx.ingest(0, true, &[0xAA; 16], Some(&[0x01, 0x02, 0x03, 0x04]), 65536)
     .unwrap();
  let offset_after_first = ctx.offset();

  let err = ctx.ingest(1, true, &[0xBB; 16], Some(&[0x05, 0x06, 0x07, 0x08]), 65536)
               .unwrap_err();
  assert_eq!(err, BlockError::EtagMismatch);

  // The aborted block left no trace: the context's offset/body are exactly
  // as they were after the first (good) block.
  assert_eq!(ctx.offset(), offset_after_first);
  assert_eq!(ctx.body().len(), 16);
}

#[test]
fn s7_echo_challenge_then_verify_then_expires() {
  let clock = ManualClock::new();
  let peer: SocketAddr = "127.0.0.1:5683".parse().unwrap();
  let mut cache = EchoCache::new(32, 40, 1000);

  // POST without Echo would be rejected by a server and answered with a
  // fresh challenge value.
  let challenge = cache.challenge(&clock, peer, 8).unwrap();

  // Client retries with the challenge; it verifies within the window.
  assert!(cache.verify(&challenge, peer, 0));

  clock.advance(999);
  assert!(cache.verify(&challenge, peer, 999));

  // Past the freshness window the same value is rejected.
  clock.advance(2);
  assert!(!cache.verify(&challenge, peer, 1001));
}

#[test]
fn s9_block2_response_reassembly_sends_continuation_requests() {
  use coap_core::core::Incoming;
  use coap_msg::TryIntoBytes;

  let clock = ManualClock::new();
  let sock = LoopbackSocket::default();
  let mut core = Core::new(clock, sock, Config::default());
  let peer: SocketAddr = "127.0.0.1:5683".parse().unwrap();

  let req = Message::new(Type::Con, Code::GET, Id(0), Token(vec![9]));
  let (_id, token) = core.send_req(req, peer).unwrap();

  let mut block0 = Message::new(Type::Ack, Code::CONTENT, Id(0), token.clone());
  block0.set_block2(16, 0, true).unwrap();
  block0.set_payload(coap_msg::Payload(vec![0xAA; 16]));
  let bytes0 = block0.try_into_bytes().unwrap();
  core.socket().inbox.borrow_mut().push(Addrd(bytes0, peer));

  match core.poll().unwrap() {
    | Incoming::BlockContinuing(p) => assert_eq!(p, peer),
    | other => panic!("expected BlockContinuing, got {other:?}"),
  }
  // the continuation request for block 1 was sent on the caller's behalf.
  assert_eq!(core.socket().sent.borrow().len(), 2);

  let mut block1 = Message::new(Type::Con, Code::CONTENT, Id(1), token);
  block1.set_block2(16, 1, false).unwrap();
  block1.set_payload(coap_msg::Payload(vec![0xBB; 8]));
  let bytes1 = block1.try_into_bytes().unwrap();
  core.socket().inbox.borrow_mut().push(Addrd(bytes1, peer));

  match core.poll().unwrap() {
    | Incoming::Response(_, resp) => {
      assert_eq!(resp.payload.0.len(), 24);
      assert_eq!(&resp.payload.0[..16], &[0xAA; 16][..]);
      assert_eq!(&resp.payload.0[16..], &[0xBB; 8][..]);
    },
    | other => panic!("expected reassembled Response, got {other:?}"),
  }
}

#[test]
fn s8_retransmission_timer_surfaces_timed_out() {
  let clock = ManualClock::new();
  let sock = LoopbackSocket::default();
  let mut params = Config::default();
  params.msg.con.transmission.ack_timeout_millis = 2000;
  params.msg.con.transmission.ack_random_percent = 100;
  params.msg.con.transmission.coap_backoff_percent = 200;
  params.msg.con.transmission.max_retransmission = 4;

  let mut core = Core::new(clock, sock, params);
  let peer: SocketAddr = "127.0.0.1:5683".parse().unwrap();
  let req = Message::new(Type::Con, Code::GET, Id(0), Token(Vec::new()));
  let (id, _token) = core.send_req(req, peer).unwrap();

  // timeout0 = 2000 (no jitter), doubling every attempt: 2000, 4000, 8000, 16000.
  core.clock().advance(2000);
  let timed_out = core.poll_retries().unwrap();
  assert!(timed_out.is_empty());

  core.clock().advance(4000);
  assert!(core.poll_retries().unwrap().is_empty());

  core.clock().advance(8000);
  assert!(core.poll_retries().unwrap().is_empty());

  core.clock().advance(16000);
  assert!(core.poll_retries().unwrap().is_empty());

  // The 4th retry has now fired; the timer gives up on the very next poll
  // regardless of elapsed time, since attempts already meets the max.
  let timed_out = core.poll_retries().unwrap();
  assert_eq!(timed_out.len(), 1);
  assert_eq!(timed_out[0].id, id);
  assert_eq!(timed_out[0].peer, peer);
}
