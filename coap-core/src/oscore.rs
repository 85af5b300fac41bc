//! OSCORE envelope (§4.10, RFC 8613): outer/inner message split, exchange
//! tracking, and the server-side error-response mapping.
//!
//! The AEAD/HKDF crypto itself is out of scope — [`OscoreCrypto`] is the
//! capability boundary an application plugs a real implementation (e.g. a
//! COSE/AES-CCM crate) into. This module owns everything that's pure CoAP:
//! the option's well-formedness, the outer-Block reassembly ordering, the
//! exchange cache, and the verifier-error-to-response-code mapping.

use std::net::SocketAddr;

use coap_msg::{Code, Message, OscoreOption, Token, Type};

use crate::block::{szx_for_size, BlockContext, Direction, Kind};
use crate::time::{Clock, Stamped};

/// A capability an application provides to perform the actual AEAD
/// decrypt/encrypt and replay-window check. `coap-core` never sees key
/// material.
pub trait OscoreCrypto {
  /// Opaque error returned by [`OscoreCrypto::verify`]/[`OscoreCrypto::protect`].
  type Error;

  /// Decrypt-and-verify an inbound OSCORE-protected message, given the
  /// option's decoded `kid`/`kid_context`/`partial_iv` and the ciphertext
  /// (reassembled outer-Block payload). Returns the recovered plaintext
  /// inner message bytes.
  fn verify(&mut self, kid: &[u8], partial_iv: Option<&[u8]>, ciphertext: &[u8])
            -> Result<Vec<u8>, Self::Error>;

  /// Encrypt-and-protect an outbound inner message for `kid`, returning the
  /// OSCORE option value fields and ciphertext.
  fn protect(&mut self, kid: &[u8], plaintext: &[u8]) -> Result<(OscoreOption, Vec<u8>), Self::Error>;
}

/// Why OSCORE processing rejected a message, independent of the concrete
/// [`OscoreCrypto::Error`] — used to pick the §4.10 error-mapping response
/// code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OscoreFailure {
  /// The option failed to parse, or appeared more than once.
  MalformedOption,
  /// No security context is registered for the decoded `kid`.
  UnknownContext,
  /// The Partial IV fell outside (or was rejected by) the replay window.
  Replay,
  /// An Echo challenge is required before this exchange can proceed.
  EchoRequired,
  /// Decryption or integrity verification failed for an otherwise
  /// recognized context.
  DecryptFailed,
}

impl OscoreFailure {
  /// The response code the server should emit for this failure. Per §4.10
  /// this response is never itself OSCORE-protected, and SHOULD carry
  /// Max-Age=0.
  pub fn response_code(self) -> Code {
    match self {
      | Self::MalformedOption => Code::BAD_OPTION,
      | Self::UnknownContext | Self::Replay | Self::EchoRequired => Code::UNAUTHORIZED,
      | Self::DecryptFailed => Code::BAD_REQUEST,
    }
  }
}

/// Parse the (at most one) OSCORE option out of `msg`. Per RFC 8613 §2 the
/// option is critical and non-repeatable; two or more occurrences is a
/// `BadMessage`-class failure (mapped here to [`OscoreFailure::MalformedOption`]),
/// never "first wins". An OSCORE message must also carry a payload.
pub fn extract(msg: &Message) -> Result<Option<OscoreOption>, OscoreFailure> {
  match msg.oscore() {
    | Ok(Some(opt)) => {
      if msg.payload.0.is_empty() {
        return Err(OscoreFailure::MalformedOption);
      }
      Ok(Some(opt))
    },
    | Ok(None) => Ok(None),
    | Err(_) => Err(OscoreFailure::MalformedOption),
  }
}

/// Outcome of feeding one inbound message through [`reassemble_outer`].
#[derive(Debug)]
pub enum Outer {
  /// The outer Block transfer isn't finished yet; send `ack` (a 2.31
  /// Continue echoing the received block number with M=0) to request the
  /// next fragment.
  NeedMore(Message),
  /// The full outer ciphertext is available.
  Complete(Vec<u8>),
}

/// Reassemble the outer Block1 (on a request) or Block2 (on a response)
/// carrying an OSCORE ciphertext, per §4.10 step 3: this MUST run, and the
/// Block2/Size2 options MUST be stripped from the reconstructed buffer,
/// before the ciphertext is handed to [`OscoreCrypto::verify`]. `ctx` is
/// `None` at the start of a transfer and is cleared once reassembly
/// completes; callers key it per in-flight exchange (e.g. by peer/token).
pub fn reassemble_outer(msg: &Message,
                        ctx: &mut Option<BlockContext>,
                        direction: Direction,
                        max_unfragmented_size: u32)
                        -> Result<Outer, OscoreFailure> {
  let block = match direction {
    | Direction::Request => msg.block1(),
    | Direction::Response => msg.block2(),
  };

  let Some(block) = block else {
    return Ok(Outer::Complete(msg.payload.0.clone()));
  };

  if ctx.is_none() {
    let szx = szx_of(block.size());
    *ctx =
      Some(BlockContext::new(direction, Kind::Classic, szx).map_err(|_| OscoreFailure::MalformedOption)?);
  }

  let block_ctx = ctx.as_mut().expect("populated above");
  block_ctx.ingest(block.num(), block.more(), &msg.payload.0, None, max_unfragmented_size)
           .map_err(|_| OscoreFailure::MalformedOption)?;

  if block_ctx.complete() {
    let body = block_ctx.body().to_vec();
    *ctx = None;
    Ok(Outer::Complete(body))
  } else {
    let mut ack = match msg.ty {
      | Type::Con => msg.ack(msg.id),
      | _ => Message::new(msg.ty, Code::EMPTY, msg.id, msg.token.clone()),
    };
    ack.code = Code::CONTINUE;
    ack.token = msg.token.clone();
    let _ = ack.set_block1(block.size(), block.num(), false);
    Ok(Outer::NeedMore(ack))
  }
}

/// One tracked OSCORE exchange: a request we forwarded for OSCORE
/// processing, kept around so the eventual response (or, for Observe, every
/// notification) can be matched and re-protected.
#[derive(Debug, Clone)]
pub struct Exchange {
  /// Peer this exchange is with.
  pub peer: SocketAddr,
  /// Inner request token.
  pub token: Token,
  /// Security-context key identifier.
  pub kid: Vec<u8>,
  /// Kept alive across multiple notifications instead of being evicted
  /// after the first response.
  pub is_observe: bool,
}

/// Bounded, LRU-evicted, expiry-aware table of [`Exchange`] entries.
#[derive(Debug)]
pub struct ExchangeCache<C: Clock> {
  entries: Vec<Stamped<C, Exchange>>,
  capacity: usize,
  lifetime_millis: u64,
}

impl<C: Clock> ExchangeCache<C> {
  /// Create a cache bounded to `capacity` entries with the given lifetime.
  pub fn new(capacity: usize, lifetime_millis: u64) -> Self {
    Self { entries: Vec::with_capacity(capacity),
           capacity,
           lifetime_millis }
  }

  fn expire(&mut self, now_millis: u64) {
    self.entries.retain(|s| {
                  let stamped_millis =
                    crate::time::Millis::try_from(s.time().duration_since_epoch()).map(|m| m.0)
                                                                                   .unwrap_or(0);
                  now_millis.saturating_sub(stamped_millis) <= self.lifetime_millis
                });
  }

  /// Register a new exchange, evicting expired entries and then, if still
  /// full, the oldest entry.
  pub fn insert(&mut self, clock: &C, now_millis: u64, exchange: Exchange) -> Option<()> {
    self.expire(now_millis);

    if self.entries.len() >= self.capacity {
      if exchange.is_observe {
        // no non-expired room; drop the oldest non-observe entry if any
        let victim = self.entries
                         .iter()
                         .enumerate()
                         .find(|(_, s)| !s.data().is_observe)
                         .map(|(ix, _)| ix);
        match victim {
          | Some(ix) => {
            self.entries.remove(ix);
          },
          | None => return None,
        }
      } else if let Some((ix, _)) =
        self.entries.iter().enumerate().min_by_key(|(_, s)| s.time())
      {
        self.entries.remove(ix);
      }
    }

    let stamped = Stamped::new(clock, exchange).ok()?;
    self.entries.push(stamped);
    Some(())
  }

  /// Find the exchange matching `(peer, token)`, clearing any expired
  /// entries encountered along the way.
  pub fn find(&mut self, now_millis: u64, peer: SocketAddr, token: &Token) -> Option<&Exchange> {
    self.expire(now_millis);
    self.entries
        .iter()
        .map(|s| s.data())
        .find(|e| e.peer == peer && &e.token == token)
  }

  /// Remove the exchange matching `(peer, token)` — called once a
  /// non-Observe response has been dispatched.
  pub fn remove(&mut self, peer: SocketAddr, token: &Token) {
    self.entries.retain(|s| {
                  let e = s.data();
                  !(e.peer == peer && &e.token == token && !e.is_observe)
                });
  }
}

#[cfg(test)]
mod tests {
  use coap_msg::{Id, Type};

  use super::*;

  #[test]
  fn response_code_mapping() {
    assert_eq!(OscoreFailure::MalformedOption.response_code(), Code::BAD_OPTION);
    assert_eq!(OscoreFailure::UnknownContext.response_code(), Code::UNAUTHORIZED);
    assert_eq!(OscoreFailure::Replay.response_code(), Code::UNAUTHORIZED);
    assert_eq!(OscoreFailure::EchoRequired.response_code(), Code::UNAUTHORIZED);
    assert_eq!(OscoreFailure::DecryptFailed.response_code(), Code::BAD_REQUEST);
  }

  #[test]
  fn extract_rejects_empty_payload() {
    let mut msg = Message::new(Type::Con, Code::POST, Id(1), Token(Vec::new()));
    msg.set_oscore(&OscoreOption { partial_iv: None,
                                   kid_context: None,
                                   kid: Some(vec![1]) })
       .unwrap();
    assert_eq!(extract(&msg), Err(OscoreFailure::MalformedOption));
  }

  #[test]
  fn extract_absent_is_none() {
    let msg = Message::new(Type::Con, Code::GET, Id(1), Token(Vec::new()));
    assert_eq!(extract(&msg), Ok(None));
  }

  #[test]
  fn reassemble_outer_without_block_option_is_immediately_complete() {
    let mut msg = Message::new(Type::Con, Code::POST, Id(1), Token(Vec::new()));
    msg.set_payload(coap_msg::Payload(b"ciphertext".to_vec()));

    let mut ctx = None;
    match reassemble_outer(&msg, &mut ctx, Direction::Request, 1024).unwrap() {
      | Outer::Complete(body) => assert_eq!(body, b"ciphertext"),
      | Outer::NeedMore(_) => panic!("expected immediate completion"),
    }
  }

  #[test]
  fn reassemble_outer_reassembles_two_blocks_then_completes() {
    let mut block0 = Message::new(Type::Con, Code::POST, Id(1), Token(vec![9]));
    block0.set_block1(16, 0, true).unwrap();
    block0.set_payload(coap_msg::Payload(vec![0xAA; 16]));

    let mut ctx = None;
    let ack = match reassemble_outer(&block0, &mut ctx, Direction::Request, 1024).unwrap() {
      | Outer::NeedMore(ack) => ack,
      | Outer::Complete(_) => panic!("expected more blocks"),
    };
    assert_eq!(ack.code, Code::CONTINUE);
    assert!(ctx.is_some());

    let mut block1 = Message::new(Type::Con, Code::POST, Id(2), Token(vec![9]));
    block1.set_block1(16, 1, false).unwrap();
    block1.set_payload(coap_msg::Payload(vec![0xBB; 8]));

    match reassemble_outer(&block1, &mut ctx, Direction::Request, 1024).unwrap() {
      | Outer::Complete(body) => {
        assert_eq!(body.len(), 24);
        assert_eq!(&body[..16], &[0xAA; 16][..]);
        assert_eq!(&body[16..], &[0xBB; 8][..]);
      },
      | Outer::NeedMore(_) => panic!("expected completion"),
    }
    assert!(ctx.is_none());
  }
}
