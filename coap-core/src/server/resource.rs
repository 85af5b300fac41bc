//! Resources (§3, §4.7): a path with a handler, an Observe age counter, and
//! the resource's own observer list. [`resource_notify`] is the operation
//! that drives a notification to every registered observer.

use std::net::SocketAddr;

use coap_msg::{Code, Message, Token};

use crate::block::{szx_for_size, BlockContext, Direction, Kind};
use crate::core::{Core, Error};
use crate::matching::{Observer, ObserverTable};
use crate::net::Socket;
use crate::observe::Age;
use crate::server::respond;
use crate::time::Clock;

/// A request handler: given the parsed request, produce the response
/// payload, or `None` to fall through to the next route (or 4.04 if none
/// match).
pub type Handler<'a> = Box<dyn Fn(&Message) -> Option<Message> + 'a>;

/// Maximum number of simultaneous in-progress Block1 request-body
/// reassemblies a single [`Resource`] tracks at once.
const DEFAULT_BLOCK1_CAPACITY: usize = 4;

type Block1Key = (SocketAddr, Token);

enum Block1Outcome {
  /// The transfer isn't finished; hand `ack` straight back to the peer.
  Continue(Message),
  /// The full request body is available in the returned message.
  Ready(Message),
}

/// A path pattern, its handler, and the Observe state (age + observer
/// list) that belongs to this specific resource rather than to the
/// runtime as a whole. See [`crate::server::path::matches_exact`] for the
/// pattern syntax (`*` matches a single segment).
pub struct Resource<'a> {
  pattern: &'static str,
  handler: Handler<'a>,
  age: Age,
  observers: ObserverTable,
  block1: Vec<Option<(Block1Key, BlockContext)>>,
}

impl<'a> core::fmt::Debug for Resource<'a> {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("Resource").field("pattern", &self.pattern).finish()
  }
}

impl<'a> Resource<'a> {
  /// Register a handler for `pattern`, with room for `observer_capacity`
  /// simultaneous observers.
  pub fn new(pattern: &'static str,
             handler: impl Fn(&Message) -> Option<Message> + 'a,
             observer_capacity: usize)
             -> Self {
    Self { pattern,
           handler: Box::new(handler),
           age: Age::default(),
           observers: ObserverTable::new(observer_capacity),
           block1: (0..DEFAULT_BLOCK1_CAPACITY).map(|_| None).collect() }
  }

  /// The path pattern this resource answers to.
  pub fn pattern(&self) -> &'static str {
    self.pattern
  }

  /// The resource's current Observe age.
  pub fn age(&self) -> Age {
    self.age
  }

  /// The resource's registered observers.
  pub fn observers(&self) -> &ObserverTable {
    &self.observers
  }

  /// Handle one request against this resource (§4.6, §4.7): a Block1
  /// request body is reassembled before the handler ever sees it, a GET
  /// carrying Observe=0 registers `peer` as an observer (if the table has
  /// room), Observe=1 deregisters it, then the handler runs as normal.
  pub fn dispatch(&mut self, req: &Message, peer: SocketAddr, max_unfragmented_size: u32) -> Option<Message> {
    use coap_msg::observe::Action;

    if crate::block::validate_not_mixed(req).is_err() {
      return Some(respond::for_request(req, Code::BAD_OPTION, Vec::new()));
    }

    let req = match self.reassemble_block1(req, peer, max_unfragmented_size) {
      | Block1Outcome::Continue(ack) => return Some(ack),
      | Block1Outcome::Ready(full) => full,
    };

    match req.observe_action() {
      | Some(Action::Register) => {
        self.observers.register(Observer { peer, token: req.token.clone() });
      },
      | Some(Action::Deregister) => {
        self.observers.deregister(peer, &req.token);
      },
      | None => {},
    }

    (self.handler)(&req)
  }

  fn reassemble_block1(&mut self, req: &Message, peer: SocketAddr, max_unfragmented_size: u32) -> Block1Outcome {
    let Some(block) = req.block1() else {
      return Block1Outcome::Ready(req.clone());
    };

    let key = (peer, req.token.clone());
    let mut ctx = self.block1
                      .iter_mut()
                      .find(|slot| matches!(slot, Some((k, _)) if *k == key))
                      .and_then(|slot| slot.take())
                      .map(|(_, ctx)| ctx)
                      .unwrap_or_else(|| {
                        let szx = szx_for_size(block.size());
                        BlockContext::new(Direction::Request, Kind::Classic, szx)
                          .expect("szx derived from the wire is always <= 6")
                      });

    if ctx.ingest(block.num(), block.more(), &req.payload.0, None, max_unfragmented_size)
          .is_err()
    {
      return Block1Outcome::Ready(req.clone());
    }

    if ctx.complete() {
      let mut full = req.clone();
      full.set_payload(coap_msg::Payload(ctx.body().to_vec()));
      Block1Outcome::Ready(full)
    } else {
      let mut ack = respond::for_request(req, Code::CONTINUE, Vec::new());
      let _ = ack.set_block1(block.size(), block.num(), false);
      self.store_block1(key, ctx);
      Block1Outcome::Continue(ack)
    }
  }

  fn store_block1(&mut self, key: Block1Key, ctx: BlockContext) {
    if let Some(slot) = self.block1.iter_mut().find(|slot| matches!(slot, Some((k, _)) if *k == key)) {
      *slot = Some((key, ctx));
      return;
    }

    if let Some(slot) = self.block1.iter_mut().find(|s| s.is_none()) {
      *slot = Some((key, ctx));
    }
  }

  /// Deregister an observer directly — used when a notification's CON goes
  /// unanswered (RST) or times out.
  pub fn deregister(&mut self, peer: SocketAddr, token: &Token) {
    self.observers.deregister(peer, token);
  }
}

/// `resource_notify` (§4.7): bump `resource`'s age, then build and send one
/// notification carrying `payload` to every currently-registered observer.
///
/// Returns the first send error encountered, if any, after attempting every
/// observer (a single unreachable peer doesn't stop the others from being
/// notified).
pub fn resource_notify<C: Clock, S: Socket>(resource: &mut Resource,
                                            core: &mut Core<C, S>,
                                            payload: Vec<u8>)
                                            -> Result<(), Error<S>> {
  let age = resource.age.bump();
  let mut first_err = None;

  let observers: Vec<Observer> = resource.observers.iter().cloned().collect();
  for observer in observers {
    let id = core.next_message_id();
    let notification = respond::notify(observer.token.clone(), id, age, payload.clone());
    if let Err(e) = core.send_resp(notification, observer.peer) {
      first_err.get_or_insert(e);
    }
  }

  match first_err {
    | Some(e) => Err(e),
    | None => Ok(()),
  }
}
