//! Matching & deduplication (§4.4): pending-CON tracking, reply waiting,
//! observer registration, and recent-message-ID dedup.
//!
//! All three tables are fixed-capacity `Vec`-backed arrays (bounded by
//! configuration at construction time) rather than the growable collections
//! a hosted runtime would reach for, since a `NoMemory` error must be
//! reportable instead of an allocation simply growing to fit.

use std::net::SocketAddr;

use coap_msg::{Id, Message, Token};
use embedded_time::Instant;

use crate::retry::{RetryTimer, TransmissionParams};
use crate::time::{Clock, Stamped};

/// An outstanding CONfirmable request awaiting ACK/RST.
#[derive(Debug, Clone)]
pub struct Pending<C: Clock> {
  /// The message as it was sent (kept so it can be retransmitted verbatim).
  pub msg: Message,
  /// Destination address.
  pub peer: SocketAddr,
  /// Retransmission timer for this entry.
  pub retry: RetryTimer<C>,
}

/// A registered expectation of a response to a request we sent.
#[derive(Debug, Clone)]
pub struct Reply {
  /// Message ID of the original request.
  pub id: Id,
  /// Token of the original request.
  pub token: Token,
  /// Peer the request was sent to.
  pub peer: SocketAddr,
  /// The request as sent, kept so a Block2 continuation can be built from
  /// it via [`crate::block::BlockContext::next_request`].
  pub request: Message,
}

/// A peer observing a resource via RFC 7641 Observe.
#[derive(Debug, Clone)]
pub struct Observer {
  /// The observing peer's address.
  pub peer: SocketAddr,
  /// The token supplied on the initial (register) GET.
  pub token: Token,
}

/// What the reliability engine wants the caller to do with a [`Pending`]
/// entry on this tick.
#[derive(Debug, Clone)]
pub enum RetryDue<C: Clock> {
  /// Retransmit the entry at this index.
  Retransmit(usize),
  /// The entry exhausted its retries; it has already been removed from the
  /// table and is handed back so the caller can surface a timeout.
  GaveUp(Pending<C>),
}

/// A fixed-capacity table of [`Pending`] CON requests.
#[derive(Debug)]
pub struct PendingTable<C: Clock> {
  entries: Vec<Option<Pending<C>>>,
}

impl<C: Clock> PendingTable<C> {
  /// Create a table that can hold at most `capacity` entries.
  pub fn new(capacity: usize) -> Self {
    Self { entries: (0..capacity).map(|_| None).collect() }
  }

  /// Find the index of the first unused (`None`) slot, if any.
  pub fn pending_next_unused(&self) -> Option<usize> {
    self.entries.iter().position(Option::is_none)
  }

  /// Register a new pending CON. Fails (returns `None`) if the table is full.
  pub fn pending_init(&mut self,
                      msg: Message,
                      peer: SocketAddr,
                      start: Instant<C>,
                      params: TransmissionParams)
                      -> Option<usize> {
    let ix = self.pending_next_unused()?;
    self.entries[ix] = Some(Pending { msg,
                                      peer,
                                      retry: RetryTimer::new(start, params) });
    Some(ix)
  }

  /// Poll every entry's retry timer against `now`, retransmitting or
  /// giving up as appropriate. Entries that give up are removed from the
  /// table before being reported.
  pub fn pending_cycle(&mut self, now: Instant<C>) -> Vec<RetryDue<C>> {
    use crate::retry::YouShould;

    let mut due = Vec::new();

    for ix in 0..self.entries.len() {
      let should = match self.entries[ix].as_mut() {
        | Some(p) => p.retry.what_should_i_do(now),
        | None => continue,
      };

      match should {
        | Ok(YouShould::Retry) => due.push(RetryDue::Retransmit(ix)),
        | Ok(YouShould::Cry) => {
          if let Some(pending) = self.entries[ix].take() {
            due.push(RetryDue::GaveUp(pending));
          }
        },
        | Err(nb::Error::WouldBlock) => {},
        | Err(nb::Error::Other(_)) => unreachable!(),
      }
    }

    due
  }

  /// Remove and return the entry at `ix`, if present.
  pub fn pending_clear(&mut self, ix: usize) -> Option<Pending<C>> {
    self.entries.get_mut(ix).and_then(Option::take)
  }

  /// Borrow the entry at `ix`.
  pub fn get(&self, ix: usize) -> Option<&Pending<C>> {
    self.entries.get(ix).and_then(Option::as_ref)
  }

  /// Find a pending entry matching `(peer, message ID)` — used for ACK/RST
  /// correlation.
  pub fn pending_received(&self, id: Id, peer: SocketAddr) -> Option<usize> {
    self.entries
        .iter()
        .position(|e| matches!(e, Some(p) if p.peer == peer && p.msg.id == id))
  }
}

/// A fixed-capacity table of outstanding [`Reply`] expectations.
#[derive(Debug)]
pub struct ReplyTable {
  entries: Vec<Option<Reply>>,
}

impl ReplyTable {
  /// Create a table that can hold at most `capacity` entries.
  pub fn new(capacity: usize) -> Self {
    Self { entries: vec![None; capacity] }
  }

  /// Register a new reply expectation. Fails if the table is full.
  pub fn insert(&mut self, reply: Reply) -> Option<usize> {
    let ix = self.entries.iter().position(Option::is_none)?;
    self.entries[ix] = Some(reply);
    Some(ix)
  }

  /// Remove the entry at `ix`.
  pub fn remove(&mut self, ix: usize) -> Option<Reply> {
    self.entries.get_mut(ix).and_then(Option::take)
  }

  /// Match an inbound message against the table.
  ///
  /// Piggybacked ACK/RST match solely by message ID, with the caveat that a
  /// non-empty stored token must equal the message's token (an ACK with a
  /// mismatched non-empty token is not a match). A separate response (its
  /// own CON/NON message) matches solely by `(peer, token)`; an empty token
  /// only matches a reply that itself expects an empty token.
  pub fn response_received(&self, msg: &Message, peer: SocketAddr) -> Option<usize> {
    use coap_msg::Type;

    match msg.ty {
      | Type::Ack | Type::Reset => {
        self.entries.iter().position(|e| match e {
                             | Some(r) if r.peer == peer && r.id == msg.id => {
                               msg.token.0.is_empty() || msg.token == r.token
                             },
                             | _ => false,
                           })
      },
      | Type::Con | Type::Non => {
        self.entries.iter().position(|e| match e {
                             | Some(r) => r.peer == peer && r.token == msg.token,
                             | None => false,
                           })
      },
    }
  }

  /// Borrow the entry at `ix`.
  pub fn get(&self, ix: usize) -> Option<&Reply> {
    self.entries.get(ix).and_then(Option::as_ref)
  }
}

/// A fixed-capacity table of RFC 7641 [`Observer`] registrations for a
/// single resource.
#[derive(Debug)]
pub struct ObserverTable {
  entries: Vec<Option<Observer>>,
}

impl ObserverTable {
  /// Create a table that can hold at most `capacity` observers.
  pub fn new(capacity: usize) -> Self {
    Self { entries: vec![None; capacity] }
  }

  /// Register (or re-register) an observer. Fails if the table is full and
  /// this peer/token pair isn't already present.
  pub fn register(&mut self, observer: Observer) -> Option<usize> {
    if let Some(ix) = self.find(observer.peer, &observer.token) {
      return Some(ix);
    }

    let ix = self.entries.iter().position(Option::is_none)?;
    self.entries[ix] = Some(observer);
    Some(ix)
  }

  /// Deregister an observer by `(peer, token)`.
  pub fn deregister(&mut self, peer: SocketAddr, token: &Token) -> bool {
    match self.find(peer, token) {
      | Some(ix) => {
        self.entries[ix] = None;
        true
      },
      | None => false,
    }
  }

  fn find(&self, peer: SocketAddr, token: &Token) -> Option<usize> {
    self.entries
        .iter()
        .position(|e| matches!(e, Some(o) if o.peer == peer && &o.token == token))
  }

  /// Iterate over all currently-registered observers.
  pub fn iter(&self) -> impl Iterator<Item = &Observer> {
    self.entries.iter().filter_map(Option::as_ref)
  }
}

/// Recent-message-ID dedup set, keyed by peer, bounding memory via a
/// configured per-peer and total capacity and evicting the oldest entry
/// once full.
#[derive(Debug)]
pub struct Dedup<C: Clock> {
  seen: Vec<Stamped<C, (SocketAddr, Id)>>,
  capacity: usize,
  /// The response we sent for a given `(peer, id)`, kept around so a
  /// duplicate request can be answered by resending it (§4.4) rather than
  /// re-running the handler.
  responses: Vec<((SocketAddr, Id), Vec<u8>)>,
}

impl<C: Clock> Dedup<C> {
  /// Create a dedup set bounded to `capacity` total remembered IDs.
  pub fn new(capacity: usize) -> Self {
    Self { seen: Vec::with_capacity(capacity),
           capacity,
           responses: Vec::with_capacity(capacity) }
  }

  /// Record that `(peer, id)` was just received at `clock`'s current time.
  /// If the set is full, the oldest entry is evicted to make room.
  pub fn observe(&mut self, clock: &C, peer: SocketAddr, id: Id) {
    if self.seen.len() >= self.capacity {
      if let Some((oldest_ix, _)) =
        self.seen.iter().enumerate().min_by_key(|(_, s)| s.time())
      {
        let (_, evicted_peer_id) = *self.seen[oldest_ix].data();
        self.seen.remove(oldest_ix);
        self.responses.retain(|(k, _)| *k != evicted_peer_id);
      }
    }

    if let Ok(stamped) = Stamped::new(clock, (peer, id)) {
      self.seen.push(stamped);
    }
  }

  /// Has `(peer, id)` been seen before (and not yet evicted)?
  pub fn is_duplicate(&self, peer: SocketAddr, id: Id) -> bool {
    self.seen.iter().any(|s| *s.data() == (peer, id))
  }

  /// Cache the serialized response sent for `(peer, id)`, so a later
  /// duplicate of that request can be answered by resending it.
  pub fn cache_response(&mut self, peer: SocketAddr, id: Id, response: Vec<u8>) {
    let key = (peer, id);
    match self.responses.iter_mut().find(|(k, _)| *k == key) {
      | Some((_, existing)) => *existing = response,
      | None => self.responses.push((key, response)),
    }
  }

  /// The cached response bytes for `(peer, id)`, if any were recorded.
  pub fn cached_response(&self, peer: SocketAddr, id: Id) -> Option<&[u8]> {
    self.responses
        .iter()
        .find(|(k, _)| *k == (peer, id))
        .map(|(_, resp)| resp.as_slice())
  }
}
