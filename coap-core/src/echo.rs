//! RFC 9175 §2 Echo freshness challenge/response cache (§4.8).

use std::net::SocketAddr;

use rand::RngCore;

use crate::time::{Clock, Stamped};

/// Errors the Echo engine can raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EchoError {
  /// The option's length fell outside `1..=40`.
  BadLength,
}

/// Bounded, LRU-evicted cache of outstanding Echo challenges.
#[derive(Debug)]
pub struct EchoCache<C: Clock> {
  entries: Vec<Stamped<C, (SocketAddr, Vec<u8>)>>,
  capacity: usize,
  max_len: usize,
  lifetime_millis: u64,
}

impl<C: Clock> EchoCache<C> {
  /// Create a cache bounded to `capacity` peers, challenges no longer than
  /// `max_len` bytes, and a freshness window of `lifetime_millis`.
  pub fn new(capacity: usize, max_len: usize, lifetime_millis: u64) -> Self {
    Self { entries: Vec::with_capacity(capacity),
           capacity,
           max_len,
           lifetime_millis }
  }

  /// Generate and cache a fresh challenge value for `peer`, evicting the
  /// oldest entry first if the cache is full.
  pub fn challenge(&mut self, clock: &C, peer: SocketAddr, len: usize) -> Result<Vec<u8>, EchoError> {
    if len == 0 || len > self.max_len {
      return Err(EchoError::BadLength);
    }

    if self.entries.len() >= self.capacity {
      if let Some((ix, _)) = self.entries.iter().enumerate().min_by_key(|(_, s)| s.time()) {
        self.entries.remove(ix);
      }
    }

    let mut value = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut value);

    if let Ok(stamped) = Stamped::new(clock, (peer, value.clone())) {
      self.entries.push(stamped);
    }

    Ok(value)
  }

  /// Verify that `value` matches the cached challenge for `peer` and that
  /// it's still within the freshness window (as measured from `now`).
  ///
  /// A successful verification does not consume the entry: replaying the
  /// same value again within the window also succeeds, per the freshness
  /// property — it is the caller's job to evict on rekey or explicit logout.
  pub fn verify(&self, value: &[u8], peer: SocketAddr, now_millis: u64) -> bool {
    if value.is_empty() || value.len() > self.max_len {
      return false;
    }

    self.entries.iter().any(|s| {
                          let (p, v) = s.data();
                          if *p != peer || v.as_slice() != value {
                            return false;
                          }

                          let stamped_millis =
                            crate::time::Millis::try_from(s.time().duration_since_epoch())
                              .map(|m| m.0)
                              .unwrap_or(u64::MAX);

                          now_millis.saturating_sub(stamped_millis) <= self.lifetime_millis
                        })
  }
}
