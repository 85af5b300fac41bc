use std::hash::{Hash, Hasher};

use blake2::digest::consts::U8;
use blake2::{Blake2b, Digest};

use crate::Message;

/// `core::hash::Hasher` backed by BLAKE2b, truncated to 64 bits on `finish`.
///
/// `finish` clones the running digest state rather than consuming it, since
/// `Hasher::finish` takes `&self` but `Digest::finalize` takes `self`.
#[derive(Clone, Default)]
pub struct Blake2Hasher(Blake2b<U8>);

impl std::fmt::Debug for Blake2Hasher {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Blake2Hasher").finish_non_exhaustive()
  }
}

impl Hasher for Blake2Hasher {
  fn write(&mut self, bytes: &[u8]) {
    self.0.update(bytes);
  }

  fn finish(&self) -> u64 {
    let digest = self.0.clone().finalize();
    u64::from_be_bytes(Into::<[u8; 8]>::into(digest))
  }
}

/// Computes a [`CacheKey`] for a [`Message`], hashing:
///  - [`Message::code`]
///  - every option marked [`crate::OptNumber::include_in_cache_key`]
///
/// Requests with different message IDs but the same method and cache-key
/// affecting options (path, query parameters, ...) yield the same key.
#[derive(Debug, Clone, Default)]
pub struct CacheKey(Blake2Hasher);

impl CacheKey {
  /// Start a fresh cache-key computation
  pub fn new() -> Self {
    Self::default()
  }

  /// Fold a message's cache-key-relevant fields into the running hash
  pub fn add(&mut self, msg: &Message) {
    msg.code.hash(&mut self.0);
    for (num, vals) in msg.opts.iter() {
      if num.include_in_cache_key() {
        for v in vals {
          v.hash(&mut self.0);
        }
      }
    }
  }

  /// Fold in `msg` and yield the resulting 64-bit key
  ///
  /// ```
  /// use coap_msg::{CacheKey, Code, ContentFormat, Id, Message, Token, Type::Con};
  ///
  /// let mut msg_a = Message::new(Con, Code::GET, Id(1), Token(Default::default()));
  /// msg_a.set_path("foo/bar").ok();
  /// msg_a.set_accept(ContentFormat::Text).ok();
  ///
  /// let mut msg_b = Message::new(Con, Code::GET, Id(2), Token(Default::default()));
  /// msg_b.set_accept(ContentFormat::Text).ok();
  /// msg_b.set_path("foo/bar").ok();
  ///
  /// assert_eq!(CacheKey::new().key(&msg_a), CacheKey::new().key(&msg_b));
  /// ```
  pub fn key(mut self, msg: &Message) -> u64 {
    self.add(msg);
    self.0.finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{ContentFormat, Id, Token, Type};

  fn req<F: FnOnce(&mut Message)>(stuff: F) -> u64 {
    let mut req = Message::new(Type::Con, Code::GET, Id(1), Token(Default::default()));
    stuff(&mut req);
    CacheKey::new().key(&req)
  }

  use crate::Code;

  #[test]
  fn differs_by_path() {
    assert_ne!(req(|r| {
                 r.set_path("a/b/c").ok();
               }),
               req(|_| {}));
  }

  #[test]
  fn same_for_equivalent_requests() {
    assert_eq!(req(|r| {
                 r.set_path("a/b/c").ok();
               }),
               req(|r| {
                 r.set_path("a/b/c").ok();
               }));
  }

  #[test]
  fn differs_by_query() {
    assert_ne!(req(|r| {
                 r.set_path("a/b/c").ok();
                 r.add_query("filter[temp](less_than)=123").ok();
               }),
               req(|r| {
                 r.set_path("a/b/c").ok();
               }));
  }

  #[test]
  fn differs_by_accept() {
    assert_ne!(req(|r| {
                 r.set_path("a/b/c").ok();
                 r.set_accept(ContentFormat::Json).ok();
               }),
               req(|r| {
                 r.set_path("a/b/c").ok();
                 r.set_accept(ContentFormat::Text).ok();
               }));
  }

  #[test]
  fn ignores_block_options() {
    assert_eq!(req(|r| {
                 r.set_path("a/b/c").ok();
                 r.set_block2(64, 0, true).ok();
               }),
               req(|r| {
                 r.set_path("a/b/c").ok();
                 r.set_block2(64, 5, false).ok();
               }));
  }
}
