//! Token / Request-Tag generator (RFC 7252 §5.3.1, RFC 9175 §4.2).
//!
//! Values are laid out as a big-endian 32-bit session prefix concatenated
//! with a big-endian 32-bit monotonic counter, so that within a session no
//! value is ever produced twice and the low 32 bits strictly increase.

use rand::{Rng, SeedableRng};

/// Generates 8-byte tokens (and, via the same scheme, Request-Tag values).
///
/// ```
/// use coap_core::token::TokenGenerator;
///
/// let mut gen = TokenGenerator::new(0xDEAD_BEEF);
/// let a = gen.next_token();
/// let b = gen.next_token();
/// assert_ne!(a, b);
/// assert!(u32::from_be_bytes(b[4..].try_into().unwrap())
///           > u32::from_be_bytes(a[4..].try_into().unwrap()));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct TokenGenerator {
  prefix: u32,
  counter: u32,
}

impl TokenGenerator {
  /// Create a generator seeded from the given random/machine-specific seed.
  /// The prefix is derived from the seed; use [`TokenGenerator::rekey`] to
  /// draw a fresh one from an RNG at runtime.
  pub fn new(seed: u16) -> Self {
    Self { prefix: (seed as u32) << 16 | seed as u32,
           counter: 0 }
  }

  /// Reset the counter to zero, keeping `prefix` fixed.
  pub fn reset(&mut self, prefix: u32) {
    self.prefix = prefix;
    self.counter = 0;
  }

  /// Draw a fresh random prefix and reset the counter. Call this after any
  /// OSCORE rekey event so that tokens/Request-Tags from the old and new
  /// keying material can never collide.
  pub fn rekey(&mut self, rng: &mut rand_chacha::ChaCha8Rng) {
    self.prefix = rng.gen();
    self.counter = 0;
  }

  /// Produce the next token/Request-Tag value. Never repeats within a session
  /// (until the 32-bit counter itself wraps, which at one call per microsecond
  /// takes over an hour — callers expecting longer sessions should `rekey`).
  pub fn next_token(&mut self) -> [u8; 8] {
    let counter = self.counter;
    self.counter = self.counter.wrapping_add(1);

    let mut bytes = [0u8; 8];
    bytes[..4].copy_from_slice(&self.prefix.to_be_bytes());
    bytes[4..].copy_from_slice(&counter.to_be_bytes());
    bytes
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn counter_increments() {
    let mut gen = TokenGenerator::new(7);
    let a = gen.next_token();
    let b = gen.next_token();
    assert_ne!(a, b);
    assert_eq!(&a[..4], &b[..4]);
    assert_eq!(u32::from_be_bytes(a[4..].try_into().unwrap()), 0);
    assert_eq!(u32::from_be_bytes(b[4..].try_into().unwrap()), 1);
  }

  #[test]
  fn reset_zeroes_counter() {
    let mut gen = TokenGenerator::new(7);
    gen.next_token();
    gen.next_token();
    gen.reset(0x1234_5678);
    let t = gen.next_token();
    assert_eq!(&t[..4], &0x1234_5678u32.to_be_bytes());
    assert_eq!(u32::from_be_bytes(t[4..].try_into().unwrap()), 0);
  }

  #[test]
  fn rekey_changes_prefix() {
    let mut gen = TokenGenerator::new(7);
    let before = gen.next_token();

    let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(42);
    gen.rekey(&mut rng);
    let after = gen.next_token();

    assert_ne!(&before[..4], &after[..4]);
    assert_eq!(u32::from_be_bytes(after[4..].try_into().unwrap()), 0);
  }
}
