/// A forward-only cursor over a byte slice.
///
/// CoAP's wire format has to be walked left-to-right exactly once (delta
/// encoding means a later option's number depends on everything that came
/// before it), so parsing never needs random access — only "give me the next
/// `n` bytes and remember where we are."
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
  bytes: &'a [u8],
  pos: usize,
}

impl<'a> Cursor<'a> {
  /// Start a cursor at the beginning of `bytes`
  pub fn new(bytes: &'a [u8]) -> Self {
    Self { bytes, pos: 0 }
  }

  /// Number of bytes not yet consumed
  pub fn remaining(&self) -> usize {
    self.bytes.len() - self.pos
  }

  /// Consume and return the next byte, if any
  pub fn next(&mut self) -> Option<u8> {
    let b = self.bytes.get(self.pos).copied();
    if b.is_some() {
      self.pos += 1;
    }
    b
  }

  /// Consume and return exactly `n` bytes, or `None` if fewer than `n` remain
  pub fn take_exact(&mut self, n: usize) -> Option<&'a [u8]> {
    if self.remaining() < n {
      return None;
    }
    let slice = &self.bytes[self.pos..self.pos + n];
    self.pos += n;
    Some(slice)
  }

  /// Consume and return up to `n` bytes (fewer if the buffer runs out first)
  pub fn take(&mut self, n: usize) -> &'a [u8] {
    let n = n.min(self.remaining());
    let slice = &self.bytes[self.pos..self.pos + n];
    self.pos += n;
    slice
  }

  /// Consume and return the rest of the buffer
  pub fn take_until_end(&mut self) -> &'a [u8] {
    let slice = &self.bytes[self.pos..];
    self.pos = self.bytes.len();
    slice
  }
}

/// Trait for converting a sequence of bytes into some data structure
pub trait TryFromBytes<A: AsRef<[u8]>>: Sized {
  /// Error type yielded if conversion fails
  type Error;

  /// Try to convert from some sequence of bytes into `Self`
  fn try_from_bytes(bytes: A) -> Result<Self, Self::Error>;
}

/// Trait for a piece of a data structure that parses itself by mutating a
/// cursor over a byte buffer. Not part of the public API — callers should
/// go through [`TryFromBytes`].
pub(crate) trait TryConsumeBytes: Sized {
  /// Error type yielded if conversion fails
  type Error;

  /// Try to consume bytes from `bytes`, advancing the cursor, producing `Self`
  fn try_consume_bytes(bytes: &mut Cursor<'_>) -> Result<Self, Self::Error>;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn cursor_basics() {
    let mut c = Cursor::new(&[1, 2, 3, 4, 5]);
    assert_eq!(c.next(), Some(1));
    assert_eq!(c.take_exact(2), Some(&[2, 3][..]));
    assert_eq!(c.remaining(), 2);
    assert_eq!(c.take_until_end(), &[4, 5][..]);
    assert_eq!(c.next(), None);
  }

  #[test]
  fn take_exact_eof() {
    let mut c = Cursor::new(&[1, 2]);
    assert_eq!(c.take_exact(3), None);
  }
}
