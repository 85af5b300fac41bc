use toad_macros::rfc_7252_doc;

use super::MessageParseError;
use crate::from_bytes::{Cursor, TryConsumeBytes};

#[doc = rfc_7252_doc!("5.3.1")]
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Token(pub Vec<u8>);

impl Token {
  /// The maximum length of a token, in bytes (4-bit TKL field in the header)
  pub const MAX_LEN: usize = 8;

  /// Build a token from a byte slice already known to be the right length
  /// (`tkl` bytes consumed off the wire).
  pub fn from_bytes(bytes: &[u8]) -> Self {
    debug_assert!(bytes.len() <= Self::MAX_LEN);
    Token(bytes.to_vec())
  }

  /// Take an arbitrary-length sequence of bytes and turn it into an opaque message token
  ///
  /// Currently uses the BLAKE2 hashing algorithm, but this may change in the future.
  ///
  /// ```
  /// use coap_msg::Token;
  ///
  /// let my_token = Token::opaque(&[0, 1, 2]);
  /// ```
  pub fn opaque(data: &[u8]) -> Token {
    use blake2::digest::consts::U8;
    use blake2::{Blake2b, Digest};

    let mut digest = Blake2b::<U8>::new();
    digest.update(data);
    Token(Into::<[u8; 8]>::into(digest.finalize()).to_vec())
  }
}

impl TryConsumeBytes for Token {
  type Error = MessageParseError;

  /// Assumes `bytes` has already been scoped to exactly the token's length
  /// (the header's TKL field), e.g. via [`Cursor::take_exact`].
  fn try_consume_bytes(bytes: &mut Cursor<'_>) -> Result<Self, Self::Error> {
    Ok(Token::from_bytes(bytes.take_until_end()))
  }
}
