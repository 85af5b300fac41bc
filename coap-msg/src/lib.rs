//! Low-level representation of CoAP messages (RFC 7252).
//!
//! The central type is [`Message`]: a CoAP message kept close to its actual
//! byte layout. Payload is `Vec<u8>`; options are stored in a
//! `BTreeMap<OptNumber, Vec<OptValue>>` so that option-number ordering
//! (required by the wire format's delta encoding) comes for free from the
//! map's iteration order.
//!
//! ```
//! use coap_msg::{Code, Id, Message, Token, Type, TryFromBytes, TryIntoBytes};
//!
//! let mut req = Message::new(Type::Con, Code::GET, Id(1), Token::opaque(b"hi"));
//! req.set_path("sensors/temp").unwrap();
//!
//! let bytes: Vec<u8> = req.clone().try_into_bytes().unwrap();
//! let parsed = Message::try_from_bytes(&bytes).unwrap();
//! assert_eq!(parsed.path().unwrap(), vec!["sensors", "temp"]);
//! ```

#![deny(missing_debug_implementations, missing_copy_implementations)]
#![cfg_attr(not(test), deny(unsafe_code))]

/// Message parsing (`TryFromBytes`)
pub mod from_bytes;

/// Message structs
pub mod msg;

/// Message serialization (`TryIntoBytes`)
pub mod to_bytes;

/// Cache-Key computation (RFC 7252 §5.6)
pub mod cache_key;

#[doc(inline)]
pub use cache_key::CacheKey;
#[doc(inline)]
pub use from_bytes::TryFromBytes;
#[doc(inline)]
pub use msg::*;
#[doc(inline)]
pub use to_bytes::TryIntoBytes;

#[cfg(test)]
pub(crate) fn test_msg() -> (Message, Vec<u8>) {
  use std::collections::BTreeMap;

  let header: [u8; 4] = 0b0100_0001_0100_0101_0000_0000_0000_0001_u32.to_be_bytes();
  let token: [u8; 1] = [254u8];
  let content_format: &[u8] = b"application/json";
  let options: [&[u8]; 2] = [&[0b_1100_1101u8, 0b00000011u8], content_format];
  let payload: [&[u8]; 2] = [&[0b1111_1111_u8], b"hello, world!"];
  let bytes = [header.as_ref(),
               token.as_ref(),
               options.concat().as_ref(),
               payload.concat().as_ref()].concat();

  let msg = Message { id: Id(1),
                      ty: Type::Con,
                      ver: Version(1),
                      token: Token::from_bytes(&[254]),
                      opts: BTreeMap::from([(OptNumber(12),
                                             vec![OptValue(content_format.to_vec())])]),
                      code: Code { class: 2,
                                   detail: 5 },
                      payload: Payload(b"hello, world!".to_vec()) };
  (msg, bytes)
}

#[cfg(test)]
#[macro_export]
macro_rules! assert_eqb_iter {
  ($actual:expr, $expected:expr) => {
    if $actual.iter().ne($expected.iter()) {
      panic!("expected {:?} to equal {:?}",
             $actual.iter().map(|b| format!("{:08b}", b)).collect::<Vec<_>>(),
             $expected.iter().map(|b| format!("{:08b}", b)).collect::<Vec<_>>())
    }
  };
}
