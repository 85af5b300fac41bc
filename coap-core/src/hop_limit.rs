//! Hop-Limit (RFC 8768) and No-Response (RFC 7967) helpers (§4.9).
//!
//! The wire-level option encode/decode lives on [`coap_msg::Message`]
//! (`set_hop_limit`/`hop_limit`, `set_no_response`/`no_response`); this
//! module adds the proxy chaining and response-suppression policy built on
//! top of it.

use coap_msg::{Code, Message};

/// Errors the Hop-Limit/No-Response helpers can raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HopLimitError {
  /// A proxy decremented Hop-Limit to zero; the message must not be forwarded.
  Unreachable,
  /// Caller tried to set Hop-Limit to 0.
  BadInput,
}

/// Append a Hop-Limit option. Refuses `0`.
pub fn set_hop_limit(msg: &mut Message, value: u8) -> Result<(), HopLimitError> {
  if value == 0 {
    return Err(HopLimitError::BadInput);
  }
  msg.set_hop_limit(value).ok();
  Ok(())
}

/// Proxy-side update applied once per hop: decrements an existing Hop-Limit
/// by 1 (returning [`HopLimitError::Unreachable`] if it would reach 0), or
/// inserts the option with `default` (or 16 if `default` is 0) if absent.
pub fn proxy_update(msg: &mut Message, default: u8) -> Result<(), HopLimitError> {
  match msg.hop_limit() {
    | None => {
      let default = if default == 0 { 16 } else { default };
      set_hop_limit(msg, default)
    },
    | Some(n) if n <= 1 => Err(HopLimitError::Unreachable),
    | Some(n) => set_hop_limit(msg, n - 1),
  }
}

/// Which response classes a No-Response bitmask suppresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Suppress {
  /// Suppress 2.xx responses.
  pub success: bool,
  /// Suppress 4.xx responses.
  pub client_error: bool,
  /// Suppress 5.xx responses.
  pub server_error: bool,
}

impl From<u8> for Suppress {
  fn from(bits: u8) -> Self {
    Self { success: bits & 0b0000_0010 != 0,
           client_error: bits & 0b0000_1000 != 0,
           server_error: bits & 0b0001_0000 != 0 }
  }
}

/// Should a response of `candidate_code` be suppressed, per the request's
/// No-Response option? An absent option preserves RFC 7252 defaults (never
/// suppress).
pub fn no_response_check(request: &Message, candidate_code: Code) -> bool {
  let mask = match request.no_response() {
    | Some(bits) => Suppress::from(bits),
    | None => return false,
  };

  match candidate_code.class {
    | 2 => mask.success,
    | 4 => mask.client_error,
    | 5 => mask.server_error,
    | _ => false,
  }
}

#[cfg(test)]
mod tests {
  use coap_msg::{Id, Message, Token, Type};

  use super::*;

  fn msg() -> Message {
    Message::new(Type::Con, Code::GET, Id(1), Token(Default::default()))
  }

  #[test]
  fn hop_limit_zero_rejected() {
    let mut m = msg();
    assert_eq!(set_hop_limit(&mut m, 0), Err(HopLimitError::BadInput));
  }

  #[test]
  fn proxy_update_exhausts_at_one() {
    let mut m = msg();
    set_hop_limit(&mut m, 1).unwrap();
    assert_eq!(proxy_update(&mut m, 0), Err(HopLimitError::Unreachable));
  }

  #[test]
  fn proxy_update_inserts_default() {
    let mut m = msg();
    proxy_update(&mut m, 32).unwrap();
    assert_eq!(m.hop_limit(), Some(32));
  }

  #[test]
  fn proxy_update_inserts_sixteen_when_default_zero() {
    let mut m = msg();
    proxy_update(&mut m, 0).unwrap();
    assert_eq!(m.hop_limit(), Some(16));
  }

  #[test]
  fn no_response_absent_means_all_sent() {
    let m = msg();
    assert!(!no_response_check(&m, Code { class: 2, detail: 5 }));
  }

  #[test]
  fn no_response_empty_value_suppresses_nothing() {
    let mut m = msg();
    m.set_no_response(0).unwrap();
    assert!(!no_response_check(&m, Code { class: 2, detail: 5 }));
  }

  #[test]
  fn no_response_suppresses_matching_class() {
    let mut m = msg();
    m.set_no_response(0b0000_1000).unwrap();
    assert!(no_response_check(&m, Code { class: 4, detail: 4 }));
    assert!(!no_response_check(&m, Code { class: 2, detail: 5 }));
  }
}
