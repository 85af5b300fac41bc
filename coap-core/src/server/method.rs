//! Method filtering helpers.

use coap_msg::{Code, Message};

/// Does `req`'s code match `method`?
pub fn is(req: &Message, method: Code) -> bool {
  req.code == method
}

/// Does `req`'s code match any of `methods`?
pub fn is_one_of(req: &Message, methods: &[Code]) -> bool {
  methods.iter().any(|&m| req.code == m)
}

/// Is `req` a GET?
pub fn get(req: &Message) -> bool {
  is(req, Code::GET)
}

/// Is `req` a POST?
pub fn post(req: &Message) -> bool {
  is(req, Code::POST)
}

/// Is `req` a PUT?
pub fn put(req: &Message) -> bool {
  is(req, Code::PUT)
}

/// Is `req` a DELETE?
pub fn delete(req: &Message) -> bool {
  is(req, Code::DELETE)
}

#[cfg(test)]
mod tests {
  use coap_msg::{Id, Token, Type};

  use super::*;

  #[test]
  fn filters_match_expected_codes() {
    let req = Message::new(Type::Con, Code::GET, Id(0), Token(Vec::new()));
    assert!(get(&req));
    assert!(!post(&req));
    assert!(is_one_of(&req, &[Code::GET, Code::PUT]));
    assert!(!is_one_of(&req, &[Code::POST, Code::DELETE]));
  }
}
