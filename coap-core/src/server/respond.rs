//! Response-construction helpers.

use coap_msg::{Code, Id, Message, Payload, Token, Type};

/// Build a response to `req`: an ACK carrying the piggybacked response if
/// `req` was CON, otherwise a separate CON/NON response addressed by the
/// same token.
pub fn for_request(req: &Message, code: Code, payload: Vec<u8>) -> Message {
  let mut resp = match req.ty {
    | Type::Con => req.ack(req.id),
    | _ => Message::new(req.ty, Code::EMPTY, req.id, req.token.clone()),
  };

  resp.code = code;
  resp.token = req.token.clone();
  resp.set_payload(Payload(payload));
  resp
}

/// [`for_request`] with 2.05 CONTENT.
pub fn ok(req: &Message, payload: Vec<u8>) -> Message {
  for_request(req, Code::CONTENT, payload)
}

/// [`for_request`] with 4.04 NOT_FOUND and an empty body.
pub fn not_found(req: &Message) -> Message {
  for_request(req, Code::NOT_FOUND, Vec::new())
}

/// [`for_request`] with 4.05 METHOD_NOT_ALLOWED and an empty body.
pub fn method_not_allowed(req: &Message) -> Message {
  for_request(req, Code::METHOD_NOT_ALLOWED, Vec::new())
}

/// Build a standalone Observe notification (§4.7): a NON 2.05 Content
/// message carrying `age` in the Observe option, addressed to `token` with
/// a freshly allocated message ID.
pub fn notify(token: Token, id: Id, age: u32, payload: Vec<u8>) -> Message {
  let mut msg = Message::new(Type::Non, Code::CONTENT, id, token);
  let _ = msg.set_observe(age);
  msg.set_payload(Payload(payload));
  msg
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn con_request_gets_acked() {
    let req = Message::new(Type::Con, Code::GET, Id(7), Token(vec![1]));
    let resp = ok(&req, b"hi".to_vec());
    assert_eq!(resp.ty, Type::Ack);
    assert_eq!(resp.id, Id(7));
    assert_eq!(resp.code, Code::CONTENT);
    assert_eq!(resp.payload.0, b"hi");
  }

  #[test]
  fn non_request_gets_separate_response() {
    let req = Message::new(Type::Non, Code::GET, Id(7), Token(vec![1]));
    let resp = not_found(&req);
    assert_eq!(resp.ty, Type::Non);
    assert_eq!(resp.code, Code::NOT_FOUND);
  }

  #[test]
  fn notify_carries_age_in_observe_option() {
    let msg = notify(Token(vec![1]), Id(5), 12, b"21.6".to_vec());
    assert_eq!(msg.ty, Type::Non);
    assert_eq!(msg.code, Code::CONTENT);
    assert_eq!(msg.observe(), Some(12));
    assert_eq!(msg.payload.0, b"21.6");
  }
}
