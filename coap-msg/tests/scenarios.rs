//! End-to-end wire-format scenarios.

use coap_msg::{Code, ContentFormat, Id, Message, OscoreOption, Payload, Token, TryFromBytes,
               TryIntoBytes, Type};

#[test]
fn s1_minimal_empty_con() {
  let bytes: &[u8] = &[0x40, 0x01, 0x00, 0x00];

  let msg: Message = TryFromBytes::try_from_bytes(bytes).unwrap();
  assert_eq!(msg.ver.0, 1);
  assert_eq!(msg.ty, Type::Con);
  assert_eq!(msg.code, Code::GET);
  assert_eq!(msg.id, Id(0));
  assert_eq!(msg.token.0.len(), 0);
  assert!(msg.payload.0.is_empty());

  let roundtrip = msg.try_into_bytes().unwrap();
  assert_eq!(roundtrip, bytes);
}

#[test]
fn s2_options_and_payload() {
  let mut msg = Message::new(Type::Non, Code::CONTENT, Id(0x1234), Token(b"token".to_vec()));
  msg.set_content_format(ContentFormat::Text).unwrap();

  let mut payload = b"payload".to_vec();
  payload.push(0);
  msg.set_payload(Payload(payload));

  let bytes = msg.clone().try_into_bytes().unwrap();
  let expected: &[u8] = &[0x55, 0xA5, 0x12, 0x34, 0x74, 0x6F, 0x6B, 0x65, 0x6E, 0xC0, 0xFF, 0x70,
                          0x61, 0x79, 0x6C, 0x6F, 0x61, 0x64, 0x00];
  assert_eq!(bytes, expected);

  let parsed: Message = TryFromBytes::try_from_bytes(expected).unwrap();
  assert_eq!(parsed.content_format(), Some(ContentFormat::Text));
  assert_eq!(parsed.payload.0.len(), 8);
}

#[test]
fn s5_oscore_duplicate_option_is_bad_message() {
  // Header (CON GET, empty token) followed by two OSCORE (option 9) entries,
  // each carrying a 1-byte kid via flags=0x08: first at delta 9, second at
  // delta 0 (same option number).
  let bytes: &[u8] = &[0x40, 0x01, 0x00, 0x00, 0x92, 0x08, 0x01, 0x02, 0x08, 0x02];

  let err = Message::try_from_bytes(bytes).unwrap_err();
  assert!(matches!(err, coap_msg::MessageParseError::OptParseError(_)));
}

#[test]
fn oscore_option_roundtrips_through_set_and_get() {
  let mut msg = Message::new(Type::Con, Code::POST, Id(1), Token(Vec::new()));
  let value = OscoreOption { partial_iv: None,
                             kid_context: None,
                             kid: Some(vec![1]) };
  msg.set_oscore(&value).unwrap();
  assert_eq!(msg.oscore().unwrap(), Some(value));
}

#[test]
fn invariant_non_decreasing_option_sequence_parses_correctly() {
  // Uri-Path (11), Content-Format (12), Uri-Query (15): a non-decreasing
  // option-number sequence, each a distinct delta from the last.
  let mut msg = Message::new(Type::Con, Code::GET, Id(1), Token(Vec::new()));
  msg.set_path("sensors/temp").unwrap();
  msg.set_content_format(ContentFormat::Json).unwrap();
  msg.add_query("unit=c").unwrap();

  let bytes = msg.clone().try_into_bytes().unwrap();
  let parsed: Message = TryFromBytes::try_from_bytes(&bytes).unwrap();

  assert_eq!(parsed.path().unwrap(), vec!["sensors", "temp"]);
  assert_eq!(parsed.content_format(), Some(ContentFormat::Json));
  assert_eq!(parsed.query().unwrap(), vec!["unit=c"]);
}

#[test]
fn set_path_splits_path_and_query_segments() {
  // "a?b=t&a" -> Uri-Path=["a"], Uri-Query=["b=t", "a"]
  let mut msg = Message::new(Type::Con, Code::GET, Id(1), Token(Vec::new()));
  msg.set_path("a?b=t&a").unwrap();
  assert_eq!(msg.path().unwrap(), vec!["a"]);
  assert_eq!(msg.query().unwrap(), vec!["b=t", "a"]);

  // a bare "?" with no path segments still yields Uri-Query when non-empty
  let mut msg = Message::new(Type::Con, Code::GET, Id(1), Token(Vec::new()));
  msg.set_path("?a&b").unwrap();
  assert!(msg.path().unwrap().is_empty());
  assert_eq!(msg.query().unwrap(), vec!["a", "b"]);

  // no '?' at all leaves Uri-Query untouched
  let mut msg = Message::new(Type::Con, Code::GET, Id(1), Token(Vec::new()));
  msg.set_path("a/b").unwrap();
  assert_eq!(msg.path().unwrap(), vec!["a", "b"]);
  assert!(msg.query().unwrap().is_empty());
}

#[test]
fn invariant_parse_encode_roundtrip() {
  let mut msg = Message::new(Type::Con, Code::GET, Id(7), Token(vec![0xAB, 0xCD]));
  msg.set_path("sensors/temp").unwrap();
  msg.set_payload(Payload(b"hi".to_vec()));

  let bytes = msg.clone().try_into_bytes().unwrap();
  let parsed: Message = TryFromBytes::try_from_bytes(&bytes).unwrap();
  assert_eq!(parsed.ty, msg.ty);
  assert_eq!(parsed.code, msg.code);
  assert_eq!(parsed.id, msg.id);
  assert_eq!(parsed.token, msg.token);
  assert_eq!(parsed.payload, msg.payload);
}

#[test]
fn invariant_uint_zero_encodes_as_zero_length() {
  let mut msg = Message::new(Type::Con, Code::GET, Id(1), Token(Vec::new()));
  msg.set_content_format(ContentFormat::Text).unwrap(); // numeric value 0
  let bytes = msg.try_into_bytes().unwrap();

  // Content-Format is the first (and only) option; its length nibble must
  // be 0 since the encoded value 0 uses the empty representation.
  let opt_byte = bytes[4];
  assert_eq!(opt_byte & 0x0F, 0);
}
