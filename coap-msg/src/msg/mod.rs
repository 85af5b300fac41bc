use std::collections::BTreeMap;
use std::str::{from_utf8, Utf8Error};

use toad_macros::rfc_7252_doc;

/// Message Code
pub mod code;

/// Message parsing errors
pub mod parse_error;

/// Message ID
pub mod id;

/// Message Options
pub mod opt;

/// Message Type
pub mod ty;

/// Message Token
pub mod token;

/// Message Version
pub mod ver;

pub use code::*;
pub use id::*;
pub use opt::*;
pub use parse_error::*;
pub use token::*;
pub use ty::*;
pub use ver::*;

use crate::from_bytes::{Cursor, TryConsumeBytes};
use crate::TryFromBytes;

#[doc = rfc_7252_doc!("5.5")]
#[derive(Default, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Payload(pub Vec<u8>);

impl Payload {
  /// Convert a reference to a Payload to a byte slice
  pub fn as_bytes(&self) -> &[u8] {
    &self.0
  }
}

/// Struct representing the first byte of a message.
///
/// ```text
/// CoAP version
/// |
/// |  Message type (request, response, empty)
/// |  |
/// |  |  Length of token, in bytes. (4-bit integer)
/// |  |  |
/// vv vv vvvv
/// 01 00 0000
/// ```
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Eq, Ord)]
pub(crate) struct Byte1 {
  pub(crate) ver: Version,
  pub(crate) ty: Type,
  pub(crate) tkl: u8,
}

impl TryFrom<u8> for Byte1 {
  type Error = MessageParseError;

  fn try_from(b: u8) -> Result<Self, Self::Error> {
    let ver = b >> 6;
    let ty = b >> 4 & 0b11;
    let tkl = b & 0b1111u8;

    Ok(Byte1 { ver: Version(ver),
               ty: Type::try_from(ty)?,
               tkl })
  }
}

/// # CoAP Messages
///
/// This struct provides a high-level API for manipulating requests & responses,
/// while still being cheaply serializable to & from the byte layout of CoAP
/// messages on the wire. Options are kept in a `BTreeMap<OptNumber, Vec<OptValue>>`
/// so that iterating them yields ascending option-number order for free, which
/// is exactly the order the delta encoding needs.
///
/// ## Constructing
/// [`Message::new`] is the most straightforward way to initialize messages.
/// Being one of the few structs with public fields, you may also initialize it
/// with a struct literal.
///
/// ```
/// use coap_msg::{Code, Id, Message, Payload, Token, Type, Version};
///
/// let a = Message { id: Id(1),
///                   token: Token(vec![]),
///                   ver: Version::default(),
///                   ty: Type::Con,
///                   code: Code::GET,
///                   payload: Payload(vec![]),
///                   opts: Default::default() };
///
/// let b = Message::new(Type::Con, Code::GET, Id(1), Token(vec![]));
///
/// assert_eq!(a, b);
/// ```
///
/// ## Sending / Receiving
/// This crate explicitly does **not** know or care about how messages are sent
/// and received; it's just concerned with the data structures involved. See
/// `coap-core` for the matching, reliability, and transport-facing pieces built
/// on top of it.
///
/// <details>
/// <summary><b>Further Reading from RFC7252</b></summary>
#[doc = concat!("\n\n#", rfc_7252_doc!("2.1"))]
#[doc = concat!("\n\n#", rfc_7252_doc!("3"))]
/// </details>
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Message {
  /// see [`Id`] for details
  pub id: Id,
  /// see [`Type`] for details
  pub ty: Type,
  /// see [`Version`] for details
  pub ver: Version,
  /// see [`Token`] for details
  pub token: Token,
  /// see [`Code`] for details
  pub code: Code,
  /// see [`opt::Opt`] for details
  pub opts: BTreeMap<OptNumber, OptValues>,
  /// see [`Payload`]
  pub payload: Payload,
}

/// An error occurred while setting an option
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOptionError {
  /// The option isn't marked repeatable in the catalog, but a value for it
  /// already existed
  NotRepeatable,
}

impl Message {
  /// Create a new message
  pub fn new(ty: Type, code: Code, id: Id, token: Token) -> Self {
    Self { id,
           token,
           ty,
           code,
           ver: Version::default(),
           payload: Payload::default(),
           opts: BTreeMap::default() }
  }

  /// Get the payload
  pub fn payload(&self) -> &Payload {
    &self.payload
  }

  /// Set the payload, returning the old payload if there was one
  pub fn set_payload(&mut self, p: Payload) -> Option<Payload> {
    let old = std::mem::replace(&mut self.payload, p);
    Some(old).filter(|old| !old.0.is_empty())
  }

  /// Create a new message that ACKs this one, reusing its token
  pub fn ack(&self, id: Id) -> Self {
    Self { id,
           token: self.token.clone(),
           ver: Default::default(),
           ty: Type::Ack,
           code: Code::EMPTY,
           payload: Payload::default(),
           opts: Default::default() }
  }

  /// Insert a new value for a given option, alongside any existing values if
  /// the catalog marks it repeatable.
  fn add(&mut self, n: OptNumber, v: OptValue) -> Result<(), SetOptionError> {
    let repeatable = opt::known::catalog::lookup(n).map(|s| s.repeatable).unwrap_or(true);
    let entry = self.opts.entry(n).or_default();
    if !entry.is_empty() && !repeatable {
      return Err(SetOptionError::NotRepeatable);
    }
    entry.push(v);
    Ok(())
  }

  /// Replace any/all existing values with a new one, yielding the previous value(s)
  fn set(&mut self, n: OptNumber, v: OptValue) -> Option<OptValues> {
    let old = self.remove(n);
    self.opts.insert(n, vec![v]);
    old
  }

  fn get(&self, n: OptNumber) -> Option<&OptValues> {
    self.opts.get(&n)
  }

  fn get_first(&self, n: OptNumber) -> Option<&OptValue> {
    self.get(n).and_then(|vs| vs.first())
  }

  fn get_str(&self, n: OptNumber) -> Result<Option<&str>, Utf8Error> {
    match self.get_first(n) {
      | Some(v) => from_utf8(&v.0).map(Some),
      | None => Ok(None),
    }
  }

  fn get_strs<'a>(&'a self, n: OptNumber) -> Result<Vec<&'a str>, Utf8Error> {
    match self.get(n) {
      | Some(vs) => vs.iter().map(|v| from_utf8(&v.0)).collect(),
      | None => Ok(Vec::new()),
    }
  }

  fn get_uint(&self, n: OptNumber) -> Option<u64> {
    self.get_first(n).filter(|v| v.0.len() <= 8).map(|v| {
                       v.0.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
                     })
  }

  fn remove(&mut self, n: OptNumber) -> Option<OptValues> {
    self.opts.remove(&n)
  }

  /// Update the [Uri-Host](opt::known::no_repeat::HOST) option
  pub fn set_host<S: AsRef<str>>(&mut self, host: S) -> Result<(), SetOptionError> {
    self.set(opt::known::no_repeat::HOST, host.as_ref().into());
    Ok(())
  }

  /// Get the value for [Uri-Host](opt::known::no_repeat::HOST)
  pub fn host(&self) -> Result<Option<&str>, Utf8Error> {
    self.get_str(opt::known::no_repeat::HOST)
  }

  /// Update the [Uri-Port](opt::known::no_repeat::PORT) option
  pub fn set_port(&mut self, port: u16) -> Result<(), SetOptionError> {
    self.set(opt::known::no_repeat::PORT, port.to_be_bytes().into_iter().collect());
    Ok(())
  }

  /// Get the value for [Uri-Port](opt::known::no_repeat::PORT)
  pub fn port(&self) -> Option<u16> {
    self.get_uint(opt::known::no_repeat::PORT).map(|n| n as u16)
  }

  /// Set the [Uri-Path](opt::known::repeat::PATH) and
  /// [Uri-Query](opt::known::repeat::QUERY), splitting `path` on the first
  /// `?` into a path part and a query part: the path part is split on `/`
  /// into one Uri-Path per non-empty segment, and the query part (if any)
  /// is split on `&` into one Uri-Query per non-empty segment.
  pub fn set_path<S: AsRef<str>>(&mut self, path: S) -> Result<(), SetOptionError> {
    self.remove(opt::known::repeat::PATH);
    self.remove(opt::known::repeat::QUERY);

    let (path_part, query_part) = match path.as_ref().split_once('?') {
      | Some((p, q)) => (p, Some(q)),
      | None => (path.as_ref(), None),
    };

    path_part.split('/')
              .filter(|s| !s.is_empty())
              .try_for_each(|segment| self.add(opt::known::repeat::PATH, segment.into()))?;

    if let Some(query_part) = query_part {
      query_part.split('&')
                .filter(|s| !s.is_empty())
                .try_for_each(|segment| self.add_query(segment))?;
    }

    Ok(())
  }

  /// Get the [Uri-Path](opt::known::repeat::PATH) segments
  pub fn path(&self) -> Result<Vec<&str>, Utf8Error> {
    self.get_strs(opt::known::repeat::PATH)
  }

  /// Get the fully built path, joining segments with '/'
  pub fn path_string(&self) -> Result<String, Utf8Error> {
    Ok(self.path()?.join("/"))
  }

  /// Add a [Uri-Query](opt::known::repeat::QUERY) parameter
  pub fn add_query<S: AsRef<str>>(&mut self, query: S) -> Result<(), SetOptionError> {
    self.add(opt::known::repeat::QUERY, query.as_ref().into())
  }

  /// Get all [Uri-Query](opt::known::repeat::QUERY) parameters
  pub fn query(&self) -> Result<Vec<&str>, Utf8Error> {
    self.get_strs(opt::known::repeat::QUERY)
  }

  /// Set [Content-Format](opt::known::no_repeat::CONTENT_FORMAT)
  pub fn set_content_format(&mut self, format: ContentFormat) -> Result<(), SetOptionError> {
    self.set(opt::known::no_repeat::CONTENT_FORMAT, format.into_iter().collect());
    Ok(())
  }

  /// Get [Content-Format](opt::known::no_repeat::CONTENT_FORMAT)
  pub fn content_format(&self) -> Option<ContentFormat> {
    self.get_uint(opt::known::no_repeat::CONTENT_FORMAT).map(|n| ContentFormat::from(n as u16))
  }

  /// Set the [Observe](opt::known::no_repeat::OBSERVE) option to a 24-bit sequence number,
  /// as carried on a notification (response)
  pub fn set_observe(&mut self, seq: u32) -> Result<(), SetOptionError> {
    let bytes: Vec<u8> = seq.to_be_bytes().into_iter().skip_while(|&b| b == 0).collect();
    self.set(opt::known::no_repeat::OBSERVE, bytes.into_iter().collect());
    Ok(())
  }

  /// Get the raw [Observe](opt::known::no_repeat::OBSERVE) sequence number, as
  /// carried on a notification (response)
  pub fn observe(&self) -> Option<u32> {
    self.get_uint(opt::known::no_repeat::OBSERVE).map(|n| n as u32)
  }

  /// Set the [Observe](opt::known::no_repeat::OBSERVE) option to a register/deregister
  /// action, as carried on a GET request
  pub fn set_observe_action(&mut self, action: observe::Action) -> Result<(), SetOptionError> {
    self.set(opt::known::no_repeat::OBSERVE, OptValue(vec![action.into()]));
    Ok(())
  }

  /// Get the request-side register/deregister [Observe](opt::known::no_repeat::OBSERVE)
  /// action, if the option value is one of the two valid single-byte actions
  pub fn observe_action(&self) -> Option<observe::Action> {
    self.get_first(opt::known::no_repeat::OBSERVE)
        .filter(|v| v.0.len() == 1)
        .and_then(|v| observe::Action::from_byte(v.0[0]))
  }

  /// Update [Accept](opt::known::no_repeat::ACCEPT)
  pub fn set_accept(&mut self, format: ContentFormat) -> Result<(), SetOptionError> {
    self.set(opt::known::no_repeat::ACCEPT, format.into_iter().collect());
    Ok(())
  }

  /// Get [Accept](opt::known::no_repeat::ACCEPT)
  pub fn accept(&self) -> Option<ContentFormat> {
    self.get_uint(opt::known::no_repeat::ACCEPT).map(|n| ContentFormat::from(n as u16))
  }

  /// [`opt::known::no_repeat::BLOCK1`]
  pub fn block1(&self) -> Option<block::Block> {
    self.get_uint(opt::known::no_repeat::BLOCK1).map(|n| block::Block::from(n as u32))
  }

  /// [`opt::known::no_repeat::BLOCK1`]
  pub fn set_block1(&mut self, size: u16, num: u32, more: bool) -> Result<(), SetOptionError> {
    let block = block::Block::new(size, num, more);
    let bytes: Vec<u8> =
      u32::from(block).to_be_bytes().into_iter().skip_while(|&b| b == 0).collect();
    self.set(opt::known::no_repeat::BLOCK1, bytes.into_iter().collect());
    Ok(())
  }

  /// [`opt::known::no_repeat::BLOCK2`]
  pub fn block2(&self) -> Option<block::Block> {
    self.get_uint(opt::known::no_repeat::BLOCK2).map(|n| block::Block::from(n as u32))
  }

  /// [`opt::known::no_repeat::BLOCK2`]
  pub fn set_block2(&mut self, size: u16, num: u32, more: bool) -> Result<(), SetOptionError> {
    let block = block::Block::new(size, num, more);
    let bytes: Vec<u8> =
      u32::from(block).to_be_bytes().into_iter().skip_while(|&b| b == 0).collect();
    self.set(opt::known::no_repeat::BLOCK2, bytes.into_iter().collect());
    Ok(())
  }

  /// [`opt::known::no_repeat::QBLOCK1`]
  pub fn qblock1(&self) -> Option<block::Block> {
    self.get_uint(opt::known::no_repeat::QBLOCK1).map(|n| block::Block::from(n as u32))
  }

  /// [`opt::known::no_repeat::QBLOCK1`]
  pub fn set_qblock1(&mut self, size: u16, num: u32, more: bool) -> Result<(), SetOptionError> {
    let block = block::Block::new(size, num, more);
    let bytes: Vec<u8> =
      u32::from(block).to_be_bytes().into_iter().skip_while(|&b| b == 0).collect();
    self.set(opt::known::no_repeat::QBLOCK1, bytes.into_iter().collect());
    Ok(())
  }

  /// [`opt::known::no_repeat::QBLOCK2`]
  pub fn qblock2(&self) -> Option<block::Block> {
    self.get_uint(opt::known::no_repeat::QBLOCK2).map(|n| block::Block::from(n as u32))
  }

  /// [`opt::known::no_repeat::QBLOCK2`]
  pub fn set_qblock2(&mut self, size: u16, num: u32, more: bool) -> Result<(), SetOptionError> {
    let block = block::Block::new(size, num, more);
    let bytes: Vec<u8> =
      u32::from(block).to_be_bytes().into_iter().skip_while(|&b| b == 0).collect();
    self.set(opt::known::no_repeat::QBLOCK2, bytes.into_iter().collect());
    Ok(())
  }

  /// Set the Echo option (RFC9175 §2) to an opaque challenge value
  pub fn set_echo(&mut self, value: &[u8]) -> Result<(), SetOptionError> {
    self.set(opt::known::no_repeat::ECHO, OptValue(value.to_vec()));
    Ok(())
  }

  /// Get the Echo option value, if present
  pub fn echo(&self) -> Option<&[u8]> {
    self.get_first(opt::known::no_repeat::ECHO).map(|v| v.as_bytes())
  }

  /// Set Hop-Limit (RFC8768 §4). Refuses `0`.
  pub fn set_hop_limit(&mut self, hops: u8) -> Result<(), SetOptionError> {
    debug_assert_ne!(hops, 0, "Hop-Limit of 0 is invalid");
    self.set(opt::known::no_repeat::HOP_LIMIT, vec![hops].into_iter().collect());
    Ok(())
  }

  /// Get Hop-Limit (RFC8768 §4)
  pub fn hop_limit(&self) -> Option<u8> {
    self.get_uint(opt::known::no_repeat::HOP_LIMIT).map(|n| n as u8)
  }

  /// Set No-Response (RFC7967)
  pub fn set_no_response(&mut self, mask: u8) -> Result<(), SetOptionError> {
    self.set(opt::known::no_repeat::NO_RESPONSE, vec![mask].into_iter().collect());
    Ok(())
  }

  /// Get the raw No-Response bitmask (RFC7967), if present
  pub fn no_response(&self) -> Option<u8> {
    self.get_uint(opt::known::no_repeat::NO_RESPONSE).map(|n| n as u8)
  }

  /// Set the OSCORE option (RFC8613 §6.1)
  pub fn set_oscore(&mut self, value: &OscoreOption) -> Result<(), SetOptionError> {
    self.set(opt::known::no_repeat::OSCORE, OptValue(value.to_bytes()));
    Ok(())
  }

  /// Get and decode the OSCORE option, if present. Returns `Ok(None)` if absent,
  /// `Err` if present more than once or malformed.
  pub fn oscore(&self) -> Result<Option<OscoreOption>, OscoreOptionError> {
    match self.get(opt::known::no_repeat::OSCORE) {
      | None => Ok(None),
      | Some(vs) if vs.len() > 1 => {
        // caller should treat this as BadMessage; represented as a parse failure here
        Err(OscoreOptionError::Truncated)
      },
      | Some(vs) => OscoreOption::parse(&vs[0].0).map(Some),
    }
  }

  /// Set Request-Tag (RFC9175 §3), shares generator state with [`Token::opaque`] callers
  pub fn set_request_tag(&mut self, tag: &[u8]) -> Result<(), SetOptionError> {
    self.set(opt::known::no_repeat::REQUEST_TAG, OptValue(tag.to_vec()));
    Ok(())
  }

  /// Get Request-Tag (RFC9175 §3)
  pub fn request_tag(&self) -> Option<&[u8]> {
    self.get_first(opt::known::no_repeat::REQUEST_TAG).map(|v| v.as_bytes())
  }

  /// Update [Size1](opt::known::no_repeat::SIZE1)
  pub fn set_size1(&mut self, size_bytes: u32) -> Result<(), SetOptionError> {
    let bytes: Vec<u8> = size_bytes.to_be_bytes().into_iter().skip_while(|&b| b == 0).collect();
    self.set(opt::known::no_repeat::SIZE1, bytes.into_iter().collect());
    Ok(())
  }

  /// Get [Size1](opt::known::no_repeat::SIZE1)
  pub fn size1(&self) -> Option<u32> {
    self.get_uint(opt::known::no_repeat::SIZE1).map(|n| n as u32)
  }

  /// Update [Size2](opt::known::no_repeat::SIZE2)
  pub fn set_size2(&mut self, size_bytes: u32) -> Result<(), SetOptionError> {
    let bytes: Vec<u8> = size_bytes.to_be_bytes().into_iter().skip_while(|&b| b == 0).collect();
    self.set(opt::known::no_repeat::SIZE2, bytes.into_iter().collect());
    Ok(())
  }

  /// Get [Size2](opt::known::no_repeat::SIZE2)
  pub fn size2(&self) -> Option<u32> {
    self.get_uint(opt::known::no_repeat::SIZE2).map(|n| n as u32)
  }

  /// Discard all [If-Match](opt::known::repeat::IF_MATCH) values and replace
  /// them with a single empty value, signaling "only if the resource exists"
  pub fn set_if_exists(&mut self) -> Result<(), SetOptionError> {
    self.set(opt::known::repeat::IF_MATCH, OptValue::default());
    Ok(())
  }

  /// Whether [`Message::set_if_exists`] applies to this message
  pub fn if_exists_flag_enabled(&self) -> bool {
    self.get(opt::known::repeat::IF_MATCH)
        .map(|vs| vs.iter().any(|v| v.0.is_empty()))
        .unwrap_or(false)
  }

  /// Enable the [If-None-Match](opt::known::no_repeat::IF_NONE_MATCH) flag,
  /// signaling "only if the resource does not exist"
  pub fn set_if_not_exists(&mut self) -> Result<(), SetOptionError> {
    self.set(opt::known::no_repeat::IF_NONE_MATCH, OptValue::default());
    Ok(())
  }

  /// Whether [`Message::set_if_not_exists`] applies to this message
  pub fn if_not_exists_flag_enabled(&self) -> bool {
    self.get_first(opt::known::no_repeat::IF_NONE_MATCH).is_some()
  }

  /// Add an [If-Match](opt::known::repeat::IF_MATCH) ETag
  pub fn add_if_match<B: AsRef<[u8]>>(&mut self, tag: B) -> Result<(), SetOptionError> {
    self.add(opt::known::repeat::IF_MATCH, OptValue(tag.as_ref().to_vec()))
  }

  /// Get all [If-Match](opt::known::repeat::IF_MATCH) ETags
  pub fn if_match(&self) -> Option<&OptValues> {
    self.get(opt::known::repeat::IF_MATCH)
  }

  /// Add an [ETag](opt::known::repeat::ETAG)
  pub fn add_etag<B: AsRef<[u8]>>(&mut self, tag: B) -> Result<(), SetOptionError> {
    self.add(opt::known::repeat::ETAG, OptValue(tag.as_ref().to_vec()))
  }

  /// Get all [ETag](opt::known::repeat::ETAG) values
  pub fn etags(&self) -> Option<&OptValues> {
    self.get(opt::known::repeat::ETAG)
  }

  /// Add a [Location-Path](opt::known::repeat::LOCATION_PATH) segment
  pub fn add_location_path<S: AsRef<str>>(&mut self, path: S) -> Result<(), SetOptionError> {
    self.add(opt::known::repeat::LOCATION_PATH, path.as_ref().into())
  }

  /// Get all [Location-Path](opt::known::repeat::LOCATION_PATH) segments
  pub fn location_path(&self) -> Result<Vec<&str>, Utf8Error> {
    self.get_strs(opt::known::repeat::LOCATION_PATH)
  }
}

impl TryFromBytes<&[u8]> for Message {
  type Error = MessageParseError;

  fn try_from_bytes(bytes: &[u8]) -> Result<Self, Self::Error> {
    let mut bytes = Cursor::new(bytes);

    let Byte1 { tkl, ty, ver } = bytes.next()
                                      .ok_or_else(MessageParseError::eof)?
                                      .try_into()?;

    if tkl > 8 {
      return Err(Self::Error::InvalidTokenLength(tkl));
    }

    let code: Code = bytes.next().ok_or_else(MessageParseError::eof)?.into();
    let id: Id = Id::try_consume_bytes(&mut bytes)?;

    let token_bytes = bytes.take_exact(tkl as usize)
                           .ok_or_else(MessageParseError::eof)?;
    let token = Token::from_bytes(token_bytes);

    let opts = opt::parse_options(&mut bytes).map_err(Self::Error::OptParseError)?;

    let payload = Payload(bytes.take_until_end().to_vec());

    Ok(Message { id,
                 ty,
                 ver,
                 code,
                 token,
                 opts,
                 payload })
  }
}

impl TryFromBytes<&Vec<u8>> for Message {
  type Error = MessageParseError;

  fn try_from_bytes(bytes: &Vec<u8>) -> Result<Self, Self::Error> {
    Self::try_from_bytes(bytes.as_slice())
  }
}
