use std::collections::BTreeMap;
use std::ops::{Add, Sub};

use toad_macros::rfc_7252_doc;

use crate::from_bytes::{Cursor, TryConsumeBytes};

/// Option parsing error
pub mod parse_error;
pub use parse_error::*;

/// Well-known options & the option catalog
pub mod known;
pub use known::*;

use self::known::no_repeat::{BLOCK1, BLOCK2};

/// One or more values for a repeatable option; exactly one for a non-repeatable one.
pub type OptValues = Vec<OptValue>;

/// `Opt` parsed off the wire, before its delta has been resolved into an absolute
/// [`OptNumber`] against the previous option's number.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Opt {
  /// See [`OptDelta`]
  pub delta: OptDelta,
  /// See [`OptValue`]
  pub value: OptValue,
}

impl Opt {
  /// Append this option's wire bytes (header + extended delta/length + value) to `bytes`.
  pub fn extend_bytes(&self, bytes: &mut Vec<u8>) {
    let (del, del_bytes) = crate::to_bytes::opt_len_or_delta(self.delta.0);
    let (len, len_bytes) = crate::to_bytes::opt_len_or_delta(self.value.0.len() as u16);
    let header = (del << 4) | len;

    bytes.push(header);

    if let Some(bs) = del_bytes {
      bytes.extend(bs);
    }
    if let Some(bs) = len_bytes {
      bytes.extend(bs);
    }

    bytes.extend(self.value.0.iter().copied());
  }
}

impl TryConsumeBytes for Opt {
  type Error = OptParseError;

  fn try_consume_bytes(bytes: &mut Cursor<'_>) -> Result<Self, Self::Error> {
    let byte1 = bytes.next()
                     .ok_or(OptParseError::OptionsExhausted)
                     .and_then(|b| {
                       if b == 0b11111111 {
                         Err(OptParseError::OptionsExhausted)
                       } else {
                         Ok(b)
                       }
                     })?;

    // delta MUST be consumed before length; both extensions share the same nibble layout
    let delta = parse_opt_len_or_delta(byte1 >> 4,
                                       bytes,
                                       OptParseError::OptionDeltaReservedValue(15))?;
    let delta = OptDelta(delta);

    let len = parse_opt_len_or_delta(byte1 & 0b0000_1111,
                                     bytes,
                                     OptParseError::ValueLengthReservedValue(15))? as usize;

    let value = bytes.take_exact(len)
                     .ok_or(OptParseError::UnexpectedEndOfStream)?;
    let value = OptValue(value.to_vec());

    Ok(Opt { delta, value })
  }
}

pub(crate) fn parse_opt_len_or_delta(head: u8,
                                     bytes: &mut Cursor<'_>,
                                     reserved_err: OptParseError)
                                     -> Result<u16, OptParseError> {
  match head {
    | 13 => {
      let n = bytes.next().ok_or_else(OptParseError::eof)?;
      Ok((n as u16) + 13)
    },
    | 14 => match bytes.take_exact(2) {
      | Some(&[a, b]) => Ok(u16::from_be_bytes([a, b]) + 269),
      | _ => Err(OptParseError::eof()),
    },
    | 15 => Err(reserved_err),
    | _ => Ok(head as u16),
  }
}

/// Parse the option section of a message: everything between the token and either
/// the payload marker (0xFF) or end of message. Validates against the [`known::catalog`]
/// as each option is resolved (length bounds, repeatability).
pub fn parse_options(bytes: &mut Cursor<'_>) -> Result<BTreeMap<OptNumber, OptValues>, OptParseError> {
  let mut map: BTreeMap<OptNumber, OptValues> = BTreeMap::new();
  let mut last_seen = OptNumber(0);

  loop {
    match Opt::try_consume_bytes(bytes) {
      | Ok(opt) => {
        let num = last_seen + OptNumber(opt.delta.0 as u32);
        last_seen = num;

        if let Some(spec) = known::catalog::lookup(num) {
          let len = opt.value.0.len();
          if len < spec.min_len || spec.max_len.map(|max| len > max).unwrap_or(false) {
            return Err(OptParseError::OptionValueTooLong { capacity: spec.max_len.unwrap_or(usize::MAX),
                                                            actual: len });
          }
        }

        let entry = map.entry(num).or_default();
        if !entry.is_empty() && known::catalog::lookup(num).map(|s| !s.repeatable).unwrap_or(false) {
          return Err(OptParseError::TooManyOptions(entry.len() + 1));
        }
        entry.push(opt.value);
      },
      | Err(OptParseError::OptionsExhausted) => break Ok(map),
      | Err(e) => break Err(e),
    }
  }
}

/// Serialize an option map back to its wire delta-encoded form, in ascending option number
/// order (guaranteed by `BTreeMap`'s iteration order).
pub fn write_options(opts: &BTreeMap<OptNumber, OptValues>, bytes: &mut Vec<u8>) {
  let mut last_seen = OptNumber(0);
  for (&num, values) in opts.iter() {
    for value in values {
      let delta = OptDelta((num - last_seen).0 as u16);
      last_seen = num;
      Opt { delta, value: value.clone() }.extend_bytes(bytes);
    }
  }
}

/// The "Option Delta" is the difference between this Option's Number
/// and the previous Option's number.
///
/// This is just used to compute the Option Number, identifying which
/// Option is being set (e.g. Content-Format has a Number of 12)
///
/// # Related
/// - [RFC7252#section-3.1 Option Format](https://datatracker.ietf.org/doc/html/rfc7252#section-3.1)
#[derive(Copy, Clone, Hash, PartialEq, PartialOrd, Eq, Ord, Debug, Default)]
pub struct OptDelta(pub u16);

#[doc = rfc_7252_doc!("5.4.6")]
/// <details><summary><b>RFC7252 Section 12.2 Core CoAP Option Numbers</b></summary>
#[doc = concat!("\n#", rfc_7252_doc!("12.2"))]
/// </details>
#[derive(Copy, Clone, Hash, PartialEq, PartialOrd, Eq, Ord, Debug, Default)]
pub struct OptNumber(pub u32);

impl Add for OptNumber {
  type Output = OptNumber;

  fn add(self, rhs: Self) -> Self::Output {
    Self(self.0 + rhs.0)
  }
}

impl Sub for OptNumber {
  type Output = OptNumber;

  fn sub(self, rhs: Self) -> Self::Output {
    Self(self.0 - rhs.0)
  }
}

#[doc = rfc_7252_doc!("5.4.1")]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum OptionMustBeProcessed {
  /// This option must be processed, and a response that ignores it will be rejected.
  /// Corresponds to the option being "critical" in strict CoAP terms.
  Yes,
  /// This option does not _need_ to be processed, and a response that ignores it
  /// will be processed anyway. Corresponds to the option being "elective".
  No,
}

#[doc = rfc_7252_doc!("5.4.2")]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum WhenOptionUnsupportedByProxy {
  /// This option /must be/ processed & understood by proxies and may not be
  /// forwarded blindly to their destination ("UnSafe" to forward).
  Error,
  /// This option may not be processed & understood by proxies and may be
  /// forwarded blindly to their destination ("SafeToForward").
  Forward,
}

#[doc = rfc_7252_doc!("5.4.2")]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum WhenOptionChanges {
  /// If this option is [safe to forward](WhenOptionUnsupportedByProxy::Forward) but
  /// unknown to a proxy, it should be included in the proxy's cache key.
  ResponseChanges,
  /// If this option is [safe to forward](WhenOptionUnsupportedByProxy::Forward) but
  /// unknown to a proxy, different values for it should yield the cached response.
  ResponseDoesNotChange,
}

impl OptNumber {
  /// Whether or not this option may be ignored (critical = odd, elective = even)
  pub fn must_be_processed(&self) -> OptionMustBeProcessed {
    match self.0 & 0b1 {
      | 1 => OptionMustBeProcessed::Yes,
      | _ => OptionMustBeProcessed::No,
    }
  }

  /// Whether or not this option may be forwarded blindly by a proxy that does
  /// not support processing it
  pub fn when_unsupported_by_proxy(&self) -> WhenOptionUnsupportedByProxy {
    match (self.0 & 0b10) >> 1 {
      | 1 => WhenOptionUnsupportedByProxy::Error,
      | _ => WhenOptionUnsupportedByProxy::Forward,
    }
  }

  /// Whether or not different values for this option should yield a proxy's
  /// cached response, when it does not support processing this option
  pub fn when_option_changes(&self) -> WhenOptionChanges {
    match (self.0 & 0b11100) >> 2 {
      | 0b111 => WhenOptionChanges::ResponseDoesNotChange,
      | _ => WhenOptionChanges::ResponseChanges,
    }
  }

  /// Whether this option should be included in the message cache key (RFC7252 §5.6);
  /// Block1/Block2 are excluded even though they'd otherwise qualify.
  pub fn include_in_cache_key(&self) -> bool {
    self.when_option_changes() == WhenOptionChanges::ResponseChanges
    && self != &BLOCK1
    && self != &BLOCK2
  }
}

#[doc = rfc_7252_doc!("3.2")]
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OptValue(pub Vec<u8>);

impl OptValue {
  /// Convert a reference to an `OptValue` to a byte slice
  pub fn as_bytes(&self) -> &[u8] {
    &self.0
  }
}

impl FromIterator<u8> for OptValue {
  fn from_iter<T: IntoIterator<Item = u8>>(iter: T) -> Self {
    Self(iter.into_iter().collect())
  }
}

impl From<&str> for OptValue {
  fn from(s: &str) -> Self {
    Self(s.as_bytes().to_vec())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parse_opt() {
    let mut bytes = Cursor::new(&[0b00010001, 0b00000001]);
    let opt = Opt::try_consume_bytes(&mut bytes).unwrap();
    assert_eq!(opt,
               Opt { delta: OptDelta(1),
                     value: OptValue(vec![1]) });

    let mut bytes = Cursor::new(&[0b11010001, 0b00000001, 0b00000001]);
    let opt = Opt::try_consume_bytes(&mut bytes).unwrap();
    assert_eq!(opt,
               Opt { delta: OptDelta(14),
                     value: OptValue(vec![1]) });

    let mut bytes = Cursor::new(&[0b11100001, 0b00000000, 0b00000001, 0b00000001]);
    let opt = Opt::try_consume_bytes(&mut bytes).unwrap();
    assert_eq!(opt,
               Opt { delta: OptDelta(270),
                     value: OptValue(vec![1]) });
  }

  #[test]
  fn parse_option_map() {
    let mut bytes = Cursor::new(&[0b00000001, 0b00000001, 0b00010001, 0b00000011, 0b11111111]);
    let opts = parse_options(&mut bytes).unwrap();
    assert_eq!(opts,
               BTreeMap::from([(OptNumber(0), vec![OptValue(vec![1])]),
                               (OptNumber(1), vec![OptValue(vec![3])])]));
  }

  #[test]
  fn opt_number_qualities() {
    let if_match = OptNumber(1); // critical, safe-to-fwd, cache-key
    let uri_host = OptNumber(3); // critical, unsafe-to-fwd, cache-key
    let etag = OptNumber(4); // elective, safe-to-fwd, cache-key
    let size1 = OptNumber(60); // elective, safe-to-fwd, no-cache-key

    for num in [&if_match, &uri_host] {
      assert_eq!(num.must_be_processed(), OptionMustBeProcessed::Yes);
    }
    for num in [&etag, &size1] {
      assert_eq!(num.must_be_processed(), OptionMustBeProcessed::No);
    }
    for num in [&if_match, &etag, &size1] {
      assert_eq!(num.when_unsupported_by_proxy(), WhenOptionUnsupportedByProxy::Forward);
    }
    assert_eq!(uri_host.when_unsupported_by_proxy(), WhenOptionUnsupportedByProxy::Error);
    for num in [&if_match, &uri_host, &etag] {
      assert_eq!(num.when_option_changes(), WhenOptionChanges::ResponseChanges);
    }
    assert_eq!(size1.when_option_changes(), WhenOptionChanges::ResponseDoesNotChange);
  }
}
