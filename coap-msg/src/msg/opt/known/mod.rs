/// Content-Format values
pub mod content_format;
pub use content_format::*;

/// Observe
pub mod observe;
pub use observe::*;

/// Block / Q-Block
pub mod block;
pub use block::*;

/// OSCORE option value (RFC8613 §6.1)
pub mod oscore;
pub use oscore::*;

/// Q-Block missing-blocks payload (RFC9177 §3.2)
pub mod qblock;
pub use qblock::*;

macro_rules! opt {
  (rfc7252($section:literal) $name:ident = $n:literal) => {
    #[doc = ::toad_macros::rfc_7252_doc!($section)]
    #[allow(clippy::zero_prefixed_literal)]
    pub const $name: crate::OptNumber = crate::OptNumber($n);
  };
  (#[doc = $doc:expr] $name:ident = $n:literal) => {
    #[doc = $doc]
    #[allow(clippy::zero_prefixed_literal)]
    pub const $name: crate::OptNumber = crate::OptNumber($n);
  };
}

pub(crate) use opt;

/// Non-repeatable options
pub mod no_repeat {
  use super::opt;

  opt!(rfc7252("5.10.1") HOST = 3);
  opt!(rfc7252("5.10.8.2") IF_NONE_MATCH = 5);
  opt!(#[doc = "<https://www.rfc-editor.org/rfc/rfc7641#section-2>"]
       OBSERVE = 6);
  opt!(#[doc = "See [`HOST`]"]
       PORT = 7);
  opt!(#[doc = "<https://www.rfc-editor.org/rfc/rfc8613#section-2>"]
       OSCORE = 9);
  opt!(rfc7252("5.10.3") CONTENT_FORMAT = 12);
  opt!(rfc7252("5.10.5") MAX_AGE = 14);
  opt!(#[doc = "<https://www.rfc-editor.org/rfc/rfc8768#section-4>"]
       HOP_LIMIT = 16);
  opt!(rfc7252("5.10.4") ACCEPT = 17);
  opt!(#[doc = "<https://www.rfc-editor.org/rfc/rfc9177#section-3.2>"]
       QBLOCK1 = 19);
  opt!(#[doc = "RFC7959 Block2"]
       BLOCK2 = 23);
  opt!(#[doc = "RFC7959 Block1"]
       BLOCK1 = 27);
  opt!(rfc7252("5.10.9") SIZE2 = 28);
  opt!(#[doc = "<https://www.rfc-editor.org/rfc/rfc9177#section-3.2>"]
       QBLOCK2 = 31);
  opt!(rfc7252("5.10.2") PROXY_URI = 35);
  opt!(#[doc = "See [`PROXY_URI`]"]
       PROXY_SCHEME = 39);
  opt!(rfc7252("5.10.9") SIZE1 = 60);
  opt!(#[doc = "<https://www.rfc-editor.org/rfc/rfc9175#section-2>"]
       ECHO = 252);
  opt!(#[doc = "<https://www.rfc-editor.org/rfc/rfc7967#section-2>"]
       NO_RESPONSE = 258);
  opt!(#[doc = "<https://www.rfc-editor.org/rfc/rfc9175#section-3>"]
       REQUEST_TAG = 292);
}

/// Repeatable options
pub mod repeat {
  use super::opt;

  opt!(rfc7252("5.10.8.1") IF_MATCH = 1);
  opt!(#[doc = concat!(
                toad_macros::rfc_7252_doc!("5.10.6"),
                "\n<details><summary>ETag as a Request Option</summary>\n\n",
                toad_macros::rfc_7252_doc!("5.10.6.2"),
                "\n</details><details><summary>ETag as a Response Option</summary>\n\n",
                toad_macros::rfc_7252_doc!("5.10.6.1"),
                "</details>"
      )]
       ETAG = 4);
  opt!(rfc7252("5.10.7") LOCATION_PATH = 8);
  opt!(#[doc = "See [`super::no_repeat::HOST`]"]
       PATH = 11);
  opt!(#[doc = "See [`super::no_repeat::HOST`]"]
       QUERY = 15);
  opt!(#[doc = "See [`LOCATION_PATH`]"]
       LOCATION_QUERY = 20);
}

/// Value kind an option carries, per the catalog. Drives how `Message::get_*` interprets bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptKind {
  /// Big-endian unsigned integer, shortest encoding (leading zero bytes stripped)
  UInt,
  /// UTF-8 string
  String,
  /// Uninterpreted bytes
  Opaque,
}

/// A catalog entry: everything the codec needs to validate an option instance
/// without knowing what it means.
#[derive(Debug, Clone, Copy)]
pub struct OptionSpec {
  /// Option number
  pub number: crate::OptNumber,
  /// Human name, for diagnostics
  pub name: &'static str,
  /// Whether this option may appear more than once in a message
  pub repeatable: bool,
  /// Minimum value length in bytes
  pub min_len: usize,
  /// Maximum value length in bytes, if bounded
  pub max_len: Option<usize>,
  /// Value interpretation
  pub kind: OptKind,
}

/// Static lookup table of option numbers this core understands.
///
/// Options absent from this table are passed through uninterpreted; their
/// criticality is still derived from [`crate::OptNumber::must_be_processed`]
/// (it doesn't require catalog knowledge, just parity).
pub mod catalog {
  use super::{no_repeat::*, repeat::*, OptKind::*, OptionSpec};

  macro_rules! spec {
    ($num:expr, $name:literal, repeat, $min:literal..$max:expr, $kind:expr) => {
      OptionSpec { number: $num, name: $name, repeatable: true, min_len: $min, max_len: $max, kind: $kind }
    };
    ($num:expr, $name:literal, once, $min:literal..$max:expr, $kind:expr) => {
      OptionSpec { number: $num, name: $name, repeatable: false, min_len: $min, max_len: $max, kind: $kind }
    };
  }

  /// All known options, indexed by [`crate::OptNumber`]
  pub static SPECS: &[OptionSpec] = &[spec!(IF_MATCH, "If-Match", repeat, 0..Some(8), Opaque),
                                      spec!(HOST, "Uri-Host", once, 1..Some(255), String),
                                      spec!(ETAG, "ETag", repeat, 1..Some(8), Opaque),
                                      spec!(IF_NONE_MATCH, "If-None-Match", once, 0..Some(0), Opaque),
                                      spec!(OBSERVE, "Observe", once, 0..Some(3), UInt),
                                      spec!(PORT, "Uri-Port", once, 0..Some(2), UInt),
                                      spec!(LOCATION_PATH, "Location-Path", repeat, 0..Some(255), String),
                                      spec!(OSCORE, "OSCORE", once, 0..Some(255), Opaque),
                                      spec!(PATH, "Uri-Path", repeat, 0..Some(255), String),
                                      spec!(CONTENT_FORMAT, "Content-Format", once, 0..Some(2), UInt),
                                      spec!(MAX_AGE, "Max-Age", once, 0..Some(4), UInt),
                                      spec!(QUERY, "Uri-Query", repeat, 0..Some(255), String),
                                      spec!(HOP_LIMIT, "Hop-Limit", once, 1..Some(1), UInt),
                                      spec!(ACCEPT, "Accept", once, 0..Some(2), UInt),
                                      spec!(QBLOCK1, "Q-Block1", once, 0..Some(4), UInt),
                                      spec!(LOCATION_QUERY, "Location-Query", repeat, 0..Some(255), String),
                                      spec!(BLOCK2, "Block2", once, 0..Some(3), UInt),
                                      spec!(BLOCK1, "Block1", once, 0..Some(3), UInt),
                                      spec!(SIZE2, "Size2", once, 0..Some(4), UInt),
                                      spec!(QBLOCK2, "Q-Block2", once, 0..Some(4), UInt),
                                      spec!(PROXY_URI, "Proxy-Uri", once, 1..Some(1034), String),
                                      spec!(PROXY_SCHEME, "Proxy-Scheme", once, 1..Some(255), String),
                                      spec!(SIZE1, "Size1", once, 0..Some(4), UInt),
                                      spec!(ECHO, "Echo", once, 1..Some(40), Opaque),
                                      spec!(NO_RESPONSE, "No-Response", once, 0..Some(1), UInt),
                                      spec!(REQUEST_TAG, "Request-Tag", once, 0..Some(8), Opaque),];

  /// Look up the catalog entry for an option number, if known
  pub fn lookup(n: crate::OptNumber) -> Option<&'static OptionSpec> {
    SPECS.iter().find(|s| s.number == n)
  }
}
