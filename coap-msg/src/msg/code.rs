use core::fmt;

use toad_macros::rfc_7252_doc;

#[doc = rfc_7252_doc!("12.1")]
/// <details><summary><b>RFC7252 Section 12.1.1 Method Codes</b></summary>
#[doc = concat!("\n#", rfc_7252_doc!("12.1.1"))]
/// </details>
/// <details><summary><b>RFC7252 Section 12.1.2 Response Codes</b></summary>
#[doc = concat!("\n#", rfc_7252_doc!("12.1.2"))]
/// </details>
///
/// # Examples
/// ```
/// use coap_msg::Code;
///
/// assert_eq!(Code { class: 2, detail: 5 }.to_string(), "2.05");
/// ```
#[derive(Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct Code {
  /// The "class" of message codes identify it as a request or response, and provides the class of response status:
  ///
  /// |class|meaning|
  /// |---|---|
  /// |`0`|Message is a request|
  /// |`2`|Message is a success response|
  /// |`4`|Message is a client error response|
  /// |`5`|Message is a server error response|
  pub class: u8,

  /// 2-digit integer (range `[0, 32)`) that provides granular information about the response status.
  ///
  /// Will always be `0` for requests.
  pub detail: u8,
}

/// Whether a code is for a request, response, or empty message
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CodeKind {
  /// A request code (0.xx)
  Request,
  /// A response code ([2-5].xx)
  Response,
  /// EMPTY (0.00)
  Empty,
}

impl Code {
  /// Create a new Code
  ///
  /// ```
  /// use coap_msg::Code;
  ///
  /// let content = Code::new(2, 05);
  /// ```
  pub const fn new(class: u8, detail: u8) -> Self {
    Self { class, detail }
  }

  /// Get whether this code is for a request, response, or empty message
  ///
  /// ```
  /// use coap_msg::{Code, CodeKind};
  ///
  /// let empty: Code = Code::new(0, 0);
  /// assert_eq!(empty.kind(), CodeKind::Empty);
  ///
  /// let req = Code::new(0, 1); // GET
  /// assert_eq!(req.kind(), CodeKind::Request);
  ///
  /// let resp = Code::new(2, 5); // OK CONTENT
  /// assert_eq!(resp.kind(), CodeKind::Response);
  /// ```
  pub fn kind(&self) -> CodeKind {
    match (self.class, self.detail) {
      | (0, 0) => CodeKind::Empty,
      | (0, _) => CodeKind::Request,
      | _ => CodeKind::Response,
    }
  }

  #[doc = rfc_7252_doc!("4.1")]
  pub const EMPTY: Self = Self::new(0, 0);

  #[doc = rfc_7252_doc!("5.8.1")]
  pub const GET: Self = Self::new(0, 1);

  #[doc = rfc_7252_doc!("5.8.2")]
  pub const POST: Self = Self::new(0, 3);

  #[doc = rfc_7252_doc!("5.8.3")]
  pub const PUT: Self = Self::new(0, 2);

  #[doc = rfc_7252_doc!("5.8.4")]
  pub const DELETE: Self = Self::new(0, 4);

  /// 2.01 Created
  pub const CREATED: Self = Self::new(2, 1);
  /// 2.02 Deleted
  pub const DELETED: Self = Self::new(2, 2);
  /// 2.03 Valid
  pub const VALID: Self = Self::new(2, 3);
  /// 2.04 Changed
  pub const CHANGED: Self = Self::new(2, 4);
  /// 2.05 Content
  pub const CONTENT: Self = Self::new(2, 5);
  /// 2.31 Continue (block-wise)
  pub const CONTINUE: Self = Self::new(2, 31);
  /// 4.00 Bad Request
  pub const BAD_REQUEST: Self = Self::new(4, 0);
  /// 4.01 Unauthorized
  pub const UNAUTHORIZED: Self = Self::new(4, 1);
  /// 4.02 Bad Option
  pub const BAD_OPTION: Self = Self::new(4, 2);
  /// 4.04 Not Found
  pub const NOT_FOUND: Self = Self::new(4, 4);
  /// 4.05 Method Not Allowed
  pub const METHOD_NOT_ALLOWED: Self = Self::new(4, 5);
  /// 4.08 Request Entity Incomplete
  pub const REQUEST_ENTITY_INCOMPLETE: Self = Self::new(4, 8);
  /// 4.09 Conflict
  pub const CONFLICT: Self = Self::new(4, 9);
  /// 4.13 Request Entity Too Large
  pub const REQUEST_ENTITY_TOO_LARGE: Self = Self::new(4, 13);
  /// 4.22 Unprocessable Entity
  pub const UNPROCESSABLE_ENTITY: Self = Self::new(4, 22);
  /// 5.00 Internal Server Error
  pub const INTERNAL_SERVER_ERROR: Self = Self::new(5, 0);
  /// 5.03 Service Unavailable
  pub const SERVICE_UNAVAILABLE: Self = Self::new(5, 3);
  /// 5.08 Hop Limit Reached (RFC8768)
  pub const HOP_LIMIT_REACHED: Self = Self::new(5, 8);
}

impl fmt::Display for Code {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}.{:02}", self.class, self.detail)
  }
}

impl From<u8> for Code {
  fn from(b: u8) -> Self {
    // xxxyyyyy
    let class = b >> 5;
    let detail = b & 0b00011111;
    Code { class, detail }
  }
}

impl From<Code> for u8 {
  fn from(code: Code) -> u8 {
    let class = (code.class << 5) & 0b11100000;
    let detail = code.detail & 0b00011111;

    class | detail
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parse_code() {
    let byte = 0b01000101_u8;
    let code = Code::from(byte);
    assert_eq!(code, Code { class: 2, detail: 5 })
  }

  #[test]
  fn serialize_code() {
    let code = Code { class: 2, detail: 5 };
    let actual: u8 = code.into();
    let expected = 0b01000101_u8;
    assert_eq!(actual, expected)
  }

  #[test]
  fn display() {
    assert_eq!(Code::new(4, 4).to_string(), "4.04");
  }
}
