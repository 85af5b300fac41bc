use std::net::SocketAddr;

use coap_msg::{Id, Token};

use crate::net::Socket;

/// The context that an error occurred in
#[derive(Debug, Clone)]
pub enum When {
  /// We were polling for a message when the error occurred
  Polling,
  /// We were sending a message
  SendingMessage(Option<SocketAddr>, Id, Token),
  /// No more specific context is available
  None,
}

impl When {
  /// Construct a specific error from the context the error occurred in
  pub fn what<S: Socket>(self, what: What<S>) -> Error<S> {
    Error { when: self, what }
  }
}

/// An error encounterable from within [`crate::core::Core`]
#[derive(Debug)]
pub struct Error<S: Socket> {
  /// What happened?
  pub what: What<S>,
  /// What were we doing when it happened?
  pub when: When,
}

/// Contextless error taxonomy.
///
/// `BadInput` and `BadMessage` are both non-retryable and never themselves
/// turned into CoAP responses by the core — that translation is the service
/// layer's job.
#[derive(Debug)]
pub enum What<S: Socket> {
  /// Caller passed malformed arguments (e.g. a token longer than 8 bytes).
  BadInput,
  /// Wire bytes are malformed, or violate a message invariant (reserved
  /// token length, duplicate non-repeatable option, multiple OSCORE
  /// options, inconsistent Block2 ETags, ...).
  BadMessage(coap_msg::MessageParseError),
  /// An unknown critical option was encountered, or the TKL was outside
  /// the accepted range at the wire layer.
  NotSupported,
  /// OSCORE replay detection tripped, the `kid` is unrecognized, or an
  /// Echo challenge was required and absent/stale.
  Unauthorized,
  /// A CONfirmable message was not ACKed within the configured number of
  /// retransmissions.
  TimedOut,
  /// A bounded table (pending, reply, observer, OSCORE exchange, or Echo
  /// cache) is full.
  NoMemory,
  /// Hop-Limit was exhausted while forwarding through a proxy chain.
  Unreachable,
  /// The caller cancelled the operation.
  Cancelled,
  /// Some socket operation (e.g. connecting to host) failed.
  SockError(S::Error),
  /// Serializing a message to bytes failed.
  ToBytes(coap_msg::SetOptionError),
  /// Uri-Host in request was not a UTF-8 string.
  HostInvalidUtf8(std::str::Utf8Error),
  /// Uri-Host in request was not a valid IP address.
  HostInvalidIpAddress,
  /// The clock failed to provide timing.
  ClockError,
}

impl<S: Socket> Error<S> {
  /// Is this error a `BadMessage` wrapping a parse error?
  pub fn message_parse_error(&self) -> Option<&coap_msg::MessageParseError> {
    match self.what {
      | What::BadMessage(ref e) => Some(e),
      | _ => None,
    }
  }
}
