use embedded_time::duration::Milliseconds;

use crate::retry::{Attempts, TransmissionParams};
use crate::time::Millis;

/// Bytes / Second
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BytesPerSecond(pub u16);

/// Configuration options related to parsing & handling outbound CON requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Con {
  /// RFC 7252 §4.2 retransmission parameters for CON requests.
  ///
  /// ```
  /// use coap_core::config::Con;
  ///
  /// assert_eq!(Con::default().transmission.ack_timeout_millis, 2_000);
  /// assert_eq!(Con::default().transmission.ack_random_percent, 150);
  /// assert_eq!(Con::default().transmission.coap_backoff_percent, 200);
  /// ```
  pub transmission: TransmissionParams,
}

/// Configuration options related to parsing & handling outbound NON requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Non {
  /// Number of times we are allowed to resend a NON request
  /// before erroring.
  ///
  /// ```
  /// use coap_core::config::Non;
  /// use coap_core::retry::Attempts;
  ///
  /// assert_eq!(Non::default().max_attempts, Attempts(4));
  /// ```
  pub max_attempts: Attempts,
}

/// Configuration options related to parsing & handling messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Msg {
  /// Seed used to generate message [`Token`](coap_msg::Token)s and
  /// Request-Tag values, customizable to allow for your application to
  /// generate tokens less guessably.
  ///
  /// ```
  /// use coap_core::config::Msg;
  ///
  /// assert_eq!(Msg::default().token_seed, 0);
  /// ```
  pub token_seed: u16,

  /// Maximum length, in bytes, of a generated or accepted token. RFC 7252
  /// bounds this at 8.
  ///
  /// ```
  /// use coap_core::config::Msg;
  ///
  /// assert_eq!(Msg::default().token_max_len, 8);
  /// ```
  pub token_max_len: u8,

  /// Set the transmission rate that we should do our best
  /// not to exceed when waiting for responses.
  ///
  /// ```
  /// use coap_core::config::{BytesPerSecond, Msg};
  ///
  /// assert_eq!(Msg::default().probing_rate, BytesPerSecond(1000));
  /// ```
  pub probing_rate: BytesPerSecond,

  /// See [`Con`]
  pub con: Con,

  /// See [`Non`]
  pub non: Non,

  /// Maximum amount of time to delay a response to a multicast request.
  /// The actual delay is random between zero and this value.
  ///
  /// ```
  /// use embedded_time::duration::Milliseconds;
  /// use coap_core::config::Msg;
  ///
  /// assert_eq!(Msg::default().multicast_response_leisure,
  ///            Milliseconds(5000u64));
  /// ```
  pub multicast_response_leisure: Millis,
}

/// Block engine configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Block {
  /// Default block size exponent (SZX) used when a transfer's size is not
  /// otherwise negotiated. `0..=6`, `16 << szx` octets.
  pub default_szx: u8,
  /// Maximum cumulative size of a reassembled Block1/Block2 transfer before
  /// the exchange is aborted with `NoMemory`.
  pub max_unfragmented_size: u32,
}

impl Default for Block {
  fn default() -> Self {
    Self { default_szx: 6,
           max_unfragmented_size: 65536 }
  }
}

/// RFC 9175 Echo freshness-challenge cache configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Echo {
  /// Maximum number of distinct peers tracked at once. LRU eviction when full.
  pub cache_size: usize,
  /// Maximum length, in bytes, of a generated Echo challenge value.
  pub max_len: usize,
  /// How long a successful Echo verification remains valid.
  pub lifetime_millis: u64,
}

impl Default for Echo {
  fn default() -> Self {
    Self { cache_size: 32,
           max_len: 40,
           lifetime_millis: 60_000 }
  }
}

/// RFC 8613 OSCORE exchange-tracking configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Oscore {
  /// Maximum number of outstanding request-side exchange entries tracked at
  /// once (peer, token, `is_observe`, timestamp). LRU eviction when full.
  pub exchange_cache_size: usize,
  /// How long an exchange entry remains eligible to protect a response,
  /// default ≈247s per RFC 8613 §7.4.
  pub exchange_lifetime_millis: u64,
  /// Maximum cumulative plaintext size accepted for a single OSCORE-protected
  /// exchange, clamped to `[1024, 65536]`.
  pub max_unfragmented_size: u32,
}

impl Default for Oscore {
  fn default() -> Self {
    Self { exchange_cache_size: 32,
           exchange_lifetime_millis: 247_000,
           max_unfragmented_size: 1024 }
  }
}

impl Default for Con {
  fn default() -> Self {
    Con { transmission: TransmissionParams::default() }
  }
}

impl Default for Non {
  fn default() -> Self {
    Non { max_attempts: Attempts(4) }
  }
}

impl Default for Msg {
  fn default() -> Self {
    Msg { token_seed: 0,
          token_max_len: 8,
          probing_rate: BytesPerSecond(1000),
          con: Con::default(),
          non: Non::default(),
          multicast_response_leisure: Milliseconds(5000) }
  }
}

/// Runtime config
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Config {
  /// See [`Msg`]
  pub msg: Msg,
  /// See [`Block`]
  pub block: Block,
  /// See [`Echo`]
  pub echo: Echo,
  /// See [`Oscore`]
  pub oscore: Oscore,
  /// Size of the per-message send/receive buffer.
  ///
  /// ```
  /// use coap_core::config::Config;
  ///
  /// assert_eq!(Config::default().target_buf, 1152);
  /// ```
  pub target_buf: usize,
  /// Maximum number of requests that can be in flight at a given moment.
  ///
  /// ```
  /// use coap_core::config::Config;
  ///
  /// assert_eq!(Config::default().max_concurrent_requests, 1);
  /// ```
  pub max_concurrent_requests: u8,
}

impl Default for Config {
  fn default() -> Self {
    Config { msg: Msg::default(),
             block: Block::default(),
             echo: Echo::default(),
             oscore: Oscore::default(),
             target_buf: 1152,
             max_concurrent_requests: 1 }
  }
}

impl Config {
  pub(crate) fn max_transmit_span_millis(&self) -> u64 {
    let t = self.msg.con.transmission;
    let max_ack_timeout = t.ack_timeout_millis * t.ack_random_percent as u64 / 100;

    // Sum of timeouts across all retransmissions, worst case (max jitter,
    // full backoff compounding every attempt).
    let mut span = 0u64;
    let mut timeout = max_ack_timeout;
    for _ in 0..t.max_retransmission {
      timeout = timeout * t.coap_backoff_percent as u64 / 100;
      span += timeout;
    }

    span
  }

  pub(crate) fn max_transmit_wait_millis(&self) -> u64 {
    self.max_transmit_span_millis() + self.msg.con.transmission.ack_timeout_millis
  }

  pub(crate) fn max_latency_millis(&self) -> u64 {
    100_000
  }

  pub(crate) fn expected_processing_delay_millis(&self) -> u64 {
    200
  }

  pub(crate) fn exchange_lifetime_millis(&self) -> u64 {
    self.max_transmit_span_millis()
    + (2 * self.max_latency_millis())
    + self.expected_processing_delay_millis()
  }
}
