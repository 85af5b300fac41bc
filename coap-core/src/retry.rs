use embedded_time::duration::Milliseconds;
use embedded_time::{Clock, Instant};
use rand::{Rng, SeedableRng};

/// A non-blocking timer implementing the RFC 7252 §4.2 CON retransmission
/// algorithm:
///
/// 1. `timeout₀ = ack_timeout * uniform(1.0, ack_random_percent / 100)`
/// 2. on no ACK within `timeoutₙ`, retransmit and set
///    `timeoutₙ₊₁ = timeoutₙ * coap_backoff_percent / 100`
/// 3. stop after `max_retransmission` retries
///
/// It does not _contain_ the work to be done (e.g. `Box<fn()>`) because
/// we don't have the luxury of a memory allocator :)
///
/// ```
/// use embedded_time::clock::Clock;
/// use coap_core::retry;
///
/// # main();
/// fn main() {
///   let mut called = false;
///   let mut fails_once = || -> Result<(), ()> {
///     # if !called {
///     #   called = true;
///     #   return Err(());
///     # }
///     Ok(())
///   };
///
///   let clock = coap_core::time::SystemClock::new();
///   let now = || clock.try_now().unwrap();
///   let params = retry::TransmissionParams::default();
///   let mut retry = retry::RetryTimer::new(now(), params);
///
///   while let Err(_) = fails_once() {
///     match nb::block!(retry.what_should_i_do(now())) {
///       | Ok(retry::YouShould::Retry) => continue,
///       | Ok(retry::YouShould::Cry) => panic!("no more attempts! it failed more than once!!"),
///       | Err(_) => unreachable!(),
///     }
///   }
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RetryTimer<C: Clock<T = u64>> {
  start: Instant<C>,
  next_fire: Instant<C>,
  timeout: Milliseconds<u64>,
  params: TransmissionParams,
  attempts: Attempts,
}

/// Parameters governing a single pending CON's retransmission schedule.
///
/// Mirrors the RFC 7252 §4.8 transmission parameters; defaults match the
/// RFC's recommended values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransmissionParams {
  /// Initial timeout, in milliseconds, before the jitter multiplier is applied.
  pub ack_timeout_millis: u64,
  /// Percentage (e.g. 150 = 1.5x) defining the upper bound of the jitter
  /// multiplier applied to `ack_timeout` for the first retransmission timeout.
  pub ack_random_percent: u16,
  /// Percentage (e.g. 200 = 2x) multiplied into the timeout after every
  /// failed attempt.
  pub coap_backoff_percent: u16,
  /// Maximum number of retransmissions before giving up.
  pub max_retransmission: u16,
}

impl Default for TransmissionParams {
  fn default() -> Self {
    Self { ack_timeout_millis: 2_000,
           ack_random_percent: 150,
           coap_backoff_percent: 200,
           max_retransmission: 4 }
  }
}

/// A number of attempts
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Attempts(pub u16);

/// Result of [`RetryTimer::what_should_i_do`].
///
/// This tells you if a retry should be attempted or not.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum YouShould {
  /// Attempts have been exhausted and the work that is
  /// being retried should be considered poisoned.
  Cry,
  /// A retry should be performed
  Retry,
}

impl<C: Clock<T = u64>> RetryTimer<C> {
  /// Create a new retrier for a pending CON, seeded from `start`.
  pub fn new(start: Instant<C>, params: TransmissionParams) -> Self {
    let timeout = Self::initial_timeout(start, params);
    let next_fire = start + timeout;

    Self { start,
           next_fire,
           timeout,
           params,
           attempts: Attempts(0) }
  }

  fn initial_timeout(start: Instant<C>, params: TransmissionParams) -> Milliseconds<u64> {
    let min = params.ack_timeout_millis;
    let max = params.ack_timeout_millis * params.ack_random_percent as u64 / 100;

    if min >= max {
      return Milliseconds(min);
    }

    let seed = Milliseconds::<u64>::try_from(start.duration_since_epoch()).map(|m| m.0)
                                                                          .unwrap_or(0);
    let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(seed);
    Milliseconds(rng.gen_range(min..=max))
  }

  /// Number of retransmissions performed so far (not counting the original send).
  pub fn attempts(&self) -> Attempts {
    self.attempts
  }

  /// When the thing we keep trying fails, invoke this to
  /// tell the retrytimer "it failed again! what do I do??"
  ///
  /// Returns `nb::Error::WouldBlock` when we have not yet
  /// waited the appropriate amount of time to retry.
  pub fn what_should_i_do(&mut self,
                          now: Instant<C>)
                          -> nb::Result<YouShould, core::convert::Infallible> {
    if self.attempts.0 >= self.params.max_retransmission {
      return Ok(YouShould::Cry);
    }

    if now < self.next_fire {
      return Err(nb::Error::WouldBlock);
    }

    self.attempts.0 += 1;
    self.timeout = Milliseconds(self.timeout.0 * self.params.coap_backoff_percent as u64 / 100);
    self.next_fire = now + self.timeout;

    Ok(YouShould::Retry)
  }

  /// The instant this timer was created
  pub fn start(&self) -> Instant<C> {
    self.start
  }
}

#[cfg(test)]
mod test {
  use embedded_time::rate::Fraction;

  use super::*;

  pub struct FakeClock(pub *const u64);
  impl FakeClock {
    pub fn new(time_ptr: *const u64) -> Self {
      Self(time_ptr)
    }
  }

  impl Clock for FakeClock {
    type T = u64;

    const SCALING_FACTOR: Fraction = Fraction::new(1, 1000);

    fn try_now(&self) -> Result<Instant<Self>, embedded_time::clock::Error> {
      unsafe { Ok(Instant::new(*self.0)) }
    }
  }

  #[test]
  fn no_jitter_fixed_delay() {
    #![allow(unused_assignments)]

    let mut time_millis = 0u64;
    let clock = FakeClock::new(&time_millis as *const _);
    let now = || clock.try_now().unwrap();

    let params = TransmissionParams { ack_timeout_millis: 1000,
                                      ack_random_percent: 100,
                                      coap_backoff_percent: 100,
                                      max_retransmission: 3 };
    let mut retry = RetryTimer::new(now(), params);

    time_millis = 999;
    assert_eq!(retry.what_should_i_do(now()).unwrap_err(),
               nb::Error::WouldBlock);

    time_millis = 1000;
    assert_eq!(retry.what_should_i_do(now()).unwrap(), YouShould::Retry);

    time_millis = 1999;
    assert_eq!(retry.what_should_i_do(now()).unwrap_err(),
               nb::Error::WouldBlock);

    time_millis = 2000;
    assert_eq!(retry.what_should_i_do(now()).unwrap(), YouShould::Retry);

    time_millis = 3000;
    assert_eq!(retry.what_should_i_do(now()).unwrap(), YouShould::Retry);

    time_millis = 4000;
    assert_eq!(retry.what_should_i_do(now()).unwrap(), YouShould::Cry);
  }

  #[test]
  fn multiplicative_backoff() {
    #![allow(unused_assignments)]

    let mut time_millis = 0u64;
    let clock = FakeClock::new(&time_millis as *const _);
    let now = || clock.try_now().unwrap();

    let params = TransmissionParams { ack_timeout_millis: 1000,
                                      ack_random_percent: 100,
                                      coap_backoff_percent: 200,
                                      max_retransmission: 4 };
    let mut retry = RetryTimer::new(now(), params);

    // timeout0 = 1000
    time_millis = 1000;
    assert_eq!(retry.what_should_i_do(now()).unwrap(), YouShould::Retry);

    // timeout1 = 1000 * 2 = 2000, fires at t=3000
    time_millis = 2999;
    assert_eq!(retry.what_should_i_do(now()).unwrap_err(),
               nb::Error::WouldBlock);
    time_millis = 3000;
    assert_eq!(retry.what_should_i_do(now()).unwrap(), YouShould::Retry);

    // timeout2 = 2000 * 2 = 4000, fires at t=7000
    time_millis = 6999;
    assert_eq!(retry.what_should_i_do(now()).unwrap_err(),
               nb::Error::WouldBlock);
    time_millis = 7000;
    assert_eq!(retry.what_should_i_do(now()).unwrap(), YouShould::Retry);

    time_millis = 20_000;
    assert_eq!(retry.what_should_i_do(now()).unwrap(), YouShould::Retry);

    time_millis = 40_000;
    assert_eq!(retry.what_should_i_do(now()).unwrap(), YouShould::Cry);
  }

  #[test]
  fn jitter_bounds() {
    let time_millis = 0u64;
    let clock = FakeClock::new(&time_millis as *const _);
    let now = || clock.try_now().unwrap();

    let params = TransmissionParams { ack_timeout_millis: 2000,
                                      ack_random_percent: 150,
                                      coap_backoff_percent: 200,
                                      max_retransmission: 4 };
    let retry = RetryTimer::new(now(), params);

    assert!(retry.timeout.0 >= 2000 && retry.timeout.0 <= 3000);
  }
}
