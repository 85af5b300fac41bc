use embedded_time::clock::Error;
use embedded_time::rate::Fraction;
use embedded_time::Instant;

/// A duration, in milliseconds
pub type Millis = embedded_time::duration::Milliseconds<u64>;

/// Supertrait of [`embedded_time::Clock`] pinning the
/// type of "ticks" to u64
pub trait Clock: embedded_time::Clock<T = u64> {}
impl<C: embedded_time::Clock<T = u64>> Clock for C {}

/// Timeout configuration allowing for "never time out" as an option
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Clone, Copy)]
pub enum Timeout {
  /// Timeout after some number of milliseconds has elapsed
  Millis(u64),
  /// Never time out
  Never,
}

/// Data associated with a timestamp
pub struct Stamped<C: Clock, T>(pub T, pub Instant<C>);

impl<C: Clock, T: core::fmt::Debug> core::fmt::Debug for Stamped<C, T> {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    let millis = Millis::try_from(self.1.duration_since_epoch()).unwrap();

    f.debug_tuple("Stamped")
     .field(&self.0)
     .field(&format!("<{}ms since epoch>", millis))
     .finish()
  }
}

impl<C: Clock, T: PartialEq> PartialEq for Stamped<C, T> {
  fn eq(&self, other: &Self) -> bool {
    self.0 == other.0 && self.1 == other.1
  }
}

impl<C: Clock, T: Eq> Eq for Stamped<C, T> {}

impl<C: Clock, T: PartialOrd> PartialOrd for Stamped<C, T> {
  fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
    use core::cmp::Ordering;

    match self.0.partial_cmp(&other.0) {
      | Some(Ordering::Equal) => Some(self.1.cmp(&other.1)),
      | ne => ne,
    }
  }
}

impl<C: Clock, T: Ord> Ord for Stamped<C, T> {
  fn cmp(&self, other: &Self) -> core::cmp::Ordering {
    use core::cmp::Ordering;

    match self.0.cmp(&other.0) {
      | Ordering::Equal => self.1.cmp(&other.1),
      | ne => ne,
    }
  }
}

impl<C: Clock, T: Default> Default for Stamped<C, T> {
  fn default() -> Self {
    Self(T::default(), Instant::new(0))
  }
}

impl<C: Clock, T: Clone> Clone for Stamped<C, T> {
  fn clone(&self) -> Self {
    Self(self.0.clone(), self.1)
  }
}

impl<C: Clock, T: Copy> Copy for Stamped<C, T> {}

impl<C: Clock, T> Stamped<C, T> {
  /// Stamp `t` with the clock's current time
  pub fn new(clock: &C, t: T) -> Result<Self, Error> {
    clock.try_now().map(|now| Self(t, now))
  }

  /// Borrow the stamped value
  pub fn as_ref(&self) -> Stamped<C, &T> {
    Stamped(&self.0, self.1)
  }

  /// Mutably borrow the stamped value
  pub fn as_mut(&mut self) -> Stamped<C, &mut T> {
    Stamped(&mut self.0, self.1)
  }

  /// Get a reference to the stamped data
  pub fn data(&self) -> &T {
    &self.0
  }

  /// Get the timestamp
  pub fn time(&self) -> Instant<C> {
    self.1
  }

  /// Discard the timestamp, keeping only the data
  pub fn discard_timestamp(self) -> T {
    self.0
  }

  /// Transform the stamped value, keeping the timestamp
  pub fn map<R>(self, f: impl FnOnce(T) -> R) -> Stamped<C, R> {
    Stamped(f(self.0), self.1)
  }

  /// Of two stamped values, keep whichever has the later timestamp
  pub fn find_latest(winner: Option<Stamped<C, T>>, cur: Stamped<C, T>) -> Option<Stamped<C, T>> {
    Some(winner.filter(|winner| winner.time() > cur.time())
               .unwrap_or(cur))
  }
}

/// [`Clock`] backed by [`std::time::Instant`], ticking in microseconds from
/// the moment it was created.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock(std::time::Instant);

impl Default for SystemClock {
  fn default() -> Self {
    Self::new()
  }
}

impl SystemClock {
  /// Create a clock epoched at the current instant.
  pub fn new() -> Self {
    Self(std::time::Instant::now())
  }
}

impl embedded_time::Clock for SystemClock {
  type T = u64;

  const SCALING_FACTOR: Fraction = Fraction::new(1, 1_000_000);

  fn try_now(&self) -> Result<Instant<Self>, Error> {
    let elapsed = std::time::Instant::now().duration_since(self.0);
    Ok(Instant::new(elapsed.as_micros() as u64))
  }
}
