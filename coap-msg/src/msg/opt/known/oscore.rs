/// Error decoding the OSCORE option value (RFC8613 §6.1)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OscoreOptionError {
  /// Reserved flag bits 5-7 were nonzero
  ReservedBitsSet,
  /// Flag byte had `n` (Partial-IV length) > 5
  PartialIvTooLong,
  /// Flag byte was nonzero but the option value ended before consuming the
  /// fields the flags promised (Partial IV, kid-context length/bytes, or kid)
  Truncated,
  /// Flag byte was zero but the option value carried extra bytes; RFC8613 §2
  /// requires an empty value in that case
  FlagZeroButValueNonEmpty,
}

/// Decoded OSCORE option value.
///
/// ```text
///  0 1 2 3 4 5 6 7 <------------- n bytes -------------->
/// +-+-+-+-+-+-+-+-+--------------------------------------
/// |0 0 0|h|k|  n  |       Partial IV (if any) ...
/// +-+-+-+-+-+-+-+-+--------------------------------------
///
///  <- 1 byte -> <----- s bytes ------>
/// +------------+----------------------+------------------+
/// | s (if h=1) | kid context (if h=1) | kid (if k=1) ...  |
/// +------------+----------------------+------------------+
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OscoreOption {
  /// Partial IV of the sender, present iff `n > 0`
  pub partial_iv: Option<Vec<u8>>,
  /// Group/pairwise kid context, present iff `h` is set
  pub kid_context: Option<Vec<u8>>,
  /// Sender's kid. Spans the rest of the value; present iff `k` is set.
  /// An empty (but present) kid is valid and denotes the client's own context.
  pub kid: Option<Vec<u8>>,
}

impl OscoreOption {
  /// Parse an OSCORE option value per RFC8613 §6.1
  pub fn parse(bytes: &[u8]) -> Result<Self, OscoreOptionError> {
    if bytes.is_empty() {
      return Ok(Self::default());
    }

    let flags = bytes[0];
    if flags & 0b1110_0000 != 0 {
      return Err(OscoreOptionError::ReservedBitsSet);
    }

    let n = (flags & 0b0000_0111) as usize;
    if n > 5 {
      return Err(OscoreOptionError::PartialIvTooLong);
    }
    let h = flags & 0b0001_0000 != 0;
    let k = flags & 0b0000_1000 != 0;

    if flags == 0 && bytes.len() > 1 {
      return Err(OscoreOptionError::FlagZeroButValueNonEmpty);
    }

    let mut rest = &bytes[1..];

    let partial_iv = if n > 0 {
      if rest.len() < n {
        return Err(OscoreOptionError::Truncated);
      }
      let (iv, tail) = rest.split_at(n);
      rest = tail;
      Some(iv.to_vec())
    } else {
      None
    };

    let kid_context = if h {
      let s = *rest.first().ok_or(OscoreOptionError::Truncated)? as usize;
      rest = &rest[1..];
      if rest.len() < s {
        return Err(OscoreOptionError::Truncated);
      }
      let (ctx, tail) = rest.split_at(s);
      rest = tail;
      Some(ctx.to_vec())
    } else {
      None
    };

    let kid = if k { Some(rest.to_vec()) } else { None };

    Ok(Self { partial_iv, kid_context, kid })
  }

  /// Serialize back to the RFC8613 §6.1 wire form
  pub fn to_bytes(&self) -> Vec<u8> {
    if self.partial_iv.is_none() && self.kid_context.is_none() && self.kid.is_none() {
      return Vec::new();
    }

    let n = self.partial_iv.as_ref().map(|iv| iv.len()).unwrap_or(0) as u8;
    let h = self.kid_context.is_some() as u8;
    let k = self.kid.is_some() as u8;
    let flags = (h << 4) | (k << 3) | n;

    let mut out = vec![flags];
    if let Some(iv) = &self.partial_iv {
      out.extend(iv);
    }
    if let Some(ctx) = &self.kid_context {
      out.push(ctx.len() as u8);
      out.extend(ctx);
    }
    if let Some(kid) = &self.kid {
      out.extend(kid);
    }
    out
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_roundtrip() {
    assert_eq!(OscoreOption::parse(&[]).unwrap(), OscoreOption::default());
    assert_eq!(OscoreOption::default().to_bytes(), Vec::<u8>::new());
  }

  #[test]
  fn kid_only_roundtrip() {
    let opt = OscoreOption { partial_iv: None,
                             kid_context: None,
                             kid: Some(vec![0xAA, 0xBB]) };
    let bytes = opt.to_bytes();
    assert_eq!(OscoreOption::parse(&bytes).unwrap(), opt);
  }

  #[test]
  fn full_roundtrip() {
    let opt = OscoreOption { partial_iv: Some(vec![1, 2, 3]),
                             kid_context: Some(vec![9, 9]),
                             kid: Some(vec![0xAA]) };
    let bytes = opt.to_bytes();
    assert_eq!(OscoreOption::parse(&bytes).unwrap(), opt);
  }

  #[test]
  fn reserved_bits_rejected() {
    assert_eq!(OscoreOption::parse(&[0b1000_0000]), Err(OscoreOptionError::ReservedBitsSet));
  }

  #[test]
  fn flag_zero_with_trailing_bytes_rejected() {
    assert_eq!(OscoreOption::parse(&[0x00, 0xFF]),
               Err(OscoreOptionError::FlagZeroButValueNonEmpty));
  }
}
