/// Missing-blocks payload used by Q-Block1/Q-Block2 (RFC9177 §3.2), carried with
/// content-format `application/missing-blocks+cbor-seq` (272): a CBOR sequence
/// of unsigned integers (block numbers), strictly ascending with no duplicates.
///
/// Only unsigned-integer major type is needed here, so this hand-rolls that
/// slice of CBOR (RFC 8949 §3.1) rather than depending on a full CBOR crate.
pub mod missing_blocks {
  /// Error decoding a missing-blocks CBOR sequence
  #[derive(Debug, Clone, Copy, PartialEq, Eq)]
  pub enum Error {
    /// Ran out of bytes mid-item
    Truncated,
    /// A CBOR major type other than 0 (unsigned int) appeared
    NotAnUnsignedInt,
    /// The encoder was given a non-strictly-ascending sequence
    NotAscending,
  }

  /// Decode a missing-blocks CBOR sequence, de-duplicating consecutive repeats
  /// tolerated from the wire.
  pub fn decode(mut bytes: &[u8]) -> Result<Vec<u64>, Error> {
    let mut out = Vec::new();

    while !bytes.is_empty() {
      let (n, rest) = decode_one(bytes)?;
      bytes = rest;
      if out.last() != Some(&n) {
        out.push(n);
      }
    }

    Ok(out)
  }

  fn decode_one(bytes: &[u8]) -> Result<(u64, &[u8]), Error> {
    let head = *bytes.first().ok_or(Error::Truncated)?;
    if head >> 5 != 0 {
      return Err(Error::NotAnUnsignedInt);
    }

    let info = head & 0b0001_1111;
    let rest = &bytes[1..];
    match info {
      | 0..=23 => Ok((info as u64, rest)),
      | 24 => take(rest, 1).map(|(b, r)| (b[0] as u64, r)),
      | 25 => take(rest, 2).map(|(b, r)| (u16::from_be_bytes([b[0], b[1]]) as u64, r)),
      | 26 => {
        take(rest, 4).map(|(b, r)| (u32::from_be_bytes([b[0], b[1], b[2], b[3]]) as u64, r))
      },
      | 27 => take(rest, 8).map(|(b, r)| {
               (u64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]), r)
             }),
      | _ => Err(Error::Truncated),
    }
  }

  fn take(bytes: &[u8], n: usize) -> Result<(&[u8], &[u8]), Error> {
    if bytes.len() < n {
      Err(Error::Truncated)
    } else {
      Ok((bytes, &bytes[n..]))
    }
  }

  /// Encode a strictly-ascending, deduplicated sequence of block numbers.
  /// Rejects input that isn't strictly ascending.
  pub fn encode(numbers: &[u64]) -> Result<Vec<u8>, Error> {
    if numbers.windows(2).any(|w| w[0] >= w[1]) {
      return Err(Error::NotAscending);
    }

    let mut out = Vec::new();
    for &n in numbers {
      encode_one(n, &mut out);
    }
    Ok(out)
  }

  fn encode_one(n: u64, out: &mut Vec<u8>) {
    match n {
      | 0..=23 => out.push(n as u8),
      | 24..=0xFF => {
        out.push(24);
        out.push(n as u8);
      },
      | 0x100..=0xFFFF => {
        out.push(25);
        out.extend((n as u16).to_be_bytes());
      },
      | 0x1_0000..=0xFFFF_FFFF => {
        out.push(26);
        out.extend((n as u32).to_be_bytes());
      },
      | _ => {
        out.push(27);
        out.extend(n.to_be_bytes());
      },
    }
  }

  #[cfg(test)]
  mod tests {
    use super::*;

    #[test]
    fn roundtrip_small() {
      let nums = [0u64, 1, 5, 22];
      let bytes = encode(&nums).unwrap();
      assert_eq!(decode(&bytes).unwrap(), nums);
    }

    #[test]
    fn roundtrip_mixed_widths() {
      let nums = [0u64, 23, 24, 255, 256, 70000, 5_000_000_000];
      let bytes = encode(&nums).unwrap();
      assert_eq!(decode(&bytes).unwrap(), nums);
    }

    #[test]
    fn decode_dedups_wire_repeats() {
      let mut bytes = Vec::new();
      encode_one(3, &mut bytes);
      encode_one(3, &mut bytes);
      encode_one(4, &mut bytes);
      assert_eq!(decode(&bytes).unwrap(), vec![3, 4]);
    }

    #[test]
    fn encode_rejects_non_ascending() {
      assert_eq!(encode(&[1, 1]), Err(Error::NotAscending));
      assert_eq!(encode(&[2, 1]), Err(Error::NotAscending));
    }
  }
}
