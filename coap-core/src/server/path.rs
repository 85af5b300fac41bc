//! Path-segment matching helpers, used to route a request to a resource
//! handler without pulling in a full URI-template implementation.

/// Split a request's `path_string()` into its `/`-separated segments.
pub fn segments(path: &str) -> Vec<&str> {
  path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Does `path` match `pattern` exactly, segment for segment? A pattern
/// segment of `*` matches any single segment.
pub fn matches_exact(pattern: &str, path: &str) -> bool {
  let pat = segments(pattern);
  let seg = segments(path);

  pat.len() == seg.len()
  && pat.iter().zip(seg.iter()).all(|(p, s)| *p == "*" || p == s)
}

/// Does `path` start with `prefix`, segment for segment (`*` matches any
/// single segment)?
pub fn starts_with(prefix: &str, path: &str) -> bool {
  let pat = segments(prefix);
  let seg = segments(path);

  pat.len() <= seg.len() && pat.iter().zip(seg.iter()).all(|(p, s)| *p == "*" || p == s)
}

/// Parse the path segment at `ix` as a `u32`, if present and well-formed.
pub fn segment_u32(path: &str, ix: usize) -> Option<u32> {
  segments(path).get(ix)?.parse().ok()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn exact_match() {
    assert!(matches_exact("sensors/temp", "sensors/temp"));
    assert!(!matches_exact("sensors/temp", "sensors/temp/extra"));
  }

  #[test]
  fn wildcard_segment() {
    assert!(matches_exact("users/*", "users/123"));
    assert!(!matches_exact("users/*", "users/123/extra"));
  }

  #[test]
  fn prefix_match() {
    assert!(starts_with("users", "users/123/orders"));
    assert!(!starts_with("orders", "users/123/orders"));
  }

  #[test]
  fn parses_numeric_segment() {
    assert_eq!(segment_u32("users/123", 1), Some(123));
    assert_eq!(segment_u32("users/abc", 1), None);
  }
}
