//! Handle - Composite identifier encoding
//!
//! Some resources have no single vendor identifier; their identity is a
//! tuple of vendor-assigned fields (e.g., load balancer name, listener
//! port, policy name) joined into one handle string. Decoding splits on
//! the first N-1 occurrences of the delimiter, so only the final part may
//! itself contain it.

use crate::error::{LifecycleError, LifecycleResult};

/// Delimiter joining the parts of a composite handle
pub const DELIMITER: char = ':';

/// Join parts into a composite handle.
///
/// Parts must not contain the delimiter; the roundtrip guarantee depends
/// on it.
pub fn join(parts: &[&str]) -> LifecycleResult<String> {
    let mut violations = Vec::new();
    if parts.is_empty() {
        violations.push("composite handle needs at least one part".to_string());
    }
    for part in parts {
        if part.contains(DELIMITER) {
            violations.push(format!(
                "handle part '{}' must not contain '{}'",
                part, DELIMITER
            ));
        }
    }
    if !violations.is_empty() {
        return Err(LifecycleError::validation(violations));
    }
    Ok(parts.join(&DELIMITER.to_string()))
}

/// Split a composite handle into exactly `expected` parts.
pub fn split(handle: &str, expected: usize) -> LifecycleResult<Vec<&str>> {
    let parts: Vec<&str> = handle.splitn(expected, DELIMITER).collect();
    if parts.len() != expected {
        return Err(LifecycleError::MalformedHandle {
            handle: handle.to_string(),
            expected,
            delimiter: DELIMITER,
        });
    }
    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_then_split_roundtrips() {
        let parts = ["my-elb", "80", "my-policy"];
        let handle = join(&parts).unwrap();
        assert_eq!(handle, "my-elb:80:my-policy");
        assert_eq!(split(&handle, 3).unwrap(), parts);
    }

    #[test]
    fn roundtrip_holds_for_various_parts() {
        for parts in [
            vec!["a"],
            vec!["a", "b"],
            vec!["lb-name", "8080", "policy.name-with.dots"],
            vec!["", "x", "y"],
        ] {
            let handle = join(&parts).unwrap();
            assert_eq!(split(&handle, parts.len()).unwrap(), parts);
        }
    }

    #[test]
    fn join_rejects_delimiter_in_part() {
        let err = join(&["a:b", "c"]).unwrap_err();
        assert!(matches!(err, LifecycleError::Validation { .. }));
    }

    #[test]
    fn split_keeps_delimiter_in_final_part() {
        // Only the first N-1 occurrences split; the tail is one part.
        let parts = split("lb:80:arn:aws:extra", 3).unwrap();
        assert_eq!(parts, ["lb", "80", "arn:aws:extra"]);
    }

    #[test]
    fn split_rejects_too_few_parts() {
        let err = split("lb:80", 3).unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::MalformedHandle { expected: 3, .. }
        ));
        assert_eq!(err.handle(), Some("lb:80"));
    }
}
