//! Utility functions for value normalization

/// Normalize a JSON document to a canonical single-line form so that
/// semantically equal policy documents compare equal regardless of
/// whitespace. Input that does not parse as JSON is returned unchanged.
pub fn normalize_json(input: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(input) {
        Ok(value) => serde_json::to_string(&value).unwrap_or_else(|_| input.to_string()),
        Err(_) => input.to_string(),
    }
}
