//! Shared helpers for fields the upstream API encodes inconsistently: arrays
//! that sometimes arrive as JSON-encoded strings, and numbers that sometimes
//! arrive as strings. Centralized here so callers never branch on shape
//! (spec.md §9, "Dynamic parsing of outcomes/prices").

use serde_json::Value;

/// Parses a field that is either a JSON array already, or a JSON-encoded
/// string containing an array (e.g. Gamma's `outcomes`/`clobTokenIds`
/// fields). Returns an empty vector if neither shape applies or the encoded
/// string fails to parse — never propagates a parse error (spec.md §4.3).
pub fn parse_string_array_field(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        Some(Value::String(s)) => serde_json::from_str::<Vec<String>>(s).unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// Parses a numeric field that may arrive as a JSON number or a
/// string-encoded number. Parse failure or absence yields `None`, never an
/// error (spec.md §4.3: "parse failure yields ⊥, never a thrown error").
pub fn parse_numeric_field(value: Option<&Value>) -> Option<f64> {
    match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Sums the `size` field across an array of order-book levels (bids or
/// asks). Invalid or missing sizes are treated as zero (spec.md §4.3,
/// "book-size semantics").
pub fn sum_book_sizes(levels: Option<&Value>) -> f64 {
    levels
        .and_then(|v| v.as_array())
        .map(|levels| {
            levels
                .iter()
                .map(|level| parse_numeric_field(level.get("size")).unwrap_or(0.0))
                .sum()
        })
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_array_and_json_string_identically() {
        let as_array = json!(["Yes", "No"]);
        let as_string = json!("[\"Yes\", \"No\"]");
        assert_eq!(
            parse_string_array_field(Some(&as_array)),
            parse_string_array_field(Some(&as_string))
        );
    }

    #[test]
    fn missing_or_malformed_array_field_yields_empty() {
        assert!(parse_string_array_field(None).is_empty());
        assert!(parse_string_array_field(Some(&json!("not json"))).is_empty());
        assert!(parse_string_array_field(Some(&json!(42))).is_empty());
    }

    #[test]
    fn numeric_field_accepts_number_or_string() {
        assert_eq!(parse_numeric_field(Some(&json!(12.5))), Some(12.5));
        assert_eq!(parse_numeric_field(Some(&json!("12.5"))), Some(12.5));
        assert_eq!(parse_numeric_field(Some(&json!("not a number"))), None);
        assert_eq!(parse_numeric_field(None), None);
    }

    #[test]
    fn book_sizes_treat_invalid_entries_as_zero() {
        let levels = json!([{"size": "1.5"}, {"size": "bogus"}, {"size": 2.0}]);
        assert_eq!(sum_book_sizes(Some(&levels)), 3.5);
    }

    #[test]
    fn book_sizes_missing_yields_zero() {
        assert_eq!(sum_book_sizes(None), 0.0);
    }
}
