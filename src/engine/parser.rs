// Query Text Extractors
//
// The free-form query text only carries incidental parameters. Extraction is
// intentionally permissive: a bracketed number for PERCENTILE/TOP_K with
// silent defaults, and the span between the first and last single quote for
// CONTAINS/FREQUENCY items. The typed query_type field is authoritative.

/// Percentile value from `PERCENTILE(<number>)`; 95 when absent or
/// unparsable. Range checking is the dispatcher's job.
pub fn extract_percentile(query: &str) -> f64 {
    extract_parenthesized(query, "PERCENTILE(")
        .and_then(|s| s.trim().parse::<f64>().ok())
        .unwrap_or(95.0)
}

/// K from `TOP_K(<integer>)`; 10 when absent or unparsable.
pub fn extract_top_k(query: &str) -> usize {
    extract_parenthesized(query, "TOP_K(")
        .and_then(|s| s.trim().parse::<usize>().ok())
        .unwrap_or(10)
}

/// The item between the first and last single quote, for
/// `CONTAINS('<item>')` and `FREQUENCY('<item>')`.
pub fn extract_quoted_item(query: &str) -> Option<String> {
    let first = query.find('\'')?;
    let last = query.rfind('\'')?;
    if last <= first {
        return None;
    }
    Some(query[first + 1..last].to_string())
}

fn extract_parenthesized(query: &str, marker: &str) -> Option<String> {
    let start = query.find(marker)? + marker.len();
    let end = query[start..].find(')')? + start;
    Some(query[start..end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_extraction() {
        assert_eq!(extract_percentile("PERCENTILE(99) OF cpu_usage"), 99.0);
        assert_eq!(extract_percentile("PERCENTILE(50.5)"), 50.5);
        assert_eq!(extract_percentile("PERCENTILE(150)"), 150.0);
    }

    #[test]
    fn test_percentile_defaults() {
        assert_eq!(extract_percentile("cpu usage please"), 95.0);
        assert_eq!(extract_percentile("PERCENTILE(abc)"), 95.0);
        assert_eq!(extract_percentile("PERCENTILE("), 95.0);
    }

    #[test]
    fn test_top_k_extraction() {
        assert_eq!(extract_top_k("TOP_K(3) pods by restarts"), 3);
        assert_eq!(extract_top_k("TOP_K(x)"), 10);
        assert_eq!(extract_top_k("show me everything"), 10);
    }

    #[test]
    fn test_quoted_item_extraction() {
        assert_eq!(
            extract_quoted_item("CONTAINS('prod/default/api/cpu_usage')").as_deref(),
            Some("prod/default/api/cpu_usage")
        );
        assert_eq!(
            extract_quoted_item("FREQUENCY('key with spaces')").as_deref(),
            Some("key with spaces")
        );
        // quotes inside the item are kept verbatim (first-to-last span)
        assert_eq!(
            extract_quoted_item("CONTAINS('a'b'c')").as_deref(),
            Some("a'b'c")
        );
    }

    #[test]
    fn test_missing_quotes_yield_none() {
        assert!(extract_quoted_item("CONTAINS(key)").is_none());
        assert!(extract_quoted_item("CONTAINS('unterminated").is_none());
    }
}
