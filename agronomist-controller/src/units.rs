//! Kubernetes-quantity parsing for the `parseunit` Rego builtin.
//!
//! Mirrors the suffix table Kubernetes quantities use: binary suffixes
//! (Ki/Mi/Gi/Ti/Pi/Ei, powers of 1024) and decimal SI suffixes
//! (n/u/m/k/M/G/T/P/E, powers of 1000). The result is always scaled to
//! milli-units (`x1000`) and truncated toward zero, so policy authors can
//! write `500m` and `0.5` interchangeably and compare against integer pod
//! counts or CPU fractions without floating point in the policy language.

const BINARY_SUFFIXES: &[(&str, f64)] = &[
    ("Ki", 1024.0),
    ("Mi", 1024.0f64.powi(2)),
    ("Gi", 1024.0f64.powi(3)),
    ("Ti", 1024.0f64.powi(4)),
    ("Pi", 1024.0f64.powi(5)),
    ("Ei", 1024.0f64.powi(6)),
];

const DECIMAL_SUFFIXES: &[(&str, f64)] = &[
    ("n", 1e-9),
    ("u", 1e-6),
    ("m", 1e-3),
    ("k", 1e3),
    ("M", 1e6),
    ("G", 1e9),
    ("T", 1e12),
    ("P", 1e15),
    ("E", 1e18),
];

/// Parses a Kubernetes-style quantity string into milli-units.
///
/// Returns `None` if `raw` isn't a recognized quantity (the policy program
/// is expected to abort the evaluation in that case, not substitute zero).
pub fn parseunit(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    for (suffix, factor) in BINARY_SUFFIXES {
        if let Some(number) = raw.strip_suffix(suffix) {
            return scale(number, *factor);
        }
    }
    for (suffix, factor) in DECIMAL_SUFFIXES {
        if let Some(number) = raw.strip_suffix(suffix) {
            return scale(number, *factor);
        }
    }
    scale(raw, 1.0)
}

fn scale(number: &str, factor: f64) -> Option<i64> {
    let value: f64 = number.trim().parse().ok()?;
    Some((value * factor * 1000.0).trunc() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_milli_suffix() {
        assert_eq!(parseunit("500m"), Some(500));
    }

    #[test]
    fn parses_bare_integer_as_whole_units() {
        assert_eq!(parseunit("1"), Some(1000));
    }

    #[test]
    fn parses_binary_suffix() {
        assert_eq!(parseunit("2Gi"), Some(2 * 1024 * 1024 * 1024 * 1000));
    }

    #[test]
    fn parses_decimal_suffix() {
        assert_eq!(parseunit("1k"), Some(1_000_000));
    }

    #[test]
    fn truncates_toward_zero() {
        assert_eq!(parseunit("1500u"), Some(1));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parseunit("garbage"), None);
    }

    #[test]
    fn rejects_empty_string() {
        assert_eq!(parseunit(""), None);
    }
}
