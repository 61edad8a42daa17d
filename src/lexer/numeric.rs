//! Numeric text conversions shared by the parser and the runtime
//!
//! Literal syntax (`0x1F`, `1_000`) and runtime string-to-number coercion
//! (`Number("  42 ")`, `parseFloat("3.5px")`) both bottom out in
//! `lexical-core`'s float parser.

/// Value of a numeric literal token. Separators are ignored.
pub fn parse_numeric_literal(text: &str) -> Option<f64> {
    let clean: String = text.chars().filter(|&c| c != '_').collect();
    if let Some(value) = parse_radix_prefixed(&clean) {
        return Some(value);
    }
    parse_decimal(&clean)
}

/// `0x`, `0o` and `0b` integers of any length
fn parse_radix_prefixed(text: &str) -> Option<f64> {
    let (radix, digits) = match text.get(..2)? {
        "0x" | "0X" => (16, &text[2..]),
        "0o" | "0O" => (8, &text[2..]),
        "0b" | "0B" => (2, &text[2..]),
        _ => return None,
    };
    if digits.is_empty() {
        return Some(f64::NAN);
    }
    digits.chars().try_fold(0f64, |acc, c| {
        c.to_digit(radix).map(|d| acc * radix as f64 + d as f64)
    })
}

/// A complete decimal number; `.5` and `5.` are accepted
fn parse_decimal(text: &str) -> Option<f64> {
    let (value, used) = parse_decimal_prefix(text)?;
    (used == text.len()).then_some(value)
}

/// Longest decimal prefix of `text`, returning the value and bytes consumed
fn parse_decimal_prefix(text: &str) -> Option<(f64, usize)> {
    let bytes = text.as_bytes();
    let sign_len = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let body = &bytes[sign_len..];
    if !body.first().is_some_and(|b| b.is_ascii_digit() || *b == b'.') {
        return None;
    }
    if body.first() == Some(&b'.') && !body.get(1).is_some_and(u8::is_ascii_digit) {
        return None;
    }

    // lexical-core wants digits on both sides of the point
    let mut normalized = String::with_capacity(text.len() + 2);
    normalized.push_str(&text[..sign_len]);
    let mut extra = 0usize;
    if body.first() == Some(&b'.') {
        normalized.push('0');
        extra += 1;
    }
    normalized.push_str(&text[sign_len..]);

    let (value, used) = lexical_core::parse_partial::<f64>(normalized.as_bytes()).ok()?;
    let mut used = used - extra;
    // "5." is complete in JavaScript
    if text.as_bytes().get(used) == Some(&b'.')
        && !text.as_bytes().get(used + 1).is_some_and(u8::is_ascii_digit)
    {
        used += 1;
    }
    Some((value, used))
}

/// `parseFloat` semantics: leading whitespace is skipped, trailing garbage
/// ignored, and anything unparsable is `NaN`.
pub fn parse_float_prefix(text: &str) -> f64 {
    let trimmed = text.trim_start();
    for (prefix, value) in [
        ("Infinity", f64::INFINITY),
        ("+Infinity", f64::INFINITY),
        ("-Infinity", f64::NEG_INFINITY),
    ] {
        if trimmed.starts_with(prefix) {
            return value;
        }
    }
    parse_decimal_prefix(trimmed)
        .map(|(value, _)| value)
        .unwrap_or(f64::NAN)
}

/// `parseInt` semantics for the given radix (`None` means auto-detect)
pub fn parse_int_prefix(text: &str, radix: Option<u32>) -> f64 {
    let trimmed = text.trim_start();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let (radix, digits) = match radix {
        Some(16) | None if rest.starts_with("0x") || rest.starts_with("0X") => (16, &rest[2..]),
        None => (10, rest),
        Some(r) if (2..=36).contains(&r) => (r, rest),
        Some(_) => return f64::NAN,
    };

    let mut value = 0f64;
    let mut any = false;
    for c in digits.chars() {
        match c.to_digit(radix) {
            Some(d) => {
                value = value * radix as f64 + d as f64;
                any = true;
            }
            None => break,
        }
    }
    match (any, negative) {
        (false, _) => f64::NAN,
        (true, true) => -value,
        (true, false) => value,
    }
}

/// `ToNumber` applied to a string: surrounding whitespace is ignored, the
/// empty string is zero and any trailing garbage makes the result `NaN`.
pub fn string_to_number(text: &str) -> f64 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    if let Some(value) = parse_radix_prefixed(trimmed) {
        return value;
    }
    if trimmed.contains('_') {
        return f64::NAN;
    }
    parse_decimal(trimmed).unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literals() {
        assert_eq!(parse_numeric_literal("42"), Some(42.0));
        assert_eq!(parse_numeric_literal("1_000"), Some(1000.0));
        assert_eq!(parse_numeric_literal("0xff"), Some(255.0));
        assert_eq!(parse_numeric_literal("0b101"), Some(5.0));
        assert_eq!(parse_numeric_literal("0o17"), Some(15.0));
        assert_eq!(parse_numeric_literal(".5"), Some(0.5));
        assert_eq!(parse_numeric_literal("2.5e3"), Some(2500.0));
    }

    #[test]
    fn test_parse_float_prefix() {
        assert_eq!(parse_float_prefix("3.5px"), 3.5);
        assert_eq!(parse_float_prefix("  -2"), -2.0);
        assert_eq!(parse_float_prefix("Infinity and beyond"), f64::INFINITY);
        assert!(parse_float_prefix("abc").is_nan());
    }

    #[test]
    fn test_parse_int_prefix() {
        assert_eq!(parse_int_prefix("42abc", None), 42.0);
        assert_eq!(parse_int_prefix("0x1A", None), 26.0);
        assert_eq!(parse_int_prefix("-17.9", None), -17.0);
        assert_eq!(parse_int_prefix("101", Some(2)), 5.0);
        assert!(parse_int_prefix("zz", None).is_nan());
    }

    #[test]
    fn test_string_to_number() {
        assert_eq!(string_to_number(""), 0.0);
        assert_eq!(string_to_number(" 12 "), 12.0);
        assert_eq!(string_to_number("5."), 5.0);
        assert!(string_to_number("12px").is_nan());
        assert_eq!(string_to_number("-Infinity"), f64::NEG_INFINITY);
    }
}
