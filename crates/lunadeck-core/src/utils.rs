use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};

/// Get current timestamp in milliseconds.
// u128 millis fits in i64 for realistic timestamps
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Upper-case the first character, leaving the rest alone.
#[must_use]
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Split an identifier into words and capitalize each one:
/// `hotend_fan` -> `Hotend Fan`, `exhaustFan2` -> `Exhaust Fan 2`.
#[must_use]
pub fn start_case(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }

        if let Some(prev) = current.chars().last() {
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            let boundary = (prev.is_lowercase() && c.is_uppercase())
                || (prev.is_alphabetic() && c.is_numeric())
                || (prev.is_numeric() && c.is_alphabetic())
                || (prev.is_uppercase() && c.is_uppercase() && next_is_lower);
            if boundary {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }

    words
        .iter()
        .map(|word| capitalize(word))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Integer prefix of a config value, the way Klipper's string-typed config
/// sections are read: `"210.5"` -> 210, `" -5mm"` -> -5, `"abc"` -> none.
#[must_use]
// Float to int truncation is the intended behavior
#[allow(clippy::cast_possible_truncation)]
pub fn parse_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim_start();
            let (negative, digits) = match s.as_bytes().first() {
                Some(b'-') => (true, &s[1..]),
                Some(b'+') => (false, &s[1..]),
                _ => (false, s),
            };
            let end = digits
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(digits.len());
            let parsed: i64 = digits[..end].parse().ok()?;
            Some(if negative { -parsed } else { parsed })
        }
        _ => None,
    }
}

/// Falsy in the loose sense used by config sections: absent, null, false,
/// zero or empty string.
#[must_use]
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_) | Value::Object(_)) => true,
    }
}

/// Coerce a telemetry value to a finite number, zero otherwise.
#[must_use]
pub fn finite_number(value: Option<&Value>) -> f64 {
    let n = match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => {
            let s = s.trim();
            if s.is_empty() {
                0.0
            } else {
                s.parse::<f64>().unwrap_or(0.0)
            }
        }
        Some(Value::Bool(true)) => 1.0,
        _ => 0.0,
    };
    if n.is_finite() { n } else { 0.0 }
}

/// Zero unless finite.
#[must_use]
pub fn sanitize(n: f64) -> f64 {
    if n.is_finite() { n } else { 0.0 }
}

/// `3725` -> `1h 2m 5s`, `65` -> `1m 5s`, `-5` -> `-0m 5s`.
#[must_use]
// Sanitized, non-negative seconds fit in u64
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn format_counter_time(seconds: f64) -> String {
    let seconds = sanitize(seconds);
    let negative = seconds < 0.0;
    let seconds = seconds.abs();

    let hours = (seconds / 3600.0).floor() as u64;
    let minutes = (seconds % 3600.0 / 60.0).floor() as u64;
    let secs = (seconds % 3600.0 % 60.0).floor() as u64;

    let mut formatted = format!("{minutes}m {secs}s");
    if hours > 0 {
        formatted = format!("{hours}h {formatted}");
    }
    if negative {
        formatted.insert(0, '-');
    }
    formatted
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("shutdown"), "Shutdown");
        assert_eq!(capitalize("ready"), "Ready");
        assert_eq!(capitalize(""), "");
        assert_eq!(capitalize("Error"), "Error");
    }

    #[test]
    fn test_start_case() {
        assert_eq!(start_case("hotend_fan"), "Hotend Fan");
        assert_eq!(start_case("nevermore"), "Nevermore");
        assert_eq!(start_case("exhaustFan"), "Exhaust Fan");
        assert_eq!(start_case("fan2"), "Fan 2");
        assert_eq!(start_case("MCU_fan"), "MCU Fan");
        assert_eq!(start_case("board cooling"), "Board Cooling");
        assert_eq!(start_case("__"), "");
    }

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int(&json!("210")), Some(210));
        assert_eq!(parse_int(&json!("210.5")), Some(210));
        assert_eq!(parse_int(&json!(" -5mm")), Some(-5));
        assert_eq!(parse_int(&json!(12.9)), Some(12));
        assert_eq!(parse_int(&json!(300)), Some(300));
        assert_eq!(parse_int(&json!("abc")), None);
        assert_eq!(parse_int(&json!("")), None);
        assert_eq!(parse_int(&json!(null)), None);
    }

    #[test]
    fn test_is_truthy() {
        assert!(!is_truthy(None));
        assert!(!is_truthy(Some(&json!(null))));
        assert!(!is_truthy(Some(&json!(0))));
        assert!(!is_truthy(Some(&json!(""))));
        assert!(is_truthy(Some(&json!("0"))));
        assert!(is_truthy(Some(&json!({}))));
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_finite_number() {
        assert_eq!(finite_number(Some(&json!(0.5))), 0.5);
        assert_eq!(finite_number(Some(&json!("12.5"))), 12.5);
        assert_eq!(finite_number(Some(&json!("NaN"))), 0.0);
        assert_eq!(finite_number(Some(&json!("Infinity"))), 0.0);
        assert_eq!(finite_number(Some(&json!("abc"))), 0.0);
        assert_eq!(finite_number(Some(&json!([1]))), 0.0);
        assert_eq!(finite_number(None), 0.0);
    }

    #[test]
    fn test_format_counter_time() {
        assert_eq!(format_counter_time(0.0), "0m 0s");
        assert_eq!(format_counter_time(65.0), "1m 5s");
        assert_eq!(format_counter_time(3725.9), "1h 2m 5s");
        assert_eq!(format_counter_time(-5.0), "-0m 5s");
        assert_eq!(format_counter_time(f64::NAN), "0m 0s");
        assert_eq!(format_counter_time(f64::INFINITY), "0m 0s");
    }
}
