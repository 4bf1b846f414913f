//! Helpers for element configuration arguments.
//!
//! The core embeds no configuration language; elements receive their
//! arguments pre-split into a list of strings by the layer above. By
//! convention each argument is a `KEYWORD value` pair, and these helpers
//! give library elements one way to take them apart.

use std::str::FromStr;
use std::time::Duration;

/// Splits each argument into its keyword and value.
///
/// The keyword is everything before the first whitespace; the value is the
/// rest, trimmed. An argument with no whitespace has an empty value.
pub fn keywords(args: &[String]) -> impl Iterator<Item = (&str, &str)> {
    args.iter().map(|arg| {
        let arg = arg.trim();
        match arg.split_once(char::is_whitespace) {
            Some((key, value)) => (key, value.trim()),
            None => (arg, ""),
        }
    })
}

/// Parses a value with a keyword-qualified error message.
pub fn parse<T>(key: &str, value: &str) -> Result<T, String>
where
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    value
        .parse::<T>()
        .map_err(|e| format!("{}: {}", key, e))
}

/// Parses a boolean: `true`/`false`, `yes`/`no`, `1`/`0`.
pub fn parse_bool(key: &str, value: &str) -> Result<bool, String> {
    match value {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(format!("{}: expected a boolean, got {:?}", key, value)),
    }
}

/// Parses an interval: a number with an `s`, `ms`, or `us` suffix, or a
/// bare (possibly fractional) count of seconds.
pub fn parse_interval(key: &str, value: &str) -> Result<Duration, String> {
    let (digits, scale) = if let Some(rest) = value.strip_suffix("ms") {
        (rest, 1e-3)
    } else if let Some(rest) = value.strip_suffix("us") {
        (rest, 1e-6)
    } else if let Some(rest) = value.strip_suffix('s') {
        (rest, 1.0)
    } else {
        (value, 1.0)
    };
    let seconds = digits
        .trim()
        .parse::<f64>()
        .map_err(|_| format!("{}: expected an interval, got {:?}", key, value))?;
    if seconds.is_sign_negative() || !seconds.is_finite() {
        return Err(format!("{}: interval out of range", key));
    }
    Ok(Duration::from_secs_f64(seconds * scale))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn keywords_split_once() {
        let args = args(&["LIMIT 5", "DATA a b c", "ACTIVE"]);
        let pairs: Vec<_> = keywords(&args).collect();
        assert_eq!(pairs, vec![("LIMIT", "5"), ("DATA", "a b c"), ("ACTIVE", "")]);
    }

    #[test]
    fn interval_forms() {
        assert_eq!(parse_interval("I", "250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_interval("I", "2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_interval("I", "0.5").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_interval("I", "100us").unwrap(), Duration::from_micros(100));
        assert!(parse_interval("I", "fast").is_err());
        assert!(parse_interval("I", "-1").is_err());
    }

    #[test]
    fn bools_and_numbers() {
        assert!(parse_bool("A", "yes").unwrap());
        assert!(!parse_bool("A", "0").unwrap());
        assert!(parse_bool("A", "maybe").is_err());
        assert_eq!(parse::<u32>("N", "12").unwrap(), 12);
        assert!(parse::<u32>("N", "twelve").unwrap_err().starts_with("N:"));
    }
}
