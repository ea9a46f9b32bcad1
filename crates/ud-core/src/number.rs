//! Numeric argument parsing

/// Shortest accepted delay, exclusive.
pub const MIN_SLEEP_SEC: f64 = 0.001;
/// Longest accepted delay, inclusive.
pub const MAX_SLEEP_SEC: f64 = 86400.0;

/// Parse an unsigned integer with C radix rules: `0x` hex, leading `0` octal, else decimal.
pub fn parse_c_integer(text: &str) -> Option<u64> {
    let text = text.trim_start_matches('+');
    let (digits, radix) = if let Some(hex) = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        (hex, 16)
    } else if text.len() > 1 && text.starts_with('0') {
        (&text[1..], 8)
    } else {
        (text, 10)
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    u64::from_str_radix(digits, radix).ok()
}

/// Parse a signed integer with C radix rules.
pub fn parse_c_signed(text: &str) -> Option<i64> {
    match text.strip_prefix('-') {
        Some(rest) => parse_c_integer(rest)
            .and_then(|v| i64::try_from(v).ok())
            .map(|v| -v),
        None => parse_c_integer(text).and_then(|v| i64::try_from(v).ok()),
    }
}

/// Parse a finite floating point number.
pub fn parse_float(text: &str) -> Option<f64> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .or_else(|| parse_c_signed(text.trim()).map(|v| v as f64))
}

/// Whether a delay lies within `(MIN_SLEEP_SEC, MAX_SLEEP_SEC]`.
pub fn is_valid_delay(secs: f64) -> bool {
    secs > MIN_SLEEP_SEC && secs <= MAX_SLEEP_SEC
}

/// Parse a delay in seconds within `(MIN_SLEEP_SEC, MAX_SLEEP_SEC]`.
pub fn parse_seconds(text: &str) -> Option<f64> {
    parse_float(text).filter(|&v| is_valid_delay(v))
}
