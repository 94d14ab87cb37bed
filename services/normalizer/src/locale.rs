//! Decoding and number formats of Spanish statistical downloads.

use encoding_rs::ISO_8859_15;

/// Decode a payload: UTF-8 when valid (BOM stripped), ISO-8859-15 otherwise.
pub fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            let (text, _, _) = ISO_8859_15.decode(bytes);
            text.into_owned()
        }
    }
}

/// Parse `1.234.567,89` style numbers (`.` thousands, `,` decimal).
/// Empty cells and the publisher's missing-value markers yield `None`.
pub fn parse_locale_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| *c != '.' && !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a number that uses `,` or `.` only as decimal separator, as found
/// in long-format tables and microdata weights.
pub fn parse_decimal(raw: &str) -> Option<f64> {
    let cleaned = raw.trim().replace(',', ".");
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}
