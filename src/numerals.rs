use regex::Regex;
use std::sync::OnceLock;

/// Magnitude markers in the order they are tested. The first marker found
/// anywhere in the text wins.
const MAGNITUDES: &[(&[&str], f64)] = &[
    (&["พัน", "K"], 1_000.0),
    (&["หมื่น"], 10_000.0),
    (&["แสน"], 100_000.0),
    (&["ล้าน", "M"], 1_000_000.0),
];

fn numeral_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+\.?\d*").expect("numeral pattern is valid"))
}

/// Thai digits `๐`..`๙` become their ASCII counterparts.
fn ascii_digit(c: char) -> char {
    match c {
        '\u{0E50}'..='\u{0E59}' => char::from(b'0' + (c as u32 - 0x0E50) as u8),
        _ => c,
    }
}

/// First numeral in `text`. A comma ends the numeral, so `1,234` reads as 1.
fn first_numeral(text: &str) -> Option<f64> {
    let m = numeral_re().find(text)?;
    m.as_str().chars().map(ascii_digit).collect::<String>().parse::<f64>().ok()
}

fn multiplier(text: &str) -> f64 {
    MAGNITUDES
        .iter()
        .find(|(markers, _)| markers.iter().any(|m| text.contains(m)))
        .map(|(_, scale)| *scale)
        .unwrap_or(1.0)
}

/// Scaled value of a counter label such as `1.2K`, `3 พัน` or `45 comments`.
/// Returns `None` when the label holds no digits.
pub fn parse_magnitude(text: &str) -> Option<f64> {
    first_numeral(text).map(|n| n * multiplier(text))
}

/// Like [`parse_magnitude`] but substitutes 0 (and logs) for labels without
/// a numeral.
pub fn normalize(text: &str) -> f64 {
    match parse_magnitude(text) {
        Some(v) => v,
        None => {
            tracing::error!("Error converting number: {text:?}");
            0.0
        }
    }
}

/// Counter value truncated to an integer.
pub fn to_count(text: &str) -> u64 {
    normalize(text) as u64
}
