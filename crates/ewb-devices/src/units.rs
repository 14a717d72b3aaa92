//! SPICE-style numeric values
//!
//! Values travel between the editor, the netlist and the solver as plain
//! `f64` in SI base units. This module converts them to and from the
//! engineering-notation tokens SPICE decks use (`4.7k`, `100n`, `2.5meg`).
//!
//! Parsing follows SPICE rules: a number, an optional scale factor, then any
//! trailing letters which are ignored as a unit name (`5V`, `1kHz`, `2ms`).
//! Like SPICE, `f` is femto, so `1F` is 1e-15.

use serde::{Deserialize, Serialize};

/// Physical unit attached to a component parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Ohm,
    Farad,
    Henry,
    Volt,
    Ampere,
    Hertz,
    Second,
    Degree,
}

impl Unit {
    pub fn symbol(&self) -> &'static str {
        match self {
            Unit::Ohm => "Ω",
            Unit::Farad => "F",
            Unit::Henry => "H",
            Unit::Volt => "V",
            Unit::Ampere => "A",
            Unit::Hertz => "Hz",
            Unit::Second => "s",
            Unit::Degree => "°",
        }
    }
}

/// Scale suffixes and their decimal exponents, largest first.
const SCALES: [(&str, i32); 9] = [
    ("t", 12),
    ("g", 9),
    ("meg", 6),
    ("k", 3),
    ("", 0),
    ("m", -3),
    ("u", -6),
    ("n", -9),
    ("p", -12),
];

/// Parse a SPICE value token such as `10k`, `1.5meg`, `100nF` or `5V`.
pub fn parse_spice_value(token: &str) -> Option<f64> {
    let trimmed = token.trim();
    let split = numeric_prefix_len(trimmed);
    if split == 0 {
        return None;
    }
    let mantissa = &trimmed[..split];
    let number = mantissa.parse::<f64>().ok()?;
    let suffix = trimmed[split..].to_ascii_lowercase();

    if suffix.starts_with("mil") {
        return Some(number * 25.4e-6);
    }
    let exponent = if suffix.starts_with("meg") {
        6
    } else {
        match suffix.chars().next() {
            Some('f') => -15,
            Some('p') => -12,
            Some('n') => -9,
            Some('u') | Some('µ') => -6,
            Some('m') => -3,
            Some('k') => 3,
            Some('g') => 9,
            Some('t') => 12,
            _ => 0,
        }
    };
    if exponent == 0 {
        return Some(number);
    }
    // one decimal rounding: "100n" reads exactly as 100e-9
    if mantissa.contains(|c| c == 'e' || c == 'E') {
        Some(number * 10f64.powi(exponent))
    } else {
        format!("{}e{}", mantissa, exponent).parse().ok()
    }
}

fn numeric_prefix_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let mut idx = 0;
    if idx < bytes.len() && (bytes[idx] == b'+' || bytes[idx] == b'-') {
        idx += 1;
    }
    let digits_start = idx;
    while idx < bytes.len() && (bytes[idx].is_ascii_digit() || bytes[idx] == b'.') {
        idx += 1;
    }
    if idx == digits_start {
        return 0;
    }
    // exponent only when followed by digits, so "1e" is not swallowed
    if idx < bytes.len() && (bytes[idx] == b'e' || bytes[idx] == b'E') {
        let mut exp = idx + 1;
        if exp < bytes.len() && (bytes[exp] == b'+' || bytes[exp] == b'-') {
            exp += 1;
        }
        if exp < bytes.len() && bytes[exp].is_ascii_digit() {
            while exp < bytes.len() && bytes[exp].is_ascii_digit() {
                exp += 1;
            }
            idx = exp;
        }
    }
    idx
}

/// Render a value in engineering notation with a SPICE scale suffix.
///
/// The mantissa is the shortest one that parses back to exactly `value`.
/// Values outside the suffix range, or without an exact suffixed form, fall
/// back to exponent notation.
pub fn format_spice_value(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    let magnitude = value.abs();
    if !(1e-15..1e15).contains(&magnitude) {
        return format!("{:e}", value);
    }
    let (suffix, exponent) = SCALES
        .iter()
        .copied()
        .find(|(_, exponent)| magnitude >= 10f64.powi(*exponent) * (1.0 - 1e-12))
        .unwrap_or(("f", -15));
    let mantissa = value / 10f64.powi(exponent);
    (0..=17)
        .map(|digits| trim_mantissa(format!("{:.*}", digits, mantissa)))
        .map(|text| format!("{}{}", text, suffix))
        .find(|token| parse_spice_value(token) == Some(value))
        .unwrap_or_else(|| format!("{:e}", value))
}

fn trim_mantissa(text: String) -> String {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text
    }
}
