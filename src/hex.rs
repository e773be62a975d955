use std::num::ParseIntError;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HexError {
    #[error("no digits")]
    Empty,
    #[error("invalid character {0:?}")]
    InvalidDigit(char),
    #[error("underscores may only separate digits")]
    Underscore,
    #[error(transparent)]
    Int(#[from] ParseIntError),
}

/// Parses a 32-bit value written in hexadecimal.
///
/// Surrounding whitespace and a `0x`/`0X` prefix are accepted, and single
/// underscores may separate digits (`0x0A0B_0C0D`). Values wider than 32 bits
/// are rejected.
pub fn parse_hex(text: &str) -> Result<u32, HexError> {
    let trimmed = text.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if digits.is_empty() {
        return Err(HexError::Empty);
    }
    if let Some(c) = digits.chars().find(|c| !c.is_ascii_hexdigit() && *c != '_') {
        return Err(HexError::InvalidDigit(c));
    }
    if digits.starts_with('_') || digits.ends_with('_') || digits.contains("__") {
        return Err(HexError::Underscore);
    }

    let digits: String = digits.chars().filter(|&c| c != '_').collect();
    Ok(u32::from_str_radix(&digits, 16)?)
}
