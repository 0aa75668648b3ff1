// Unit conversion between decimal token amounts and base units (10^18 per unit)

use crate::error::{HarnessError, Result};

/// Decimal places of one unit
pub const DECIMALS: u32 = 18;

const SCALE: i128 = 1_000_000_000_000_000_000;

/// Parse a decimal amount such as `"0.01"`, `"10"` or `"-3"` into base units
///
/// Signed on purpose: tests send negative amounts to check they are refused.
pub fn to_base_units(amount: &str) -> Result<i128> {
    let invalid = || HarnessError::Amount(amount.to_string());

    let trimmed = amount.trim();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };

    let (whole, frac) = match digits.split_once('.') {
        Some((w, f)) => (w, f),
        None => (digits, ""),
    };

    if whole.is_empty() && frac.is_empty() {
        return Err(invalid());
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    if frac.len() > DECIMALS as usize {
        return Err(HarnessError::Amount(format!(
            "{} has more than {} decimals",
            amount, DECIMALS
        )));
    }

    let whole: i128 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid())?
    };
    let frac: i128 = if frac.is_empty() {
        0
    } else {
        let padded = format!("{:0<width$}", frac, width = DECIMALS as usize);
        padded.parse().map_err(|_| invalid())?
    };

    let value = whole
        .checked_mul(SCALE)
        .and_then(|w| w.checked_add(frac))
        .ok_or_else(invalid)?;

    Ok(if negative { -value } else { value })
}

/// Render base units as the shortest decimal amount
pub fn from_base_units(value: i128) -> String {
    let sign = if value < 0 { "-" } else { "" };
    let magnitude = value.unsigned_abs();
    let scale = SCALE as u128;
    let whole = magnitude / scale;
    let frac = magnitude % scale;

    if frac == 0 {
        format!("{}{}", sign, whole)
    } else {
        let digits = format!("{:018}", frac);
        format!("{}{}.{}", sign, whole, digits.trim_end_matches('0'))
    }
}
