//! NEAR token amounts.
//!
//! The chain counts in yoctoNEAR (10^-24 NEAR); users type and read NEAR.

use crate::{errors::Error, Result};

pub const NEAR_NOMINATION_EXP: usize = 24;
pub const ONE_NEAR: u128 = 1_000_000_000_000_000_000_000_000;
pub const ONE_YOCTO: u128 = 1;

/// Parse a human NEAR amount (`"1"`, `"1.5"`, `"0.01"`, `"1,000"`) into yoctoNEAR.
pub fn parse_near_amount(input: &str) -> Result<u128> {
    let cleaned: String = input.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return Err(Error::InvalidInput("amount is empty".to_string()));
    }

    let (whole, frac) = match cleaned.split_once('.') {
        Some((w, f)) => (w, f),
        None => (cleaned.as_str(), ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(Error::InvalidInput(format!("not a number: {input}")));
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(Error::InvalidInput(format!("not a number: {input}")));
    }
    if frac.len() > NEAR_NOMINATION_EXP {
        return Err(Error::InvalidInput(format!(
            "at most {NEAR_NOMINATION_EXP} decimal places are supported"
        )));
    }

    let padded = format!("{frac:0<width$}", width = NEAR_NOMINATION_EXP);
    let digits = format!("{whole}{padded}");
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(0);
    }
    digits
        .parse::<u128>()
        .map_err(|_| Error::InvalidInput(format!("amount too large: {input}")))
}

/// Format yoctoNEAR as NEAR with thousands separators and no trailing zeros.
pub fn format_near_amount(yocto: u128) -> String {
    let whole = yocto / ONE_NEAR;
    let frac = yocto % ONE_NEAR;

    let whole = with_commas(&whole.to_string());
    if frac == 0 {
        return whole;
    }
    let frac = format!("{frac:0>width$}", width = NEAR_NOMINATION_EXP);
    format!("{whole}.{}", frac.trim_end_matches('0'))
}

fn with_commas(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_whole_and_fractional_amounts() {
        assert_eq!(parse_near_amount("1").unwrap(), ONE_NEAR);
        assert_eq!(parse_near_amount("1.5").unwrap(), ONE_NEAR + ONE_NEAR / 2);
        assert_eq!(parse_near_amount("0.01").unwrap(), ONE_NEAR / 100);
        assert_eq!(parse_near_amount(".5").unwrap(), ONE_NEAR / 2);
        assert_eq!(parse_near_amount(" 1,000 ").unwrap(), 1000 * ONE_NEAR);
        assert_eq!(parse_near_amount("0").unwrap(), 0);
        assert_eq!(
            parse_near_amount("0.000000000000000000000001").unwrap(),
            ONE_YOCTO
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_near_amount("").is_err());
        assert!(parse_near_amount(".").is_err());
        assert!(parse_near_amount("-1").is_err());
        assert!(parse_near_amount("1.2.3").is_err());
        assert!(parse_near_amount("abc").is_err());
        assert!(parse_near_amount("0.0000000000000000000000001").is_err());
    }

    #[test]
    fn formats_amounts() {
        assert_eq!(format_near_amount(0), "0");
        assert_eq!(format_near_amount(ONE_NEAR + ONE_NEAR / 2), "1.5");
        assert_eq!(format_near_amount(1234 * ONE_NEAR), "1,234");
        assert_eq!(format_near_amount(1_234_567 * ONE_NEAR), "1,234,567");
        assert_eq!(format_near_amount(ONE_YOCTO), "0.000000000000000000000001");
    }

    #[test]
    fn parse_then_format_is_stable() {
        for s in ["1.5", "0.01", "42", "1,234.000001"] {
            let y = parse_near_amount(s).unwrap();
            assert_eq!(format_near_amount(y), s);
        }
    }
}
