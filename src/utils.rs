//! Utility functions for land-sale operations.
//!
//! Fixed-point conversion between the decimal price strings users type and the
//! integer smallest-unit amounts contracts expect, plus address helpers.

use crate::errors::{LandSaleError, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ethers::types::{Address, U256};
use std::str::FromStr;

/// Decimals of the native currency (wei per ether = 10^18).
pub const NATIVE_DECIMALS: u8 = 18;

/// Decimals of a bitcoin amount (satoshis).
pub const BTC_DECIMALS: u8 = 8;

/// Converts a decimal string to its smallest-unit integer using `decimals`
/// fixed-point digits.
///
/// Accepts plain decimal notation (`"1"`, `"1.25"`, `".5"`, `"2."`) with
/// surrounding whitespace and `_` digit separators. Signs, exponents and more
/// fractional digits than `decimals` are rejected.
///
/// # Examples
///
/// ```
/// use landsale_rs::utils::parse_units;
/// use ethers::types::U256;
///
/// let wei = parse_units("1.25", 18).unwrap();
/// assert_eq!(wei, U256::from(1_250_000_000_000_000_000u128));
///
/// let usdt = parse_units("25000", 6).unwrap();
/// assert_eq!(usdt, U256::from(25_000_000_000u64));
/// ```
pub fn parse_units(amount: &str, decimals: u8) -> Result<U256> {
    let cleaned = amount.trim().replace('_', "");
    let invalid = || LandSaleError::InvalidAmount(format!("'{}' is not a decimal number", amount));

    let (whole, fraction) = match cleaned.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (cleaned.as_str(), ""),
    };

    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid());
    }
    if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    if fraction.len() > decimals as usize {
        return Err(LandSaleError::InvalidAmount(format!(
            "'{}' has more than {} decimal places",
            amount, decimals
        )));
    }

    let mut digits = String::with_capacity(whole.len() + decimals as usize);
    digits.push_str(whole);
    digits.push_str(fraction);
    digits.extend(std::iter::repeat('0').take(decimals as usize - fraction.len()));

    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(U256::zero());
    }

    U256::from_dec_str(digits)
        .map_err(|_| LandSaleError::InvalidAmount(format!("'{}' is out of range", amount)))
}

/// Like [`parse_units`] but rejects zero.
pub fn parse_positive_units(amount: &str, decimals: u8) -> Result<U256> {
    let value = parse_units(amount, decimals)?;
    if value.is_zero() {
        return Err(LandSaleError::InvalidAmount(format!(
            "'{}' must be greater than zero",
            amount
        )));
    }
    Ok(value)
}

/// Renders a smallest-unit amount as a decimal string without trailing zeros.
///
/// # Examples
///
/// ```
/// use landsale_rs::utils::format_units;
/// use ethers::types::U256;
///
/// assert_eq!(format_units(U256::from(25_000_000_000u64), 6), "25000");
/// assert_eq!(format_units(U256::from(1_250_000_000_000_000_000u128), 18), "1.25");
/// ```
pub fn format_units(value: U256, decimals: u8) -> String {
    let digits = value.to_string();
    let decimals = decimals as usize;

    if decimals == 0 {
        return digits;
    }

    let padded = if digits.len() <= decimals {
        format!("{}{}", "0".repeat(decimals - digits.len() + 1), digits)
    } else {
        digits
    };

    let (whole, fraction) = padded.split_at(padded.len() - decimals);
    let fraction = fraction.trim_end_matches('0');

    if fraction.is_empty() {
        whole.to_string()
    } else {
        format!("{}.{}", whole, fraction)
    }
}

/// Validates and parses an Ethereum address.
///
/// # Examples
///
/// ```
/// use landsale_rs::utils::parse_address;
///
/// assert!(parse_address("0xdAC17F958D2ee523a2206206994597C13D831ec7").is_ok());
/// assert!(parse_address("0xYourMainnetContractAddressHere").is_err());
/// ```
pub fn parse_address(addr: &str) -> Result<Address> {
    let trimmed = addr.trim();
    if !trimmed.starts_with("0x") && !trimmed.starts_with("0X") {
        return Err(LandSaleError::InvalidAddress(format!("{}: missing 0x prefix", addr)));
    }
    Address::from_str(trimmed).map_err(|e| LandSaleError::InvalidAddress(format!("{}: {}", addr, e)))
}

/// Whether `addr` is a well-formed `0x` address.
pub fn is_address(addr: &str) -> bool {
    parse_address(addr).is_ok()
}

/// Formats an address in checksummed form.
pub fn address_to_string(addr: Address) -> String {
    ethers::utils::to_checksum(&addr, None)
}

/// Wraps a JSON document into a `data:application/json;base64,` URI.
pub fn json_data_uri(json: &str) -> String {
    format!("data:application/json;base64,{}", BASE64.encode(json.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_units() {
        assert_eq!(
            parse_units("1.25", 18).unwrap(),
            U256::from(1_250_000_000_000_000_000u128)
        );
        assert_eq!(parse_units("25000", 6).unwrap(), U256::from(25_000_000_000u64));
        assert_eq!(parse_units(" .5 ", 6).unwrap(), U256::from(500_000u64));
        assert_eq!(parse_units("2.", 6).unwrap(), U256::from(2_000_000u64));
        assert_eq!(parse_units("1_000", 0).unwrap(), U256::from(1000u64));
        assert_eq!(parse_units("0.000", 6).unwrap(), U256::zero());
    }

    #[test]
    fn test_parse_units_rejects_garbage() {
        for bad in ["", ".", "abc", "-1", "+1", "1e3", "1.2.3", "NaN", "Infinity", "0x10"] {
            assert!(
                matches!(parse_units(bad, 18), Err(LandSaleError::InvalidAmount(_))),
                "accepted {:?}",
                bad
            );
        }
        assert!(parse_units("0.1234567", 6).is_err());
    }

    #[test]
    fn test_parse_positive_units() {
        assert!(parse_positive_units("0", 18).is_err());
        assert!(parse_positive_units("0.0", 6).is_err());
        assert!(parse_positive_units("0.000001", 6).is_ok());
    }

    #[test]
    fn test_format_units() {
        assert_eq!(format_units(U256::zero(), 6), "0");
        assert_eq!(format_units(U256::from(1u64), 6), "0.000001");
        assert_eq!(format_units(U256::from(1_500_000u64), 6), "1.5");
        assert_eq!(format_units(U256::from(42u64), 0), "42");
    }

    #[test]
    fn test_units_display_round_trip() {
        for (input, decimals) in [("1.25", 18), ("0.015", 8), ("25000", 6), ("0.000001", 6)] {
            let value = parse_units(input, decimals).unwrap();
            assert_eq!(format_units(value, decimals), input);
        }
    }

    #[test]
    fn test_parse_units_is_monotonic() {
        let inputs = ["0.000001", "0.1", "0.5", "1", "1.000001", "2", "99.99", "100"];
        let values: Vec<U256> = inputs.iter().map(|s| parse_units(s, 6).unwrap()).collect();
        assert!(values.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_parse_address() {
        let addr = parse_address("0xdAC17F958D2ee523a2206206994597C13D831ec7").unwrap();
        assert_eq!(
            address_to_string(addr),
            "0xdAC17F958D2ee523a2206206994597C13D831ec7"
        );
        assert!(parse_address("dAC17F958D2ee523a2206206994597C13D831ec7").is_err());
        assert!(!is_address("invalid"));
        assert!(!is_address(""));
    }

    #[test]
    fn test_json_data_uri() {
        let uri = json_data_uri("{}");
        assert_eq!(uri, "data:application/json;base64,e30=");
    }
}
