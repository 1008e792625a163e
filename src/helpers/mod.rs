pub mod datetime;
pub mod json;

use alloy::primitives::{
    U256,
    utils::{ParseUnits, Unit, format_units, parse_ether},
};
use eyre::{Result, bail, eyre};

pub fn format_unit<T>(amount: &T, decimals: u8) -> String
where
    T: Into<ParseUnits> + Copy,
{
    let eth_str = format_units(*amount, decimals).unwrap_or_default();
    match eth_str.split_once('.') {
        Some((whole, fractional)) => {
            let mut fractional = fractional.to_string();
            fractional.truncate(10);
            format!("{}.{}", whole, fractional)
        }
        None => eth_str,
    }
}

pub fn format_eth<T>(amount: &T) -> String
where
    T: Into<ParseUnits> + Copy,
{
    format_unit(amount, 18)
}

/// Fractional eth as entered on the command line into whole gwei
pub fn eth_to_gwei(eth: f64) -> Result<u64> {
    if !eth.is_finite() || eth < 0.0 {
        bail!("invalid eth amount {}", eth)
    }
    let wei = parse_ether(&eth.to_string())?;
    if wei % Unit::GWEI.wei() != U256::ZERO {
        bail!("eth amount {} is not a whole number of gwei", eth)
    }
    u64::try_from(wei / Unit::GWEI.wei()).map_err(|_| eyre!("eth amount {} is too large", eth))
}

/// Decimal or 0x prefixed hex salt
pub fn parse_salt(salt: &str) -> Result<U256> {
    let salt = salt.trim();
    let parsed = match salt.strip_prefix("0x") {
        Some(hex) => U256::from_str_radix(hex, 16),
        None => U256::from_str_radix(salt, 10),
    };
    parsed.map_err(|e| eyre!("invalid salt '{}': {}", salt, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eth_amounts() {
        assert_eq!(eth_to_gwei(16.0).unwrap(), 16_000_000_000);
        assert_eq!(eth_to_gwei(0.0).unwrap(), 0);
        assert_eq!(eth_to_gwei(0.5).unwrap(), 500_000_000);
        assert!(eth_to_gwei(-1.0).is_err());
        assert!(eth_to_gwei(0.0000000001).is_err());
    }

    #[test]
    fn salts() {
        assert_eq!(parse_salt("0").unwrap(), U256::ZERO);
        assert_eq!(parse_salt("42").unwrap(), U256::from(42));
        assert_eq!(parse_salt("0x2a").unwrap(), U256::from(42));
        assert!(parse_salt("salty").is_err());
    }

    #[test]
    fn eth_formatting() {
        assert_eq!(format_eth(&U256::from(1_500_000_000_000_000_000u64)), "1.5000000000");
    }
}
