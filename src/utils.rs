use std::str::FromStr;

use alloy::primitives::{Address, U256};
use chrono::{DateTime, Utc};

use crate::error::{AppError, Result};

/// Parse a `0x`-prefixed 20-byte address, rejecting anything else before it
/// reaches the network.
pub fn parse_address(input: &str) -> Result<Address> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation("address is required"));
    }
    if !trimmed.starts_with("0x") || trimmed.len() != 42 {
        return Err(AppError::validation(format!("invalid address {trimmed:?}")));
    }
    Address::from_str(trimmed).map_err(|_| AppError::validation(format!("invalid address {trimmed:?}")))
}

/// Truncate an address-like string to "0xabcd...ef12" format
pub fn truncate_hex(s: &str) -> String {
    if s.len() > 14 {
        format!("{}...{}", &s[..8], &s[s.len() - 4..])
    } else {
        s.to_string()
    }
}

/// Format a base-unit amount as a decimal with the given number of decimals.
///
/// Exact: every significant fractional digit is kept.
pub fn format_u256_as_decimal(value: U256, decimals: u8) -> String {
    if value.is_zero() {
        return "0.0".to_string();
    }

    let divisor = U256::from(10u64).pow(U256::from(decimals));
    let whole = value / divisor;
    let remainder = value % divisor;

    if remainder.is_zero() {
        return format!("{whole}.0");
    }

    let remainder_str = format!("{remainder}");
    let padded = format!("{:0>width$}", remainder_str, width = decimals as usize);
    let trimmed = padded.trim_end_matches('0');
    format!("{whole}.{trimmed}")
}

/// Format a wei value in the chain's native unit, e.g. "1.5 ETH".
pub fn format_native(wei: U256, symbol: &str) -> String {
    format!("{} {symbol}", format_u256_as_decimal(wei, 18))
}

/// Format a wei value in Gwei.
pub fn format_gwei(wei: U256) -> String {
    format!("{} Gwei", format_u256_as_decimal(wei, 9))
}

/// Format a token amount, e.g. "12.5 USDT".
pub fn format_token(amount: U256, decimals: u8, symbol: &str) -> String {
    format!("{} {symbol}", format_u256_as_decimal(amount, decimals))
}

/// Format a number with comma separators
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Format a Unix timestamp as "Xm ago", "Xh ago", etc.
pub fn format_time_ago(timestamp: u64) -> String {
    format_time_ago_from(timestamp, Utc::now().timestamp().max(0) as u64)
}

fn format_time_ago_from(timestamp: u64, now: u64) -> String {
    if timestamp > now {
        return "just now".to_string();
    }
    let diff = now - timestamp;
    if diff < 60 {
        format!("{diff}s ago")
    } else if diff < 3600 {
        format!("{}m ago", diff / 60)
    } else if diff < 86400 {
        format!("{}h ago", diff / 3600)
    } else {
        format!("{}d ago", diff / 86400)
    }
}

/// Format a Unix timestamp as a datetime string
pub fn format_timestamp(timestamp: u64) -> String {
    i64::try_from(timestamp)
        .ok()
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
        .map(|dt| dt.format("%b %d, %Y %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address() {
        let addr = parse_address(" 0xdAC17F958D2ee523a2206206994597C13D831ec7 ").unwrap();
        assert_eq!(
            format!("{addr}"),
            "0xdAC17F958D2ee523a2206206994597C13D831ec7"
        );
    }

    #[test]
    fn test_parse_address_rejects_malformed() {
        for bad in ["", "0x1234", "dAC17F958D2ee523a2206206994597C13D831ec7", "0xZZC17F958D2ee523a2206206994597C13D831ec7"] {
            assert!(matches!(parse_address(bad), Err(AppError::Validation(_))), "{bad}");
        }
    }

    #[test]
    fn test_truncate_hex() {
        assert_eq!(
            truncate_hex("0xdac17f958d2ee523a2206206994597c13d831ec7"),
            "0xdac17f...1ec7"
        );
        assert_eq!(truncate_hex("0x1234"), "0x1234");
    }

    #[test]
    fn test_format_u256_as_decimal() {
        assert_eq!(format_u256_as_decimal(U256::ZERO, 6), "0.0");
        assert_eq!(format_u256_as_decimal(U256::from(1_000_000u64), 6), "1.0");
        assert_eq!(format_u256_as_decimal(U256::from(1_500_001u64), 6), "1.500001");
        assert_eq!(format_u256_as_decimal(U256::from(5u64), 18), "0.000000000000000005");
        assert_eq!(format_u256_as_decimal(U256::from(42u64), 0), "42.0");
    }

    #[test]
    fn test_unit_formatters() {
        assert_eq!(
            format_native(U256::from(1_500_000_000_000_000_000u128), "ETH"),
            "1.5 ETH"
        );
        assert_eq!(format_gwei(U256::from(620_000_000u64)), "0.62 Gwei");
        assert_eq!(format_token(U256::from(12_500_000u64), 6, "USDT"), "12.5 USDT");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(19_000_000), "19,000,000");
    }

    #[test]
    fn test_format_time_ago() {
        assert_eq!(format_time_ago_from(100, 130), "30s ago");
        assert_eq!(format_time_ago_from(0, 7200), "2h ago");
        assert_eq!(format_time_ago_from(200, 100), "just now");
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "Jan 01, 1970 00:00:00 UTC");
    }
}
