use alloy::primitives::U256;
use alloy::primitives::utils::{ParseUnits, parse_units};

use crate::data::types::{CostTier, GasOracle};
use crate::error::{AppError, Result};

/// Token operations we can estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenOp {
    Transfer,
    Approve,
}

impl TokenOp {
    pub fn name(self) -> &'static str {
        match self {
            TokenOp::Transfer => "transfer",
            TokenOp::Approve => "approve",
        }
    }
}

/// Scale a human decimal amount (e.g. "12.5") by `decimals`, exactly.
pub fn parse_amount(amount: &str, decimals: u8) -> Result<U256> {
    let trimmed = amount.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation("amount is required"));
    }
    let fraction = trimmed.split_once('.').map_or(0, |(_, f)| f.len());
    if fraction > decimals as usize {
        return Err(AppError::validation(format!(
            "{trimmed} has more than {decimals} decimal places"
        )));
    }
    match parse_units(trimmed, decimals) {
        Ok(ParseUnits::U256(value)) => Ok(value),
        Ok(ParseUnits::I256(_)) => Err(AppError::validation(format!(
            "amount must not be negative: {trimmed}"
        ))),
        Err(e) => Err(AppError::validation(format!("invalid amount {trimmed:?}: {e}"))),
    }
}

/// Oracle price (decimal Gwei string) to wei. Fractions below one wei are dropped.
pub fn gwei_to_wei(price: &str) -> Result<U256> {
    let trimmed = price.trim();
    let whole_wei = match trimmed.split_once('.') {
        Some((whole, fraction)) if fraction.len() > 9 => match fraction.get(..9) {
            Some(kept) => format!("{whole}.{kept}"),
            None => trimmed.to_string(),
        },
        _ => trimmed.to_string(),
    };
    parse_amount(&whole_wei, 9)
        .map_err(|_| AppError::MalformedResponse(format!("invalid gas price {price:?}")))
}

/// Fee for `gas_units` at each oracle tier.
pub fn cost_tiers(gas_units: u64, oracle: &GasOracle) -> Result<Vec<CostTier>> {
    [
        ("safe", &oracle.safe_gas_price),
        ("propose", &oracle.propose_gas_price),
        ("fast", &oracle.fast_gas_price),
    ]
    .into_iter()
    .map(|(label, price)| {
        let cost_wei = gwei_to_wei(price)?
            .checked_mul(U256::from(gas_units))
            .ok_or_else(|| AppError::MalformedResponse(format!("{label} cost overflows")))?;
        Ok(CostTier {
            label,
            price_gwei: price.clone(),
            cost_wei,
        })
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oracle() -> GasOracle {
        GasOracle {
            last_block: "19000000".to_string(),
            safe_gas_price: "0.5".to_string(),
            propose_gas_price: "0.62".to_string(),
            fast_gas_price: "12".to_string(),
            suggest_base_fee: "0.48".to_string(),
        }
    }

    #[test]
    fn test_parse_amount_exact() {
        assert_eq!(parse_amount("12.5", 6).unwrap(), U256::from(12_500_000u64));
        assert_eq!(parse_amount("0.000001", 6).unwrap(), U256::from(1u64));
        assert_eq!(
            parse_amount("1", 18).unwrap(),
            U256::from(1_000_000_000_000_000_000u128)
        );
    }

    #[test]
    fn test_parse_amount_rejects_bad_input() {
        for bad in ["", "abc", "-1", "0.0000001"] {
            assert!(
                matches!(parse_amount(bad, 6), Err(AppError::Validation(_))),
                "{bad}"
            );
        }
    }

    #[test]
    fn test_gwei_to_wei() {
        assert_eq!(gwei_to_wei("0.62").unwrap(), U256::from(620_000_000u64));
        assert!(matches!(
            gwei_to_wei("n/a"),
            Err(AppError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_cost_tiers() {
        let tiers = cost_tiers(46_109, &oracle()).unwrap();
        let labels: Vec<&str> = tiers.iter().map(|t| t.label).collect();
        assert_eq!(labels, vec!["safe", "propose", "fast"]);
        assert_eq!(tiers[0].cost_wei, U256::from(46_109u64 * 500_000_000));
        assert_eq!(tiers[1].cost_wei, U256::from(46_109u64 * 620_000_000));
        assert_eq!(tiers[2].cost_wei, U256::from(46_109u64 * 12_000_000_000));
        assert_eq!(tiers[2].price_gwei, "12");
    }

    #[test]
    fn test_gwei_to_wei_truncates_below_one_wei() {
        assert_eq!(
            gwei_to_wei("0.0123456789").unwrap(),
            U256::from(12_345_678u64)
        );
        assert_eq!(gwei_to_wei("1.0000000009").unwrap(), U256::from(1_000_000_000u64));
    }

    #[test]
    fn test_cost_tiers_accept_long_fractions() {
        let mut precise = oracle();
        precise.safe_gas_price = "0.0123456789".to_string();
        let tiers = cost_tiers(21_000, &precise).unwrap();
        assert_eq!(tiers[0].cost_wei, U256::from(21_000u64 * 12_345_678));
        assert_eq!(tiers[0].price_gwei, "0.0123456789");
    }

    #[test]
    fn test_cost_tiers_bad_oracle() {
        let mut bad = oracle();
        bad.fast_gas_price = String::new();
        assert!(cost_tiers(21_000, &bad).is_err());
    }
}
