use ethers::types::U256;
use ethers::utils::{format_units, parse_units};
use thiserror::Error;

/// Decimals of the chain's native currency (wei per ether).
pub const NATIVE_DECIMALS: u32 = 18;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum UnitsError {
    #[error("Amount must be a finite, non-negative number: {0}")]
    InvalidAmount(f64),

    #[error("Amount must be a whole number: {0}")]
    NotWhole(f64),

    #[error("Unit conversion failed: {0}")]
    Conversion(String),
}

/// Convert a display amount into base units of a token with `decimals`
/// decimals. Digits beyond the token's precision are truncated.
pub fn to_base_units(amount: f64, decimals: u32) -> Result<U256, UnitsError> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(UnitsError::InvalidAmount(amount));
    }

    // f64's Display never uses exponent notation, which parse_units requires.
    let text = amount.to_string();
    let text = match text.split_once('.') {
        Some((int, _)) if decimals == 0 => int.to_string(),
        Some((int, frac)) if frac.len() > decimals as usize => {
            format!("{}.{}", int, &frac[..decimals as usize])
        }
        _ => text,
    };

    let parsed =
        parse_units(&text, decimals).map_err(|e| UnitsError::Conversion(e.to_string()))?;
    Ok(U256::from(parsed))
}

/// Convert a base-unit value into a display amount.
///
/// The result is rounded down: converting it back with [`to_base_units`]
/// never yields more than `value`.
pub fn from_base_units(value: U256, decimals: u32) -> Result<f64, UnitsError> {
    let text = format_units(value, decimals).map_err(|e| UnitsError::Conversion(e.to_string()))?;
    let mut amount = text
        .parse::<f64>()
        .map_err(|e| UnitsError::Conversion(format!("{text}: {e}")))?;
    while amount > 0.0 && to_base_units(amount, decimals)? > value {
        amount = next_below(amount);
    }
    Ok(amount)
}

/// Largest `f64` strictly below a positive finite `value`.
fn next_below(value: f64) -> f64 {
    f64::from_bits(value.to_bits() - 1)
}

/// Interpret a display amount as a raw integer argument, without scaling.
pub fn raw_integer(amount: f64) -> Result<U256, UnitsError> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(UnitsError::InvalidAmount(amount));
    }
    if amount.fract() != 0.0 {
        return Err(UnitsError::NotWhole(amount));
    }
    to_base_units(amount, 0)
}

/// Round `value` down to `places` decimal places.
pub fn floor_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).floor() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_base_units_ether() {
        let wei = to_base_units(1.5, NATIVE_DECIMALS).unwrap();
        assert_eq!(wei, U256::from(1_500_000_000_000_000_000u128));
    }

    #[test]
    fn test_to_base_units_small_amount() {
        let wei = to_base_units(0.003, NATIVE_DECIMALS).unwrap();
        assert_eq!(wei, U256::from(3_000_000_000_000_000u128));
    }

    #[test]
    fn test_to_base_units_truncates_excess_precision() {
        let units = to_base_units(1.23456789, 6).unwrap();
        assert_eq!(units, U256::from(1_234_567u64));
    }

    #[test]
    fn test_to_base_units_zero_decimals() {
        assert_eq!(to_base_units(42.9, 0).unwrap(), U256::from(42u64));
    }

    #[test]
    fn test_to_base_units_rejects_negative_and_nan() {
        assert!(matches!(
            to_base_units(-1.0, 18),
            Err(UnitsError::InvalidAmount(_))
        ));
        assert!(to_base_units(f64::NAN, 18).is_err());
        assert!(to_base_units(f64::INFINITY, 18).is_err());
    }

    #[test]
    fn test_from_base_units() {
        let value = U256::from(2_500_000u64);
        assert!((from_base_units(value, 6).unwrap() - 2.5).abs() < 1e-12);
        assert_eq!(from_base_units(U256::zero(), 18).unwrap(), 0.0);
    }

    #[test]
    fn test_from_base_units_rounds_down() {
        let value = U256::from(299_999_999_999_999_990u64);
        let amount = from_base_units(value, 18).unwrap();
        assert!(amount < 0.3);
        assert!(to_base_units(amount, 18).unwrap() <= value);
    }

    #[test]
    fn test_from_base_units_exact_values_unchanged() {
        assert_eq!(from_base_units(U256::exp10(18), 18).unwrap(), 1.0);
        assert_eq!(from_base_units(U256::from(1_500_000u64), 6).unwrap(), 1.5);
        assert_eq!(from_base_units(U256::from(42u64), 0).unwrap(), 42.0);
    }

    #[test]
    fn test_raw_integer() {
        assert_eq!(raw_integer(5.0).unwrap(), U256::from(5u64));
        assert!(matches!(raw_integer(2.5), Err(UnitsError::NotWhole(_))));
    }

    #[test]
    fn test_floor_to() {
        assert_eq!(floor_to(1.23987, 3), 1.239);
        assert_eq!(floor_to(0.0129, 3), 0.012);
        assert_eq!(floor_to(5.0, 3), 5.0);
    }
}
