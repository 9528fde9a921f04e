use serde::Deserialize;
use utoipa::ToSchema;

use crate::units::floor_to;

/// Percentages offered as buttons under the amount field.
pub const SHORTCUT_PERCENTAGES: [u32; 4] = [25, 50, 75, 100];

/// 100% on the transfer form leaves a sliver so the amount stays strictly
/// below the balance.
const TRANSFER_FULL_PERCENTAGE: f64 = 99.99999;

const SHORTCUT_PRECISION: i32 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormKind {
    Transfer,
    Stake,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ShortcutRequest {
    #[schema(example = 25)]
    pub percentage: f64,
}

/// Amount filled in by a percentage button, or `None` for a percentage
/// outside `(0, 100]`.
pub fn shortcut_amount(percentage: f64, available: f64, form: FormKind) -> Option<f64> {
    if !(percentage > 0.0 && percentage <= 100.0) {
        return None;
    }
    let available = if available.is_finite() && available > 0.0 {
        available
    } else {
        0.0
    };
    let percentage = match form {
        FormKind::Transfer if percentage == 100.0 => TRANSFER_FULL_PERCENTAGE,
        _ => percentage,
    };
    let amount = floor_to(available * percentage / 100.0, SHORTCUT_PRECISION);
    Some(amount.min(available).max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::{from_base_units, to_base_units};
    use ethers::types::U256;
    use proptest::prelude::*;
    use crate::validation::{
        validate_stake, validate_transfer, AmountInput, StakeInput, TransferInput,
    };

    const BALANCES: [f64; 8] = [
        0.003,
        0.0123,
        0.1,
        1.0,
        1.999,
        3.14159265358979,
        12_345.678,
        1e9 + 0.5,
    ];

    #[test]
    fn test_quarter_and_half() {
        assert_eq!(shortcut_amount(25.0, 2.0, FormKind::Stake), Some(0.5));
        assert_eq!(shortcut_amount(50.0, 2.0, FormKind::Transfer), Some(1.0));
    }

    #[test]
    fn test_transfer_full_is_below_balance() {
        let amount = shortcut_amount(100.0, 2.0, FormKind::Transfer).unwrap();
        assert!(amount < 2.0);
        assert!(amount > 1.9999);
    }

    #[test]
    fn test_stake_full_is_whole_balance() {
        assert_eq!(shortcut_amount(100.0, 2.0, FormKind::Stake), Some(2.0));
    }

    #[test]
    fn test_out_of_range_percentage() {
        assert_eq!(shortcut_amount(0.0, 1.0, FormKind::Stake), None);
        assert_eq!(shortcut_amount(101.0, 1.0, FormKind::Stake), None);
        assert_eq!(shortcut_amount(f64::NAN, 1.0, FormKind::Stake), None);
    }

    #[test]
    fn test_no_balance_gives_zero() {
        assert_eq!(shortcut_amount(50.0, 0.0, FormKind::Transfer), Some(0.0));
        assert_eq!(shortcut_amount(50.0, f64::NAN, FormKind::Transfer), Some(0.0));
    }

    #[test]
    fn test_full_never_exceeds_upper_bound() {
        for available in BALANCES {
            for form in [FormKind::Transfer, FormKind::Stake] {
                let amount = shortcut_amount(100.0, available, form).unwrap();
                assert!(amount <= available, "{form:?} {available} -> {amount}");
            }

            let stake = StakeInput {
                stake: true,
                amount: Some(AmountInput::Number(
                    shortcut_amount(100.0, available, FormKind::Stake).unwrap(),
                )),
            };
            assert!(validate_stake(&stake, available).is_ok(), "stake {available}");

            let transfer = TransferInput {
                recipient_wallet: Some("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed".into()),
                amount: Some(AmountInput::Number(
                    shortcut_amount(100.0, available, FormKind::Transfer).unwrap(),
                )),
                ..Default::default()
            };
            let result = validate_transfer(&transfer, available);
            if let Err(errors) = result {
                // Only the lower bound may trip, for balances at the minimum.
                let message = errors
                    .get(crate::validation::Field::Amount)
                    .unwrap_or_default();
                assert!(message.starts_with("Amount should be bigger"), "{available}: {message}");
            }
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]
        #[test]
        fn test_full_stake_fits_any_token_balance(
            raw in any::<u128>(),
            decimals in 0u32..=18,
        ) {
            let balance = U256::from(raw);
            let available = from_base_units(balance, decimals).unwrap();
            let amount = shortcut_amount(100.0, available, FormKind::Stake).unwrap();

            prop_assert!(amount <= available);
            prop_assert!(to_base_units(amount, decimals).unwrap() <= balance);

            let input = StakeInput { stake: true, amount: Some(AmountInput::Number(amount)) };
            match validate_stake(&input, available) {
                Ok(_) => {}
                Err(errors) => {
                    let message = errors.get(crate::validation::Field::Amount).unwrap_or_default();
                    prop_assert!(message.starts_with("Amount should be bigger"), "{}", message);
                }
            }
        }

        #[test]
        fn test_any_shortcut_stays_within_balance(
            percentage in 0.001f64..=100.0,
            available in 0.0f64..1e12,
        ) {
            for form in [FormKind::Transfer, FormKind::Stake] {
                let amount = shortcut_amount(percentage, available, form).unwrap();
                prop_assert!(amount >= 0.0);
                prop_assert!(amount <= available);
            }
        }
    }
}
