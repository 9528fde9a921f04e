use ethers::types::Address;
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

use crate::address::{parse_address, ADDRESS_LENGTH};
use crate::staking::StakeMode;
use crate::tokens::Token;

/// Smallest amount the mixer accepts, in ETH.
pub const TRANSFER_MIN_AMOUNT: f64 = 0.003;

/// Smallest amount the staking form accepts, in tokens.
pub const STAKE_MIN_AMOUNT: f64 = 0.00001;

const REQUIRED: &str = "This field is required";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    RecipientWallet,
    Amount,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::RecipientWallet => f.write_str("recipient_wallet"),
            Field::Amount => f.write_str("amount"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    pub field: Field,
    pub message: String,
}

impl FieldError {
    pub fn new(field: Field, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// At most one error per field; the first failing rule wins.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.0
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn push(&mut self, field: Field, message: impl Into<String>) {
        if self.get(field).is_none() {
            self.0.push(FieldError::new(field, message));
        }
    }
}

impl From<Vec<FieldError>> for ValidationErrors {
    fn from(errors: Vec<FieldError>) -> Self {
        let mut out = Self::default();
        for e in errors {
            out.push(e.field, e.message);
        }
        out
    }
}

/// An amount as typed: either a JSON number or a numeric string.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
#[serde(untagged)]
pub enum AmountInput {
    Number(f64),
    Text(String),
}

impl AmountInput {
    /// Numeric value, or `None` when blank or not a finite number.
    pub fn value(&self) -> Option<f64> {
        let v = match self {
            AmountInput::Number(n) => *n,
            AmountInput::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        v.is_finite().then_some(v)
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct TransferInput {
    #[serde(default)]
    #[schema(example = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed")]
    pub recipient_wallet: Option<String>,
    #[serde(default)]
    pub amount: Option<AmountInput>,
    #[serde(default)]
    pub source_token: Token,
    #[serde(default)]
    pub destination_token: Token,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidTransfer {
    pub recipient: Address,
    pub amount: f64,
    pub source_token: Token,
    pub destination_token: Token,
}

fn default_stake() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct StakeInput {
    /// `true` stakes, `false` unstakes.
    #[serde(default = "default_stake")]
    pub stake: bool,
    #[serde(default)]
    pub amount: Option<AmountInput>,
}

impl Default for StakeInput {
    fn default() -> Self {
        Self {
            stake: true,
            amount: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidStake {
    pub mode: StakeMode,
    pub amount: f64,
}

fn check_amount(amount: Option<&AmountInput>, min: f64, available: f64) -> Result<f64, String> {
    let value = amount.and_then(AmountInput::value).ok_or(REQUIRED)?;
    if value < min {
        return Err(format!("Amount should be bigger than {min}"));
    }
    if value > available {
        return Err(format!("Amount should not be bigger than {available}"));
    }
    Ok(value)
}

fn check_recipient(recipient: Option<&str>) -> Result<Address, &'static str> {
    let recipient = recipient.unwrap_or_default();
    if recipient.is_empty() {
        return Err("Recipient Wallet Address is missing");
    }
    if recipient.len() < ADDRESS_LENGTH {
        return Err("Recipient Wallet Address is too short");
    }
    if recipient.len() > ADDRESS_LENGTH {
        return Err("Recipient Wallet Address is too long");
    }
    parse_address(recipient).ok_or("Wallet address is invalid")
}

/// Validate the transfer form against the sender's available balance.
pub fn validate_transfer(
    input: &TransferInput,
    available: f64,
) -> Result<ValidTransfer, ValidationErrors> {
    let mut errors = ValidationErrors::default();

    let recipient = check_recipient(input.recipient_wallet.as_deref())
        .map_err(|m| errors.push(Field::RecipientWallet, m))
        .ok();
    let amount = check_amount(input.amount.as_ref(), TRANSFER_MIN_AMOUNT, available)
        .map_err(|m| errors.push(Field::Amount, m))
        .ok();

    match (recipient, amount) {
        (Some(recipient), Some(amount)) => Ok(ValidTransfer {
            recipient,
            amount,
            source_token: input.source_token,
            destination_token: input.destination_token,
        }),
        _ => Err(errors),
    }
}

/// Validate the staking form against the token balance. The same bounds
/// apply to both directions of the toggle.
pub fn validate_stake(input: &StakeInput, available: f64) -> Result<ValidStake, ValidationErrors> {
    let amount = check_amount(input.amount.as_ref(), STAKE_MIN_AMOUNT, available)
        .map_err(|m| ValidationErrors::from(vec![FieldError::new(Field::Amount, m)]))?;
    Ok(ValidStake {
        mode: StakeMode::from_toggle(input.stake),
        amount,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const GOOD: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";

    fn transfer(recipient: &str, amount: Option<AmountInput>) -> TransferInput {
        TransferInput {
            recipient_wallet: Some(recipient.to_string()),
            amount,
            ..Default::default()
        }
    }

    fn num(v: f64) -> Option<AmountInput> {
        Some(AmountInput::Number(v))
    }

    #[test]
    fn test_valid_transfer() {
        let valid = validate_transfer(&transfer(GOOD, num(0.5)), 1.0).unwrap();
        assert_eq!(valid.amount, 0.5);
        assert_eq!(valid.source_token, Token::Eth);
        assert_eq!(format!("{:?}", valid.recipient).len(), 42);
    }

    #[test]
    fn test_recipient_messages() {
        let cases = [
            ("", "Recipient Wallet Address is missing"),
            ("0x1234", "Recipient Wallet Address is too short"),
            (
                "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed00",
                "Recipient Wallet Address is too long",
            ),
            (
                "0xzzAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
                "Wallet address is invalid",
            ),
        ];
        for (recipient, message) in cases {
            let errors = validate_transfer(&transfer(recipient, num(0.5)), 1.0).unwrap_err();
            assert_eq!(errors.get(Field::RecipientWallet), Some(message), "{recipient}");
            assert_eq!(errors.get(Field::Amount), None);
        }
    }

    #[test]
    fn test_missing_recipient_field() {
        let input = TransferInput {
            amount: num(0.5),
            ..Default::default()
        };
        let errors = validate_transfer(&input, 1.0).unwrap_err();
        assert_eq!(
            errors.get(Field::RecipientWallet),
            Some("Recipient Wallet Address is missing")
        );
    }

    #[test]
    fn test_transfer_amount_bounds() {
        let available = 1.25;
        assert!(validate_transfer(&transfer(GOOD, num(0.003)), available).is_ok());
        assert!(validate_transfer(&transfer(GOOD, num(available)), available).is_ok());

        let below = validate_transfer(&transfer(GOOD, num(0.0029)), available).unwrap_err();
        assert_eq!(
            below.get(Field::Amount),
            Some("Amount should be bigger than 0.003")
        );

        let above = validate_transfer(&transfer(GOOD, num(1.26)), available).unwrap_err();
        assert_eq!(
            above.get(Field::Amount),
            Some("Amount should not be bigger than 1.25")
        );
    }

    #[test]
    fn test_amount_required() {
        for amount in [
            None,
            Some(AmountInput::Text(String::new())),
            Some(AmountInput::Text("abc".into())),
        ] {
            let errors = validate_transfer(&transfer(GOOD, amount), 1.0).unwrap_err();
            assert_eq!(errors.get(Field::Amount), Some("This field is required"));
        }
    }

    #[test]
    fn test_both_fields_reported() {
        let errors = validate_transfer(&transfer("", None), 1.0).unwrap_err();
        assert_eq!(errors.iter().count(), 2);
    }

    #[test]
    fn test_amount_text_parsed() {
        let amount = AmountInput::Text(" 0.75 ".into());
        assert_eq!(amount.value(), Some(0.75));
        let valid = validate_transfer(&transfer(GOOD, Some(amount)), 1.0).unwrap();
        assert_eq!(valid.amount, 0.75);
    }

    #[test]
    fn test_stake_bounds() {
        let input = |v: f64, stake: bool| StakeInput {
            stake,
            amount: num(v),
        };
        assert!(validate_stake(&input(0.00001, true), 10.0).is_ok());
        assert!(validate_stake(&input(10.0, false), 10.0).is_ok());
        let low = validate_stake(&input(0.000009, true), 10.0).unwrap_err();
        assert_eq!(
            low.get(Field::Amount),
            Some("Amount should be bigger than 0.00001")
        );
        assert!(validate_stake(&input(10.5, false), 10.0).is_err());
    }

    #[test]
    fn test_stake_toggle_maps_to_mode() {
        let stake = StakeInput {
            stake: false,
            amount: num(1.0),
        };
        assert_eq!(
            validate_stake(&stake, 2.0).unwrap().mode,
            StakeMode::Unstake
        );
    }

    #[test]
    fn test_stake_input_defaults_to_stake() {
        let input: StakeInput = serde_json::from_str(r#"{"amount": "3"}"#).unwrap();
        assert!(input.stake);
        assert_eq!(input.amount.and_then(|a| a.value()), Some(3.0));
    }

    #[test]
    fn test_errors_keep_first_message_per_field() {
        let errors = ValidationErrors::from(vec![
            FieldError::new(Field::Amount, "first"),
            FieldError::new(Field::Amount, "second"),
        ]);
        assert_eq!(errors.iter().count(), 1);
        assert_eq!(errors.get(Field::Amount), Some("first"));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]
        #[test]
        fn test_transfer_amount_accepted_iff_in_bounds(
            available in 0.0f64..1_000_000.0,
            amount in -1.0f64..2_000_000.0,
        ) {
            let result = validate_transfer(&transfer(GOOD, num(amount)), available);
            let in_bounds = amount >= TRANSFER_MIN_AMOUNT && amount <= available;
            prop_assert_eq!(result.is_ok(), in_bounds);
        }

        #[test]
        fn test_stake_amount_accepted_iff_in_bounds(
            available in 0.0f64..1_000_000.0,
            amount in -1.0f64..2_000_000.0,
            stake in any::<bool>(),
        ) {
            let input = StakeInput { stake, amount: num(amount) };
            let in_bounds = amount >= STAKE_MIN_AMOUNT && amount <= available;
            prop_assert_eq!(validate_stake(&input, available).is_ok(), in_bounds);
        }
    }
}
