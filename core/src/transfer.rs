use ethers::types::Address;
use ethers::utils::to_checksum;
use rand::Rng;
use serde::Serialize;
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::contracts::Mixer;
use crate::display::format_number;
use crate::errors::AppError;
use crate::shortcut::{shortcut_amount, FormKind, SHORTCUT_PERCENTAGES};
use crate::tokens::Token;
use crate::tx_tracker::{Notice, TxTracker};
use crate::units::{floor_to, from_base_units, to_base_units, NATIVE_DECIMALS};
use crate::validation::{validate_transfer, TransferInput, TRANSFER_MIN_AMOUNT};
use crate::wallet::{require_account, Wallet};

/// Flat fee shown under the amount field, in ETH.
pub const TRANSFER_FEE: f64 = 0.002;

/// Number of mixing rounds is drawn uniformly from this range per transfer.
pub const MIXING_ROUNDS: RangeInclusive<u64> = 300..=800;

const BALANCE_DISPLAY_PLACES: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct Quote {
    pub amount: f64,
    pub fee: f64,
    pub you_get: f64,
}

/// Fee breakdown for `amount`; nothing is received below the fee.
pub fn quote(amount: f64) -> Quote {
    let you_get = if amount > TRANSFER_FEE {
        amount - TRANSFER_FEE
    } else {
        0.0
    };
    Quote {
        amount,
        fee: TRANSFER_FEE,
        you_get,
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TokenOption {
    pub token: Token,
    pub symbol: String,
    pub label: String,
}

impl From<Token> for TokenOption {
    fn from(token: Token) -> Self {
        Self {
            token,
            symbol: token.symbol().to_string(),
            label: token.label(),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TransferView {
    pub account: String,
    /// Native balance truncated to three decimals.
    pub available: f64,
    pub available_display: String,
    pub min_amount: f64,
    pub quote: Option<Quote>,
    pub tokens: Vec<TokenOption>,
    pub shortcuts: Vec<u32>,
    /// A submitted transfer has not settled yet; submitting is disabled.
    pub pending: bool,
    pub notices: Vec<Notice>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ShortcutResponse {
    pub amount: f64,
    pub quote: Quote,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TransferOutcome {
    pub tx_hash: String,
    pub recipient: String,
    pub rounds: u64,
    /// Attached value in wei, as a decimal string.
    pub value_wei: String,
    pub source_token: Token,
    pub destination_token: Token,
}

struct SubmitGuard<'a>(&'a AtomicBool);

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct TransferForm {
    wallet: Arc<dyn Wallet>,
    mixer: Mixer,
    tracker: Arc<TxTracker>,
    submitting: AtomicBool,
}

impl TransferForm {
    pub fn new(wallet: Arc<dyn Wallet>, mixer: Mixer, tracker: Arc<TxTracker>) -> Self {
        Self {
            wallet,
            mixer,
            tracker,
            submitting: AtomicBool::new(false),
        }
    }

    async fn available(&self, account: Address) -> Result<f64, AppError> {
        let wei = self.wallet.native_balance(account).await?;
        let ether = from_base_units(wei, NATIVE_DECIMALS)?;
        Ok(floor_to(ether, BALANCE_DISPLAY_PLACES))
    }

    /// Current form state. Queued notices are handed out here and not again.
    pub async fn view(&self, amount: Option<f64>) -> Result<TransferView, AppError> {
        let account = require_account(self.wallet.as_ref()).await?;
        let available = self.available(account).await?;

        Ok(TransferView {
            account: to_checksum(&account, None),
            available,
            available_display: format_number(available),
            min_amount: TRANSFER_MIN_AMOUNT,
            quote: amount.map(quote),
            tokens: Token::ALL.into_iter().map(TokenOption::from).collect(),
            shortcuts: SHORTCUT_PERCENTAGES.to_vec(),
            pending: self.tracker.is_pending().await,
            notices: self.tracker.take_notices().await,
        })
    }

    pub async fn shortcut(&self, percentage: f64) -> Result<ShortcutResponse, AppError> {
        let account = require_account(self.wallet.as_ref()).await?;
        let available = self.available(account).await?;
        let amount = shortcut_amount(percentage, available, FormKind::Transfer).ok_or_else(|| {
            AppError::BadRequest(format!("Percentage must be in (0, 100]: {percentage}"))
        })?;
        Ok(ShortcutResponse {
            amount,
            quote: quote(amount),
        })
    }

    /// Validate the form and send `split` to the mixer. A rejected write
    /// queues an error notice and surfaces the library message.
    pub async fn submit(&self, input: &TransferInput) -> Result<TransferOutcome, AppError> {
        let pending = || AppError::Conflict("A transfer is already pending".to_string());
        if self.submitting.swap(true, Ordering::SeqCst) {
            return Err(pending());
        }
        let _guard = SubmitGuard(&self.submitting);
        if self.tracker.is_pending().await {
            return Err(pending());
        }

        let account = require_account(self.wallet.as_ref()).await?;
        let available = self.available(account).await?;
        let valid = validate_transfer(input, available)?;

        let rounds = rand::thread_rng().gen_range(MIXING_ROUNDS);
        let value = to_base_units(valid.amount, NATIVE_DECIMALS)?;
        let call = self.mixer.split(valid.recipient, rounds, value)?;

        tracing::info!(
            account = ?account,
            recipient = ?valid.recipient,
            rounds,
            value = %value,
            "Submitting transfer"
        );
        let tx = match self.wallet.write(call).await {
            Ok(tx) => tx,
            Err(e) => {
                tracing::error!(account = ?account, error = %e, "Transfer failed");
                self.tracker.notify_error(e.to_string()).await;
                return Err(e.into());
            }
        };
        // The watcher runs detached; the tracker owns its outcome.
        drop(self.tracker.track(tx).await);

        Ok(TransferOutcome {
            tx_hash: format!("{tx:?}"),
            recipient: to_checksum(&valid.recipient, None),
            rounds,
            value_wei: value.to_string(),
            source_token: valid.source_token,
            destination_token: valid.destination_token,
        })
    }
}
