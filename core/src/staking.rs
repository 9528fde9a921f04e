use ethers::types::{Address, U256};
use ethers::utils::to_checksum;
use moka::future::Cache;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use utoipa::ToSchema;

use crate::contracts::{ClaimInfo, ContractCall, ContractError, DepositInfo, Deployment};
use crate::display::format_number;
use crate::errors::AppError;
use crate::shortcut::{shortcut_amount, FormKind};
use crate::units::{from_base_units, raw_integer, to_base_units, UnitsError};
use crate::validation::{validate_stake, Field, FieldError, StakeInput, ValidationErrors};
use crate::wallet::{require_account, Wallet};

/// Advertised annual reward rate, in percent.
pub const STAKING_APR_PERCENT: u32 = 100;

/// The staking contract is queried as an investor holding no NFTs.
const NFT_BALANCE: u64 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StakeMode {
    Stake,
    Unstake,
}

impl StakeMode {
    pub fn from_toggle(stake: bool) -> Self {
        if stake {
            StakeMode::Stake
        } else {
            StakeMode::Unstake
        }
    }
}

/// What the investor can do next when staking, derived once per snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StakePosition {
    /// Rewards are waiting; staking claims them first.
    HasClaimable { claimable: f64 },
    /// The staking contract may already pull tokens.
    ReadyToDeposit { allowance: f64 },
    NeedsApproval,
}

impl StakePosition {
    pub fn classify(claimable: f64, allowance: f64) -> Self {
        if claimable > 0.0 {
            StakePosition::HasClaimable { claimable }
        } else if allowance > 0.0 {
            StakePosition::ReadyToDeposit { allowance }
        } else {
            StakePosition::NeedsApproval
        }
    }

    /// Caption of the submit button.
    pub fn button_label(&self, mode: StakeMode) -> String {
        match (mode, self) {
            (StakeMode::Unstake, _) => "Unstake".to_string(),
            (StakeMode::Stake, StakePosition::HasClaimable { .. }) => "Claim".to_string(),
            (StakeMode::Stake, StakePosition::ReadyToDeposit { allowance }) => {
                format!("Stake ({} Approved)", format_number(*allowance))
            }
            (StakeMode::Stake, StakePosition::NeedsApproval) => "Approve".to_string(),
        }
    }
}

/// The single contract write a submission resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StakeAction {
    ClaimReward,
    Deposit { amount: U256 },
    Approve { spender: Address, amount: U256 },
    WithdrawCapital { amount: U256 },
}

impl StakeAction {
    pub fn name(&self) -> &'static str {
        match self {
            StakeAction::ClaimReward => "claim_reward",
            StakeAction::Deposit { .. } => "deposit",
            StakeAction::Approve { .. } => "approve",
            StakeAction::WithdrawCapital { .. } => "withdraw_capital",
        }
    }

    pub fn to_call(&self, deployment: &Deployment) -> Result<ContractCall, ContractError> {
        match *self {
            StakeAction::ClaimReward => deployment.staking.claim_reward(),
            StakeAction::Deposit { amount } => deployment.staking.deposit(amount),
            StakeAction::Approve { spender, amount } => deployment.token.approve(spender, amount),
            StakeAction::WithdrawCapital { amount } => deployment.staking.withdraw_capital(amount),
        }
    }

    /// Cap token-moving amounts at the wallet's raw token balance.
    pub fn capped_at(self, balance: U256) -> Self {
        match self {
            StakeAction::Deposit { amount } => StakeAction::Deposit {
                amount: amount.min(balance),
            },
            StakeAction::Approve { spender, amount } => StakeAction::Approve {
                spender,
                amount: amount.min(balance),
            },
            other => other,
        }
    }
}

/// Pick the action for a validated submission.
///
/// Staking amounts are scaled to token base units; the unstake amount is
/// passed through unscaled.
pub fn plan(
    mode: StakeMode,
    position: &StakePosition,
    amount: f64,
    decimals: u32,
    staking_contract: Address,
) -> Result<StakeAction, UnitsError> {
    Ok(match (mode, position) {
        (StakeMode::Unstake, _) => StakeAction::WithdrawCapital {
            amount: raw_integer(amount)?,
        },
        (StakeMode::Stake, StakePosition::HasClaimable { .. }) => StakeAction::ClaimReward,
        (StakeMode::Stake, StakePosition::ReadyToDeposit { .. }) => StakeAction::Deposit {
            amount: to_base_units(amount, decimals)?,
        },
        (StakeMode::Stake, StakePosition::NeedsApproval) => StakeAction::Approve {
            spender: staking_contract,
            amount: to_base_units(amount, decimals)?,
        },
    })
}

/// Investor state read from the token and staking contracts, in display
/// units unless noted.
#[derive(Debug, Clone, PartialEq)]
pub struct StakeSnapshot {
    pub account: Address,
    pub decimals: u32,
    /// Token balance in base units.
    pub balance: U256,
    /// `balance` in display units, rounded down.
    pub available: f64,
    pub allowance: f64,
    pub claimable_amount: f64,
    pub deposit: DepositInfo,
    pub claim: ClaimInfo,
}

impl StakeSnapshot {
    pub fn position(&self) -> StakePosition {
        StakePosition::classify(self.claimable_amount, self.allowance)
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StakeView {
    pub account: String,
    pub token: String,
    pub token_decimals: u32,
    pub available: f64,
    pub available_display: String,
    pub allowance: f64,
    pub claimable_amount: f64,
    pub position: StakePosition,
    pub stake_label: String,
    pub unstake_label: String,
    pub staked: f64,
    pub earned: f64,
    pub next_claim_in_secs: u64,
    pub apr_percent: u32,
    pub submitting: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StakeOutcome {
    #[schema(example = "approve")]
    pub action: String,
    /// `false` when the wallet rejected the write; the failure is only logged.
    pub submitted: bool,
    pub tx_hash: Option<String>,
}

struct SubmitGuard<'a>(&'a AtomicBool);

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct StakeForm {
    wallet: Arc<dyn Wallet>,
    deployment: Deployment,
    snapshots: Cache<Address, StakeSnapshot>,
    submitting: AtomicBool,
}

impl StakeForm {
    pub fn new(wallet: Arc<dyn Wallet>, deployment: Deployment, snapshot_ttl: Duration) -> Self {
        Self {
            wallet,
            deployment,
            snapshots: Cache::builder()
                .max_capacity(1_000)
                .time_to_live(snapshot_ttl)
                .build(),
            submitting: AtomicBool::new(false),
        }
    }

    /// Cached snapshot for the connected account, fetched on first use.
    pub async fn snapshot(&self) -> Result<StakeSnapshot, AppError> {
        let account = require_account(self.wallet.as_ref()).await?;
        self.snapshot_for(account).await
    }

    /// Drop the cached snapshot and read the chain again.
    pub async fn refresh(&self) -> Result<StakeSnapshot, AppError> {
        let account = require_account(self.wallet.as_ref()).await?;
        self.snapshots.invalidate(&account).await;
        self.snapshot_for(account).await
    }

    /// Forget any cached snapshot for `account`.
    pub async fn invalidate(&self, account: Address) {
        self.snapshots.invalidate(&account).await;
    }

    async fn snapshot_for(&self, account: Address) -> Result<StakeSnapshot, AppError> {
        if let Some(snapshot) = self.snapshots.get(&account).await {
            return Ok(snapshot);
        }
        let snapshot = self.fetch(account).await?;
        self.snapshots.insert(account, snapshot.clone()).await;
        Ok(snapshot)
    }

    async fn fetch(&self, account: Address) -> Result<StakeSnapshot, AppError> {
        let token = &self.deployment.token;
        let staking = &self.deployment.staking;

        let decimals_call = token.decimals()?;
        let balance_call = token.balance_of(account)?;
        let allowance_call = token.allowance(account, staking.address())?;
        let claimable_call = staking.get_claimable_amount(account, U256::from(NFT_BALANCE))?;
        let deposit_call = staking.deposit_info(account)?;
        let claim_call = staking.claim_info(account)?;

        let wallet = self.wallet.as_ref();
        let (decimals, balance, allowance, claimable, deposit, claim) = tokio::try_join!(
            wallet.read(&decimals_call),
            wallet.read(&balance_call),
            wallet.read(&allowance_call),
            wallet.read(&claimable_call),
            wallet.read(&deposit_call),
            wallet.read(&claim_call),
        )?;

        let decimals = u32::from(token.decode_decimals(&decimals)?);
        let balance = token.decode_balance_of(&balance)?;
        let snapshot = StakeSnapshot {
            account,
            decimals,
            balance,
            available: from_base_units(balance, decimals)?,
            allowance: from_base_units(token.decode_allowance(&allowance)?, decimals)?,
            claimable_amount: from_base_units(
                staking.decode_claimable_amount(&claimable)?,
                decimals,
            )?,
            deposit: staking.decode_deposit_info(&deposit)?,
            claim: staking.decode_claim_info(&claim)?,
        };
        tracing::debug!(
            account = ?account,
            available = snapshot.available,
            allowance = snapshot.allowance,
            claimable = snapshot.claimable_amount,
            "Stake snapshot refreshed"
        );
        Ok(snapshot)
    }

    pub async fn view(&self) -> Result<StakeView, AppError> {
        let snapshot = self.snapshot().await?;
        let position = snapshot.position();
        let next_claim_in_secs = snapshot
            .claim
            .next_claim_at
            .min(U256::from(u64::MAX))
            .as_u64()
            .saturating_sub(now_secs());

        Ok(StakeView {
            account: to_checksum(&snapshot.account, None),
            token: to_checksum(&self.deployment.token.address(), None),
            token_decimals: snapshot.decimals,
            available: snapshot.available,
            available_display: format_number(snapshot.available),
            allowance: snapshot.allowance,
            claimable_amount: snapshot.claimable_amount,
            position,
            stake_label: position.button_label(StakeMode::Stake),
            unstake_label: position.button_label(StakeMode::Unstake),
            staked: from_base_units(snapshot.deposit.amount, snapshot.decimals)?,
            earned: from_base_units(snapshot.claim.earned, snapshot.decimals)?,
            next_claim_in_secs,
            apr_percent: STAKING_APR_PERCENT,
            submitting: self.submitting.load(Ordering::SeqCst),
        })
    }

    pub async fn shortcut(&self, percentage: f64) -> Result<f64, AppError> {
        let snapshot = self.snapshot().await?;
        shortcut_amount(percentage, snapshot.available, FormKind::Stake).ok_or_else(|| {
            AppError::BadRequest(format!("Percentage must be in (0, 100]: {percentage}"))
        })
    }

    /// Validate and dispatch one submission. Wallet failures are logged and
    /// reported as `submitted: false`; they never surface as errors.
    pub async fn submit(&self, input: &StakeInput) -> Result<StakeOutcome, AppError> {
        if self.submitting.swap(true, Ordering::SeqCst) {
            return Err(AppError::Conflict(
                "A stake action is already being submitted".to_string(),
            ));
        }
        let _guard = SubmitGuard(&self.submitting);

        let account = require_account(self.wallet.as_ref()).await?;
        let snapshot = self.snapshot_for(account).await?;
        let valid = validate_stake(input, snapshot.available)?;

        let action = plan(
            valid.mode,
            &snapshot.position(),
            valid.amount,
            snapshot.decimals,
            self.deployment.staking.address(),
        )
        .map_err(|e| ValidationErrors::from(vec![FieldError::new(Field::Amount, amount_message(&e))]))?
        .capped_at(snapshot.balance);
        let call = action.to_call(&self.deployment)?;

        tracing::info!(account = ?account, action = action.name(), "Submitting stake action");
        let outcome = match self.wallet.write(call).await {
            Ok(tx) => StakeOutcome {
                action: action.name().to_string(),
                submitted: true,
                tx_hash: Some(format!("{tx:?}")),
            },
            Err(e) => {
                tracing::error!(account = ?account, action = action.name(), error = %e, "Stake action failed");
                StakeOutcome {
                    action: action.name().to_string(),
                    submitted: false,
                    tx_hash: None,
                }
            }
        };

        self.snapshots.invalidate(&account).await;
        Ok(outcome)
    }
}

fn amount_message(err: &UnitsError) -> String {
    match err {
        UnitsError::NotWhole(_) => "Unstake amount must be a whole number".to_string(),
        other => other.to_string(),
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Answer every read [`StakeForm`] issues for `account` on a recording wallet.
/// `amounts` are the token balance, allowance and claimable amount in base
/// units; the deposit is 3 tokens and 1 token has been earned.
#[cfg(test)]
pub(crate) fn answer_snapshot_reads(
    wallet: &crate::wallet::mock::MockWallet,
    deployment: &Deployment,
    account: Address,
    decimals: u32,
    amounts: [U256; 3],
) {
    use ethers::abi::Token;

    let [balance, allowance, claimable] = amounts;
    let one = U256::exp10(decimals as usize);
    let uint = |v: U256| vec![Token::Uint(v)];
    let token = &deployment.token;
    let staking = &deployment.staking;
    wallet.answer(&token.decimals().unwrap(), &uint(U256::from(decimals)));
    wallet.answer(&token.balance_of(account).unwrap(), &uint(balance));
    wallet.answer(
        &token.allowance(account, staking.address()).unwrap(),
        &uint(allowance),
    );
    wallet.answer(
        &staking.get_claimable_amount(account, U256::zero()).unwrap(),
        &uint(claimable),
    );
    wallet.answer(
        &staking.deposit_info(account).unwrap(),
        &[Token::Uint(one * U256::from(3u64)), Token::Uint(U256::one())],
    );
    wallet.answer(
        &staking.claim_info(account).unwrap(),
        &[Token::Uint(one), Token::Uint(U256::zero()), Token::Uint(U256::zero())],
    );
}
