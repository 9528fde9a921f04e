use axum::{
    extract::{Json, Path, Query},
    routing::{get, post},
    Extension, Router,
};
use ethers::types::TxHash;
use ethers::utils::to_checksum;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::{IntoParams, OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use crate::contracts::Deployment;
use crate::display::{account_label, truncate_address};
use crate::errors::AppError;
use crate::shortcut::ShortcutRequest;
use crate::staking::{StakeForm, StakeMode, StakeOutcome, StakePosition, StakeView};
use crate::tokens::Token;
use crate::transfer::{
    Quote, ShortcutResponse, TokenOption, TransferForm, TransferOutcome, TransferView,
};
use crate::tx_tracker::{Notice, NoticeKind, TxTracker};
use crate::validation::{AmountInput, StakeInput, TransferInput};
use crate::wallet::{TxStatus, Wallet};

/// Shared per-process session: one wallet, both forms, one tracker.
#[derive(Clone)]
pub struct AppState {
    pub wallet: Arc<dyn Wallet>,
    pub transfer: Arc<TransferForm>,
    pub stake: Arc<StakeForm>,
    pub tracker: Arc<TxTracker>,
}

impl AppState {
    pub fn new(
        wallet: Arc<dyn Wallet>,
        deployment: Deployment,
        poll_interval: Duration,
        snapshot_ttl: Duration,
        tx_retention: Duration,
    ) -> Self {
        let tracker = TxTracker::new(Arc::clone(&wallet), poll_interval, tx_retention);
        let transfer = TransferForm::new(
            Arc::clone(&wallet),
            deployment.mixer.clone(),
            Arc::clone(&tracker),
        );
        let stake = StakeForm::new(Arc::clone(&wallet), deployment, snapshot_ttl);
        Self {
            wallet,
            transfer: Arc::new(transfer),
            stake: Arc::new(stake),
            tracker,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TransferQuery {
    /// Amount to quote the fee for.
    pub amount: Option<f64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AmountResponse {
    pub amount: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WalletInfo {
    pub connected: bool,
    pub account: Option<String>,
    /// Header caption: ENS name or shortened address.
    pub label: String,
    pub short_address: String,
    pub ens_name: Option<String>,
    pub ens_avatar: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TxStatusResponse {
    pub tx_hash: String,
    pub status: TxStatus,
}

#[utoipa::path(
    get,
    path = "/",
    params(TransferQuery),
    responses(
        (status = 200, description = "Transfer form state", body = TransferView),
        (status = 401, description = "Wallet not connected")
    ),
    tag = "Transfer"
)]
pub async fn transfer_view(
    Extension(state): Extension<AppState>,
    Query(query): Query<TransferQuery>,
) -> Result<Json<TransferView>, AppError> {
    Ok(Json(state.transfer.view(query.amount).await?))
}

#[utoipa::path(
    post,
    path = "/",
    request_body = TransferInput,
    responses(
        (status = 200, description = "Transfer submitted", body = TransferOutcome),
        (status = 401, description = "Wallet not connected"),
        (status = 409, description = "A transfer is still pending"),
        (status = 422, description = "Form validation failed"),
        (status = 502, description = "Wallet rejected the transaction")
    ),
    tag = "Transfer"
)]
pub async fn transfer_submit(
    Extension(state): Extension<AppState>,
    Json(input): Json<TransferInput>,
) -> Result<Json<TransferOutcome>, AppError> {
    Ok(Json(state.transfer.submit(&input).await?))
}

#[utoipa::path(
    post,
    path = "/shortcut",
    request_body = ShortcutRequest,
    responses(
        (status = 200, description = "Amount for the percentage", body = ShortcutResponse),
        (status = 400, description = "Percentage out of range")
    ),
    tag = "Transfer"
)]
pub async fn transfer_shortcut(
    Extension(state): Extension<AppState>,
    Json(request): Json<ShortcutRequest>,
) -> Result<Json<ShortcutResponse>, AppError> {
    Ok(Json(state.transfer.shortcut(request.percentage).await?))
}

#[utoipa::path(
    get,
    path = "/stake",
    responses(
        (status = 200, description = "Staking form state", body = StakeView),
        (status = 401, description = "Wallet not connected")
    ),
    tag = "Staking"
)]
pub async fn stake_view(
    Extension(state): Extension<AppState>,
) -> Result<Json<StakeView>, AppError> {
    Ok(Json(state.stake.view().await?))
}

#[utoipa::path(
    post,
    path = "/stake",
    request_body = StakeInput,
    responses(
        (status = 200, description = "Action dispatched; `submitted` is false if the wallet failed", body = StakeOutcome),
        (status = 401, description = "Wallet not connected"),
        (status = 409, description = "Another stake action is in flight"),
        (status = 422, description = "Form validation failed")
    ),
    tag = "Staking"
)]
pub async fn stake_submit(
    Extension(state): Extension<AppState>,
    Json(input): Json<StakeInput>,
) -> Result<Json<StakeOutcome>, AppError> {
    Ok(Json(state.stake.submit(&input).await?))
}

#[utoipa::path(
    post,
    path = "/stake/shortcut",
    request_body = ShortcutRequest,
    responses(
        (status = 200, description = "Amount for the percentage", body = AmountResponse),
        (status = 400, description = "Percentage out of range")
    ),
    tag = "Staking"
)]
pub async fn stake_shortcut(
    Extension(state): Extension<AppState>,
    Json(request): Json<ShortcutRequest>,
) -> Result<Json<AmountResponse>, AppError> {
    let amount = state.stake.shortcut(request.percentage).await?;
    Ok(Json(AmountResponse { amount }))
}

#[utoipa::path(
    post,
    path = "/stake/refresh",
    responses(
        (status = 200, description = "Snapshot re-read from chain", body = StakeView),
        (status = 401, description = "Wallet not connected")
    ),
    tag = "Staking"
)]
pub async fn stake_refresh(
    Extension(state): Extension<AppState>,
) -> Result<Json<StakeView>, AppError> {
    state.stake.refresh().await?;
    Ok(Json(state.stake.view().await?))
}

async fn wallet_info(wallet: &dyn Wallet) -> WalletInfo {
    let Some(account) = wallet.account().await else {
        return WalletInfo {
            connected: false,
            account: None,
            label: "Connect Wallet".to_string(),
            short_address: truncate_address(None),
            ens_name: None,
            ens_avatar: None,
        };
    };

    let ens_name = wallet.ens_name(account).await.unwrap_or_else(|e| {
        tracing::debug!(account = ?account, error = %e, "ENS lookup skipped");
        None
    });
    let ens_avatar = match &ens_name {
        Some(name) => wallet.ens_avatar(name).await.unwrap_or(None),
        None => None,
    };
    let checksummed = to_checksum(&account, None);

    WalletInfo {
        connected: true,
        label: account_label(account, ens_name.as_deref()),
        short_address: truncate_address(Some(&checksummed)),
        account: Some(checksummed),
        ens_name,
        ens_avatar,
    }
}

#[utoipa::path(
    get,
    path = "/wallet",
    responses((status = 200, description = "Wallet session", body = WalletInfo)),
    tag = "Wallet"
)]
pub async fn wallet_status(Extension(state): Extension<AppState>) -> Json<WalletInfo> {
    Json(wallet_info(state.wallet.as_ref()).await)
}

#[utoipa::path(
    post,
    path = "/wallet/connect",
    responses(
        (status = 200, description = "Wallet connected", body = WalletInfo),
        (status = 401, description = "No signer configured")
    ),
    tag = "Wallet"
)]
pub async fn wallet_connect(
    Extension(state): Extension<AppState>,
) -> Result<Json<WalletInfo>, AppError> {
    let account = state.wallet.connect().await?;
    state.stake.invalidate(account).await;
    Ok(Json(wallet_info(state.wallet.as_ref()).await))
}

#[utoipa::path(
    post,
    path = "/wallet/disconnect",
    responses((status = 200, description = "Wallet disconnected", body = WalletInfo)),
    tag = "Wallet"
)]
pub async fn wallet_disconnect(Extension(state): Extension<AppState>) -> Json<WalletInfo> {
    if let Some(account) = state.wallet.account().await {
        state.stake.invalidate(account).await;
    }
    state.wallet.disconnect().await;
    Json(wallet_info(state.wallet.as_ref()).await)
}

#[utoipa::path(
    get,
    path = "/tx/{hash}",
    params(("hash" = String, Path, description = "Transaction hash")),
    responses(
        (status = 200, description = "Tracked transaction status", body = TxStatusResponse),
        (status = 400, description = "Malformed hash"),
        (status = 404, description = "Transaction not tracked")
    ),
    tag = "Transactions"
)]
pub async fn tx_status(
    Extension(state): Extension<AppState>,
    Path(hash): Path<String>,
) -> Result<Json<TxStatusResponse>, AppError> {
    let tx: TxHash = hash
        .parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid transaction hash: {hash}")))?;
    let status = state
        .tracker
        .status(tx)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Transaction {hash}")))?;
    Ok(Json(TxStatusResponse {
        tx_hash: format!("{tx:?}"),
        status,
    }))
}

async fn health_check() -> &'static str {
    "OK"
}

#[derive(OpenApi)]
#[openapi(
    paths(
        transfer_view, transfer_submit, transfer_shortcut,
        stake_view, stake_submit, stake_shortcut, stake_refresh,
        wallet_status, wallet_connect, wallet_disconnect,
        tx_status
    ),
    components(schemas(
        TransferInput, TransferView, TransferOutcome, ShortcutResponse, Quote, TokenOption,
        Token, AmountInput, ShortcutRequest, Notice, NoticeKind,
        StakeInput, StakeView, StakeOutcome, StakePosition, StakeMode, AmountResponse,
        WalletInfo, TxStatusResponse, TxStatus
    )),
    tags(
        (name = "Transfer", description = "Mixer transfer form"),
        (name = "Staking", description = "Stake, claim and unstake form"),
        (name = "Wallet", description = "Wallet session"),
        (name = "Transactions", description = "Submitted transaction tracking")
    ),
    info(
        title = "Vanish API",
        version = "0.1.0",
        description = "Mixer transfer and staking forms over an EVM wallet"
    )
)]
pub struct ApiDoc;

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/", get(transfer_view).post(transfer_submit))
        .route("/shortcut", post(transfer_shortcut))
        .route("/stake", get(stake_view).post(stake_submit))
        .route("/stake/shortcut", post(stake_shortcut))
        .route("/stake/refresh", post(stake_refresh))
        .route("/wallet", get(wallet_status))
        .route("/wallet/connect", post(wallet_connect))
        .route("/wallet/disconnect", post(wallet_disconnect))
        .route("/tx/:hash", get(tx_status))
        .route("/health", get(health_check))
        .layer(Extension(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
