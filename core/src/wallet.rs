use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::middleware::SignerMiddleware;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, TransactionRequest, TxHash, U256};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use utoipa::ToSchema;

use crate::contracts::ContractCall;
use crate::rpc_provider::ProviderRegistry;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WalletError {
    #[error("Wallet is not connected")]
    NotConnected,

    #[error("No signing key configured")]
    NoSigner,

    #[error("No healthy RPC endpoint available")]
    NoHealthyProvider,

    #[error("{0}")]
    Rejected(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Invalid private key: {0}")]
    InvalidKey(String),
}

/// On-chain outcome of a submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    Pending,
    Confirmed,
    Reverted,
}

/// Everything that touches the chain goes through here; the forms only build
/// [`ContractCall`]s and interpret what comes back.
#[async_trait]
pub trait Wallet: Send + Sync {
    /// Attach the session's signer; returns the connected account.
    async fn connect(&self) -> Result<Address, WalletError>;

    async fn disconnect(&self);

    async fn account(&self) -> Option<Address>;

    /// Reverse-resolved ENS name, if any.
    async fn ens_name(&self, account: Address) -> Result<Option<String>, WalletError>;

    async fn ens_avatar(&self, name: &str) -> Result<Option<String>, WalletError>;

    async fn native_balance(&self, account: Address) -> Result<U256, WalletError>;

    /// Read-only contract call; returns the raw ABI-encoded output.
    async fn read(&self, call: &ContractCall) -> Result<Bytes, WalletError>;

    /// Sign and broadcast a contract write.
    async fn write(&self, call: ContractCall) -> Result<TxHash, WalletError>;

    async fn status(&self, tx: TxHash) -> Result<TxStatus, WalletError>;
}

/// Account currently connected, or [`WalletError::NotConnected`].
pub async fn require_account(wallet: &dyn Wallet) -> Result<Address, WalletError> {
    wallet.account().await.ok_or(WalletError::NotConnected)
}

pub struct EvmWallet {
    registry: Arc<ProviderRegistry>,
    signer: Option<LocalWallet>,
    connected: RwLock<Option<LocalWallet>>,
}

impl EvmWallet {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        chain_id: u64,
        private_key: Option<&str>,
    ) -> Result<Self, WalletError> {
        let signer = private_key
            .map(|key| {
                key.parse::<LocalWallet>()
                    .map(|w| w.with_chain_id(chain_id))
                    .map_err(|e| WalletError::InvalidKey(e.to_string()))
            })
            .transpose()?;
        Ok(Self {
            registry,
            signer,
            connected: RwLock::new(None),
        })
    }

    async fn provider(&self) -> Result<(Provider<Http>, String), WalletError> {
        let url = self
            .registry
            .preferred_url()
            .await
            .ok_or(WalletError::NoHealthyProvider)?;
        let provider = Provider::<Http>::try_from(url.as_str())
            .map_err(|e| WalletError::Provider(e.to_string()))?;
        Ok((provider, url))
    }

    /// Feed the outcome of an endpoint request back into the registry.
    async fn observe<T, E: std::fmt::Display>(
        &self,
        url: &str,
        result: Result<T, E>,
    ) -> Result<T, WalletError> {
        match result {
            Ok(value) => {
                self.registry.report_success(url).await;
                Ok(value)
            }
            Err(e) => {
                self.registry.report_failure(url).await;
                Err(WalletError::Provider(e.to_string()))
            }
        }
    }

    async fn connected_signer(&self) -> Result<LocalWallet, WalletError> {
        self.connected
            .read()
            .await
            .clone()
            .ok_or(WalletError::NotConnected)
    }
}

#[async_trait]
impl Wallet for EvmWallet {
    async fn connect(&self) -> Result<Address, WalletError> {
        let signer = self.signer.clone().ok_or(WalletError::NoSigner)?;
        let address = signer.address();
        *self.connected.write().await = Some(signer);
        tracing::info!(account = ?address, "Wallet connected");
        Ok(address)
    }

    async fn disconnect(&self) {
        if let Some(signer) = self.connected.write().await.take() {
            tracing::info!(account = ?signer.address(), "Wallet disconnected");
        }
    }

    async fn account(&self) -> Option<Address> {
        self.connected.read().await.as_ref().map(|s| s.address())
    }

    async fn ens_name(&self, account: Address) -> Result<Option<String>, WalletError> {
        let (provider, _) = self.provider().await?;
        match provider.lookup_address(account).await {
            Ok(name) => Ok(Some(name)),
            Err(e) => {
                tracing::debug!(account = ?account, error = %e, "No ENS name");
                Ok(None)
            }
        }
    }

    async fn ens_avatar(&self, name: &str) -> Result<Option<String>, WalletError> {
        let (provider, _) = self.provider().await?;
        match provider.resolve_avatar(name).await {
            Ok(url) => Ok(Some(url.to_string())),
            Err(e) => {
                tracing::debug!(name, error = %e, "No ENS avatar");
                Ok(None)
            }
        }
    }

    async fn native_balance(&self, account: Address) -> Result<U256, WalletError> {
        let (provider, url) = self.provider().await?;
        let result = provider.get_balance(account, None).await;
        self.observe(&url, result).await
    }

    async fn read(&self, call: &ContractCall) -> Result<Bytes, WalletError> {
        let (provider, url) = self.provider().await?;
        let tx: TypedTransaction = TransactionRequest::new()
            .to(call.to)
            .data(call.data.clone())
            .into();
        tracing::debug!(function = call.function, to = ?call.to, "Contract read");
        let result = provider.call(&tx, None).await;
        self.observe(&url, result).await
    }

    async fn write(&self, call: ContractCall) -> Result<TxHash, WalletError> {
        let signer = self.connected_signer().await?;
        let (provider, _) = self.provider().await?;
        let from = signer.address();
        let client = SignerMiddleware::new(provider, signer);

        let tx = TransactionRequest::new()
            .from(from)
            .to(call.to)
            .data(call.data)
            .value(call.value);

        tracing::info!(function = call.function, to = ?call.to, value = %call.value, "Sending transaction");
        let pending = client
            .send_transaction(tx, None)
            .await
            .map_err(|e| WalletError::Rejected(e.to_string()))?;
        let hash = pending.tx_hash();
        tracing::info!(tx = ?hash, "Transaction submitted");
        Ok(hash)
    }

    async fn status(&self, tx: TxHash) -> Result<TxStatus, WalletError> {
        let (provider, url) = self.provider().await?;
        let result = provider.get_transaction_receipt(tx).await;
        let receipt = self.observe(&url, result).await?;
        Ok(match receipt {
            None => TxStatus::Pending,
            Some(r) => match r.status.map(|s| s.as_u64()) {
                Some(0) => TxStatus::Reverted,
                _ => TxStatus::Confirmed,
            },
        })
    }
}
