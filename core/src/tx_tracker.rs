use ethers::types::TxHash;
use moka::future::Cache;
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use utoipa::ToSchema;

use crate::wallet::{TxStatus, Wallet};

pub const SUCCESS_MESSAGE: &str = "Congratulations! Successfully transferred.";

const REVERTED_MESSAGE: &str = "Transaction reverted";

/// Settled transactions kept for status lookups.
const SETTLED_CAPACITY: u64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Success,
    Error,
}

/// One-shot message describing how an attempt ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    pub tx_hash: Option<String>,
}

impl Notice {
    pub fn success(tx: TxHash) -> Self {
        Self {
            kind: NoticeKind::Success,
            message: SUCCESS_MESSAGE.to_string(),
            tx_hash: Some(format!("{tx:?}")),
        }
    }

    pub fn error(message: impl Into<String>, tx: Option<TxHash>) -> Self {
        Self {
            kind: NoticeKind::Error,
            message: message.into(),
            tx_hash: tx.map(|t| format!("{t:?}")),
        }
    }
}

/// Hashes handed to [`TxTracker::track`] stay pending until a background
/// watcher sees their receipt. Settling moves them to a bounded cache and
/// queues exactly one [`Notice`], drained with [`TxTracker::take_notices`].
pub struct TxTracker {
    wallet: Arc<dyn Wallet>,
    poll_interval: Duration,
    pending: RwLock<HashSet<TxHash>>,
    settled: Cache<TxHash, TxStatus>,
    notices: Mutex<VecDeque<Notice>>,
}

impl TxTracker {
    /// Settled statuses remain queryable for `retention`.
    pub fn new(wallet: Arc<dyn Wallet>, poll_interval: Duration, retention: Duration) -> Arc<Self> {
        Arc::new(Self {
            wallet,
            poll_interval,
            pending: RwLock::new(HashSet::new()),
            settled: Cache::builder()
                .max_capacity(SETTLED_CAPACITY)
                .time_to_live(retention)
                .build(),
            notices: Mutex::new(VecDeque::new()),
        })
    }

    /// Register `tx` as pending and start watching its receipt.
    pub async fn track(self: &Arc<Self>, tx: TxHash) -> tokio::task::JoinHandle<()> {
        self.pending.write().await.insert(tx);
        tracing::info!(tx = ?tx, "Tracking transaction");

        let tracker = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tracker.poll_interval);
            loop {
                ticker.tick().await;
                if tracker.check(tx).await != Some(TxStatus::Pending) {
                    break;
                }
            }
        })
    }

    /// Poll the receipt of `tx` once, settling it if the chain has decided.
    /// A failed lookup leaves the transaction pending for the next poll.
    pub async fn check(&self, tx: TxHash) -> Option<TxStatus> {
        let current = self.status(tx).await?;
        if current != TxStatus::Pending {
            return Some(current);
        }
        match self.wallet.status(tx).await {
            Ok(TxStatus::Pending) => Some(TxStatus::Pending),
            Ok(TxStatus::Confirmed) => {
                self.settle(tx, TxStatus::Confirmed, Notice::success(tx)).await
            }
            Ok(TxStatus::Reverted) => {
                self.settle(tx, TxStatus::Reverted, Notice::error(REVERTED_MESSAGE, Some(tx)))
                    .await
            }
            Err(e) => {
                tracing::warn!(tx = ?tx, error = %e, "Receipt lookup failed, retrying");
                Some(TxStatus::Pending)
            }
        }
    }

    async fn settle(&self, tx: TxHash, status: TxStatus, notice: Notice) -> Option<TxStatus> {
        let mut pending = self.pending.write().await;
        if !pending.remove(&tx) {
            return self.settled.get(&tx).await;
        }
        self.settled.insert(tx, status).await;
        tracing::info!(tx = ?tx, status = ?status, "Transaction settled");
        self.notices.lock().await.push_back(notice);
        Some(status)
    }

    /// Queue an error notice for an attempt that never produced a hash.
    pub async fn notify_error(&self, message: impl Into<String>) {
        self.notices
            .lock()
            .await
            .push_back(Notice::error(message, None));
    }

    /// Drain queued notices; each is returned once.
    pub async fn take_notices(&self) -> Vec<Notice> {
        self.notices.lock().await.drain(..).collect()
    }

    pub async fn status(&self, tx: TxHash) -> Option<TxStatus> {
        if self.pending.read().await.contains(&tx) {
            return Some(TxStatus::Pending);
        }
        self.settled.get(&tx).await
    }

    pub async fn is_pending(&self) -> bool {
        !self.pending.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::mock::MockWallet;
    use ethers::types::Address;

    fn tracker(wallet: Arc<MockWallet>) -> Arc<TxTracker> {
        TxTracker::new(wallet, Duration::from_millis(5), Duration::from_secs(3600))
    }

    fn hash(n: u64) -> TxHash {
        TxHash::from_low_u64_be(n)
    }

    #[tokio::test]
    async fn test_untracked_hash_is_unknown() {
        let tracker = tracker(MockWallet::connected(Address::zero()));
        assert_eq!(tracker.status(hash(1)).await, None);
        assert_eq!(tracker.check(hash(1)).await, None);
        assert!(!tracker.is_pending().await);
    }

    #[tokio::test]
    async fn test_success_notice_delivered_once() {
        let wallet = MockWallet::connected(Address::zero());
        let tracker = tracker(wallet.clone());
        tracker.track(hash(1)).await.abort();
        assert!(tracker.is_pending().await);

        assert_eq!(tracker.check(hash(1)).await, Some(TxStatus::Pending));
        assert!(tracker.take_notices().await.is_empty());

        wallet.set_status(hash(1), TxStatus::Confirmed);
        assert_eq!(tracker.check(hash(1)).await, Some(TxStatus::Confirmed));
        assert_eq!(tracker.check(hash(1)).await, Some(TxStatus::Confirmed));
        assert!(!tracker.is_pending().await);

        let notices = tracker.take_notices().await;
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].kind, NoticeKind::Success);
        assert_eq!(notices[0].message, SUCCESS_MESSAGE);
        assert!(tracker.take_notices().await.is_empty());
    }

    #[tokio::test]
    async fn test_reverted_gives_error_notice() {
        let wallet = MockWallet::connected(Address::zero());
        let tracker = tracker(wallet.clone());
        tracker.track(hash(2)).await.abort();
        wallet.set_status(hash(2), TxStatus::Reverted);

        assert_eq!(tracker.check(hash(2)).await, Some(TxStatus::Reverted));
        let notices = tracker.take_notices().await;
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].kind, NoticeKind::Error);
        assert_eq!(notices[0].tx_hash, Some(format!("{:?}", hash(2))));
    }

    #[tokio::test]
    async fn test_watcher_settles_and_exits() {
        let wallet = MockWallet::connected(Address::zero());
        wallet.set_status(hash(3), TxStatus::Confirmed);
        let tracker = tracker(wallet);

        let watcher = tracker.track(hash(3)).await;
        tokio::time::timeout(Duration::from_secs(5), watcher)
            .await
            .expect("watcher should finish")
            .unwrap();

        assert_eq!(tracker.status(hash(3)).await, Some(TxStatus::Confirmed));
        assert_eq!(tracker.take_notices().await.len(), 1);
    }

    #[tokio::test]
    async fn test_notify_error_without_hash() {
        let tracker = tracker(MockWallet::connected(Address::zero()));
        tracker.notify_error("user rejected the request").await;
        let notices = tracker.take_notices().await;
        assert_eq!(
            notices,
            vec![Notice::error("user rejected the request", None)]
        );
    }

    #[tokio::test]
    async fn test_failed_lookup_keeps_transaction_pending() {
        let wallet = MockWallet::connected(Address::zero());
        let tracker = tracker(wallet.clone());
        tracker.track(hash(4)).await.abort();

        wallet.fail_next_status("timeout");
        assert_eq!(tracker.check(hash(4)).await, Some(TxStatus::Pending));
        assert!(tracker.is_pending().await);
        assert!(tracker.take_notices().await.is_empty());

        wallet.set_status(hash(4), TxStatus::Confirmed);
        assert_eq!(tracker.check(hash(4)).await, Some(TxStatus::Confirmed));
        let notices = tracker.take_notices().await;
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].kind, NoticeKind::Success);
    }

    #[tokio::test]
    async fn test_settled_entries_leave_pending_set() {
        let wallet = MockWallet::connected(Address::zero());
        let tracker = tracker(wallet.clone());
        for n in 1..=100 {
            tracker.track(hash(n)).await.abort();
            wallet.set_status(hash(n), TxStatus::Confirmed);
            tracker.check(hash(n)).await;
        }
        assert!(tracker.pending.read().await.is_empty());
        assert!(!tracker.is_pending().await);
        assert_eq!(tracker.status(hash(50)).await, Some(TxStatus::Confirmed));
    }

    #[tokio::test]
    async fn test_settled_entries_expire() {
        let wallet = MockWallet::connected(Address::zero());
        let tracker = TxTracker::new(
            wallet.clone(),
            Duration::from_millis(5),
            Duration::from_millis(50),
        );
        tracker.track(hash(5)).await.abort();
        wallet.set_status(hash(5), TxStatus::Confirmed);
        tracker.check(hash(5)).await;
        assert_eq!(tracker.status(hash(5)).await, Some(TxStatus::Confirmed));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(tracker.status(hash(5)).await, None);
        tracker.settled.run_pending_tasks().await;
        assert_eq!(tracker.settled.entry_count(), 0);
    }
}
