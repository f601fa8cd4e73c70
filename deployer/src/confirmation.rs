//! Ordered confirmation of submitted transactions.
//!
//! Deployments and upgrades produce transactions whose effects later steps
//! depend on, so confirmation is strictly sequential: a transaction is not
//! confirmed, and a deferred one is not even submitted, before every
//! earlier item in the batch has been confirmed. An optional delay between
//! confirmations spaces requests out against provider throttling.

use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use ethers::{
    providers::Middleware,
    types::{TxHash, U64},
};
use tracing::info;

use crate::{constants::RECEIPT_POLL_INTERVAL_MS, errors::ScriptError};

/// The resolved outcome of an awaited transaction
#[derive(Clone, Copy, Debug)]
pub struct TxOutcome {
    /// The transaction hash
    pub hash: TxHash,
    /// Whether the chain reported the transaction as successful
    pub success: bool,
}

/// Future resolving once the chain has mined the watched transaction
type ConfirmationFuture = Pin<Box<dyn Future<Output = Result<TxOutcome, ScriptError>> + Send>>;

/// Future submitting a deferred transaction at its turn
type SubmissionFuture = Pin<Box<dyn Future<Output = Result<SubmittedTx, ScriptError>> + Send>>;

/// Lazily-invoked producer that submits a transaction when called
type TxProducer = Box<dyn FnOnce() -> SubmissionFuture + Send>;

/// A transaction that has been submitted to the chain but not yet confirmed
pub struct SubmittedTx {
    /// The transaction hash
    hash: TxHash,
    /// The pending confirmation
    confirmation: ConfirmationFuture,
}

impl SubmittedTx {
    /// Wrap a submitted transaction's hash and confirmation future
    pub fn new(
        hash: TxHash,
        confirmation: impl Future<Output = Result<TxOutcome, ScriptError>> + Send + 'static,
    ) -> Self {
        Self {
            hash,
            confirmation: Box::pin(confirmation),
        }
    }

    /// The transaction hash
    pub fn hash(&self) -> TxHash {
        self.hash
    }

    /// Await the transaction's confirmation
    pub async fn confirm(self) -> Result<TxOutcome, ScriptError> {
        self.confirmation.await
    }
}

/// One unit of work for [`confirm_all`]: a transaction that is already
/// in flight, or one that should only be submitted at its turn
pub enum PendingItem {
    /// A transaction already submitted to the chain
    Submitted(SubmittedTx),
    /// A transaction submitted lazily at the item's turn, so that it can be
    /// parameterized by the confirmed effects of earlier items
    Deferred(TxProducer),
}

impl PendingItem {
    /// An already-submitted transaction
    pub fn submitted(tx: SubmittedTx) -> Self {
        Self::Submitted(tx)
    }

    /// A transaction submitted by `produce` when its turn comes
    pub fn deferred<F, Fut>(produce: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<SubmittedTx, ScriptError>> + Send + 'static,
    {
        Self::Deferred(Box::new(move || Box::pin(produce())))
    }
}

/// Watch a submitted transaction, polling the chain for its receipt
pub fn watch_tx<M: Middleware + 'static>(client: Arc<M>, hash: TxHash) -> SubmittedTx {
    SubmittedTx::new(hash, async move {
        loop {
            let receipt = client
                .get_transaction_receipt(hash)
                .await
                .map_err(|e| ScriptError::ContractInteraction(e.to_string()))?;

            match receipt {
                Some(receipt) => {
                    // Pre-Byzantium receipts carry no status field
                    let success = receipt
                        .status
                        .map(|status| status == U64::one())
                        .unwrap_or(true);
                    return Ok(TxOutcome { hash, success });
                }
                None => {
                    tokio::time::sleep(Duration::from_millis(RECEIPT_POLL_INTERVAL_MS)).await
                }
            }
        }
    })
}

/// Confirm the given transactions strictly in order, sleeping `delay`
/// after each confirmation.
///
/// A deferred item is submitted only once every earlier item has been
/// confirmed. The first submission or confirmation failure halts the
/// batch; no later item is submitted. An empty batch returns immediately.
pub async fn confirm_all(items: Vec<PendingItem>, delay: Duration) -> Result<(), ScriptError> {
    for item in items {
        let tx = match item {
            PendingItem::Submitted(tx) => tx,
            PendingItem::Deferred(produce) => produce().await.map_err(|e| match e {
                submission @ ScriptError::TxSubmission(_) => submission,
                other => ScriptError::TxSubmission(other.to_string()),
            })?,
        };

        info!("waiting for {:#x}", tx.hash());
        let outcome = tx.confirm().await?;
        if !outcome.success {
            return Err(ScriptError::TxConfirmation(format!(
                "transaction {:#x} reverted",
                outcome.hash
            )));
        }

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, Mutex},
        time::Duration,
    };

    use ethers::types::TxHash;

    use crate::errors::ScriptError;

    use super::{confirm_all, PendingItem, SubmittedTx, TxOutcome};

    fn hash(n: u64) -> TxHash {
        TxHash::from_low_u64_be(n)
    }

    /// A transaction that records `n` in `log` when its confirmation resolves
    fn confirming(n: u64, log: Arc<Mutex<Vec<u64>>>) -> SubmittedTx {
        SubmittedTx::new(hash(n), async move {
            log.lock().unwrap().push(n);
            Ok(TxOutcome {
                hash: hash(n),
                success: true,
            })
        })
    }

    /// A transaction whose confirmation reports an on-chain failure
    fn reverting(n: u64) -> SubmittedTx {
        SubmittedTx::new(hash(n), async move {
            Ok(TxOutcome {
                hash: hash(n),
                success: false,
            })
        })
    }

    #[tokio::test]
    async fn test_confirms_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));

        let first = PendingItem::submitted(confirming(1, log.clone()));
        let second = PendingItem::deferred({
            let log = log.clone();
            move || async move {
                // Submission happens only after the first item confirmed
                assert_eq!(*log.lock().unwrap(), vec![1]);
                Ok(confirming(2, log))
            }
        });
        let third = PendingItem::deferred({
            let log = log.clone();
            move || async move {
                assert_eq!(*log.lock().unwrap(), vec![1, 2]);
                Ok(confirming(3, log))
            }
        });

        confirm_all(vec![first, second, third], Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(*log.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_halts_on_failed_confirmation() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let submitted_third = Arc::new(Mutex::new(false));

        let first = PendingItem::submitted(confirming(1, log.clone()));
        let second = PendingItem::submitted(reverting(2));
        let third = PendingItem::deferred({
            let submitted = submitted_third.clone();
            let log = log.clone();
            move || async move {
                *submitted.lock().unwrap() = true;
                Ok(confirming(3, log))
            }
        });

        let result = confirm_all(vec![first, second, third], Duration::ZERO).await;
        assert!(matches!(result, Err(ScriptError::TxConfirmation(_))));
        // The failed second item stopped the batch before the third submitted
        assert!(!*submitted_third.lock().unwrap());
        assert_eq!(*log.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_producer_failure_is_submission_error() {
        let item = PendingItem::deferred(|| async {
            Err(ScriptError::ContractInteraction("nonce too low".to_string()))
        });

        let result = confirm_all(vec![item], Duration::ZERO).await;
        assert!(matches!(result, Err(ScriptError::TxSubmission(_))));
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() {
        confirm_all(Vec::new(), Duration::from_secs(3600))
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_inter_delay() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let items = vec![
            PendingItem::submitted(confirming(1, log.clone())),
            PendingItem::submitted(confirming(2, log.clone())),
        ];

        let start = tokio::time::Instant::now();
        confirm_all(items, Duration::from_millis(500)).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(1000));
    }
}
