use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use alloy::{
    dyn_abi::DynSolValue,
    primitives::{Address, B256, TxHash, U256},
};
use tokio::{sync::mpsc, task::JoinHandle};

use crate::{
    abi::registry::{REVEAL_CONVICT, REVEAL_CONVICT_GAS},
    error::TransactionError,
    transaction::{ContractCall, TransactionManager, TxRequest},
};

/// Number of blocks that must pass after the convict transaction before the reveal.
pub const REVEAL_DELAY_BLOCKS: u64 = 3;

/// Evidence against a node that signed a wrong block, waiting to be revealed on chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingConviction {
    /// Block of the initial `convict` transaction.
    pub convict_block_number: u64,
    pub signer: Address,
    pub wrong_block_hash: B256,
    pub wrong_block_number: u64,
    pub v: u8,
    pub r: B256,
    pub s: B256,
    /// Whether the block recreation needed for the reveal has finished.
    pub recreation_done: bool,
}

impl PendingConviction {
    /// Revealable once `current_block > convict_block_number + 3` and recreation finished.
    #[must_use]
    pub fn is_mature(&self, current_block: u64) -> bool {
        self.recreation_done
            && current_block > self.convict_block_number.saturating_add(REVEAL_DELAY_BLOCKS)
    }

    /// Non-confirming `revealConvict` transaction to `registry`.
    ///
    /// # Errors
    ///
    /// Only fails if the built-in function signature is malformed.
    pub fn reveal_request(&self, registry: Address) -> Result<TxRequest, TransactionError> {
        ContractCall::parse(REVEAL_CONVICT)?
            .with_args(vec![
                DynSolValue::Address(self.signer),
                DynSolValue::FixedBytes(self.wrong_block_hash, 32),
                DynSolValue::Uint(U256::from(self.wrong_block_number), 256),
                DynSolValue::Uint(U256::from(self.v), 8),
                DynSolValue::FixedBytes(self.r, 32),
                DynSolValue::FixedBytes(self.s, 32),
            ])
            .into_request(registry, REVEAL_CONVICT_GAS)
            .map(|request| request.confirm(false))
    }
}

/// Shared FIFO of pending convictions.
///
/// Clones share the queue, so upstream code can keep pushing while the watcher owns the sweep.
#[derive(Debug, Clone, Default)]
pub struct ConvictionQueue {
    inner: Arc<Mutex<VecDeque<PendingConviction>>>,
}

impl ConvictionQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<PendingConviction>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, conviction: PendingConviction) {
        self.lock().push_back(conviction);
    }

    /// Flags every queued conviction of `signer` as ready; returns how many were flagged.
    pub fn mark_recreation_done(&self, signer: Address) -> usize {
        let mut queue = self.lock();
        let mut flagged = 0;
        for conviction in queue.iter_mut().filter(|c| c.signer == signer) {
            conviction.recreation_done = true;
            flagged += 1;
        }
        flagged
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of the queue, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<PendingConviction> {
        self.lock().iter().cloned().collect()
    }

    /// Removes and returns every mature entry, oldest first. Immature entries keep their order.
    pub(crate) fn take_mature(&self, current_block: u64) -> Vec<PendingConviction> {
        let mut queue = self.lock();
        let (mature, waiting): (Vec<_>, Vec<_>) =
            queue.drain(..).partition(|conviction| conviction.is_mature(current_block));
        *queue = waiting.into();
        mature
    }
}

/// Outcome of one reveal attempt, sent on the watcher's report channel.
#[derive(Debug)]
pub struct RevealReport {
    pub conviction: PendingConviction,
    pub result: Result<TxHash, TransactionError>,
}

/// Submits the reveals one after another on a detached task.
///
/// The nonce is looked up once per sweep and incremented locally after every accepted
/// broadcast, since earlier reveals are still pending when later ones are sent. A failing reveal
/// is logged and reported; the remaining ones are still attempted with the unused nonce.
pub(crate) fn spawn_reveals(
    transactions: TransactionManager,
    registry: Address,
    convictions: Vec<PendingConviction>,
    reports: mpsc::UnboundedSender<RevealReport>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let from = transactions.address();
        let mut nonce = match transactions.provider().get_transaction_count(from).await {
            Ok(nonce) => Some(nonce),
            Err(err) => {
                warn!(error = %err, "Could not look up the nonce for the reveal sweep");
                None
            }
        };

        for conviction in convictions {
            let result = match conviction.reveal_request(registry) {
                Ok(request) => {
                    let request = match nonce {
                        Some(nonce) => request.nonce(nonce),
                        None => request,
                    };
                    transactions.submit(request).await.map(|outcome| outcome.tx_hash())
                }
                Err(err) => Err(err),
            };

            match &result {
                Ok(hash) => {
                    nonce = nonce.map(|nonce| nonce + 1);
                    info!(signer = %conviction.signer, tx_hash = %hash, "Sent revealConvict");
                }
                Err(err) => {
                    report!(err, signer = %conviction.signer, "Error sending revealConvict");
                }
            }

            // nobody listening is fine
            let _ = reports.send(RevealReport { conviction, result });
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conviction(convict_block_number: u64, recreation_done: bool) -> PendingConviction {
        PendingConviction {
            convict_block_number,
            signer: Address::with_last_byte(convict_block_number as u8),
            wrong_block_hash: B256::with_last_byte(1),
            wrong_block_number: convict_block_number - 1,
            v: 27,
            r: B256::with_last_byte(2),
            s: B256::with_last_byte(3),
            recreation_done,
        }
    }

    #[test]
    fn maturity_requires_delay_and_recreation() {
        let ready = conviction(100, true);
        assert!(!ready.is_mature(100));
        assert!(!ready.is_mature(103));
        assert!(ready.is_mature(104));

        let unfinished = conviction(100, false);
        assert!(!unfinished.is_mature(1_000));
    }

    #[test]
    fn take_mature_removes_every_eligible_entry_in_order() {
        let queue = ConvictionQueue::new();
        queue.push(conviction(10, true));
        queue.push(conviction(50, true));
        queue.push(conviction(11, true));
        queue.push(conviction(12, false));

        let mature = queue.take_mature(20);

        assert_eq!(
            mature.iter().map(|c| c.convict_block_number).collect::<Vec<_>>(),
            vec![10, 11]
        );
        assert_eq!(
            queue.snapshot().iter().map(|c| c.convict_block_number).collect::<Vec<_>>(),
            vec![50, 12]
        );
    }

    #[test]
    fn recreation_flag_unlocks_entries() {
        let queue = ConvictionQueue::new();
        let pending = conviction(10, false);
        let signer = pending.signer;
        queue.push(pending);

        assert!(queue.take_mature(20).is_empty());
        assert_eq!(queue.mark_recreation_done(signer), 1);
        assert_eq!(queue.take_mature(20).len(), 1);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn sweep_increments_the_nonce_locally() -> anyhow::Result<()> {
        use alloy::{
            primitives::{U64, b256},
            providers::mock::Asserter,
        };

        use crate::test_utils::{TEST_PRIVATE_KEY, mocked_robust_provider};

        let first = b256!("0x00000000000000000000000000000000000000000000000000000000000000e1");
        let second = b256!("0x00000000000000000000000000000000000000000000000000000000000000e2");
        let asserter = Asserter::new();
        asserter.push_success(&U64::from(7));
        asserter.push_success(&U256::from(1_000_000_000u64));
        asserter.push_success(&first);
        // no second nonce lookup: the next response is already the gas price
        asserter.push_success(&U256::from(1_000_000_000u64));
        asserter.push_success(&second);

        let transactions =
            TransactionManager::new(mocked_robust_provider(&asserter), TEST_PRIVATE_KEY.parse()?);
        let (reports_tx, mut reports) = mpsc::unbounded_channel();
        spawn_reveals(
            transactions,
            Address::with_last_byte(0xaa),
            vec![conviction(10, true), conviction(11, true)],
            reports_tx,
        )
        .await?;

        let hashes: Vec<_> = [reports.recv().await, reports.recv().await]
            .into_iter()
            .map(|report| report.map(|report| report.result.ok()))
            .collect();
        assert_eq!(hashes, vec![Some(Some(first)), Some(Some(second))]);
        Ok(())
    }

    #[test]
    fn reveal_request_is_fire_and_forget() -> anyhow::Result<()> {
        let registry = Address::with_last_byte(0xaa);
        let request = conviction(10, true).reveal_request(registry)?;

        assert_eq!(request.to, registry);
        assert_eq!(request.gas_limit, REVEAL_CONVICT_GAS);
        assert!(!request.confirm);
        assert_eq!(request.data.len(), 4 + 6 * 32);
        Ok(())
    }
}
