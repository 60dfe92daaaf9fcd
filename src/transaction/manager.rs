use std::time::Duration;

use alloy::{
    eips::eip2718::Encodable2718,
    network::{EthereumWallet, TransactionBuilder},
    primitives::{Address, TxHash},
    rpc::types::{TransactionReceipt, TransactionRequest},
    signers::local::PrivateKeySigner,
};
use backon::{ExponentialBuilder, Retryable};
use tokio::time::timeout;

use crate::{
    error::TransactionError,
    robust_provider::{Error as RobustProviderError, RobustProvider},
    transaction::TxRequest,
};

/// Default time to wait for a receipt of a confirming transaction.
pub const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_secs(30);
/// First delay between two receipt polls; every further delay doubles.
pub const INITIAL_POLL_DELAY: Duration = Duration::from_millis(400);

/// Result of [`TransactionManager::submit`].
#[derive(Debug, Clone, PartialEq)]
pub enum TxOutcome {
    /// Broadcast without waiting for inclusion.
    Submitted(TxHash),
    /// Included with a successful receipt.
    Confirmed(Box<TransactionReceipt>),
}

impl TxOutcome {
    #[must_use]
    pub fn tx_hash(&self) -> TxHash {
        match self {
            TxOutcome::Submitted(hash) => *hash,
            TxOutcome::Confirmed(receipt) => receipt.transaction_hash,
        }
    }
}

enum Poll {
    Pending,
    Failed(RobustProviderError),
}

/// Builds, signs, broadcasts and optionally confirms transactions of a single signer.
#[derive(Debug, Clone)]
pub struct TransactionManager {
    provider: RobustProvider,
    signer: PrivateKeySigner,
    receipt_timeout: Duration,
}

impl TransactionManager {
    #[must_use]
    pub fn new(provider: RobustProvider, signer: PrivateKeySigner) -> Self {
        Self { provider, signer, receipt_timeout: DEFAULT_RECEIPT_TIMEOUT }
    }

    /// Sets how long [`submit`](Self::submit) waits for the receipt of a confirming request.
    #[must_use]
    pub fn receipt_timeout(mut self, receipt_timeout: Duration) -> Self {
        self.receipt_timeout = receipt_timeout;
        self
    }

    /// Address derived from the signing key.
    #[must_use]
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    #[must_use]
    pub fn provider(&self) -> &RobustProvider {
        &self.provider
    }

    /// Signs and broadcasts `request`, then waits for its receipt if `request.confirm` is set.
    ///
    /// # Errors
    ///
    /// * [`TransactionError::Provider`] - nonce or gas price lookup failed.
    /// * [`TransactionError::Signing`] - the envelope could not be built or signed.
    /// * [`TransactionError::Broadcast`] - `eth_sendRawTransaction` was rejected.
    /// * Any error of [`wait_for_receipt`](Self::wait_for_receipt) for confirming requests.
    pub async fn submit(&self, request: TxRequest) -> Result<TxOutcome, TransactionError> {
        let from = self.address();

        let nonce = match request.nonce {
            Some(nonce) => nonce,
            None => self.provider.get_transaction_count(from).await?,
        };
        let gas_price = match request.gas_price {
            Some(gas_price) => gas_price,
            None => self.provider.get_gas_price().await?,
        };

        let mut tx = TransactionRequest::default()
            .with_from(from)
            .with_to(request.to)
            .with_input(request.data.clone())
            .with_value(request.value)
            .with_nonce(nonce)
            .with_gas_price(gas_price)
            .with_gas_limit(request.gas_limit);
        if let Some(chain_id) = request.chain_id {
            tx.set_chain_id(chain_id);
        }

        let wallet = EthereumWallet::from(self.signer.clone());
        let envelope =
            tx.build(&wallet).await.map_err(|err| TransactionError::Signing(err.to_string()))?;
        let encoded = envelope.encoded_2718();

        let hash = match self.provider.send_raw_transaction(&encoded).await {
            Ok(hash) => hash,
            Err(source) => {
                error!(to = %request.to, nonce = nonce, error = %source, "Error sending the tx");
                return Err(TransactionError::Broadcast { request: Box::new(request), source });
            }
        };
        debug!(tx_hash = %hash, to = %request.to, nonce = nonce, "Transaction broadcast");

        if !request.confirm {
            return Ok(TxOutcome::Submitted(hash));
        }

        let receipt = self.wait_for_receipt(hash, request.gas_limit).await?;
        Ok(TxOutcome::Confirmed(Box::new(receipt)))
    }

    /// Polls for the receipt of `hash` until it shows up or the receipt timeout elapses.
    ///
    /// Delays start at [`INITIAL_POLL_DELAY`] and double, capped at a fifth of the timeout.
    /// A `sent_gas` of zero disables the out-of-gas check.
    ///
    /// # Errors
    ///
    /// * [`TransactionError::ReceiptFetch`] - a receipt query failed.
    /// * [`TransactionError::ConfirmationTimeout`] - no receipt within the timeout.
    /// * [`TransactionError::OutOfGas`] - the receipt used exactly `sent_gas`.
    /// * [`TransactionError::TransactionReverted`] - the receipt reports failure.
    pub async fn wait_for_receipt(
        &self,
        hash: TxHash,
        sent_gas: u64,
    ) -> Result<TransactionReceipt, TransactionError> {
        let max_delay = self.receipt_timeout / 5;
        let backoff = ExponentialBuilder::default()
            .with_min_delay(INITIAL_POLL_DELAY.min(max_delay))
            .with_max_delay(max_delay)
            .with_factor(2.0)
            .without_max_times();

        let poll = || async {
            match self.provider.get_transaction_receipt(hash).await {
                Ok(Some(receipt)) => Ok(receipt),
                Ok(None) => Err(Poll::Pending),
                Err(err) => Err(Poll::Failed(err)),
            }
        };

        let polled = timeout(
            self.receipt_timeout,
            poll.retry(backoff)
                .when(|err| matches!(err, Poll::Pending))
                .notify(|_, delay: Duration| {
                    trace!(tx_hash = %hash, delay_ms = delay.as_millis(), "Receipt not available yet");
                })
                .sleep(tokio::time::sleep),
        )
        .await;

        let receipt = match polled {
            Ok(Ok(receipt)) => receipt,
            Ok(Err(Poll::Failed(source))) => {
                return Err(TransactionError::ReceiptFetch { hash, source });
            }
            Ok(Err(Poll::Pending)) | Err(_) => {
                warn!(tx_hash = %hash, timeout_ms = self.receipt_timeout.as_millis(), "Transaction not confirmed in time");
                return Err(TransactionError::ConfirmationTimeout {
                    hash,
                    timeout: self.receipt_timeout,
                });
            }
        };

        if sent_gas != 0 && receipt.gas_used == sent_gas {
            return Err(TransactionError::OutOfGas { hash, gas_limit: sent_gas });
        }
        if !receipt.status() {
            return Err(TransactionError::TransactionReverted { hash });
        }

        debug!(tx_hash = %hash, gas_used = receipt.gas_used, "Transaction confirmed");
        Ok(receipt)
    }
}
