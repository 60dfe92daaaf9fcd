use std::{sync::Arc, time::Duration};

use alloy::{
    eips::{BlockId, BlockNumberOrTag},
    network::{Ethereum, Network},
    primitives::{Address, Bytes, TxHash},
    providers::{Provider, RootProvider},
    rpc::types::{Filter, Log},
    transports::{RpcError, TransportErrorKind},
};
use backon::{ExponentialBuilder, Retryable};
use thiserror::Error;
use tokio::time::{error::Elapsed, timeout};

/// Errors surfaced by [`RobustProvider`] once retries and fallbacks are exhausted.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// The last provider attempted returned a transport or JSON-RPC error.
    #[error("RPC error: {0}")]
    RpcError(Arc<RpcError<TransportErrorKind>>),

    /// The total call timeout elapsed.
    #[error("Operation timed out")]
    Timeout,

    /// The node answered, but knows no block for the requested id.
    #[error("Block not found, Block Id: {0}")]
    BlockNotFound(BlockId),
}

impl From<RpcError<TransportErrorKind>> for Error {
    fn from(error: RpcError<TransportErrorKind>) -> Self {
        Error::RpcError(Arc::new(error))
    }
}

impl From<Elapsed> for Error {
    fn from(_: Elapsed) -> Self {
        Error::Timeout
    }
}

/// Provider wrapper with built-in retry, timeout and failover.
///
/// Every call is bounded by `call_timeout`, retried with exponential backoff against the primary
/// provider and then against each fallback provider in insertion order.
#[derive(Clone, Debug)]
pub struct RobustProvider<N: Network = Ethereum> {
    pub(crate) primary_provider: RootProvider<N>,
    pub(crate) fallback_providers: Vec<RootProvider<N>>,
    pub(crate) call_timeout: Duration,
    pub(crate) max_retries: usize,
    pub(crate) min_delay: Duration,
}

impl<N: Network> RobustProvider<N> {
    /// Get a reference to the primary provider
    #[must_use]
    pub fn primary(&self) -> &RootProvider<N> {
        &self.primary_provider
    }

    /// `eth_blockNumber`
    ///
    /// # Errors
    ///
    /// See [retry errors](#retry-errors).
    pub async fn get_block_number(&self) -> Result<u64, Error> {
        trace!("eth_blockNumber called");
        let result = self
            .try_operation_with_failover(|provider| async move {
                provider.get_block_number().await
            })
            .await;
        if let Err(e) = &result {
            error!(error = %e, "eth_blockNumber failed");
        }
        result
    }

    /// `eth_getBlockByNumber` without transaction bodies.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BlockNotFound`] when the node has no such block, otherwise see
    /// [retry errors](#retry-errors).
    pub async fn get_block_by_number(
        &self,
        number: BlockNumberOrTag,
    ) -> Result<N::BlockResponse, Error> {
        trace!(block = %number, "eth_getBlockByNumber called");
        let result = self
            .try_operation_with_failover(move |provider| async move {
                provider.get_block_by_number(number).await
            })
            .await;
        if let Err(e) = &result {
            error!(error = %e, "eth_getBlockByNumber failed");
        }

        result?.ok_or_else(|| Error::BlockNotFound(number.into()))
    }

    /// `eth_getLogs` for the given [`Filter`].
    ///
    /// # Errors
    ///
    /// See [retry errors](#retry-errors).
    pub async fn get_logs(&self, filter: &Filter) -> Result<Vec<Log>, Error> {
        trace!("eth_getLogs called");
        let result = self
            .try_operation_with_failover(move |provider| async move {
                provider.get_logs(filter).await
            })
            .await;
        if let Err(e) = &result {
            error!(error = %e, "eth_getLogs failed");
        }
        result
    }

    /// `eth_getTransactionCount` of `address` at the latest block.
    ///
    /// # Errors
    ///
    /// See [retry errors](#retry-errors).
    pub async fn get_transaction_count(&self, address: Address) -> Result<u64, Error> {
        trace!(address = %address, "eth_getTransactionCount called");
        let result = self
            .try_operation_with_failover(move |provider| async move {
                provider.get_transaction_count(address).latest().await
            })
            .await;
        if let Err(e) = &result {
            error!(error = %e, "eth_getTransactionCount failed");
        }
        result
    }

    /// `eth_gasPrice`
    ///
    /// # Errors
    ///
    /// See [retry errors](#retry-errors).
    pub async fn get_gas_price(&self) -> Result<u128, Error> {
        trace!("eth_gasPrice called");
        let result = self
            .try_operation_with_failover(|provider| async move { provider.get_gas_price().await })
            .await;
        if let Err(e) = &result {
            error!(error = %e, "eth_gasPrice failed");
        }
        result
    }

    /// `eth_sendRawTransaction` for an EIP-2718 encoded, signed transaction.
    ///
    /// Sent exactly once to the primary provider. A rejected transaction is never re-broadcast.
    ///
    /// # Errors
    ///
    /// See [single-attempt errors](#single-attempt-errors).
    pub async fn send_raw_transaction(&self, encoded: &[u8]) -> Result<TxHash, Error> {
        trace!("eth_sendRawTransaction called");
        let result = self
            .try_primary_once(move |provider| async move {
                provider.send_raw_transaction(encoded).await.map(|pending| *pending.tx_hash())
            })
            .await;
        if let Err(e) = &result {
            error!(error = %e, "eth_sendRawTransaction failed");
        }
        result
    }

    /// `eth_getTransactionReceipt`; `None` while the transaction is still pending.
    ///
    /// A single query against the primary provider; polling is left to the caller.
    ///
    /// # Errors
    ///
    /// See [single-attempt errors](#single-attempt-errors).
    pub async fn get_transaction_receipt(
        &self,
        hash: TxHash,
    ) -> Result<Option<N::ReceiptResponse>, Error> {
        trace!(tx_hash = %hash, "eth_getTransactionReceipt called");
        let result = self
            .try_primary_once(move |provider| async move {
                provider.get_transaction_receipt(hash).await
            })
            .await;
        if let Err(e) = &result {
            error!(error = %e, "eth_getTransactionReceipt failed");
        }
        result
    }

    /// `eth_call` against the latest block.
    ///
    /// # Errors
    ///
    /// See [retry errors](#retry-errors).
    pub async fn call(&self, tx: &N::TransactionRequest) -> Result<Bytes, Error> {
        trace!("eth_call called");
        let result = self
            .try_operation_with_failover(move |provider| async move {
                provider.call(tx.clone()).await
            })
            .await;
        if let Err(e) = &result {
            error!(error = %e, "eth_call failed");
        }
        result
    }

    /// Execute `operation` with exponential backoff and a total timeout, first against the
    /// primary provider and then against each fallback provider.
    ///
    /// # Errors
    /// <a name="retry-errors"></a>
    ///
    /// * [`Error::Timeout`] if the last provider attempted exceeded `call_timeout`.
    /// * [`Error::RpcError`] carrying the last provider's error once its retries are exhausted.
    pub(crate) async fn try_operation_with_failover<T, F, Fut>(
        &self,
        operation: F,
    ) -> Result<T, Error>
    where
        F: Fn(RootProvider<N>) -> Fut,
        Fut: Future<Output = Result<T, RpcError<TransportErrorKind>>>,
    {
        let mut last_error = match self.try_provider_with_timeout(self.primary(), &operation).await
        {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        let num_fallbacks = self.fallback_providers.len();
        if num_fallbacks > 0 {
            info!("Primary provider failed, trying fallback provider(s)");
        }

        for (fallback_idx, provider) in self.fallback_providers.iter().enumerate() {
            debug!(
                provider_num = fallback_idx + 1,
                num_fallbacks = num_fallbacks,
                "Attempting fallback provider"
            );
            match self.try_provider_with_timeout(provider, &operation).await {
                Ok(value) => {
                    info!(provider_num = fallback_idx + 1, "Fallback provider succeeded");
                    return Ok(value);
                }
                Err(e) => {
                    warn!(provider_num = fallback_idx + 1, error = %e, "Fallback provider failed");
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }

    /// Execute `operation` once against the primary provider, bounded by `call_timeout`.
    ///
    /// # Errors
    /// <a name="single-attempt-errors"></a>
    ///
    /// * [`Error::Timeout`] if the call exceeded `call_timeout`.
    /// * [`Error::RpcError`] carrying the primary provider's error.
    pub(crate) async fn try_primary_once<T, F, Fut>(&self, operation: F) -> Result<T, Error>
    where
        F: FnOnce(RootProvider<N>) -> Fut,
        Fut: Future<Output = Result<T, RpcError<TransportErrorKind>>>,
    {
        Ok(timeout(self.call_timeout, operation(self.primary().clone())).await??)
    }

    /// Try executing an operation with a specific provider with retry and timeout.
    async fn try_provider_with_timeout<T, F, Fut>(
        &self,
        provider: &RootProvider<N>,
        operation: F,
    ) -> Result<T, Error>
    where
        F: Fn(RootProvider<N>) -> Fut,
        Fut: Future<Output = Result<T, RpcError<TransportErrorKind>>>,
    {
        let retry_strategy = ExponentialBuilder::default()
            .with_max_times(self.max_retries)
            .with_min_delay(self.min_delay);

        timeout(
            self.call_timeout,
            (|| operation(provider.clone()))
                .retry(retry_strategy)
                .notify(|err: &RpcError<TransportErrorKind>, dur: Duration| {
                    debug!(error = %err, delay_ms = dur.as_millis(), "RPC error, retrying");
                })
                .sleep(tokio::time::sleep),
        )
        .await?
        .map_err(Error::from)
    }
}
