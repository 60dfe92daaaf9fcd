//! Helpers for tests: mocked providers, canned RPC payloads and in-memory collaborators.

pub mod macros;

use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use alloy::{
    network::Ethereum,
    primitives::{Address, B256, Bloom, LogData, TxHash, U64},
    providers::{RootProvider, mock::Asserter},
    rpc::{client::RpcClient, types::Log},
};
use futures::future::{BoxFuture, FutureExt};
use serde_json::{Value, json};

use crate::{
    error::CollaboratorError,
    robust_provider::{DEFAULT_CALL_TIMEOUT, RobustProvider},
    watcher::{NodeList, NodeListProvider, ValidatorHistory},
};

/// First development account of anvil/hardhat.
pub const TEST_PRIVATE_KEY: &str =
    "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// Registry events encoded with `sol!`, for building logs.
pub mod registry_events {
    alloy::sol! {
        #[derive(Debug)]
        event LogNodeRegistered(string url, uint256 props, address signer, uint256 deposit);
        #[derive(Debug)]
        event LogNodeUnregisterRequested(string url, address owner, address caller);
        #[derive(Debug)]
        event LogNodeConvicted(address signer);
    }
}

#[must_use]
pub fn mocked_root_provider(asserter: &Asserter) -> RootProvider<Ethereum> {
    RootProvider::new(RpcClient::mocked(asserter.clone()))
}

/// Provider answering from `asserter`, without retries so every queued response maps to one
/// call.
#[must_use]
pub fn mocked_robust_provider(asserter: &Asserter) -> RobustProvider<Ethereum> {
    RobustProvider {
        primary_provider: mocked_root_provider(asserter),
        fallback_providers: vec![],
        call_timeout: DEFAULT_CALL_TIMEOUT,
        max_retries: 0,
        min_delay: std::time::Duration::ZERO,
    }
}

/// `eth_getBlockByNumber` response without transactions.
#[must_use]
pub fn block_json(number: u64, hash: B256) -> Value {
    json!({
        "hash": hash,
        "parentHash": B256::ZERO,
        "sha3Uncles": B256::ZERO,
        "miner": Address::ZERO,
        "stateRoot": B256::ZERO,
        "transactionsRoot": B256::ZERO,
        "receiptsRoot": B256::ZERO,
        "logsBloom": Bloom::ZERO,
        "difficulty": "0x0",
        "number": U64::from(number),
        "gasLimit": "0x1c9c380",
        "gasUsed": "0x0",
        "timestamp": "0x0",
        "extraData": "0x",
        "mixHash": B256::ZERO,
        "nonce": "0x0000000000000000",
        "baseFeePerGas": "0x7",
        "uncles": [],
        "transactions": [],
    })
}

/// `eth_getTransactionReceipt` response of a legacy transaction.
#[must_use]
pub fn receipt_json(hash: TxHash, success: bool, gas_used: u64) -> Value {
    json!({
        "transactionHash": hash,
        "transactionIndex": "0x0",
        "blockHash": B256::with_last_byte(1),
        "blockNumber": "0x1",
        "from": Address::ZERO,
        "to": Address::ZERO,
        "cumulativeGasUsed": U64::from(gas_used),
        "gasUsed": U64::from(gas_used),
        "effectiveGasPrice": "0x1",
        "contractAddress": null,
        "logs": [],
        "logsBloom": Bloom::ZERO,
        "type": "0x0",
        "status": if success { "0x1" } else { "0x0" },
    })
}

/// A log of `contract` included in `block_number`.
#[must_use]
pub fn registry_log(contract: Address, block_number: u64, data: LogData) -> Log {
    Log {
        inner: alloy::primitives::Log { address: contract, data },
        block_number: Some(block_number),
        block_hash: Some(B256::left_padding_from(&block_number.to_be_bytes())),
        transaction_hash: Some(B256::ZERO),
        transaction_index: Some(0),
        log_index: Some(0),
        ..Default::default()
    }
}

/// Node list served from memory that records every refresh request.
#[derive(Debug, Clone, Default)]
pub struct StaticNodeList {
    list: Arc<Mutex<NodeList>>,
    updates: Arc<Mutex<Vec<u64>>>,
    failing: Arc<AtomicBool>,
}

impl StaticNodeList {
    #[must_use]
    pub fn new(list: NodeList) -> Self {
        Self { list: Arc::new(Mutex::new(list)), ..Self::default() }
    }

    /// Blocks passed to `update_node_list`, in call order.
    #[must_use]
    pub fn updates(&self) -> Vec<u64> {
        self.updates.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Makes `node_list` fail until reset.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl NodeListProvider for StaticNodeList {
    fn node_list(&self, _refresh: bool) -> BoxFuture<'_, Result<NodeList, CollaboratorError>> {
        let result = if self.failing.load(Ordering::SeqCst) {
            Err("node list unavailable".into())
        } else {
            Ok(self.list.lock().unwrap_or_else(PoisonError::into_inner).clone())
        };
        futures::future::ready(result).boxed()
    }

    fn update_node_list(&self, at_block: u64) -> BoxFuture<'_, Result<(), CollaboratorError>> {
        self.updates.lock().unwrap_or_else(PoisonError::into_inner).push(at_block);
        futures::future::ready(Ok(())).boxed()
    }
}

/// Validator history that only counts how often it was refreshed.
#[derive(Debug, Clone, Default)]
pub struct CountingValidatorHistory {
    calls: Arc<AtomicUsize>,
}

impl CountingValidatorHistory {
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ValidatorHistory for CountingValidatorHistory {
    fn update_validator_history(&self) -> BoxFuture<'_, Result<(), CollaboratorError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        futures::future::ready(Ok(())).boxed()
    }
}
