#![allow(dead_code)]

use alloy::{
    primitives::{Address, B256, U64, U256},
    providers::mock::Asserter,
    rpc::types::Log,
    signers::local::PrivateKeySigner,
    sol_types::SolEvent,
};
use registry_watcher::{
    TransactionManager, Watcher, WatcherBuilder,
    test_utils::{
        StaticNodeList, TEST_PRIVATE_KEY, block_json, mocked_robust_provider, registry_events,
        registry_log,
    },
    watcher::{NodeInfo, NodeList},
};
use tracing_subscriber::EnvFilter;

pub const REGISTRY: Address = Address::repeat_byte(0xaa);

pub fn signer() -> PrivateKeySigner {
    TEST_PRIVATE_KEY.parse().expect("valid test key")
}

pub fn transactions(asserter: &Asserter) -> TransactionManager {
    TransactionManager::new(mocked_robust_provider(asserter), signer())
}

/// A node list with `REGISTRY` as contract and our own node at index 3.
pub fn node_list() -> NodeList {
    NodeList {
        contract: Some(REGISTRY),
        nodes: vec![
            NodeInfo {
                url: "https://other.example".into(),
                index: 0,
                address: Address::with_last_byte(1),
                ..NodeInfo::default()
            },
            NodeInfo {
                url: "https://me.example".into(),
                index: 3,
                address: signer().address(),
                ..NodeInfo::default()
            },
        ],
        last_block_number: 0,
    }
}

pub fn block_hash(number: u64) -> B256 {
    B256::left_padding_from(&number.to_be_bytes())
}

/// Queues the head, block and log responses of one advancing cycle.
pub fn push_cycle(asserter: &Asserter, head: u64, logs: &[Log]) {
    asserter.push_success(&U64::from(head));
    asserter.push_success(&block_json(head, block_hash(head)));
    asserter.push_success(&logs);
}

/// Queues the nonce, gas price and broadcast responses of one transaction.
pub fn push_broadcast(asserter: &Asserter, nonce: u64, hash: B256) {
    asserter.push_success(&U64::from(nonce));
    asserter.push_success(&U256::from(1_000_000_000u64));
    asserter.push_success(&hash);
}

pub fn unregister_requested_log(block_number: u64, url: &str, owner: Address, caller: Address) -> Log {
    let event = registry_events::LogNodeUnregisterRequested {
        url: url.to_owned(),
        owner,
        caller,
    };
    registry_log(REGISTRY, block_number, event.encode_log_data())
}

pub fn convicted_log(block_number: u64, signer: Address) -> Log {
    let event = registry_events::LogNodeConvicted { signer };
    registry_log(REGISTRY, block_number, event.encode_log_data())
}

/// Routes the crate's logs to the test output, filtered by `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub async fn watcher(
    asserter: &Asserter,
    builder: WatcherBuilder,
    node_list: StaticNodeList,
) -> Watcher {
    init_tracing();
    builder
        .connect(mocked_robust_provider(asserter), transactions(asserter), node_list)
        .await
        .expect("watcher connects")
}
