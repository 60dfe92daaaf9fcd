use std::time::Duration;

use registry_watcher::{AdmissionError, BudgetTracker, RpcRequest, calculate_cost};
use serde_json::json;

fn batch(value: serde_json::Value) -> Vec<RpcRequest> {
    serde_json::from_value(value).expect("valid batch")
}

#[test]
fn requests_are_priced_from_the_wire_format() {
    let requests = batch(json!([
        { "jsonrpc": "2.0", "id": 1, "method": "eth_blockNumber", "params": [] },
        {
            "jsonrpc": "2.0",
            "id": 2,
            "method": "eth_getBalance",
            "params": ["0x0000000000000000000000000000000000000001", "latest"],
            "in3": { "signers": ["0x01", "0x02"] }
        },
        {
            "jsonrpc": "2.0",
            "id": 3,
            "method": "eth_getLogs",
            "params": [{ "fromBlock": "0x10", "toBlock": "latest" }]
        },
        { "jsonrpc": "2.0", "id": 4, "method": "in3_sign", "params": [[{ "blockNumber": 1 }, { "blockNumber": 2 }]] }
    ]));

    let costs: Vec<u64> = requests.iter().map(calculate_cost).collect();

    assert_eq!(costs, vec![5, 20 + 2 * 20, (1 + 1000 - 16) + 10, 2 * 20]);
}

#[tokio::test(start_paused = true)]
async fn client_budget_resets_after_the_window() {
    let tracker = BudgetTracker::new().window(Duration::from_secs(60));
    let calls = batch(json!([
        { "method": "eth_call", "params": [] },
        { "method": "eth_call", "params": [] }
    ]));

    assert!(tracker.check_budget("10.0.0.1", &calls, 150).is_ok());
    let err = tracker.check_budget("10.0.0.1", &calls, 150).unwrap_err();
    assert_eq!(
        err,
        AdmissionError::BudgetExceeded { client: "10.0.0.1".into(), costs: 200, max_points: 150 }
    );
    // another client is unaffected
    assert!(tracker.check_budget("10.0.0.2", &calls, 150).is_ok());

    tokio::time::advance(Duration::from_secs(61)).await;

    assert!(tracker.check_budget("10.0.0.1", &calls, 150).is_ok());
    assert_eq!(tracker.costs("10.0.0.1"), Some(100));
}

#[tokio::test(start_paused = true)]
async fn unlimited_clients_are_still_tracked() {
    let tracker = BudgetTracker::new();
    let request = [RpcRequest::new("eth_getTransactionReceipt", vec![])];

    for _ in 0..100 {
        assert!(tracker.check_budget("unlimited", &request, 0).is_ok());
    }

    assert_eq!(tracker.costs("unlimited"), Some(100 * 40));
}
