//! Benchmarks for the per-request hot paths: decoding registry logs and pricing client batches.

use alloy::{primitives::Address, rpc::types::Log, sol_types::SolEvent};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use registry_watcher::{
    BudgetTracker, EventDecoder, RpcRequest, calculate_cost,
    test_utils::{registry_events, registry_log},
};
use serde_json::json;

const REGISTRY: Address = Address::repeat_byte(0xaa);

fn registry_logs(count: usize) -> Vec<Log> {
    (0..count)
        .map(|i| {
            let block_number = i as u64 + 1;
            if i % 2 == 0 {
                let event = registry_events::LogNodeRegistered {
                    url: format!("https://node-{i}.example"),
                    props: alloy::primitives::U256::from(0xffff),
                    signer: Address::with_last_byte((i % 256) as u8),
                    deposit: alloy::primitives::U256::from(10u64.pow(18)),
                };
                registry_log(REGISTRY, block_number, event.encode_log_data())
            } else {
                let event = registry_events::LogNodeUnregisterRequested {
                    url: format!("https://node-{i}.example"),
                    owner: Address::with_last_byte(1),
                    caller: Address::with_last_byte(2),
                };
                registry_log(REGISTRY, block_number, event.encode_log_data())
            }
        })
        .collect()
}

fn client_batch(size: usize) -> Vec<RpcRequest> {
    (0..size)
        .map(|i| match i % 4 {
            0 => RpcRequest::new("eth_call", vec![json!({ "to": REGISTRY }), json!("latest")]),
            1 => RpcRequest::new(
                "eth_getLogs",
                vec![json!({ "fromBlock": format!("{:#x}", i * 10), "toBlock": "latest" })],
            ),
            2 => RpcRequest::new("eth_getTransactionReceipt", vec![json!("0x01")])
                .with_signers(vec![json!("0x01"), json!("0x02")]),
            _ => RpcRequest::new("eth_blockNumber", vec![]),
        })
        .collect()
}

fn decode_benchmark(c: &mut Criterion) {
    let decoder = EventDecoder::node_registry().expect("registry events parse");
    let mut group = c.benchmark_group("decode");

    for log_count in [100, 1_000, 10_000] {
        let logs = registry_logs(log_count);
        group.throughput(Throughput::Elements(log_count as u64));
        group.bench_with_input(BenchmarkId::new("logs", log_count), &logs, |b, logs| {
            b.iter(|| {
                for log in logs {
                    decoder.decode(log).expect("decodable log");
                }
            });
        });
    }

    group.finish();
}

fn admission_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("admission");

    for batch_size in [1, 10, 100] {
        let batch = client_batch(batch_size);
        group.throughput(Throughput::Elements(batch_size as u64));

        group.bench_with_input(BenchmarkId::new("cost", batch_size), &batch, |b, batch| {
            b.iter(|| batch.iter().map(calculate_cost).sum::<u64>());
        });

        let tracker = BudgetTracker::new();
        group.bench_with_input(BenchmarkId::new("check_budget", batch_size), &batch, |b, batch| {
            let mut client = 0u32;
            b.iter(|| {
                client = client.wrapping_add(1) % 1_000;
                let _ = tracker.check_budget(&format!("10.0.{}.{}", client / 256, client % 256), batch, 0);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, decode_benchmark, admission_benchmark);
criterion_main!(benches);
