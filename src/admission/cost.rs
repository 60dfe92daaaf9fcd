use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Block range charged for `latest`/`pending` and for filters without a range.
pub const MAX_BLOCKS: u64 = 1000;
/// Cost per signature a client asks for.
pub const SIGNATURE_COST: u64 = 20;

/// The parts of an inbound JSON-RPC request that decide its cost.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub params: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in3: Option<RequestConfig>,
}

/// Relay-specific request options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestConfig {
    /// Nodes asked to sign the response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signers: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signatures: Option<Vec<Value>>,
}

impl RpcRequest {
    pub fn new(method: impl Into<String>, params: Vec<Value>) -> Self {
        Self { method: method.into(), params, in3: None }
    }

    /// Asks for `signers` signatures.
    #[must_use]
    pub fn with_signers(mut self, signers: Vec<Value>) -> Self {
        self.in3.get_or_insert_with(RequestConfig::default).signers = Some(signers);
        self
    }

    /// Number of signatures requested, from `signers` or else `signatures`.
    #[must_use]
    pub fn signature_count(&self) -> usize {
        self.in3
            .as_ref()
            .and_then(|config| config.signers.as_ref().or(config.signatures.as_ref()))
            .map_or(0, Vec::len)
    }
}

/// Cost points of a single request.
///
/// | method | cost |
/// | --- | --- |
/// | `eth_call`, `in3_call`, `eth_estimateGas` | 50 |
/// | `eth_getLogs` | `min(1000, 1 + range) + 10` |
/// | `in3_sign` | 20 per block to sign |
/// | `in3_stats` | 1 |
/// | `eth_blockNumber` | 5 |
/// | `eth_getCode`, `eth_getBalance`, `eth_getTransactionCount`, `eth_getStorageAt` | 20 |
/// | `eth_getTransactionReceipt` | 40 |
/// | `in3_nodeList` | 5 |
/// | anything else | 10 |
///
/// Every method except `in3_sign`, `in3_stats` and `eth_blockNumber` adds
/// [`SIGNATURE_COST`] per requested signature. An empty method costs nothing.
#[must_use]
pub fn calculate_cost(request: &RpcRequest) -> u64 {
    if request.method.is_empty() {
        return 0;
    }
    let signatures = request.signature_count() as u64 * SIGNATURE_COST;

    match request.method.as_str() {
        "eth_call" | "in3_call" | "eth_estimateGas" => signatures + 50,
        "eth_getLogs" => {
            let range = match request.params.first() {
                Some(filter) if !filter.is_null() => {
                    to_block_number(filter.get("toBlock"))
                        .saturating_sub(to_block_number(filter.get("fromBlock")))
                }
                _ => MAX_BLOCKS,
            };
            signatures + range.saturating_add(1).min(MAX_BLOCKS) + 10
        }
        "in3_sign" => {
            let blocks = match request.params.first() {
                Some(Value::Array(blocks)) => blocks.len(),
                Some(Value::String(blocks)) => blocks.len(),
                _ => 0,
            };
            blocks as u64 * SIGNATURE_COST
        }
        "in3_stats" => 1,
        "eth_blockNumber" => 5,
        "eth_getCode" | "eth_getBalance" | "eth_getTransactionCount" | "eth_getStorageAt" => {
            signatures + 20
        }
        "eth_getTransactionReceipt" => signatures + 40,
        "in3_nodeList" => signatures + 5,
        _ => signatures + 10,
    }
}

/// Block number of a filter bound. Tags map to `0` or [`MAX_BLOCKS`], anything unparsable to `0`.
fn to_block_number(tag: Option<&Value>) -> u64 {
    match tag {
        Some(Value::Number(number)) => number.as_u64().unwrap_or(0),
        Some(Value::String(tag)) => match tag.as_str() {
            "latest" | "pending" => MAX_BLOCKS,
            "earliest" | "" => 0,
            tag => match tag.strip_prefix("0x").or_else(|| tag.strip_prefix("0X")) {
                Some(hex) => u64::from_str_radix(hex, 16).unwrap_or(0),
                None => tag.parse().unwrap_or(0),
            },
        },
        _ => 0,
    }
}
