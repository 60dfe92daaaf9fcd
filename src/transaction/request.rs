use alloy::primitives::{Address, Bytes, ChainId, U256};

/// A transaction to be built, signed and broadcast by a
/// [`TransactionManager`](crate::TransactionManager).
///
/// Nonce and gas price are looked up on chain when left unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRequest {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    pub gas_limit: u64,
    pub gas_price: Option<u128>,
    pub nonce: Option<u64>,
    pub chain_id: Option<ChainId>,
    /// Wait for a successful receipt instead of returning right after broadcast.
    pub confirm: bool,
}

impl TxRequest {
    #[must_use]
    pub fn new(to: Address, data: impl Into<Bytes>, gas_limit: u64) -> Self {
        Self {
            to,
            data: data.into(),
            value: U256::ZERO,
            gas_limit,
            gas_price: None,
            nonce: None,
            chain_id: None,
            confirm: false,
        }
    }

    #[must_use]
    pub fn value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    #[must_use]
    pub fn gas_price(mut self, gas_price: u128) -> Self {
        self.gas_price = Some(gas_price);
        self
    }

    #[must_use]
    pub fn nonce(mut self, nonce: u64) -> Self {
        self.nonce = Some(nonce);
        self
    }

    /// Sign with EIP-155 replay protection for `chain_id`.
    #[must_use]
    pub fn chain_id(mut self, chain_id: ChainId) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    #[must_use]
    pub fn confirm(mut self, confirm: bool) -> Self {
        self.confirm = confirm;
        self
    }
}
