use alloy::{
    dyn_abi::{DynSolValue, FunctionExt, JsonAbiExt},
    json_abi::Function,
    network::TransactionBuilder,
    primitives::{Address, Bytes, Selector},
    rpc::types::TransactionRequest,
};

use crate::{error::TransactionError, robust_provider::RobustProvider, transaction::TxRequest};

/// A contract function described by a compact signature.
///
/// Accepted forms are `name(types)` and `name(types):(outputs)`, for example
/// `cancelUnregisteringServer(uint256)` or `totalServers():(uint256)`. When no outputs are
/// declared, read-only calls decode the return data as a single `uint256`.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractCall {
    function: Function,
    args: Vec<DynSolValue>,
}

impl ContractCall {
    /// # Errors
    ///
    /// Returns [`TransactionError::InvalidSignature`] if `signature` is not a valid function
    /// signature.
    pub fn parse(signature: &str) -> Result<Self, TransactionError> {
        let (inputs, outputs) = match signature.split_once(':') {
            Some((inputs, outputs)) => (inputs.trim(), outputs.trim()),
            None => (signature.trim(), "()"),
        };
        let outputs = if outputs == "()" { "(uint256)" } else { outputs };

        let function = Function::parse(&format!("function {inputs} returns {outputs}")).map_err(
            |err| TransactionError::InvalidSignature {
                signature: signature.to_owned(),
                reason: err.to_string(),
            },
        )?;

        Ok(Self { function, args: Vec::new() })
    }

    #[must_use]
    pub fn with_args(mut self, args: Vec<DynSolValue>) -> Self {
        self.args = args;
        self
    }

    #[must_use]
    pub fn function(&self) -> &Function {
        &self.function
    }

    /// First four bytes of the keccak hash of the canonical signature.
    #[must_use]
    pub fn selector(&self) -> Selector {
        self.function.selector()
    }

    /// Selector followed by the ABI-encoded arguments.
    ///
    /// # Errors
    ///
    /// Returns [`TransactionError::Abi`] when the arguments do not match the input types.
    pub fn calldata(&self) -> Result<Bytes, TransactionError> {
        Ok(self.function.abi_encode_input(&self.args)?.into())
    }

    /// Turns the call into a transaction to `to` with the given gas limit.
    ///
    /// # Errors
    ///
    /// Returns [`TransactionError::Abi`] when the arguments do not match the input types.
    pub fn into_request(self, to: Address, gas_limit: u64) -> Result<TxRequest, TransactionError> {
        Ok(TxRequest::new(to, self.calldata()?, gas_limit))
    }

    /// Executes the call read-only (`eth_call` at the latest block) and decodes the return data.
    ///
    /// # Errors
    ///
    /// * [`TransactionError::Abi`] - arguments or return data do not match the signature.
    /// * [`TransactionError::Provider`] - the call itself failed.
    pub async fn call(
        &self,
        provider: &RobustProvider,
        to: Address,
    ) -> Result<Vec<DynSolValue>, TransactionError> {
        let tx = TransactionRequest::default().with_to(to).with_input(self.calldata()?);
        let output = provider.call(&tx).await.inspect_err(|err| {
            error!(contract = %to, function = %self.function.name, error = %err, "Could not call contract");
        })?;
        Ok(self.function.abi_decode_output(&output)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::{
        primitives::{B256, U256, address, hex},
        providers::mock::Asserter,
    };

    use crate::test_utils::mocked_robust_provider;

    #[test]
    fn selector_matches_canonical_signature() -> anyhow::Result<()> {
        let call = ContractCall::parse("cancelUnregisteringServer(uint256)")?;
        let hash = alloy::primitives::keccak256("cancelUnregisteringServer(uint256)");
        assert_eq!(call.selector().as_slice(), &hash[..4]);
        Ok(())
    }

    #[test]
    fn calldata_is_selector_and_arguments() -> anyhow::Result<()> {
        let calldata = ContractCall::parse("cancelUnregisteringServer(uint256)")?
            .with_args(vec![DynSolValue::Uint(U256::from(5), 256)])
            .calldata()?;

        assert_eq!(calldata.len(), 4 + 32);
        assert_eq!(calldata[35], 5);
        Ok(())
    }

    #[test]
    fn mismatched_arguments_are_rejected() -> anyhow::Result<()> {
        let call = ContractCall::parse("cancelUnregisteringServer(uint256)")?
            .with_args(vec![DynSolValue::Bool(true)]);
        assert!(matches!(call.calldata(), Err(TransactionError::Abi(_))));
        Ok(())
    }

    #[test]
    fn invalid_signature_is_rejected() {
        let err = ContractCall::parse("broken(uint256").unwrap_err();
        assert!(matches!(err, TransactionError::InvalidSignature { .. }));
    }

    #[test]
    fn outputs_default_to_uint256() -> anyhow::Result<()> {
        let call = ContractCall::parse("totalServers()")?;
        assert_eq!(call.function().outputs.len(), 1);
        assert_eq!(call.function().outputs[0].ty, "uint256");

        let call = ContractCall::parse("registryId():(bytes32)")?;
        assert_eq!(call.function().outputs[0].ty, "bytes32");
        Ok(())
    }

    #[tokio::test]
    async fn read_only_call_decodes_outputs() -> anyhow::Result<()> {
        let asserter = Asserter::new();
        let word = B256::with_last_byte(9);
        asserter.push_success(&hex::encode_prefixed(word));
        let provider = mocked_robust_provider(&asserter);

        let values = ContractCall::parse("totalServers()")?
            .call(&provider, address!("0x00000000000000000000000000000000000000aa"))
            .await?;

        assert_eq!(values, vec![DynSolValue::Uint(U256::from(9), 256)]);
        Ok(())
    }
}
