use alloy::dyn_abi::{FunctionExt, JsonAbiExt};
use alloy::json_abi::{Function, JsonAbi, StateMutability};
use alloy::primitives::{Address, Bytes};
use futures::future::join_all;

use crate::data::aggregate;
use crate::data::decoder::format_sol_value;
use crate::data::provider::ContractReader;
use crate::data::source;
use serde_json::Value;

use crate::data::types::{
    ContractAbi, ContractInfo, ContractSource, ContractSourceRecord, StateVariable,
};
use crate::error::{AppError, Result};

/// What the explorer puts in the `ABI` field of unverified contracts.
pub const UNVERIFIED_ABI: &str = "Contract source code not verified";

impl From<ContractSourceRecord> for ContractSource {
    fn from(record: ContractSourceRecord) -> Self {
        let non_empty = |s: String| (!s.trim().is_empty()).then_some(s);

        let abi = if record.abi.trim().is_empty() || record.abi == UNVERIFIED_ABI {
            None
        } else {
            match ContractAbi::from_json(&record.abi) {
                Ok(abi) => Some(abi),
                Err(e) => {
                    tracing::debug!(error = %e, "ignoring unparseable contract ABI");
                    None
                }
            }
        };

        Self {
            source_code: non_empty(record.source_code).map(|raw| source::reconstruct(&raw)),
            contract_name: non_empty(record.contract_name),
            compiler_version: non_empty(record.compiler_version),
            optimization_used: match record.optimization_used.as_str() {
                "1" => Some(true),
                "0" => Some(false),
                _ => None,
            },
            abi,
        }
    }
}

impl ContractAbi {
    /// Parse a JSON ABI array, remembering the order of its functions.
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        let abi: JsonAbi = serde_json::from_str(raw)?;
        let items: Vec<Value> = serde_json::from_str(raw)?;

        let mut function_order: Vec<String> = Vec::new();
        for item in &items {
            // `type` defaults to "function" when omitted.
            let is_function = item
                .get("type")
                .and_then(Value::as_str)
                .is_none_or(|ty| ty == "function");
            let Some(name) = item.get("name").and_then(Value::as_str) else {
                continue;
            };
            if is_function && !function_order.iter().any(|n| n == name) {
                function_order.push(name.to_string());
            }
        }
        Ok(Self {
            abi,
            function_order,
        })
    }

    /// Functions in declaration order. Overloads stay together.
    pub fn functions(&self) -> Vec<&Function> {
        let mut functions: Vec<&Function> = self.abi.functions().collect();
        functions.sort_by_key(|f| {
            self.function_order
                .iter()
                .position(|n| *n == f.name)
                .unwrap_or(usize::MAX)
        });
        functions
    }
}

/// Without a recorded order, functions come back sorted by name.
impl From<JsonAbi> for ContractAbi {
    fn from(abi: JsonAbi) -> Self {
        Self {
            abi,
            function_order: Vec::new(),
        }
    }
}

impl ContractSource {
    pub fn is_verified(&self) -> bool {
        self.abi.is_some() || self.source_code.is_some()
    }
}

/// Read code and native balance concurrently.
///
/// The explorer's source metadata is merged in by the caller.
pub async fn inspect(
    reader: &dyn ContractReader,
    chain_id: u64,
    address: Address,
) -> Result<ContractInfo> {
    let (bytecode, balance) = tokio::try_join!(reader.code(address), reader.balance(address))?;
    Ok(ContractInfo {
        address,
        chain_id,
        is_contract: !bytecode.is_empty(),
        bytecode,
        balance,
        source: ContractSource::default(),
    })
}

/// Getters we can call without arguments: `view`/`pure`, no inputs, some output.
pub fn readable_functions(abi: &ContractAbi) -> Vec<&Function> {
    abi.functions()
        .into_iter()
        .filter(|f| {
            matches!(
                f.state_mutability,
                StateMutability::View | StateMutability::Pure
            ) && f.inputs.is_empty()
                && !f.outputs.is_empty()
        })
        .collect()
}

/// Call every readable getter concurrently and keep the ones that succeed.
pub async fn read_state_variables(
    reader: &dyn ContractReader,
    address: Address,
    abi: &ContractAbi,
) -> Vec<StateVariable> {
    let reads = readable_functions(abi)
        .into_iter()
        .map(|function| read_getter(reader, address, function));
    aggregate::collect_successes(join_all(reads).await)
}

async fn read_getter(
    reader: &dyn ContractReader,
    address: Address,
    function: &Function,
) -> Result<StateVariable> {
    let calldata = function
        .abi_encode_input(&[])
        .map_err(|e| AppError::validation(format!("{}: {e}", function.name)))?;
    let output = reader.call(address, Bytes::from(calldata)).await?;
    let values = function
        .abi_decode_output(&output, true)
        .map_err(|e| AppError::MalformedResponse(format!("{}: {e}", function.name)))?;

    let value = match values.as_slice() {
        [single] => format_sol_value(single),
        many => many
            .iter()
            .map(format_sol_value)
            .collect::<Vec<_>>()
            .join(", "),
    };

    Ok(StateVariable {
        name: function.name.clone(),
        ty: function.outputs[0].ty.clone(),
        value,
        raw: values,
    })
}
