use std::fs;
use std::io::Write;

use crate::data::types::{ContractInfo, DecodedEvent, StateVariable, Transaction};

/// Export decoded events to CSV format.
///
/// Columns: event, tx_hash, block, timestamp, log_index, params. Parameters are
/// flattened as `name=value` pairs joined by `; `.
pub fn export_events_csv(events: &[DecodedEvent], path: &str) -> Result<String, String> {
    let file = fs::File::create(path).map_err(|e| format!("Failed to create file: {e}"))?;
    let mut wtr = csv::Writer::from_writer(file);

    wtr.write_record(["event", "tx_hash", "block", "timestamp", "log_index", "params"])
        .map_err(|e| format!("Failed to write CSV header: {e}"))?;

    for event in events {
        let params = event
            .params()
            .into_iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");
        wtr.write_record(&[
            event.event_name.clone(),
            event.transaction_hash.clone(),
            event.block().to_string(),
            event.timestamp().to_string(),
            event.key().1.to_string(),
            params,
        ])
        .map_err(|e| format!("Failed to write CSV row: {e}"))?;
    }

    wtr.flush().map_err(|e| format!("Failed to flush CSV: {e}"))?;

    Ok(format!("Exported {} events to {path}", events.len()))
}

/// Export transactions to CSV format.
///
/// Columns: hash, block, timestamp, from, to, value_wei, fee_wei, status, token
pub fn export_transactions_csv(txs: &[Transaction], path: &str) -> Result<String, String> {
    let file = fs::File::create(path).map_err(|e| format!("Failed to create file: {e}"))?;
    let mut wtr = csv::Writer::from_writer(file);

    wtr.write_record([
        "hash",
        "block",
        "timestamp",
        "from",
        "to",
        "value_wei",
        "fee_wei",
        "status",
        "token",
    ])
    .map_err(|e| format!("Failed to write CSV header: {e}"))?;

    for tx in txs {
        wtr.write_record(&[
            tx.hash.clone(),
            tx.block_number.clone(),
            tx.timestamp().to_string(),
            tx.from.clone(),
            tx.to.clone(),
            tx.value_wei().map(|v| v.to_string()).unwrap_or_default(),
            tx.fee_wei().map(|f| f.to_string()).unwrap_or_default(),
            if tx.failed() { "failed" } else { "success" }.to_string(),
            tx.token_symbol.clone(),
        ])
        .map_err(|e| format!("Failed to write CSV row: {e}"))?;
    }

    wtr.flush().map_err(|e| format!("Failed to flush CSV: {e}"))?;

    Ok(format!("Exported {} transactions to {path}", txs.len()))
}

/// Export contract info, with any state readings, to JSON format.
pub fn export_contract_json(
    info: &ContractInfo,
    state: &[StateVariable],
    path: &str,
) -> Result<String, String> {
    let json = serde_json::json!({
        "address": format!("{}", info.address),
        "chain_id": info.chain_id,
        "is_contract": info.is_contract,
        "balance_wei": info.balance.to_string(),
        "bytecode_size": info.bytecode.len(),
        "verified": info.source.is_verified(),
        "contract_name": info.source.contract_name,
        "compiler_version": info.source.compiler_version,
        "optimization_used": info.source.optimization_used,
        "abi": info.source.abi.as_ref().map(|a| &a.abi),
        "state": state.iter().map(|v| serde_json::json!({
            "name": v.name,
            "type": v.ty,
            "value": v.value,
        })).collect::<Vec<_>>(),
    });

    let formatted = serde_json::to_string_pretty(&json)
        .map_err(|e| format!("Failed to serialize JSON: {e}"))?;

    let mut file = fs::File::create(path).map_err(|e| format!("Failed to create file: {e}"))?;
    file.write_all(formatted.as_bytes())
        .map_err(|e| format!("Failed to write file: {e}"))?;

    Ok(format!("Exported contract info to {path}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::ContractSource;
    use alloy::dyn_abi::DynSolValue;
    use alloy::primitives::{Address, Bytes, U256};
    use std::fs;

    fn sample_events() -> Vec<DecodedEvent> {
        vec![DecodedEvent {
            event_name: "Transfer".to_string(),
            transaction_hash: "0xabc".to_string(),
            block_number: "0x121eac0".to_string(),
            time_stamp: "0x6553f100".to_string(),
            log_index: "0x1f".to_string(),
            values: vec![
                ("from".to_string(), DynSolValue::Address(Address::ZERO)),
                (
                    "value".to_string(),
                    DynSolValue::Uint(U256::from(9_007_199_254_740_993u64), 256),
                ),
            ],
        }]
    }

    #[test]
    fn test_export_events_csv() {
        let path = "/tmp/learn-web3-test-events.csv";
        let result = export_events_csv(&sample_events(), path);
        assert!(result.is_ok());

        let contents = fs::read_to_string(path).unwrap();
        assert!(contents.starts_with("event,tx_hash,block,timestamp,log_index,params"));
        assert!(contents.contains("Transfer,0xabc,19000000,1700000000,31,"));
        assert!(contents.contains("value=9007199254740993"));

        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_export_transactions_csv() {
        let path = "/tmp/learn-web3-test-txs.csv";
        let txs = vec![Transaction {
            hash: "0x1".to_string(),
            block_number: "19000000".to_string(),
            time_stamp: "1700000000".to_string(),
            value: "1000".to_string(),
            gas_used: "21000".to_string(),
            gas_price: "2".to_string(),
            is_error: "1".to_string(),
            ..Default::default()
        }];
        let result = export_transactions_csv(&txs, path).unwrap();
        assert!(result.contains("1 transactions"));

        let contents = fs::read_to_string(path).unwrap();
        assert!(contents.contains("0x1,19000000,1700000000,,,1000,42000,failed,"));

        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_export_transactions_csv_empty() {
        let path = "/tmp/learn-web3-test-txs-empty.csv";
        let result = export_transactions_csv(&[], path);
        assert!(result.unwrap().contains("0 transactions"));
        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_export_contract_json() {
        let path = "/tmp/learn-web3-test-contract.json";
        let info = ContractInfo {
            address: Address::ZERO,
            chain_id: 11155111,
            is_contract: true,
            bytecode: Bytes::from(vec![0x60, 0x80, 0x60, 0x40]),
            balance: U256::from(5),
            source: ContractSource {
                contract_name: Some("TetherToken".to_string()),
                optimization_used: Some(false),
                ..Default::default()
            },
        };
        let state = vec![StateVariable {
            name: "decimals".to_string(),
            ty: "uint256".to_string(),
            value: "6".to_string(),
            raw: vec![],
        }];
        export_contract_json(&info, &state, path).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(json["chain_id"], 11155111);
        assert_eq!(json["bytecode_size"], 4);
        assert_eq!(json["contract_name"], "TetherToken");
        assert_eq!(json["verified"], false);
        assert_eq!(json["state"][0]["value"], "6");

        let _ = fs::remove_file(path);
    }
}
