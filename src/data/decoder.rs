use std::str::FromStr;

use alloy::dyn_abi::{DynSolType, DynSolValue, Specifier};
use alloy::json_abi::Event;
use alloy::primitives::{Address, B256, Function, I256, U256, hex};
use thiserror::Error;

use crate::data::aggregate;
use crate::data::topics::{AbiConfigError, TopicIndex};
use crate::data::types::{DecodedEvent, RawLogEntry};

/// Why a log was left out of a decoded batch.
///
/// None of these abort a batch; the aggregation layer drops them.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeSkip {
    #[error("log has no topics")]
    NoTopics,
    #[error("malformed topic {0:?}")]
    MalformedTopic(String),
    #[error("unknown selector {0}")]
    UnknownSelector(B256),
    #[error("{event}: expected {expected} topics, found {found}")]
    TopicCount {
        event: String,
        expected: usize,
        found: usize,
    },
    #[error("{event}: data is not valid hex")]
    MalformedData { event: String },
    #[error("{event}: cannot resolve type of {param}: {reason}")]
    UnsupportedType {
        event: String,
        param: String,
        reason: String,
    },
    #[error("{event}: {reason}")]
    Abi { event: String, reason: String },
}

/// Decodes raw explorer logs against a fixed set of event descriptors.
#[derive(Debug, Clone)]
pub struct EventDecoder {
    index: TopicIndex,
}

impl EventDecoder {
    pub fn new(index: TopicIndex) -> Self {
        Self { index }
    }

    pub fn from_events(events: Vec<Event>) -> Result<Self, AbiConfigError> {
        Ok(Self::new(TopicIndex::new(events)?))
    }

    pub fn index(&self) -> &TopicIndex {
        &self.index
    }

    /// Decode a single log.
    ///
    /// topic[0] selects the event; topic[1..] hold the indexed parameters in
    /// declaration order and `data` holds the ABI-encoded remaining ones.
    pub fn decode(&self, log: &RawLogEntry) -> Result<DecodedEvent, DecodeSkip> {
        let topic0 = log.topics.first().ok_or(DecodeSkip::NoTopics)?;
        let topic0 = parse_topic(topic0)?;
        let event = self
            .index
            .event_for(&topic0)
            .ok_or(DecodeSkip::UnknownSelector(topic0))?;

        let expected = 1 + event.inputs.iter().filter(|p| p.indexed).count();
        if log.topics.len() != expected {
            return Err(DecodeSkip::TopicCount {
                event: event.name.clone(),
                expected,
                found: log.topics.len(),
            });
        }

        let mut indexed_types = Vec::new();
        let mut body_types = Vec::new();
        for param in &event.inputs {
            let ty = param.resolve().map_err(|e| DecodeSkip::UnsupportedType {
                event: event.name.clone(),
                param: param.name.clone(),
                reason: e.to_string(),
            })?;
            if param.indexed {
                indexed_types.push(ty);
            } else {
                body_types.push(ty);
            }
        }

        let mut indexed_values = Vec::with_capacity(indexed_types.len());
        for (ty, raw) in indexed_types.iter().zip(&log.topics[1..]) {
            let word = parse_topic(raw)?;
            let value = decode_topic(ty, &word).map_err(|reason| DecodeSkip::Abi {
                event: event.name.clone(),
                reason,
            })?;
            indexed_values.push(value);
        }

        let data = hex::decode(log.data.trim()).map_err(|_| DecodeSkip::MalformedData {
            event: event.name.clone(),
        })?;
        let body_values = decode_body(body_types, &data).map_err(|reason| DecodeSkip::Abi {
            event: event.name.clone(),
            reason,
        })?;

        let mut indexed_iter = indexed_values.into_iter();
        let mut body_iter = body_values.into_iter();
        let mut values = Vec::with_capacity(event.inputs.len());
        for (i, param) in event.inputs.iter().enumerate() {
            let next = if param.indexed {
                indexed_iter.next()
            } else {
                body_iter.next()
            };
            let value = next.ok_or_else(|| DecodeSkip::Abi {
                event: event.name.clone(),
                reason: format!("missing value for {}", param.name),
            })?;
            let name = if param.name.is_empty() {
                format!("arg{i}")
            } else {
                param.name.clone()
            };
            values.push((name, value));
        }

        Ok(DecodedEvent {
            event_name: event.name.clone(),
            transaction_hash: log.transaction_hash.clone(),
            block_number: log.block_number.clone(),
            time_stamp: log.time_stamp.clone(),
            log_index: log.log_index.clone(),
            values,
        })
    }

    /// Decode a page of logs, dropping the ones that do not decode.
    ///
    /// With `descending`, the result is ordered newest first by timestamp;
    /// equal timestamps keep their original relative order.
    pub fn decode_all(&self, logs: &[RawLogEntry], descending: bool) -> Vec<DecodedEvent> {
        let mut events = aggregate::collect_successes(logs.iter().map(|log| self.decode(log)));
        if descending {
            aggregate::sort_newest_first(&mut events);
        }
        events
    }
}

fn parse_topic(raw: &str) -> Result<B256, DecodeSkip> {
    B256::from_str(raw.trim()).map_err(|_| DecodeSkip::MalformedTopic(raw.to_string()))
}

/// Decode one indexed parameter from its 32-byte topic slot.
fn decode_topic(ty: &DynSolType, word: &B256) -> Result<DynSolValue, String> {
    match ty {
        DynSolType::Address => Ok(DynSolValue::Address(Address::from_word(*word))),
        DynSolType::Bool => Ok(DynSolValue::Bool(!word.is_zero())),
        DynSolType::Uint(bits) => {
            let value = U256::from_be_bytes(word.0);
            if value.bit_len() > *bits {
                return Err(format!("value does not fit in uint{bits}"));
            }
            Ok(DynSolValue::Uint(value, *bits))
        }
        DynSolType::Int(bits) => Ok(DynSolValue::Int(
            I256::from_raw(U256::from_be_bytes(word.0)),
            *bits,
        )),
        DynSolType::FixedBytes(size) => Ok(DynSolValue::FixedBytes(*word, *size)),
        DynSolType::Function => Ok(DynSolValue::Function(Function::from_slice(&word[..24]))),
        // Indexed reference types are stored as the keccak hash of their encoding.
        DynSolType::Bytes
        | DynSolType::String
        | DynSolType::Array(_)
        | DynSolType::FixedArray(_, _)
        | DynSolType::Tuple(_) => Ok(DynSolValue::FixedBytes(*word, 32)),
    }
}

/// Decode the non-indexed parameters from the log's data payload.
fn decode_body(types: Vec<DynSolType>, data: &[u8]) -> Result<Vec<DynSolValue>, String> {
    if types.is_empty() {
        return Ok(Vec::new());
    }
    let expected = types.len();
    match DynSolType::Tuple(types).abi_decode_sequence(data) {
        Ok(DynSolValue::Tuple(values)) if values.len() == expected => Ok(values),
        Ok(other) => Err(format!("unexpected decoded shape: {other:?}")),
        Err(e) => Err(e.to_string()),
    }
}

/// Render a decoded value as a plain string.
///
/// Integers of any width print as exact decimals; addresses use their
/// checksummed form.
pub fn format_sol_value(value: &DynSolValue) -> String {
    match value {
        DynSolValue::Bool(b) => b.to_string(),
        DynSolValue::Int(i, _) => i.to_string(),
        DynSolValue::Uint(u, _) => u.to_string(),
        DynSolValue::FixedBytes(b, size) => format!("0x{}", hex::encode(&b[..*size])),
        DynSolValue::Address(a) => format!("{a}"),
        DynSolValue::Function(f) => format!("0x{}", hex::encode(f)),
        DynSolValue::Bytes(b) => format!("0x{}", hex::encode(b)),
        DynSolValue::String(s) => s.clone(),
        DynSolValue::Array(arr) | DynSolValue::FixedArray(arr) => {
            let inner: Vec<String> = arr.iter().map(format_sol_value).collect();
            format!("[{}]", inner.join(", "))
        }
        DynSolValue::Tuple(parts) => {
            let inner: Vec<String> = parts.iter().map(format_sol_value).collect();
            format!("({})", inner.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, keccak256};

    fn erc20_decoder() -> EventDecoder {
        EventDecoder::from_events(vec![
            Event::parse("event Transfer(address indexed from, address indexed to, uint256 value)")
                .unwrap(),
            Event::parse(
                "event Approval(address indexed owner, address indexed spender, uint256 value)",
            )
            .unwrap(),
            Event::parse("event Pause()").unwrap(),
        ])
        .unwrap()
    }

    fn topic(word: B256) -> String {
        format!("{word:#x}")
    }

    fn data_hex(bytes: &[u8]) -> String {
        format!("0x{}", hex::encode(bytes))
    }

    fn raw_log(topics: Vec<String>, data: String, time_stamp: &str, log_index: &str) -> RawLogEntry {
        RawLogEntry {
            address: "0xdac17f958d2ee523a2206206994597c13d831ec7".to_string(),
            topics,
            data,
            block_number: "0x1234".to_string(),
            time_stamp: time_stamp.to_string(),
            log_index: log_index.to_string(),
            transaction_hash: "0xaaaa".to_string(),
        }
    }

    fn transfer_log(from: Address, to: Address, value: U256, time_stamp: &str) -> RawLogEntry {
        raw_log(
            vec![
                topic(keccak256("Transfer(address,address,uint256)")),
                topic(from.into_word()),
                topic(to.into_word()),
            ],
            data_hex(&value.to_be_bytes::<32>()),
            time_stamp,
            "0x1",
        )
    }

    #[test]
    fn test_decode_transfer() {
        let from = address!("d8dA6BF26964aF9D7eEd9e03E53415D37aA96045");
        let to = address!("F977814e90dA44bFA03b6295A0616a897441aceC");
        let log = transfer_log(from, to, U256::from(1_000_000u64), "0x65000000");

        let decoded = erc20_decoder().decode(&log).unwrap();
        assert_eq!(decoded.event_name, "Transfer");
        assert_eq!(
            decoded.params(),
            vec![
                ("from".to_string(), from.to_string()),
                ("to".to_string(), to.to_string()),
                ("value".to_string(), "1000000".to_string()),
            ]
        );
        assert_eq!(decoded.param("from"), Some(&DynSolValue::Address(from)));
        assert_eq!(decoded.transaction_hash, "0xaaaa");
    }

    #[test]
    fn test_decode_value_beyond_float_precision() {
        // 2^53 + 1 cannot be represented exactly as an f64.
        let value = U256::from(9_007_199_254_740_993u64);
        let log = transfer_log(Address::ZERO, Address::repeat_byte(1), value, "1");
        let decoded = erc20_decoder().decode(&log).unwrap();
        assert_eq!(decoded.params()[2].1, "9007199254740993");

        let huge = U256::MAX;
        let log = transfer_log(Address::ZERO, Address::repeat_byte(1), huge, "1");
        let decoded = erc20_decoder().decode(&log).unwrap();
        assert_eq!(decoded.params()[2].1, U256::MAX.to_string());
    }

    #[test]
    fn test_unknown_selector_is_skipped() {
        let log = raw_log(vec![topic(B256::repeat_byte(0xee))], "0x".into(), "1", "0");
        let err = erc20_decoder().decode(&log).unwrap_err();
        assert_eq!(err, DecodeSkip::UnknownSelector(B256::repeat_byte(0xee)));
    }

    #[test]
    fn test_no_topics_is_skipped() {
        let log = raw_log(vec![], "0x".into(), "1", "0");
        assert_eq!(erc20_decoder().decode(&log).unwrap_err(), DecodeSkip::NoTopics);
    }

    #[test]
    fn test_wrong_topic_count_is_skipped() {
        let mut log = transfer_log(Address::ZERO, Address::ZERO, U256::from(1u64), "1");
        log.topics.pop();
        let err = erc20_decoder().decode(&log).unwrap_err();
        assert!(matches!(err, DecodeSkip::TopicCount { expected: 3, found: 2, .. }));
    }

    #[test]
    fn test_truncated_data_is_skipped() {
        let mut log = transfer_log(Address::ZERO, Address::ZERO, U256::from(1u64), "1");
        log.data = "0x0001".to_string();
        let err = erc20_decoder().decode(&log).unwrap_err();
        assert!(matches!(err, DecodeSkip::Abi { .. }));
    }

    #[test]
    fn test_non_hex_data_is_skipped() {
        let mut log = transfer_log(Address::ZERO, Address::ZERO, U256::from(1u64), "1");
        log.data = "0xzz".to_string();
        let err = erc20_decoder().decode(&log).unwrap_err();
        assert!(matches!(err, DecodeSkip::MalformedData { .. }));
    }

    #[test]
    fn test_event_without_params() {
        let log = raw_log(vec![topic(keccak256("Pause()"))], "0x".into(), "1", "0");
        let decoded = erc20_decoder().decode(&log).unwrap();
        assert_eq!(decoded.event_name, "Pause");
        assert!(decoded.params().is_empty());
    }

    #[test]
    fn test_dynamic_and_signed_body_values() {
        let event =
            Event::parse("event Note(address indexed author, string text, int256 delta, bool ok)")
                .unwrap();
        let decoder = EventDecoder::from_events(vec![event.clone()]).unwrap();
        let author = Address::repeat_byte(0x42);
        let body = DynSolValue::Tuple(vec![
            DynSolValue::String("hello".to_string()),
            DynSolValue::Int("-5".parse::<I256>().unwrap(), 256),
            DynSolValue::Bool(true),
        ])
        .abi_encode_params();
        let log = raw_log(
            vec![topic(event.selector()), topic(author.into_word())],
            data_hex(&body),
            "1",
            "0",
        );

        let decoded = decoder.decode(&log).unwrap();
        let params = decoded.params();
        assert_eq!(params[0], ("author".to_string(), author.to_string()));
        assert_eq!(params[1], ("text".to_string(), "hello".to_string()));
        assert_eq!(params[2], ("delta".to_string(), "-5".to_string()));
        assert_eq!(params[3], ("ok".to_string(), "true".to_string()));
    }

    #[test]
    fn test_indexed_string_is_hashed_topic() {
        let event = Event::parse("event Named(string indexed label)").unwrap();
        let decoder = EventDecoder::from_events(vec![event.clone()]).unwrap();
        let label_hash = keccak256("gm");
        let log = raw_log(
            vec![topic(event.selector()), topic(label_hash)],
            "0x".into(),
            "1",
            "0",
        );
        let decoded = decoder.decode(&log).unwrap();
        assert_eq!(decoded.params()[0].1, format!("{label_hash:#x}"));
    }

    #[test]
    fn test_indexed_bool_and_small_uint() {
        let event = Event::parse("event Flag(bool indexed on, uint8 indexed level)").unwrap();
        let decoder = EventDecoder::from_events(vec![event.clone()]).unwrap();
        let log = raw_log(
            vec![
                topic(event.selector()),
                topic(B256::with_last_byte(1)),
                topic(B256::with_last_byte(7)),
            ],
            "0x".into(),
            "1",
            "0",
        );
        let params = decoder.decode(&log).unwrap().params();
        assert_eq!(params[0].1, "true");
        assert_eq!(params[1].1, "7");

        // A uint8 slot holding more than 8 bits is malformed.
        let bad = raw_log(
            vec![
                topic(event.selector()),
                topic(B256::with_last_byte(1)),
                topic(B256::repeat_byte(0xff)),
            ],
            "0x".into(),
            "1",
            "0",
        );
        assert!(decoder.decode(&bad).is_err());
    }

    #[test]
    fn test_unnamed_params_get_positional_names() {
        let event: Event = serde_json::from_str(
            r#"{"type":"event","name":"Raw","anonymous":false,"inputs":[{"name":"","type":"uint256","indexed":false}]}"#,
        )
        .unwrap();
        let decoder = EventDecoder::from_events(vec![event.clone()]).unwrap();
        let log = raw_log(
            vec![topic(event.selector())],
            data_hex(&U256::from(3u64).to_be_bytes::<32>()),
            "1",
            "0",
        );
        assert_eq!(
            decoder.decode(&log).unwrap().params(),
            vec![("arg0".to_string(), "3".to_string())]
        );
    }

    #[test]
    fn test_decode_all_drops_failures_and_sorts() {
        let decoder = erc20_decoder();
        let a = Address::repeat_byte(1);
        let logs = vec![
            transfer_log(a, a, U256::from(1u64), "0x10"),
            raw_log(vec![topic(B256::ZERO)], "0x".into(), "0x50", "0"),
            transfer_log(a, a, U256::from(2u64), "0x30"),
            transfer_log(a, a, U256::from(3u64), "0x20"),
        ];

        let desc = decoder.decode_all(&logs, true);
        let values: Vec<String> = desc.iter().map(|e| e.params()[2].1.clone()).collect();
        assert_eq!(values, vec!["2", "3", "1"]);

        let asc = decoder.decode_all(&logs, false);
        let values: Vec<String> = asc.iter().map(|e| e.params()[2].1.clone()).collect();
        assert_eq!(values, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_format_sol_value() {
        assert_eq!(format_sol_value(&DynSolValue::Bool(false)), "false");
        assert_eq!(
            format_sol_value(&DynSolValue::Bytes(vec![0xde, 0xad])),
            "0xdead"
        );
        assert_eq!(
            format_sol_value(&DynSolValue::FixedBytes(B256::repeat_byte(0xab), 2)),
            "0xabab"
        );
        assert_eq!(
            format_sol_value(&DynSolValue::Array(vec![
                DynSolValue::Uint(U256::from(1u64), 256),
                DynSolValue::Uint(U256::from(2u64), 256),
            ])),
            "[1, 2]"
        );
        assert_eq!(
            format_sol_value(&DynSolValue::Tuple(vec![
                DynSolValue::String("a".into()),
                DynSolValue::Bool(true),
            ])),
            "(a, true)"
        );
    }
}
