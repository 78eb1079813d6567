use std::sync::OnceLock;

use alloy::json_abi::{Event, JsonAbi};
use alloy::primitives::{Address, Bytes, U256};
use alloy::sol;
use alloy::sol_types::SolCall;

use crate::data::types::DecodedEvent;

static USDT_ABI: OnceLock<JsonAbi> = OnceLock::new();

/// The bundled Tether USD contract ABI.
pub fn usdt_abi() -> &'static JsonAbi {
    USDT_ABI.get_or_init(|| {
        serde_json::from_str(include_str!("../../abis/usdt.json"))
            .expect("built-in USDT ABI should be valid")
    })
}

/// USDT event descriptors in declaration order.
pub fn usdt_events() -> Vec<Event> {
    let abi = usdt_abi();
    let mut events: Vec<Event> = abi.events().cloned().collect();
    // JsonAbi groups events by name; restore the file's order.
    let order = declared_event_names();
    events.sort_by_key(|e| order.iter().position(|n| *n == e.name).unwrap_or(usize::MAX));
    events
}

fn declared_event_names() -> &'static [&'static str] {
    &[
        "Transfer",
        "Approval",
        "Issue",
        "Redeem",
        "AddedBlackList",
        "RemovedBlackList",
        "DestroyedBlackFunds",
        "Params",
        "Pause",
        "Unpause",
        "Deprecate",
    ]
}

sol! {
    #[allow(missing_docs)]
    function balanceOf(address who) external view returns (uint256);
    #[allow(missing_docs)]
    function transfer(address to, uint256 value) external;
    #[allow(missing_docs)]
    function approve(address spender, uint256 value) external;
}

/// Calldata for `transfer(address,uint256)`.
pub fn transfer_calldata(to: Address, value: U256) -> Bytes {
    Bytes::from(transferCall { to, value }.abi_encode())
}

/// Calldata for `approve(address,uint256)`.
pub fn approve_calldata(spender: Address, value: U256) -> Bytes {
    Bytes::from(approveCall { spender, value }.abi_encode())
}

/// Calldata for `balanceOf(address)`.
pub fn balance_of_calldata(who: Address) -> Bytes {
    Bytes::from(balanceOfCall { who }.abi_encode())
}

/// Parse a single ABI-encoded `uint256` return word.
pub fn decode_uint_word(data: &[u8]) -> Option<U256> {
    if data.len() < 32 {
        return None;
    }
    Some(U256::from_be_slice(&data[..32]))
}

/// A decoded USDT event with its fields typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenEvent {
    Transfer {
        from: Address,
        to: Address,
        value: U256,
    },
    Approval {
        owner: Address,
        spender: Address,
        value: U256,
    },
    Issue {
        amount: U256,
    },
    Redeem {
        amount: U256,
    },
    AddedBlackList {
        user: Address,
    },
    RemovedBlackList {
        user: Address,
    },
    DestroyedBlackFunds {
        user: Address,
        balance: U256,
    },
    Params {
        fee_basis_points: U256,
        max_fee: U256,
    },
    Pause,
    Unpause,
    Deprecate {
        new_address: Address,
    },
}

impl TokenEvent {
    /// Type a decoded event. `None` if the name or any field doesn't fit.
    pub fn from_decoded(event: &DecodedEvent) -> Option<Self> {
        let addr = |name: &str| event.param(name)?.as_address();
        let uint = |name: &str| event.param(name)?.as_uint().map(|(v, _)| v);

        let typed = match event.event_name.as_str() {
            "Transfer" => Self::Transfer {
                from: addr("from")?,
                to: addr("to")?,
                value: uint("value")?,
            },
            "Approval" => Self::Approval {
                owner: addr("owner")?,
                spender: addr("spender")?,
                value: uint("value")?,
            },
            "Issue" => Self::Issue {
                amount: uint("amount")?,
            },
            "Redeem" => Self::Redeem {
                amount: uint("amount")?,
            },
            "AddedBlackList" => Self::AddedBlackList {
                user: addr("_user")?,
            },
            "RemovedBlackList" => Self::RemovedBlackList {
                user: addr("_user")?,
            },
            "DestroyedBlackFunds" => Self::DestroyedBlackFunds {
                user: addr("_blackListedUser")?,
                balance: uint("_balance")?,
            },
            "Params" => Self::Params {
                fee_basis_points: uint("feeBasisPoints")?,
                max_fee: uint("maxFee")?,
            },
            "Pause" => Self::Pause,
            "Unpause" => Self::Unpause,
            "Deprecate" => Self::Deprecate {
                new_address: addr("newAddress")?,
            },
            _ => return None,
        };
        Some(typed)
    }
}
