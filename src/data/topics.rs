use std::collections::HashMap;

use alloy::json_abi::{Event, JsonAbi};
use alloy::primitives::B256;
use thiserror::Error;

/// Non-anonymous events carry topic0 plus at most three indexed parameters.
pub const MAX_INDEXED: usize = 3;
const MAX_INDEXED_ANONYMOUS: usize = 4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AbiConfigError {
    #[error("event {name} declares {count} indexed parameters (limit {limit})")]
    TooManyIndexed {
        name: String,
        count: usize,
        limit: usize,
    },
    #[error("events {first} and {second} share selector {selector}")]
    SelectorCollision {
        first: String,
        second: String,
        selector: B256,
    },
}

/// Keccak-256 of the canonical `Name(type1,type2,...)` signature.
///
/// The `indexed` flags do not take part in the signature.
pub fn selector_of(event: &Event) -> B256 {
    event.selector()
}

/// Event name to selector. Anonymous events have no selector and are left out.
pub fn build_name_to_hash(events: &[Event]) -> HashMap<String, B256> {
    let mut map = HashMap::new();
    for event in events.iter().filter(|e| !e.anonymous) {
        map.entry(event.name.clone()).or_insert_with(|| selector_of(event));
    }
    map
}

/// Selector to event name. Anonymous events are left out.
pub fn build_hash_to_name(events: &[Event]) -> HashMap<B256, String> {
    events
        .iter()
        .filter(|e| !e.anonymous)
        .map(|e| (selector_of(e), e.name.clone()))
        .collect()
}

/// Validated, bidirectional lookup over a set of event descriptors.
#[derive(Debug, Clone)]
pub struct TopicIndex {
    events: Vec<Event>,
    by_hash: HashMap<B256, String>,
    by_name: HashMap<String, B256>,
}

impl TopicIndex {
    /// Build the index, rejecting descriptors that could never match a log.
    pub fn new(events: Vec<Event>) -> Result<Self, AbiConfigError> {
        let mut seen: HashMap<B256, &Event> = HashMap::new();

        for event in &events {
            let count = event.inputs.iter().filter(|p| p.indexed).count();
            let limit = if event.anonymous {
                MAX_INDEXED_ANONYMOUS
            } else {
                MAX_INDEXED
            };
            if count > limit {
                return Err(AbiConfigError::TooManyIndexed {
                    name: event.name.clone(),
                    count,
                    limit,
                });
            }
            if event.anonymous {
                continue;
            }

            let selector = selector_of(event);
            match seen.get(&selector) {
                // The same declaration listed twice is harmless.
                Some(first) if first.signature() == event.signature() => {}
                Some(first) => {
                    return Err(AbiConfigError::SelectorCollision {
                        first: first.signature(),
                        second: event.signature(),
                        selector,
                    });
                }
                None => {
                    seen.insert(selector, event);
                }
            }
        }

        // Overloads keep the first declaration under the bare name.
        let by_name = build_name_to_hash(&events);
        let by_hash = build_hash_to_name(&events);
        Ok(Self {
            events,
            by_hash,
            by_name,
        })
    }

    pub fn from_abi(abi: &JsonAbi) -> Result<Self, AbiConfigError> {
        Self::new(abi.events().cloned().collect())
    }

    pub fn event_for(&self, topic0: &B256) -> Option<&Event> {
        let name = self.name_of(topic0)?;
        self.events
            .iter()
            .filter(|e| !e.anonymous && e.name == name)
            .find(|e| selector_of(e) == *topic0)
    }

    pub fn selector(&self, name: &str) -> Option<B256> {
        self.by_name.get(name).copied()
    }

    pub fn name_of(&self, topic0: &B256) -> Option<&str> {
        self.by_hash.get(topic0).map(String::as_str)
    }

    /// Event names in descriptor order.
    pub fn names(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for event in &self.events {
            if !seen.contains(&event.name.as_str()) {
                seen.push(event.name.as_str());
            }
        }
        seen
    }
}
