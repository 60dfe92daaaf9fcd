use std::{collections::BTreeMap, fmt};

use alloy::{
    dyn_abi::{DynSolValue, EventExt},
    json_abi::{Event, JsonAbi},
    primitives::{Address, B256, I256, U256, hex},
    rpc::types::Log,
};

use crate::{abi::registry::NODE_REGISTRY_EVENTS, error::DecodeError};

/// A single decoded event argument.
///
/// Values are normalized so that consumers never deal with raw ABI words: addresses keep their
/// checksum form when displayed, byte strings become `0x`-prefixed hex and integers stay
/// arbitrary precision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Address(Address),
    Uint(U256),
    Int(I256),
    /// `0x`-prefixed lowercase hex of `bytes` and `bytesN` values.
    Bytes(String),
    String(String),
    Bool(bool),
    /// Arrays and tuples, in declaration order.
    List(Vec<FieldValue>),
}

impl FieldValue {
    #[must_use]
    pub fn as_address(&self) -> Option<Address> {
        match self {
            FieldValue::Address(address) => Some(*address),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_uint(&self) -> Option<U256> {
        match self {
            FieldValue::Uint(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(value) | FieldValue::Bytes(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(value) => Some(*value),
            _ => None,
        }
    }
}

impl From<DynSolValue> for FieldValue {
    fn from(value: DynSolValue) -> Self {
        match value {
            DynSolValue::Address(address) => FieldValue::Address(address),
            DynSolValue::Uint(value, _) => FieldValue::Uint(value),
            DynSolValue::Int(value, _) => FieldValue::Int(value),
            DynSolValue::Bool(value) => FieldValue::Bool(value),
            DynSolValue::String(value) => FieldValue::String(value),
            DynSolValue::Bytes(bytes) => FieldValue::Bytes(hex::encode_prefixed(bytes)),
            DynSolValue::FixedBytes(word, size) => {
                FieldValue::Bytes(hex::encode_prefixed(&word[..size]))
            }
            DynSolValue::Array(values)
            | DynSolValue::FixedArray(values)
            | DynSolValue::Tuple(values) => {
                FieldValue::List(values.into_iter().map(FieldValue::from).collect())
            }
            other => FieldValue::Bytes(hex::encode_prefixed(other.abi_encode())),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Address(address) => write!(f, "{}", address.to_checksum(None)),
            FieldValue::Uint(value) => write!(f, "{value}"),
            FieldValue::Int(value) => write!(f, "{value}"),
            FieldValue::Bytes(value) | FieldValue::String(value) => f.write_str(value),
            FieldValue::Bool(value) => write!(f, "{value}"),
            FieldValue::List(values) => {
                f.write_str("[")?;
                for (idx, value) in values.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{value}")?;
                }
                f.write_str("]")
            }
        }
    }
}

/// A log resolved against the signature table.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedEvent {
    pub event_name: String,
    pub fields: BTreeMap<String, FieldValue>,
    pub log: Log,
}

impl DecodedEvent {
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Block the log was included in, if the node reported it.
    #[must_use]
    pub fn block_number(&self) -> Option<u64> {
        self.log.block_number
    }
}

/// Decodes raw logs by matching their first topic against a table of known events.
#[derive(Debug, Clone, Default)]
pub struct EventDecoder {
    events: BTreeMap<B256, Event>,
}

impl EventDecoder {
    /// Builds the signature table from event definitions. Anonymous events have no signature
    /// topic and are skipped.
    pub fn new(events: impl IntoIterator<Item = Event>) -> Self {
        let events = events
            .into_iter()
            .filter(|event| !event.anonymous)
            .map(|event| (event.selector(), event))
            .collect();
        Self { events }
    }

    /// Builds the signature table from every event of a JSON ABI.
    #[must_use]
    pub fn from_abi(abi: &JsonAbi) -> Self {
        Self::new(abi.events().cloned())
    }

    /// Builds the signature table from human-readable definitions such as
    /// `event LogNodeConvicted(address signer)`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::InvalidDefinition`] for a definition that does not parse.
    pub fn from_definitions<'a>(
        definitions: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, DecodeError> {
        let events = definitions
            .into_iter()
            .map(|definition| {
                Event::parse(definition).map_err(|err| DecodeError::InvalidDefinition {
                    definition: definition.to_owned(),
                    reason: err.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(events))
    }

    /// Decoder for the node registry contract.
    ///
    /// # Errors
    ///
    /// Only fails if the built-in definitions are malformed.
    pub fn node_registry() -> Result<Self, DecodeError> {
        Self::from_definitions(NODE_REGISTRY_EVENTS.iter().copied())
    }

    /// Number of known signatures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    #[must_use]
    pub fn event(&self, signature: &B256) -> Option<&Event> {
        self.events.get(signature)
    }

    /// Decodes a log into a named event with normalized field values.
    ///
    /// Indexed arguments are read from `topics[1..]` and the rest from the data payload, both in
    /// declaration order.
    ///
    /// # Errors
    ///
    /// * [`DecodeError::UnknownEvent`] - the first topic matches no known event.
    /// * [`DecodeError::Abi`] - the topic count or the payload does not match the definition.
    pub fn decode(&self, log: &Log) -> Result<DecodedEvent, DecodeError> {
        let topics = log.topics();
        let signature = topics.first().ok_or(DecodeError::UnknownEvent(None))?;
        let event = self.events.get(signature).ok_or(DecodeError::UnknownEvent(Some(*signature)))?;

        let decoded = event.decode_log_parts(topics.iter().copied(), &log.data().data)?;

        let mut fields = BTreeMap::new();
        let mut indexed = decoded.indexed.into_iter();
        let mut body = decoded.body.into_iter();
        for param in &event.inputs {
            let value = if param.indexed { indexed.next() } else { body.next() };
            if let Some(value) = value {
                fields.insert(param.name.clone(), FieldValue::from(value));
            }
        }

        trace!(event = %event.name, field_count = fields.len(), "Decoded log");

        Ok(DecodedEvent { event_name: event.name.clone(), fields, log: log.clone() })
    }
}
