//! Decoding of registry event logs.
//!
//! [`EventDecoder`] keeps a table from event-signature hash to event definition and turns raw
//! [`Log`](alloy::rpc::types::Log)s into [`DecodedEvent`]s whose fields are already normalized
//! ([`FieldValue`]).

pub mod decoder;
pub mod registry;

pub use decoder::{DecodedEvent, EventDecoder, FieldValue};
