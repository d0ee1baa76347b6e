//! Decode-time pointers: where the bytes for a value live.

use alloy_primitives::{B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Byte-addressed ABI word streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataLocation {
    /// A generic ABI-encoded buffer.
    Abi,
    Calldata,
    Returndata,
    Eventdata,
    Code,
}

impl fmt::Display for DataLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DataLocation::Abi => "abi",
            DataLocation::Calldata => "calldata",
            DataLocation::Returndata => "returndata",
            DataLocation::Eventdata => "eventdata",
            DataLocation::Code => "code",
        };
        write!(f, "{s}")
    }
}

/// A `[start, start + length)` window into one of the [`DataLocation`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataPointer {
    pub location: DataLocation,
    pub start: usize,
    pub length: usize,
}

impl DataPointer {
    pub fn new(location: DataLocation, start: usize, length: usize) -> Self {
        Self { location, start, length }
    }
}

/// Scalar environment values read by the pseudo-variable decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecialVariable {
    This,
    Sender,
    Value,
    Origin,
    Gasprice,
    Coinbase,
    Difficulty,
    Gaslimit,
    Number,
    Timestamp,
    Chainid,
    Basefee,
}

impl SpecialVariable {
    pub fn name(&self) -> &'static str {
        match self {
            SpecialVariable::This => "this",
            SpecialVariable::Sender => "sender",
            SpecialVariable::Value => "value",
            SpecialVariable::Origin => "origin",
            SpecialVariable::Gasprice => "gasprice",
            SpecialVariable::Coinbase => "coinbase",
            SpecialVariable::Difficulty => "difficulty",
            SpecialVariable::Gaslimit => "gaslimit",
            SpecialVariable::Number => "number",
            SpecialVariable::Timestamp => "timestamp",
            SpecialVariable::Chainid => "chainid",
            SpecialVariable::Basefee => "basefee",
        }
    }
}

/// A decode location.
///
/// Struct and array members store pointers *relative* to the start of
/// their container; they only become a `Pointer::Data` once re-based
/// against a concrete start position during decoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "pointer", rename_all = "camelCase")]
pub enum Pointer {
    Data(DataPointer),
    /// Topic index in an event log; topic 0 is the selector unless anonymous.
    EventTopic { topic: usize },
    /// `length` bytes starting `offset` bytes into a storage slot.
    Storage { slot: U256, offset: usize, length: usize },
    /// Stack words `from..=to`, counted from the bottom of the stack.
    Stack { from: usize, to: usize },
    /// A compile-time constant, already evaluated to its word.
    Definition { word: B256 },
    Special { special: SpecialVariable },
}

impl Pointer {
    pub fn data(location: DataLocation, start: usize, length: usize) -> Self {
        Pointer::Data(DataPointer::new(location, start, length))
    }

    pub fn calldata(start: usize, length: usize) -> Self {
        Self::data(DataLocation::Calldata, start, length)
    }

    pub fn eventdata(start: usize, length: usize) -> Self {
        Self::data(DataLocation::Eventdata, start, length)
    }

    pub fn returndata(start: usize, length: usize) -> Self {
        Self::data(DataLocation::Returndata, start, length)
    }

    pub fn topic(topic: usize) -> Self {
        Pointer::EventTopic { topic }
    }

    pub fn special(special: SpecialVariable) -> Self {
        Pointer::Special { special }
    }
}
