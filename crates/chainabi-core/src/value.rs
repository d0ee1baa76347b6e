//! The tagged output alphabet.
//!
//! Every decode attempt yields a [`DecodeResult`]: either a typed
//! [`Value`] or a typed [`DecodingError`]. Containers hold child
//! `DecodeResult`s, not child `Value`s, so one bad member does not lose
//! its siblings.

use crate::error::DecodingError;
use crate::types::Type;
use alloy_primitives::{Address, Bytes, Selector, B256, I256, U256};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// `Value(type, payload) | Error(type, errorKind)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DecodeResult {
    Value {
        #[serde(rename = "type")]
        ty: Type,
        value: Value,
    },
    Error {
        #[serde(rename = "type")]
        ty: Type,
        error: DecodingError,
    },
}

impl DecodeResult {
    pub fn value(ty: Type, value: Value) -> Self {
        DecodeResult::Value { ty, value }
    }

    pub fn error(ty: Type, error: DecodingError) -> Self {
        DecodeResult::Error { ty, error }
    }

    pub fn ty(&self) -> &Type {
        match self {
            DecodeResult::Value { ty, .. } | DecodeResult::Error { ty, .. } => ty,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            DecodeResult::Value { value, .. } => Some(value),
            DecodeResult::Error { .. } => None,
        }
    }

    pub fn as_error(&self) -> Option<&DecodingError> {
        match self {
            DecodeResult::Error { error, .. } => Some(error),
            DecodeResult::Value { .. } => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, DecodeResult::Error { .. })
    }

    /// True if this result or any result nested inside it is an error.
    pub fn contains_error(&self) -> bool {
        match self {
            DecodeResult::Error { .. } => true,
            DecodeResult::Value { value, .. } => match value {
                Value::Array(items) => items.iter().any(DecodeResult::contains_error),
                Value::Struct(members) | Value::Tuple(members) => {
                    members.iter().any(|m| m.value.contains_error())
                }
                Value::Magic(fields) => fields.values().any(DecodeResult::contains_error),
                _ => false,
            },
        }
    }

    pub fn as_uint(&self) -> Option<U256> {
        match self.as_value()? {
            Value::Uint(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self.as_value()? {
            Value::String(StringValue::Valid(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_address(&self) -> Option<Address> {
        match self.as_value()? {
            Value::Address(a) => Some(*a),
            Value::Contract(info) => Some(info.address()),
            _ => None,
        }
    }
}

/// A decoded payload. Shapes mirror the [`Type`] variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "valueClass", content = "data", rename_all = "camelCase")]
pub enum Value {
    Bool(bool),
    Uint(U256),
    Int(I256),
    /// Signed fixed-point; `value` is the unscaled integer.
    Fixed { value: I256, places: u8 },
    Ufixed { value: U256, places: u8 },
    Address(Address),
    Contract(ContractValueInfo),
    Enum { name: String, numeric: U256 },
    String(StringValue),
    Bytes(Bytes),
    FunctionExternal(FunctionExternalValue),
    Array(Vec<DecodeResult>),
    Struct(Vec<NamedResult>),
    Tuple(Vec<NamedResult>),
    /// `msg` / `tx` / `block` fields in their fixed order.
    Magic(IndexMap<String, DecodeResult>),
}

/// A struct/tuple member or function argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedResult {
    pub name: String,
    pub value: DecodeResult,
}

impl NamedResult {
    pub fn new(name: impl Into<String>, value: DecodeResult) -> Self {
        Self { name: name.into(), value }
    }
}

/// A contract class recognized from its deployed code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractClass {
    pub name: String,
    pub context_hash: B256,
    pub payable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ContractValueInfo {
    Known { address: Address, class: ContractClass },
    Unknown { address: Address },
}

impl ContractValueInfo {
    pub fn address(&self) -> Address {
        match self {
            ContractValueInfo::Known { address, .. } | ContractValueInfo::Unknown { address } => {
                *address
            }
        }
    }
}

/// An external function pointer: a contract address plus selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FunctionExternalValue {
    /// The contract was recognized and has a function with this selector.
    Known { contract: ContractValueInfo, selector: Selector, signature: String },
    /// The contract was recognized but has no function with this selector.
    Invalid { contract: ContractValueInfo, selector: Selector },
    Unknown { contract: ContractValueInfo, selector: Selector },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "camelCase")]
pub enum StringValue {
    Valid(String),
    /// Not valid UTF-8; the raw bytes are kept.
    Malformed(Bytes),
}

impl StringValue {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        match std::str::from_utf8(bytes) {
            Ok(s) => StringValue::Valid(s.to_owned()),
            Err(_) => StringValue::Malformed(Bytes::copy_from_slice(bytes)),
        }
    }
}

fn fmt_scaled(f: &mut fmt::Formatter<'_>, negative: bool, digits: String, places: u8) -> fmt::Result {
    let places = usize::from(places);
    let sign = if negative { "-" } else { "" };
    if places == 0 {
        return write!(f, "{sign}{digits}");
    }
    let padded = format!("{digits:0>width$}", width = places + 1);
    let (int, frac) = padded.split_at(padded.len() - places);
    write!(f, "{sign}{int}.{frac}")
}

fn fmt_named(f: &mut fmt::Formatter<'_>, members: &[NamedResult]) -> fmt::Result {
    write!(f, "(")?;
    for (i, m) in members.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        if m.name.is_empty() {
            write!(f, "{}", m.value)?;
        } else {
            write!(f, "{}: {}", m.name, m.value)?;
        }
    }
    write!(f, ")")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Uint(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Fixed { value, places } => {
                fmt_scaled(f, value.is_negative(), value.unsigned_abs().to_string(), *places)
            }
            Value::Ufixed { value, places } => fmt_scaled(f, false, value.to_string(), *places),
            Value::Address(a) => write!(f, "{a}"),
            Value::Contract(info) => match info {
                ContractValueInfo::Known { address, class } => write!(f, "{}({address})", class.name),
                ContractValueInfo::Unknown { address } => write!(f, "{address}"),
            },
            Value::Enum { name, .. } => write!(f, "{name}"),
            Value::String(StringValue::Valid(s)) => write!(f, "{s:?}"),
            Value::String(StringValue::Malformed(raw)) => write!(f, "<malformed {raw}>"),
            Value::Bytes(b) => write!(f, "{b}"),
            Value::FunctionExternal(func) => match func {
                FunctionExternalValue::Known { contract, signature, .. } => {
                    write!(f, "{}.{signature}", contract.address())
                }
                FunctionExternalValue::Invalid { contract, selector }
                | FunctionExternalValue::Unknown { contract, selector } => {
                    write!(f, "{}.{selector}", contract.address())
                }
            },
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Struct(members) | Value::Tuple(members) => fmt_named(f, members),
            Value::Magic(fields) => {
                write!(f, "{{")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {value}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl fmt::Display for DecodeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeResult::Value { value, .. } => write!(f, "{value}"),
            DecodeResult::Error { error, .. } => write!(f, "<error: {error}>"),
        }
    }
}
