//! Error types for the ChainABI allocation and decode pipeline.
//!
//! [`DecodingError`] is data: it is embedded in a `DecodeResult::Error` so
//! partial structures survive. [`StopDecodingError`] is the single escape
//! hatch that aborts a whole decode (strict mode, or "retry me later").

use crate::pointer::{DataLocation, SpecialVariable};
use alloy_primitives::{Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How a padded word was expected to look.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PaddingType {
    /// Zero bytes on the left (uint, address, bool, enum, ufixed, contract).
    Zero,
    /// Sign-extension bytes on the left (int, fixed).
    Signed,
    /// Zero bytes on the right (`bytesN`, external function).
    Right,
}

/// The closed set of decoding error kinds.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DecodingError {
    #[error("invalid {padding:?} padding in word {raw}")]
    Padding { padding: PaddingType, raw: Bytes },

    #[error("bool word out of range: {raw}")]
    BoolOutOfRange { raw: U256 },

    #[error("enum {id} has no option {raw}")]
    EnumOutOfRange { id: String, raw: U256 },

    #[error("enum {id} not found in type catalog (raw value {raw})")]
    EnumNotFound { id: String, raw: U256 },

    #[error("user-defined type {id} not found")]
    UserDefinedTypeNotFound { id: String },

    #[error("type {type_string} cannot appear in ABI-encoded data")]
    IllegalAbiType { type_string: String },

    #[error("type {type_string} cannot be decoded from this location")]
    UnsupportedType { type_string: String },

    #[error("static array length {length} is too large to represent")]
    OverlargeStaticLength { length: U256 },

    #[error("pointer {pointer} is too large to follow")]
    OverlargePointer { pointer: U256 },

    #[error("length {length} is too long to decode")]
    OverlongArrayOrString {
        length: U256,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data_length: Option<usize>,
    },

    #[error("indexed reference type stored as hash {raw}")]
    IndexedReferenceType { raw: B256 },

    #[error("read of {length} bytes at {location}:{start} is out of range")]
    ReadBytes { location: DataLocation, start: usize, length: usize },

    #[error("event topic {topic} not present")]
    ReadTopic { topic: usize },

    #[error("stack words {from}..={to} not present")]
    ReadStack { from: usize, to: usize },

    #[error("read of {length} bytes at offset {offset} of storage slot {slot} is out of range")]
    ReadStorage { slot: U256, offset: usize, length: usize },

    #[error("special variable {} not available", .special.name())]
    ReadSpecial { special: SpecialVariable },

    #[error("unexpected response to {request}: {length} bytes")]
    UnexpectedResponse { request: String, length: usize },
}

/// Aborts an entire in-flight decode.
///
/// `allow_retry` distinguishes "hard failure" from "allocation missing,
/// retry once more type information is available".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("decoding stopped: {error}")]
pub struct StopDecodingError {
    pub error: DecodingError,
    pub allow_retry: bool,
}

impl StopDecodingError {
    pub fn new(error: DecodingError) -> Self {
        Self { error, allow_retry: false }
    }

    pub fn retryable(error: DecodingError) -> Self {
        Self { error, allow_retry: true }
    }
}

/// Errors raised while computing ABI layouts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocationError {
    #[error("unknown user-defined type {type_string} (id {id})")]
    UnknownUserDefinedType { id: String, type_string: String },

    #[error("static array length {length} is too large to allocate")]
    OverlargeStaticLength { length: U256 },

    #[error("unrecognized ABI type string '{ty}'")]
    InvalidAbiType { ty: String },

    #[error("struct {id} contains itself")]
    CircularType { id: String },
}

impl From<AllocationError> for DecodingError {
    fn from(err: AllocationError) -> Self {
        match err {
            AllocationError::UnknownUserDefinedType { id, .. } => {
                DecodingError::UserDefinedTypeNotFound { id }
            }
            AllocationError::OverlargeStaticLength { length } => {
                DecodingError::OverlargeStaticLength { length }
            }
            AllocationError::InvalidAbiType { ty } => {
                DecodingError::UnsupportedType { type_string: ty }
            }
            AllocationError::CircularType { id } => {
                DecodingError::IllegalAbiType { type_string: format!("struct {id}") }
            }
        }
    }
}

/// Errors from `wrap_elementary_value`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WrapError {
    #[error("cannot wrap {got} as {expected}")]
    TypeMismatch { expected: String, got: String },

    #[error("invalid hex string '{input}'")]
    InvalidHex { input: String },

    #[error("invalid address '{input}'")]
    InvalidAddress { input: String },

    #[error("invalid integer '{input}' for {expected}")]
    InvalidInteger { input: String, expected: String },

    #[error("{type_string} is not an elementary type")]
    NotElementary { type_string: String },
}

/// Misuse of the suspend/resume driver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResumeError {
    #[error("resume called with no pending request")]
    NothingPending,

    #[error("storage response must be at most 32 bytes, got {length}")]
    MalformedStorageWord { length: usize },
}

/// Errors loading a decoder configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON config error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML config error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
