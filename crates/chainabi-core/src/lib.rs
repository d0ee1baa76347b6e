//! # chainabi-core
//!
//! Core types shared across the ChainABI crates: the structural type
//! alphabet, decode-time pointers, the tagged Value/Result model and the
//! error taxonomy. The allocator and decode engine in `chainabi-evm` are
//! built on top of the definitions here.

pub mod config;
pub mod constants;
pub mod error;
pub mod pointer;
pub mod request;
pub mod types;
pub mod value;
pub mod wrap;

pub use config::{DecodeOptions, DecoderConfig};
pub use error::{
    AllocationError, ConfigError, DecodingError, PaddingType, ResumeError, StopDecodingError,
    WrapError,
};
pub use pointer::{DataLocation, DataPointer, Pointer, SpecialVariable};
pub use request::DecoderRequest;
pub use types::{
    AddressKind, ArrayKind, BytesKind, ContractKind, FunctionVisibility, MagicVariable,
    NameTypePair, Type, TypesById, UserDefinedType,
};
pub use value::{
    ContractClass, ContractValueInfo, DecodeResult, FunctionExternalValue, NamedResult,
    StringValue, Value,
};
pub use wrap::{wrap_elementary_value, NativeValue};
