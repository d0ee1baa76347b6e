//! # chainabi-evm
//!
//! ABI allocation and decoding for EVM contract data.
//!
//! ## Implementation notes
//! - Layouts are computed once per struct id (`allocate::abi`) and per
//!   function/event (`allocate::calldata`, `allocate::event`), then only read.
//! - The decode engine (`decode`) never does I/O. When it needs contract code
//!   or a storage word it suspends with a [`DecoderRequest`]; the
//!   [`Decoding`] driver hands that request to the caller and replays once
//!   the bytes arrive.
//! - Strict mode turns every recoverable error into a [`StopDecodingError`];
//!   lenient mode embeds it in the result tree instead.
//!
//! [`DecoderRequest`]: chainabi_core::DecoderRequest
//! [`StopDecodingError`]: chainabi_core::StopDecodingError

pub mod allocate;
pub mod context;
pub mod decode;
pub mod decoder;
pub mod driver;
pub mod error;
pub mod fingerprint;
pub mod import;
pub mod read;
pub mod state;

pub use allocate::{
    abi_size_info, allocate_abi_types, build_calldata_allocations, build_event_allocations,
    AbiAllocation, AbiAllocations, AbiSizeInfo, ArgumentAllocation, CalldataAllocation,
    CalldataAllocations, ContractDeclaration, ContractInfo, DeclaredEvent, DeclaredFunction,
    DecodingMode, EventAllocation, EventAllocations, ReturndataAllocation, ReturndataKind,
};
pub use context::{CompilerVersion, Contexts, DecoderContext, SolidityFamily};
pub use decode::{DecodeFlow, Decoder, DecoderInfo, Interrupt, Responses};
pub use decoder::{AbiDecoder, CalldataDecoding, EventDecoding, ReturndataDecoding};
pub use driver::{DecodeStep, Decoding};
pub use error::LoadError;
pub use state::EvmState;
