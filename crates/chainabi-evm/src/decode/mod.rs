//! The recursive decode engine.
//!
//! Every decode routine is a method on [`Decoder`] returning a
//! [`DecodeFlow`]. `Ok` carries a (possibly error-valued) result; `Err`
//! carries an [`Interrupt`]: either the decode must stop, or it needs
//! bytes from the caller first. Callers propagate both with `?`.

mod abi;
mod basic;
mod constant;
mod event;
mod special;

use crate::allocate::AbiAllocations;
use crate::context::{Contexts, DecoderContext};
use crate::state::EvmState;
use alloy_primitives::{Address, Bytes, B256, U256};
use chainabi_core::constants::WORD_SIZE;
use chainabi_core::{
    DecodeOptions, DecodeResult, DecoderRequest, DecodingError, StopDecodingError, Type, TypesById,
};
use std::collections::HashMap;
use tracing::debug;

/// Non-local exits from a decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interrupt {
    Stop(StopDecodingError),
    Suspend(DecoderRequest),
}

impl From<StopDecodingError> for Interrupt {
    fn from(err: StopDecodingError) -> Self {
        Interrupt::Stop(err)
    }
}

pub type DecodeFlow<T> = Result<T, Interrupt>;

/// Answers to requests made so far in a decode.
#[derive(Debug, Clone, Default)]
pub struct Responses {
    pub code: HashMap<Address, Bytes>,
    pub storage: HashMap<U256, B256>,
}

/// Read-only inputs to a decode.
#[derive(Debug, Clone, Copy)]
pub struct DecoderInfo<'a> {
    pub state: &'a EvmState,
    pub user_defined_types: Option<&'a TypesById>,
    pub allocations: &'a AbiAllocations,
    pub contexts: &'a Contexts,
    pub current_context: Option<&'a DecoderContext>,
}

#[derive(Debug, Clone, Copy)]
pub struct Decoder<'a> {
    pub info: DecoderInfo<'a>,
    pub responses: &'a Responses,
}

impl<'a> Decoder<'a> {
    pub fn new(info: DecoderInfo<'a>, responses: &'a Responses) -> Self {
        Self { info, responses }
    }

    /// Report `error` for a value of type `ty`: a stop in strict mode,
    /// an error result otherwise.
    pub(crate) fn fail(
        &self,
        ty: &Type,
        error: DecodingError,
        options: DecodeOptions,
    ) -> DecodeFlow<DecodeResult> {
        if options.strict_abi_mode {
            debug!(ty = %ty, error = %error, "strict mode: stopping decode");
            return Err(Interrupt::Stop(StopDecodingError::new(error)));
        }
        Ok(DecodeResult::error(ty.clone(), error))
    }

    /// Deployed code at `address`, suspending if it has not been supplied.
    pub(crate) fn code_at(&self, address: Address) -> DecodeFlow<Bytes> {
        match self.responses.code.get(&address) {
            Some(code) => Ok(code.clone()),
            None => Err(Interrupt::Suspend(DecoderRequest::Code { address })),
        }
    }
}

/// Left-pad up to 32 bytes into a word.
pub(crate) fn to_word(bytes: &[u8]) -> B256 {
    let tail = &bytes[bytes.len().saturating_sub(WORD_SIZE)..];
    let mut word = B256::ZERO;
    word[WORD_SIZE - tail.len()..].copy_from_slice(tail);
    word
}

#[cfg(test)]
pub(crate) mod testing {
    use super::{Decoder, DecoderInfo, Responses};
    use crate::allocate::AbiAllocations;
    use crate::context::Contexts;
    use crate::state::EvmState;
    use chainabi_core::TypesById;

    /// A 32-byte big-endian word holding `value`.
    pub(crate) fn word(value: u64) -> Vec<u8> {
        let mut word = vec![0u8; 24];
        word.extend_from_slice(&value.to_be_bytes());
        word
    }

    pub(crate) struct Fixture {
        pub state: EvmState,
        pub types: TypesById,
        pub allocations: AbiAllocations,
        pub contexts: Contexts,
    }

    impl Fixture {
        pub(crate) fn new(state: EvmState) -> Self {
            Self {
                state,
                types: TypesById::new(),
                allocations: AbiAllocations::default(),
                contexts: Contexts::new(),
            }
        }

        pub(crate) fn info(&self) -> DecoderInfo<'_> {
            DecoderInfo {
                state: &self.state,
                user_defined_types: Some(&self.types),
                allocations: &self.allocations,
                contexts: &self.contexts,
                current_context: None,
            }
        }

        pub(crate) fn decoder<'a>(&'a self, responses: &'a Responses) -> Decoder<'a> {
            Decoder::new(self.info(), responses)
        }
    }
}
