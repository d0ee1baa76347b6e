//! Compile-time constants, already evaluated to a word.

use super::{DecodeFlow, Decoder};
use alloy_primitives::Bytes;
use chainabi_core::{BytesKind, DecodeOptions, DecodeResult, Pointer, Type, Value};

impl Decoder<'_> {
    /// Constant `bytesN` values are left-padded, unlike ABI `bytesN`, so
    /// they are taken from the end of the word.
    pub fn decode_constant(
        &self,
        ty: &Type,
        pointer: &Pointer,
        options: DecodeOptions,
    ) -> DecodeFlow<DecodeResult> {
        let Type::Bytes { kind: BytesKind::Static { length } } = ty else {
            return self.decode_value(ty, pointer, options);
        };
        let word = match self.read(pointer)? {
            Ok(word) => word,
            Err(error) => return self.fail(ty, error, options),
        };
        let tail = &word[word.len().saturating_sub(usize::from(*length))..];
        Ok(DecodeResult::value(ty.clone(), Value::Bytes(Bytes::copy_from_slice(tail))))
    }
}
