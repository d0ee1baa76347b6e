//! Indexed event parameters.

use super::{to_word, DecodeFlow, Decoder};
use chainabi_core::{DecodeOptions, DecodeResult, DecodingError, Pointer, Type};

impl Decoder<'_> {
    /// Decode a value stored in an event topic.
    ///
    /// Indexed reference types are stored as their hash, so they always
    /// come back as an `IndexedReferenceType` error, even in strict mode.
    pub fn decode_event_topic(
        &self,
        ty: &Type,
        pointer: &Pointer,
        options: DecodeOptions,
    ) -> DecodeFlow<DecodeResult> {
        if !ty.is_reference_type() && !matches!(ty, Type::Tuple { .. }) {
            return self.decode_value(ty, pointer, options);
        }
        match self.read(pointer)? {
            Ok(bytes) => Ok(DecodeResult::error(
                ty.clone(),
                DecodingError::IndexedReferenceType { raw: to_word(&bytes) },
            )),
            Err(error) => self.fail(ty, error, options),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::decode::testing::Fixture;
    use crate::decode::Responses;
    use crate::state::EvmState;
    use alloy_primitives::{Address, B256};
    use chainabi_core::{DecodeOptions, DecodingError, Pointer, Type};

    #[test]
    fn indexed_string_is_a_non_fatal_error() {
        let hash = B256::repeat_byte(0xab);
        let fixture = Fixture::new(EvmState::with_event(vec![B256::ZERO, hash], Vec::<u8>::new()));
        let responses = Responses::default();
        let result = fixture
            .decoder(&responses)
            .decode_event_topic(&Type::String, &Pointer::topic(1), DecodeOptions::strict())
            .unwrap();
        assert_eq!(result.as_error(), Some(&DecodingError::IndexedReferenceType { raw: hash }));
    }

    #[test]
    fn indexed_address_decodes() {
        let address = Address::repeat_byte(0x42);
        let topic = B256::left_padding_from(address.as_slice());
        let fixture = Fixture::new(EvmState::with_event(vec![B256::ZERO, topic], Vec::<u8>::new()));
        let responses = Responses::default();
        let result = fixture
            .decoder(&responses)
            .decode_event_topic(&Type::address(), &Pointer::topic(1), DecodeOptions::strict())
            .unwrap();
        assert_eq!(result.as_address(), Some(address));
    }
}
