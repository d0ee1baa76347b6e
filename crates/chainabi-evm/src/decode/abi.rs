//! ABI-encoded reference types: arrays, structs, tuples, `string` and
//! `bytes`, following head offsets into the tail.

use super::{DecodeFlow, Decoder, Interrupt};
use crate::allocate::{abi_size_info, AbiSizeInfo};
use alloy_primitives::U256;
use chainabi_core::constants::{to_safe_usize, word_to_u256, WORD_SIZE};
use chainabi_core::{
    ArrayKind, BytesKind, DataLocation, DecodeOptions, DecodeResult, DecodingError,
    NameTypePair, NamedResult, Pointer, StopDecodingError, Type, Value,
};
use tracing::debug;

impl Decoder<'_> {
    /// Decode `ty` from ABI-encoded data at `pointer`.
    pub fn decode_abi(
        &self,
        ty: &Type,
        pointer: &Pointer,
        options: DecodeOptions,
    ) -> DecodeFlow<DecodeResult> {
        if !ty.is_reference_type() && !matches!(ty, Type::Tuple { .. }) {
            return self.decode_value(ty, pointer, options);
        }
        let info = match self.size_info(ty, options)? {
            Ok(info) => info,
            Err(result) => return Ok(result),
        };
        // a stack slot holds a calldata offset whether or not the type is dynamic
        if info.dynamic || matches!(pointer, Pointer::Stack { .. }) {
            self.decode_abi_reference_by_address(ty, pointer, options)
        } else {
            self.decode_abi_reference_static(ty, pointer, options)
        }
    }

    /// Size info for `ty`, or the result to report when it has none.
    fn size_info(
        &self,
        ty: &Type,
        options: DecodeOptions,
    ) -> DecodeFlow<Result<AbiSizeInfo, DecodeResult>> {
        match abi_size_info(ty, self.info.allocations) {
            Ok(Some(info)) => Ok(Ok(info)),
            Ok(None) => {
                let error = DecodingError::IllegalAbiType { type_string: ty.to_string() };
                self.fail(ty, error, options).map(Err)
            }
            Err(err) => {
                let error = DecodingError::from(err);
                if options.allow_retry && matches!(error, DecodingError::UserDefinedTypeNotFound { .. })
                {
                    return Err(Interrupt::Stop(StopDecodingError::retryable(error)));
                }
                self.fail(ty, error, options).map(Err)
            }
        }
    }

    /// Follow the offset word at `pointer` and decode what it points to.
    pub fn decode_abi_reference_by_address(
        &self,
        ty: &Type,
        pointer: &Pointer,
        options: DecodeOptions,
    ) -> DecodeFlow<DecodeResult> {
        let location = match pointer {
            Pointer::Data(data) => data.location,
            Pointer::Stack { .. } => DataLocation::Calldata,
            _ => {
                let error = DecodingError::UnsupportedType { type_string: ty.to_string() };
                return self.fail(ty, error, options);
            }
        };
        let raw = match self.read(pointer)? {
            Ok(bytes) => word_to_u256(&bytes),
            Err(error) => return self.fail(ty, error, options),
        };
        let base = options.abi_pointer_base.unwrap_or(0);
        let Some(start) = to_safe_usize(raw).and_then(|offset| base.checked_add(offset)) else {
            return self.fail(ty, DecodingError::OverlargePointer { pointer: raw }, options);
        };

        let info = match self.size_info(ty, options)? {
            Ok(info) => info,
            Err(result) => return Ok(result),
        };
        if !info.dynamic {
            return self.decode_static_at(ty, location, start, options);
        }

        match ty {
            Type::String | Type::Bytes { kind: BytesKind::Dynamic } => {
                self.decode_bytes_at(ty, location, start, options)
            }
            Type::Array { base, kind } => {
                self.decode_array_at(ty, base, kind, location, start, options)
            }
            Type::Struct { id, .. } => {
                self.decode_struct_by_position(ty, id, location, start, options)
            }
            Type::Tuple { members } => {
                self.decode_tuple_by_position(ty, members, location, start, options)
            }
            Type::Bool
            | Type::Address { .. }
            | Type::Contract { .. }
            | Type::Uint { .. }
            | Type::Int { .. }
            | Type::Fixed { .. }
            | Type::Ufixed { .. }
            | Type::Enum { .. }
            | Type::Bytes { kind: BytesKind::Static { .. } }
            | Type::Mapping { .. }
            | Type::Function { .. }
            | Type::Magic { .. } => {
                let error = DecodingError::UnsupportedType { type_string: ty.to_string() };
                self.fail(ty, error, options)
            }
        }
    }

    /// Decode a static reference type in place.
    pub fn decode_abi_reference_static(
        &self,
        ty: &Type,
        pointer: &Pointer,
        options: DecodeOptions,
    ) -> DecodeFlow<DecodeResult> {
        let Pointer::Data(data) = pointer else {
            let error = DecodingError::UnsupportedType { type_string: ty.to_string() };
            return self.fail(ty, error, options);
        };
        self.decode_static_at(ty, data.location, data.start, options)
    }

    fn decode_static_at(
        &self,
        ty: &Type,
        location: DataLocation,
        start: usize,
        options: DecodeOptions,
    ) -> DecodeFlow<DecodeResult> {
        match ty {
            Type::Array { base, kind: ArrayKind::Static { length } } => {
                // declared lengths are trusted: no heads guard here
                let Some(length) = to_safe_usize(*length) else {
                    let error = DecodingError::OverlargeStaticLength { length: *length };
                    return self.fail(ty, error, options);
                };
                self.decode_elements(ty, base, length, location, start, options)
            }
            Type::Struct { id, .. } => {
                self.decode_struct_by_position(ty, id, location, start, options)
            }
            Type::Tuple { members } => {
                self.decode_tuple_by_position(ty, members, location, start, options)
            }
            _ => {
                let error = DecodingError::UnsupportedType { type_string: ty.to_string() };
                self.fail(ty, error, options)
            }
        }
    }

    /// A `string` or `bytes` body: a length word (unless overridden) then content.
    fn decode_bytes_at(
        &self,
        ty: &Type,
        location: DataLocation,
        start: usize,
        options: DecodeOptions,
    ) -> DecodeFlow<DecodeResult> {
        let (length, content_start) = match options.length_override {
            Some(length) => (length, start),
            None => match self.read(&Pointer::data(location, start, WORD_SIZE))? {
                Ok(bytes) => (word_to_u256(&bytes), start.saturating_add(WORD_SIZE)),
                Err(error) => return self.fail(ty, error, options),
            },
        };

        let data_length = self.data_length(location);
        if options.strict_abi_mode && length > U256::from(data_length) {
            let error =
                DecodingError::OverlongArrayOrString { length, data_length: Some(data_length) };
            return self.fail(ty, error, options);
        }
        let Some(length) = to_safe_usize(length) else {
            let error = DecodingError::OverlongArrayOrString { length, data_length: None };
            return self.fail(ty, error, options);
        };
        self.decode_value(ty, &Pointer::data(location, content_start, length), options.inherited())
    }

    fn decode_array_at(
        &self,
        ty: &Type,
        base: &Type,
        kind: &ArrayKind,
        location: DataLocation,
        start: usize,
        options: DecodeOptions,
    ) -> DecodeFlow<DecodeResult> {
        let (raw_length, list_start) = match (kind, options.length_override) {
            (ArrayKind::Static { length }, _) => (*length, start),
            (ArrayKind::Dynamic, Some(length)) => (length, start),
            (ArrayKind::Dynamic, None) => {
                match self.read(&Pointer::data(location, start, WORD_SIZE))? {
                    Ok(bytes) => (word_to_u256(&bytes), start.saturating_add(WORD_SIZE)),
                    Err(error) => return self.fail(ty, error, options),
                }
            }
        };

        let base_info = match self.size_info(base, options)? {
            Ok(info) => info,
            Err(result) => return Ok(result),
        };

        if matches!(kind, ArrayKind::Dynamic) {
            // every element needs at least its head in the remaining data
            let data_length = self.data_length(location);
            let available = data_length.saturating_sub(list_start);
            let fits = match to_safe_usize(raw_length) {
                Some(count) if base_info.size == 0 => count <= data_length,
                Some(count) => count.checked_mul(base_info.size).is_some_and(|n| n <= available),
                None => false,
            };
            if !fits {
                debug!(length = %raw_length, data_length, "array length exceeds data");
                let error = DecodingError::OverlongArrayOrString {
                    length: raw_length,
                    data_length: Some(data_length),
                };
                return self.fail(ty, error, options);
            }
        }

        let Some(length) = to_safe_usize(raw_length) else {
            let error = DecodingError::OverlargeStaticLength { length: raw_length };
            return self.fail(ty, error, options);
        };
        self.decode_elements(ty, base, length, location, list_start, options)
    }

    /// `length` contiguous elements from `list_start`; nested offsets are
    /// relative to `list_start`.
    fn decode_elements(
        &self,
        ty: &Type,
        base: &Type,
        length: usize,
        location: DataLocation,
        list_start: usize,
        options: DecodeOptions,
    ) -> DecodeFlow<DecodeResult> {
        let base_info = match self.size_info(base, options)? {
            Ok(info) => info,
            Err(result) => return Ok(result),
        };
        let child = options.inherited().with_base(list_start);
        let mut items = Vec::with_capacity(length.min(1024));
        for index in 0..length {
            let element_start = index.saturating_mul(base_info.size).saturating_add(list_start);
            let pointer = Pointer::data(location, element_start, base_info.size);
            items.push(self.decode_abi(base, &pointer, child)?);
        }
        Ok(DecodeResult::value(ty.clone(), Value::Array(items)))
    }

    /// Decode a struct whose members start at `start`, using its stored allocation.
    pub fn decode_struct_by_position(
        &self,
        ty: &Type,
        id: &str,
        location: DataLocation,
        start: usize,
        options: DecodeOptions,
    ) -> DecodeFlow<DecodeResult> {
        let allocation = match self.info.allocations.lookup(id) {
            Some(Some(allocation)) => allocation,
            Some(None) => {
                let error = DecodingError::IllegalAbiType { type_string: ty.to_string() };
                return self.fail(ty, error, options);
            }
            None => {
                let error = DecodingError::UserDefinedTypeNotFound { id: id.to_owned() };
                if options.strict_abi_mode || options.allow_retry {
                    debug!(id, "struct allocation missing, stopping for retry");
                    return Err(Interrupt::Stop(StopDecodingError::retryable(error)));
                }
                return Ok(DecodeResult::error(ty.clone(), error));
            }
        };

        let child = options.inherited().with_base(start);
        let mut members = Vec::with_capacity(allocation.members.len());
        for member in &allocation.members {
            let pointer = Pointer::data(
                location,
                start.saturating_add(member.pointer.start),
                member.pointer.length,
            );
            let value = self.decode_abi(&member.ty, &pointer, child)?;
            members.push(NamedResult::new(member.name.clone(), value));
        }
        Ok(DecodeResult::value(ty.clone(), Value::Struct(members)))
    }

    /// Decode a tuple laid out contiguously from `start`, sizing members as it goes.
    pub fn decode_tuple_by_position(
        &self,
        ty: &Type,
        members: &[NameTypePair],
        location: DataLocation,
        start: usize,
        options: DecodeOptions,
    ) -> DecodeFlow<DecodeResult> {
        let child = options.inherited().with_base(start);
        let mut position = start;
        let mut decoded = Vec::with_capacity(members.len());
        for member in members {
            let info = match self.size_info(&member.ty, options)? {
                Ok(info) => info,
                Err(result) => {
                    decoded.push(NamedResult::new(member.name.clone(), result));
                    break;
                }
            };
            let pointer = Pointer::data(location, position, info.size);
            let value = self.decode_abi(&member.ty, &pointer, child)?;
            decoded.push(NamedResult::new(member.name.clone(), value));
            position = position.saturating_add(info.size);
        }
        Ok(DecodeResult::value(ty.clone(), Value::Tuple(decoded)))
    }
}

#[cfg(test)]
mod tests {
    use crate::allocate::allocate_abi_types;
    use crate::decode::testing::{word, Fixture};
    use crate::decode::{Interrupt, Responses};
    use crate::state::EvmState;
    use alloy_primitives::U256;
    use chainabi_core::{
        DecodeOptions, DecodeResult, DecodingError, NameTypePair, Pointer, Type,
        UserDefinedType, Value,
    };

    fn concat(words: &[Vec<u8>]) -> Vec<u8> {
        words.concat()
    }

    fn padded(text: &str) -> Vec<u8> {
        let mut bytes = text.as_bytes().to_vec();
        bytes.resize(bytes.len().div_ceil(32) * 32, 0);
        bytes
    }

    fn decode_abi(fixture: &Fixture, ty: &Type, options: DecodeOptions) -> DecodeResult {
        let responses = Responses::default();
        let result = fixture
            .decoder(&responses)
            .decode_abi(ty, &Pointer::calldata(0, 32), options)
            .unwrap();
        result
    }

    #[test]
    fn string_follows_offset() {
        let data = concat(&[word(32), word(5), padded("hello")]);
        let fixture = Fixture::new(EvmState::with_calldata(data));
        let result = decode_abi(&fixture, &Type::String, DecodeOptions::default());
        assert_eq!(result.as_str(), Some("hello"));
    }

    #[test]
    fn dynamic_array_of_strings_uses_list_start_as_base() {
        // offsets inside the array are relative to the first element head
        let data = concat(&[
            word(32),
            word(2),
            word(64),
            word(128),
            word(2),
            padded("ab"),
            word(3),
            padded("cde"),
        ]);
        let fixture = Fixture::new(EvmState::with_calldata(data));
        let result =
            decode_abi(&fixture, &Type::dynamic_array(Type::String), DecodeOptions::default());
        let Some(Value::Array(items)) = result.as_value() else {
            panic!("expected array, got {result:?}");
        };
        let strings: Vec<_> = items.iter().map(|i| i.as_str().unwrap()).collect();
        assert_eq!(strings, ["ab", "cde"]);
    }

    #[test]
    fn oversize_length_is_overlong_error() {
        let mut huge = vec![0u8; 32];
        huge[0] = 1;
        let data = concat(&[word(32), huge]);
        let fixture = Fixture::new(EvmState::with_calldata(data));
        let result = decode_abi(&fixture, &Type::String, DecodeOptions::default());
        assert!(matches!(result.as_error(), Some(DecodingError::OverlongArrayOrString { .. })));
    }

    #[test]
    fn overlarge_pointer() {
        let fixture = Fixture::new(EvmState::with_calldata(vec![0xffu8; 32]));
        let result = decode_abi(&fixture, &Type::String, DecodeOptions::default());
        assert!(matches!(result.as_error(), Some(DecodingError::OverlargePointer { .. })));
    }

    #[test]
    fn array_heads_guard_rejects_absurd_counts() {
        let data = concat(&[word(32), word(1_000_000)]);
        let fixture = Fixture::new(EvmState::with_calldata(data));
        let result =
            decode_abi(&fixture, &Type::dynamic_array(Type::uint(256)), DecodeOptions::default());
        assert_eq!(
            result.as_error(),
            Some(&DecodingError::OverlongArrayOrString {
                length: U256::from(1_000_000u64),
                data_length: Some(64),
            })
        );
    }

    #[test]
    fn static_struct_decodes_in_place() {
        let mut fixture = Fixture::new(EvmState::with_calldata(concat(&[word(1), word(2)])));
        fixture.types.insert(
            "1".into(),
            UserDefinedType::Struct {
                id: "1".into(),
                name: "Pair".into(),
                defining_contract: None,
                members: vec![
                    NameTypePair::new("a", Type::uint(256)),
                    NameTypePair::new("b", Type::uint(256)),
                ],
            },
        );
        fixture.allocations = allocate_abi_types(&fixture.types);
        let result =
            decode_abi(&fixture, &Type::struct_ref("1", "Pair"), DecodeOptions::default());
        let Some(Value::Struct(members)) = result.as_value() else {
            panic!("expected struct, got {result:?}");
        };
        assert_eq!(members[0].name, "a");
        assert_eq!(members[1].value.as_uint(), Some(U256::from(2u64)));
    }

    #[test]
    fn missing_struct_allocation() {
        let fixture = Fixture::new(EvmState::with_calldata(word(0)));
        let ty = Type::struct_ref("9", "Ghost");
        let result = decode_abi(&fixture, &ty, DecodeOptions::default());
        assert!(matches!(result.as_error(), Some(DecodingError::UserDefinedTypeNotFound { .. })));

        let responses = Responses::default();
        let options = DecodeOptions { allow_retry: true, ..DecodeOptions::default() };
        let flow = fixture.decoder(&responses).decode_abi(&ty, &Pointer::calldata(0, 32), options);
        match flow {
            Err(Interrupt::Stop(stop)) => assert!(stop.allow_retry),
            other => panic!("expected retryable stop, got {other:?}"),
        }
    }

    #[test]
    fn zero_length_static_array_is_empty() {
        let fixture = Fixture::new(EvmState::default());
        let ty = Type::static_array(Type::String, 0);
        let responses = Responses::default();
        let result = fixture
            .decoder(&responses)
            .decode_abi(&ty, &Pointer::calldata(0, 0), DecodeOptions::default())
            .unwrap();
        assert_eq!(result.as_value(), Some(&Value::Array(vec![])));
    }

    #[test]
    fn tuple_with_mapping_is_illegal() {
        let fixture = Fixture::new(EvmState::with_calldata(word(0)));
        let ty = Type::tuple(vec![
            NameTypePair::unnamed(Type::uint(8)),
            NameTypePair::unnamed(Type::Mapping {
                key: Box::new(Type::uint(256)),
                value: Box::new(Type::Bool),
            }),
        ]);
        let result = decode_abi(&fixture, &ty, DecodeOptions::default());
        assert!(matches!(result.as_error(), Some(DecodingError::IllegalAbiType { .. })));
    }
}
