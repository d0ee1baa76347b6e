//! Elementary values: everything that fits in one word, plus the bodies
//! of `string` and `bytes` once their length is known.

use super::{DecodeFlow, Decoder};
use alloy_primitives::{Address, Bytes, Selector, I256, U256};
use chainabi_core::constants::{to_safe_usize, word_to_u256, ADDRESS_SIZE, SELECTOR_SIZE, WORD_SIZE};
use chainabi_core::{
    BytesKind, ContractValueInfo, DecodeOptions, DecodeResult, DecodingError,
    FunctionExternalValue, FunctionVisibility, PaddingType, Pointer, StringValue, Type,
    UserDefinedType, Value,
};

/// The `width` significant bytes of a left-padded word, checking the
/// padding unless `permissive`.
fn left_significant(
    bytes: &[u8],
    width: usize,
    padding: PaddingType,
    permissive: bool,
) -> Result<&[u8], DecodingError> {
    let split = bytes.len().saturating_sub(width);
    let (pad, significant) = bytes.split_at(split);
    if !permissive {
        let fill = match padding {
            PaddingType::Signed if significant.first().is_some_and(|b| b & 0x80 != 0) => 0xff,
            _ => 0x00,
        };
        if pad.iter().any(|b| *b != fill) {
            return Err(DecodingError::Padding { padding, raw: Bytes::copy_from_slice(bytes) });
        }
    }
    Ok(significant)
}

/// The first `width` bytes of a right-padded word.
fn right_significant(bytes: &[u8], width: usize, permissive: bool) -> Result<&[u8], DecodingError> {
    let (significant, pad) = bytes.split_at(width.min(bytes.len()));
    if !permissive && pad.iter().any(|b| *b != 0) {
        return Err(DecodingError::Padding {
            padding: PaddingType::Right,
            raw: Bytes::copy_from_slice(bytes),
        });
    }
    Ok(significant)
}

fn sign_extend(significant: &[u8]) -> I256 {
    let negative = significant.first().is_some_and(|b| b & 0x80 != 0);
    let mut word = [if negative { 0xff } else { 0x00 }; WORD_SIZE];
    let tail = &significant[significant.len().saturating_sub(WORD_SIZE)..];
    word[WORD_SIZE - tail.len()..].copy_from_slice(tail);
    I256::from_raw(U256::from_be_bytes(word))
}

fn to_address(significant: &[u8]) -> Address {
    let mut raw = [0u8; ADDRESS_SIZE];
    let tail = &significant[significant.len().saturating_sub(ADDRESS_SIZE)..];
    raw[ADDRESS_SIZE - tail.len()..].copy_from_slice(tail);
    Address::from(raw)
}

fn byte_width(bits: u16) -> usize {
    usize::from(bits / 8)
}

impl Decoder<'_> {
    /// Decode an elementary value from the bytes at `pointer`.
    pub fn decode_value(
        &self,
        ty: &Type,
        pointer: &Pointer,
        options: DecodeOptions,
    ) -> DecodeFlow<DecodeResult> {
        let bytes = match self.read(pointer)? {
            Ok(bytes) => bytes,
            Err(error) => return self.fail(ty, error, options),
        };
        let permissive = options.permissive_padding;

        let value = match ty {
            Type::Bool => left_significant(&bytes, 1, PaddingType::Zero, permissive).and_then(|s| {
                match s.last().copied().unwrap_or(0) {
                    0 => Ok(Value::Bool(false)),
                    1 => Ok(Value::Bool(true)),
                    _ => Err(DecodingError::BoolOutOfRange { raw: word_to_u256(&bytes) }),
                }
            }),
            Type::Uint { bits } => {
                left_significant(&bytes, byte_width(*bits), PaddingType::Zero, permissive)
                    .map(|s| Value::Uint(word_to_u256(s)))
            }
            Type::Int { bits } => {
                left_significant(&bytes, byte_width(*bits), PaddingType::Signed, permissive)
                    .map(|s| Value::Int(sign_extend(s)))
            }
            Type::Ufixed { bits, places } => {
                left_significant(&bytes, byte_width(*bits), PaddingType::Zero, permissive)
                    .map(|s| Value::Ufixed { value: word_to_u256(s), places: *places })
            }
            Type::Fixed { bits, places } => {
                left_significant(&bytes, byte_width(*bits), PaddingType::Signed, permissive)
                    .map(|s| Value::Fixed { value: sign_extend(s), places: *places })
            }
            Type::Address { .. } => {
                left_significant(&bytes, ADDRESS_SIZE, PaddingType::Zero, permissive)
                    .map(|s| Value::Address(to_address(s)))
            }
            Type::Contract { .. } => {
                match left_significant(&bytes, ADDRESS_SIZE, PaddingType::Zero, permissive) {
                    Ok(s) => Ok(Value::Contract(self.contract_info(to_address(s))?)),
                    Err(error) => Err(error),
                }
            }
            Type::Enum { id, .. } => return self.decode_enum(ty, id, &bytes, options),
            Type::String => Ok(Value::String(StringValue::from_bytes(&bytes))),
            Type::Bytes { kind: BytesKind::Static { length } } => {
                right_significant(&bytes, usize::from(*length), permissive)
                    .map(|s| Value::Bytes(Bytes::copy_from_slice(s)))
            }
            Type::Bytes { kind: BytesKind::Dynamic } => {
                Ok(Value::Bytes(Bytes::copy_from_slice(&bytes)))
            }
            Type::Function { visibility: FunctionVisibility::External } => {
                let width = ADDRESS_SIZE + SELECTOR_SIZE;
                if bytes.len() < width {
                    Err(DecodingError::Padding {
                        padding: PaddingType::Right,
                        raw: Bytes::copy_from_slice(&bytes),
                    })
                } else {
                    match right_significant(&bytes, width, permissive) {
                        Ok(s) => {
                            let address = to_address(&s[..ADDRESS_SIZE]);
                            let selector = Selector::from_slice(&s[ADDRESS_SIZE..width]);
                            Ok(Value::FunctionExternal(self.external_function(address, selector)?))
                        }
                        Err(error) => Err(error),
                    }
                }
            }
            Type::Function { visibility: FunctionVisibility::Internal }
            | Type::Mapping { .. }
            | Type::Array { .. }
            | Type::Struct { .. }
            | Type::Tuple { .. }
            | Type::Magic { .. } => {
                Err(DecodingError::UnsupportedType { type_string: ty.to_string() })
            }
        };
        match value {
            Ok(value) => Ok(DecodeResult::value(ty.clone(), value)),
            Err(error) => self.fail(ty, error, options),
        }
    }

    fn decode_enum(
        &self,
        ty: &Type,
        id: &str,
        bytes: &[u8],
        options: DecodeOptions,
    ) -> DecodeFlow<DecodeResult> {
        let names = match self.info.user_defined_types.and_then(|types| types.get(id)) {
            Some(UserDefinedType::Enum { options: names, .. }) => names,
            _ => {
                let raw = word_to_u256(bytes);
                let error = DecodingError::EnumNotFound { id: id.to_owned(), raw };
                return self.fail(ty, error, options);
            }
        };
        let width = if names.len() > 256 { 2 } else { 1 };
        let significant =
            match left_significant(bytes, width, PaddingType::Zero, options.permissive_padding) {
                Ok(significant) => significant,
                Err(error) => return self.fail(ty, error, options),
            };
        let numeric = word_to_u256(significant);
        let name = to_safe_usize(numeric).and_then(|index| names.get(index));
        match name {
            Some(name) => {
                Ok(DecodeResult::value(ty.clone(), Value::Enum { name: name.clone(), numeric }))
            }
            None => {
                let error = DecodingError::EnumOutOfRange { id: id.to_owned(), raw: numeric };
                self.fail(ty, error, options)
            }
        }
    }

    /// Identify the contract at `address` by its deployed code.
    fn contract_info(&self, address: Address) -> DecodeFlow<ContractValueInfo> {
        let code = self.code_at(address)?;
        Ok(match self.info.contexts.find_deployed_by_code(&code) {
            Some(context) => ContractValueInfo::Known { address, class: context.class() },
            None => ContractValueInfo::Unknown { address },
        })
    }

    fn external_function(
        &self,
        address: Address,
        selector: Selector,
    ) -> DecodeFlow<FunctionExternalValue> {
        let code = self.code_at(address)?;
        let Some(context) = self.info.contexts.find_deployed_by_code(&code) else {
            let contract = ContractValueInfo::Unknown { address };
            return Ok(FunctionExternalValue::Unknown { contract, selector });
        };
        let contract = ContractValueInfo::Known { address, class: context.class() };
        let function = context
            .abi
            .as_ref()
            .and_then(|abi| abi.functions().find(|f| f.selector() == selector));
        Ok(match function {
            Some(function) => FunctionExternalValue::Known {
                contract,
                selector,
                signature: function.signature(),
            },
            None => FunctionExternalValue::Invalid { contract, selector },
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::context::{Contexts, DecoderContext};
    use crate::decode::testing::{word, Fixture};
    use crate::decode::{Interrupt, Responses};
    use crate::state::EvmState;
    use alloy_json_abi::{Function, JsonAbi, StateMutability};
    use alloy_primitives::{Address, Bytes, I256, U256};
    use chainabi_core::{
        ContractValueInfo, DecodeOptions, DecoderRequest, DecodingError, FunctionExternalValue,
        PaddingType, Pointer, StringValue, Type, UserDefinedType, Value,
    };

    fn decode(state: EvmState, ty: Type) -> chainabi_core::DecodeResult {
        let fixture = Fixture::new(state);
        let responses = Responses::default();
        let result = fixture
            .decoder(&responses)
            .decode_value(&ty, &Pointer::calldata(0, 32), DecodeOptions::default())
            .unwrap();
        result
    }

    #[test]
    fn uint_padding_is_checked() {
        let ok = decode(EvmState::with_calldata(word(0x2a)), Type::uint(8));
        assert_eq!(ok.as_uint(), Some(U256::from(42u64)));

        let mut dirty = word(0x2a);
        dirty[0] = 1;
        let bad = decode(EvmState::with_calldata(dirty.clone()), Type::uint(8));
        assert!(matches!(
            bad.as_error(),
            Some(DecodingError::Padding { padding: PaddingType::Zero, .. })
        ));

        let fixture = Fixture::new(EvmState::with_calldata(dirty));
        let options = DecodeOptions { permissive_padding: true, ..DecodeOptions::default() };
        let lenient = fixture
            .decoder(&Responses::default())
            .decode_value(&Type::uint(8), &Pointer::calldata(0, 32), options)
            .unwrap();
        assert_eq!(lenient.as_uint(), Some(U256::from(42u64)));
    }

    #[test]
    fn int_is_sign_extended() {
        let minus_one = decode(EvmState::with_calldata(vec![0xffu8; 32]), Type::int(8));
        assert_eq!(minus_one.as_value(), Some(&Value::Int(I256::MINUS_ONE)));

        let mut bad = vec![0u8; 32];
        bad[31] = 0x80;
        let err = decode(EvmState::with_calldata(bad), Type::int(8));
        assert!(matches!(
            err.as_error(),
            Some(DecodingError::Padding { padding: PaddingType::Signed, .. })
        ));
    }

    #[test]
    fn bool_range() {
        assert_eq!(
            decode(EvmState::with_calldata(word(1)), Type::Bool).as_value(),
            Some(&Value::Bool(true))
        );
        assert!(matches!(
            decode(EvmState::with_calldata(word(2)), Type::Bool).as_error(),
            Some(DecodingError::BoolOutOfRange { .. })
        ));
    }

    #[test]
    fn bytes_n_is_right_padded() {
        let mut raw = vec![0u8; 32];
        raw[..2].copy_from_slice(&[0xbe, 0xef]);
        let ok = decode(EvmState::with_calldata(raw.clone()), Type::bytes_static(2));
        assert_eq!(ok.as_value(), Some(&Value::Bytes(Bytes::from(vec![0xbe, 0xef]))));

        raw[31] = 1;
        let bad = decode(EvmState::with_calldata(raw), Type::bytes_static(2));
        assert!(matches!(
            bad.as_error(),
            Some(DecodingError::Padding { padding: PaddingType::Right, .. })
        ));
    }

    #[test]
    fn malformed_utf8_is_kept_as_bytes() {
        let fixture = Fixture::new(EvmState::with_calldata(vec![0xff, 0xfe]));
        let result = fixture
            .decoder(&Responses::default())
            .decode_value(&Type::String, &Pointer::calldata(0, 2), DecodeOptions::default())
            .unwrap();
        assert!(matches!(result.as_value(), Some(Value::String(StringValue::Malformed(_)))));
    }

    #[test]
    fn enum_lookup() {
        let mut fixture = Fixture::new(EvmState::with_calldata(word(1)));
        fixture.types.insert(
            "5".into(),
            UserDefinedType::Enum {
                id: "5".into(),
                name: "Color".into(),
                options: vec!["Red".into(), "Green".into()],
            },
        );
        let ty = Type::Enum { id: "5".into(), name: "Color".into() };
        let responses = Responses::default();
        let result = fixture
            .decoder(&responses)
            .decode_value(&ty, &Pointer::calldata(0, 32), DecodeOptions::default())
            .unwrap();
        assert_eq!(
            result.as_value(),
            Some(&Value::Enum { name: "Green".into(), numeric: U256::from(1u64) })
        );

        let missing = Type::Enum { id: "6".into(), name: "Shade".into() };
        let result = fixture
            .decoder(&responses)
            .decode_value(&missing, &Pointer::calldata(0, 32), DecodeOptions::default())
            .unwrap();
        assert!(matches!(result.as_error(), Some(DecodingError::EnumNotFound { .. })));
    }

    #[test]
    fn contract_values_request_code() {
        let address = Address::repeat_byte(0x11);
        let mut raw = vec![0u8; 12];
        raw.extend_from_slice(address.as_slice());
        let mut fixture = Fixture::new(EvmState::with_calldata(raw));
        let context = DecoderContext::new("Token", vec![0x60, 0x80], false);
        fixture.contexts = Contexts::from_iter([context]);
        let ty = Type::Contract { id: "1".into(), name: "Token".into() };

        let flow = fixture.decoder(&Responses::default()).decode_value(
            &ty,
            &Pointer::calldata(0, 32),
            DecodeOptions::default(),
        );
        assert_eq!(flow.unwrap_err(), Interrupt::Suspend(DecoderRequest::Code { address }));

        let mut responses = Responses::default();
        responses.code.insert(address, Bytes::from(vec![0x60, 0x80]));
        let result = fixture
            .decoder(&responses)
            .decode_value(&ty, &Pointer::calldata(0, 32), DecodeOptions::default())
            .unwrap();
        match result.as_value() {
            Some(Value::Contract(ContractValueInfo::Known { class, .. })) => {
                assert_eq!(class.name, "Token")
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn external_function_matches_selector() {
        let address = Address::repeat_byte(0x22);
        let function = Function {
            name: "ping".into(),
            inputs: vec![],
            outputs: vec![],
            state_mutability: StateMutability::NonPayable,
        };
        let selector = function.selector();
        let mut raw = address.to_vec();
        raw.extend_from_slice(selector.as_slice());
        raw.resize(32, 0);

        let mut abi = JsonAbi::new();
        abi.functions.insert("ping".into(), vec![function]);
        let context = DecoderContext::new("Pinger", vec![0x01], false).with_abi(abi);
        let mut fixture = Fixture::new(EvmState::with_calldata(raw));
        fixture.contexts = Contexts::from_iter([context]);

        let mut responses = Responses::default();
        responses.code.insert(address, Bytes::from(vec![0x01]));
        let ty = Type::Function { visibility: chainabi_core::FunctionVisibility::External };
        let result = fixture
            .decoder(&responses)
            .decode_value(&ty, &Pointer::calldata(0, 32), DecodeOptions::default())
            .unwrap();
        match result.as_value() {
            Some(Value::FunctionExternal(FunctionExternalValue::Known { signature, .. })) => {
                assert_eq!(signature, "ping()")
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn strict_mode_stops_on_padding() {
        let mut dirty = word(1);
        dirty[0] = 9;
        let fixture = Fixture::new(EvmState::with_calldata(dirty));
        let flow = fixture.decoder(&Responses::default()).decode_value(
            &Type::Bool,
            &Pointer::calldata(0, 32),
            DecodeOptions::strict(),
        );
        assert!(matches!(flow, Err(Interrupt::Stop(_))));
    }
}
