//! `msg`, `tx` and `block`.

use super::{DecodeFlow, Decoder};
use crate::context::SolidityFamily;
use chainabi_core::constants::SELECTOR_SIZE;
use chainabi_core::{
    AddressKind, DataLocation, DecodeOptions, DecodeResult, MagicVariable, Pointer,
    SpecialVariable, Type, Value,
};
use indexmap::IndexMap;

impl Decoder<'_> {
    /// Decode a pseudo-variable, or an elementary value at a special pointer.
    pub fn decode_special(
        &self,
        ty: &Type,
        pointer: &Pointer,
        options: DecodeOptions,
    ) -> DecodeFlow<DecodeResult> {
        match ty {
            Type::Magic { variable } => self.decode_magic(ty, *variable, options),
            _ => self.decode_value(ty, pointer, options),
        }
    }

    fn family(&self) -> SolidityFamily {
        self.info
            .current_context
            .and_then(|ctx| ctx.compiler.as_ref())
            .map_or(SolidityFamily::Solidity08x, |c| c.family())
    }

    fn magic_address(&self, special: SpecialVariable) -> Type {
        let kind = match self.family() {
            SolidityFamily::Pre050 => AddressKind::General,
            SolidityFamily::Solidity05x => AddressKind::Specific { payable: true },
            SolidityFamily::Solidity08x => {
                AddressKind::Specific { payable: special == SpecialVariable::Coinbase }
            }
        };
        Type::Address { kind }
    }

    fn magic_fields(&self, variable: MagicVariable) -> Vec<(&'static str, Type, Pointer)> {
        let uint = || Type::uint(256);
        let special = |s: SpecialVariable| Pointer::special(s);
        match variable {
            MagicVariable::Msg => vec![
                (
                    "data",
                    Type::bytes_dynamic(),
                    Pointer::data(DataLocation::Calldata, 0, self.data_length(DataLocation::Calldata)),
                ),
                ("sig", Type::bytes_static(4), Pointer::calldata(0, SELECTOR_SIZE)),
                ("sender", self.magic_address(SpecialVariable::Sender), special(SpecialVariable::Sender)),
                ("value", uint(), special(SpecialVariable::Value)),
            ],
            MagicVariable::Tx => vec![
                ("origin", self.magic_address(SpecialVariable::Origin), special(SpecialVariable::Origin)),
                ("gasprice", uint(), special(SpecialVariable::Gasprice)),
            ],
            MagicVariable::Block => {
                let compiler = self.info.current_context.and_then(|ctx| ctx.compiler.as_ref());
                let mut fields = vec![
                    (
                        "coinbase",
                        self.magic_address(SpecialVariable::Coinbase),
                        special(SpecialVariable::Coinbase),
                    ),
                    ("difficulty", uint(), special(SpecialVariable::Difficulty)),
                    ("gaslimit", uint(), special(SpecialVariable::Gaslimit)),
                    ("number", uint(), special(SpecialVariable::Number)),
                    ("timestamp", uint(), special(SpecialVariable::Timestamp)),
                ];
                // unknown compiler: assume a recent one
                if compiler.map_or(true, |c| c.has_chainid()) {
                    fields.push(("chainid", uint(), special(SpecialVariable::Chainid)));
                }
                if compiler.map_or(true, |c| c.has_basefee()) {
                    fields.push(("basefee", uint(), special(SpecialVariable::Basefee)));
                }
                fields
            }
        }
    }

    /// Decode every field of a pseudo-variable, in its fixed order.
    pub fn decode_magic(
        &self,
        ty: &Type,
        variable: MagicVariable,
        options: DecodeOptions,
    ) -> DecodeFlow<DecodeResult> {
        let child = options.inherited();
        let mut fields = IndexMap::new();
        for (name, field_ty, pointer) in self.magic_fields(variable) {
            fields.insert(name.to_owned(), self.decode_value(&field_ty, &pointer, child)?);
        }
        Ok(DecodeResult::value(ty.clone(), Value::Magic(fields)))
    }
}

#[cfg(test)]
mod tests {
    use crate::context::{CompilerVersion, DecoderContext};
    use crate::decode::testing::Fixture;
    use crate::decode::{DecoderInfo, Decoder, Responses};
    use crate::state::EvmState;
    use alloy_primitives::{Address, U256};
    use chainabi_core::{
        AddressKind, DecodeOptions, DecodingError, MagicVariable, Pointer, SpecialVariable, Type,
        Value,
    };

    fn msg_state() -> EvmState {
        let mut state = EvmState::with_calldata(vec![0xa9, 0x05, 0x9c, 0xbb, 0x00]);
        state.set_special(SpecialVariable::Sender, U256::from(0x12u64));
        state.set_special(SpecialVariable::Value, U256::from(7u64));
        state
    }

    #[test]
    fn msg_fields_in_order() {
        let fixture = Fixture::new(msg_state());
        let responses = Responses::default();
        let ty = Type::Magic { variable: MagicVariable::Msg };
        let result = fixture
            .decoder(&responses)
            .decode_special(&ty, &Pointer::special(SpecialVariable::This), DecodeOptions::default())
            .unwrap();
        let Some(Value::Magic(fields)) = result.as_value() else {
            panic!("expected magic value, got {result:?}");
        };
        let names: Vec<_> = fields.keys().map(String::as_str).collect();
        assert_eq!(names, ["data", "sig", "sender", "value"]);
        assert_eq!(fields["sender"].as_address(), Some(Address::with_last_byte(0x12)));
        assert_eq!(fields["value"].as_uint(), Some(U256::from(7u64)));
        assert_eq!(
            fields["sender"].ty(),
            &Type::Address { kind: AddressKind::Specific { payable: false } }
        );
    }

    #[test]
    fn block_fields_depend_on_compiler() {
        let fixture = Fixture::new(EvmState::default());
        let responses = Responses::default();
        let context = DecoderContext::new("C", vec![0x00], false)
            .with_compiler(CompilerVersion::solc("0.5.0").unwrap());
        let info = DecoderInfo { current_context: Some(&context), ..fixture.info() };
        let decoder = Decoder::new(info, &responses);
        let ty = Type::Magic { variable: MagicVariable::Block };
        let result = decoder
            .decode_magic(&ty, MagicVariable::Block, DecodeOptions::default())
            .unwrap();
        let Some(Value::Magic(fields)) = result.as_value() else {
            panic!("expected magic value");
        };
        assert!(!fields.contains_key("chainid"));
        assert!(!fields.contains_key("basefee"));
        assert!(matches!(
            fields["number"].as_error(),
            Some(DecodingError::ReadSpecial { special: SpecialVariable::Number })
        ));
        assert_eq!(
            fields["coinbase"].ty(),
            &Type::Address { kind: AddressKind::Specific { payable: true } }
        );
    }
}
