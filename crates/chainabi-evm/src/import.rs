//! ABI JSON parameters → structural [`Type`]s.
//!
//! Used when only the bare ABI is known ("abi" decoding mode). Struct
//! parameters become anonymous tuples; array suffixes and `tuple` are
//! recognized from the type string.

use alloy_json_abi::{EventParam, Param};
use alloy_primitives::U256;
use chainabi_core::{
    AddressKind, AllocationError, ArrayKind, BytesKind, FunctionVisibility, NameTypePair, Type,
};

const DEFAULT_FIXED_BITS: u16 = 128;
const DEFAULT_FIXED_PLACES: u8 = 18;

pub fn abi_parameter_to_type(param: &Param) -> Result<Type, AllocationError> {
    parse_abi_type(&param.ty, &param.components)
}

pub fn abi_event_parameter_to_type(param: &EventParam) -> Result<Type, AllocationError> {
    parse_abi_type(&param.ty, &param.components)
}

/// Convert a parameter list into named members, in order.
pub fn abi_parameters_to_members(params: &[Param]) -> Result<Vec<NameTypePair>, AllocationError> {
    params
        .iter()
        .map(|p| Ok(NameTypePair::new(p.name.clone(), abi_parameter_to_type(p)?)))
        .collect()
}

fn parse_abi_type(ty: &str, components: &[Param]) -> Result<Type, AllocationError> {
    let invalid = || AllocationError::InvalidAbiType { ty: ty.to_owned() };

    if let Some(body) = ty.strip_suffix(']') {
        let open = body.rfind('[').ok_or_else(invalid)?;
        let base = parse_abi_type(&body[..open], components)?;
        let length = &body[open + 1..];
        if length.is_empty() {
            return Ok(Type::dynamic_array(base));
        }
        let length = U256::from_str_radix(length, 10).map_err(|_| invalid())?;
        return Ok(Type::Array {
            base: Box::new(base),
            kind: ArrayKind::Static { length },
        });
    }

    let parsed = match ty {
        "tuple" => Type::tuple(abi_parameters_to_members(components)?),
        "bool" => Type::Bool,
        "address" => Type::Address { kind: AddressKind::General },
        "string" => Type::String,
        "bytes" => Type::Bytes { kind: BytesKind::Dynamic },
        "function" => Type::Function { visibility: FunctionVisibility::External },
        "uint" => Type::uint(256),
        "int" => Type::int(256),
        "fixed" => Type::Fixed { bits: DEFAULT_FIXED_BITS, places: DEFAULT_FIXED_PLACES },
        "ufixed" => Type::Ufixed { bits: DEFAULT_FIXED_BITS, places: DEFAULT_FIXED_PLACES },
        _ => {
            if let Some(n) = ty.strip_prefix("bytes") {
                let length: u8 = n.parse().map_err(|_| invalid())?;
                if !(1..=32).contains(&length) {
                    return Err(invalid());
                }
                Type::bytes_static(length)
            } else if let Some(n) = ty.strip_prefix("uint") {
                Type::uint(parse_bits(n).ok_or_else(invalid)?)
            } else if let Some(n) = ty.strip_prefix("int") {
                Type::int(parse_bits(n).ok_or_else(invalid)?)
            } else if let Some(suffix) = ty.strip_prefix("ufixed") {
                let (bits, places) = parse_fixed(suffix).ok_or_else(invalid)?;
                Type::Ufixed { bits, places }
            } else if let Some(suffix) = ty.strip_prefix("fixed") {
                let (bits, places) = parse_fixed(suffix).ok_or_else(invalid)?;
                Type::Fixed { bits, places }
            } else {
                return Err(invalid());
            }
        }
    };
    Ok(parsed)
}

fn parse_bits(n: &str) -> Option<u16> {
    let bits: u16 = n.parse().ok()?;
    (bits % 8 == 0 && (8..=256).contains(&bits)).then_some(bits)
}

fn parse_fixed(suffix: &str) -> Option<(u16, u8)> {
    let (bits, places) = suffix.split_once('x')?;
    Some((parse_bits(bits)?, places.parse().ok().filter(|p| *p <= 80)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(ty: &str, components: Vec<Param>) -> Param {
        Param { ty: ty.into(), name: String::new(), components, internal_type: None }
    }

    #[test]
    fn elementary_types() {
        assert_eq!(abi_parameter_to_type(&param("uint8", vec![])).unwrap(), Type::uint(8));
        assert_eq!(abi_parameter_to_type(&param("bytes32", vec![])).unwrap(), Type::bytes_static(32));
        assert_eq!(
            abi_parameter_to_type(&param("fixed128x18", vec![])).unwrap(),
            Type::Fixed { bits: 128, places: 18 }
        );
        assert!(abi_parameter_to_type(&param("uint7", vec![])).is_err());
        assert!(abi_parameter_to_type(&param("bytes33", vec![])).is_err());
    }

    #[test]
    fn nested_arrays_read_right_to_left() {
        let ty = abi_parameter_to_type(&param("uint256[2][]", vec![])).unwrap();
        assert_eq!(ty, Type::dynamic_array(Type::static_array(Type::uint(256), 2)));
    }

    #[test]
    fn tuple_arrays_use_components() {
        let ty = abi_parameter_to_type(&param(
            "tuple[]",
            vec![param("address", vec![]), param("string", vec![])],
        ))
        .unwrap();
        assert_eq!(
            ty,
            Type::dynamic_array(Type::tuple(vec![
                NameTypePair::unnamed(Type::address()),
                NameTypePair::unnamed(Type::String),
            ]))
        );
    }
}
