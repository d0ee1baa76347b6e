//! Building values from native data instead of raw bytes.
//!
//! No padding or range validation happens here: the caller vouches for
//! the input. Used for pseudo-variables, overrides and test fixtures.

use crate::error::WrapError;
use crate::types::Type;
use crate::value::{ContractValueInfo, DecodeResult, StringValue, Value};
use alloy_primitives::{Address, Bytes, I256, U256};

/// A native input value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeValue {
    Bool(bool),
    Text(String),
    Bytes(Vec<u8>),
    Unsigned(U256),
    Signed(I256),
}

impl NativeValue {
    fn describe(&self) -> String {
        match self {
            NativeValue::Bool(b) => format!("bool {b}"),
            NativeValue::Text(s) => format!("text {s:?}"),
            NativeValue::Bytes(b) => format!("{} raw bytes", b.len()),
            NativeValue::Unsigned(u) => format!("unsigned {u}"),
            NativeValue::Signed(i) => format!("signed {i}"),
        }
    }
}

impl From<bool> for NativeValue {
    fn from(v: bool) -> Self {
        NativeValue::Bool(v)
    }
}

impl From<&str> for NativeValue {
    fn from(v: &str) -> Self {
        NativeValue::Text(v.to_owned())
    }
}

impl From<String> for NativeValue {
    fn from(v: String) -> Self {
        NativeValue::Text(v)
    }
}

impl From<Vec<u8>> for NativeValue {
    fn from(v: Vec<u8>) -> Self {
        NativeValue::Bytes(v)
    }
}

impl From<U256> for NativeValue {
    fn from(v: U256) -> Self {
        NativeValue::Unsigned(v)
    }
}

impl From<u64> for NativeValue {
    fn from(v: u64) -> Self {
        NativeValue::Unsigned(U256::from(v))
    }
}

impl From<I256> for NativeValue {
    fn from(v: I256) -> Self {
        NativeValue::Signed(v)
    }
}

/// Wrap `native` as a value of elementary type `ty`.
pub fn wrap_elementary_value(native: NativeValue, ty: &Type) -> Result<DecodeResult, WrapError> {
    let mismatch = |native: &NativeValue| WrapError::TypeMismatch {
        expected: ty.to_string(),
        got: native.describe(),
    };

    let value = match ty {
        Type::Bool => match native {
            NativeValue::Bool(b) => Value::Bool(b),
            NativeValue::Text(ref s) if s == "true" => Value::Bool(true),
            NativeValue::Text(ref s) if s == "false" => Value::Bool(false),
            other => return Err(mismatch(&other)),
        },
        Type::Uint { .. } => Value::Uint(to_unsigned(native, ty)?),
        Type::Ufixed { places, .. } => Value::Ufixed { value: to_unsigned(native, ty)?, places: *places },
        Type::Int { .. } => Value::Int(to_signed(native, ty)?),
        Type::Fixed { places, .. } => Value::Fixed { value: to_signed(native, ty)?, places: *places },
        Type::Address { .. } => Value::Address(to_address(native, ty)?),
        Type::Contract { .. } => {
            Value::Contract(ContractValueInfo::Unknown { address: to_address(native, ty)? })
        }
        Type::String => match native {
            NativeValue::Text(s) => Value::String(StringValue::Valid(s)),
            NativeValue::Bytes(b) => Value::String(StringValue::from_bytes(&b)),
            other => return Err(mismatch(&other)),
        },
        Type::Bytes { .. } => match native {
            NativeValue::Bytes(b) => Value::Bytes(Bytes::from(b)),
            NativeValue::Text(s) => Value::Bytes(Bytes::from(decode_hex(&s)?)),
            other => return Err(mismatch(&other)),
        },
        Type::Enum { .. }
        | Type::Mapping { .. }
        | Type::Function { .. }
        | Type::Array { .. }
        | Type::Struct { .. }
        | Type::Tuple { .. }
        | Type::Magic { .. } => {
            return Err(WrapError::NotElementary { type_string: ty.to_string() })
        }
    };

    Ok(DecodeResult::value(ty.clone(), value))
}

fn decode_hex(s: &str) -> Result<Vec<u8>, WrapError> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(digits).map_err(|_| WrapError::InvalidHex { input: s.to_owned() })
}

fn to_unsigned(native: NativeValue, ty: &Type) -> Result<U256, WrapError> {
    let invalid = |input: String| WrapError::InvalidInteger { input, expected: ty.to_string() };
    match native {
        NativeValue::Unsigned(u) => Ok(u),
        NativeValue::Signed(i) if !i.is_negative() => Ok(i.into_raw()),
        NativeValue::Text(s) => {
            let parsed = match s.strip_prefix("0x") {
                Some(hex) => U256::from_str_radix(hex, 16),
                None => U256::from_str_radix(&s, 10),
            };
            parsed.map_err(|_| invalid(s))
        }
        other => Err(invalid(other.describe())),
    }
}

fn to_signed(native: NativeValue, ty: &Type) -> Result<I256, WrapError> {
    let invalid = |input: String| WrapError::InvalidInteger { input, expected: ty.to_string() };
    match native {
        NativeValue::Signed(i) => Ok(i),
        NativeValue::Unsigned(u) => I256::try_from(u).map_err(|_| invalid(u.to_string())),
        NativeValue::Text(s) => {
            let parsed = if s.trim_start_matches('-').starts_with("0x") {
                I256::from_hex_str(&s)
            } else {
                I256::from_dec_str(&s)
            };
            parsed.map_err(|_| invalid(s))
        }
        other => Err(invalid(other.describe())),
    }
}

fn to_address(native: NativeValue, ty: &Type) -> Result<Address, WrapError> {
    match native {
        NativeValue::Text(s) => {
            s.parse::<Address>().map_err(|_| WrapError::InvalidAddress { input: s })
        }
        NativeValue::Bytes(b) if b.len() == 20 => Ok(Address::from_slice(&b)),
        NativeValue::Unsigned(u) => {
            let word = u.to_be_bytes::<32>();
            Ok(Address::from_slice(&word[12..]))
        }
        other => Err(WrapError::TypeMismatch { expected: ty.to_string(), got: other.describe() }),
    }
}
