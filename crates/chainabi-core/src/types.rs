//! The structural type alphabet.
//!
//! Every value the decoder produces is tagged with one of these types.
//! User-defined types (structs, enums, contracts) are referenced by a
//! stable string id; their full definitions live in a [`TypesById`]
//! catalog supplied by the caller.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Catalog of user-defined types keyed by type id.
pub type TypesById = HashMap<String, UserDefinedType>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AddressKind {
    /// Plain `address` as seen in ABI JSON, payability unknown.
    General,
    /// Source-level `address` or `address payable`.
    Specific { payable: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BytesKind {
    /// `bytes1` .. `bytes32`
    Static { length: u8 },
    /// `bytes`
    Dynamic,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ArrayKind {
    /// `T[N]`; the length is kept at full width so absurd declared lengths
    /// can be reported instead of truncated.
    Static { length: U256 },
    /// `T[]`
    Dynamic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FunctionVisibility {
    External,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContractKind {
    Contract,
    Library,
    Interface,
}

/// EVM pseudo-variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MagicVariable {
    Msg,
    Tx,
    Block,
}

impl fmt::Display for MagicVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MagicVariable::Msg => write!(f, "msg"),
            MagicVariable::Tx => write!(f, "tx"),
            MagicVariable::Block => write!(f, "block"),
        }
    }
}

/// A member of a struct or tuple, or a function/event parameter.
/// Unnamed tuple members and ABI parameters carry an empty name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NameTypePair {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Type,
}

impl NameTypePair {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self { name: name.into(), ty }
    }

    pub fn unnamed(ty: Type) -> Self {
        Self { name: String::new(), ty }
    }
}

/// A structural type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "typeClass", rename_all = "camelCase")]
pub enum Type {
    Bool,
    Address {
        kind: AddressKind,
    },
    Contract {
        id: String,
        name: String,
    },
    Uint {
        bits: u16,
    },
    Int {
        bits: u16,
    },
    Fixed {
        bits: u16,
        places: u8,
    },
    Ufixed {
        bits: u16,
        places: u8,
    },
    Enum {
        id: String,
        name: String,
    },
    String,
    Bytes {
        kind: BytesKind,
    },
    Mapping {
        key: Box<Type>,
        value: Box<Type>,
    },
    Function {
        visibility: FunctionVisibility,
    },
    Array {
        base: Box<Type>,
        kind: ArrayKind,
    },
    Struct {
        id: String,
        name: String,
    },
    Tuple {
        members: Vec<NameTypePair>,
    },
    Magic {
        variable: MagicVariable,
    },
}

impl Type {
    pub fn uint(bits: u16) -> Self {
        Type::Uint { bits }
    }

    pub fn int(bits: u16) -> Self {
        Type::Int { bits }
    }

    pub fn address() -> Self {
        Type::Address { kind: AddressKind::General }
    }

    pub fn bytes_static(length: u8) -> Self {
        Type::Bytes { kind: BytesKind::Static { length } }
    }

    pub fn bytes_dynamic() -> Self {
        Type::Bytes { kind: BytesKind::Dynamic }
    }

    pub fn dynamic_array(base: Type) -> Self {
        Type::Array { base: Box::new(base), kind: ArrayKind::Dynamic }
    }

    pub fn static_array(base: Type, length: u64) -> Self {
        Type::Array {
            base: Box::new(base),
            kind: ArrayKind::Static { length: U256::from(length) },
        }
    }

    pub fn struct_ref(id: impl Into<String>, name: impl Into<String>) -> Self {
        Type::Struct { id: id.into(), name: name.into() }
    }

    pub fn tuple(members: Vec<NameTypePair>) -> Self {
        Type::Tuple { members }
    }

    /// Types whose values live behind a location rather than in a single word:
    /// arrays, structs, mappings, `string` and dynamic `bytes`.
    pub fn is_reference_type(&self) -> bool {
        match self {
            Type::Array { .. } | Type::Struct { .. } | Type::Mapping { .. } | Type::String => true,
            Type::Bytes { kind } => matches!(kind, BytesKind::Dynamic),
            Type::Bool
            | Type::Address { .. }
            | Type::Contract { .. }
            | Type::Uint { .. }
            | Type::Int { .. }
            | Type::Fixed { .. }
            | Type::Ufixed { .. }
            | Type::Enum { .. }
            | Type::Function { .. }
            | Type::Tuple { .. }
            | Type::Magic { .. } => false,
        }
    }

    /// The user-defined type id this type refers to, if any.
    pub fn user_defined_id(&self) -> Option<&str> {
        match self {
            Type::Contract { id, .. } | Type::Enum { id, .. } | Type::Struct { id, .. } => {
                Some(id.as_str())
            }
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Bool => write!(f, "bool"),
            Type::Address { kind: AddressKind::Specific { payable: true } } => {
                write!(f, "address payable")
            }
            Type::Address { .. } => write!(f, "address"),
            Type::Contract { name, .. } => write!(f, "contract {name}"),
            Type::Uint { bits } => write!(f, "uint{bits}"),
            Type::Int { bits } => write!(f, "int{bits}"),
            Type::Fixed { bits, places } => write!(f, "fixed{bits}x{places}"),
            Type::Ufixed { bits, places } => write!(f, "ufixed{bits}x{places}"),
            Type::Enum { name, .. } => write!(f, "enum {name}"),
            Type::String => write!(f, "string"),
            Type::Bytes { kind: BytesKind::Static { length } } => write!(f, "bytes{length}"),
            Type::Bytes { kind: BytesKind::Dynamic } => write!(f, "bytes"),
            Type::Mapping { key, value } => write!(f, "mapping({key} => {value})"),
            Type::Function { visibility: FunctionVisibility::External } => {
                write!(f, "function external")
            }
            Type::Function { visibility: FunctionVisibility::Internal } => {
                write!(f, "function internal")
            }
            Type::Array { base, kind: ArrayKind::Static { length } } => write!(f, "{base}[{length}]"),
            Type::Array { base, kind: ArrayKind::Dynamic } => write!(f, "{base}[]"),
            Type::Struct { name, .. } => write!(f, "struct {name}"),
            Type::Tuple { members } => {
                let parts: Vec<_> = members.iter().map(|m| m.ty.to_string()).collect();
                write!(f, "tuple({})", parts.join(","))
            }
            Type::Magic { variable } => write!(f, "{variable}"),
        }
    }
}

/// Full definition of a user-defined type as stored in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "typeClass", rename_all = "camelCase")]
pub enum UserDefinedType {
    Struct {
        id: String,
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        defining_contract: Option<String>,
        members: Vec<NameTypePair>,
    },
    Enum {
        id: String,
        name: String,
        options: Vec<String>,
    },
    Contract {
        id: String,
        name: String,
        kind: ContractKind,
        payable: bool,
    },
}

impl UserDefinedType {
    pub fn id(&self) -> &str {
        match self {
            UserDefinedType::Struct { id, .. }
            | UserDefinedType::Enum { id, .. }
            | UserDefinedType::Contract { id, .. } => id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            UserDefinedType::Struct { name, .. }
            | UserDefinedType::Enum { name, .. }
            | UserDefinedType::Contract { name, .. } => name,
        }
    }
}
