//! The Allocator: ABI layouts for structs, call arguments and events.
//!
//! Struct layouts are memoized by type id in [`AbiAllocations`]. Call and
//! event layouts are derived from them once per contract and keyed for
//! lookup by context hash and selector.

mod abi;
mod calldata;
mod event;

pub use abi::{
    abi_size_info, allocate_abi_types, allocate_members, AbiAllocation, AbiAllocations,
    AbiMemberAllocation, AbiSizeInfo, AllocationScope, MemberPointer,
};
pub use calldata::{
    allocate_call_arguments, allocate_return_arguments, allocate_revert_arguments,
    build_calldata_allocations, builtin_revert_errors, CallAllocations, CallEntry,
    CalldataAllocation, CalldataAllocations, ReturndataAllocation, ReturndataKind,
};
pub use event::{
    allocate_event_arguments, build_event_allocations, EventAllocation, EventAllocations,
    TopicAllocations,
};

use crate::context::{CompilerVersion, DecoderContext};
use alloy_json_abi::JsonAbi;
use alloy_primitives::{Selector, B256};
use chainabi_core::{
    AllocationError, ContractKind, DataLocation, NameTypePair, Pointer, Type, TypesById,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Whether an allocation came from full source-level declarations or
/// from the bare ABI JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DecodingMode {
    Full,
    Abi,
}

/// Where one argument of a call, return or event lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentAllocation {
    pub name: String,
    pub ty: Type,
    pub pointer: Pointer,
}

/// A source-level function or constructor, with fully typed parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredFunction {
    pub name: String,
    /// `None` for constructors.
    pub selector: Option<Selector>,
    pub parameters: Vec<NameTypePair>,
    pub return_parameters: Vec<NameTypePair>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredEventParameter {
    pub name: String,
    pub ty: Type,
    pub indexed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredEvent {
    pub name: String,
    pub selector: B256,
    pub parameters: Vec<DeclaredEventParameter>,
}

/// A contract definition as translated from the compiler AST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractDeclaration {
    pub id: String,
    pub name: String,
    pub kind: ContractKind,
    /// Most-derived first, starting with this contract's own id.
    pub linearized_base_contracts: Vec<String>,
    pub functions: Vec<DeclaredFunction>,
    pub events: Vec<DeclaredEvent>,
    pub constructor: Option<DeclaredFunction>,
}

/// Everything known about one contract when building allocations.
#[derive(Debug, Clone)]
pub struct ContractInfo {
    pub name: String,
    pub abi: JsonAbi,
    pub deployed_context: Option<DecoderContext>,
    pub constructor_context: Option<DecoderContext>,
    pub declaration: Option<ContractDeclaration>,
    pub compiler: Option<CompilerVersion>,
}

impl ContractInfo {
    pub fn new(name: impl Into<String>, abi: JsonAbi) -> Self {
        Self {
            name: name.into(),
            abi,
            deployed_context: None,
            constructor_context: None,
            declaration: None,
            compiler: None,
        }
    }

    /// Parse a standard ABI JSON array.
    pub fn from_abi_json(name: impl Into<String>, json: &str) -> Result<Self, crate::LoadError> {
        Ok(Self::new(name, serde_json::from_str(json)?))
    }

    pub fn with_deployed_context(mut self, context: DecoderContext) -> Self {
        self.deployed_context = Some(context);
        self
    }

    pub fn with_constructor_context(mut self, context: DecoderContext) -> Self {
        self.constructor_context = Some(context);
        self
    }

    pub fn with_declaration(mut self, declaration: ContractDeclaration) -> Self {
        self.declaration = Some(declaration);
        self
    }

    pub fn with_compiler(mut self, compiler: CompilerVersion) -> Self {
        self.compiler = Some(compiler);
        self
    }

    pub fn kind(&self) -> ContractKind {
        self.declaration
            .as_ref()
            .map(|d| d.kind)
            .or_else(|| self.deployed_context.as_ref().map(|c| c.contract_kind))
            .unwrap_or(ContractKind::Contract)
    }

    /// Contexts for this contract, with ABI and compiler filled in.
    pub fn contexts(&self) -> impl Iterator<Item = DecoderContext> + '_ {
        self.deployed_context
            .iter()
            .chain(self.constructor_context.iter())
            .map(move |ctx| {
                let mut ctx = ctx.clone().with_abi(self.abi.clone()).with_kind(self.kind());
                if ctx.compiler.is_none() {
                    ctx.compiler = self.compiler.clone();
                }
                if let Some(decl) = &self.declaration {
                    ctx.contract_id.get_or_insert_with(|| decl.id.clone());
                }
                ctx
            })
    }
}

/// Search `contract` and its bases, most-derived first, for a declaration.
pub(crate) fn find_in_bases<'a, T>(
    contract: Option<&'a ContractDeclaration>,
    declarations: &HashMap<&str, &'a ContractDeclaration>,
    find: impl Fn(&'a ContractDeclaration) -> Option<&'a T>,
) -> Option<&'a T> {
    let contract = contract?;
    if contract.linearized_base_contracts.is_empty() {
        return find(contract);
    }
    contract
        .linearized_base_contracts
        .iter()
        .filter_map(|id| {
            if id == &contract.id {
                Some(contract)
            } else {
                declarations.get(id.as_str()).copied()
            }
        })
        .find_map(find)
}

/// Lay out `members` from `offset` in `location`, discarding any struct
/// allocations made along the way.
pub(crate) fn layout_arguments(
    members: &[NameTypePair],
    types: Option<&TypesById>,
    allocations: &AbiAllocations,
    offset: usize,
    location: DataLocation,
) -> Result<Option<Vec<ArgumentAllocation>>, AllocationError> {
    let mut scope = AllocationScope::new(types, allocations);
    let Some(layout) = abi::layout_members(members, &mut scope, offset)? else {
        return Ok(None);
    };
    Ok(Some(
        layout
            .members
            .into_iter()
            .map(|m| ArgumentAllocation {
                name: m.name,
                ty: m.ty,
                pointer: Pointer::data(location, m.pointer.start, m.pointer.length),
            })
            .collect(),
    ))
}

/// Try the declared parameters first, then the ABI JSON parameters.
/// Failures at this boundary are logged and yield `None`.
pub(crate) fn allocate_with_fallback<P, R>(
    entry: &str,
    declared: Option<P>,
    from_abi: impl FnOnce() -> Result<P, AllocationError>,
    layout: impl Fn(&P) -> Result<Option<R>, AllocationError>,
) -> Option<(R, DecodingMode)> {
    if let Some(parameters) = declared {
        match layout(&parameters) {
            Ok(Some(allocated)) => return Some((allocated, DecodingMode::Full)),
            Ok(None) => debug!(entry, "declared parameters not ABI-encodable, using ABI mode"),
            Err(err) => debug!(entry, error = %err, "full allocation failed, using ABI mode"),
        }
    }
    let parameters = match from_abi() {
        Ok(parameters) => parameters,
        Err(err) => {
            warn!(entry, error = %err, "unreadable ABI parameters");
            return None;
        }
    };
    match layout(&parameters) {
        Ok(Some(allocated)) => Some((allocated, DecodingMode::Abi)),
        Ok(None) => {
            warn!(entry, "ABI parameters not ABI-encodable");
            None
        }
        Err(err) => {
            warn!(entry, error = %err, "ABI allocation failed");
            None
        }
    }
}
