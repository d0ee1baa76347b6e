//! Call argument, return value and revert layouts.

use super::{
    allocate_with_fallback, find_in_bases, layout_arguments, AbiAllocations, ArgumentAllocation,
    ContractDeclaration, ContractInfo, DeclaredFunction, DecodingMode,
};
use crate::context::DecoderContext;
use crate::import::abi_parameters_to_members;
use alloy_json_abi::{Constructor, Error, Function, Param, StateMutability};
use alloy_primitives::{Selector, B256};
use chainabi_core::constants::SELECTOR_SIZE;
use chainabi_core::{DataLocation, NameTypePair, TypesById};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// The ABI entry a call allocation was built for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallEntry {
    Function(Function),
    Constructor(Constructor),
}

impl CallEntry {
    pub fn inputs(&self) -> &[Param] {
        match self {
            CallEntry::Function(f) => &f.inputs,
            CallEntry::Constructor(c) => &c.inputs,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            CallEntry::Function(f) => &f.name,
            CallEntry::Constructor(_) => "constructor",
        }
    }

    pub fn selector(&self) -> Option<Selector> {
        match self {
            CallEntry::Function(f) => Some(f.selector()),
            CallEntry::Constructor(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalldataAllocation {
    pub entry: CallEntry,
    /// Where the first argument starts: after the selector, or after the
    /// creation bytecode for constructors.
    pub offset: usize,
    pub arguments: Vec<ArgumentAllocation>,
    pub allocation_mode: DecodingMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReturndataKind {
    /// Successful return of a function's outputs.
    Return,
    /// `Error(string)`, `Panic(uint256)` or a custom error.
    Revert,
    /// A constructor returns the deployed bytecode.
    Bytecode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturndataAllocation {
    pub kind: ReturndataKind,
    pub selector: Option<Selector>,
    pub signature: String,
    pub offset: usize,
    pub arguments: Vec<ArgumentAllocation>,
    pub allocation_mode: DecodingMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallAllocations {
    pub input: CalldataAllocation,
    pub output: Option<ReturndataAllocation>,
}

#[derive(Debug, Clone, Default)]
pub struct CalldataAllocations {
    /// Keyed by constructor context hash.
    pub constructor_allocations: HashMap<B256, CallAllocations>,
    /// Keyed by deployed context hash, then selector.
    pub function_allocations: HashMap<B256, HashMap<Selector, CallAllocations>>,
    /// Custom and builtin errors, keyed by deployed context hash.
    pub revert_allocations: HashMap<B256, Vec<ReturndataAllocation>>,
    /// `Error(string)` and `Panic(uint256)`, for when the context is unknown.
    pub builtin_revert_allocations: Vec<ReturndataAllocation>,
}

impl CalldataAllocations {
    pub fn function(&self, context_hash: &B256, selector: &Selector) -> Option<&CallAllocations> {
        self.function_allocations.get(context_hash)?.get(selector)
    }

    pub fn constructor(&self, context_hash: &B256) -> Option<&CallAllocations> {
        self.constructor_allocations.get(context_hash)
    }

    /// Revert layouts for `context_hash`, or the builtins if it is unknown.
    pub fn reverts(&self, context_hash: Option<&B256>) -> &[ReturndataAllocation] {
        context_hash
            .and_then(|hash| self.revert_allocations.get(hash))
            .map(Vec::as_slice)
            .unwrap_or(&self.builtin_revert_allocations)
    }
}

fn unnamed_param(ty: &str) -> Param {
    Param { ty: ty.into(), name: String::new(), components: vec![], internal_type: None }
}

/// `Error(string)` and `Panic(uint256)`.
pub fn builtin_revert_errors() -> Vec<Error> {
    vec![
        Error { name: "Error".into(), inputs: vec![unnamed_param("string")] },
        Error { name: "Panic".into(), inputs: vec![unnamed_param("uint256")] },
    ]
}

/// Layout of a call's arguments.
///
/// Returns `None` for a constructor without a known constructor context:
/// the arguments follow the creation code, whose length is then unknown.
pub fn allocate_call_arguments(
    entry: &CallEntry,
    declared: Option<&DeclaredFunction>,
    types: Option<&TypesById>,
    allocations: &AbiAllocations,
    constructor_context: Option<&DecoderContext>,
) -> Option<CalldataAllocation> {
    let offset = match entry {
        CallEntry::Function(_) => SELECTOR_SIZE,
        CallEntry::Constructor(_) => constructor_context?.binary.len(),
    };
    let (arguments, allocation_mode) = allocate_with_fallback(
        entry.name(),
        declared.map(|d| d.parameters.clone()),
        || abi_parameters_to_members(entry.inputs()),
        |members: &Vec<NameTypePair>| {
            layout_arguments(members, types, allocations, offset, DataLocation::Calldata)
        },
    )?;
    Some(CalldataAllocation { entry: entry.clone(), offset, arguments, allocation_mode })
}

/// Layout of a function's return values, at offset 0 of the return data.
pub fn allocate_return_arguments(
    function: &Function,
    declared: Option<&DeclaredFunction>,
    types: Option<&TypesById>,
    allocations: &AbiAllocations,
) -> Option<ReturndataAllocation> {
    let (arguments, allocation_mode) = allocate_with_fallback(
        &function.name,
        declared.map(|d| d.return_parameters.clone()),
        || abi_parameters_to_members(&function.outputs),
        |members: &Vec<NameTypePair>| {
            layout_arguments(members, types, allocations, 0, DataLocation::Returndata)
        },
    )?;
    Some(ReturndataAllocation {
        kind: ReturndataKind::Return,
        selector: Some(function.selector()),
        signature: function.signature(),
        offset: 0,
        arguments,
        allocation_mode,
    })
}

/// Layout of an error's arguments, after its selector.
pub fn allocate_revert_arguments(
    error: &Error,
    types: Option<&TypesById>,
    allocations: &AbiAllocations,
) -> Option<ReturndataAllocation> {
    let (arguments, allocation_mode) = allocate_with_fallback(
        &error.name,
        None,
        || abi_parameters_to_members(&error.inputs),
        |members: &Vec<NameTypePair>| {
            layout_arguments(members, types, allocations, SELECTOR_SIZE, DataLocation::Returndata)
        },
    )?;
    Some(ReturndataAllocation {
        kind: ReturndataKind::Revert,
        selector: Some(error.selector()),
        signature: error.signature(),
        offset: SELECTOR_SIZE,
        arguments,
        allocation_mode,
    })
}

fn bytecode_allocation() -> ReturndataAllocation {
    ReturndataAllocation {
        kind: ReturndataKind::Bytecode,
        selector: None,
        signature: "constructor".into(),
        offset: 0,
        arguments: vec![],
        allocation_mode: DecodingMode::Full,
    }
}

#[derive(Default)]
struct ContractCalldata {
    constructor: Option<(B256, CallAllocations)>,
    functions: Option<(B256, HashMap<Selector, CallAllocations>)>,
    reverts: Option<(B256, Vec<ReturndataAllocation>)>,
}

fn allocate_contract_calldata(
    contract: &ContractInfo,
    declarations: &HashMap<&str, &ContractDeclaration>,
    types: Option<&TypesById>,
    allocations: &AbiAllocations,
) -> ContractCalldata {
    let declaration = contract.declaration.as_ref();
    let mut out = ContractCalldata::default();

    if let Some(context) = &contract.constructor_context {
        let constructor = contract.abi.constructor.clone().unwrap_or(Constructor {
            inputs: vec![],
            state_mutability: StateMutability::NonPayable,
        });
        let declared = declaration.and_then(|d| d.constructor.as_ref());
        let entry = CallEntry::Constructor(constructor);
        if let Some(input) =
            allocate_call_arguments(&entry, declared, types, allocations, Some(context))
        {
            out.constructor = Some((
                context.context_hash,
                CallAllocations { input, output: Some(bytecode_allocation()) },
            ));
        }
    }

    let Some(deployed) = &contract.deployed_context else {
        debug!(contract = %contract.name, "no deployed context, skipping function allocations");
        return out;
    };

    let mut functions = HashMap::new();
    for function in contract.abi.functions() {
        let selector = function.selector();
        let declared = find_in_bases(declaration, declarations, |d| {
            d.functions.iter().find(|f| f.selector == Some(selector))
        });
        let entry = CallEntry::Function(function.clone());
        let Some(input) = allocate_call_arguments(&entry, declared, types, allocations, None) else {
            continue;
        };
        let output = allocate_return_arguments(function, declared, types, allocations);
        functions.insert(selector, CallAllocations { input, output });
    }
    out.functions = Some((deployed.context_hash, functions));

    let reverts = builtin_revert_errors()
        .iter()
        .chain(contract.abi.errors())
        .filter_map(|error| allocate_revert_arguments(error, types, allocations))
        .collect();
    out.reverts = Some((deployed.context_hash, reverts));
    out
}

/// Allocate calls, returns and reverts for every contract, in parallel.
pub fn build_calldata_allocations(
    contracts: &[ContractInfo],
    types: Option<&TypesById>,
    allocations: &AbiAllocations,
) -> CalldataAllocations {
    let declarations: HashMap<&str, &ContractDeclaration> = contracts
        .iter()
        .filter_map(|c| c.declaration.as_ref())
        .map(|d| (d.id.as_str(), d))
        .collect();

    let per_contract: Vec<ContractCalldata> = contracts
        .par_iter()
        .map(|contract| allocate_contract_calldata(contract, &declarations, types, allocations))
        .collect();

    let mut out = CalldataAllocations {
        builtin_revert_allocations: builtin_revert_errors()
            .iter()
            .filter_map(|error| allocate_revert_arguments(error, types, allocations))
            .collect(),
        ..CalldataAllocations::default()
    };
    for part in per_contract {
        if let Some((hash, constructor)) = part.constructor {
            out.constructor_allocations.entry(hash).or_insert(constructor);
        }
        if let Some((hash, functions)) = part.functions {
            out.function_allocations.entry(hash).or_insert(functions);
        }
        if let Some((hash, reverts)) = part.reverts {
            out.revert_allocations.entry(hash).or_insert(reverts);
        }
    }
    info!(
        contracts = contracts.len(),
        constructors = out.constructor_allocations.len(),
        deployed = out.function_allocations.len(),
        "calldata allocations built"
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainabi_core::{Pointer, Type};

    fn param(name: &str, ty: &str, components: Vec<Param>) -> Param {
        Param { ty: ty.into(), name: name.into(), components, internal_type: None }
    }

    fn function(name: &str, inputs: Vec<Param>, outputs: Vec<Param>) -> Function {
        Function {
            name: name.into(),
            inputs,
            outputs,
            state_mutability: StateMutability::NonPayable,
        }
    }

    #[test]
    fn builtin_selectors() {
        let errors = builtin_revert_errors();
        assert_eq!(errors[0].selector(), Selector::from([0x08, 0xc3, 0x79, 0xa0]));
        assert_eq!(errors[1].selector(), Selector::from([0x4e, 0x48, 0x7b, 0x71]));
    }

    #[test]
    fn function_arguments_start_after_selector() {
        let f = function(
            "f",
            vec![param("a", "uint256", vec![]), param("b", "string", vec![])],
            vec![param("", "bool", vec![])],
        );
        let alloc = allocate_call_arguments(
            &CallEntry::Function(f.clone()),
            None,
            None,
            &AbiAllocations::default(),
            None,
        )
        .unwrap();
        assert_eq!(alloc.offset, 4);
        assert_eq!(alloc.allocation_mode, DecodingMode::Abi);
        assert_eq!(alloc.arguments[0].pointer, Pointer::calldata(4, 32));
        assert_eq!(alloc.arguments[1].pointer, Pointer::calldata(36, 32));
        assert_eq!(alloc.arguments[1].name, "b");

        let ret = allocate_return_arguments(&f, None, None, &AbiAllocations::default()).unwrap();
        assert_eq!(ret.kind, ReturndataKind::Return);
        assert_eq!(ret.arguments[0].pointer, Pointer::returndata(0, 32));
    }

    #[test]
    fn constructor_needs_context() {
        let entry = CallEntry::Constructor(Constructor {
            inputs: vec![param("", "uint8", vec![])],
            state_mutability: StateMutability::NonPayable,
        });
        let none = allocate_call_arguments(&entry, None, None, &AbiAllocations::default(), None);
        assert!(none.is_none());

        let ctx = DecoderContext::new("C", vec![0u8; 10], true);
        let alloc =
            allocate_call_arguments(&entry, None, None, &AbiAllocations::default(), Some(&ctx))
                .unwrap();
        assert_eq!(alloc.offset, 10);
        assert_eq!(alloc.arguments[0].pointer, Pointer::calldata(10, 32));
    }

    #[test]
    fn declared_parameters_win_over_abi() {
        let f = function("g", vec![param("", "uint256", vec![])], vec![]);
        let declared = DeclaredFunction {
            name: "g".into(),
            selector: Some(f.selector()),
            parameters: vec![NameTypePair::new("amount", Type::uint(256))],
            return_parameters: vec![],
        };
        let alloc = allocate_call_arguments(
            &CallEntry::Function(f),
            Some(&declared),
            None,
            &AbiAllocations::default(),
            None,
        )
        .unwrap();
        assert_eq!(alloc.allocation_mode, DecodingMode::Full);
        assert_eq!(alloc.arguments[0].name, "amount");
    }

    #[test]
    fn unallocatable_declaration_falls_back_to_abi() {
        let tuple = param(
            "s",
            "tuple",
            vec![param("x", "uint8", vec![]), param("y", "bool", vec![])],
        );
        let f = function("h", vec![tuple], vec![]);
        let declared = DeclaredFunction {
            name: "h".into(),
            selector: Some(f.selector()),
            parameters: vec![NameTypePair::new("s", Type::struct_ref("missing", "S"))],
            return_parameters: vec![],
        };
        let alloc = allocate_call_arguments(
            &CallEntry::Function(f),
            Some(&declared),
            None,
            &AbiAllocations::default(),
            None,
        )
        .unwrap();
        assert_eq!(alloc.allocation_mode, DecodingMode::Abi);
        assert_eq!(alloc.arguments[0].pointer, Pointer::calldata(4, 64));
    }
}
