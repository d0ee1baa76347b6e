//! ABI word layouts for structs, and size/dynamicness of any type.
//!
//! [`AbiAllocations`] is an append-only arena keyed by struct id. An entry
//! of `None` records that the struct cannot be ABI encoded (it contains a
//! mapping or internal function), so that failure is memoized too.

use alloy_primitives::U256;
use chainabi_core::constants::{to_safe_usize, WORD_SIZE};
use chainabi_core::{
    AllocationError, ArrayKind, BytesKind, FunctionVisibility, NameTypePair, Type, TypesById,
    UserDefinedType,
};
use std::collections::HashMap;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbiSizeInfo {
    /// Bytes occupied in the head; one word for dynamic types.
    pub size: usize,
    pub dynamic: bool,
}

impl AbiSizeInfo {
    const fn word(dynamic: bool) -> Self {
        Self { size: WORD_SIZE, dynamic }
    }
}

/// Offset and length of a member, relative to the start of its container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemberPointer {
    pub start: usize,
    pub length: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbiMemberAllocation {
    pub name: String,
    pub ty: Type,
    pub pointer: MemberPointer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbiAllocation {
    pub members: Vec<AbiMemberAllocation>,
    /// Encoded head size: one word if dynamic, else the sum of member sizes.
    pub length: usize,
    pub dynamic: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AbiAllocations {
    entries: HashMap<String, Option<AbiAllocation>>,
}

impl AbiAllocations {
    /// `None`: never allocated. `Some(None)`: cannot appear in ABI data.
    pub fn lookup(&self, id: &str) -> Option<Option<&AbiAllocation>> {
        self.entries.get(id).map(Option::as_ref)
    }

    pub fn get(&self, id: &str) -> Option<&AbiAllocation> {
        self.lookup(id).flatten()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Existing entries are never overwritten.
    fn insert(&mut self, id: String, allocation: Option<AbiAllocation>) {
        self.entries.entry(id).or_insert(allocation);
    }

    fn absorb(&mut self, other: AbiAllocations) {
        for (id, allocation) in other.entries {
            self.insert(id, allocation);
        }
    }
}

/// A read-through view over existing allocations plus the ones made
/// during the current unit of work.
#[derive(Debug)]
pub struct AllocationScope<'a> {
    types: Option<&'a TypesById>,
    base: &'a AbiAllocations,
    fresh: AbiAllocations,
    in_progress: Vec<String>,
}

impl<'a> AllocationScope<'a> {
    pub fn new(types: Option<&'a TypesById>, base: &'a AbiAllocations) -> Self {
        Self { types, base, fresh: AbiAllocations::default(), in_progress: Vec::new() }
    }

    pub fn lookup(&self, id: &str) -> Option<Option<&AbiAllocation>> {
        self.fresh.lookup(id).or_else(|| self.base.lookup(id))
    }

    pub fn into_fresh(self) -> AbiAllocations {
        self.fresh
    }

    fn record(&mut self, id: &str, allocation: Option<AbiAllocation>) {
        self.fresh.insert(id.to_owned(), allocation);
    }
}

/// Allocate every struct in `types`.
///
/// A struct whose allocation fails gets no entry; the others still succeed.
pub fn allocate_abi_types(types: &TypesById) -> AbiAllocations {
    let mut ids: Vec<&String> = types
        .iter()
        .filter(|(_, t)| matches!(t, UserDefinedType::Struct { .. }))
        .map(|(id, _)| id)
        .collect();
    ids.sort();

    let mut allocations = AbiAllocations::default();
    for id in ids {
        if allocations.contains(id) {
            continue;
        }
        let outcome = {
            let mut scope = AllocationScope::new(Some(types), &allocations);
            allocate_struct(id, &mut scope).map(|()| scope.into_fresh())
        };
        match outcome {
            Ok(fresh) => allocations.absorb(fresh),
            Err(err) => warn!(struct_id = %id, error = %err, "struct allocation failed"),
        }
    }
    debug!(structs = allocations.len(), "ABI struct allocation complete");
    allocations
}

fn allocate_struct(id: &str, scope: &mut AllocationScope<'_>) -> Result<(), AllocationError> {
    if scope.lookup(id).is_some() {
        return Ok(());
    }
    let unknown = || AllocationError::UnknownUserDefinedType {
        id: id.to_owned(),
        type_string: format!("struct {id}"),
    };
    let members = match scope.types.and_then(|types| types.get(id)) {
        Some(UserDefinedType::Struct { members, .. }) => members.clone(),
        _ => return Err(unknown()),
    };
    if scope.in_progress.iter().any(|p| p == id) {
        return Err(AllocationError::CircularType { id: id.to_owned() });
    }
    scope.in_progress.push(id.to_owned());
    let result = allocate_members(id, &members, scope, 0);
    scope.in_progress.pop();
    result
}

/// Allocate `members` under `parent_id`, memoized.
pub fn allocate_members(
    parent_id: &str,
    members: &[NameTypePair],
    scope: &mut AllocationScope<'_>,
    start: usize,
) -> Result<(), AllocationError> {
    if scope.lookup(parent_id).is_some() {
        return Ok(());
    }
    let allocation = layout_members(members, scope, start)?;
    scope.record(parent_id, allocation);
    Ok(())
}

/// Lay out `members` contiguously from `start`.
///
/// Returns `None` as soon as a member has no ABI representation; no
/// partial layout is produced.
pub(crate) fn layout_members(
    members: &[NameTypePair],
    scope: &mut AllocationScope<'_>,
    start: usize,
) -> Result<Option<AbiAllocation>, AllocationError> {
    let mut dynamic = false;
    let mut position = start;
    let mut allocated = Vec::with_capacity(members.len());

    for member in members {
        let Some(info) = size_and_allocate(&member.ty, scope)? else {
            return Ok(None);
        };
        dynamic |= info.dynamic;
        allocated.push(AbiMemberAllocation {
            name: member.name.clone(),
            ty: member.ty.clone(),
            pointer: MemberPointer { start: position, length: info.size },
        });
        position = position
            .checked_add(info.size)
            .ok_or(AllocationError::OverlargeStaticLength { length: U256::from(info.size) })?;
    }

    let length = if dynamic { WORD_SIZE } else { position - start };
    Ok(Some(AbiAllocation { members: allocated, length, dynamic }))
}

/// Size and dynamicness of `ty`, allocating structs it reaches on the way.
/// `None` means the type cannot appear in ABI-encoded data.
pub(crate) fn size_and_allocate(
    ty: &Type,
    scope: &mut AllocationScope<'_>,
) -> Result<Option<AbiSizeInfo>, AllocationError> {
    let info = match ty {
        Type::Bool
        | Type::Address { .. }
        | Type::Contract { .. }
        | Type::Uint { .. }
        | Type::Int { .. }
        | Type::Fixed { .. }
        | Type::Ufixed { .. }
        | Type::Enum { .. } => AbiSizeInfo::word(false),
        Type::String => AbiSizeInfo::word(true),
        Type::Bytes { kind } => AbiSizeInfo::word(matches!(kind, BytesKind::Dynamic)),
        Type::Mapping { .. } | Type::Magic { .. } => return Ok(None),
        Type::Function { visibility: FunctionVisibility::External } => AbiSizeInfo::word(false),
        Type::Function { visibility: FunctionVisibility::Internal } => return Ok(None),
        Type::Array { kind: ArrayKind::Dynamic, .. } => AbiSizeInfo::word(true),
        Type::Array { base, kind: ArrayKind::Static { length } } => {
            if length.is_zero() {
                return Ok(Some(AbiSizeInfo { size: 0, dynamic: false }));
            }
            let Some(base_info) = size_and_allocate(base, scope)? else {
                return Ok(None);
            };
            if base_info.dynamic {
                AbiSizeInfo::word(true)
            } else {
                let overlarge = || AllocationError::OverlargeStaticLength { length: *length };
                let count = to_safe_usize(*length).ok_or_else(overlarge)?;
                let size = count.checked_mul(base_info.size).ok_or_else(overlarge)?;
                AbiSizeInfo { size, dynamic: false }
            }
        }
        Type::Struct { id, .. } => {
            if scope.lookup(id).is_none() {
                allocate_struct(id, scope)?;
            }
            match scope.lookup(id) {
                Some(Some(allocation)) => {
                    AbiSizeInfo { size: allocation.length, dynamic: allocation.dynamic }
                }
                Some(None) => return Ok(None),
                None => {
                    return Err(AllocationError::UnknownUserDefinedType {
                        id: id.clone(),
                        type_string: ty.to_string(),
                    })
                }
            }
        }
        Type::Tuple { members } => {
            // every member is sized, even after one turns out illegal
            let mut size = 0usize;
            let mut dynamic = false;
            let mut representable = true;
            for member in members {
                match size_and_allocate(&member.ty, scope)? {
                    Some(info) => {
                        size = size.saturating_add(info.size);
                        dynamic |= info.dynamic;
                    }
                    None => representable = false,
                }
            }
            if !representable {
                return Ok(None);
            }
            if dynamic {
                AbiSizeInfo::word(true)
            } else {
                AbiSizeInfo { size, dynamic: false }
            }
        }
    };
    Ok(Some(info))
}

/// Size and dynamicness of `ty` against completed allocations only.
///
/// A struct that was never allocated is an
/// [`AllocationError::UnknownUserDefinedType`].
pub fn abi_size_info(
    ty: &Type,
    allocations: &AbiAllocations,
) -> Result<Option<AbiSizeInfo>, AllocationError> {
    let mut scope = AllocationScope::new(None, allocations);
    size_and_allocate(ty, &mut scope)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn struct_type(id: &str, members: Vec<NameTypePair>) -> (String, UserDefinedType) {
        (
            id.to_owned(),
            UserDefinedType::Struct {
                id: id.to_owned(),
                name: format!("S{id}"),
                defining_contract: None,
                members,
            },
        )
    }

    fn mapping() -> Type {
        Type::Mapping { key: Box::new(Type::uint(256)), value: Box::new(Type::Bool) }
    }

    #[test]
    fn static_struct_sums_member_sizes() {
        let types: TypesById = [struct_type(
            "1",
            vec![
                NameTypePair::new("a", Type::uint(8)),
                NameTypePair::new("b", Type::static_array(Type::address(), 3)),
            ],
        )]
        .into_iter()
        .collect();
        let allocations = allocate_abi_types(&types);
        let s = allocations.get("1").unwrap();
        assert!(!s.dynamic);
        assert_eq!(s.length, 4 * WORD_SIZE);
        assert_eq!(s.members[1].pointer, MemberPointer { start: 32, length: 96 });
    }

    #[test]
    fn dynamic_member_makes_struct_one_word() {
        let types: TypesById = [struct_type(
            "1",
            vec![NameTypePair::new("a", Type::uint(8)), NameTypePair::new("s", Type::String)],
        )]
        .into_iter()
        .collect();
        let allocations = allocate_abi_types(&types);
        let s = allocations.get("1").unwrap();
        assert!(s.dynamic);
        assert_eq!(s.length, WORD_SIZE);
        assert_eq!(s.members[1].pointer.start, WORD_SIZE);
    }

    #[test]
    fn nested_struct_allocated_once() {
        let types: TypesById = [
            struct_type("inner", vec![NameTypePair::new("x", Type::uint(256))]),
            struct_type(
                "outer",
                vec![
                    NameTypePair::new("p", Type::struct_ref("inner", "Inner")),
                    NameTypePair::new("q", Type::struct_ref("inner", "Inner")),
                ],
            ),
        ]
        .into_iter()
        .collect();
        let allocations = allocate_abi_types(&types);
        assert_eq!(allocations.len(), 2);
        assert_eq!(allocations.get("outer").unwrap().length, 2 * WORD_SIZE);
    }

    #[test]
    fn mapping_member_marks_struct_unrepresentable() {
        let types: TypesById = [
            struct_type("bad", vec![NameTypePair::new("m", mapping())]),
            struct_type("holder", vec![NameTypePair::new("b", Type::struct_ref("bad", "Bad"))]),
        ]
        .into_iter()
        .collect();
        let allocations = allocate_abi_types(&types);
        assert_eq!(allocations.lookup("bad"), Some(None));
        assert_eq!(allocations.lookup("holder"), Some(None));
    }

    #[test]
    fn unknown_member_struct_is_skipped() {
        let types: TypesById = [
            struct_type("broken", vec![NameTypePair::new("x", Type::struct_ref("404", "Gone"))]),
            struct_type("fine", vec![NameTypePair::new("x", Type::Bool)]),
        ]
        .into_iter()
        .collect();
        let allocations = allocate_abi_types(&types);
        assert_eq!(allocations.lookup("broken"), None);
        assert!(allocations.get("fine").is_some());
    }

    #[test]
    fn circular_struct_does_not_recurse_forever() {
        let types: TypesById = [struct_type(
            "loop",
            vec![NameTypePair::new("me", Type::static_array(Type::struct_ref("loop", "Loop"), 1))],
        )]
        .into_iter()
        .collect();
        let allocations = allocate_abi_types(&types);
        assert_eq!(allocations.lookup("loop"), None);
    }

    #[test]
    fn zero_length_arrays_are_static_and_empty() {
        let empty = AbiAllocations::default();
        for base in [Type::String, Type::uint(8), Type::dynamic_array(Type::Bool), mapping()] {
            let info = abi_size_info(&Type::static_array(base, 0), &empty).unwrap().unwrap();
            assert_eq!(info, AbiSizeInfo { size: 0, dynamic: false });
        }
    }

    #[test]
    fn tuples_or_dynamicness_and_sum_sizes() {
        let empty = AbiAllocations::default();
        let static_tuple = Type::tuple(vec![
            NameTypePair::unnamed(Type::uint(8)),
            NameTypePair::unnamed(Type::bytes_static(4)),
        ]);
        assert_eq!(
            abi_size_info(&static_tuple, &empty).unwrap(),
            Some(AbiSizeInfo { size: 64, dynamic: false })
        );
        let dynamic_tuple =
            Type::tuple(vec![NameTypePair::unnamed(Type::uint(8)), NameTypePair::unnamed(Type::String)]);
        assert_eq!(
            abi_size_info(&dynamic_tuple, &empty).unwrap(),
            Some(AbiSizeInfo { size: 32, dynamic: true })
        );
        let illegal = Type::tuple(vec![NameTypePair::unnamed(mapping())]);
        assert_eq!(abi_size_info(&illegal, &empty).unwrap(), None);
    }

    #[test]
    fn unallocated_struct_is_unknown_when_read_only() {
        let err = abi_size_info(&Type::struct_ref("9", "Nine"), &AbiAllocations::default())
            .unwrap_err();
        assert!(matches!(err, AllocationError::UnknownUserDefinedType { .. }));
    }

    #[test]
    fn huge_static_length_is_an_error() {
        let ty = Type::Array {
            base: Box::new(Type::uint(256)),
            kind: ArrayKind::Static { length: U256::MAX },
        };
        let err = abi_size_info(&ty, &AbiAllocations::default()).unwrap_err();
        assert!(matches!(err, AllocationError::OverlargeStaticLength { .. }));
    }
}
