//! Event argument layouts.
//!
//! Indexed parameters live in topics and get topic positions directly;
//! only the non-indexed ones are laid out in the log data. The two are
//! then woven back into declaration order.

use super::{
    allocate_with_fallback, find_in_bases, layout_arguments, AbiAllocations, ArgumentAllocation,
    ContractDeclaration, ContractInfo, DeclaredEvent, DecodingMode,
};
use crate::import::abi_event_parameter_to_type;
use alloy_json_abi::Event;
use alloy_primitives::B256;
use chainabi_core::{AllocationError, ContractKind, DataLocation, NameTypePair, Pointer, TypesById};
use indexmap::IndexMap;
use rayon::prelude::*;
use std::collections::HashMap;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventAllocation {
    pub abi: Event,
    pub selector: B256,
    pub anonymous: bool,
    pub context_hash: B256,
    /// Name of the contract whose ABI declares the event.
    pub defined_in: String,
    pub contract_kind: ContractKind,
    /// In declaration order.
    pub arguments: Vec<ArgumentAllocation>,
    pub allocation_mode: DecodingMode,
}

impl EventAllocation {
    pub fn topic_count(&self) -> usize {
        let indexed = self
            .arguments
            .iter()
            .filter(|a| matches!(a.pointer, Pointer::EventTopic { .. }))
            .count();
        indexed + usize::from(!self.anonymous)
    }
}

/// Allocations grouped by contract kind, then by context hash.
pub type KindAllocations = HashMap<ContractKind, IndexMap<B256, Vec<EventAllocation>>>;

/// Allocations sharing one topic count.
#[derive(Debug, Clone, Default)]
pub struct TopicAllocations {
    pub by_selector: HashMap<B256, KindAllocations>,
    pub anonymous: KindAllocations,
}

#[derive(Debug, Clone, Default)]
pub struct EventAllocations {
    pub by_topic_count: HashMap<usize, TopicAllocations>,
}

impl EventAllocations {
    pub fn for_topic_count(&self, count: usize) -> Option<&TopicAllocations> {
        self.by_topic_count.get(&count)
    }

    fn insert(&mut self, allocation: EventAllocation) {
        let group = self.by_topic_count.entry(allocation.topic_count()).or_default();
        let by_kind = if allocation.anonymous {
            &mut group.anonymous
        } else {
            group.by_selector.entry(allocation.selector).or_default()
        };
        by_kind
            .entry(allocation.contract_kind)
            .or_default()
            .entry(allocation.context_hash)
            .or_default()
            .push(allocation);
    }

    pub fn len(&self) -> usize {
        let count = |kinds: &KindAllocations| -> usize {
            kinds.values().flat_map(|by_ctx| by_ctx.values()).map(Vec::len).sum()
        };
        self.by_topic_count
            .values()
            .map(|t| t.by_selector.values().map(count).sum::<usize>() + count(&t.anonymous))
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One event parameter with its indexed flag, whatever its source.
struct EventParameter {
    member: NameTypePair,
    indexed: bool,
}

fn declared_parameters(event: &DeclaredEvent) -> Vec<EventParameter> {
    event
        .parameters
        .iter()
        .map(|p| EventParameter {
            member: NameTypePair::new(p.name.clone(), p.ty.clone()),
            indexed: p.indexed,
        })
        .collect()
}

fn abi_parameters(event: &Event) -> Result<Vec<EventParameter>, AllocationError> {
    event
        .inputs
        .iter()
        .map(|p| {
            Ok(EventParameter {
                member: NameTypePair::new(p.name.clone(), abi_event_parameter_to_type(p)?),
                indexed: p.indexed,
            })
        })
        .collect()
}

fn weave(
    parameters: &[EventParameter],
    anonymous: bool,
    types: Option<&TypesById>,
    allocations: &AbiAllocations,
) -> Result<Option<Vec<ArgumentAllocation>>, AllocationError> {
    let non_indexed: Vec<NameTypePair> =
        parameters.iter().filter(|p| !p.indexed).map(|p| p.member.clone()).collect();
    let Some(data_arguments) =
        layout_arguments(&non_indexed, types, allocations, 0, DataLocation::Eventdata)?
    else {
        return Ok(None);
    };

    let mut data_arguments = data_arguments.into_iter();
    let mut topic = usize::from(!anonymous);
    let mut arguments = Vec::with_capacity(parameters.len());
    for parameter in parameters {
        if parameter.indexed {
            arguments.push(ArgumentAllocation {
                name: parameter.member.name.clone(),
                ty: parameter.member.ty.clone(),
                pointer: Pointer::topic(topic),
            });
            topic += 1;
        } else if let Some(argument) = data_arguments.next() {
            arguments.push(argument);
        }
    }
    Ok(Some(arguments))
}

/// Layout of one event's arguments in topics and data.
pub fn allocate_event_arguments(
    event: &Event,
    declared: Option<&DeclaredEvent>,
    context_hash: B256,
    defined_in: &str,
    contract_kind: ContractKind,
    types: Option<&TypesById>,
    allocations: &AbiAllocations,
) -> Option<EventAllocation> {
    let (arguments, allocation_mode) = allocate_with_fallback(
        &event.name,
        declared.map(declared_parameters),
        || abi_parameters(event),
        |parameters: &Vec<EventParameter>| weave(parameters, event.anonymous, types, allocations),
    )?;
    Some(EventAllocation {
        abi: event.clone(),
        selector: event.selector(),
        anonymous: event.anonymous,
        context_hash,
        defined_in: defined_in.to_owned(),
        contract_kind,
        arguments,
        allocation_mode,
    })
}

fn allocate_contract_events(
    contract: &ContractInfo,
    declarations: &HashMap<&str, &ContractDeclaration>,
    types: Option<&TypesById>,
    allocations: &AbiAllocations,
) -> Vec<EventAllocation> {
    let Some(context) = &contract.deployed_context else {
        return vec![];
    };
    let kind = contract.kind();
    contract
        .abi
        .events()
        .filter_map(|event| {
            let selector = event.selector();
            let declared = find_in_bases(contract.declaration.as_ref(), declarations, |d| {
                d.events.iter().find(|e| e.selector == selector)
            });
            allocate_event_arguments(
                event,
                declared,
                context.context_hash,
                &contract.name,
                kind,
                types,
                allocations,
            )
        })
        .collect()
}

/// Allocate every contract's events, in parallel, keyed by topic count,
/// selector (or anonymous), contract kind and context hash.
pub fn build_event_allocations(
    contracts: &[ContractInfo],
    types: Option<&TypesById>,
    allocations: &AbiAllocations,
) -> EventAllocations {
    let declarations: HashMap<&str, &ContractDeclaration> = contracts
        .iter()
        .filter_map(|c| c.declaration.as_ref())
        .map(|d| (d.id.as_str(), d))
        .collect();

    let per_contract: Vec<Vec<EventAllocation>> = contracts
        .par_iter()
        .map(|contract| allocate_contract_events(contract, &declarations, types, allocations))
        .collect();

    let mut out = EventAllocations::default();
    for allocation in per_contract.into_iter().flatten() {
        out.insert(allocation);
    }
    info!(events = out.len(), "event allocations built");
    out
}
