//! Top-level decoding of calls, events and return data.

use crate::allocate::{
    allocate_abi_types, build_calldata_allocations, build_event_allocations, AbiAllocations,
    ArgumentAllocation, CallEntry, CalldataAllocations, ContractInfo, DecodingMode,
    EventAllocation, EventAllocations, ReturndataAllocation, ReturndataKind,
};
use crate::context::{Contexts, DecoderContext};
use crate::decode::{DecodeFlow, Decoder, DecoderInfo, Interrupt};
use crate::driver::Decoding;
use crate::state::EvmState;
use alloy_json_abi::{Constructor, Event, Function};
use alloy_primitives::{Bytes, Selector, B256};
use chainabi_core::constants::SELECTOR_SIZE;
use chainabi_core::{
    ContractClass, ContractKind, DecodeOptions, DecodeResult, DecoderConfig, NamedResult,
    Pointer, Type, TypesById,
};
use tracing::{debug, info, trace};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalldataDecoding {
    Function {
        class: ContractClass,
        abi: Function,
        arguments: Vec<NamedResult>,
        decoding_mode: DecodingMode,
    },
    Constructor {
        class: ContractClass,
        abi: Constructor,
        arguments: Vec<NamedResult>,
        decoding_mode: DecodingMode,
    },
    /// A known contract, but no function matches: a fallback or receive call.
    Message { class: ContractClass, data: Bytes },
    Unknown { data: Bytes },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDecoding {
    pub abi: Event,
    pub class: Option<ContractClass>,
    pub defined_in: String,
    pub anonymous: bool,
    pub arguments: Vec<NamedResult>,
    pub decoding_mode: DecodingMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturndataDecoding {
    Return { signature: String, arguments: Vec<NamedResult>, decoding_mode: DecodingMode },
    Revert { signature: String, arguments: Vec<NamedResult>, decoding_mode: DecodingMode },
    /// What a constructor returns.
    Bytecode { bytecode: Bytes, class: Option<ContractClass> },
    /// A failed call with no return data.
    Failure,
}

/// Decode each argument from wherever its allocation says it lives.
fn decode_arguments(
    decoder: &Decoder<'_>,
    arguments: &[ArgumentAllocation],
    options: DecodeOptions,
) -> DecodeFlow<Vec<NamedResult>> {
    arguments
        .iter()
        .map(|argument| {
            let value = match argument.pointer {
                Pointer::EventTopic { .. } => {
                    decoder.decode_event_topic(&argument.ty, &argument.pointer, options)?
                }
                _ => decoder.decode_abi(&argument.ty, &argument.pointer, options)?,
            };
            Ok(NamedResult::new(argument.name.clone(), value))
        })
        .collect()
}

/// Decodes calls, events and return data for a fixed set of contracts.
///
/// All layouts are computed up front in [`AbiDecoder::new`]; decoding only
/// reads them.
#[derive(Debug)]
pub struct AbiDecoder {
    contexts: Contexts,
    types: TypesById,
    allocations: AbiAllocations,
    calldata: CalldataAllocations,
    events: EventAllocations,
    config: DecoderConfig,
}

impl AbiDecoder {
    pub fn new(contracts: Vec<ContractInfo>, types: TypesById, config: DecoderConfig) -> Self {
        let allocations = allocate_abi_types(&types);
        let calldata = build_calldata_allocations(&contracts, Some(&types), &allocations);
        let events = build_event_allocations(&contracts, Some(&types), &allocations);
        let contexts: Contexts = contracts.iter().flat_map(ContractInfo::contexts).collect();
        info!(
            contracts = contracts.len(),
            contexts = contexts.len(),
            structs = allocations.len(),
            "abi decoder ready"
        );
        Self { contexts, types, allocations, calldata, events, config }
    }

    pub fn contexts(&self) -> &Contexts {
        &self.contexts
    }

    pub fn allocations(&self) -> &AbiAllocations {
        &self.allocations
    }

    pub fn calldata_allocations(&self) -> &CalldataAllocations {
        &self.calldata
    }

    pub fn event_allocations(&self) -> &EventAllocations {
        &self.events
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    fn info<'a>(
        &'a self,
        state: &'a EvmState,
        current_context: Option<&'a DecoderContext>,
    ) -> DecoderInfo<'a> {
        DecoderInfo {
            state,
            user_defined_types: Some(&self.types),
            allocations: &self.allocations,
            contexts: &self.contexts,
            current_context,
        }
    }

    /// Options for trying one of several candidate layouts: any error
    /// rejects the candidate.
    fn candidate_options(&self) -> DecodeOptions {
        DecodeOptions { strict_abi_mode: true, ..self.config.options() }
    }

    /// Decode `state.calldata` as a call into the context `context_hash`.
    pub fn decode_calldata<'a>(
        &'a self,
        state: &'a EvmState,
        context_hash: B256,
    ) -> Decoding<'a, CalldataDecoding> {
        let context = self.contexts.get(&context_hash);
        let info = self.info(state, context);
        let data = state.calldata.clone();
        let Some(context) = context else {
            debug!(%context_hash, "unknown context");
            return Decoding::new(info, move |_| {
                Ok(CalldataDecoding::Unknown { data: data.clone() })
            });
        };
        let class = context.class();
        let options = self.config.options();

        let allocation = if context.is_constructor {
            self.calldata.constructor(&context_hash)
        } else {
            state
                .calldata
                .get(..SELECTOR_SIZE)
                .map(Selector::from_slice)
                .and_then(|selector| self.calldata.function(&context_hash, &selector))
        };
        let Some(allocation) = allocation.map(|a| &a.input) else {
            if context.is_constructor {
                return Decoding::new(info, move |_| {
                    Ok(CalldataDecoding::Unknown { data: data.clone() })
                });
            }
            return Decoding::new(info, move |_| {
                Ok(CalldataDecoding::Message { class: class.clone(), data: data.clone() })
            });
        };

        Decoding::new(info, move |decoder| {
            let arguments = decode_arguments(
                decoder,
                &allocation.arguments,
                options.with_base(allocation.offset),
            )?;
            let class = class.clone();
            let decoding_mode = allocation.allocation_mode;
            Ok(match &allocation.entry {
                CallEntry::Function(abi) => {
                    CalldataDecoding::Function { class, abi: abi.clone(), arguments, decoding_mode }
                }
                CallEntry::Constructor(abi) => {
                    CalldataDecoding::Constructor {
                        class,
                        abi: abi.clone(),
                        arguments,
                        decoding_mode,
                    }
                }
            })
        })
    }

    fn event_candidates(
        &self,
        state: &EvmState,
        address_context: Option<B256>,
    ) -> Vec<&EventAllocation> {
        let Some(group) = self.events.for_topic_count(state.eventtopics.len()) else {
            return vec![];
        };
        let by_selector = state.eventtopics.first().and_then(|topic| group.by_selector.get(topic));
        let mut candidates = Vec::new();
        for kinds in by_selector.into_iter().chain(std::iter::once(&group.anonymous)) {
            for kind in [ContractKind::Contract, ContractKind::Library, ContractKind::Interface] {
                let Some(by_context) = kinds.get(&kind) else {
                    continue;
                };
                for (hash, allocations) in by_context {
                    // library events can be emitted from any contract
                    let applies = match address_context {
                        None => true,
                        Some(_) if kind == ContractKind::Library => true,
                        Some(context) => *hash == context,
                    };
                    if applies {
                        candidates.extend(allocations);
                    }
                }
            }
        }
        candidates
    }

    /// Decode the log in `state` against every event layout that could
    /// have produced it.
    ///
    /// `address_context` is the context hash of the emitting contract,
    /// when known. Each candidate is decoded strictly; those that fail are
    /// dropped, as are repeats of an event already decoded.
    pub fn decode_event<'a>(
        &'a self,
        state: &'a EvmState,
        address_context: Option<B256>,
    ) -> Decoding<'a, Vec<EventDecoding>> {
        let candidates = self.event_candidates(state, address_context);
        let options = self.candidate_options();
        let current = address_context.and_then(|hash| self.contexts.get(&hash));
        debug!(candidates = candidates.len(), "decoding event");

        Decoding::new(self.info(state, current), move |decoder| {
            let mut decodings: Vec<EventDecoding> = Vec::new();
            for allocation in &candidates {
                if decodings.iter().any(|d| d.abi == allocation.abi) {
                    continue;
                }
                let arguments = match decode_arguments(decoder, &allocation.arguments, options) {
                    Ok(arguments) => arguments,
                    Err(Interrupt::Stop(stop)) => {
                        trace!(event = %allocation.abi.name, error = %stop, "candidate rejected");
                        continue;
                    }
                    Err(suspend) => return Err(suspend),
                };
                let class =
                    decoder.info.contexts.get(&allocation.context_hash).map(DecoderContext::class);
                decodings.push(EventDecoding {
                    abi: allocation.abi.clone(),
                    class,
                    defined_in: allocation.defined_in.clone(),
                    anonymous: allocation.anonymous,
                    arguments,
                    decoding_mode: allocation.allocation_mode,
                });
            }
            Ok(decodings)
        })
    }

    /// Decode `state.returndata` from a call of `selector` into
    /// `context_hash`.
    ///
    /// `status` is the call's success flag, when known; it limits the
    /// candidates to returns or to reverts.
    pub fn decode_return_value<'a>(
        &'a self,
        state: &'a EvmState,
        context_hash: Option<B256>,
        selector: Option<Selector>,
        status: Option<bool>,
    ) -> Decoding<'a, Vec<ReturndataDecoding>> {
        let context = context_hash.and_then(|hash| self.contexts.get(&hash));
        let mut candidates: Vec<&ReturndataAllocation> = Vec::new();

        if status != Some(false) {
            if let (Some(hash), Some(context)) = (context_hash, context) {
                let call = if context.is_constructor {
                    self.calldata.constructor(&hash)
                } else {
                    selector.and_then(|selector| self.calldata.function(&hash, &selector))
                };
                candidates.extend(call.and_then(|call| call.output.as_ref()));
            }
        }
        if status != Some(true) {
            let data_selector = state.returndata.get(..SELECTOR_SIZE).map(Selector::from_slice);
            candidates.extend(
                self.calldata
                    .reverts(context_hash.as_ref())
                    .iter()
                    .filter(|revert| revert.selector.is_some() && revert.selector == data_selector),
            );
        }
        let failure = status == Some(false) && state.returndata.is_empty();
        let options = self.candidate_options();

        Decoding::new(self.info(state, context), move |decoder| {
            let mut decodings = Vec::new();
            if failure {
                decodings.push(ReturndataDecoding::Failure);
            }
            for allocation in &candidates {
                let decoding = match allocation.kind {
                    ReturndataKind::Bytecode => {
                        let bytecode = decoder.info.state.returndata.clone();
                        let class = decoder
                            .info
                            .contexts
                            .find_deployed_by_code(&bytecode)
                            .map(DecoderContext::class);
                        ReturndataDecoding::Bytecode { bytecode, class }
                    }
                    kind => {
                        let arguments = match decode_arguments(
                            decoder,
                            &allocation.arguments,
                            options.with_base(allocation.offset),
                        ) {
                            Ok(arguments) => arguments,
                            Err(Interrupt::Stop(stop)) => {
                                trace!(
                                    signature = %allocation.signature,
                                    error = %stop,
                                    "candidate rejected"
                                );
                                continue;
                            }
                            Err(suspend) => return Err(suspend),
                        };
                        let signature = allocation.signature.clone();
                        let decoding_mode = allocation.allocation_mode;
                        if kind == ReturndataKind::Return {
                            ReturndataDecoding::Return { signature, arguments, decoding_mode }
                        } else {
                            ReturndataDecoding::Revert { signature, arguments, decoding_mode }
                        }
                    }
                };
                decodings.push(decoding);
            }
            Ok(decodings)
        })
    }

    /// Decode a single value of type `ty` at `pointer`.
    pub fn decode_variable<'a>(
        &'a self,
        ty: Type,
        pointer: Pointer,
        state: &'a EvmState,
        current_context: Option<B256>,
    ) -> Decoding<'a, DecodeResult> {
        let context = current_context.and_then(|hash| self.contexts.get(&hash));
        let options = self.config.options();
        Decoding::new(self.info(state, context), move |decoder| match &pointer {
            Pointer::EventTopic { .. } => decoder.decode_event_topic(&ty, &pointer, options),
            Pointer::Definition { .. } => decoder.decode_constant(&ty, &pointer, options),
            Pointer::Special { .. } => decoder.decode_special(&ty, &pointer, options),
            Pointer::Data(_) | Pointer::Stack { .. } => match &ty {
                Type::Magic { .. } => decoder.decode_special(&ty, &pointer, options),
                _ => decoder.decode_abi(&ty, &pointer, options),
            },
            Pointer::Storage { .. } => decoder.decode_value(&ty, &pointer, options),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::U256;

    const ABI: &str = r#"[
        {"type":"function","name":"set","stateMutability":"nonpayable",
         "inputs":[{"name":"x","type":"uint256"}],
         "outputs":[{"name":"","type":"bool"}]}
    ]"#;

    fn decoder() -> (AbiDecoder, B256) {
        let context = DecoderContext::new("Store", vec![0x60, 0x80, 0x60, 0x40], false);
        let hash = context.context_hash;
        let contract = ContractInfo::from_abi_json("Store", ABI)
            .unwrap()
            .with_deployed_context(context);
        (AbiDecoder::new(vec![contract], TypesById::new(), DecoderConfig::default()), hash)
    }

    fn set_function() -> Function {
        Function {
            name: "set".into(),
            inputs: vec![alloy_json_abi::Param {
                ty: "uint256".into(),
                name: "x".into(),
                components: vec![],
                internal_type: None,
            }],
            outputs: vec![],
            state_mutability: alloy_json_abi::StateMutability::NonPayable,
        }
    }

    fn word(value: u64) -> Vec<u8> {
        U256::from(value).to_be_bytes::<32>().to_vec()
    }

    #[test]
    fn function_call_and_fallback() {
        let (decoder, hash) = decoder();
        let mut calldata = set_function().selector().to_vec();
        calldata.extend(word(7));

        let state = EvmState::with_calldata(calldata);
        let decoding = decoder.decode_calldata(&state, hash).run(|_| vec![]).unwrap();
        match decoding {
            CalldataDecoding::Function { abi, arguments, decoding_mode, .. } => {
                assert_eq!(abi.name, "set");
                assert_eq!(arguments[0].name, "x");
                assert_eq!(arguments[0].value.as_uint(), Some(U256::from(7u64)));
                assert_eq!(decoding_mode, DecodingMode::Abi);
            }
            other => panic!("unexpected {other:?}"),
        }

        let state = EvmState::with_calldata(vec![0xde, 0xad, 0xbe, 0xef]);
        let decoding = decoder.decode_calldata(&state, hash).run(|_| vec![]).unwrap();
        assert!(matches!(decoding, CalldataDecoding::Message { .. }));

        let decoding = decoder.decode_calldata(&state, B256::ZERO).run(|_| vec![]).unwrap();
        assert!(matches!(decoding, CalldataDecoding::Unknown { .. }));
    }

    #[test]
    fn return_value_and_builtin_revert() {
        let (decoder, hash) = decoder();
        let selector = set_function().selector();

        let state = EvmState::with_returndata(word(1));
        let decodings = decoder
            .decode_return_value(&state, Some(hash), Some(selector), Some(true))
            .run(|_| vec![])
            .unwrap();
        match decodings.as_slice() {
            [ReturndataDecoding::Return { signature, arguments, .. }] => {
                assert_eq!(signature, "set(uint256)");
                assert_eq!(arguments.len(), 1);
            }
            other => panic!("unexpected {other:?}"),
        }

        let mut panic_data = vec![0x4e, 0x48, 0x7b, 0x71];
        panic_data.extend(word(0x11));
        let state = EvmState::with_returndata(panic_data);
        let decodings = decoder
            .decode_return_value(&state, Some(hash), Some(selector), Some(false))
            .run(|_| vec![])
            .unwrap();
        match decodings.as_slice() {
            [ReturndataDecoding::Revert { signature, arguments, .. }] => {
                assert_eq!(signature, "Panic(uint256)");
                assert_eq!(arguments[0].value.as_uint(), Some(U256::from(0x11u64)));
            }
            other => panic!("unexpected {other:?}"),
        }

        let state = EvmState::default();
        let decodings = decoder
            .decode_return_value(&state, Some(hash), Some(selector), Some(false))
            .run(|_| vec![])
            .unwrap();
        assert_eq!(decodings, vec![ReturndataDecoding::Failure]);
    }

    #[test]
    fn variable_at_constant_pointer() {
        let (decoder, _) = decoder();
        let state = EvmState::default();
        let pointer = Pointer::Definition { word: B256::with_last_byte(3) };
        let result = decoder
            .decode_variable(Type::uint(8), pointer, &state, None)
            .run(|_| vec![])
            .unwrap();
        assert_eq!(result.as_uint(), Some(U256::from(3u64)));
    }
}
