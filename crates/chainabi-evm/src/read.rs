//! The byte source: resolve a [`Pointer`] to raw bytes.

use crate::decode::{DecodeFlow, Decoder, Interrupt};
use chainabi_core::constants::WORD_SIZE;
use chainabi_core::{DataLocation, DecoderRequest, DecodingError, Pointer};
use tracing::trace;

impl Decoder<'_> {
    /// Read the bytes `pointer` designates.
    ///
    /// The outer `Result` is control flow (a storage word must be fetched);
    /// the inner one is an ordinary read failure. Out-of-range reads are
    /// errors, never zero-filled.
    pub fn read(&self, pointer: &Pointer) -> DecodeFlow<Result<Vec<u8>, DecodingError>> {
        let state = self.info.state;
        let bytes = match pointer {
            Pointer::Data(data) => {
                let source = state.data(data.location);
                let range_error = || DecodingError::ReadBytes {
                    location: data.location,
                    start: data.start,
                    length: data.length,
                };
                match data.start.checked_add(data.length) {
                    Some(end) if end <= source.len() => Ok(source[data.start..end].to_vec()),
                    _ => Err(range_error()),
                }
            }
            Pointer::EventTopic { topic } => state
                .eventtopics
                .get(*topic)
                .map(|t| t.to_vec())
                .ok_or(DecodingError::ReadTopic { topic: *topic }),
            Pointer::Stack { from, to } => {
                if from > to || *to >= state.stack.len() {
                    Err(DecodingError::ReadStack { from: *from, to: *to })
                } else {
                    Ok(state.stack[*from..=*to].iter().flat_map(|w| w.to_vec()).collect())
                }
            }
            Pointer::Storage { slot, offset, length } => {
                let resident = state.storage.get(slot).or_else(|| self.responses.storage.get(slot));
                let word = match resident {
                    Some(word) => *word,
                    None => {
                        trace!(slot = %slot, "storage word not resident, suspending");
                        return Err(Interrupt::Suspend(DecoderRequest::Storage { slot: *slot }));
                    }
                };
                match offset.checked_add(*length) {
                    Some(end) if end <= WORD_SIZE => Ok(word[*offset..end].to_vec()),
                    _ => Err(DecodingError::ReadStorage {
                        slot: *slot,
                        offset: *offset,
                        length: *length,
                    }),
                }
            }
            Pointer::Definition { word } => Ok(word.to_vec()),
            Pointer::Special { special } => state
                .specials
                .get(special)
                .map(|w| w.to_vec())
                .ok_or(DecodingError::ReadSpecial { special: *special }),
        };
        Ok(bytes)
    }

    /// Length of the buffer a data pointer reads from; stack pointers refer
    /// to calldata for their dynamic data.
    pub(crate) fn data_length(&self, location: DataLocation) -> usize {
        self.info.state.data(location).len()
    }
}

#[cfg(test)]
mod tests {
    use crate::allocate::AbiAllocations;
    use crate::context::Contexts;
    use crate::decode::{Decoder, DecoderInfo, Interrupt, Responses};
    use crate::state::EvmState;
    use alloy_primitives::{B256, U256};
    use chainabi_core::{DecoderRequest, DecodingError, Pointer};

    fn with_decoder<R>(
        state: &EvmState,
        responses: &Responses,
        f: impl FnOnce(&Decoder<'_>) -> R,
    ) -> R {
        let allocations = AbiAllocations::default();
        let contexts = Contexts::new();
        let info = DecoderInfo {
            state,
            user_defined_types: None,
            allocations: &allocations,
            contexts: &contexts,
            current_context: None,
        };
        f(&Decoder::new(info, responses))
    }

    #[test]
    fn out_of_range_data_is_an_error() {
        let state = EvmState::with_calldata(vec![1u8, 2, 3]);
        let responses = Responses::default();
        with_decoder(&state, &responses, |d| {
            assert_eq!(d.read(&Pointer::calldata(1, 2)).unwrap().unwrap(), vec![2, 3]);
            let err = d.read(&Pointer::calldata(2, 2)).unwrap().unwrap_err();
            assert!(matches!(err, DecodingError::ReadBytes { start: 2, length: 2, .. }));
            let err = d.read(&Pointer::calldata(usize::MAX, 2)).unwrap().unwrap_err();
            assert!(matches!(err, DecodingError::ReadBytes { .. }));
        });
    }

    #[test]
    fn storage_suspends_until_answered() {
        let state = EvmState::default();
        let slot = U256::from(3u64);
        let pointer = Pointer::Storage { slot, offset: 30, length: 2 };

        let empty = Responses::default();
        with_decoder(&state, &empty, |d| {
            assert_eq!(
                d.read(&pointer).unwrap_err(),
                Interrupt::Suspend(DecoderRequest::Storage { slot })
            );
        });

        let mut answered = Responses::default();
        answered.storage.insert(slot, B256::with_last_byte(0x2a));
        with_decoder(&state, &answered, |d| {
            assert_eq!(d.read(&pointer).unwrap().unwrap(), vec![0, 0x2a]);
            let bad = Pointer::Storage { slot, offset: 31, length: 2 };
            assert!(matches!(d.read(&bad).unwrap(), Err(DecodingError::ReadStorage { .. })));
        });
    }

    #[test]
    fn stack_and_topics() {
        let mut state = EvmState::default();
        state.stack = vec![B256::with_last_byte(1), B256::with_last_byte(2)];
        state.eventtopics = vec![B256::ZERO];
        let responses = Responses::default();
        with_decoder(&state, &responses, |d| {
            assert_eq!(d.read(&Pointer::Stack { from: 0, to: 1 }).unwrap().unwrap().len(), 64);
            assert!(d.read(&Pointer::Stack { from: 1, to: 2 }).unwrap().is_err());
            assert!(matches!(
                d.read(&Pointer::topic(1)).unwrap(),
                Err(DecodingError::ReadTopic { topic: 1 })
            ));
        });
    }
}
