//! Bytes already resident when a decode starts.

use alloy_primitives::{Bytes, B256, U256};
use chainabi_core::{DataLocation, SpecialVariable};
use std::collections::HashMap;

/// Everything the byte source can answer without suspending.
///
/// Storage words and specials not present here either suspend (storage)
/// or become read errors (specials).
#[derive(Debug, Clone, Default)]
pub struct EvmState {
    pub calldata: Bytes,
    pub returndata: Bytes,
    pub eventdata: Bytes,
    pub eventtopics: Vec<B256>,
    pub code: Bytes,
    /// A standalone ABI-encoded buffer.
    pub abi: Bytes,
    /// Stack words, bottom first.
    pub stack: Vec<B256>,
    pub storage: HashMap<U256, B256>,
    pub specials: HashMap<SpecialVariable, B256>,
}

impl EvmState {
    pub fn with_calldata(calldata: impl Into<Bytes>) -> Self {
        Self { calldata: calldata.into(), ..Self::default() }
    }

    pub fn with_returndata(returndata: impl Into<Bytes>) -> Self {
        Self { returndata: returndata.into(), ..Self::default() }
    }

    pub fn with_event(topics: Vec<B256>, data: impl Into<Bytes>) -> Self {
        Self { eventtopics: topics, eventdata: data.into(), ..Self::default() }
    }

    pub fn with_abi(abi: impl Into<Bytes>) -> Self {
        Self { abi: abi.into(), ..Self::default() }
    }

    pub fn data(&self, location: DataLocation) -> &[u8] {
        match location {
            DataLocation::Abi => &self.abi,
            DataLocation::Calldata => &self.calldata,
            DataLocation::Returndata => &self.returndata,
            DataLocation::Eventdata => &self.eventdata,
            DataLocation::Code => &self.code,
        }
    }

    /// Set a special variable from a word-sized value.
    pub fn set_special(&mut self, special: SpecialVariable, value: U256) {
        self.specials.insert(special, B256::from(value.to_be_bytes::<32>()));
    }
}
