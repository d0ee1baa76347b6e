//! Requests the decoder issues when it needs bytes it does not have.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What the caller must fetch before decoding can continue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DecoderRequest {
    /// Deployed code at `address`.
    Code { address: Address },
    /// The 32-byte word in storage slot `slot` of the current contract.
    Storage { slot: U256 },
}

impl fmt::Display for DecoderRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecoderRequest::Code { address } => write!(f, "code({address})"),
            DecoderRequest::Storage { slot } => write!(f, "storage({slot})"),
        }
    }
}
