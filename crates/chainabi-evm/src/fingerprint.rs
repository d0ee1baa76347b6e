//! Keccak-256 hashing for code identification.
//!
//! A context hash identifies a compiled contract by its bytecode, so a
//! decoder that only sees deployed code (a `contract` value, an external
//! function pointer, an emitting address) can find the matching ABI.

use alloy_primitives::B256;
use tiny_keccak::{Hasher, Keccak};

/// Solidity appends CBOR metadata whose length sits in the final two bytes.
const METADATA_LENGTH_SIZE: usize = 2;

pub fn keccak256(bytes: &[u8]) -> B256 {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(bytes);
    hasher.finalize(&mut output);
    B256::from(output)
}

/// Hash of `binary` with any trailing compiler metadata removed, so two
/// builds differing only in metadata share a context.
pub fn context_hash(binary: &[u8]) -> B256 {
    keccak256(strip_metadata(binary))
}

/// Drop a trailing CBOR metadata section if the length suffix is plausible.
pub fn strip_metadata(binary: &[u8]) -> &[u8] {
    let len = binary.len();
    if len < METADATA_LENGTH_SIZE {
        return binary;
    }
    let declared = (usize::from(binary[len - 2]) << 8) | usize::from(binary[len - 1]);
    let section = declared + METADATA_LENGTH_SIZE;
    if declared == 0 || section > len {
        return binary;
    }
    // CBOR map header
    match binary[len - section] {
        0xa1..=0xa5 => &binary[..len - section],
        _ => binary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn erc20_transfer_topic() {
        let topic = keccak256(b"Transfer(address,address,uint256)");
        assert_eq!(
            hex::encode(topic),
            "ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
    }

    #[test]
    fn metadata_is_ignored_for_context_hash() {
        let code = [0x60u8, 0x80, 0x60, 0x40];
        let mut with_meta = code.to_vec();
        with_meta.extend_from_slice(&[0xa1, 0x00, 0x01, 0x00, 0x03]);
        assert_eq!(strip_metadata(&with_meta), &code);
        assert_eq!(context_hash(&with_meta), context_hash(&code));
    }

    #[test]
    fn implausible_suffix_keeps_code() {
        let code = [0x60u8, 0x80, 0xff, 0xff];
        assert_eq!(strip_metadata(&code), &code);
    }
}
