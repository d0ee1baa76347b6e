//! EVM sizes every ABI offset/length computation is expressed in.

use alloy_primitives::U256;

/// One ABI word / storage slot / stack item, in bytes.
pub const WORD_SIZE: usize = 32;

/// Function or error selector width at the start of calldata/returndata.
pub const SELECTOR_SIZE: usize = 4;

/// Width of an address in bytes.
pub const ADDRESS_SIZE: usize = 20;

/// Largest length or offset read from input that the decoder will act on.
///
/// Anything above this is reported as an oversize error rather than being
/// truncated, so results do not depend on the platform's pointer width.
pub const MAX_SAFE_LENGTH: u64 = (1 << 53) - 1;

/// Convert a decoded word into a usable position/length.
///
/// Returns `None` for values above [`MAX_SAFE_LENGTH`].
pub fn to_safe_usize(value: U256) -> Option<usize> {
    let narrow = u64::try_from(value).ok()?;
    if narrow > MAX_SAFE_LENGTH {
        return None;
    }
    usize::try_from(narrow).ok()
}

/// Interpret up to the last 32 bytes of `bytes` as a big-endian unsigned word.
pub fn word_to_u256(bytes: &[u8]) -> U256 {
    let tail = &bytes[bytes.len().saturating_sub(WORD_SIZE)..];
    U256::from_be_slice(tail)
}
