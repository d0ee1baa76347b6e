//! Decoder configuration.
//!
//! [`DecoderConfig`] is the long-lived, file-loadable policy.
//! [`DecodeOptions`] is the small per-call struct threaded through every
//! recursive decode step.

use crate::error::ConfigError;
use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Decode policy shared by all decodes made through one decoder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Abort the whole decode on the first recoverable error.
    #[serde(default)]
    pub strict_abi_mode: bool,
    /// Missing struct allocations raise a retryable stop instead of an error value.
    #[serde(default)]
    pub allow_retry: bool,
    /// Skip padding checks on elementary values.
    #[serde(default)]
    pub permissive_padding: bool,
}

impl DecoderConfig {
    pub fn strict() -> Self {
        Self { strict_abi_mode: true, ..Self::default() }
    }

    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(s)?)
    }

    /// Load from a `.json`, `.yaml` or `.yml` file; the extension picks the format.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&raw),
            _ => Self::from_yaml_str(&raw),
        }
    }

    pub fn options(&self) -> DecodeOptions {
        DecodeOptions {
            strict_abi_mode: self.strict_abi_mode,
            allow_retry: self.allow_retry,
            permissive_padding: self.permissive_padding,
            ..DecodeOptions::default()
        }
    }
}

impl From<&DecoderConfig> for DecodeOptions {
    fn from(config: &DecoderConfig) -> Self {
        config.options()
    }
}

/// Per-call decode options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    pub strict_abi_mode: bool,
    pub allow_retry: bool,
    pub permissive_padding: bool,
    /// Base that relative dynamic-data offsets are resolved against.
    /// `None` means 0.
    pub abi_pointer_base: Option<usize>,
    /// Used instead of reading a length word (event data, bytes from code).
    pub length_override: Option<U256>,
}

impl DecodeOptions {
    pub fn strict() -> Self {
        Self { strict_abi_mode: true, ..Self::default() }
    }

    pub fn with_base(self, base: usize) -> Self {
        Self { abi_pointer_base: Some(base), ..self }
    }

    pub fn with_length(self, length: U256) -> Self {
        Self { length_override: Some(length), ..self }
    }

    /// Options for a child decode: the same policy, without the
    /// call-site-specific base and length.
    pub fn inherited(self) -> Self {
        Self { abi_pointer_base: None, length_override: None, ..self }
    }
}
