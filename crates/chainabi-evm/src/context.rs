//! Known contract contexts and compiler-version families.

use crate::error::LoadError;
use crate::fingerprint;
use alloy_json_abi::{JsonAbi, StateMutability};
use alloy_primitives::{Bytes, B256};
use chainabi_core::{ContractClass, ContractKind};
use semver::Version;
use std::collections::HashMap;

/// Solidity version ranges with different pseudo-variable typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolidityFamily {
    /// Before 0.5.0: no payable/non-payable address distinction.
    Pre050,
    /// 0.5.0 through 0.7.x: `msg.sender` is `address payable`.
    Solidity05x,
    /// 0.8.0 and later: `msg.sender` is plain `address`.
    Solidity08x,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerVersion {
    pub name: String,
    pub version: Version,
}

impl CompilerVersion {
    /// Parse a solc version such as `0.8.19+commit.7dd6d404`.
    pub fn solc(version: &str) -> Result<Self, LoadError> {
        let trimmed = version.trim().trim_start_matches('v');
        let version = Version::parse(trimmed).map_err(|source| LoadError::InvalidCompilerVersion {
            version: version.to_owned(),
            source,
        })?;
        Ok(Self { name: "solc".into(), version })
    }

    pub fn family(&self) -> SolidityFamily {
        match (self.version.major, self.version.minor) {
            (0, minor) if minor < 5 => SolidityFamily::Pre050,
            (0, minor) if minor < 8 => SolidityFamily::Solidity05x,
            _ => SolidityFamily::Solidity08x,
        }
    }

    fn at_least(&self, major: u64, minor: u64, patch: u64) -> bool {
        let floor = Version::new(major, minor, patch);
        Version::new(self.version.major, self.version.minor, self.version.patch) >= floor
    }

    /// `block.chainid` exists from 0.5.12.
    pub fn has_chainid(&self) -> bool {
        self.at_least(0, 5, 12)
    }

    /// `block.basefee` exists from 0.8.7.
    pub fn has_basefee(&self) -> bool {
        self.at_least(0, 8, 7)
    }
}

/// One compiled artifact: either deployed code or creation code.
#[derive(Debug, Clone)]
pub struct DecoderContext {
    pub context_hash: B256,
    pub binary: Bytes,
    pub is_constructor: bool,
    pub contract_name: String,
    pub contract_id: Option<String>,
    pub contract_kind: ContractKind,
    pub payable: bool,
    pub abi: Option<JsonAbi>,
    pub compiler: Option<CompilerVersion>,
}

impl DecoderContext {
    pub fn new(
        contract_name: impl Into<String>,
        binary: impl Into<Bytes>,
        is_constructor: bool,
    ) -> Self {
        let binary = binary.into();
        Self {
            context_hash: fingerprint::context_hash(&binary),
            binary,
            is_constructor,
            contract_name: contract_name.into(),
            contract_id: None,
            contract_kind: ContractKind::Contract,
            payable: false,
            abi: None,
            compiler: None,
        }
    }

    /// Build from a `0x`-prefixed (or bare) hex string.
    pub fn from_hex(
        contract_name: impl Into<String>,
        hex_binary: &str,
        is_constructor: bool,
    ) -> Result<Self, LoadError> {
        let raw = hex::decode(hex_binary.trim_start_matches("0x"))?;
        Ok(Self::new(contract_name, raw, is_constructor))
    }

    pub fn with_abi(mut self, abi: JsonAbi) -> Self {
        self.payable = abi.receive.is_some()
            || abi
                .fallback
                .as_ref()
                .is_some_and(|f| f.state_mutability == StateMutability::Payable);
        self.abi = Some(abi);
        self
    }

    pub fn with_kind(mut self, kind: ContractKind) -> Self {
        self.contract_kind = kind;
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.contract_id = Some(id.into());
        self
    }

    pub fn with_compiler(mut self, compiler: CompilerVersion) -> Self {
        self.compiler = Some(compiler);
        self
    }

    pub fn class(&self) -> ContractClass {
        ContractClass {
            name: self.contract_name.clone(),
            context_hash: self.context_hash,
            payable: self.payable,
        }
    }
}

/// All known contexts, keyed by context hash.
#[derive(Debug, Clone, Default)]
pub struct Contexts {
    by_hash: HashMap<B256, DecoderContext>,
}

impl Contexts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, context: DecoderContext) {
        self.by_hash.entry(context.context_hash).or_insert(context);
    }

    pub fn get(&self, hash: &B256) -> Option<&DecoderContext> {
        self.by_hash.get(hash)
    }

    pub fn len(&self) -> usize {
        self.by_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DecoderContext> {
        self.by_hash.values()
    }

    /// The deployed (non-constructor) context whose code matches `code`.
    pub fn find_deployed_by_code(&self, code: &[u8]) -> Option<&DecoderContext> {
        if code.is_empty() {
            return None;
        }
        self.by_hash
            .get(&fingerprint::context_hash(code))
            .filter(|ctx| !ctx.is_constructor)
    }
}

impl FromIterator<DecoderContext> for Contexts {
    fn from_iter<I: IntoIterator<Item = DecoderContext>>(iter: I) -> Self {
        let mut contexts = Contexts::new();
        for context in iter {
            contexts.insert(context);
        }
        contexts
    }
}
