//! Static registry manifest
//!
//! ```toml
//! [contracts.CWrap]
//! init_code_hash = "0x..."
//! supported_chains = [1, 137]
//!
//! [contracts.CWrap.deployments]
//! 1 = "0x..."
//! ```
//!
//! The expected init code hash covers the compiled creation bytecode only;
//! constructor arguments are chain specific and checked separately through
//! the predicted address.

use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::contracts::ContractKind;
use crate::error::{DeployError, DeployResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRegistryEntry {
    /// Optional for the invoker, required for every command.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_code_hash: Option<B256>,

    #[serde(default)]
    pub supported_chains: Vec<u64>,

    /// chain id -> deployed address. Keys are strings so TOML tables work.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub deployments: BTreeMap<String, Address>,
}

impl DeploymentRegistryEntry {
    pub fn supports(&self, chain_id: u64) -> bool {
        self.supported_chains.contains(&chain_id)
    }

    pub fn deployed_at(&self, chain_id: u64) -> Option<Address> {
        self.deployments.get(&chain_id.to_string()).copied()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    contracts: BTreeMap<String, DeploymentRegistryEntry>,
}

impl Manifest {
    pub fn from_toml_str(content: &str) -> DeployResult<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> DeployResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> DeployResult<()> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn entry(&self, kind: ContractKind) -> DeployResult<&DeploymentRegistryEntry> {
        self.contracts
            .get(kind.name())
            .ok_or_else(|| DeployError::UnknownContract(kind.name().to_string()))
    }

    pub fn insert(&mut self, kind: ContractKind, entry: DeploymentRegistryEntry) {
        self.contracts.insert(kind.name().to_string(), entry);
    }

    /// Fails if the contract is not marked as supported on `chain_id`.
    pub fn ensure_supported(&self, kind: ContractKind, chain_id: u64) -> DeployResult<()> {
        if self.entry(kind)?.supports(chain_id) {
            Ok(())
        } else {
            Err(DeployError::UnsupportedChain { contract: kind, chain_id })
        }
    }

    /// Expected init code hash. `None` is only accepted for the invoker.
    pub fn expected_init_code_hash(&self, kind: ContractKind) -> DeployResult<Option<B256>> {
        let entry = self.entry(kind)?;
        match (entry.init_code_hash, kind.is_invoker()) {
            (Some(hash), _) => Ok(Some(hash)),
            (None, true) => Ok(None),
            (None, false) => Err(DeployError::UnknownContract(format!(
                "{} (no init_code_hash recorded)",
                kind
            ))),
        }
    }

    pub fn deployed_address(&self, kind: ContractKind, chain_id: u64) -> Option<Address> {
        self.contracts
            .get(kind.name())
            .and_then(|entry| entry.deployed_at(chain_id))
    }

    /// Record a live deployment. Recording the same address twice is a no-op;
    /// a different address for the same chain is rejected.
    pub fn record_deployment(
        &mut self,
        kind: ContractKind,
        chain_id: u64,
        address: Address,
    ) -> DeployResult<()> {
        let entry = self
            .contracts
            .get_mut(kind.name())
            .ok_or_else(|| DeployError::UnknownContract(kind.name().to_string()))?;

        match entry.deployed_at(chain_id) {
            Some(recorded) if recorded == address => Ok(()),
            Some(recorded) => Err(DeployError::AddressAlreadyRecorded {
                contract: kind,
                chain_id,
                recorded,
                new: address,
            }),
            None => {
                debug!("Recording {} at {} on chain {}", kind, address, chain_id);
                entry.deployments.insert(chain_id.to_string(), address);
                Ok(())
            }
        }
    }

    pub fn contracts(&self) -> impl Iterator<Item = (&str, &DeploymentRegistryEntry)> {
        self.contracts.iter().map(|(name, entry)| (name.as_str(), entry))
    }
}
