//! Chain/network resolver
//!
//! Maps an active network name to chain metadata: chain id, the wrapped
//! native asset, protocol addresses command contracts are constructed with,
//! and optionally a pre-deployed registry/invoker for that chain.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::{DeployError, DeployResult};

/// Metadata for one network entry in `networks.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainMetadata {
    pub chain_id: u64,

    /// WETH / WMATIC / WBNB ...
    pub wrapped_native: Address,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uniswap_v3_router: Option<Address>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uniswap_v3_position_manager: Option<Address>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aave_v2_lending_pool: Option<Address>,

    /// Registry already deployed on this chain (skips create1 derivation)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deploy_registry: Option<Address>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoker: Option<Address>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkResolver {
    #[serde(default)]
    networks: BTreeMap<String, ChainMetadata>,
}

impl NetworkResolver {
    pub fn from_toml_str(content: &str) -> DeployResult<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> DeployResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Look up a network by name (case-insensitive).
    pub fn resolve(&self, network: &str) -> DeployResult<&ChainMetadata> {
        let wanted = network.to_lowercase();
        self.networks
            .iter()
            .find(|(name, _)| name.to_lowercase() == wanted)
            .map(|(_, meta)| meta)
            .ok_or_else(|| DeployError::UnknownNetwork(network.to_string()))
    }

    /// Reverse lookup by chain id, returning the network name as well.
    pub fn by_chain_id(&self, chain_id: u64) -> Option<(&str, &ChainMetadata)> {
        self.networks
            .iter()
            .find(|(_, meta)| meta.chain_id == chain_id)
            .map(|(name, meta)| (name.as_str(), meta))
    }
}

/// Unwrap an optional protocol address or report which field is missing.
pub fn require(
    network: &str,
    field: &'static str,
    value: Option<Address>,
) -> DeployResult<Address> {
    value.ok_or_else(|| DeployError::MissingNetworkAddress {
        network: network.to_string(),
        field,
    })
}
