//! Deployment Configuration
//!
//! Everything a deployment run needs that is not part of the manifest or the
//! network table: where to connect, which keys to use, and where the input
//! and output files live.

use alloy_primitives::Address;
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use eyre::{eyre, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::addresses::parse_address;
use crate::contracts::ContractKind;

// ============================================
// MAIN CONFIGURATION
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // ========== Network Settings ==========
    /// JSON-RPC endpoint of the target chain
    pub rpc_url: String,

    /// Entry in the network table (mainnet, polygon, ...)
    pub network: String,

    // ========== Identities ==========
    /// Signing key (KEEP SECRET!). Never written back to disk.
    #[serde(default, skip_serializing)]
    pub deployer_private_key: Option<String>,

    /// Account whose nonce-0 CREATE hosts the deploy registry.
    /// Defaults to the signer.
    #[serde(default)]
    pub registry_deployer_address: Option<String>,

    /// Account trusted by the registry and allowed to grant roles.
    /// Defaults to the registry deployer.
    #[serde(default)]
    pub trusted_deployer_address: Option<String>,

    // ========== Files ==========
    pub manifest_path: String,
    pub networks_path: String,
    pub artifacts_dir: String,
    pub deployment_log_path: String,

    // ========== Behaviour ==========
    /// Deploy the registry when it is missing (needs the deployer key at nonce 0)
    pub allow_factory_bootstrap: bool,

    /// Contracts to deploy; empty means all of them. The invoker is always included.
    #[serde(default)]
    pub contracts: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables and .env file
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        Ok(Self {
            rpc_url: env::var("RPC_URL").unwrap_or(defaults.rpc_url),
            network: env::var("NETWORK").unwrap_or(defaults.network),

            deployer_private_key: env::var("DEPLOYER_PRIVATE_KEY").ok().filter(|k| !k.is_empty()),
            registry_deployer_address: env::var("REGISTRY_DEPLOYER_ADDRESS")
                .ok()
                .filter(|a| !a.is_empty()),
            trusted_deployer_address: env::var("TRUSTED_DEPLOYER_ADDRESS")
                .ok()
                .filter(|a| !a.is_empty()),

            manifest_path: env::var("MANIFEST_PATH").unwrap_or(defaults.manifest_path),
            networks_path: env::var("NETWORKS_PATH").unwrap_or(defaults.networks_path),
            artifacts_dir: env::var("ARTIFACTS_DIR").unwrap_or(defaults.artifacts_dir),
            deployment_log_path: env::var("DEPLOYMENT_LOG_PATH")
                .unwrap_or(defaults.deployment_log_path),

            allow_factory_bootstrap: match env::var("ALLOW_FACTORY_BOOTSTRAP") {
                Ok(value) => parse_flag("ALLOW_FACTORY_BOOTSTRAP", &value)?,
                Err(_) => defaults.allow_factory_bootstrap,
            },
            contracts: env::var("DEPLOY_CONTRACTS")
                .map(|s| {
                    s.split(',')
                        .map(|c| c.trim().to_string())
                        .filter(|c| !c.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
        })
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file (without the private key)
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Validate before touching the chain
    pub fn validate(&self) -> Result<()> {
        if self.rpc_url.is_empty() || self.rpc_url.contains("YOUR_API_KEY") {
            return Err(eyre!("Invalid RPC_URL - please set a valid JSON-RPC endpoint"));
        }
        if self.network.is_empty() {
            return Err(eyre!("NETWORK must name an entry of the network table"));
        }

        if let Some(key) = &self.deployer_private_key {
            if key.trim_start_matches("0x").len() != 64 {
                return Err(eyre!("DEPLOYER_PRIVATE_KEY should be 64 hex chars"));
            }
        }
        if let Some(addr) = &self.registry_deployer_address {
            parse_address(addr).map_err(|e| eyre!("REGISTRY_DEPLOYER_ADDRESS: {}", e))?;
        }
        if let Some(addr) = &self.trusted_deployer_address {
            parse_address(addr).map_err(|e| eyre!("TRUSTED_DEPLOYER_ADDRESS: {}", e))?;
        }

        if self.allow_factory_bootstrap && self.deployer_private_key.is_none() {
            return Err(eyre!(
                "ALLOW_FACTORY_BOOTSTRAP requires DEPLOYER_PRIVATE_KEY (the registry is created by a signed CREATE)"
            ));
        }

        self.contract_kinds()?;
        Ok(())
    }

    /// Parsed signing key, if configured
    pub fn signer(&self) -> Result<Option<PrivateKeySigner>> {
        self.deployer_private_key
            .as_deref()
            .map(|key| {
                PrivateKeySigner::from_str(key.trim_start_matches("0x"))
                    .map_err(|e| eyre!("DEPLOYER_PRIVATE_KEY parse error: {}", e))
            })
            .transpose()
    }

    /// Account the registry address is derived from
    pub fn deployer_identity(&self, signer: Option<&PrivateKeySigner>) -> Result<Address> {
        match (&self.registry_deployer_address, signer) {
            (Some(addr), _) => Ok(parse_address(addr)?),
            (None, Some(signer)) => Ok(Signer::address(signer)),
            (None, None) => Err(eyre!(
                "Set REGISTRY_DEPLOYER_ADDRESS or DEPLOYER_PRIVATE_KEY to locate the deploy registry"
            )),
        }
    }

    /// Account trusted by the registry; falls back to the deployer identity
    pub fn trusted_identity(&self, signer: Option<&PrivateKeySigner>) -> Result<Address> {
        match &self.trusted_deployer_address {
            Some(addr) => Ok(parse_address(addr)?),
            None => self.deployer_identity(signer),
        }
    }

    /// Selected contracts; all of them when none are configured
    pub fn contract_kinds(&self) -> Result<Vec<ContractKind>> {
        if self.contracts.is_empty() {
            return Ok(ContractKind::ALL.to_vec());
        }
        self.contracts
            .iter()
            .map(|name| ContractKind::from_str(name).map_err(|e| eyre!(e)))
            .collect()
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        let configured = |v: &Option<String>| match v {
            Some(s) => s.clone(),
            None => "✗ Not Set".to_string(),
        };

        println!("╔════════════════════════════════════════════════════════════╗");
        println!("║              INVOKER DEPLOYER - CONFIGURATION              ║");
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ Network:           {:^40} ║", self.network);
        println!("║ Bootstrap:         {:^40} ║",
            if self.allow_factory_bootstrap { "✓ Allowed" } else { "✗ Read-only registry" }
        );
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ IDENTITIES                                                 ║");
        println!("║ • Signer Key:      {:^40} ║",
            if self.deployer_private_key.is_some() { "✓ Configured" } else { "✗ Not Set" }
        );
        println!("║ • Deployer:        {:^40} ║", configured(&self.registry_deployer_address));
        println!("║ • Trusted:         {:^40} ║", configured(&self.trusted_deployer_address));
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ FILES                                                      ║");
        println!("║ • Manifest:        {:^40} ║", self.manifest_path);
        println!("║ • Networks:        {:^40} ║", self.networks_path);
        println!("║ • Artifacts:       {:^40} ║", self.artifacts_dir);
        println!("║ • Deployment Log:  {:^40} ║", self.deployment_log_path);
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ Contracts:         {:^40} ║",
            if self.contracts.is_empty() { "all".to_string() } else { self.contracts.join(",") }
        );
        println!("╚════════════════════════════════════════════════════════════╝");
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8545".to_string(),
            network: "mainnet".to_string(),
            deployer_private_key: None,
            registry_deployer_address: None,
            trusted_deployer_address: None,
            manifest_path: "./deployments/registry.toml".to_string(),
            networks_path: "./deployments/networks.toml".to_string(),
            artifacts_dir: "./build/contracts".to_string(),
            deployment_log_path: "./logs/deployments.log".to_string(),
            allow_factory_bootstrap: false,
            contracts: vec![],
        }
    }
}

// ============================================
// TESTS
// ============================================

/// Strict boolean for env flags; anything unrecognised is an error, not `false`.
fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "false" | "0" | "no" | "off" => Ok(false),
        "true" | "1" | "yes" | "on" => Ok(true),
        other => Err(eyre!("{} must be true/false, got `{}`", name, other)),
    }
}
