//! Deployment reporting
//!
//! A run produces a [`DeploymentReport`] (per-contract outcome, total gas) and
//! appends one [`DeploymentRecord`] per on-chain action to a JSON-lines log.

use alloy_primitives::Address;
use chrono::{DateTime, Utc};
use console::style;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::addresses::checksum;
use crate::contracts::ContractKind;
use crate::deployer::{ContractState, GasUsed};
use crate::error::DeployResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployAction {
    AlreadyDeployed,
    Deployed { gas_used: GasUsed },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthAction {
    AlreadyAuthorized,
    Granted { gas_used: GasUsed },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractOutcome {
    pub kind: ContractKind,
    pub address: Address,
    pub deploy: DeployAction,
    /// `None` for the invoker
    pub authorization: Option<AuthAction>,
}

impl ContractOutcome {
    pub fn state(&self) -> ContractState {
        match self.authorization {
            Some(_) => ContractState::Authorized,
            None => ContractState::Deployed,
        }
    }

    pub fn gas_used(&self) -> GasUsed {
        let deploy = match self.deploy {
            DeployAction::Deployed { gas_used } => gas_used,
            DeployAction::AlreadyDeployed => 0,
        };
        let authorize = match self.authorization {
            Some(AuthAction::Granted { gas_used }) => gas_used,
            _ => 0,
        };
        deploy + authorize
    }
}

#[derive(Debug, Clone)]
pub struct DeploymentReport {
    pub network: String,
    pub chain_id: u64,
    pub factory: Address,
    pub outcomes: Vec<ContractOutcome>,
}

impl DeploymentReport {
    pub fn new(network: impl Into<String>, chain_id: u64, factory: Address) -> Self {
        Self {
            network: network.into(),
            chain_id,
            factory,
            outcomes: Vec::new(),
        }
    }

    pub fn total_gas_used(&self) -> GasUsed {
        self.outcomes.iter().map(ContractOutcome::gas_used).sum()
    }

    pub fn deploy_transactions(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.deploy, DeployAction::Deployed { .. }))
            .count()
    }

    pub fn authorize_transactions(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.authorization, Some(AuthAction::Granted { .. })))
            .count()
    }

    pub fn address_of(&self, kind: ContractKind) -> Option<Address> {
        self.outcomes.iter().find(|o| o.kind == kind).map(|o| o.address)
    }

    pub fn print_summary(&self) {
        println!("╔════════════════════════════════════════════════════════════════════════════╗");
        println!("║ DEPLOYMENT SUMMARY                                                         ║");
        println!("╠════════════════════════════════════════════════════════════════════════════╣");
        println!("║ Network:   {:<64}║", format!("{} (chain {})", self.network, self.chain_id));
        println!("║ Registry:  {:<64}║", checksum(&self.factory));
        println!("╠════════════════════════════════════════════════════════════════════════════╣");
        for outcome in &self.outcomes {
            let action = match (outcome.deploy, outcome.authorization) {
                (DeployAction::Deployed { .. }, _) => style("deployed").green(),
                (_, Some(AuthAction::Granted { .. })) => style("authorized").green(),
                _ => style("unchanged").dim(),
            };
            println!(
                "║ {:<16} {} {:<10} {:>10} gas ║",
                outcome.kind.name(),
                checksum(&outcome.address),
                action,
                outcome.gas_used()
            );
        }
        println!("╠════════════════════════════════════════════════════════════════════════════╣");
        println!(
            "║ Transactions: {} deploy, {} authorize   Total gas: {:<28}║",
            self.deploy_transactions(),
            self.authorize_transactions(),
            self.total_gas_used()
        );
        println!("╚════════════════════════════════════════════════════════════════════════════╝");
    }
}

// ============================================
// DEPLOYMENT LOG
// ============================================

/// One on-chain action, appended as a JSON line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub timestamp: DateTime<Utc>,
    pub network: String,
    pub chain_id: u64,
    pub contract: ContractKind,
    pub address: Address,
    pub action: String,
    pub gas_used: GasUsed,
}

impl DeploymentRecord {
    pub fn new(
        network: &str,
        chain_id: u64,
        contract: ContractKind,
        address: Address,
        action: &str,
        gas_used: GasUsed,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            network: network.to_string(),
            chain_id,
            contract,
            address,
            action: action.to_string(),
            gas_used,
        }
    }

    /// Append this record to a file
    pub fn append_to_file<P: AsRef<Path>>(&self, path: P) -> DeployResult<()> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;

        let json = serde_json::to_string(self)?;
        writeln!(file, "{}", json)?;

        Ok(())
    }
}
