//! Invoker Deployer
//!
//! Deterministic CREATE2 deployment of the Invoker and its command contracts
//! through a deploy registry at `create1(deployer, 0)`, with manifest-checked
//! bytecode and idempotent role authorization.

pub mod addresses;
pub mod artifacts;
pub mod chain;
pub mod config;
pub mod contracts;
pub mod deployer;
pub mod error;
pub mod manifest;
pub mod networks;
pub mod report;

pub use addresses::{create1_address, create2_address, init_code_hash};
pub use chain::{ChainClient, RpcChain};
pub use contracts::ContractKind;
pub use deployer::{
    ContractState, DeploymentPlan, DeterministicDeployer, Factory, Orchestrator, PlannedContract,
};
pub use error::{DeployError, DeployResult};
