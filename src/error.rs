//! Error taxonomy for deterministic deployment.
//!
//! Pure address helpers only ever fail with `InvalidAddressFormat` or
//! `InvalidInputLength`. Everything that touches the chain, the manifest or
//! the artifacts directory surfaces through the same enum so the CLI can
//! print one diagnostic and exit non-zero.

use alloy_primitives::{Address, B256};
use std::fmt;
use std::path::PathBuf;

use crate::contracts::ContractKind;

pub type DeployResult<T> = std::result::Result<T, DeployError>;

/// The step of the orchestration that failed for a given contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Deploy,
    Authorize,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Deploy => write!(f, "deploy"),
            Step::Authorize => write!(f, "authorize"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    // ========== Pure input validation ==========
    #[error("invalid address format `{input}`: {reason}")]
    InvalidAddressFormat { input: String, reason: String },

    #[error("invalid {field} length: expected {expected} bytes, got {actual}")]
    InvalidInputLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    // ========== Factory resolution ==========
    #[error("deploy registry not found at {expected_address} and bootstrap is disabled")]
    RegistryNotDeployed { expected_address: Address },

    #[error("deployer {deployer} already used nonce {nonce}; the registry can no longer land at create1(deployer, 0)")]
    FactoryNonceConsumed { deployer: Address, nonce: u64 },

    #[error("connected signer {actual} is not the expected account {expected}")]
    SignerMismatch { expected: Address, actual: Address },

    #[error("no signer configured; this operation sends a transaction")]
    NoSigner,

    // ========== Integrity ==========
    #[error("init code hash mismatch for {contract}: manifest expects {expected}, bytecode hashes to {actual}")]
    InitCodeHashMismatch {
        contract: ContractKind,
        expected: B256,
        actual: B256,
    },

    #[error("{contract} is not marked as supported on chain {chain_id}")]
    UnsupportedChain { contract: ContractKind, chain_id: u64 },

    #[error("no manifest entry for contract `{0}`")]
    UnknownContract(String),

    #[error("unknown network `{0}`")]
    UnknownNetwork(String),

    #[error("network `{network}` has no `{field}` address configured")]
    MissingNetworkAddress { network: String, field: &'static str },

    #[error("{contract} already recorded at {recorded} on chain {chain_id}, refusing to overwrite with {new}")]
    AddressAlreadyRecorded {
        contract: ContractKind,
        chain_id: u64,
        recorded: Address,
        new: Address,
    },

    // ========== Deployment outcome ==========
    #[error("factory reported deployment at {reported}, but the predicted address is {predicted}")]
    DeployedAddressMismatch { predicted: Address, reported: Address },

    #[error("network pins the invoker at {address}, but no code is deployed there")]
    PinnedInvokerMissing { address: Address },

    #[error("transaction succeeded but no code found at predicted address {address}")]
    DeploymentNotObserved { address: Address },

    #[error("transaction {tx_hash} reverted ({context})")]
    TransactionReverted { tx_hash: B256, context: String },

    // ========== Orchestration ==========
    #[error("deployment plan does not include the Invoker")]
    InvokerNotPlanned,

    #[error("{contract}: {step} step failed: {source}")]
    Step {
        contract: ContractKind,
        step: Step,
        #[source]
        source: Box<DeployError>,
    },

    // ========== Boundaries ==========
    #[error("invalid rpc url `{0}`")]
    InvalidRpcUrl(String),

    #[error("rpc transport error: {0}")]
    Transport(#[from] alloy_transport::TransportError),

    #[error("pending transaction error: {0}")]
    PendingTransaction(#[from] alloy_provider::PendingTransactionError),

    #[error("abi decoding failed: {0}")]
    Abi(#[from] alloy_sol_types::Error),

    #[error("artifact {path}: {reason}")]
    Artifact { path: PathBuf, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),

    #[error(transparent)]
    TomlSer(#[from] toml::ser::Error),

    #[error(transparent)]
    Hex(#[from] hex::FromHexError),
}

impl DeployError {
    /// Attach the failing contract and orchestration step.
    pub fn at(self, contract: ContractKind, step: Step) -> Self {
        DeployError::Step {
            contract,
            step,
            source: Box::new(self),
        }
    }

    /// The registry is simply absent, as opposed to the chain being unreachable.
    pub fn is_registry_missing(&self) -> bool {
        matches!(self, DeployError::RegistryNotDeployed { .. })
    }
}
