//! Deterministic deployer
//!
//! Contracts are deployed through a CREATE2 forwarder (the "deploy registry")
//! that itself lives at `create1(deployer, 0)`. With a fixed deployer key and
//! salt 0 every contract lands at the same address on every chain:
//!
//!   registry = create1(deployer, 0)
//!   contract = create2(registry, 0x00..00, keccak256(bytecode ++ constructor_args))
//!
//! Per contract the lifecycle is `Unknown -> Deployed -> Authorized`; the
//! last step applies to commands only and nothing ever moves backwards.

pub mod orchestrator;

use alloy_primitives::{keccak256, Address, Bytes, B256};
use alloy_sol_types::{sol, SolCall, SolEvent, SolValue};
use std::fmt;
use tracing::{debug, info, warn};

use crate::addresses::{create1_address, create2_address, init_code_hash, ZERO_SALT};
use crate::chain::{ChainClient, ChainTx, TxOutcome};
use crate::contracts::ContractKind;
use crate::error::{DeployError, DeployResult};

pub use orchestrator::{DeploymentPlan, Orchestrator, PlannedContract};

// ============================================
// SOLIDITY INTERFACES
// ============================================

sol! {
    /// CREATE2 forwarder. Only trusted accounts may request deployments.
    interface IDeployRegistry {
        event Deployed(address indexed deployed, bytes32 indexed salt);

        function deploy(bytes calldata initCode, bytes32 salt) external returns (address deployed);
    }

    /// Access-control surface of the Invoker.
    interface IInvoker {
        function grantRole(bytes32 role, address account) external;
        function hasRole(bytes32 role, address account) external view returns (bool);
    }
}

pub type GasUsed = u64;

/// Role a command needs before the invoker will delegate-call it.
pub fn command_executor_role() -> B256 {
    keccak256("COMMAND_EXECUTOR_ROLE")
}

/// Creation bytecode followed by its ABI-encoded constructor arguments.
pub fn init_code(bytecode: &[u8], constructor_args: &[u8]) -> Bytes {
    let mut code = Vec::with_capacity(bytecode.len() + constructor_args.len());
    code.extend_from_slice(bytecode);
    code.extend_from_slice(constructor_args);
    Bytes::from(code)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractState {
    Unknown,
    Deployed,
    Authorized,
}

impl fmt::Display for ContractState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractState::Unknown => write!(f, "UNKNOWN"),
            ContractState::Deployed => write!(f, "DEPLOYED"),
            ContractState::Authorized => write!(f, "AUTHORIZED"),
        }
    }
}

/// Handle to an on-chain deploy registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Factory {
    pub address: Address,
    /// Local hint only; nothing is re-authorized on chain when binding.
    pub trusted_hint: Address,
    /// True if this process deployed the registry.
    pub bootstrapped: bool,
}

impl Factory {
    pub fn at(address: Address, trusted_hint: Address) -> Self {
        Self {
            address,
            trusted_hint,
            bootstrapped: false,
        }
    }
}

pub struct DeterministicDeployer<C> {
    chain: C,
    registry_bytecode: Bytes,
}

impl<C: ChainClient> DeterministicDeployer<C> {
    /// `registry_bytecode` is the registry's creation code without constructor args.
    pub fn new(chain: C, registry_bytecode: Bytes) -> Self {
        Self {
            chain,
            registry_bytecode,
        }
    }

    pub fn chain(&self) -> &C {
        &self.chain
    }

    /// Well-known registry address for a deployer key.
    pub fn registry_address(deployer_identity: Address) -> Address {
        create1_address(deployer_identity, 0)
    }

    // ============================================
    // FACTORY RESOLUTION
    // ============================================

    /// Bind to the registry at `create1(deployer_identity, 0)`, deploying it
    /// first unless `ensure_deployed` forbids it.
    pub async fn resolve_or_bootstrap_factory(
        &self,
        deployer_identity: Address,
        trusted_identity: Address,
        ensure_deployed: bool,
    ) -> DeployResult<Factory> {
        let expected = Self::registry_address(deployer_identity);

        if self.chain.has_code(expected).await? {
            info!("✓ Deploy registry found at {}", expected);
            return Ok(Factory::at(expected, trusted_identity));
        }

        if ensure_deployed {
            return Err(DeployError::RegistryNotDeployed {
                expected_address: expected,
            });
        }

        self.bootstrap_registry(deployer_identity, trusted_identity, expected)
            .await
    }

    /// Bind to a registry at a known address (e.g. from the network table).
    pub async fn resolve_factory_at(
        &self,
        address: Address,
        trusted_identity: Address,
    ) -> DeployResult<Factory> {
        if !self.chain.has_code(address).await? {
            return Err(DeployError::RegistryNotDeployed {
                expected_address: address,
            });
        }
        Ok(Factory::at(address, trusted_identity))
    }

    async fn bootstrap_registry(
        &self,
        deployer_identity: Address,
        trusted_identity: Address,
        expected: Address,
    ) -> DeployResult<Factory> {
        let signer = self.chain.sender().ok_or(DeployError::NoSigner)?;
        if signer != deployer_identity {
            return Err(DeployError::SignerMismatch {
                expected: deployer_identity,
                actual: signer,
            });
        }

        let nonce = self.chain.nonce_of(deployer_identity).await?;
        if nonce != 0 {
            return Err(DeployError::FactoryNonceConsumed {
                deployer: deployer_identity,
                nonce,
            });
        }

        warn!("Deploy registry missing at {}, bootstrapping", expected);
        let constructor_args = (trusted_identity,).abi_encode_params();
        let outcome = self
            .chain
            .send(ChainTx::Create {
                init_code: init_code(&self.registry_bytecode, &constructor_args),
            })
            .await?;
        ensure_success(&outcome, "deploy registry bootstrap")?;

        if let Some(reported) = outcome.contract_address {
            if reported != expected {
                return Err(DeployError::DeployedAddressMismatch {
                    predicted: expected,
                    reported,
                });
            }
        }
        if !self.chain.has_code(expected).await? {
            return Err(DeployError::DeploymentNotObserved { address: expected });
        }

        info!(
            "✓ Deploy registry bootstrapped at {} (gas: {}, trusted: {})",
            expected, outcome.gas_used, trusted_identity
        );
        Ok(Factory {
            address: expected,
            trusted_hint: trusted_identity,
            bootstrapped: true,
        })
    }

    // ============================================
    // PREDICTION
    // ============================================

    pub fn predict_address(&self, factory: &Factory, init_code: &[u8]) -> Address {
        create2_address(factory.address, ZERO_SALT, init_code_hash(init_code))
    }

    pub async fn is_deployed(&self, factory: &Factory, init_code: &[u8]) -> DeployResult<bool> {
        let address = self.predict_address(factory, init_code);
        self.chain.has_code(address).await
    }

    // ============================================
    // DEPLOY / AUTHORIZE
    // ============================================

    /// Deploy `bytecode ++ constructor_args` through the registry with salt 0.
    ///
    /// For commands the creation bytecode must hash to `expected_init_code_hash`;
    /// nothing is sent otherwise. The returned address is always the local
    /// prediction. Not safe to call twice for the same init code: check
    /// [`Self::is_deployed`] first.
    pub async fn deploy(
        &self,
        factory: &Factory,
        kind: ContractKind,
        bytecode: &[u8],
        constructor_args: &[u8],
        expected_init_code_hash: Option<B256>,
    ) -> DeployResult<(Address, GasUsed)> {
        if kind.is_command() {
            let expected = expected_init_code_hash.ok_or_else(|| {
                DeployError::UnknownContract(format!("{} (no expected init code hash)", kind))
            })?;
            let actual = init_code_hash(bytecode);
            if actual != expected {
                return Err(DeployError::InitCodeHashMismatch {
                    contract: kind,
                    expected,
                    actual,
                });
            }
            debug!("{} bytecode matches manifest hash {}", kind, expected);
        }

        let code = init_code(bytecode, constructor_args);
        let predicted = self.predict_address(factory, &code);

        let data = IDeployRegistry::deployCall {
            initCode: code,
            salt: ZERO_SALT,
        }
        .abi_encode();

        info!("🚀 Deploying {} to {}", kind, predicted);
        let outcome = self
            .chain
            .send(ChainTx::Call {
                to: factory.address,
                data: Bytes::from(data),
            })
            .await?;
        ensure_success(&outcome, &format!("deploy {}", kind))?;

        if let Some(reported) = reported_deployment(&outcome, factory.address) {
            if reported != predicted {
                return Err(DeployError::DeployedAddressMismatch { predicted, reported });
            }
        }
        if !self.chain.has_code(predicted).await? {
            return Err(DeployError::DeploymentNotObserved { address: predicted });
        }

        info!("✓ {} deployed at {} (gas: {})", kind, predicted, outcome.gas_used);
        Ok((predicted, outcome.gas_used))
    }

    /// Grant the command-execution role to `command` on `invoker`.
    pub async fn authorize_command(
        &self,
        invoker: Address,
        command: Address,
        trusted_identity: Address,
    ) -> DeployResult<GasUsed> {
        let signer = self.chain.sender().ok_or(DeployError::NoSigner)?;
        if signer != trusted_identity {
            return Err(DeployError::SignerMismatch {
                expected: trusted_identity,
                actual: signer,
            });
        }

        let data = IInvoker::grantRoleCall {
            role: command_executor_role(),
            account: command,
        }
        .abi_encode();

        let outcome = self
            .chain
            .send(ChainTx::Call {
                to: invoker,
                data: Bytes::from(data),
            })
            .await?;
        ensure_success(&outcome, &format!("grant role to {}", command))?;

        info!("🔑 Authorized {} on invoker {} (gas: {})", command, invoker, outcome.gas_used);
        Ok(outcome.gas_used)
    }

    pub async fn has_command_role(&self, invoker: Address, command: Address) -> DeployResult<bool> {
        let data = IInvoker::hasRoleCall {
            role: command_executor_role(),
            account: command,
        }
        .abi_encode();

        let ret = self.chain.call(invoker, Bytes::from(data)).await?;
        Ok(IInvoker::hasRoleCall::abi_decode_returns(&ret)?)
    }

    /// Where a contract sits in `Unknown -> Deployed -> Authorized`.
    pub async fn contract_state(
        &self,
        factory: &Factory,
        kind: ContractKind,
        init_code: &[u8],
        invoker: Option<Address>,
    ) -> DeployResult<ContractState> {
        let address = self.predict_address(factory, init_code);
        if !self.chain.has_code(address).await? {
            return Ok(ContractState::Unknown);
        }

        match (kind.is_command(), invoker) {
            (true, Some(invoker)) if self.chain.has_code(invoker).await? => {
                if self.has_command_role(invoker, address).await? {
                    Ok(ContractState::Authorized)
                } else {
                    Ok(ContractState::Deployed)
                }
            }
            _ => Ok(ContractState::Deployed),
        }
    }
}

fn ensure_success(outcome: &TxOutcome, context: &str) -> DeployResult<()> {
    if outcome.success {
        Ok(())
    } else {
        Err(DeployError::TransactionReverted {
            tx_hash: outcome.tx_hash,
            context: context.to_string(),
        })
    }
}

/// Address announced by the registry's `Deployed` event, if it emitted one.
fn reported_deployment(outcome: &TxOutcome, registry: Address) -> Option<Address> {
    outcome
        .logs
        .iter()
        .filter(|log| log.address == registry)
        .find_map(|log| IDeployRegistry::Deployed::decode_log_data(&log.data).ok())
        .map(|event| event.deployed)
}
