//! In-memory chain for unit tests.
//!
//! Understands just enough to exercise the deployer: CREATE from the signer,
//! the registry's `deploy(bytes,bytes32)`, and the invoker's
//! `grantRole`/`hasRole`. Every submitted transaction is recorded.

use alloy_primitives::{keccak256, Address, Bytes, Log, B256};
use alloy_sol_types::{SolCall, SolEvent, SolValue};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use super::{ChainClient, ChainTx, TxOutcome};
use crate::addresses::{create1_address, create2_address};
use crate::deployer::{IDeployRegistry, IInvoker};
use crate::error::DeployResult;

#[derive(Default)]
struct MockState {
    code: HashMap<Address, Bytes>,
    nonces: HashMap<Address, u64>,
    /// (invoker, role, account)
    roles: HashSet<(Address, B256, Address)>,
    sent: Vec<ChainTx>,
    role_checks: usize,
    misreport: bool,
    /// Registry deploys left before every further one reverts
    deploy_budget: Option<usize>,
}

pub struct MockChain {
    chain_id: u64,
    sender: Option<Address>,
    state: Mutex<MockState>,
}

impl MockChain {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            sender: None,
            state: Mutex::new(MockState::default()),
        }
    }

    pub fn with_sender(mut self, sender: Address) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn set_nonce(&self, account: Address, nonce: u64) {
        self.state.lock().unwrap().nonces.insert(account, nonce);
    }

    pub fn set_code(&self, address: Address, code: Bytes) {
        self.state.lock().unwrap().code.insert(address, code);
    }

    /// Emit `Deployed` events pointing at the wrong address.
    pub fn misreport_deployments(&self, on: bool) {
        self.state.lock().unwrap().misreport = on;
    }

    /// Let `successes` more registry deploys through, then revert the rest.
    /// `None` lifts the limit.
    pub fn revert_deploys_after(&self, successes: Option<usize>) {
        self.state.lock().unwrap().deploy_budget = successes;
    }

    pub fn sent_transactions(&self) -> Vec<ChainTx> {
        self.state.lock().unwrap().sent.clone()
    }

    /// Number of registry `deploy` calls submitted.
    pub fn deploy_calls(&self) -> usize {
        self.count_calls(IDeployRegistry::deployCall::SELECTOR)
    }

    pub fn grant_calls(&self) -> usize {
        self.count_calls(IInvoker::grantRoleCall::SELECTOR)
    }

    pub fn role_checks(&self) -> usize {
        self.state.lock().unwrap().role_checks
    }

    fn count_calls(&self, selector: [u8; 4]) -> usize {
        self.state
            .lock()
            .unwrap()
            .sent
            .iter()
            .filter(|tx| matches!(tx, ChainTx::Call { data, .. } if data.starts_with(&selector)))
            .count()
    }
}

impl ChainClient for MockChain {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn sender(&self) -> Option<Address> {
        self.sender
    }

    async fn code_at(&self, address: Address) -> DeployResult<Bytes> {
        Ok(self.state.lock().unwrap().code.get(&address).cloned().unwrap_or_default())
    }

    async fn nonce_of(&self, address: Address) -> DeployResult<u64> {
        Ok(self.state.lock().unwrap().nonces.get(&address).copied().unwrap_or(0))
    }

    async fn call(&self, to: Address, data: Bytes) -> DeployResult<Bytes> {
        let mut state = self.state.lock().unwrap();
        if data.starts_with(&IInvoker::hasRoleCall::SELECTOR) {
            let call = IInvoker::hasRoleCall::abi_decode(&data)?;
            state.role_checks += 1;
            let granted = state.roles.contains(&(to, call.role, call.account));
            return Ok(Bytes::from(granted.abi_encode()));
        }
        Ok(Bytes::new())
    }

    async fn send(&self, tx: ChainTx) -> DeployResult<TxOutcome> {
        let sender = self.sender.ok_or(crate::error::DeployError::NoSigner)?;
        let mut state = self.state.lock().unwrap();

        state.sent.push(tx.clone());
        let tx_hash = keccak256((state.sent.len() as u64).to_be_bytes());
        let nonce = state.nonces.get(&sender).copied().unwrap_or(0);
        state.nonces.insert(sender, nonce + 1);

        let mut outcome = TxOutcome {
            tx_hash,
            success: true,
            gas_used: 21_000,
            contract_address: None,
            logs: Vec::new(),
        };

        match tx {
            ChainTx::Create { init_code } => {
                let address = create1_address(sender, nonce);
                outcome.gas_used += 200 * init_code.len() as u64;
                outcome.contract_address = Some(address);
                state.code.insert(address, init_code);
            }
            ChainTx::Call { to, data } if data.starts_with(&IDeployRegistry::deployCall::SELECTOR) => {
                let call = IDeployRegistry::deployCall::abi_decode(&data)?;
                let target = create2_address(to, call.salt, keccak256(&call.initCode));

                let registry_missing = !state.code.contains_key(&to);
                let exhausted = state.deploy_budget == Some(0);
                if registry_missing || exhausted || state.code.contains_key(&target) {
                    outcome.success = false;
                    return Ok(outcome);
                }

                if let Some(left) = state.deploy_budget.as_mut() {
                    *left -= 1;
                }
                outcome.gas_used += 200 * call.initCode.len() as u64;
                state.code.insert(target, call.initCode.clone());

                let announced = if state.misreport {
                    create2_address(to, B256::with_last_byte(1), keccak256(&call.initCode))
                } else {
                    target
                };
                let event = IDeployRegistry::Deployed {
                    deployed: announced,
                    salt: call.salt,
                };
                outcome.logs.push(Log {
                    address: to,
                    data: event.encode_log_data(),
                });
            }
            ChainTx::Call { to, data } if data.starts_with(&IInvoker::grantRoleCall::SELECTOR) => {
                let call = IInvoker::grantRoleCall::abi_decode(&data)?;
                outcome.gas_used += 30_000;
                state.roles.insert((to, call.role, call.account));
            }
            ChainTx::Call { .. } => {}
        }

        Ok(outcome)
    }
}
