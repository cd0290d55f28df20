//! Batch deployment
//!
//! Walks a [`DeploymentPlan`] (invoker first, then commands) through
//! deploy -> record -> authorize. Every step checks chain state first, so a
//! run that died half-way is resumed by running it again. There is no
//! rollback.

use alloy_primitives::{Address, Bytes};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use super::{init_code, ContractState, DeterministicDeployer, Factory, GasUsed};
use crate::artifacts::ArtifactStore;
use crate::chain::ChainClient;
use crate::contracts::ContractKind;
use crate::error::{DeployError, DeployResult, Step};
use crate::manifest::Manifest;
use crate::networks::ChainMetadata;
use crate::report::{AuthAction, ContractOutcome, DeployAction, DeploymentRecord, DeploymentReport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedContract {
    pub kind: ContractKind,
    /// Creation bytecode as compiled, without constructor arguments
    pub bytecode: Bytes,
    pub constructor_args: Bytes,
}

impl PlannedContract {
    pub fn init_code(&self) -> Bytes {
        init_code(&self.bytecode, &self.constructor_args)
    }
}

/// Ordered, duplicate-free list of contracts that always contains the invoker.
#[derive(Debug, Clone)]
pub struct DeploymentPlan {
    contracts: Vec<PlannedContract>,
}

impl DeploymentPlan {
    pub fn new(mut contracts: Vec<PlannedContract>) -> DeployResult<Self> {
        contracts.sort_by_key(|c| c.kind);
        contracts.dedup_by_key(|c| c.kind);

        if !contracts.iter().any(|c| c.kind.is_invoker()) {
            return Err(DeployError::InvokerNotPlanned);
        }
        Ok(Self { contracts })
    }

    /// Load bytecode and build constructor args for `kinds` (plus the invoker).
    pub fn build(
        kinds: &[ContractKind],
        network: &str,
        meta: &ChainMetadata,
        artifacts: &mut ArtifactStore,
    ) -> DeployResult<Self> {
        let mut wanted: Vec<ContractKind> = kinds.to_vec();
        if !wanted.contains(&ContractKind::Invoker) {
            wanted.push(ContractKind::Invoker);
        }

        let mut contracts = Vec::with_capacity(wanted.len());
        for kind in wanted {
            contracts.push(PlannedContract {
                kind,
                bytecode: artifacts.bytecode(kind.artifact_name())?,
                constructor_args: kind.constructor_args(network, meta)?,
            });
        }
        Self::new(contracts)
    }

    pub fn contracts(&self) -> &[PlannedContract] {
        &self.contracts
    }

    pub fn kinds(&self) -> Vec<ContractKind> {
        self.contracts.iter().map(|c| c.kind).collect()
    }

    pub fn invoker(&self) -> &PlannedContract {
        // `new` guarantees the invoker is present and sorts it first
        &self.contracts[0]
    }
}

pub struct Orchestrator<'a, C> {
    deployer: &'a DeterministicDeployer<C>,
    manifest: &'a mut Manifest,
    trusted_identity: Address,
    network: String,
    log_path: Option<PathBuf>,
    /// Invoker already live on this chain; replaces the CREATE2 one
    pinned_invoker: Option<Address>,
}

impl<'a, C: ChainClient> Orchestrator<'a, C> {
    pub fn new(
        deployer: &'a DeterministicDeployer<C>,
        manifest: &'a mut Manifest,
        trusted_identity: Address,
        network: impl Into<String>,
    ) -> Self {
        Self {
            deployer,
            manifest,
            trusted_identity,
            network: network.into(),
            log_path: None,
            pinned_invoker: None,
        }
    }

    /// Use an existing invoker instead of deploying one through the registry.
    pub fn with_pinned_invoker(mut self, invoker: Option<Address>) -> Self {
        self.pinned_invoker = invoker;
        self
    }

    /// Invoker commands are authorized on: the pin if set, else the prediction.
    pub fn invoker_address(&self, factory: &Factory, plan: &DeploymentPlan) -> Address {
        self.pinned_invoker
            .unwrap_or_else(|| self.deployer.predict_address(factory, &plan.invoker().init_code()))
    }

    /// Append a JSON line per on-chain action to `path`.
    pub fn with_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    /// Deploy and authorize everything in `plan`.
    ///
    /// Stops at the first failure with [`DeployError::Step`] naming the
    /// contract and step. Addresses recorded before the failure stay in the
    /// manifest.
    pub async fn deploy_all(
        &mut self,
        factory: &Factory,
        plan: &DeploymentPlan,
    ) -> DeployResult<DeploymentReport> {
        let chain_id = self.deployer.chain().chain_id();
        let mut report = DeploymentReport::new(self.network.clone(), chain_id, factory.address);

        info!(
            "📦 Deploying {} contract(s) to {} (chain {}) via registry {}",
            plan.contracts().len(),
            self.network,
            chain_id,
            factory.address
        );

        let invoker = self.invoker_address(factory, plan);

        for planned in plan.contracts() {
            let kind = planned.kind;

            let deployed = match self.pinned_invoker {
                Some(pinned) if kind.is_invoker() => self.ensure_pinned(pinned, chain_id).await,
                _ => self.ensure_deployed(factory, planned, chain_id).await,
            };
            let (address, deploy) = deployed.map_err(|e| e.at(kind, Step::Deploy))?;

            let authorization = if kind.is_command() {
                let action = self
                    .ensure_authorized(invoker, kind, address, chain_id)
                    .await
                    .map_err(|e| e.at(kind, Step::Authorize))?;
                Some(action)
            } else {
                None
            };

            report.outcomes.push(ContractOutcome {
                kind,
                address,
                deploy,
                authorization,
            });
        }

        info!(
            "✅ Deployment complete: {} deployed, {} authorized, total gas {}",
            report.deploy_transactions(),
            report.authorize_transactions(),
            report.total_gas_used()
        );
        Ok(report)
    }

    /// Read-only view of where each planned contract stands.
    pub async fn status(
        &self,
        factory: &Factory,
        plan: &DeploymentPlan,
    ) -> DeployResult<Vec<(ContractKind, Address, ContractState)>> {
        let invoker = self.invoker_address(factory, plan);

        let mut states = Vec::with_capacity(plan.contracts().len());
        for planned in plan.contracts() {
            if let (Some(pinned), true) = (self.pinned_invoker, planned.kind.is_invoker()) {
                let state = if self.deployer.chain().has_code(pinned).await? {
                    ContractState::Deployed
                } else {
                    ContractState::Unknown
                };
                states.push((planned.kind, pinned, state));
                continue;
            }

            let code = planned.init_code();
            let address = self.deployer.predict_address(factory, &code);
            let state = self
                .deployer
                .contract_state(factory, planned.kind, &code, Some(invoker))
                .await?;
            states.push((planned.kind, address, state));
        }
        Ok(states)
    }

    async fn ensure_pinned(
        &mut self,
        pinned: Address,
        chain_id: u64,
    ) -> DeployResult<(Address, DeployAction)> {
        if !self.deployer.chain().has_code(pinned).await? {
            return Err(DeployError::PinnedInvokerMissing { address: pinned });
        }
        info!("📌 Using pinned invoker at {}", pinned);
        self.manifest.record_deployment(ContractKind::Invoker, chain_id, pinned)?;
        Ok((pinned, DeployAction::AlreadyDeployed))
    }

    async fn ensure_deployed(
        &mut self,
        factory: &Factory,
        planned: &PlannedContract,
        chain_id: u64,
    ) -> DeployResult<(Address, DeployAction)> {
        let kind = planned.kind;
        let code = planned.init_code();

        if self.deployer.is_deployed(factory, &code).await? {
            let address = self.deployer.predict_address(factory, &code);
            info!("⏭️  {} already deployed at {}", kind, address);
            self.manifest.record_deployment(kind, chain_id, address)?;
            return Ok((address, DeployAction::AlreadyDeployed));
        }

        self.manifest.ensure_supported(kind, chain_id)?;
        let expected = self.manifest.expected_init_code_hash(kind)?;

        let (address, gas_used) = self
            .deployer
            .deploy(factory, kind, &planned.bytecode, &planned.constructor_args, expected)
            .await?;

        self.manifest.record_deployment(kind, chain_id, address)?;
        self.log(kind, address, "deploy", gas_used, chain_id);

        Ok((address, DeployAction::Deployed { gas_used }))
    }

    async fn ensure_authorized(
        &self,
        invoker: Address,
        kind: ContractKind,
        command: Address,
        chain_id: u64,
    ) -> DeployResult<AuthAction> {
        if self.deployer.has_command_role(invoker, command).await? {
            debug!("{} already holds the executor role", kind);
            return Ok(AuthAction::AlreadyAuthorized);
        }

        let gas_used = self
            .deployer
            .authorize_command(invoker, command, self.trusted_identity)
            .await?;
        self.log(kind, command, "authorize", gas_used, chain_id);

        Ok(AuthAction::Granted { gas_used })
    }

    fn log(&self, kind: ContractKind, address: Address, action: &str, gas_used: GasUsed, chain_id: u64) {
        let Some(path) = &self.log_path else {
            return;
        };
        let record = DeploymentRecord::new(&self.network, chain_id, kind, address, action, gas_used);
        if let Err(e) = record.append_to_file(path) {
            warn!("Failed to append deployment log {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::MockChain;
    use crate::manifest::DeploymentRegistryEntry;
    use alloy_primitives::{address, keccak256};
    use std::collections::BTreeMap;

    const DEPLOYER: Address = address!("00000000000000000000000000000000000d3910");
    const REGISTRY_CODE: &[u8] = &[0x60, 0x80, 0x60, 0x40, 0x52, 0xde, 0x91];

    fn planned(kind: ContractKind, tag: u8) -> PlannedContract {
        PlannedContract {
            kind,
            bytecode: Bytes::from(vec![0x60, 0x80, tag]),
            constructor_args: Bytes::new(),
        }
    }

    fn plan() -> DeploymentPlan {
        DeploymentPlan::new(vec![
            planned(ContractKind::CCurve, 3),
            planned(ContractKind::CTokens, 2),
            planned(ContractKind::Invoker, 1),
        ])
        .unwrap()
    }

    fn manifest_for(plan: &DeploymentPlan, chain_id: u64) -> Manifest {
        let mut manifest = Manifest::default();
        for c in plan.contracts() {
            manifest.insert(
                c.kind,
                DeploymentRegistryEntry {
                    init_code_hash: c.kind.is_command().then(|| keccak256(&c.bytecode)),
                    supported_chains: vec![chain_id],
                    deployments: BTreeMap::new(),
                },
            );
        }
        manifest
    }

    async fn setup() -> (DeterministicDeployer<MockChain>, Factory) {
        let d = DeterministicDeployer::new(
            MockChain::new(1).with_sender(DEPLOYER),
            Bytes::from_static(REGISTRY_CODE),
        );
        let factory = d.resolve_or_bootstrap_factory(DEPLOYER, DEPLOYER, false).await.unwrap();
        (d, factory)
    }

    #[test]
    fn test_plan_orders_and_requires_invoker() {
        let plan = plan();
        assert_eq!(
            plan.kinds(),
            vec![ContractKind::Invoker, ContractKind::CTokens, ContractKind::CCurve]
        );
        assert_eq!(plan.invoker().kind, ContractKind::Invoker);

        let dup = DeploymentPlan::new(vec![
            planned(ContractKind::Invoker, 1),
            planned(ContractKind::CWrap, 2),
            planned(ContractKind::CWrap, 2),
        ])
        .unwrap();
        assert_eq!(dup.contracts().len(), 2);

        assert!(matches!(
            DeploymentPlan::new(vec![planned(ContractKind::CWrap, 2)]),
            Err(DeployError::InvokerNotPlanned)
        ));
    }

    #[test]
    fn test_build_adds_invoker_and_constructor_args() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Invoker.json"), r#"{"bytecode":"0x6001"}"#).unwrap();
        std::fs::write(dir.path().join("CWrap.json"), r#"{"bytecode":"0x6002"}"#).unwrap();

        let weth = address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");
        let meta = ChainMetadata {
            chain_id: 1,
            wrapped_native: weth,
            uniswap_v3_router: None,
            uniswap_v3_position_manager: None,
            aave_v2_lending_pool: None,
            deploy_registry: None,
            invoker: None,
        };

        let mut artifacts = ArtifactStore::new(dir.path());
        let plan = DeploymentPlan::build(&[ContractKind::CWrap], "mainnet", &meta, &mut artifacts).unwrap();

        assert_eq!(plan.kinds(), vec![ContractKind::Invoker, ContractKind::CWrap]);
        let cwrap = &plan.contracts()[1];
        assert_eq!(cwrap.constructor_args.len(), 32);
        assert_eq!(&cwrap.constructor_args[12..], weth.as_slice());
        assert!(cwrap.init_code().starts_with(&[0x60, 0x02]));

        // missing protocol address surfaces before anything is planned
        assert!(matches!(
            DeploymentPlan::build(&[ContractKind::CSwapUniswapV3], "mainnet", &meta, &mut artifacts),
            Err(DeployError::Artifact { .. }) | Err(DeployError::MissingNetworkAddress { .. })
        ));
    }

    #[tokio::test]
    async fn test_full_run_deploys_authorizes_and_records() {
        let (d, factory) = setup().await;
        let plan = plan();
        let mut manifest = manifest_for(&plan, 1);

        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("deployments.log");

        let report = Orchestrator::new(&d, &mut manifest, DEPLOYER, "mainnet")
            .with_log(&log)
            .deploy_all(&factory, &plan)
            .await
            .unwrap();

        assert_eq!(report.deploy_transactions(), 3);
        assert_eq!(report.authorize_transactions(), 2);
        assert!(report.total_gas_used() > 0);
        assert_eq!(d.chain().deploy_calls(), 3);
        assert_eq!(d.chain().grant_calls(), 2);

        for c in plan.contracts() {
            let predicted = d.predict_address(&factory, &c.init_code());
            assert_eq!(report.address_of(c.kind), Some(predicted));
            assert_eq!(manifest.deployed_address(c.kind, 1), Some(predicted));
        }
        assert_eq!(report.outcomes[0].authorization, None);

        let lines = std::fs::read_to_string(&log).unwrap().lines().count();
        assert_eq!(lines, 5);
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let (d, factory) = setup().await;
        let plan = plan();
        let mut manifest = manifest_for(&plan, 1);

        Orchestrator::new(&d, &mut manifest, DEPLOYER, "mainnet")
            .deploy_all(&factory, &plan)
            .await
            .unwrap();
        let sent = d.chain().sent_transactions().len();
        let checks = d.chain().role_checks();

        let report = Orchestrator::new(&d, &mut manifest, DEPLOYER, "mainnet")
            .deploy_all(&factory, &plan)
            .await
            .unwrap();

        assert_eq!(d.chain().sent_transactions().len(), sent);
        assert_eq!(report.total_gas_used(), 0);
        assert!(report
            .outcomes
            .iter()
            .all(|o| o.deploy == DeployAction::AlreadyDeployed));
        // roles are still checked for every command
        assert_eq!(d.chain().role_checks(), checks + 2);
        assert!(report.outcomes[1..]
            .iter()
            .all(|o| o.authorization == Some(AuthAction::AlreadyAuthorized)));
    }

    #[tokio::test]
    async fn test_failed_run_resumes() {
        let (d, factory) = setup().await;
        let plan = plan();
        let mut manifest = manifest_for(&plan, 1);

        // CCurve not yet enabled on this chain
        let mut curve = manifest.entry(ContractKind::CCurve).unwrap().clone();
        curve.supported_chains.clear();
        manifest.insert(ContractKind::CCurve, curve.clone());

        let err = Orchestrator::new(&d, &mut manifest, DEPLOYER, "mainnet")
            .deploy_all(&factory, &plan)
            .await
            .unwrap_err();
        match &err {
            DeployError::Step { contract, step, source } => {
                assert_eq!(*contract, ContractKind::CCurve);
                assert_eq!(*step, Step::Deploy);
                assert!(matches!(**source, DeployError::UnsupportedChain { chain_id: 1, .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().starts_with("CCurve: deploy step failed"));
        assert_eq!(d.chain().deploy_calls(), 2);
        assert!(manifest.deployed_address(ContractKind::CTokens, 1).is_some());

        curve.supported_chains.push(1);
        manifest.insert(ContractKind::CCurve, curve);

        let report = Orchestrator::new(&d, &mut manifest, DEPLOYER, "mainnet")
            .deploy_all(&factory, &plan)
            .await
            .unwrap();
        assert_eq!(report.deploy_transactions(), 1);
        assert_eq!(report.authorize_transactions(), 1);
        assert_eq!(d.chain().deploy_calls(), 3);
        assert_eq!(d.chain().grant_calls(), 2);
    }

    #[tokio::test]
    async fn test_hash_mismatch_halts_before_sending() {
        let (d, factory) = setup().await;
        let plan = plan();
        let mut manifest = manifest_for(&plan, 1);

        let mut tokens = manifest.entry(ContractKind::CTokens).unwrap().clone();
        tokens.init_code_hash = Some(keccak256(b"stale build"));
        manifest.insert(ContractKind::CTokens, tokens);

        let err = Orchestrator::new(&d, &mut manifest, DEPLOYER, "mainnet")
            .deploy_all(&factory, &plan)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DeployError::Step {
                contract: ContractKind::CTokens,
                step: Step::Deploy,
                ..
            }
        ));
        // only the invoker went out
        assert_eq!(d.chain().deploy_calls(), 1);
        assert_eq!(d.chain().grant_calls(), 0);
    }

    #[tokio::test]
    async fn test_authorize_failure_names_the_step() {
        let (d, factory) = setup().await;
        let plan = plan();
        let mut manifest = manifest_for(&plan, 1);
        let stranger = address!("0000000000000000000000000000000000005a5a");

        let err = Orchestrator::new(&d, &mut manifest, stranger, "mainnet")
            .deploy_all(&factory, &plan)
            .await
            .unwrap_err();
        match err {
            DeployError::Step { contract, step, source } => {
                assert_eq!(contract, ContractKind::CTokens);
                assert_eq!(step, Step::Authorize);
                assert!(matches!(*source, DeployError::SignerMismatch { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_status_tracks_lifecycle() {
        let (d, factory) = setup().await;
        let plan = plan();
        let mut manifest = manifest_for(&plan, 1);

        let before = Orchestrator::new(&d, &mut manifest, DEPLOYER, "mainnet")
            .status(&factory, &plan)
            .await
            .unwrap();
        assert!(before.iter().all(|(_, _, state)| *state == ContractState::Unknown));

        let mut orchestrator = Orchestrator::new(&d, &mut manifest, DEPLOYER, "mainnet");
        orchestrator.deploy_all(&factory, &plan).await.unwrap();
        let after = orchestrator.status(&factory, &plan).await.unwrap();

        assert_eq!(after[0].2, ContractState::Deployed);
        assert!(after[1..].iter().all(|(_, _, state)| *state == ContractState::Authorized));
    }

    #[tokio::test]
    async fn test_onchain_revert_mid_batch_resumes() {
        let (d, factory) = setup().await;
        let plan = plan();
        let mut manifest = manifest_for(&plan, 1);

        // invoker and CTokens land, CCurve reverts
        d.chain().revert_deploys_after(Some(2));
        let err = Orchestrator::new(&d, &mut manifest, DEPLOYER, "mainnet")
            .deploy_all(&factory, &plan)
            .await
            .unwrap_err();
        match err {
            DeployError::Step { contract, step, source } => {
                assert_eq!(contract, ContractKind::CCurve);
                assert_eq!(step, Step::Deploy);
                assert!(matches!(*source, DeployError::TransactionReverted { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(d.chain().deploy_calls(), 3);
        assert_eq!(d.chain().grant_calls(), 1);
        assert!(manifest.deployed_address(ContractKind::CCurve, 1).is_none());

        d.chain().revert_deploys_after(None);
        let report = Orchestrator::new(&d, &mut manifest, DEPLOYER, "mainnet")
            .deploy_all(&factory, &plan)
            .await
            .unwrap();
        assert_eq!(report.deploy_transactions(), 1);
        assert_eq!(report.authorize_transactions(), 1);
        assert_eq!(d.chain().deploy_calls(), 4);
        assert_eq!(d.chain().grant_calls(), 2);
        assert!(manifest.deployed_address(ContractKind::CCurve, 1).is_some());
    }

    #[tokio::test]
    async fn test_pinned_invoker_is_used_for_roles() {
        let (d, factory) = setup().await;
        let plan = plan();
        let mut manifest = manifest_for(&plan, 1);

        let pinned = address!("00000000000000000000000000000000000aaaaa");
        d.chain().set_code(pinned, Bytes::from_static(&[0x60, 0x00]));
        let predicted = d.predict_address(&factory, &plan.invoker().init_code());

        let report = Orchestrator::new(&d, &mut manifest, DEPLOYER, "mainnet")
            .with_pinned_invoker(Some(pinned))
            .deploy_all(&factory, &plan)
            .await
            .unwrap();

        assert_eq!(report.address_of(ContractKind::Invoker), Some(pinned));
        assert_eq!(report.outcomes[0].deploy, DeployAction::AlreadyDeployed);
        assert_eq!(manifest.deployed_address(ContractKind::Invoker, 1), Some(pinned));
        // only the two commands went through the registry
        assert_eq!(d.chain().deploy_calls(), 2);
        assert!(!d.chain().has_code(predicted).await.unwrap());

        let tokens = report.address_of(ContractKind::CTokens).unwrap();
        assert!(d.has_command_role(pinned, tokens).await.unwrap());
        assert!(!d.has_command_role(predicted, tokens).await.unwrap());

        let states = Orchestrator::new(&d, &mut manifest, DEPLOYER, "mainnet")
            .with_pinned_invoker(Some(pinned))
            .status(&factory, &plan)
            .await
            .unwrap();
        assert_eq!(states[0], (ContractKind::Invoker, pinned, ContractState::Deployed));
        assert!(states[1..].iter().all(|(_, _, state)| *state == ContractState::Authorized));
    }

    #[tokio::test]
    async fn test_pinned_invoker_without_code_fails() {
        let (d, factory) = setup().await;
        let plan = plan();
        let mut manifest = manifest_for(&plan, 1);
        let pinned = address!("00000000000000000000000000000000000aaaaa");

        let err = Orchestrator::new(&d, &mut manifest, DEPLOYER, "mainnet")
            .with_pinned_invoker(Some(pinned))
            .deploy_all(&factory, &plan)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DeployError::Step {
                contract: ContractKind::Invoker,
                step: Step::Deploy,
                ..
            }
        ));
        assert_eq!(d.chain().deploy_calls(), 0);
    }

    #[tokio::test]
    async fn test_preexisting_code_is_skipped() {
        let (d, factory) = setup().await;
        let plan = plan();
        let mut manifest = manifest_for(&plan, 1);

        // invoker deployed by someone else earlier
        let invoker_code = plan.invoker().init_code();
        let invoker = d.predict_address(&factory, &invoker_code);
        d.chain().set_code(invoker, invoker_code);

        let report = Orchestrator::new(&d, &mut manifest, DEPLOYER, "mainnet")
            .deploy_all(&factory, &plan)
            .await
            .unwrap();
        assert_eq!(report.outcomes[0].deploy, DeployAction::AlreadyDeployed);
        assert_eq!(manifest.deployed_address(ContractKind::Invoker, 1), Some(invoker));
        assert_eq!(d.chain().deploy_calls(), 2);
    }
}
