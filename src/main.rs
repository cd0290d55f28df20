//! Invoker Deployer CLI
//!
//! Run with: cargo run -- <deploy|predict|status|hashes>
//!
//! Settings come from the environment / .env (see `Config::from_env`) or a
//! TOML file passed with `--config`.

use alloy_primitives::{Address, Bytes};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Result};
use console::style;
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use invoker_deployer::addresses::{checksum, create2_address, init_code_hash, ZERO_SALT};
use invoker_deployer::artifacts::ArtifactStore;
use invoker_deployer::config::Config;
use invoker_deployer::contracts::{ContractKind, DEPLOY_REGISTRY_ARTIFACT};
use invoker_deployer::deployer::{DeploymentPlan, DeterministicDeployer, Factory, Orchestrator};
use invoker_deployer::manifest::Manifest;
use invoker_deployer::networks::{ChainMetadata, NetworkResolver};
use invoker_deployer::{create1_address, RpcChain};

#[derive(Parser)]
#[command(name = "invoker-deploy", version, about = "Deterministic deployment of the Invoker contract suite")]
struct Cli {
    /// TOML config file (defaults to environment variables)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the configured network
    #[arg(long, global = true)]
    network: Option<String>,

    /// Restrict to these contracts (comma separated); the Invoker is always included
    #[arg(long, global = true, value_delimiter = ',')]
    contracts: Vec<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Deploy missing contracts and authorize commands
    Deploy {
        /// Deploy the registry if it is missing
        #[arg(long)]
        bootstrap: bool,
    },
    /// Print predicted addresses without touching the chain
    Predict,
    /// Show where each contract stands on chain
    Status,
    /// Compare local artifact hashes with the manifest
    Hashes,
}

fn print_banner() {
    println!();
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!(
        "{}",
        style(" 🏗️  INVOKER DEPLOYER - Deterministic CREATE2 Deployment").cyan().bold()
    );
    println!(
        "{}",
        style("    registry = create1(deployer, 0) | salt = 0x00..00").cyan()
    );
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!();
}

/// Inputs shared by every subcommand
struct Session {
    config: Config,
    manifest: Manifest,
    meta: ChainMetadata,
    artifacts: ArtifactStore,
}

impl Session {
    fn load(cli: &Cli) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) => Config::from_file(path)?,
            None => Config::from_env()?,
        };
        if let Some(network) = &cli.network {
            config.network = network.clone();
        }
        if !cli.contracts.is_empty() {
            config.contracts = cli.contracts.clone();
        }

        let manifest = Manifest::from_file(&config.manifest_path)
            .map_err(|e| eyre!("Failed to load manifest {}: {}", config.manifest_path, e))?;
        let networks = NetworkResolver::from_file(&config.networks_path)
            .map_err(|e| eyre!("Failed to load networks {}: {}", config.networks_path, e))?;
        let meta = networks.resolve(&config.network)?.clone();
        let artifacts = ArtifactStore::new(&config.artifacts_dir);

        Ok(Self {
            config,
            manifest,
            meta,
            artifacts,
        })
    }

    fn plan(&mut self) -> Result<DeploymentPlan> {
        let kinds = self.config.contract_kinds()?;
        Ok(DeploymentPlan::build(
            &kinds,
            &self.config.network,
            &self.meta,
            &mut self.artifacts,
        )?)
    }

    async fn connect(&self, signer: Option<alloy_signer_local::PrivateKeySigner>) -> Result<RpcChain> {
        use invoker_deployer::ChainClient;

        let chain = RpcChain::connect(&self.config.rpc_url, signer).await?;
        if chain.chain_id() != self.meta.chain_id {
            return Err(eyre!(
                "RPC is on chain {} but network `{}` is chain {}",
                chain.chain_id(),
                self.config.network,
                self.meta.chain_id
            ));
        }
        Ok(chain)
    }

    fn registry_address(&self, deployer_identity: Address) -> Address {
        self.meta
            .deploy_registry
            .unwrap_or_else(|| create1_address(deployer_identity, 0))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("invoker_deployer=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    print_banner();

    let mut session = Session::load(&cli)?;
    session.config.validate()?;

    match cli.command {
        Command::Deploy { bootstrap } => {
            if bootstrap {
                session.config.allow_factory_bootstrap = true;
            }
            deploy(&mut session).await
        }
        Command::Predict => predict(&mut session),
        Command::Status => status(&mut session).await,
        Command::Hashes => hashes(&mut session),
    }
}

// ============================================
// SUBCOMMANDS
// ============================================

async fn deploy(session: &mut Session) -> Result<()> {
    session.config.print_summary();

    let signer = session
        .config
        .signer()?
        .ok_or_else(|| eyre!("deploy needs DEPLOYER_PRIVATE_KEY"))?;
    let deployer_identity = session.config.deployer_identity(Some(&signer))?;
    let trusted_identity = session.config.trusted_identity(Some(&signer))?;

    let plan = session.plan()?;
    let registry_bytecode = if session.config.allow_factory_bootstrap {
        session.artifacts.bytecode(DEPLOY_REGISTRY_ARTIFACT)?
    } else {
        Bytes::new()
    };

    let chain = session.connect(Some(signer)).await?;
    let deployer = DeterministicDeployer::new(chain, registry_bytecode);

    let factory = match session.meta.deploy_registry {
        Some(address) => deployer.resolve_factory_at(address, trusted_identity).await?,
        None => {
            deployer
                .resolve_or_bootstrap_factory(
                    deployer_identity,
                    trusted_identity,
                    !session.config.allow_factory_bootstrap,
                )
                .await?
        }
    };

    let result = Orchestrator::new(
        &deployer,
        &mut session.manifest,
        trusted_identity,
        session.config.network.clone(),
    )
    .with_log(&session.config.deployment_log_path)
    .with_pinned_invoker(session.meta.invoker)
    .deploy_all(&factory, &plan)
    .await;

    // addresses recorded before a failure are kept
    if let Err(e) = session.manifest.save_to_file(&session.config.manifest_path) {
        warn!("Failed to save manifest {}: {}", session.config.manifest_path, e);
    }

    match result {
        Ok(report) => {
            report.print_summary();
            info!("Manifest updated: {}", session.config.manifest_path);
            Ok(())
        }
        Err(e) => {
            error!("❌ Deployment aborted: {}", e);
            println!("   💡 Fix the problem and re-run; completed steps are skipped.");
            Err(e.into())
        }
    }
}

fn predict(session: &mut Session) -> Result<()> {
    let signer = session.config.signer()?;
    let deployer_identity = session.config.deployer_identity(signer.as_ref())?;
    let registry = session.registry_address(deployer_identity);
    let plan = session.plan()?;

    println!("📍 PREDICTED ADDRESSES ({})", session.config.network);
    println!("   Deployer:  {}", checksum(&deployer_identity));
    println!("   Registry:  {}", checksum(&registry));
    println!();
    for planned in plan.contracts() {
        let address = create2_address(registry, ZERO_SALT, init_code_hash(&planned.init_code()));
        println!("   {:<16} {}", planned.kind.name(), checksum(&address));
    }
    println!();
    Ok(())
}

async fn status(session: &mut Session) -> Result<()> {
    let signer = session.config.signer()?;
    let deployer_identity = session.config.deployer_identity(signer.as_ref())?;
    let trusted_identity = session.config.trusted_identity(signer.as_ref())?;
    let plan = session.plan()?;

    // read-only: never sign anything from here
    let chain = session.connect(None).await?;
    let deployer = DeterministicDeployer::new(chain, Bytes::new());

    let registry = session.registry_address(deployer_identity);
    let factory = match deployer.resolve_factory_at(registry, trusted_identity).await {
        Ok(factory) => factory,
        Err(e) if e.is_registry_missing() => {
            println!("   ❌ {}", e);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let states = Orchestrator::new(
        &deployer,
        &mut session.manifest,
        trusted_identity,
        session.config.network.clone(),
    )
    .with_pinned_invoker(session.meta.invoker)
    .status(&factory, &plan)
    .await?;

    print_states(&factory, &states);
    Ok(())
}

fn print_states(factory: &Factory, states: &[(ContractKind, Address, invoker_deployer::ContractState)]) {
    println!("📋 CONTRACT STATUS (registry {})", checksum(&factory.address));
    for (kind, address, state) in states {
        let state = match state {
            invoker_deployer::ContractState::Unknown => style(state.to_string()).red(),
            invoker_deployer::ContractState::Deployed => style(state.to_string()).yellow(),
            invoker_deployer::ContractState::Authorized => style(state.to_string()).green(),
        };
        println!("   {:<16} {} {}", kind.name(), checksum(address), state);
    }
    println!();
}

fn hashes(session: &mut Session) -> Result<()> {
    println!("🔍 INIT CODE HASHES ({})", session.artifacts.dir().display());

    let mut mismatches = 0;
    for kind in session.config.contract_kinds()? {
        let bytecode = match session.artifacts.bytecode(kind.artifact_name()) {
            Ok(code) => code,
            Err(e) => {
                println!("   ⚠️  {:<16} {}", kind.name(), e);
                continue;
            }
        };
        let actual = init_code_hash(&bytecode);

        let verdict = match session.manifest.expected_init_code_hash(kind) {
            Ok(Some(expected)) if expected == actual => style("match".to_string()).green(),
            Ok(Some(expected)) => {
                mismatches += 1;
                style(format!("MISMATCH (manifest {})", expected)).red()
            }
            Ok(None) => style("not checked".to_string()).dim(),
            Err(e) => {
                mismatches += 1;
                style(e.to_string()).red()
            }
        };
        println!("   {:<16} {} {}", kind.name(), actual, verdict);
    }
    println!();

    if mismatches > 0 {
        return Err(eyre!("{} contract(s) do not match the manifest", mismatches));
    }
    Ok(())
}
