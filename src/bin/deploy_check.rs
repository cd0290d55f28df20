//! Deployment Check Utility
//!
//! Run with: cargo run --bin deploy-check
//!
//! Verifies keys, input files, artifacts and the deploy registry before a
//! real deployment. Never sends a transaction.

use alloy_primitives::Address;
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use std::process::ExitCode;

use invoker_deployer::artifacts::ArtifactStore;
use invoker_deployer::config::Config;
use invoker_deployer::contracts::{ContractKind, DEPLOY_REGISTRY_ARTIFACT};
use invoker_deployer::manifest::Manifest;
use invoker_deployer::networks::{ChainMetadata, NetworkResolver};
use invoker_deployer::{create1_address, init_code_hash, ChainClient, RpcChain};

#[tokio::main]
async fn main() -> ExitCode {
    println!();
    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║            INVOKER DEPLOYMENT PREFLIGHT CHECK              ║");
    println!("╚════════════════════════════════════════════════════════════╝");
    println!();

    let mut issues: Vec<String> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            println!("❌ Could not read configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = config.validate() {
        issues.push(format!("Configuration invalid: {}", e));
        println!("   ❌ Configuration: {}", e);
        println!();
    }

    // ==========================================
    // CHECK 1: Signer
    // ==========================================
    println!("🔐 CHECKING DEPLOYER KEY...");

    let signer: Option<PrivateKeySigner> = match config.signer() {
        Ok(Some(signer)) => {
            println!("   ✅ DEPLOYER_PRIVATE_KEY: {}", signer.address());
            Some(signer)
        }
        Ok(None) => {
            warnings.push("DEPLOYER_PRIVATE_KEY not set (read-only)".to_string());
            println!("   ⚠️  DEPLOYER_PRIVATE_KEY: Not set, only predict/status will work");
            None
        }
        Err(e) => {
            issues.push(e.to_string());
            println!("   ❌ {}", e);
            None
        }
    };

    let deployer_identity = match config.deployer_identity(signer.as_ref()) {
        Ok(addr) => {
            println!("   ✅ Registry deployer: {}", addr);
            Some(addr)
        }
        Err(e) => {
            issues.push(e.to_string());
            println!("   ❌ {}", e);
            None
        }
    };
    match config.trusted_identity(signer.as_ref()) {
        Ok(addr) => {
            println!("   ✅ Trusted account: {}", addr);
            if let Some(signer) = &signer {
                if signer.address() != addr {
                    warnings.push("Signer is not the trusted account".to_string());
                    println!("   ⚠️  Signer {} cannot authorize commands", signer.address());
                }
            }
        }
        Err(e) => {
            issues.push(e.to_string());
            println!("   ❌ {}", e);
        }
    }
    println!();

    // ==========================================
    // CHECK 2: Manifest & Networks
    // ==========================================
    println!("📜 CHECKING MANIFEST & NETWORKS...");

    let manifest = match Manifest::from_file(&config.manifest_path) {
        Ok(manifest) => {
            println!("   ✅ Manifest: {} ({} entries)", config.manifest_path, manifest.contracts().count());
            Some(manifest)
        }
        Err(e) => {
            issues.push(format!("Manifest unreadable: {}", e));
            println!("   ❌ Manifest {}: {}", config.manifest_path, e);
            None
        }
    };

    let networks = NetworkResolver::from_file(&config.networks_path);
    let meta: Option<ChainMetadata> = match networks
        .as_ref()
        .map_err(|e| e.to_string())
        .and_then(|networks| networks.resolve(&config.network).cloned().map_err(|e| e.to_string()))
    {
        Ok(meta) => {
            println!("   ✅ Network `{}`: chain {}", config.network, meta.chain_id);
            Some(meta)
        }
        Err(e) => {
            issues.push(format!("Network unresolved: {}", e));
            println!("   ❌ Network `{}`: {}", config.network, e);
            None
        }
    };
    println!();

    // ==========================================
    // CHECK 3: Artifacts
    // ==========================================
    println!("📦 CHECKING ARTIFACTS...");

    let kinds = config.contract_kinds().unwrap_or_else(|_| ContractKind::ALL.to_vec());
    let mut artifacts = ArtifactStore::new(&config.artifacts_dir);

    for kind in kinds {
        match artifacts.bytecode(kind.artifact_name()) {
            Ok(code) => {
                let actual = init_code_hash(&code);
                let expected = manifest.as_ref().map(|m| m.expected_init_code_hash(kind));
                match expected {
                    Some(Ok(Some(hash))) if hash == actual => {
                        println!("   ✅ {:<16} hash matches manifest", kind.name())
                    }
                    Some(Ok(Some(hash))) => {
                        issues.push(format!("{} bytecode does not match manifest", kind));
                        println!("   ❌ {:<16} {} != manifest {}", kind.name(), actual, hash);
                    }
                    Some(Ok(None)) => println!("   ✅ {:<16} loaded (not hash checked)", kind.name()),
                    Some(Err(e)) => {
                        issues.push(e.to_string());
                        println!("   ❌ {:<16} {}", kind.name(), e);
                    }
                    None => println!("   ⚠️  {:<16} loaded, no manifest to compare", kind.name()),
                }

                if let (Some(manifest), Some(meta)) = (&manifest, &meta) {
                    if manifest.ensure_supported(kind, meta.chain_id).is_err() {
                        warnings.push(format!("{} not enabled on chain {}", kind, meta.chain_id));
                        println!("      ⚠️  not marked as supported on chain {}", meta.chain_id);
                    }
                }
            }
            Err(e) => {
                issues.push(format!("{} artifact: {}", kind, e));
                println!("   ❌ {:<16} {}", kind.name(), e);
            }
        }
    }

    if config.allow_factory_bootstrap {
        match artifacts.bytecode(DEPLOY_REGISTRY_ARTIFACT) {
            Ok(_) => println!("   ✅ {:<16} loaded", DEPLOY_REGISTRY_ARTIFACT),
            Err(e) => {
                issues.push(format!("Registry artifact: {}", e));
                println!("   ❌ {:<16} {}", DEPLOY_REGISTRY_ARTIFACT, e);
            }
        }
    }
    println!();

    // ==========================================
    // CHECK 4: RPC & Registry
    // ==========================================
    println!("📡 CHECKING RPC & DEPLOY REGISTRY...");

    match RpcChain::connect(&config.rpc_url, None).await {
        Ok(chain) => {
            println!("   ✅ RPC connected, chain {}", chain.chain_id());
            if let Some(meta) = &meta {
                if meta.chain_id != chain.chain_id() {
                    issues.push(format!(
                        "RPC chain {} does not match network chain {}",
                        chain.chain_id(),
                        meta.chain_id
                    ));
                    println!("   ❌ Network `{}` expects chain {}", config.network, meta.chain_id);
                    if let Some((name, _)) = networks
                        .as_ref()
                        .ok()
                        .and_then(|n| n.by_chain_id(chain.chain_id()))
                    {
                        println!("   💡 The RPC looks like network `{}`", name);
                    }
                }
                if let Some(invoker) = meta.invoker {
                    match chain.has_code(invoker).await {
                        Ok(true) => println!("   ✅ Pinned invoker: {} (code exists)", invoker),
                        Ok(false) => {
                            issues.push(format!("Pinned invoker {} has no code", invoker));
                            println!("   ❌ Pinned invoker: {} (NO CODE)", invoker);
                        }
                        Err(e) => {
                            warnings.push(format!("Could not verify pinned invoker: {}", e));
                            println!("   ⚠️  Pinned invoker: {} (verification failed)", invoker);
                        }
                    }
                }
            }

            let registry: Option<Address> = meta
                .as_ref()
                .and_then(|m| m.deploy_registry)
                .or_else(|| deployer_identity.map(|d| create1_address(d, 0)));

            if let Some(registry) = registry {
                check_registry(&chain, &config, registry, deployer_identity, &mut issues, &mut warnings)
                    .await;
            }
        }
        Err(e) => {
            issues.push(format!("RPC connection failed: {}", e));
            println!("   ❌ RPC connection failed: {}", e);
        }
    }
    println!();

    // ==========================================
    // SUMMARY
    // ==========================================
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();

    let ready = issues.is_empty();
    if ready && warnings.is_empty() {
        println!("✅ ALL CHECKS PASSED!");
        println!();
        println!("   Run: cargo run -- deploy");
    } else if ready {
        println!("⚠️  READY WITH WARNINGS ({} warnings)", warnings.len());
        println!();
        for w in &warnings {
            println!("   • {}", w);
        }
    } else {
        println!("❌ NOT READY ({} issues, {} warnings)", issues.len(), warnings.len());
        println!();
        println!("   MUST FIX:");
        for i in &issues {
            println!("   • {}", i);
        }
        if !warnings.is_empty() {
            println!();
            println!("   WARNINGS:");
            for w in &warnings {
                println!("   • {}", w);
            }
        }
    }

    println!();
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();

    if ready {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

async fn check_registry(
    chain: &RpcChain,
    config: &Config,
    registry: Address,
    deployer_identity: Option<Address>,
    issues: &mut Vec<String>,
    warnings: &mut Vec<String>,
) {
    match chain.has_code(registry).await {
        Ok(true) => println!("   ✅ Deploy registry: {} (code exists)", registry),
        Ok(false) if !config.allow_factory_bootstrap => {
            issues.push(format!("No deploy registry at {} and bootstrap disabled", registry));
            println!("   ❌ Deploy registry: {} (NO CODE)", registry);
            println!("   💡 Set ALLOW_FACTORY_BOOTSTRAP=true to create it");
        }
        Ok(false) => {
            println!("   ⚠️  Deploy registry: {} (will be bootstrapped)", registry);
            let Some(deployer) = deployer_identity else {
                return;
            };
            match chain.nonce_of(deployer).await {
                Ok(0) => println!("   ✅ Deployer nonce is 0"),
                Ok(nonce) => {
                    issues.push(format!(
                        "Deployer {} is at nonce {}; the registry can no longer land at {}",
                        deployer, nonce, registry
                    ));
                    println!("   ❌ Deployer nonce is {} (must be 0)", nonce);
                }
                Err(e) => {
                    warnings.push(format!("Could not read deployer nonce: {}", e));
                    println!("   ⚠️  Could not read deployer nonce: {}", e);
                }
            }
        }
        Err(e) => {
            warnings.push(format!("Could not verify registry: {}", e));
            println!("   ⚠️  Deploy registry: {} (verification failed)", registry);
        }
    }
}
