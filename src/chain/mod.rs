//! On-chain RPC boundary
//!
//! Everything the deployer needs from a node: code lookups, nonces, `eth_call`
//! and "send one transaction and wait for its receipt". Writes are awaited one
//! at a time from a single signer, so nonce ordering is left to the provider's
//! nonce filler.

#[cfg(test)]
pub(crate) mod mock;

use alloy_network::{EthereumWallet, TransactionBuilder};
use alloy_primitives::{Address, Bytes, Log, B256};
use alloy_provider::{DynProvider, Provider, ProviderBuilder};
use alloy_rpc_types::TransactionRequest;
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use alloy_transport_http::reqwest::Url;
use tracing::{debug, info};

use crate::error::{DeployError, DeployResult};

/// A single write the deployer wants confirmed on chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainTx {
    /// Plain CREATE from the signer
    Create { init_code: Bytes },
    /// Message call (factory deploys, role grants)
    Call { to: Address, data: Bytes },
}

/// Receipt fields the deployer cares about.
#[derive(Debug, Clone)]
pub struct TxOutcome {
    pub tx_hash: B256,
    pub success: bool,
    pub gas_used: u64,
    pub contract_address: Option<Address>,
    pub logs: Vec<Log>,
}

#[allow(async_fn_in_trait)]
pub trait ChainClient {
    fn chain_id(&self) -> u64;

    /// Account transactions are signed with. `None` means read-only.
    fn sender(&self) -> Option<Address>;

    async fn code_at(&self, address: Address) -> DeployResult<Bytes>;

    async fn nonce_of(&self, address: Address) -> DeployResult<u64>;

    async fn call(&self, to: Address, data: Bytes) -> DeployResult<Bytes>;

    /// Submit and block until the receipt is available.
    async fn send(&self, tx: ChainTx) -> DeployResult<TxOutcome>;

    async fn has_code(&self, address: Address) -> DeployResult<bool> {
        Ok(!self.code_at(address).await?.is_empty())
    }
}

// ============================================
// ALLOY HTTP CLIENT
// ============================================

pub struct RpcChain {
    provider: DynProvider,
    sender: Option<Address>,
    chain_id: u64,
}

impl RpcChain {
    /// Connect over HTTP. Without a signer the client is read-only.
    pub async fn connect(rpc_url: &str, signer: Option<PrivateKeySigner>) -> DeployResult<Self> {
        let url = rpc_url
            .parse::<Url>()
            .map_err(|_| DeployError::InvalidRpcUrl(rpc_url.to_string()))?;

        let sender = signer.as_ref().map(|s| s.address());
        let provider = match signer {
            Some(signer) => ProviderBuilder::new()
                .wallet(EthereumWallet::from(signer))
                .connect_http(url)
                .erased(),
            None => ProviderBuilder::new().connect_http(url).erased(),
        };

        let chain_id = provider.get_chain_id().await?;
        info!(
            "✓ Connected to chain {} ({})",
            chain_id,
            sender.map_or_else(|| "read-only".to_string(), |s| format!("signer {}", s))
        );

        Ok(Self { provider, sender, chain_id })
    }
}

impl ChainClient for RpcChain {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn sender(&self) -> Option<Address> {
        self.sender
    }

    async fn code_at(&self, address: Address) -> DeployResult<Bytes> {
        Ok(self.provider.get_code_at(address).await?)
    }

    async fn nonce_of(&self, address: Address) -> DeployResult<u64> {
        Ok(self.provider.get_transaction_count(address).await?)
    }

    async fn call(&self, to: Address, data: Bytes) -> DeployResult<Bytes> {
        let tx = TransactionRequest::default().with_to(to).with_input(data);
        Ok(self.provider.call(tx).await?)
    }

    async fn send(&self, tx: ChainTx) -> DeployResult<TxOutcome> {
        let from = self.sender.ok_or(DeployError::NoSigner)?;

        let request = match tx {
            ChainTx::Create { init_code } => TransactionRequest::default()
                .with_from(from)
                .with_deploy_code(init_code),
            ChainTx::Call { to, data } => TransactionRequest::default()
                .with_from(from)
                .with_to(to)
                .with_input(data),
        };

        let pending = self.provider.send_transaction(request).await?;
        debug!("Submitted transaction {}", pending.tx_hash());
        let receipt = pending.get_receipt().await?;

        Ok(TxOutcome {
            tx_hash: receipt.transaction_hash,
            success: receipt.status(),
            gas_used: receipt.gas_used,
            contract_address: receipt.contract_address,
            logs: receipt
                .inner
                .logs()
                .iter()
                .map(|log| log.inner.clone())
                .collect(),
        })
    }
}
