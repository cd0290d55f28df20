//! Supported contracts
//!
//! Closed set of everything this tool knows how to deploy. Each kind knows
//! its compiled artifact name and how to build its constructor arguments from
//! the active network's metadata.

use alloy_primitives::Bytes;
use alloy_sol_types::SolValue;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DeployResult;
use crate::networks::{require, ChainMetadata};

/// Artifact name of the CREATE2 forwarder bootstrapped at `create1(deployer, 0)`.
pub const DEPLOY_REGISTRY_ARTIFACT: &str = "DeployRegistry";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ContractKind {
    /// The central access-controlled invoker. Never authorized, never hash-checked.
    Invoker,
    /// ERC20/ERC721/native transfers
    CTokens,
    /// Wrap/unwrap of the chain's native asset
    CWrap,
    CSwapUniswapV3,
    CLpUniswapV3,
    CCurve,
    CAaveV2,
    /// Anyswap/Multichain bridge router calls
    CMultichain,
}

impl ContractKind {
    /// Deployment order: invoker first, then commands.
    pub const ALL: [ContractKind; 8] = [
        ContractKind::Invoker,
        ContractKind::CTokens,
        ContractKind::CWrap,
        ContractKind::CSwapUniswapV3,
        ContractKind::CLpUniswapV3,
        ContractKind::CCurve,
        ContractKind::CAaveV2,
        ContractKind::CMultichain,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ContractKind::Invoker => "Invoker",
            ContractKind::CTokens => "CTokens",
            ContractKind::CWrap => "CWrap",
            ContractKind::CSwapUniswapV3 => "CSwapUniswapV3",
            ContractKind::CLpUniswapV3 => "CLPUniswapV3",
            ContractKind::CCurve => "CCurve",
            ContractKind::CAaveV2 => "CAaveV2",
            ContractKind::CMultichain => "CMultichain",
        }
    }

    /// Name of the compiled artifact holding this contract's creation bytecode.
    pub fn artifact_name(&self) -> &'static str {
        self.name()
    }

    pub fn is_invoker(&self) -> bool {
        matches!(self, ContractKind::Invoker)
    }

    /// Commands are everything the invoker delegate-calls into.
    pub fn is_command(&self) -> bool {
        !self.is_invoker()
    }

    /// ABI-encoded constructor arguments for `network`.
    pub fn constructor_args(&self, network: &str, meta: &ChainMetadata) -> DeployResult<Bytes> {
        let encoded = match self {
            ContractKind::Invoker
            | ContractKind::CTokens
            | ContractKind::CCurve
            | ContractKind::CMultichain => Vec::new(),
            ContractKind::CWrap => (meta.wrapped_native,).abi_encode_params(),
            ContractKind::CSwapUniswapV3 => {
                let router = require(network, "uniswap_v3_router", meta.uniswap_v3_router)?;
                (router, meta.wrapped_native).abi_encode_params()
            }
            ContractKind::CLpUniswapV3 => {
                let manager = require(
                    network,
                    "uniswap_v3_position_manager",
                    meta.uniswap_v3_position_manager,
                )?;
                (manager,).abi_encode_params()
            }
            ContractKind::CAaveV2 => {
                let pool = require(network, "aave_v2_lending_pool", meta.aave_v2_lending_pool)?;
                (pool,).abi_encode_params()
            }
        };
        Ok(Bytes::from(encoded))
    }
}

impl fmt::Display for ContractKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ContractKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ContractKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                let known: Vec<&str> = ContractKind::ALL.iter().map(|k| k.name()).collect();
                format!("unknown contract `{}` (known: {})", s, known.join(", "))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeployError;
    use alloy_primitives::{address, Address};

    fn mainnet() -> ChainMetadata {
        ChainMetadata {
            chain_id: 1,
            wrapped_native: address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"),
            uniswap_v3_router: Some(address!("E592427A0AEce92De3Edee1F18E0157C05861564")),
            uniswap_v3_position_manager: None,
            aave_v2_lending_pool: None,
            deploy_registry: None,
            invoker: None,
        }
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("cwrap".parse::<ContractKind>().unwrap(), ContractKind::CWrap);
        assert_eq!("CLPUniswapV3".parse::<ContractKind>().unwrap(), ContractKind::CLpUniswapV3);
        assert_eq!(" Invoker ".parse::<ContractKind>().unwrap(), ContractKind::Invoker);
        assert!("CSushiswap".parse::<ContractKind>().is_err());
    }

    #[test]
    fn test_invoker_comes_first() {
        assert!(ContractKind::ALL[0].is_invoker());
        assert!(ContractKind::ALL[1..].iter().all(|k| k.is_command()));
    }

    #[test]
    fn test_constructor_args_encoding() {
        let meta = mainnet();

        assert!(ContractKind::CTokens.constructor_args("mainnet", &meta).unwrap().is_empty());

        let wrap = ContractKind::CWrap.constructor_args("mainnet", &meta).unwrap();
        assert_eq!(wrap.len(), 32);
        assert_eq!(&wrap[12..], meta.wrapped_native.as_slice());

        let swap = ContractKind::CSwapUniswapV3.constructor_args("mainnet", &meta).unwrap();
        assert_eq!(swap.len(), 64);
        let (router, weth) = <(Address, Address)>::abi_decode_params(&swap).unwrap();
        assert_eq!(Some(router), meta.uniswap_v3_router);
        assert_eq!(weth, meta.wrapped_native);
    }

    #[test]
    fn test_missing_protocol_address() {
        let err = ContractKind::CAaveV2.constructor_args("mainnet", &mainnet()).unwrap_err();
        assert!(matches!(
            err,
            DeployError::MissingNetworkAddress { field: "aave_v2_lending_pool", .. }
        ));
    }
}
