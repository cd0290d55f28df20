//! Address derivation primitives
//!
//! Offline reproductions of the two EVM contract-creation formulas:
//! - CREATE:  `keccak256(rlp([sender, nonce]))[12..]`
//! - CREATE2: `keccak256(0xff ++ sender ++ salt ++ keccak256(init_code))[12..]` (EIP-1014)
//!
//! Both are pure. Only the slice/string entry points can fail.

use alloy_primitives::{keccak256, Address, B256};
use alloy_rlp::{Encodable, Header};

use crate::error::{DeployError, DeployResult};

/// Salt used for every deployment through the registry.
pub const ZERO_SALT: B256 = B256::ZERO;

const ADDRESS_LEN: usize = 20;
const WORD_LEN: usize = 32;

// ============================================
// CREATE / CREATE2
// ============================================

/// Address of the `nonce`-th contract created by `deployer` with CREATE.
pub fn create1_address(deployer: Address, nonce: u64) -> Address {
    let sender = deployer.as_slice();
    let payload_length = sender.length() + nonce.length();

    let mut out = Vec::with_capacity(payload_length + 1);
    Header { list: true, payload_length }.encode(&mut out);
    sender.encode(&mut out);
    nonce.encode(&mut out);

    Address::from_word(keccak256(&out))
}

/// Address CREATE2 assigns for `factory`, `salt` and the hash of the full init code.
pub fn create2_address(factory: Address, salt: B256, init_code_hash: B256) -> Address {
    let mut preimage = [0u8; 1 + ADDRESS_LEN + WORD_LEN + WORD_LEN];
    preimage[0] = 0xff;
    preimage[1..21].copy_from_slice(factory.as_slice());
    preimage[21..53].copy_from_slice(salt.as_slice());
    preimage[53..85].copy_from_slice(init_code_hash.as_slice());

    Address::from_word(keccak256(preimage))
}

/// Keccak-256 of creation bytecode.
pub fn init_code_hash(init_code: &[u8]) -> B256 {
    keccak256(init_code)
}

// ============================================
// VALIDATING ENTRY POINTS
// ============================================

/// [`create1_address`] over raw deployer bytes.
pub fn create1_address_from_slice(deployer: &[u8], nonce: u64) -> DeployResult<Address> {
    let deployer = address_from_slice(deployer)?;
    Ok(create1_address(deployer, nonce))
}

/// [`create2_address`] over raw byte slices, rejecting malformed lengths.
pub fn create2_address_from_slices(
    factory: &[u8],
    salt: &[u8],
    init_code_hash: &[u8],
) -> DeployResult<Address> {
    let factory = address_from_slice(factory)?;
    let salt = word_from_slice("salt", salt)?;
    let init_code_hash = word_from_slice("init code hash", init_code_hash)?;
    Ok(create2_address(factory, salt, init_code_hash))
}

/// Parse a `0x`-prefixed (or bare) hex address. Any letter case is accepted.
pub fn parse_address(input: &str) -> DeployResult<Address> {
    let bytes = decode_hex(input)?;
    if bytes.len() != ADDRESS_LEN {
        return Err(DeployError::InvalidAddressFormat {
            input: input.to_string(),
            reason: format!("expected {} bytes, got {}", ADDRESS_LEN, bytes.len()),
        });
    }
    Ok(Address::from_slice(&bytes))
}

/// Parse a 32-byte hex word (hashes, salts).
pub fn parse_b256(input: &str) -> DeployResult<B256> {
    let bytes = decode_hex(input)?;
    word_from_slice("hash", &bytes)
}

/// EIP-55 checksummed rendering.
pub fn checksum(address: &Address) -> String {
    address.to_checksum(None)
}

fn decode_hex(input: &str) -> DeployResult<Vec<u8>> {
    let digits = input.trim();
    let digits = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
        .unwrap_or(digits);

    if digits.len() % 2 != 0 {
        return Err(DeployError::InvalidAddressFormat {
            input: input.to_string(),
            reason: "odd number of hex digits".to_string(),
        });
    }

    hex::decode(digits).map_err(|e| DeployError::InvalidAddressFormat {
        input: input.to_string(),
        reason: e.to_string(),
    })
}

fn address_from_slice(bytes: &[u8]) -> DeployResult<Address> {
    if bytes.len() != ADDRESS_LEN {
        return Err(DeployError::InvalidAddressFormat {
            input: format!("0x{}", hex::encode(bytes)),
            reason: format!("expected {} bytes, got {}", ADDRESS_LEN, bytes.len()),
        });
    }
    Ok(Address::from_slice(bytes))
}

fn word_from_slice(field: &'static str, bytes: &[u8]) -> DeployResult<B256> {
    if bytes.len() != WORD_LEN {
        return Err(DeployError::InvalidInputLength {
            field,
            expected: WORD_LEN,
            actual: bytes.len(),
        });
    }
    Ok(B256::from_slice(bytes))
}
