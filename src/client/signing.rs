//! Exchange action signing
//!
//! Signed actions authenticate as an EIP-712 `Agent` struct: the action
//! payload is keccak-hashed together with the request nonce (and optional
//! vault address) into a connection id, and the agent struct over that id
//! is signed with the configured key using recoverable ECDSA.

use ethers::abi::{encode, Token};
use ethers::core::utils::keccak256;
use ethers::types::{Address, H256, U256};
use ethers::signers::{LocalWallet, Signer};

use super::error::{ClientError, ClientResult};
use crate::config::Network;

// =============================================================================
// EIP-712 domain constants
// =============================================================================

const DOMAIN_NAME: &str = "Exchange";
const DOMAIN_VERSION: &str = "1";
const DOMAIN_CHAIN_ID: u64 = 1337;

// =============================================================================
// Action hashing
// =============================================================================

/// Hash an action payload into the 32-byte connection id.
///
/// The digest commits to the serialized action, the millisecond nonce
/// (big-endian) and, when trading for a vault, the vault address. A replayed
/// or tampered request fails signature verification.
pub fn action_hash(
    action: &serde_json::Value,
    vault_address: Option<&str>,
    nonce: u64,
) -> ClientResult<[u8; 32]> {
    let mut bytes = serde_json::to_vec(action)
        .map_err(|e| ClientError::Validation(format!("Unserializable action: {}", e)))?;
    bytes.extend_from_slice(&nonce.to_be_bytes());
    match vault_address {
        None => bytes.push(0x00),
        Some(vault) => {
            bytes.push(0x01);
            let vault_bytes = hex::decode(vault.trim_start_matches("0x"))
                .map_err(|e| ClientError::Validation(format!("Invalid vault address: {}", e)))?;
            bytes.extend_from_slice(&vault_bytes);
        }
    }
    Ok(keccak256(&bytes))
}

// =============================================================================
// EIP-712 Agent signature
// =============================================================================

fn domain_separator() -> [u8; 32] {
    let domain_type_hash = keccak256(
        "EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)",
    );
    let encoded = encode(&[
        Token::FixedBytes(domain_type_hash.to_vec()),
        Token::FixedBytes(keccak256(DOMAIN_NAME).to_vec()),
        Token::FixedBytes(keccak256(DOMAIN_VERSION).to_vec()),
        Token::Uint(U256::from(DOMAIN_CHAIN_ID)),
        Token::Address(Address::zero()),
    ]);
    keccak256(&encoded)
}

fn agent_struct_hash(source: &str, connection_id: [u8; 32]) -> [u8; 32] {
    let type_hash = keccak256("Agent(string source,bytes32 connectionId)");
    let encoded = encode(&[
        Token::FixedBytes(type_hash.to_vec()),
        Token::FixedBytes(keccak256(source).to_vec()),
        Token::FixedBytes(connection_id.to_vec()),
    ]);
    keccak256(&encoded)
}

/// Sign an action for the `/exchange` endpoint.
///
/// Returns the `{r, s, v}` signature object the wire format expects.
pub fn sign_l1_action(
    wallet: &LocalWallet,
    action: &serde_json::Value,
    vault_address: Option<&str>,
    nonce: u64,
    network: Network,
) -> ClientResult<serde_json::Value> {
    let connection_id = action_hash(action, vault_address, nonce)?;
    let struct_hash = agent_struct_hash(network.agent_source(), connection_id);

    let mut digest_input = Vec::with_capacity(2 + 32 + 32);
    digest_input.extend_from_slice(&[0x19, 0x01]);
    digest_input.extend_from_slice(&domain_separator());
    digest_input.extend_from_slice(&struct_hash);
    let digest = H256::from(keccak256(&digest_input));

    let signature = wallet
        .sign_hash(digest)
        .map_err(|e| ClientError::Auth(format!("Signing failed: {}", e)))?;

    Ok(serde_json::json!({
        "r": format!("{:#066x}", signature.r),
        "s": format!("{:#066x}", signature.s),
        "v": signature.v,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn wallet() -> LocalWallet {
        TEST_KEY.parse().unwrap()
    }

    fn sample_action() -> serde_json::Value {
        serde_json::json!({
            "type": "order",
            "orders": [{"a": 0, "b": true, "p": "96000", "s": "0.1", "r": false,
                        "t": {"limit": {"tif": "Gtc"}}}],
            "grouping": "na",
        })
    }

    #[test]
    fn test_action_hash_is_deterministic() {
        let a = action_hash(&sample_action(), None, 1_700_000_000_000).unwrap();
        let b = action_hash(&sample_action(), None, 1_700_000_000_000).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_action_hash_commits_to_nonce() {
        let a = action_hash(&sample_action(), None, 1).unwrap();
        let b = action_hash(&sample_action(), None, 2).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_action_hash_commits_to_vault() {
        let vault = "0x1111111111111111111111111111111111111111";
        let a = action_hash(&sample_action(), None, 1).unwrap();
        let b = action_hash(&sample_action(), Some(vault), 1).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_action_hash_bad_vault_fails() {
        let err = action_hash(&sample_action(), Some("0xzz"), 1).unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
    }

    #[test]
    fn test_signature_shape() {
        let sig = sign_l1_action(&wallet(), &sample_action(), None, 1, Network::Mainnet).unwrap();
        let r = sig["r"].as_str().unwrap();
        let s = sig["s"].as_str().unwrap();
        assert!(r.starts_with("0x") && r.len() == 66, "r = {}", r);
        assert!(s.starts_with("0x") && s.len() == 66, "s = {}", s);
        let v = sig["v"].as_u64().unwrap();
        assert!(v == 27 || v == 28, "v = {}", v);
    }

    #[test]
    fn test_signature_recovers_to_signer() {
        use ethers::types::{Signature, U256 as EU256};

        let action = sample_action();
        let nonce = 42;
        let sig_json =
            sign_l1_action(&wallet(), &action, None, nonce, Network::Mainnet).unwrap();

        // Rebuild the digest and recover
        let connection_id = action_hash(&action, None, nonce).unwrap();
        let struct_hash = agent_struct_hash(Network::Mainnet.agent_source(), connection_id);
        let mut digest_input = vec![0x19, 0x01];
        digest_input.extend_from_slice(&domain_separator());
        digest_input.extend_from_slice(&struct_hash);
        let digest = H256::from(keccak256(&digest_input));

        let signature = Signature {
            r: EU256::from_str_radix(sig_json["r"].as_str().unwrap().trim_start_matches("0x"), 16)
                .unwrap(),
            s: EU256::from_str_radix(sig_json["s"].as_str().unwrap().trim_start_matches("0x"), 16)
                .unwrap(),
            v: sig_json["v"].as_u64().unwrap(),
        };
        let recovered = signature.recover(digest).unwrap();
        assert_eq!(recovered, wallet().address());
    }

    #[test]
    fn test_mainnet_and_testnet_signatures_differ() {
        let main = sign_l1_action(&wallet(), &sample_action(), None, 7, Network::Mainnet).unwrap();
        let test = sign_l1_action(&wallet(), &sample_action(), None, 7, Network::Testnet).unwrap();
        assert_ne!(main["r"], test["r"]);
    }
}
