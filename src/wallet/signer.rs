//! Secure wallet implementation
//!
//! SECURITY: This is the ONLY place where private keys exist.
//! - Keys are held in alloy's PrivateKeySigner which handles crypto securely
//! - The raw key string is wrapped in `SecretString` until parsed
//! - Keys are never serialized to JSON
//! - Keys are never logged

use crate::chain::{SignedTransaction, UnsignedTransaction};
use crate::{Error, Result};
use alloy::consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::primitives::{Address, TxKind};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use secrecy::{ExposeSecret, SecretString};

/// Secure wallet that protects private keys
///
/// The private key is:
/// - Stored in alloy's PrivateKeySigner (handles crypto securely)
/// - Never serialized (no Serialize impl)
/// - Only accessible via signing operations
pub struct SecureWallet {
    /// The signer
    signer: PrivateKeySigner,
    /// Public address (safe to expose)
    address: Address,
}

impl SecureWallet {
    /// Create a wallet from an environment variable
    ///
    /// # Arguments
    /// * `var_name` - Name of the environment variable containing the private key
    pub fn from_env(var_name: &str) -> Result<Self> {
        let key = std::env::var(var_name).map(SecretString::from).map_err(|_| {
            Error::Wallet(format!(
                "Environment variable {} not set. Required for wallet initialization.",
                var_name
            ))
        })?;

        Self::from_secret(&key)
    }

    /// Create a wallet from a secret hex-encoded private key
    pub fn from_secret(key: &SecretString) -> Result<Self> {
        Self::from_hex(key.expose_secret())
    }

    /// Create a wallet from a hex-encoded private key
    pub fn from_hex(key_hex: &str) -> Result<Self> {
        let key_hex = key_hex.trim();
        let key_hex = key_hex.strip_prefix("0x").unwrap_or(key_hex);

        // Parse errors never echo the input
        let signer: PrivateKeySigner = key_hex
            .parse()
            .map_err(|_| Error::Wallet("Invalid private key".to_string()))?;

        let address = signer.address();

        Ok(Self { signer, address })
    }

    /// Get the public address (safe to share)
    pub fn address(&self) -> Address {
        self.address
    }

    /// Get the address as a checksummed string
    pub fn address_string(&self) -> String {
        self.address.to_checksum(None)
    }

    /// Sign a legacy EIP-155 transaction.
    ///
    /// This is the ONLY way to use the private key.
    pub fn sign_transaction(&self, tx: UnsignedTransaction) -> Result<SignedTransaction> {
        let legacy = TxLegacy {
            chain_id: Some(tx.chain_id),
            nonce: tx.nonce,
            gas_price: tx.gas_price,
            gas_limit: tx.gas_limit,
            to: TxKind::Call(tx.to),
            value: tx.value,
            input: tx.input.clone(),
        };

        let signature = self
            .signer
            .sign_hash_sync(&legacy.signature_hash())
            .map_err(|e| Error::Wallet(format!("Signing failed: {}", e)))?;

        let signed = legacy.into_signed(signature);
        let hash = *signed.hash();
        let raw = TxEnvelope::Legacy(signed).encoded_2718();

        tracing::debug!(
            chain_id = tx.chain_id,
            nonce = tx.nonce,
            tx_hash = %hash,
            "Transaction signed"
        );

        Ok(SignedTransaction {
            hash,
            raw: raw.into(),
            tx,
        })
    }
}

// Implement Debug manually to avoid exposing the signer
impl std::fmt::Debug for SecureWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureWallet")
            .field("address", &self.address)
            .field("signer", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::eips::eip2718::Decodable2718;
    use alloy::primitives::{Bytes, U256};

    // Anvil account #0 (DO NOT use in production!)
    const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_wallet_from_hex() {
        let wallet = SecureWallet::from_hex(TEST_KEY).unwrap();

        assert_eq!(
            wallet.address_string().to_lowercase(),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
    }

    #[test]
    fn test_debug_redacts_key() {
        let wallet = SecureWallet::from_hex(TEST_KEY).unwrap();

        let debug_str = format!("{:?}", wallet);

        assert!(!debug_str.contains("ac0974bec"));
        assert!(debug_str.contains("[REDACTED]"));
    }

    #[test]
    fn test_invalid_key_error_hides_input() {
        let err = SecureWallet::from_hex("0xdeadbeef").unwrap_err();
        assert!(!err.to_string().contains("deadbeef"));
    }

    #[test]
    fn test_signed_transaction_decodes_as_legacy() {
        let wallet = SecureWallet::from_hex(TEST_KEY).unwrap();
        let signed = wallet
            .sign_transaction(UnsignedTransaction {
                chain_id: 8453,
                nonce: 7,
                to: Address::repeat_byte(0x42),
                value: U256::from(1_000u64),
                input: Bytes::new(),
                gas_limit: 21_000,
                gas_price: 1_000_000_000,
            })
            .unwrap();

        let envelope = TxEnvelope::decode_2718(&mut signed.raw.as_ref()).unwrap();
        assert_eq!(*envelope.tx_hash(), signed.hash);

        let legacy = envelope.as_legacy().unwrap();
        assert_eq!(legacy.tx().chain_id, Some(8453));
        assert_eq!(legacy.tx().nonce, 7);
    }
}
