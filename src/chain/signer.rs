//! Transaction signing for named accounts.
//!
//! Wraps alloy's [`PrivateKeySigner`]. Keys arrive as hex strings from the
//! configuration (`accounts.deployer_key` / `accounts.player_key` or their
//! env-var overrides). Decoded key bytes are zeroed after signer
//! construction so only alloy's internal representation remains.

use alloy::network::EthereumWallet;
use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use anyhow::{bail, Context, Result};
use tracing::debug;
use zeroize::{Zeroize, Zeroizing};

use crate::config::store::{AccountsConfig, NamedAccount};

// ---------------------------------------------------------------------------
// TransactionSigner
// ---------------------------------------------------------------------------

/// A transaction signer backed by a secp256k1 private key.
#[derive(Clone, Debug)]
pub struct TransactionSigner {
    signer: PrivateKeySigner,
}

impl TransactionSigner {
    /// Build the signer for one of the configured named accounts.
    pub fn for_account(accounts: &AccountsConfig, account: NamedAccount) -> Result<Self> {
        let key = accounts.key_for(account);
        if key.is_empty() {
            bail!(
                "no private key configured for the {account} account \
                 (set accounts.{account}_key or {})",
                account.key_env_var()
            );
        }

        let signer = Self::from_hex(&key)
            .with_context(|| format!("invalid private key for the {account} account"))?;

        debug!(%account, address = %signer.address(), "named account signer loaded");
        Ok(signer)
    }

    /// Build from a hex-encoded private key, with or without a `0x` prefix.
    pub fn from_hex(key_hex: &str) -> Result<Self> {
        let stripped = key_hex.trim().trim_start_matches("0x");
        let mut key_bytes =
            Zeroizing::new(hex::decode(stripped).context("private key is not valid hex")?);

        Self::from_bytes(&mut key_bytes)
    }

    /// Build from raw private key bytes (must be exactly 32 bytes).
    ///
    /// The input vector is zeroed after construction regardless of success or
    /// failure.
    pub fn from_bytes(key_bytes: &mut Vec<u8>) -> Result<Self> {
        let result = Self::from_bytes_inner(key_bytes);
        key_bytes.zeroize();
        result
    }

    fn from_bytes_inner(key_bytes: &[u8]) -> Result<Self> {
        if key_bytes.len() != 32 {
            bail!(
                "private key must be exactly 32 bytes, got {}",
                key_bytes.len()
            );
        }

        let mut key_array: [u8; 32] = key_bytes
            .try_into()
            .map_err(|_| anyhow::anyhow!("private key must be exactly 32 bytes"))?;

        let signer = PrivateKeySigner::from_bytes(&key_array.into())
            .context("failed to construct signer from private key bytes");
        key_array.zeroize();

        Ok(Self { signer: signer? })
    }

    /// Returns the address derived from the signing key.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Wrap the signer in a wallet suitable for a filling provider.
    pub fn wallet(&self) -> EthereumWallet {
        EthereumWallet::from(self.signer.clone())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
