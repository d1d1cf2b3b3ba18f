//! JSON-RPC chain client.
//!
//! Thin wrapper around an alloy HTTP provider. A client is either read-only
//! or bound to one named account's signer, in which case it can submit
//! transactions and hand out contract proxies that act as that account.

use std::time::Duration;

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use anyhow::{bail, Context, Result};
use tracing::{debug, info};

use crate::chain::signer::TransactionSigner;
use crate::config::store::{Config, NamedAccount};
use crate::market::remote::{RemoteMarketplace, RemoteNft};

/// Per-request HTTP timeout for the provider.
const HTTP_TIMEOUT_SECS: u64 = 30;

// ---------------------------------------------------------------------------
// ConfirmationPolicy
// ---------------------------------------------------------------------------

/// How long and how deep to wait after submitting a transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConfirmationPolicy {
    pub confirmations: u64,
    pub timeout: Duration,
}

impl ConfirmationPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            confirmations: config.network.block_confirmations.max(1),
            timeout: Duration::from_secs(config.network.confirmation_timeout_secs),
        }
    }
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            confirmations: 1,
            timeout: Duration::from_secs(60),
        }
    }
}

/// A contract created by [`ChainClient::deploy_contract`].
#[derive(Clone, Debug)]
pub struct DeployedContract {
    pub address: Address,
    pub tx_hash: B256,
    pub block_number: Option<u64>,
}

// ---------------------------------------------------------------------------
// ChainClient
// ---------------------------------------------------------------------------

/// Client for one network, optionally acting as one account.
pub struct ChainClient {
    provider: DynProvider,
    rpc_url: String,
    sender: Option<Address>,
    policy: ConfirmationPolicy,
}

fn parse_rpc_url(rpc_url: &str) -> Result<(reqwest::Url, reqwest::Client)> {
    let url: reqwest::Url = rpc_url
        .parse()
        .with_context(|| format!("invalid network endpoint: {rpc_url}"))?;

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .build()
        .context("failed to build HTTP client for chain provider")?;

    Ok((url, http_client))
}

impl ChainClient {
    /// Create a read-only client for the given RPC endpoint.
    ///
    /// No network call is made during construction; use
    /// [`is_connected`](Self::is_connected) to verify reachability.
    pub async fn new(rpc_url: &str) -> Result<Self> {
        debug!(rpc_url, "creating read-only chain client");

        let (url, http_client) = parse_rpc_url(rpc_url)?;
        let provider = ProviderBuilder::new()
            .connect_reqwest(http_client, url)
            .erased();

        Ok(Self {
            provider,
            rpc_url: rpc_url.to_string(),
            sender: None,
            policy: ConfirmationPolicy::default(),
        })
    }

    /// Create a client that signs with `signer`.
    pub async fn with_signer(
        rpc_url: &str,
        signer: &TransactionSigner,
        policy: ConfirmationPolicy,
    ) -> Result<Self> {
        debug!(rpc_url, sender = %signer.address(), "creating signing chain client");

        let (url, http_client) = parse_rpc_url(rpc_url)?;
        let provider = ProviderBuilder::new()
            .wallet(signer.wallet())
            .connect_reqwest(http_client, url)
            .erased();

        Ok(Self {
            provider,
            rpc_url: rpc_url.to_string(),
            sender: Some(signer.address()),
            policy,
        })
    }

    /// Create a client acting as one of the configured named accounts.
    pub async fn for_account(config: &Config, account: NamedAccount) -> Result<Self> {
        let signer = TransactionSigner::for_account(&config.accounts, account)?;
        Self::with_signer(
            &config.network.chain_rpc,
            &signer,
            ConfirmationPolicy::from_config(config),
        )
        .await
    }

    /// Create a read-only client from the loaded configuration.
    pub async fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.network.chain_rpc).await
    }

    /// The account transactions are sent from, if this client can sign.
    pub fn sender(&self) -> Option<Address> {
        self.sender
    }

    fn require_sender(&self) -> Result<Address> {
        self.sender
            .context("this chain client has no signing account")
    }

    pub fn policy(&self) -> ConfirmationPolicy {
        self.policy
    }

    pub fn provider(&self) -> &DynProvider {
        &self.provider
    }

    /// Get the native balance for an address, in wei.
    pub async fn get_eth_balance(&self, address: Address) -> Result<U256> {
        debug!(%address, "fetching balance");

        let balance = self
            .provider
            .get_balance(address)
            .await
            .context("unable to retrieve account balance, check your network connection")?;

        debug!(%address, %balance, "balance retrieved");
        Ok(balance)
    }

    /// Get the current block number from the network.
    pub async fn get_block_number(&self) -> Result<u64> {
        debug!("fetching current block number");

        let block_number = self
            .provider
            .get_block_number()
            .await
            .context("unable to reach the network, check your connection")?;

        debug!(block_number, "block number retrieved");
        Ok(block_number)
    }

    /// Get the chain id reported by the node.
    pub async fn get_chain_id(&self) -> Result<u64> {
        self.provider
            .get_chain_id()
            .await
            .context("unable to read chain id from the network")
    }

    /// Check whether the client can reach the network.
    pub async fn is_connected(&self) -> bool {
        let connected = self.get_block_number().await.is_ok();
        debug!(rpc_url = %self.rpc_url, connected, "connectivity check");
        connected
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    /// Send a contract-creation transaction and wait for it to be confirmed
    /// according to this client's [`ConfirmationPolicy`].
    pub async fn deploy_contract(&self, init_code: Bytes) -> Result<DeployedContract> {
        let sender = self.require_sender()?;
        debug!(%sender, code_len = init_code.len(), "sending deployment transaction");

        let tx = TransactionRequest::default()
            .with_from(sender)
            .with_deploy_code(init_code);

        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .context("failed to submit deployment transaction")?;

        let tx_hash = *pending.tx_hash();
        info!(%tx_hash, confirmations = self.policy.confirmations, "waiting for deployment");

        let receipt = pending
            .with_required_confirmations(self.policy.confirmations)
            .with_timeout(Some(self.policy.timeout))
            .get_receipt()
            .await
            .with_context(|| format!("deployment transaction {tx_hash} was not confirmed"))?;

        if !receipt.status() {
            bail!("deployment transaction {tx_hash} reverted");
        }

        let address = receipt
            .contract_address
            .with_context(|| format!("receipt for {tx_hash} has no contract address"))?;

        debug!(%address, %tx_hash, "contract deployed");
        Ok(DeployedContract {
            address,
            tx_hash,
            block_number: receipt.block_number,
        })
    }

    /// Marketplace proxy acting as this client's account.
    pub fn marketplace(&self, address: Address) -> Result<RemoteMarketplace> {
        let sender = self.require_sender()?;
        Ok(RemoteMarketplace::new(
            address,
            self.provider.clone(),
            sender,
            self.policy,
        ))
    }

    /// BasicNft proxy acting as this client's account.
    pub fn basic_nft(&self, address: Address) -> Result<RemoteNft> {
        let sender = self.require_sender()?;
        Ok(RemoteNft::new(
            address,
            self.provider.clone(),
            sender,
            self.policy,
        ))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn new_with_valid_url() {
        let client = ChainClient::new("http://127.0.0.1:8545").await.unwrap();
        assert_eq!(client.rpc_url(), "http://127.0.0.1:8545");
        assert_eq!(client.sender(), None);
    }

    #[tokio::test]
    async fn new_with_invalid_url() {
        assert!(ChainClient::new("not a url").await.is_err());
    }

    #[tokio::test]
    async fn read_only_client_cannot_hand_out_proxies() {
        let client = ChainClient::new("http://127.0.0.1:8545").await.unwrap();
        assert!(client.marketplace(Address::ZERO).is_err());
        assert!(client.basic_nft(Address::ZERO).is_err());
    }

    #[tokio::test]
    async fn for_account_uses_named_signer() {
        let config = Config::default();
        let client = ChainClient::for_account(&config, NamedAccount::Deployer)
            .await
            .unwrap();

        let expected: Address = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse().unwrap();
        assert_eq!(client.sender(), Some(expected));
        assert_eq!(client.policy().confirmations, 1);
    }

    #[test]
    fn policy_never_waits_for_zero_confirmations() {
        let mut config = Config::default();
        config.network.block_confirmations = 0;
        config.network.confirmation_timeout_secs = 5;

        let policy = ConfirmationPolicy::from_config(&config);
        assert_eq!(policy.confirmations, 1);
        assert_eq!(policy.timeout, Duration::from_secs(5));
    }
}
