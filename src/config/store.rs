//! Configuration store for the nftmarket harness.
//!
//! Manages reading and writing `~/.nftmarket/config.toml` (or the directory
//! named by `NFTMARKET_HOME`). Environment variable overrides are applied on
//! every `load()` call following the precedence chain:
//!
//!   config.toml < NFTMARKET_* / ETHERSCAN_API_KEY env vars < CLI flags
//!
//! CLI-flag overrides are handled at the command layer, not here.

use std::fmt;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::Zeroizing;

use crate::chain::types::Denomination;

// ---------------------------------------------------------------------------
// Config structs
// ---------------------------------------------------------------------------

/// Top-level configuration persisted in `config.toml`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub network: NetworkConfig,
    pub accounts: AccountsConfig,
    pub contracts: ContractsConfig,
    pub pricing: PricingConfig,
    pub deploy: DeployConfig,
    pub verify: VerifyConfig,
}

/// Target network and confirmation policy.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Network name; matched against `development_chains`.
    pub name: String,
    pub chain_rpc: String,
    pub chain_id: u64,
    /// Confirmations to wait for after every state-changing call.
    pub block_confirmations: u64,
    pub confirmation_timeout_secs: u64,
    /// Networks treated as local/disposable: the scenario suite only runs
    /// there, and explorer verification is skipped.
    pub development_chains: Vec<String>,
}

/// Private keys of the named accounts, hex encoded.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountsConfig {
    pub deployer_key: String,
    pub player_key: String,
}

/// Known contract addresses. Empty values are resolved from the deployment
/// records written by `deploy`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractsConfig {
    pub marketplace: String,
    pub basic_nft: String,
}

/// Price denomination for human-entered amounts.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    pub unit: Denomination,
    /// Price used by `mint-and-list`, in `unit`.
    pub list_price: String,
}

/// Artifact locations and where deployment records go.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    pub deployments_dir: String,
    pub marketplace_artifact: String,
    pub basic_nft_artifact: String,
}

/// Etherscan-compatible source verification.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifyConfig {
    pub explorer_api_url: String,
    pub etherscan_api_key: String,
    /// Hardhat build-info file holding the standard-JSON compiler input.
    pub build_info: String,
    pub poll_attempts: u32,
    pub poll_interval_secs: u64,
}

// ---------------------------------------------------------------------------
// Named accounts
// ---------------------------------------------------------------------------

/// The identities the workflows and scenarios act as.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum NamedAccount {
    Deployer,
    Player,
}

impl NamedAccount {
    pub fn key_env_var(self) -> &'static str {
        match self {
            NamedAccount::Deployer => "NFTMARKET_DEPLOYER_KEY",
            NamedAccount::Player => "NFTMARKET_PLAYER_KEY",
        }
    }
}

impl fmt::Display for NamedAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NamedAccount::Deployer => write!(f, "deployer"),
            NamedAccount::Player => write!(f, "player"),
        }
    }
}

impl AccountsConfig {
    /// Returns a copy of the key for `account`, wiped from memory on drop.
    pub fn key_for(&self, account: NamedAccount) -> Zeroizing<String> {
        match account {
            NamedAccount::Deployer => Zeroizing::new(self.deployer_key.clone()),
            NamedAccount::Player => Zeroizing::new(self.player_key.clone()),
        }
    }
}

impl fmt::Debug for AccountsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |key: &str| if key.is_empty() { "<unset>" } else { "<redacted>" };
        f.debug_struct("AccountsConfig")
            .field("deployer_key", &redact(&self.deployer_key))
            .field("player_key", &redact(&self.player_key))
            .finish()
    }
}

impl NetworkConfig {
    pub fn is_development(&self) -> bool {
        self.development_chains.iter().any(|name| name == &self.name)
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Anvil/Hardhat default accounts #0 and #1. These keys are public and only
/// meaningful on a local development node.
const DEV_DEPLOYER_KEY: &str =
    "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
const DEV_PLAYER_KEY: &str =
    "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            name: "localhost".to_string(),
            chain_rpc: "http://127.0.0.1:8545".to_string(),
            chain_id: 31337,
            block_confirmations: 1,
            confirmation_timeout_secs: 60,
            development_chains: vec![
                "hardhat".to_string(),
                "localhost".to_string(),
                "anvil".to_string(),
            ],
        }
    }
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            deployer_key: DEV_DEPLOYER_KEY.to_string(),
            player_key: DEV_PLAYER_KEY.to_string(),
        }
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            unit: Denomination::Ether,
            list_price: "0.1".to_string(),
        }
    }
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            deployments_dir: "deployments".to_string(),
            marketplace_artifact: "artifacts/contracts/NftMarketplace.sol/NftMarketplace.json"
                .to_string(),
            basic_nft_artifact: "artifacts/contracts/test/BasicNft.sol/BasicNft.json".to_string(),
        }
    }
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            explorer_api_url: "https://api.etherscan.io/api".to_string(),
            etherscan_api_key: String::new(),
            build_info: String::new(),
            poll_attempts: 10,
            poll_interval_secs: 5,
        }
    }
}

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Name of the configuration file inside the config directory.
const CONFIG_FILE: &str = "config.toml";

/// Default directory name under the user home directory.
const DEFAULT_DIR_NAME: &str = ".nftmarket";

/// Unix permission mode for the config directory (owner-only rwx).
const DIR_PERMISSIONS: u32 = 0o700;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Returns the configuration directory path.
///
/// Resolution order:
/// 1. `NFTMARKET_HOME` environment variable (if set and non-empty).
/// 2. `~/.nftmarket/`.
///
/// The directory is created with `0700` permissions if it does not already
/// exist.
pub fn config_dir() -> Result<PathBuf> {
    let dir = match std::env::var("NFTMARKET_HOME") {
        Ok(val) if !val.is_empty() => {
            debug!(path = %val, "using NFTMARKET_HOME for config directory");
            PathBuf::from(val)
        }
        _ => {
            let home = dirs::home_dir().context("unable to determine home directory")?;
            let path = home.join(DEFAULT_DIR_NAME);
            debug!(path = %path.display(), "using default config directory");
            path
        }
    };

    if !dir.exists() {
        debug!(path = %dir.display(), "creating config directory");
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create config directory: {}", dir.display()))?;

        let perms = fs::Permissions::from_mode(DIR_PERMISSIONS);
        fs::set_permissions(&dir, perms)
            .with_context(|| format!("failed to set permissions on {}", dir.display()))?;
    }

    Ok(dir)
}

/// Loads the configuration from `config.toml`.
///
/// After deserialisation the following environment variable overrides are
/// applied (when the variable is set and non-empty):
///
/// | Env var                  | Overrides                  |
/// |--------------------------|----------------------------|
/// | `NFTMARKET_RPC_URL`      | `network.chain_rpc`        |
/// | `NFTMARKET_NETWORK`      | `network.name`             |
/// | `NFTMARKET_DEPLOYER_KEY` | `accounts.deployer_key`    |
/// | `NFTMARKET_PLAYER_KEY`   | `accounts.player_key`      |
/// | `ETHERSCAN_API_KEY`      | `verify.etherscan_api_key` |
pub fn load() -> Result<Config> {
    let path = config_dir()?.join(CONFIG_FILE);
    debug!(path = %path.display(), "loading config");

    let contents = fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;

    let mut config: Config = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;

    apply_env_overrides(&mut config);

    debug!(?config, "config loaded");
    Ok(config)
}

/// Like [`load`], but falls back to the built-in local development defaults
/// (plus env overrides) when no `config.toml` exists yet.
pub fn load_or_default() -> Result<Config> {
    if exists()? {
        return load();
    }

    debug!("no config file found, using defaults");
    let mut config = Config::default();
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Serialises and writes the configuration to `config.toml`.
pub fn save(config: &Config) -> Result<()> {
    let path = config_dir()?.join(CONFIG_FILE);
    debug!(path = %path.display(), "saving config");

    let contents = toml::to_string_pretty(config).context("failed to serialise config to TOML")?;

    fs::write(&path, contents)
        .with_context(|| format!("failed to write config file: {}", path.display()))?;

    debug!(path = %path.display(), "config saved");
    Ok(())
}

/// Returns `true` if a `config.toml` file already exists in the config
/// directory.
pub fn exists() -> Result<bool> {
    let path = config_dir()?.join(CONFIG_FILE);
    Ok(path.exists())
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn env_override(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|val| !val.is_empty())
}

/// Applies env var overrides to the loaded configuration. Only non-empty
/// values are applied.
fn apply_env_overrides(config: &mut Config) {
    if let Some(val) = env_override("NFTMARKET_RPC_URL") {
        debug!(chain_rpc = %val, "overriding network.chain_rpc from NFTMARKET_RPC_URL");
        config.network.chain_rpc = val;
    }

    if let Some(val) = env_override("NFTMARKET_NETWORK") {
        debug!(network = %val, "overriding network.name from NFTMARKET_NETWORK");
        config.network.name = val;
    }

    // Keys are never logged.
    if let Some(val) = env_override("NFTMARKET_DEPLOYER_KEY") {
        debug!("overriding accounts.deployer_key from NFTMARKET_DEPLOYER_KEY");
        config.accounts.deployer_key = val;
    }

    if let Some(val) = env_override("NFTMARKET_PLAYER_KEY") {
        debug!("overriding accounts.player_key from NFTMARKET_PLAYER_KEY");
        config.accounts.player_key = val;
    }

    if let Some(val) = env_override("ETHERSCAN_API_KEY") {
        debug!("overriding verify.etherscan_api_key from ETHERSCAN_API_KEY");
        config.verify.etherscan_api_key = val;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
