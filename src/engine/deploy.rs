//! Contract deployment and deployment records.
//!
//! Deploys compiled artifacts (Hardhat or Foundry JSON), waits for the
//! configured confirmations and records each deployment under
//! `<deployments_dir>/<network>/<Name>.json`. Later commands resolve contract
//! addresses from those records when the config does not pin them.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use alloy::primitives::{Address, Bytes, B256};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::chain::client::ChainClient;
use crate::chain::contracts::names;
use crate::config::store::Config;
use crate::engine::verify::{self, ExplorerClient, VerificationOutcome};

/// Separator logged after every deployment run.
const DEPLOY_BANNER: &str = "==========================";

// ---------------------------------------------------------------------------
// Artifacts
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(untagged)]
enum RawBytecode {
    /// Hardhat: `"bytecode": "0x..."`.
    Hex(String),
    /// Foundry: `"bytecode": { "object": "0x..." }`.
    Object { object: String },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawArtifact {
    contract_name: Option<String>,
    source_name: Option<String>,
    bytecode: RawBytecode,
}

/// Creation code and identity of a compiled contract.
#[derive(Clone, Debug)]
pub struct Artifact {
    pub contract_name: Option<String>,
    pub source_name: Option<String>,
    pub bytecode: Bytes,
}

impl Artifact {
    /// Parse an artifact from its JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawArtifact =
            serde_json::from_str(json).context("failed to parse contract artifact JSON")?;

        let hex_code = match raw.bytecode {
            RawBytecode::Hex(code) => code,
            RawBytecode::Object { object } => object,
        };

        let bytecode: Bytes = hex_code
            .parse()
            .context("artifact bytecode is not valid hex")?;

        if bytecode.is_empty() {
            bail!("artifact has no creation bytecode (abstract contract or interface?)");
        }

        Ok(Self {
            contract_name: raw.contract_name,
            source_name: raw.source_name,
            bytecode,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "loading contract artifact");
        let json = fs::read_to_string(path)
            .with_context(|| format!("failed to read artifact: {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("invalid artifact: {}", path.display()))
    }

    /// `<sourceName>:<contractName>`, as explorers expect.
    pub fn fully_qualified_name(&self, fallback_name: &str) -> String {
        let name = self.contract_name.as_deref().unwrap_or(fallback_name);
        match &self.source_name {
            Some(source) => format!("{source}:{name}"),
            None => name.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Deployment records
// ---------------------------------------------------------------------------

/// One recorded deployment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub name: String,
    pub address: Address,
    pub tx_hash: B256,
    pub block_number: Option<u64>,
    pub network: String,
    pub chain_id: u64,
    pub deployed_at: u64,
}

/// Deployment records of one network.
pub struct DeploymentStore {
    dir: PathBuf,
}

impl DeploymentStore {
    pub fn new(deployments_dir: impl AsRef<Path>, network: &str) -> Self {
        Self {
            dir: deployments_dir.as_ref().join(network),
        }
    }

    pub fn for_config(config: &Config) -> Self {
        Self::new(&config.deploy.deployments_dir, &config.network.name)
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    pub fn save(&self, record: &DeploymentRecord) -> Result<()> {
        fs::create_dir_all(&self.dir).with_context(|| {
            format!("failed to create deployments directory: {}", self.dir.display())
        })?;

        let path = self.path_for(&record.name);
        let json = serde_json::to_string_pretty(record)
            .context("failed to serialise deployment record")?;
        fs::write(&path, json)
            .with_context(|| format!("failed to write deployment record: {}", path.display()))?;

        debug!(path = %path.display(), name = %record.name, "deployment recorded");
        Ok(())
    }

    /// `None` if `name` was never deployed on this network.
    pub fn load(&self, name: &str) -> Result<Option<DeploymentRecord>> {
        let path = self.path_for(name);
        if !path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&path)
            .with_context(|| format!("failed to read deployment record: {}", path.display()))?;
        let record = serde_json::from_str(&json)
            .with_context(|| format!("failed to parse deployment record: {}", path.display()))?;
        Ok(Some(record))
    }
}

/// Resolve a contract address: the config value if set, otherwise the
/// deployment record for the current network.
pub fn resolve_address(config: &Config, name: &str) -> Result<Address> {
    let pinned = match name {
        names::NFT_MARKETPLACE => config.contracts.marketplace.as_str(),
        names::BASIC_NFT => config.contracts.basic_nft.as_str(),
        _ => "",
    };

    if !pinned.is_empty() {
        return pinned
            .parse()
            .with_context(|| format!("invalid {name} address in config: {pinned}"));
    }

    match DeploymentStore::for_config(config).load(name)? {
        Some(record) => {
            debug!(%name, address = %record.address, "address resolved from deployment record");
            Ok(record.address)
        }
        None => bail!(
            "{name} is not deployed on {}; run `nftmarket deploy` first",
            config.network.name
        ),
    }
}

// ---------------------------------------------------------------------------
// Deploy
// ---------------------------------------------------------------------------

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// The chain id to record: the node's, with a warning when the configured
/// network says otherwise.
fn recorded_chain_id(config: &Config, reported: u64) -> u64 {
    if reported != config.network.chain_id {
        warn!(
            network = %config.network.name,
            configured = config.network.chain_id,
            reported,
            "node chain id differs from configuration"
        );
    }
    reported
}

/// Deploy `artifact` as `name` from `client`'s account and record it.
///
/// On non-development networks with an explorer API key configured, the
/// contract is then submitted for source verification. A verification
/// failure is logged and does not fail the deployment.
pub async fn deploy_contract(
    config: &Config,
    client: &ChainClient,
    name: &str,
    artifact: &Artifact,
) -> Result<DeploymentRecord> {
    info!(%name, network = %config.network.name, "deploying");

    let deployed = client
        .deploy_contract(artifact.bytecode.clone())
        .await
        .with_context(|| format!("failed to deploy {name}"))?;

    let chain_id = recorded_chain_id(config, client.get_chain_id().await?);

    let record = DeploymentRecord {
        name: name.to_string(),
        address: deployed.address,
        tx_hash: deployed.tx_hash,
        block_number: deployed.block_number,
        network: config.network.name.clone(),
        chain_id,
        deployed_at: unix_now(),
    };
    DeploymentStore::for_config(config).save(&record)?;
    info!(%name, address = %record.address, tx_hash = %record.tx_hash, "deployed");

    if should_verify(config) {
        info!(%name, "verifying");
        match verify_deployment(config, name, artifact, &record).await {
            Ok(outcome) => info!(%name, ?outcome, "verification finished"),
            Err(e) => warn!(%name, error = %format!("{e:#}"), "verification failed"),
        }
    }

    info!("{DEPLOY_BANNER}");
    Ok(record)
}

/// Load the artifact at `artifact_path` and deploy it.
pub async fn deploy_from_path(
    config: &Config,
    client: &ChainClient,
    name: &str,
    artifact_path: &Path,
) -> Result<DeploymentRecord> {
    let artifact = Artifact::load(artifact_path)?;
    deploy_contract(config, client, name, &artifact).await
}

/// Verification only makes sense on public networks with an API key.
pub fn should_verify(config: &Config) -> bool {
    !config.network.is_development() && !config.verify.etherscan_api_key.is_empty()
}

async fn verify_deployment(
    config: &Config,
    name: &str,
    artifact: &Artifact,
    record: &DeploymentRecord,
) -> Result<VerificationOutcome> {
    if config.verify.build_info.is_empty() {
        bail!("verify.build_info is not set; cannot submit sources for verification");
    }

    let request = verify::VerificationRequest::from_build_info(
        Path::new(&config.verify.build_info),
        &artifact.fully_qualified_name(name),
        record.address,
        Bytes::new(),
    )?;

    ExplorerClient::from_config(&config.verify)?
        .verify(&request)
        .await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
