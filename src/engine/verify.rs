//! Block-explorer source verification (Etherscan-compatible API).
//!
//! Submits the standard-JSON compiler input from a Hardhat build-info file,
//! then polls the explorer until it reports a verdict.

use std::fs;
use std::path::Path;
use std::time::Duration;

use alloy::primitives::{Address, Bytes};
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::store::VerifyConfig;

const HTTP_TIMEOUT_SECS: u64 = 30;

/// Everything the explorer needs to rebuild and compare one contract.
#[derive(Clone, Debug)]
pub struct VerificationRequest {
    pub address: Address,
    /// `<source path>:<ContractName>`.
    pub contract_name: String,
    /// `v<solc long version>`, e.g. `v0.8.7+commit.e28d00a7`.
    pub compiler_version: String,
    /// Standard-JSON compiler input, serialised.
    pub source: String,
    /// ABI-encoded constructor arguments, hex without `0x`.
    pub constructor_args: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BuildInfo {
    solc_long_version: String,
    input: serde_json::Value,
}

impl VerificationRequest {
    pub fn from_build_info(
        path: &Path,
        contract_name: &str,
        address: Address,
        constructor_args: Bytes,
    ) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("failed to read build info: {}", path.display()))?;
        Self::from_build_info_json(&json, contract_name, address, constructor_args)
    }

    pub fn from_build_info_json(
        json: &str,
        contract_name: &str,
        address: Address,
        constructor_args: Bytes,
    ) -> Result<Self> {
        let info: BuildInfo =
            serde_json::from_str(json).context("failed to parse build info JSON")?;

        let source =
            serde_json::to_string(&info.input).context("failed to serialise compiler input")?;

        Ok(Self {
            address,
            contract_name: contract_name.to_string(),
            compiler_version: format!("v{}", info.solc_long_version),
            source,
            constructor_args: hex::encode(constructor_args),
        })
    }
}

/// Final state of a verification attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VerificationOutcome {
    Verified,
    AlreadyVerified,
}

#[derive(Debug, PartialEq, Eq)]
enum Submission {
    Queued(String),
    AlreadyVerified,
}

#[derive(Debug, PartialEq, Eq)]
enum Status {
    Pending,
    Pass,
    AlreadyVerified,
    Fail(String),
}

/// The `{status, message, result}` envelope every explorer call returns.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    result: String,
}

fn is_already_verified(text: &str) -> bool {
    text.to_ascii_lowercase().contains("already verified")
}

fn parse_submission(response: ApiResponse) -> Result<Submission> {
    if response.status == "1" {
        return Ok(Submission::Queued(response.result));
    }
    if is_already_verified(&response.result) {
        return Ok(Submission::AlreadyVerified);
    }
    bail!(
        "explorer rejected verification request: {} ({})",
        response.result,
        response.message
    )
}

fn parse_status(response: ApiResponse) -> Status {
    let result = response.result;
    if is_already_verified(&result) {
        Status::AlreadyVerified
    } else if result.to_ascii_lowercase().contains("pending") {
        Status::Pending
    } else if response.status == "1" || result.starts_with("Pass") {
        Status::Pass
    } else {
        Status::Fail(result)
    }
}

/// Client for an Etherscan-compatible verification API.
pub struct ExplorerClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    poll_attempts: u32,
    poll_interval: Duration,
}

impl ExplorerClient {
    pub fn from_config(config: &VerifyConfig) -> Result<Self> {
        if config.etherscan_api_key.is_empty() {
            bail!("no explorer API key configured (set ETHERSCAN_API_KEY)");
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .context("failed to build HTTP client for explorer API")?;

        Ok(Self {
            http,
            api_url: config.explorer_api_url.clone(),
            api_key: config.etherscan_api_key.clone(),
            poll_attempts: config.poll_attempts.max(1),
            poll_interval: Duration::from_secs(config.poll_interval_secs),
        })
    }

    /// Submit `request` and wait for the explorer's verdict.
    pub async fn verify(&self, request: &VerificationRequest) -> Result<VerificationOutcome> {
        let guid = match self.submit(request).await? {
            Submission::AlreadyVerified => {
                info!(address = %request.address, "contract is already verified");
                return Ok(VerificationOutcome::AlreadyVerified);
            }
            Submission::Queued(guid) => guid,
        };
        info!(address = %request.address, %guid, "verification submitted");

        for attempt in 1..=self.poll_attempts {
            tokio::time::sleep(self.poll_interval).await;

            match self.check_status(&guid).await? {
                Status::Pending => debug!(%guid, attempt, "verification pending"),
                Status::Pass => return Ok(VerificationOutcome::Verified),
                Status::AlreadyVerified => return Ok(VerificationOutcome::AlreadyVerified),
                Status::Fail(reason) => bail!("verification failed: {reason}"),
            }
        }

        bail!(
            "verification still pending after {} attempts (guid {guid})",
            self.poll_attempts
        )
    }

    async fn submit(&self, request: &VerificationRequest) -> Result<Submission> {
        let address = request.address.to_string();
        let form = [
            ("apikey", self.api_key.as_str()),
            ("module", "contract"),
            ("action", "verifysourcecode"),
            ("contractaddress", address.as_str()),
            ("sourceCode", request.source.as_str()),
            ("codeformat", "solidity-standard-json-input"),
            ("contractname", request.contract_name.as_str()),
            ("compilerversion", request.compiler_version.as_str()),
            // Etherscan's own spelling.
            ("constructorArguements", request.constructor_args.as_str()),
        ];

        let response: ApiResponse = self
            .http
            .post(&self.api_url)
            .form(&form)
            .send()
            .await
            .context("failed to reach explorer API")?
            .json()
            .await
            .context("explorer returned an unreadable response")?;

        parse_submission(response)
    }

    async fn check_status(&self, guid: &str) -> Result<Status> {
        let response: ApiResponse = self
            .http
            .get(&self.api_url)
            .query(&[
                ("apikey", self.api_key.as_str()),
                ("module", "contract"),
                ("action", "checkverifystatus"),
                ("guid", guid),
            ])
            .send()
            .await
            .context("failed to reach explorer API")?
            .json()
            .await
            .context("explorer returned an unreadable response")?;

        Ok(parse_status(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: &str, result: &str) -> ApiResponse {
        ApiResponse {
            status: status.to_string(),
            message: String::new(),
            result: result.to_string(),
        }
    }

    #[test]
    fn request_from_build_info() {
        let json = r#"{
            "solcVersion": "0.8.7",
            "solcLongVersion": "0.8.7+commit.e28d00a7",
            "input": { "language": "Solidity", "sources": {} }
        }"#;

        let request = VerificationRequest::from_build_info_json(
            json,
            "contracts/NftMarketplace.sol:NftMarketplace",
            Address::ZERO,
            Bytes::new(),
        )
        .unwrap();

        assert_eq!(request.compiler_version, "v0.8.7+commit.e28d00a7");
        assert!(request.source.contains("\"language\":\"Solidity\""));
        assert_eq!(request.constructor_args, "");
    }

    #[test]
    fn submission_outcomes() {
        assert_eq!(
            parse_submission(response("1", "abc123")).unwrap(),
            Submission::Queued("abc123".to_string())
        );
        assert_eq!(
            parse_submission(response("0", "Contract source code already verified")).unwrap(),
            Submission::AlreadyVerified
        );
        assert!(parse_submission(response("0", "Invalid API Key")).is_err());
    }

    #[test]
    fn status_outcomes() {
        assert_eq!(parse_status(response("0", "Pending in queue")), Status::Pending);
        assert_eq!(parse_status(response("1", "Pass - Verified")), Status::Pass);
        assert_eq!(parse_status(response("0", "Already Verified")), Status::AlreadyVerified);
        assert_eq!(
            parse_status(response("0", "Fail - Unable to verify")),
            Status::Fail("Fail - Unable to verify".to_string())
        );
    }

    #[test]
    fn explorer_client_requires_api_key() {
        assert!(ExplorerClient::from_config(&VerifyConfig::default()).is_err());
    }
}
