//! The `deploy` command: deploy the marketplace and/or the BasicNft
//! collection from their compiled artifacts.

use std::path::Path;

use anyhow::Result;
use clap::ValueEnum;
use tracing::debug;

use crate::chain::contracts::names;
use crate::engine::deploy::{self, DeploymentRecord};
use crate::output::formatter;

use super::CommandContext;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum DeployTarget {
    All,
    Marketplace,
    BasicNft,
}

impl DeployTarget {
    fn contracts(self) -> &'static [&'static str] {
        match self {
            DeployTarget::All => &[names::NFT_MARKETPLACE, names::BASIC_NFT],
            DeployTarget::Marketplace => &[names::NFT_MARKETPLACE],
            DeployTarget::BasicNft => &[names::BASIC_NFT],
        }
    }
}

pub async fn run(ctx: &CommandContext, target: DeployTarget) -> Result<()> {
    debug!(?target, network = %ctx.cfg.network.name, "starting deploy command");

    let client = ctx.client().await?;
    let mut records: Vec<DeploymentRecord> = Vec::new();

    for &name in target.contracts() {
        let artifact = if name == names::NFT_MARKETPLACE {
            &ctx.cfg.deploy.marketplace_artifact
        } else {
            &ctx.cfg.deploy.basic_nft_artifact
        };

        let record = deploy::deploy_from_path(&ctx.cfg, &client, name, Path::new(artifact)).await?;
        formatter::print_success(&format!("{name} deployed at {}", record.address));
        records.push(record);
    }

    if formatter::is_json_mode() {
        formatter::print_json(&records);
    } else {
        formatter::print_info(&format!(
            "Deployment records written to {}/{}",
            ctx.cfg.deploy.deployments_dir, ctx.cfg.network.name
        ));
    }

    Ok(())
}
