use alloy::primitives::{Address, U256};
use anyhow::{Context, Result};
use tracing::debug;

use crate::chain::client::ChainClient;
use crate::chain::contracts::names;
use crate::chain::types::TokenRef;
use crate::config::store::{self, Config, NamedAccount};
use crate::engine::deploy::resolve_address;
use crate::market::remote::{RemoteMarketplace, RemoteNft};
use crate::market::CallError;

pub mod accounts;
pub mod check;
pub mod deploy;
pub mod init;
pub mod market;
pub mod mint_and_list;

/// Overrides given as global CLI flags. They take precedence over both
/// `config.toml` and environment variables.
#[derive(Clone, Debug, Default)]
pub struct GlobalOverrides {
    pub network: Option<String>,
    pub rpc_url: Option<String>,
}

/// Shared setup for commands that talk to the network as a named account.
pub struct CommandContext {
    pub cfg: Config,
    pub account: NamedAccount,
}

impl CommandContext {
    /// Load config (or local defaults) and apply CLI-flag overrides.
    pub fn load(account: NamedAccount, overrides: &GlobalOverrides) -> Result<Self> {
        let mut cfg = store::load_or_default()?;

        if let Some(network) = &overrides.network {
            cfg.network.name = network.clone();
        }
        if let Some(rpc_url) = &overrides.rpc_url {
            cfg.network.chain_rpc = rpc_url.clone();
        }

        debug!(network = %cfg.network.name, %account, "command context loaded");
        Ok(Self { cfg, account })
    }

    /// Client signing as the selected account.
    pub async fn client(&self) -> Result<ChainClient> {
        ChainClient::for_account(&self.cfg, self.account).await
    }

    pub async fn marketplace(&self) -> Result<RemoteMarketplace> {
        let address = resolve_address(&self.cfg, names::NFT_MARKETPLACE)?;
        self.client().await?.marketplace(address)
    }

    pub async fn basic_nft(&self) -> Result<RemoteNft> {
        let address = resolve_address(&self.cfg, names::BASIC_NFT)?;
        self.client().await?.basic_nft(address)
    }

    /// Token `id` of `nft`, or of the deployed BasicNft when `nft` is `None`.
    pub fn token(&self, nft: Option<&str>, id: u64) -> Result<TokenRef> {
        let nft_address = match nft {
            Some(raw) => raw
                .parse::<Address>()
                .map_err(|_| CallError::Local(format!("invalid NFT address: {raw}")))?,
            None => resolve_address(&self.cfg, names::BASIC_NFT)?,
        };
        Ok(TokenRef::new(nft_address, U256::from(id)))
    }

    /// Parse a human-entered amount in the configured price unit.
    pub fn parse_amount(&self, amount: &str) -> Result<U256> {
        let unit = self.cfg.pricing.unit;
        let wei = unit
            .parse_amount(amount)
            .map_err(|e| CallError::Local(format!("{e:#}")))
            .with_context(|| format!("invalid amount {amount:?}"))?;
        Ok(wei)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> CommandContext {
        let mut cfg = Config::default();
        cfg.contracts.basic_nft = "0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512".to_string();
        CommandContext {
            cfg,
            account: NamedAccount::Deployer,
        }
    }

    #[test]
    fn negative_amount_is_a_local_error() {
        let err = context().parse_amount("-1").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CallError>(),
            Some(CallError::Local(_))
        ));
    }

    #[test]
    fn amounts_use_configured_unit() {
        let mut ctx = context();
        assert_eq!(
            ctx.parse_amount("0.1").unwrap(),
            U256::from(100_000_000_000_000_000u64)
        );

        ctx.cfg.pricing.unit = crate::chain::types::Denomination::Wei;
        assert_eq!(ctx.parse_amount("1").unwrap(), U256::from(1u64));
    }

    #[test]
    fn token_defaults_to_deployed_collection() {
        let ctx = context();
        let token = ctx.token(None, 3).unwrap();
        assert_eq!(
            token.nft_address.to_string(),
            "0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512"
        );
        assert_eq!(token.token_id, U256::from(3u64));

        assert!(ctx.token(Some("nope"), 0).is_err());
    }
}
