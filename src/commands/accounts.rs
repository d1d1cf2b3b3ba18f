//! The `accounts` command: show the named accounts and their balances.

use anyhow::Result;
use tracing::debug;

use crate::chain::client::ChainClient;
use crate::chain::signer::TransactionSigner;
use crate::chain::types::Balance;
use crate::config::store::NamedAccount;
use crate::output::formatter;

use super::CommandContext;

pub async fn run(ctx: &CommandContext) -> Result<()> {
    debug!("starting accounts command");

    let client = ChainClient::from_config(&ctx.cfg).await?;
    let mut rows = Vec::new();
    let mut unfunded = false;

    for account in [NamedAccount::Deployer, NamedAccount::Player] {
        let signer = TransactionSigner::for_account(&ctx.cfg.accounts, account)?;
        let address = signer.address();
        let balance = Balance {
            wei: client.get_eth_balance(address).await?,
        };

        unfunded |= balance.is_empty();
        rows.push((account.to_string(), address, balance.display_eth()));
    }

    formatter::print_accounts(&rows);

    if unfunded {
        formatter::print_warning("Some accounts have no funds; transactions from them will fail.");
    }
    Ok(())
}
