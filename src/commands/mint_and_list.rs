//! The `mint-and-list` command.

use anyhow::Result;
use tracing::debug;

use crate::engine::workflow;
use crate::output::formatter;

use super::CommandContext;

/// Mint a BasicNft as the selected account and list it at `price` (or the
/// configured `pricing.list_price`).
pub async fn run(ctx: &CommandContext, price: Option<String>) -> Result<()> {
    let price_text = price.unwrap_or_else(|| ctx.cfg.pricing.list_price.clone());
    let price = ctx.parse_amount(&price_text)?;
    debug!(%price, "starting mint-and-list command");

    let market = ctx.marketplace().await?;
    let nft = ctx.basic_nft().await?;

    let outcome = workflow::mint_and_list(&market, &nft, price, |step| {
        formatter::print_info(&step.to_string())
    })
    .await?;

    if formatter::is_json_mode() {
        formatter::print_json(&outcome);
    } else {
        formatter::print_info(&format!(
            "Token {} listed for {}",
            outcome.token,
            ctx.cfg.pricing.unit.format_amount(outcome.price)
        ));
    }

    Ok(())
}
