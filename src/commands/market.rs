//! Single marketplace calls: list, buy, cancel, update, withdraw, and the
//! read-only proceeds/listing/owner queries.

use alloy::primitives::{Address, U256};
use anyhow::{Context, Result};
use tracing::debug;

use crate::market::{Marketplace, NftCollection};
use crate::output::formatter;

use super::CommandContext;

pub async fn list(
    ctx: &CommandContext,
    token_id: u64,
    price: &str,
    nft: Option<String>,
) -> Result<()> {
    let token = ctx.token(nft.as_deref(), token_id)?;
    let price = ctx.parse_amount(price)?;
    debug!(%token, %price, "list command");

    let receipt = ctx
        .marketplace()
        .await?
        .list_item(token, price)
        .await
        .with_context(|| format!("listing {token} failed"))?;

    formatter::print_receipt(
        &format!("Listed {token} for {}", ctx.cfg.pricing.unit.format_amount(price)),
        &receipt,
    );
    Ok(())
}

/// Buy a listed token. Without `value`, pays exactly the listing price.
pub async fn buy(
    ctx: &CommandContext,
    token_id: u64,
    value: Option<String>,
    nft: Option<String>,
) -> Result<()> {
    let token = ctx.token(nft.as_deref(), token_id)?;
    let market = ctx.marketplace().await?;

    let payment = match value {
        Some(value) => ctx.parse_amount(&value)?,
        None => market
            .get_listing(token)
            .await?
            .map(|listing| listing.price)
            .unwrap_or(U256::ZERO),
    };
    debug!(%token, %payment, "buy command");

    let receipt = market
        .buy_item(token, payment)
        .await
        .with_context(|| format!("buying {token} failed"))?;

    formatter::print_receipt(&format!("Bought {token}"), &receipt);
    Ok(())
}

pub async fn cancel(ctx: &CommandContext, token_id: u64, nft: Option<String>) -> Result<()> {
    let token = ctx.token(nft.as_deref(), token_id)?;
    let receipt = ctx
        .marketplace()
        .await?
        .cancel_listing(token)
        .await
        .with_context(|| format!("cancelling {token} failed"))?;

    formatter::print_receipt(&format!("Cancelled listing of {token}"), &receipt);
    Ok(())
}

pub async fn update(
    ctx: &CommandContext,
    token_id: u64,
    price: &str,
    nft: Option<String>,
) -> Result<()> {
    let token = ctx.token(nft.as_deref(), token_id)?;
    let price = ctx.parse_amount(price)?;
    let receipt = ctx
        .marketplace()
        .await?
        .update_listing(token, price)
        .await
        .with_context(|| format!("updating {token} failed"))?;

    formatter::print_receipt(
        &format!("Updated {token} to {}", ctx.cfg.pricing.unit.format_amount(price)),
        &receipt,
    );
    Ok(())
}

pub async fn withdraw(ctx: &CommandContext) -> Result<()> {
    let market = ctx.marketplace().await?;
    let owed = market.get_proceeds(market.caller()).await?;
    debug!(caller = %market.caller(), %owed, "withdraw command");

    let receipt = market
        .withdraw_proceeds()
        .await
        .context("withdrawing proceeds failed")?;

    formatter::print_receipt(
        &format!("Withdrew {}", ctx.cfg.pricing.unit.format_amount(owed)),
        &receipt,
    );
    Ok(())
}

/// Show the proceeds owed to `seller` (default: the selected account).
pub async fn proceeds(ctx: &CommandContext, seller: Option<String>) -> Result<()> {
    let market = ctx.marketplace().await?;
    let seller = match seller {
        Some(raw) => raw
            .parse::<Address>()
            .with_context(|| format!("invalid seller address: {raw}"))?,
        None => market.caller(),
    };

    let owed = market.get_proceeds(seller).await?;
    formatter::print_amount("proceeds", seller, owed, ctx.cfg.pricing.unit);
    Ok(())
}

pub async fn listing(ctx: &CommandContext, token_id: u64, nft: Option<String>) -> Result<()> {
    let token = ctx.token(nft.as_deref(), token_id)?;
    let listing = ctx.marketplace().await?.get_listing(token).await?;

    formatter::print_listing(&token, listing.as_ref(), ctx.cfg.pricing.unit);
    Ok(())
}

pub async fn owner(ctx: &CommandContext, token_id: u64) -> Result<()> {
    let nft = ctx.basic_nft().await?;
    let token = nft.token(U256::from(token_id));
    let owner = nft.owner_of(token.token_id).await?;

    if formatter::is_json_mode() {
        formatter::print_json(&serde_json::json!({ "token": token, "owner": owner }));
    } else {
        formatter::print_info(&format!("{token} is owned by {owner}"));
    }
    Ok(())
}
