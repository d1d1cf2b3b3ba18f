//! The mint-and-list workflow: mint a fresh token, approve the marketplace
//! for it and list it at a fixed price.

use std::fmt;

use alloy::primitives::U256;
use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::chain::types::TokenRef;
use crate::market::{Marketplace, NftCollection, TxReceipt};

/// Progress milestones reported while the workflow runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MintAndListStep {
    Minting,
    Approving,
    Listing,
    Listed,
}

impl fmt::Display for MintAndListStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let line = match self {
            MintAndListStep::Minting => "Minting .....",
            MintAndListStep::Approving => "Approving Nft....",
            MintAndListStep::Listing => "Listing Nft...",
            MintAndListStep::Listed => "Listed!",
        };
        f.write_str(line)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct MintAndListOutcome {
    pub token: TokenRef,
    pub price: U256,
    pub listing: TxReceipt,
}

/// Mint a token to `nft`'s caller, approve `market` for it and list it at
/// `price`.
///
/// Each step waits for its transaction to confirm before the next begins.
/// Any failure aborts the remaining steps.
pub async fn mint_and_list(
    market: &dyn Marketplace,
    nft: &dyn NftCollection,
    price: U256,
    mut on_step: impl FnMut(MintAndListStep),
) -> Result<MintAndListOutcome> {
    on_step(MintAndListStep::Minting);
    let mint = nft.mint_nft().await.context("minting failed")?;
    let token_id = mint
        .minted_token_id()
        .context("mint transaction emitted no Transfer event")?;
    let token = nft.token(token_id);
    info!(%token, tx_hash = %mint.tx_hash, "minted");

    on_step(MintAndListStep::Approving);
    nft.approve(market.address(), token_id)
        .await
        .context("approving the marketplace failed")?;

    on_step(MintAndListStep::Listing);
    let listing = market
        .list_item(token, price)
        .await
        .context("listing failed")?;
    info!(%token, %price, tx_hash = %listing.tx_hash, "listed");

    on_step(MintAndListStep::Listed);
    Ok(MintAndListOutcome {
        token,
        price,
        listing,
    })
}

#[cfg(test)]
mod tests {
    use alloy::primitives::Address;

    use super::*;
    use crate::market::devchain::DevChain;
    use crate::market::{CallError, RevertReason};

    fn setup() -> (DevChain, Address, Address) {
        let deployer = Address::repeat_byte(0x01);
        let chain = DevChain::with_accounts(&[deployer]);
        let market = chain.deploy_marketplace(deployer).unwrap();
        let nft = chain.deploy_basic_nft(deployer).unwrap();
        (chain, market, nft)
    }

    #[tokio::test]
    async fn mints_approves_and_lists() {
        let (chain, market_addr, nft_addr) = setup();
        let deployer = Address::repeat_byte(0x01);
        let market = chain.marketplace(market_addr, deployer);
        let nft = chain.basic_nft(nft_addr, deployer);

        let mut steps = Vec::new();
        let outcome = mint_and_list(&market, &nft, U256::from(100u64), |step| steps.push(step))
            .await
            .unwrap();

        assert_eq!(
            steps,
            vec![
                MintAndListStep::Minting,
                MintAndListStep::Approving,
                MintAndListStep::Listing,
                MintAndListStep::Listed,
            ]
        );
        assert_eq!(outcome.token.token_id, U256::ZERO);
        assert!(outcome.listing.emitted("NftMarketplace__ItemListed"));

        let listing = market.get_listing(outcome.token).await.unwrap().unwrap();
        assert_eq!(listing.price, U256::from(100u64));
        assert_eq!(listing.seller, deployer);
    }

    #[tokio::test]
    async fn zero_price_aborts_after_approval() {
        let (chain, market_addr, nft_addr) = setup();
        let deployer = Address::repeat_byte(0x01);
        let market = chain.marketplace(market_addr, deployer);
        let nft = chain.basic_nft(nft_addr, deployer);

        let mut steps = Vec::new();
        let err = mint_and_list(&market, &nft, U256::ZERO, |step| steps.push(step))
            .await
            .unwrap_err();

        let call_err = err.downcast_ref::<CallError>().unwrap();
        assert!(call_err.is_revert(&RevertReason::PriceMustBeAboveZero));
        assert_eq!(steps.last(), Some(&MintAndListStep::Listing));

        // The mint and approval are not rolled back.
        assert_eq!(nft.token_counter().await.unwrap(), U256::from(1u64));
        assert_eq!(nft.get_approved(U256::ZERO).await.unwrap(), market_addr);
    }

    #[test]
    fn progress_lines() {
        assert_eq!(MintAndListStep::Minting.to_string(), "Minting .....");
        assert_eq!(MintAndListStep::Listed.to_string(), "Listed!");
    }
}
