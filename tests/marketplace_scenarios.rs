//! Marketplace behaviour against the in-process chain.
//!
//! Each test builds its own chain, so they are independent and can run in
//! parallel.

use alloy::primitives::{Address, U256};

use nftmarket::chain::types::TokenRef;
use nftmarket::harness::scenarios::{
    run_suite, DevFixtureFactory, FixtureFactory, Outcome, Scenario, PRICE,
};
use nftmarket::market::devchain::{DevChain, DevMarketplace, DevNft, DEV_ACCOUNT_BALANCE};
use nftmarket::market::{CallError, MarketEvent, Marketplace, NftCollection, RevertReason};

fn deployer() -> Address {
    "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse().unwrap()
}

fn player() -> Address {
    "0x70997970C51812dc3A010C7d01b50e0d17dc79C8".parse().unwrap()
}

struct World {
    chain: DevChain,
    market: DevMarketplace,
    nft: DevNft,
}

impl World {
    fn new() -> Self {
        let chain = DevChain::with_accounts(&[deployer(), player()]);
        let market = chain.deploy_marketplace(deployer()).unwrap();
        let nft = chain.deploy_basic_nft(deployer()).unwrap();
        Self {
            market: chain.marketplace(market, deployer()),
            nft: chain.basic_nft(nft, deployer()),
            chain,
        }
    }

    fn token(&self, id: u64) -> TokenRef {
        self.nft.token(U256::from(id))
    }

    async fn mint_and_approve(&self) -> TokenRef {
        let receipt = self.nft.mint_nft().await.unwrap();
        let token = self.nft.token(receipt.minted_token_id().unwrap());
        self.nft
            .approve(self.market.address(), token.token_id)
            .await
            .unwrap();
        token
    }
}

fn assert_revert<T: std::fmt::Debug>(result: Result<T, CallError>, expected: RevertReason) {
    match result {
        Err(CallError::Rejected(reason)) => assert_eq!(reason, expected),
        other => panic!("expected revert with {expected}, got {other:?}"),
    }
}

// ===========================================================================
// Suite
// ===========================================================================

#[tokio::test]
async fn full_suite_passes_in_process() {
    let factory = DevFixtureFactory::new(deployer(), player());
    assert!(factory.is_development());

    let report = run_suite(&factory).await;
    for result in &report.results {
        assert_eq!(result.outcome, Outcome::Passed, "{}", result.scenario);
    }
    assert_eq!(report.results.len(), Scenario::ALL.len());
}

#[tokio::test]
async fn fixtures_are_independent() {
    let factory = DevFixtureFactory::new(deployer(), player());

    let first = factory.fresh().await.unwrap();
    first
        .player_market
        .buy_item(first.token(0), PRICE)
        .await
        .unwrap();

    let second = factory.fresh().await.unwrap();
    let listing = second.market.get_listing(second.token(0)).await.unwrap();
    assert!(listing.is_some());
    assert_eq!(
        second.market.get_proceeds(deployer()).await.unwrap(),
        U256::ZERO
    );
}

// ===========================================================================
// listItem
// ===========================================================================

#[tokio::test]
async fn unapproved_token_cannot_be_listed() {
    let world = World::new();
    world.nft.mint_nft().await.unwrap();

    assert_revert(
        world.market.list_item(world.token(0), PRICE).await,
        RevertReason::NotApprovedForMarketplace,
    );
}

#[tokio::test]
async fn zero_price_is_rejected_by_the_contract() {
    let world = World::new();
    let token = world.mint_and_approve().await;

    assert_revert(
        world.market.list_item(token, U256::ZERO).await,
        RevertReason::PriceMustBeAboveZero,
    );
}

#[tokio::test]
async fn listing_records_seller_and_price() {
    let world = World::new();
    let token = world.mint_and_approve().await;

    let receipt = world.market.list_item(token, U256::from(5u64)).await.unwrap();
    assert_eq!(
        receipt.events,
        vec![MarketEvent::ItemListed {
            seller: deployer(),
            token,
            price: U256::from(5u64),
        }]
    );

    let listing = world.market.get_listing(token).await.unwrap().unwrap();
    assert_eq!(listing.seller, deployer());
    assert_eq!(listing.price, U256::from(5u64));
}

#[tokio::test]
async fn owner_cannot_list_twice() {
    let world = World::new();
    let token = world.mint_and_approve().await;
    world.market.list_item(token, PRICE).await.unwrap();

    assert_revert(
        world.market.list_item(token, PRICE).await,
        RevertReason::AlreadyListed,
    );
}

#[tokio::test]
async fn non_owner_cannot_list_cancel_or_update() {
    let world = World::new();
    let token = world.mint_and_approve().await;
    let as_player = world.market.connect(player());

    assert_revert(as_player.list_item(token, PRICE).await, RevertReason::NotOwner);

    world.market.list_item(token, PRICE).await.unwrap();
    assert_revert(as_player.cancel_listing(token).await, RevertReason::NotOwner);
    assert_revert(
        as_player.update_listing(token, U256::from(2u64)).await,
        RevertReason::NotOwner,
    );
}

#[tokio::test]
async fn list_checks_ownership_and_price_before_approval() {
    let world = World::new();
    let token = world.token(0);
    world.nft.mint_nft().await.unwrap();

    assert_revert(
        world.market.connect(player()).list_item(token, PRICE).await,
        RevertReason::NotOwner,
    );
    assert_revert(
        world.market.list_item(token, U256::ZERO).await,
        RevertReason::PriceMustBeAboveZero,
    );
}

#[tokio::test]
async fn relisting_is_reported_before_ownership() {
    let world = World::new();
    let token = world.mint_and_approve().await;
    world.market.list_item(token, PRICE).await.unwrap();

    assert_revert(
        world.market.connect(player()).list_item(token, U256::ZERO).await,
        RevertReason::AlreadyListed,
    );
}

// ===========================================================================
// buyItem
// ===========================================================================

#[tokio::test]
async fn underpaying_is_rejected() {
    let world = World::new();
    let token = world.mint_and_approve().await;
    world.market.list_item(token, U256::from(10u64)).await.unwrap();

    assert_revert(
        world
            .market
            .connect(player())
            .buy_item(token, U256::from(9u64))
            .await,
        RevertReason::PriceNotMet,
    );
}

#[tokio::test]
async fn mint_list_buy_moves_token_and_credits_seller() {
    let world = World::new();
    world.nft.mint_nft().await.unwrap();
    let token = world.mint_and_approve().await;
    assert_eq!(token.token_id, U256::from(1u64));

    world.market.list_item(token, PRICE).await.unwrap();

    let buyer = world.market.connect(player());
    let receipt = buyer.buy_item(token, PRICE).await.unwrap();
    assert!(receipt.emitted("ItemBought"));
    assert!(receipt.emitted("Transfer"));

    assert_eq!(world.nft.owner_of(U256::from(1u64)).await.unwrap(), player());
    assert_eq!(world.market.get_proceeds(deployer()).await.unwrap(), PRICE);
    assert_eq!(world.market.get_listing(token).await.unwrap(), None);

    assert_revert(buyer.buy_item(token, PRICE).await, RevertReason::NotListed);
}

#[tokio::test]
async fn overpayment_is_credited_in_full() {
    let world = World::new();
    let token = world.mint_and_approve().await;
    world.market.list_item(token, U256::from(10u64)).await.unwrap();

    world
        .market
        .connect(player())
        .buy_item(token, U256::from(25u64))
        .await
        .unwrap();

    assert_eq!(
        world.market.get_proceeds(deployer()).await.unwrap(),
        U256::from(25u64)
    );
}

// ===========================================================================
// cancelListing / updateListing
// ===========================================================================

#[tokio::test]
async fn cancel_requires_a_listing() {
    let world = World::new();
    let token = world.mint_and_approve().await;

    assert_revert(world.market.cancel_listing(token).await, RevertReason::NotListed);

    world.market.list_item(token, PRICE).await.unwrap();
    let receipt = world.market.cancel_listing(token).await.unwrap();
    assert!(receipt.emitted("NftMarketplace__ItemCancelled"));
    assert_eq!(world.market.get_listing(token).await.unwrap(), None);
}

#[tokio::test]
async fn update_changes_price_and_emits_listing_event() {
    let world = World::new();
    let token = world.mint_and_approve().await;

    assert_revert(
        world.market.update_listing(token, U256::from(2u64)).await,
        RevertReason::NotListed,
    );

    world.market.list_item(token, PRICE).await.unwrap();
    let receipt = world
        .market
        .update_listing(token, U256::from(2u64))
        .await
        .unwrap();
    assert!(receipt.emitted("NftMarketplace__ItemListed"));

    let listing = world.market.get_listing(token).await.unwrap().unwrap();
    assert_eq!(listing.price, U256::from(2u64));
    assert_eq!(listing.seller, deployer());
}

#[tokio::test]
async fn cancel_checks_ownership_before_listing() {
    let world = World::new();
    let token = world.mint_and_approve().await;

    assert_revert(
        world.market.connect(player()).cancel_listing(token).await,
        RevertReason::NotOwner,
    );
}

#[tokio::test]
async fn update_checks_listing_before_ownership() {
    let world = World::new();
    let token = world.mint_and_approve().await;

    assert_revert(
        world
            .market
            .connect(player())
            .update_listing(token, U256::from(2u64))
            .await,
        RevertReason::NotListed,
    );
    assert_revert(
        world.market.update_listing(token, U256::ZERO).await,
        RevertReason::NotListed,
    );
}

#[tokio::test]
async fn update_to_zero_price_is_rejected() {
    let world = World::new();
    let token = world.mint_and_approve().await;
    world.market.list_item(token, PRICE).await.unwrap();

    assert_revert(
        world.market.update_listing(token, U256::ZERO).await,
        RevertReason::PriceMustBeAboveZero,
    );
    let listing = world.market.get_listing(token).await.unwrap().unwrap();
    assert_eq!(listing.price, PRICE);
}

// ===========================================================================
// Proceeds
// ===========================================================================

#[tokio::test]
async fn withdraw_without_proceeds_is_rejected() {
    let world = World::new();
    assert_revert(
        world.market.withdraw_proceeds().await,
        RevertReason::NoProceeds,
    );
}

#[tokio::test]
async fn withdraw_pays_out_and_resets_proceeds() {
    let world = World::new();
    let token = world.mint_and_approve().await;
    let price = U256::from(1_000_000u64);
    world.market.list_item(token, price).await.unwrap();
    world
        .market
        .connect(player())
        .buy_item(token, price)
        .await
        .unwrap();

    let before = world.chain.balance_of(deployer()).unwrap();
    world.market.withdraw_proceeds().await.unwrap();
    let after = world.chain.balance_of(deployer()).unwrap();

    assert_eq!(after - before, price);
    assert_eq!(world.market.get_proceeds(deployer()).await.unwrap(), U256::ZERO);
    assert_eq!(
        world.chain.balance_of(player()).unwrap(),
        U256::from(DEV_ACCOUNT_BALANCE) - price
    );
}
