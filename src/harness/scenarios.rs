//! Marketplace scenario suite.
//!
//! Every scenario gets a fresh [`Fixture`] from a [`FixtureFactory`]: both
//! contracts newly deployed, token 0 minted, approved and listed at
//! [`PRICE`], tokens 1 and 2 minted but not approved. All mints and listings
//! belong to the deployer; the player is the second party.

use std::fmt;
use std::path::Path;

use alloy::primitives::{Address, U256};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::chain::client::ChainClient;
use crate::chain::signer::TransactionSigner;
use crate::chain::types::TokenRef;
use crate::config::store::{Config, NamedAccount};
use crate::engine::deploy::Artifact;
use crate::harness::assertions::{expect_eq, expect_event, expect_ok, expect_revert};
use crate::market::devchain::DevChain;
use crate::market::{Marketplace, NftCollection, RevertReason};

/// Listing price used throughout the suite, in base units.
pub const PRICE: U256 = U256::from_limbs([1, 0, 0, 0]);

const ITEM_LISTED: &str = "NftMarketplace__ItemListed";
const ITEM_BOUGHT: &str = "ItemBought";
const ITEM_CANCELLED: &str = "NftMarketplace__ItemCancelled";

// ---------------------------------------------------------------------------
// Fixture
// ---------------------------------------------------------------------------

/// Freshly deployed contracts plus handles for both named accounts.
pub struct Fixture {
    pub deployer: Address,
    pub player: Address,
    /// Marketplace as the deployer.
    pub market: Box<dyn Marketplace>,
    /// Marketplace as the player.
    pub player_market: Box<dyn Marketplace>,
    /// Collection as the deployer.
    pub nft: Box<dyn NftCollection>,
}

impl Fixture {
    pub fn token(&self, id: u64) -> TokenRef {
        self.nft.token(U256::from(id))
    }

    /// Mint token 0, approve and list it, then mint tokens 1 and 2.
    pub async fn prepare(self) -> Result<Self> {
        expect_ok(self.nft.mint_nft().await, "mint token 0")?;
        expect_ok(
            self.nft.approve(self.market.address(), U256::ZERO).await,
            "approve token 0",
        )?;
        expect_ok(self.market.list_item(self.token(0), PRICE).await, "list token 0")?;
        expect_ok(self.nft.mint_nft().await, "mint token 1")?;
        expect_ok(self.nft.mint_nft().await, "mint token 2")?;
        Ok(self)
    }

    async fn approve(&self, id: u64) -> Result<()> {
        expect_ok(
            self.nft.approve(self.market.address(), U256::from(id)).await,
            &format!("approve token {id}"),
        )?;
        Ok(())
    }
}

/// Source of fresh fixtures.
#[async_trait]
pub trait FixtureFactory: Send + Sync {
    /// Network the fixtures live on.
    fn network(&self) -> &str;

    /// The suite only runs against development networks.
    fn is_development(&self) -> bool;

    async fn fresh(&self) -> Result<Fixture>;
}

/// Fixtures on a new in-process chain each time.
pub struct DevFixtureFactory {
    deployer: Address,
    player: Address,
}

impl DevFixtureFactory {
    pub fn new(deployer: Address, player: Address) -> Self {
        Self { deployer, player }
    }

    /// Use the configured named accounts' addresses.
    pub fn from_config(config: &Config) -> Result<Self> {
        let deployer = TransactionSigner::for_account(&config.accounts, NamedAccount::Deployer)?;
        let player = TransactionSigner::for_account(&config.accounts, NamedAccount::Player)?;
        Ok(Self::new(deployer.address(), player.address()))
    }
}

#[async_trait]
impl FixtureFactory for DevFixtureFactory {
    fn network(&self) -> &str {
        "devchain"
    }

    fn is_development(&self) -> bool {
        true
    }

    async fn fresh(&self) -> Result<Fixture> {
        let chain = DevChain::with_accounts(&[self.deployer, self.player]);
        let market = chain.deploy_marketplace(self.deployer)?;
        let nft = chain.deploy_basic_nft(self.deployer)?;

        Fixture {
            deployer: self.deployer,
            player: self.player,
            market: Box::new(chain.marketplace(market, self.deployer)),
            player_market: Box::new(chain.marketplace(market, self.player)),
            nft: Box::new(chain.basic_nft(nft, self.deployer)),
        }
        .prepare()
        .await
    }
}

/// Fixtures deployed from compiled artifacts onto the configured node.
///
/// Artifacts are read per fixture, so a skipped suite never touches them.
pub struct RemoteFixtureFactory {
    config: Config,
}

impl RemoteFixtureFactory {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    fn load_artifacts(&self) -> Result<(Artifact, Artifact)> {
        let marketplace = Artifact::load(Path::new(&self.config.deploy.marketplace_artifact))?;
        let basic_nft = Artifact::load(Path::new(&self.config.deploy.basic_nft_artifact))?;
        Ok((marketplace, basic_nft))
    }
}

#[async_trait]
impl FixtureFactory for RemoteFixtureFactory {
    fn network(&self) -> &str {
        &self.config.network.name
    }

    fn is_development(&self) -> bool {
        self.config.network.is_development()
    }

    async fn fresh(&self) -> Result<Fixture> {
        let (marketplace, basic_nft) = self.load_artifacts()?;
        let deployer = ChainClient::for_account(&self.config, NamedAccount::Deployer).await?;
        let player = ChainClient::for_account(&self.config, NamedAccount::Player).await?;

        let market = deployer
            .deploy_contract(marketplace.bytecode)
            .await
            .context("failed to deploy NftMarketplace fixture")?
            .address;
        let nft = deployer
            .deploy_contract(basic_nft.bytecode)
            .await
            .context("failed to deploy BasicNft fixture")?
            .address;
        debug!(%market, %nft, "fixture contracts deployed");

        Fixture {
            deployer: deployer.sender().context("deployer client cannot sign")?,
            player: player.sender().context("player client cannot sign")?,
            market: Box::new(deployer.marketplace(market)?),
            player_market: Box::new(player.marketplace(market)?),
            nft: Box::new(deployer.basic_nft(nft)?),
        }
        .prepare()
        .await
    }
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Scenario {
    ListRequiresApproval,
    ListRejectsZeroPrice,
    ListEmitsItemListed,
    ListRejectsNonOwner,
    ListRejectsRelisting,
    BuyRejectsLowPayment,
    BuyTransfersToken,
    BuyRemovesListing,
    BuyCreditsFullPayment,
    BuyFreshListing,
    CancelRejectsNonOwner,
    CancelRejectsUnlisted,
    CancelRemovesListing,
    UpdateRejectsNonOwner,
    UpdateRejectsUnlisted,
    UpdateChangesPrice,
    WithdrawRequiresProceeds,
    WithdrawClearsProceeds,
}

impl Scenario {
    pub const ALL: &'static [Scenario] = &[
        Scenario::ListRequiresApproval,
        Scenario::ListRejectsZeroPrice,
        Scenario::ListEmitsItemListed,
        Scenario::ListRejectsNonOwner,
        Scenario::ListRejectsRelisting,
        Scenario::BuyRejectsLowPayment,
        Scenario::BuyTransfersToken,
        Scenario::BuyRemovesListing,
        Scenario::BuyCreditsFullPayment,
        Scenario::BuyFreshListing,
        Scenario::CancelRejectsNonOwner,
        Scenario::CancelRejectsUnlisted,
        Scenario::CancelRemovesListing,
        Scenario::UpdateRejectsNonOwner,
        Scenario::UpdateRejectsUnlisted,
        Scenario::UpdateChangesPrice,
        Scenario::WithdrawRequiresProceeds,
        Scenario::WithdrawClearsProceeds,
    ];

    /// Contract function under test.
    pub fn group(self) -> &'static str {
        use Scenario::*;
        match self {
            ListRequiresApproval | ListRejectsZeroPrice | ListEmitsItemListed
            | ListRejectsNonOwner | ListRejectsRelisting => "listItem",
            BuyRejectsLowPayment | BuyTransfersToken | BuyRemovesListing
            | BuyCreditsFullPayment | BuyFreshListing => "buyItem",
            CancelRejectsNonOwner | CancelRejectsUnlisted | CancelRemovesListing => {
                "cancelListing"
            }
            UpdateRejectsNonOwner | UpdateRejectsUnlisted | UpdateChangesPrice => "updateListing",
            WithdrawRequiresProceeds | WithdrawClearsProceeds => "withdrawProceeds",
        }
    }

    pub fn description(self) -> &'static str {
        use Scenario::*;
        match self {
            ListRequiresApproval => "reverts if the marketplace is not approved",
            ListRejectsZeroPrice => "reverts if the price is zero",
            ListEmitsItemListed => "emits an event after listing an item",
            ListRejectsNonOwner => "only the owner can list",
            ListRejectsRelisting => "reverts if the item is already listed",
            BuyRejectsLowPayment => "reverts if the payment is below the price",
            BuyTransfersToken => "transfers the token to the buyer and credits the seller",
            BuyRemovesListing => "cannot buy the same listing twice",
            BuyCreditsFullPayment => "credits the full payment when overpaying",
            BuyFreshListing => "buys a newly listed token",
            CancelRejectsNonOwner => "only the owner can cancel",
            CancelRejectsUnlisted => "reverts if there is no listing",
            CancelRemovesListing => "emits an event and removes the listing",
            UpdateRejectsNonOwner => "only the owner can update",
            UpdateRejectsUnlisted => "reverts if the item is not listed",
            UpdateChangesPrice => "updates the price and emits an event",
            WithdrawRequiresProceeds => "reverts when there are no proceeds",
            WithdrawClearsProceeds => "withdraws proceeds and resets them to zero",
        }
    }

    /// Run against an already prepared fixture.
    pub async fn run(self, fx: &Fixture) -> Result<()> {
        use Scenario::*;
        match self {
            ListRequiresApproval => list_requires_approval(fx).await,
            ListRejectsZeroPrice => list_rejects_zero_price(fx).await,
            ListEmitsItemListed => list_emits_item_listed(fx).await,
            ListRejectsNonOwner => list_rejects_non_owner(fx).await,
            ListRejectsRelisting => list_rejects_relisting(fx).await,
            BuyRejectsLowPayment => buy_rejects_low_payment(fx).await,
            BuyTransfersToken => buy_transfers_token(fx).await,
            BuyRemovesListing => buy_removes_listing(fx).await,
            BuyCreditsFullPayment => buy_credits_full_payment(fx).await,
            BuyFreshListing => buy_fresh_listing(fx).await,
            CancelRejectsNonOwner => cancel_rejects_non_owner(fx).await,
            CancelRejectsUnlisted => cancel_rejects_unlisted(fx).await,
            CancelRemovesListing => cancel_removes_listing(fx).await,
            UpdateRejectsNonOwner => update_rejects_non_owner(fx).await,
            UpdateRejectsUnlisted => update_rejects_unlisted(fx).await,
            UpdateChangesPrice => update_changes_price(fx).await,
            WithdrawRequiresProceeds => withdraw_requires_proceeds(fx).await,
            WithdrawClearsProceeds => withdraw_clears_proceeds(fx).await,
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.group(), self.description())
    }
}

async fn list_requires_approval(fx: &Fixture) -> Result<()> {
    expect_revert(
        fx.market.list_item(fx.token(1), PRICE).await,
        RevertReason::NotApprovedForMarketplace,
    )
}

async fn list_rejects_zero_price(fx: &Fixture) -> Result<()> {
    expect_revert(
        fx.market.list_item(fx.token(1), U256::ZERO).await,
        RevertReason::PriceMustBeAboveZero,
    )
}

async fn list_emits_item_listed(fx: &Fixture) -> Result<()> {
    fx.approve(1).await?;
    expect_event(fx.market.list_item(fx.token(1), PRICE).await, ITEM_LISTED)?;

    let listing = expect_ok(fx.market.get_listing(fx.token(1)).await, "getListing")?
        .context("token 1 should be listed")?;
    expect_eq(listing.seller, fx.deployer, "listing seller")?;
    expect_eq(listing.price, PRICE, "listing price")
}

async fn list_rejects_non_owner(fx: &Fixture) -> Result<()> {
    expect_revert(
        fx.player_market.list_item(fx.token(1), PRICE).await,
        RevertReason::NotOwner,
    )
}

async fn list_rejects_relisting(fx: &Fixture) -> Result<()> {
    expect_revert(
        fx.market.list_item(fx.token(0), PRICE).await,
        RevertReason::AlreadyListed,
    )
}

async fn buy_rejects_low_payment(fx: &Fixture) -> Result<()> {
    expect_revert(
        fx.player_market.buy_item(fx.token(0), U256::ZERO).await,
        RevertReason::PriceNotMet,
    )
}

async fn buy_transfers_token(fx: &Fixture) -> Result<()> {
    expect_event(fx.player_market.buy_item(fx.token(0), PRICE).await, ITEM_BOUGHT)?;

    let owner = expect_ok(fx.nft.owner_of(U256::ZERO).await, "ownerOf")?;
    expect_eq(owner, fx.player, "new owner")?;

    let proceeds = expect_ok(fx.market.get_proceeds(fx.deployer).await, "getProceeds")?;
    expect_eq(proceeds, PRICE, "seller proceeds")
}

async fn buy_removes_listing(fx: &Fixture) -> Result<()> {
    expect_ok(fx.player_market.buy_item(fx.token(0), PRICE).await, "first buy")?;

    let listing = expect_ok(fx.market.get_listing(fx.token(0)).await, "getListing")?;
    expect_eq(listing, None, "listing after purchase")?;

    expect_revert(
        fx.player_market.buy_item(fx.token(0), PRICE).await,
        RevertReason::NotListed,
    )
}

async fn buy_credits_full_payment(fx: &Fixture) -> Result<()> {
    let payment = PRICE * U256::from(3u64);
    expect_ok(fx.player_market.buy_item(fx.token(0), payment).await, "buyItem")?;

    let proceeds = expect_ok(fx.market.get_proceeds(fx.deployer).await, "getProceeds")?;
    expect_eq(proceeds, payment, "seller proceeds")
}

async fn buy_fresh_listing(fx: &Fixture) -> Result<()> {
    fx.approve(1).await?;
    expect_ok(fx.market.list_item(fx.token(1), PRICE).await, "list token 1")?;
    expect_event(fx.player_market.buy_item(fx.token(1), PRICE).await, ITEM_BOUGHT)?;

    let owner = expect_ok(fx.nft.owner_of(U256::from(1u64)).await, "ownerOf")?;
    expect_eq(owner, fx.player, "new owner")?;

    let proceeds = expect_ok(fx.market.get_proceeds(fx.deployer).await, "getProceeds")?;
    expect_eq(proceeds, PRICE, "seller proceeds")?;

    let listing = expect_ok(fx.market.get_listing(fx.token(1)).await, "getListing")?;
    expect_eq(listing, None, "listing after purchase")
}

async fn cancel_rejects_non_owner(fx: &Fixture) -> Result<()> {
    expect_revert(
        fx.player_market.cancel_listing(fx.token(0)).await,
        RevertReason::NotOwner,
    )
}

async fn cancel_rejects_unlisted(fx: &Fixture) -> Result<()> {
    expect_ok(fx.nft.mint_nft().await, "mint")?;
    let counter = expect_ok(fx.nft.token_counter().await, "getTokenCounter")?;
    let latest = fx.nft.token(counter - U256::from(1u64));

    expect_revert(fx.market.cancel_listing(latest).await, RevertReason::NotListed)
}

async fn cancel_removes_listing(fx: &Fixture) -> Result<()> {
    expect_event(fx.market.cancel_listing(fx.token(0)).await, ITEM_CANCELLED)?;

    let listing = expect_ok(fx.market.get_listing(fx.token(0)).await, "getListing")?;
    expect_eq(listing, None, "listing after cancel")
}

async fn update_rejects_non_owner(fx: &Fixture) -> Result<()> {
    expect_revert(
        fx.player_market.update_listing(fx.token(0), PRICE * U256::from(2u64)).await,
        RevertReason::NotOwner,
    )
}

async fn update_rejects_unlisted(fx: &Fixture) -> Result<()> {
    expect_revert(
        fx.market.update_listing(fx.token(1), PRICE).await,
        RevertReason::NotListed,
    )
}

async fn update_changes_price(fx: &Fixture) -> Result<()> {
    let new_price = PRICE * U256::from(2u64);
    fx.approve(1).await?;
    expect_ok(fx.market.list_item(fx.token(1), PRICE).await, "list token 1")?;
    expect_event(fx.market.update_listing(fx.token(1), new_price).await, ITEM_LISTED)?;

    let listing = expect_ok(fx.market.get_listing(fx.token(1)).await, "getListing")?
        .context("token 1 should still be listed")?;
    expect_eq(listing.price, new_price, "updated price")
}

async fn withdraw_requires_proceeds(fx: &Fixture) -> Result<()> {
    expect_revert(fx.market.withdraw_proceeds().await, RevertReason::NoProceeds)
}

async fn withdraw_clears_proceeds(fx: &Fixture) -> Result<()> {
    expect_ok(fx.player_market.buy_item(fx.token(0), PRICE).await, "buyItem")?;

    let before = expect_ok(fx.market.get_proceeds(fx.deployer).await, "getProceeds")?;
    expect_eq(before, PRICE, "proceeds before withdraw")?;

    expect_ok(fx.market.withdraw_proceeds().await, "withdrawProceeds")?;

    let after = expect_ok(fx.market.get_proceeds(fx.deployer).await, "getProceeds")?;
    expect_eq(after, U256::ZERO, "proceeds after withdraw")
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "lowercase")]
pub enum Outcome {
    Passed,
    Failed(String),
    Skipped(String),
}

#[derive(Clone, Debug, Serialize)]
pub struct ScenarioResult {
    pub scenario: Scenario,
    pub group: &'static str,
    pub description: &'static str,
    pub outcome: Outcome,
}

#[derive(Clone, Debug, Serialize)]
pub struct SuiteReport {
    pub network: String,
    pub results: Vec<ScenarioResult>,
}

impl SuiteReport {
    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.results.iter().filter(|r| pred(&r.outcome)).count()
    }

    pub fn passed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Passed))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Skipped(_)))
    }

    /// `true` unless some scenario failed.
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}

/// Run one scenario on a fresh fixture.
pub async fn run_scenario(factory: &dyn FixtureFactory, scenario: Scenario) -> Outcome {
    let fixture = match factory.fresh().await {
        Ok(fixture) => fixture,
        Err(e) => return Outcome::Failed(format!("fixture setup failed: {e:#}")),
    };

    match scenario.run(&fixture).await {
        Ok(()) => Outcome::Passed,
        Err(e) => Outcome::Failed(format!("{e:#}")),
    }
}

/// Run every scenario. On a non-development network nothing runs and every
/// scenario is reported as skipped.
pub async fn run_suite(factory: &dyn FixtureFactory) -> SuiteReport {
    let network = factory.network().to_string();
    let skip = !factory.is_development();
    if skip {
        warn!(%network, "not a development network; skipping scenario suite");
    }

    let mut results = Vec::with_capacity(Scenario::ALL.len());
    for &scenario in Scenario::ALL {
        let outcome = if skip {
            Outcome::Skipped(format!("{network} is not a development network"))
        } else {
            run_scenario(factory, scenario).await
        };
        info!(%scenario, ?outcome, "scenario finished");

        results.push(ScenarioResult {
            scenario,
            group: scenario.group(),
            description: scenario.description(),
            outcome,
        });
    }

    SuiteReport { network, results }
}
