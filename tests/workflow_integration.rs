//! Cross-module integration tests: config store, named accounts, deployment
//! records and the mint-and-list workflow working together.
//!
//! Tests that mutate environment variables hold `ENV_LOCK`.

use std::env;
use std::fs;
use std::sync::Mutex;

use alloy::primitives::{Address, B256, U256};

use nftmarket::chain::contracts::names;
use nftmarket::chain::signer::TransactionSigner;
use nftmarket::chain::types::Denomination;
use nftmarket::commands::{CommandContext, GlobalOverrides};
use nftmarket::config::store::{self, Config, NamedAccount};
use nftmarket::engine::deploy::{resolve_address, Artifact, DeploymentRecord, DeploymentStore};
use nftmarket::engine::workflow::{mint_and_list, MintAndListStep};
use nftmarket::market::devchain::DevChain;
use nftmarket::market::{CallError, Marketplace, NftCollection};

/// Mutex to serialise tests that mutate environment variables.
static ENV_LOCK: Mutex<()> = Mutex::new(());

const ENV_VARS: [&str; 5] = [
    "NFTMARKET_RPC_URL",
    "NFTMARKET_NETWORK",
    "NFTMARKET_DEPLOYER_KEY",
    "NFTMARKET_PLAYER_KEY",
    "ETHERSCAN_API_KEY",
];

/// Helper: point `NFTMARKET_HOME` at a fresh temp directory with every
/// override variable cleared, run the closure, then restore everything.
fn with_temp_home<F: FnOnce(&std::path::Path)>(f: F) {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());

    let tmp = tempfile::tempdir().expect("failed to create temp dir");
    let prev_home = env::var("NFTMARKET_HOME").ok();
    let prev: Vec<Option<String>> = ENV_VARS.iter().map(|v| env::var(v).ok()).collect();

    env::set_var("NFTMARKET_HOME", tmp.path());
    for var in ENV_VARS {
        env::remove_var(var);
    }

    f(tmp.path());

    for (var, value) in ENV_VARS.iter().zip(prev) {
        match value {
            Some(v) => env::set_var(var, v),
            None => env::remove_var(var),
        }
    }
    match prev_home {
        Some(v) => env::set_var("NFTMARKET_HOME", v),
        None => env::remove_var("NFTMARKET_HOME"),
    }
}

// ===========================================================================
// 1. Configuration and named accounts
// ===========================================================================

#[test]
fn default_config_names_anvil_accounts() {
    let cfg = Config::default();

    let deployer = TransactionSigner::for_account(&cfg.accounts, NamedAccount::Deployer).unwrap();
    let player = TransactionSigner::for_account(&cfg.accounts, NamedAccount::Player).unwrap();

    assert_eq!(
        deployer.address(),
        "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse::<Address>().unwrap()
    );
    assert_eq!(
        player.address(),
        "0x70997970C51812dc3A010C7d01b50e0d17dc79C8".parse::<Address>().unwrap()
    );
    assert!(cfg.network.is_development());
}

#[test]
fn missing_player_key_names_the_env_var() {
    let mut cfg = Config::default();
    cfg.accounts.player_key.clear();

    let err = TransactionSigner::for_account(&cfg.accounts, NamedAccount::Player).unwrap_err();
    assert!(err.to_string().contains("NFTMARKET_PLAYER_KEY"));
}

#[test]
fn precedence_file_then_env_then_flags() {
    with_temp_home(|_| {
        let mut cfg = Config::default();
        cfg.network.name = "sepolia".to_string();
        cfg.network.chain_rpc = "http://file:8545".to_string();
        cfg.pricing.unit = Denomination::Gwei;
        store::save(&cfg).unwrap();

        env::set_var("NFTMARKET_RPC_URL", "http://env:8545");

        let ctx = CommandContext::load(NamedAccount::Player, &GlobalOverrides::default()).unwrap();
        assert_eq!(ctx.cfg.network.name, "sepolia");
        assert_eq!(ctx.cfg.network.chain_rpc, "http://env:8545");
        assert_eq!(ctx.cfg.pricing.unit, Denomination::Gwei);
        assert_eq!(ctx.account, NamedAccount::Player);

        let overrides = GlobalOverrides {
            network: Some("localhost".to_string()),
            rpc_url: Some("http://flag:8545".to_string()),
        };
        let ctx = CommandContext::load(NamedAccount::Deployer, &overrides).unwrap();
        assert_eq!(ctx.cfg.network.chain_rpc, "http://flag:8545");
        assert!(ctx.cfg.network.is_development());
    });
}

#[test]
fn context_without_config_file_uses_defaults() {
    with_temp_home(|home| {
        assert!(!store::exists().unwrap());

        let ctx =
            CommandContext::load(NamedAccount::Deployer, &GlobalOverrides::default()).unwrap();
        assert_eq!(ctx.cfg.network.chain_rpc, "http://127.0.0.1:8545");
        assert!(!home.join("config.toml").exists());
    });
}

// ===========================================================================
// 2. Deployment records and address resolution
// ===========================================================================

#[test]
fn recorded_deployments_resolve_per_network() {
    let tmp = tempfile::tempdir().unwrap();
    let mut cfg = Config::default();
    cfg.deploy.deployments_dir = tmp.path().display().to_string();

    let record = DeploymentRecord {
        name: names::NFT_MARKETPLACE.to_string(),
        address: Address::repeat_byte(0x42),
        tx_hash: B256::repeat_byte(0x01),
        block_number: Some(2),
        network: "localhost".to_string(),
        chain_id: 31337,
        deployed_at: 1_700_000_000,
    };
    DeploymentStore::for_config(&cfg).save(&record).unwrap();

    assert_eq!(
        resolve_address(&cfg, names::NFT_MARKETPLACE).unwrap(),
        Address::repeat_byte(0x42)
    );

    cfg.network.name = "sepolia".to_string();
    assert!(resolve_address(&cfg, names::NFT_MARKETPLACE).is_err());
}

#[test]
fn artifacts_load_from_disk() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("BasicNft.json");
    let json = serde_json::json!({
        "contractName": "BasicNft",
        "sourceName": "contracts/test/BasicNft.sol",
        "abi": [],
        "bytecode": "0x60806040",
    });
    fs::write(&path, json.to_string()).unwrap();

    let artifact = Artifact::load(&path).unwrap();
    assert_eq!(artifact.bytecode.len(), 4);
    assert_eq!(
        artifact.fully_qualified_name(names::BASIC_NFT),
        "contracts/test/BasicNft.sol:BasicNft"
    );

    assert!(Artifact::load(&tmp.path().join("missing.json")).is_err());
}

// ===========================================================================
// 3. Mint-and-list on the in-process chain
// ===========================================================================

#[tokio::test]
async fn mint_and_list_then_player_buys() {
    let cfg = Config::default();
    let deployer = TransactionSigner::for_account(&cfg.accounts, NamedAccount::Deployer)
        .unwrap()
        .address();
    let player = TransactionSigner::for_account(&cfg.accounts, NamedAccount::Player)
        .unwrap()
        .address();

    let chain = DevChain::with_accounts(&[deployer, player]);
    let market_address = chain.deploy_marketplace(deployer).unwrap();
    let nft_address = chain.deploy_basic_nft(deployer).unwrap();
    let market = chain.marketplace(market_address, deployer);
    let nft = chain.basic_nft(nft_address, deployer);

    let price = cfg.pricing.unit.parse_amount(&cfg.pricing.list_price).unwrap();
    assert_eq!(price, U256::from(100_000_000_000_000_000u64));

    let mut lines = Vec::new();
    let outcome = mint_and_list(&market, &nft, price, |step| lines.push(step.to_string()))
        .await
        .unwrap();
    assert_eq!(
        lines,
        ["Minting .....", "Approving Nft....", "Listing Nft...", "Listed!"]
    );

    let receipt = market
        .connect(player)
        .buy_item(outcome.token, price)
        .await
        .unwrap();
    assert!(receipt.emitted("ItemBought"));
    assert_eq!(nft.owner_of(outcome.token.token_id).await.unwrap(), player);
    assert_eq!(market.get_proceeds(deployer).await.unwrap(), price);
}

#[tokio::test]
async fn second_mint_and_list_uses_next_token_id() {
    let deployer = Address::repeat_byte(0x01);
    let chain = DevChain::with_accounts(&[deployer]);
    let market = chain.marketplace(chain.deploy_marketplace(deployer).unwrap(), deployer);
    let nft = chain.basic_nft(chain.deploy_basic_nft(deployer).unwrap(), deployer);

    let first = mint_and_list(&market, &nft, U256::from(1u64), |_: MintAndListStep| {})
        .await
        .unwrap();
    let second = mint_and_list(&market, &nft, U256::from(1u64), |_: MintAndListStep| {})
        .await
        .unwrap();

    assert_eq!(first.token.token_id, U256::ZERO);
    assert_eq!(second.token.token_id, U256::from(1u64));
}

#[tokio::test]
async fn workflow_stops_when_mint_reverts() {
    let deployer = Address::repeat_byte(0x01);
    let chain = DevChain::with_accounts(&[deployer]);
    let market = chain.marketplace(chain.deploy_marketplace(deployer).unwrap(), deployer);
    // No contract at this address: the mint reverts.
    let nft = chain.basic_nft(Address::repeat_byte(0x77), deployer);

    let mut steps = Vec::new();
    let err = mint_and_list(&market, &nft, U256::from(1u64), |step| steps.push(step))
        .await
        .unwrap_err();

    assert!(err.downcast_ref::<CallError>().is_some());
    assert_eq!(steps, vec![MintAndListStep::Minting]);
}
