use nftmarket::commands::{self, deploy::DeployTarget, CommandContext, GlobalOverrides};
use nftmarket::config::store::NamedAccount;
use nftmarket::output::formatter;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "nftmarket")]
#[command(about = "Deploy, drive and check an NftMarketplace contract")]
#[command(version)]
struct Cli {
    /// Named account to act as
    #[arg(long, global = true, value_enum, default_value = "deployer")]
    account: NamedAccount,

    /// Network name (overrides config and NFTMARKET_NETWORK)
    #[arg(long, global = true)]
    network: Option<String>,

    /// JSON-RPC endpoint (overrides config and NFTMARKET_RPC_URL)
    #[arg(long, global = true)]
    rpc_url: Option<String>,

    /// Machine-readable output
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a config.toml with local development defaults
    Init,
    /// Show the named accounts and their balances
    Accounts,
    /// Deploy contracts from their compiled artifacts
    Deploy {
        #[arg(value_enum, default_value = "all")]
        target: DeployTarget,
    },
    /// Mint a BasicNft, approve the marketplace and list it
    MintAndList {
        /// Price in the configured unit (default: pricing.list_price)
        #[arg(short, long)]
        price: Option<String>,
    },
    /// List a token for sale
    List {
        token_id: u64,
        /// Price in the configured unit
        price: String,
        /// Collection address (default: the deployed BasicNft)
        #[arg(long)]
        nft: Option<String>,
    },
    /// Buy a listed token
    Buy {
        token_id: u64,
        /// Payment in the configured unit (default: the listing price)
        #[arg(short, long)]
        value: Option<String>,
        #[arg(long)]
        nft: Option<String>,
    },
    /// Cancel a listing
    Cancel {
        token_id: u64,
        #[arg(long)]
        nft: Option<String>,
    },
    /// Change the price of a listing
    Update {
        token_id: u64,
        price: String,
        #[arg(long)]
        nft: Option<String>,
    },
    /// Withdraw the selected account's proceeds
    Withdraw,
    /// Show proceeds owed to a seller
    Proceeds {
        /// Seller address (default: the selected account)
        seller: Option<String>,
    },
    /// Show the listing of a token
    Listing {
        token_id: u64,
        #[arg(long)]
        nft: Option<String>,
    },
    /// Show the owner of a BasicNft token
    Owner { token_id: u64 },
    /// Run the marketplace scenario suite
    Check {
        /// Run in-process instead of against the configured node
        #[arg(long)]
        dev: bool,
    },
}

async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    let overrides = GlobalOverrides {
        network: cli.network,
        rpc_url: cli.rpc_url,
    };

    if let Commands::Init = cli.command {
        return commands::init::run().await;
    }

    let ctx = CommandContext::load(cli.account, &overrides)?;

    match cli.command {
        Commands::Init => Ok(()),
        Commands::Accounts => commands::accounts::run(&ctx).await,
        Commands::Deploy { target } => commands::deploy::run(&ctx, target).await,
        Commands::MintAndList { price } => commands::mint_and_list::run(&ctx, price).await,
        Commands::List {
            token_id,
            price,
            nft,
        } => commands::market::list(&ctx, token_id, &price, nft).await,
        Commands::Buy {
            token_id,
            value,
            nft,
        } => commands::market::buy(&ctx, token_id, value, nft).await,
        Commands::Cancel { token_id, nft } => commands::market::cancel(&ctx, token_id, nft).await,
        Commands::Update {
            token_id,
            price,
            nft,
        } => commands::market::update(&ctx, token_id, &price, nft).await,
        Commands::Withdraw => commands::market::withdraw(&ctx).await,
        Commands::Proceeds { seller } => commands::market::proceeds(&ctx, seller).await,
        Commands::Listing { token_id, nft } => commands::market::listing(&ctx, token_id, nft).await,
        Commands::Owner { token_id } => commands::market::owner(&ctx, token_id).await,
        Commands::Check { dev } => commands::check::run(&ctx, dev).await,
    }
}

#[tokio::main]
async fn main() {
    let filter =
        EnvFilter::try_from_env("NFTMARKET_LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new("warn"));

    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .with_timer(fmt::time::SystemTime)
        .init();

    let cli = Cli::parse();
    formatter::set_json_mode(cli.json);

    tracing::debug!("command dispatched");

    if let Err(err) = dispatch(cli).await {
        formatter::print_error(&err);
        std::process::exit(1);
    }
}
