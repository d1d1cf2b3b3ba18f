use anyhow::Result;
use tracing::debug;

use crate::config::store::{self, Config};
use crate::output::formatter;

/// Run the `init` command: write a `config.toml` with local development
/// defaults. Works offline and never overwrites an existing file.
pub async fn run() -> Result<()> {
    debug!("starting init command");

    if store::exists()? {
        formatter::print_warning(
            "Configuration already exists. Edit config.toml or delete it to start over.",
        );
        return Ok(());
    }

    let cfg = Config::default();
    store::save(&cfg)?;

    let path = store::config_dir()?.join("config.toml");
    formatter::print_success(&format!("Configuration saved to {}", path.display()));
    formatter::print_info(&format!(
        "Network: {} ({}), named accounts: deployer, player",
        cfg.network.name, cfg.network.chain_rpc
    ));
    formatter::print_info("Run `nftmarket deploy` to deploy the contracts.");

    Ok(())
}
