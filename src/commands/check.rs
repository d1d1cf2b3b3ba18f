//! The `check` command: run the marketplace scenario suite.

use anyhow::{bail, Result};
use tracing::debug;

use crate::harness::scenarios::{self, DevFixtureFactory, FixtureFactory, RemoteFixtureFactory};
use crate::output::formatter;

use super::CommandContext;

/// Run every scenario against the in-process chain (`dev`) or against the
/// configured node. Fails if any scenario fails.
pub async fn run(ctx: &CommandContext, dev: bool) -> Result<()> {
    debug!(dev, network = %ctx.cfg.network.name, "starting check command");

    let factory: Box<dyn FixtureFactory> = if dev {
        Box::new(DevFixtureFactory::from_config(&ctx.cfg)?)
    } else {
        Box::new(RemoteFixtureFactory::new(ctx.cfg.clone()))
    };

    let report = scenarios::run_suite(factory.as_ref()).await;
    formatter::print_suite_report(&report);

    if !report.is_success() {
        bail!("{} of {} scenarios failed", report.failed(), report.results.len());
    }
    Ok(())
}
