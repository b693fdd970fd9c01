//! `packman install` command implementation.

use packman_core::error::PackmanResult;
use packman_core::types::PackId;
use tracing::debug;

use super::{report_detailed, resolve_package, CommandContext};
use crate::output::progress::ConsoleListener;
use crate::InstallArgs;

/// Execute the `packman install` command
pub async fn execute(package: &str, args: &InstallArgs, ctx: &CommandContext) -> PackmanResult<bool> {
    let pack_id = resolve_package(package, ctx)?;
    install(&pack_id, args, ctx).await
}

/// Install an already identified package, streaming progress to the console
pub async fn install(pack_id: &PackId, args: &InstallArgs, ctx: &CommandContext) -> PackmanResult<bool> {
    let options = ctx.install_options(args)?;
    debug!(
        "Install options for {}: recursive={}, autosave={}, ac_handling={:?}",
        pack_id, options.recursive, options.autosave, options.ac_handling
    );

    let mut listener = ConsoleListener::stdout(ctx.output.colors(), ctx.verbose);
    let response = ctx.client.install(Some(pack_id), &options, &mut listener).await?;
    if let Some(summary) = listener.summary() {
        ctx.output.info(&summary);
    }

    Ok(report_detailed("install", &response, ctx))
}
