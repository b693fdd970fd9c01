//! `packman upload` command implementation.

use std::path::Path;

use packman_core::error::PackmanResult;

use super::{install, CommandContext};
use crate::InstallArgs;

/// Upload an archive, then install it when `install_args` is given
pub async fn execute(
    file: &Path,
    force: bool,
    install_args: Option<&InstallArgs>,
    ctx: &CommandContext,
) -> PackmanResult<bool> {
    let pack_id = ctx.client.identify(file)?;
    let response = ctx.client.upload(file, force, Some(&pack_id)).await?;

    if !response.success {
        ctx.output.error(&format!("Upload of {} failed: {}", pack_id, response.message));
        return Ok(false);
    }
    ctx.output.success(&format!("Uploaded {} to {}", pack_id, response.path));

    match install_args {
        Some(args) => install::install(&pack_id, args, ctx).await,
        None => Ok(true),
    }
}
