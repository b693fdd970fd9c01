//! `packman identify` command implementation.

use std::path::Path;

use packman_core::error::PackmanResult;

use super::CommandContext;

/// Print the id and installation path read from a package archive
pub async fn execute(file: &Path, ctx: &CommandContext) -> PackmanResult<bool> {
    let pack_id = ctx.client.identify(file)?;
    ctx.output.plain(&pack_id.to_string());
    ctx.output.info(pack_id.installation_path());
    Ok(true)
}
