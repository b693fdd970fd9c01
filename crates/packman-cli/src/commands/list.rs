//! `packman list` command implementation.

use packman_core::error::{PackmanError, PackmanResult};
use packman_core::types::ListResult;

use super::CommandContext;

pub async fn execute(query: Option<&str>, json: bool, ctx: &CommandContext) -> PackmanResult<bool> {
    let listing = ctx.client.list(query).await?;

    if json {
        let rendered = serde_json::to_string_pretty(&listing).map_err(|e| PackmanError::JsonParse {
            message: e.to_string(),
        })?;
        ctx.output.plain(&rendered);
        return Ok(true);
    }

    for result in &listing.results {
        ctx.output.plain(&format_row(result));
    }
    ctx.output.info(&format!("{} of {} package(s)", listing.results.len(), listing.total));
    Ok(true)
}

/// `group:name:version  path  [installed]`
pub fn format_row(result: &ListResult) -> String {
    let id = match result.pack_id() {
        Some(pack_id) => pack_id.to_string(),
        None => format!("{}:{}:{}", result.group, result.name, result.version),
    };
    let installed = if result.is_installed() { "  [installed]" } else { "" };
    format!("{}  {}{}", id, result.path, installed)
}
