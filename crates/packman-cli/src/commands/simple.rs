//! JSON package commands: delete, replicate, exists.

use packman_core::error::PackmanResult;
use packman_core::types::SimpleResponse;

use super::{resolve_package, CommandContext};

pub async fn delete(package: &str, ctx: &CommandContext) -> PackmanResult<bool> {
    let pack_id = resolve_package(package, ctx)?;
    let response = ctx.client.delete(Some(&pack_id)).await?;
    Ok(report_simple("delete", &response, ctx))
}

pub async fn replicate(package: &str, ctx: &CommandContext) -> PackmanResult<bool> {
    let pack_id = resolve_package(package, ctx)?;
    let response = ctx.client.replicate(Some(&pack_id)).await?;
    Ok(report_simple("replicate", &response, ctx))
}

/// Succeeds only when the package is present on the server
pub async fn exists(package: &str, ctx: &CommandContext) -> PackmanResult<bool> {
    let pack_id = resolve_package(package, ctx)?;
    let exists = ctx.client.exists_on_server(Some(&pack_id)).await?;
    if exists {
        ctx.output.success(&format!("{} exists", pack_id));
    } else {
        ctx.output.warn(&format!("{} not found on the server", pack_id));
    }
    Ok(exists)
}

fn report_simple(operation: &str, response: &SimpleResponse, ctx: &CommandContext) -> bool {
    if response.success {
        ctx.output.success(&response.message);
    } else {
        ctx.output.error(&format!("{} failed: {}", operation, response.message));
    }
    response.success
}
