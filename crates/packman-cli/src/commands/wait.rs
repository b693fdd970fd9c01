//! `packman wait` command implementation.

use packman_core::error::PackmanResult;
use tracing::info;

use super::CommandContext;

/// Block until the service is live or the configured wait runs out
pub async fn execute(ctx: &CommandContext) -> PackmanResult<bool> {
    match ctx.config.service_wait {
        Some(limit) => info!("Waiting up to {}ms for {}", limit.as_millis(), ctx.config.base_url),
        None => info!("Waiting for {}", ctx.config.base_url),
    }

    ctx.client.wait_for_service(ctx.config.service_wait).await?;
    ctx.output.success("Service is ready");
    Ok(true)
}
