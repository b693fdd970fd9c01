//! Streaming package commands: uninstall, build, rewrap, dry-run, contents.

use packman_core::error::PackmanResult;

use super::{report_detailed, resolve_package, CommandContext};
use crate::output::progress::ConsoleListener;

/// Package commands answered with a console transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Uninstall,
    Build,
    Rewrap,
    DryRun,
    Contents,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Uninstall => "uninstall",
            Operation::Build => "build",
            Operation::Rewrap => "rewrap",
            Operation::DryRun => "dry-run",
            Operation::Contents => "contents",
        }
    }
}

pub async fn execute(operation: Operation, package: &str, ctx: &CommandContext) -> PackmanResult<bool> {
    let pack_id = resolve_package(package, ctx)?;
    let mut listener = ConsoleListener::stdout(ctx.output.colors(), ctx.verbose);

    let response = match operation {
        Operation::Uninstall => ctx.client.uninstall(Some(&pack_id), &mut listener).await?,
        Operation::Build => ctx.client.build(Some(&pack_id), &mut listener).await?,
        Operation::Rewrap => ctx.client.rewrap(Some(&pack_id), &mut listener).await?,
        Operation::DryRun => ctx.client.dry_run(Some(&pack_id), &mut listener).await?,
        Operation::Contents => ctx.client.contents(Some(&pack_id), &mut listener).await?,
    };
    if let Some(summary) = listener.summary() {
        ctx.output.info(&summary);
    }

    Ok(report_detailed(operation.name(), &response, ctx))
}
