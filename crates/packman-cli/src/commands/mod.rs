//! Command implementations and dispatch logic.
//!
//! Each command is an async function taking a [`CommandContext`] and
//! returning whether the operation succeeded; `Err` is reserved for
//! failures to talk to the service at all.

use std::path::Path;

use camino::{Utf8Path, Utf8PathBuf};
use packman_client::{InstallOptions, PackageManagerClient, TransportConfig};
use packman_config::{ConfigLoader, PackmanConfig};
use packman_core::error::{PackmanError, PackmanResult};
use packman_core::types::{DetailedResponse, PackId};
use tracing::info;

pub mod detailed;
pub mod identify;
pub mod install;
pub mod list;
pub mod simple;
pub mod upload;
pub mod wait;


use crate::output::OutputHandler;
use crate::{Commands, InstallArgs, ServerArgs};

/// Shared context for all commands
pub struct CommandContext {
    pub config: PackmanConfig,
    pub client: PackageManagerClient,
    pub output: OutputHandler,
    pub verbose: bool,
}

impl CommandContext {
    /// Resolve configuration from `cwd` upward plus the command line flags
    pub async fn load(cwd: &Utf8Path, server: &ServerArgs, verbose: bool) -> PackmanResult<Self> {
        let config = ConfigLoader::new(cwd.to_path_buf()).load(server.overrides()).await?;
        Self::with_config(config, verbose)
    }

    pub fn with_config(config: PackmanConfig, verbose: bool) -> PackmanResult<Self> {
        let client = PackageManagerClient::with_config(TransportConfig {
            base_url: config.base_url.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            request_timeout: config.request_timeout,
            connect_timeout: config.connect_timeout,
            ..TransportConfig::default()
        })?;

        Ok(Self {
            config,
            client,
            output: OutputHandler::new(),
            verbose,
        })
    }

    /// Install options from configuration, overridden by command flags
    pub fn install_options(&self, args: &InstallArgs) -> PackmanResult<InstallOptions> {
        let ac_handling = match &args.ac_handling {
            Some(mode) => Some(mode.parse()?),
            None => self.config.ac_handling,
        };

        Ok(InstallOptions {
            recursive: self.config.recursive && !args.no_recursive,
            autosave: args.autosave.unwrap_or(self.config.autosave),
            ac_handling,
        })
    }
}

/// Process working directory as a UTF-8 path
pub fn current_dir() -> PackmanResult<Utf8PathBuf> {
    let cwd = std::env::current_dir()
        .map_err(|e| PackmanError::io("Failed to get current directory".to_string(), e))?;
    Utf8PathBuf::try_from(cwd).map_err(|e| PackmanError::ConfigValidation {
        field: "cwd".to_string(),
        reason: format!("Current directory is not valid UTF-8: {}", e),
    })
}

/// Dispatch a command to its handler
pub async fn dispatch_command(command: Commands, ctx: &CommandContext) -> PackmanResult<bool> {
    match command {
        Commands::Identify { file } => identify::execute(&file, ctx).await,
        Commands::Upload {
            file,
            force,
            install,
            options,
        } => {
            info!("Uploading {} (force: {}, install: {})", file.display(), force, install);
            upload::execute(&file, force, install.then_some(&options), ctx).await
        }
        Commands::Install { package, options } => {
            info!("Installing {}", package);
            install::execute(&package, &options, ctx).await
        }
        Commands::Uninstall { package } => detailed::execute(detailed::Operation::Uninstall, &package, ctx).await,
        Commands::Build { package } => detailed::execute(detailed::Operation::Build, &package, ctx).await,
        Commands::Rewrap { package } => detailed::execute(detailed::Operation::Rewrap, &package, ctx).await,
        Commands::DryRun { package } => detailed::execute(detailed::Operation::DryRun, &package, ctx).await,
        Commands::Contents { package } => detailed::execute(detailed::Operation::Contents, &package, ctx).await,
        Commands::Delete { package } => simple::delete(&package, ctx).await,
        Commands::Replicate { package } => simple::replicate(&package, ctx).await,
        Commands::Exists { package } => simple::exists(&package, ctx).await,
        Commands::List { query, json } => list::execute(query.as_deref(), json, ctx).await,
        Commands::Wait => wait::execute(ctx).await,
        Commands::External(args) => unknown_command(args.first().map(String::as_str).unwrap_or_default(), ctx),
    }
}

/// Resolve a package argument: an archive on disk, a `group:name[:version]`
/// id, or an `/etc/packages/...` path
pub fn resolve_package(package: &str, ctx: &CommandContext) -> PackmanResult<PackId> {
    let path = Path::new(package);
    if path.is_file() {
        return ctx.client.identify(path);
    }
    package.parse()
}

/// Print a transcript result; a failed operation returns `false`
pub fn report_detailed(operation: &str, response: &DetailedResponse, ctx: &CommandContext) -> bool {
    if response.success {
        let elapsed = response
            .duration()
            .map(|d| format!(" in {}ms", d.as_millis()))
            .unwrap_or_default();
        ctx.output.success(&format!("{}{}", response.message, elapsed));
        if response.has_errors() {
            ctx.output.warn(&format!(
                "{} finished with {} path error(s)",
                operation,
                response.progress_errors.len()
            ));
        }
        true
    } else {
        ctx.output.error(&format!("{} failed", operation));
        for line in &response.stack_trace {
            eprintln!("{}", line);
        }
        false
    }
}

fn unknown_command(name: &str, ctx: &CommandContext) -> PackmanResult<bool> {
    ctx.output.error(&format!("Unknown command '{}'", name));
    if let Some(suggestion) = suggest_similar_command(name) {
        ctx.output.info(&format!("Did you mean '{}'?", suggestion));
    }
    ctx.output.info("Run 'packman help' to see available commands.");
    Err(PackmanError::ConfigValidation {
        field: "command".to_string(),
        reason: format!("Unknown command: {}", name),
    })
}

/// Suggest similar commands based on edit distance
pub fn suggest_similar_command(input: &str) -> Option<String> {
    let commands = [
        "identify",
        "upload",
        "install",
        "uninstall",
        "build",
        "rewrap",
        "dry-run",
        "contents",
        "delete",
        "replicate",
        "exists",
        "list",
        "wait",
        "help",
    ];

    let mut best_match = None;
    let mut best_distance = usize::MAX;

    for &command in &commands {
        let distance = edit_distance(input, command);
        if distance < best_distance && distance <= 2 {
            best_distance = distance;
            best_match = Some(command);
        }
    }

    best_match.map(|s| s.to_string())
}

/// Levenshtein distance between two strings
fn edit_distance(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b_chars.len()).collect();

    for (i, a_char) in a.chars().enumerate() {
        let mut current = Vec::with_capacity(previous.len());
        current.push(i + 1);
        for (j, b_char) in b_chars.iter().enumerate() {
            let cost = usize::from(a_char != *b_char);
            let value = (previous[j + 1] + 1).min(current[j] + 1).min(previous[j] + cost);
            current.push(value);
        }
        previous = current;
    }

    previous[b_chars.len()]
}
