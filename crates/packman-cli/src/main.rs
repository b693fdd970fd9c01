//! # packman-cli
//!
//! Command line client for the CRX package manager service.
//!
//! This is the main entry point for the `packman` tool. It parses arguments,
//! sets up logging and the panic hook, and dispatches to the command handlers.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use packman_core::error::{PackmanError, PackmanResult};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::CommandContext;
use output::errors::ErrorFormatter;

/// Upload, install and build content packages on a package manager service
#[derive(Parser, Debug)]
#[command(name = "packman", version, about = "CRX package manager client")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub server: ServerArgs,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Connection flags layered over packman.toml and PACKMAN_* variables
#[derive(Args, Debug, Default, Clone)]
pub struct ServerArgs {
    /// Server root, e.g. http://localhost:4502
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    #[arg(long, global = true)]
    pub username: Option<String>,

    #[arg(long, global = true)]
    pub password: Option<String>,

    /// How long to wait for the service; negative waits forever
    #[arg(long, global = true, allow_negative_numbers = true)]
    pub timeout_ms: Option<i64>,
}

impl ServerArgs {
    /// Flags in the key form understood by the configuration loader
    pub fn overrides(&self) -> HashMap<String, String> {
        let mut overrides = HashMap::new();
        if let Some(base_url) = &self.base_url {
            overrides.insert("base-url".to_string(), base_url.clone());
        }
        if let Some(username) = &self.username {
            overrides.insert("username".to_string(), username.clone());
        }
        if let Some(password) = &self.password {
            overrides.insert("password".to_string(), password.clone());
        }
        if let Some(timeout_ms) = self.timeout_ms {
            overrides.insert("service-wait-ms".to_string(), timeout_ms.to_string());
        }
        overrides
    }
}

/// Install flags; unset values fall back to the `[install]` configuration
#[derive(Args, Debug, Default, Clone)]
pub struct InstallArgs {
    /// Do not install subpackages
    #[arg(long)]
    pub no_recursive: bool,

    /// Save threshold in nodes (at least 1024)
    #[arg(long)]
    pub autosave: Option<i64>,

    /// ignore, overwrite, merge, merge_preserve or clear
    #[arg(long)]
    pub ac_handling: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the identity of a package archive
    Identify { file: PathBuf },
    /// Upload a package archive
    Upload {
        file: PathBuf,
        /// Replace an existing package
        #[arg(long)]
        force: bool,
        /// Install the package after uploading it
        #[arg(long)]
        install: bool,
        #[command(flatten)]
        options: InstallArgs,
    },
    /// Install a package
    Install {
        package: String,
        #[command(flatten)]
        options: InstallArgs,
    },
    /// Uninstall a package
    Uninstall { package: String },
    /// Build a package from its filter definition
    Build { package: String },
    /// Rewrap a package
    Rewrap { package: String },
    /// Simulate an install
    DryRun { package: String },
    /// List the contents of a package
    Contents { package: String },
    /// Delete a package from the server
    Delete { package: String },
    /// Replicate a package
    Replicate { package: String },
    /// Check whether a package is on the server
    Exists { package: String },
    /// List packages on the server
    List {
        query: Option<String>,
        /// Print the listing as JSON
        #[arg(long)]
        json: bool,
    },
    /// Wait until the service accepts commands
    Wait,
    #[command(external_subcommand)]
    External(Vec<String>),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    setup_logging(cli.verbose);
    setup_panic_handler();

    debug!("Starting packman v{}", env!("CARGO_PKG_VERSION"));

    match run_cli(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{}", ErrorFormatter::new().format_error(&e));
            ExitCode::FAILURE
        }
    }
}

fn run_cli(cli: Cli) -> PackmanResult<bool> {
    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| PackmanError::io("Failed to create async runtime".to_string(), e))?;

    rt.block_on(async {
        let cwd = commands::current_dir()?;
        let ctx = CommandContext::load(&cwd, &cli.server, cli.verbose).await?;
        commands::dispatch_command(cli.command, &ctx).await
    })
}

fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "packman={level},packman_client={level},packman_config={level},packman_core={level}"
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|panic_info| {
        error!("packman encountered an unexpected error: {}", panic_info);
        eprintln!("packman crashed! This is a bug.");
        eprintln!("Please report this at: https://github.com/packman-rs/packman/issues");
        eprintln!("Error: {}", panic_info);
    }));
}
