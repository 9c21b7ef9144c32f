use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

/// pluginctl - resolve, fetch, verify, install, and uninstall versioned plugins
#[derive(Parser)]
#[command(name = "pluginctl")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install one or more plugins (and their transitive dependencies)
    Install {
        /// Plugin identifiers, e.g. `bluelink/aws@^1.0.0`
        plugins: Vec<String>,

        /// Read additional dependencies from a deploy-config (JSON/JSONC) file
        #[arg(long)]
        deploy_config: Option<PathBuf>,

        /// Directory backing the local registry (packages/, tarballs/, signatures/)
        #[arg(long)]
        registry_root: PathBuf,

        /// Target OS passed to the registry for binary selection (default: host OS)
        #[arg(long)]
        os: Option<String>,

        /// Target architecture passed to the registry (default: host architecture)
        #[arg(long)]
        arch: Option<String>,

        /// Only install plugins with no existing manifest entry; leave
        /// already-installed plugins untouched instead of resolving them
        #[arg(long)]
        missing_only: bool,
    },

    /// Uninstall a plugin (by `host/namespace/name`, version ignored)
    Uninstall {
        /// Plugin identifier
        plugin: String,

        /// Directory backing the local registry
        #[arg(long)]
        registry_root: PathBuf,
    },

    /// List installed plugins
    List,

    /// Generate shell completion scripts
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("PLUGINCTL_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Install {
            plugins,
            deploy_config,
            registry_root,
            os,
            arch,
            missing_only,
        } => commands::install::run(plugins, deploy_config, registry_root, os, arch, missing_only),
        Commands::Uninstall {
            plugin,
            registry_root,
        } => commands::uninstall::run(plugin, registry_root),
        Commands::List => commands::list::run(),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "pluginctl", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
