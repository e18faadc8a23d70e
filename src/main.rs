mod commands;

use clap::{CommandFactory, Parser, Subcommand};
use colored::Colorize;
use kefir::InstallError;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "kefir")]
#[command(author, version, about = "Install and supervise the sqlite-otel collector", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Installation prefix (defaults to the Homebrew prefix)
    #[arg(long, global = true, env = "KEFIR_PREFIX")]
    prefix: Option<PathBuf>,

    /// Formula file to use instead of the built-in one
    #[arg(long, global = true, env = "KEFIR_FORMULA")]
    formula: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Install the collector
    Install(commands::install::InstallArgs),

    /// Show which artifact would be installed
    Resolve(commands::resolve::ResolveArgs),

    /// Check a local file against a SHA-256 digest
    Verify {
        /// File to hash
        file: PathBuf,

        /// Expected lowercase hex digest, or `no_check`
        sha256: String,
    },

    /// Show or write the background service definition
    Service {
        /// Print the descriptor as JSON
        #[arg(long)]
        json: bool,

        /// Write the definition for the host's supervisor
        #[arg(long)]
        write: bool,

        /// Directory to write into (default: LaunchAgents / systemd user dir)
        #[arg(long, requires = "write")]
        dir: Option<PathBuf>,
    },

    /// Run the acceptance checks against the installed binary
    Test,

    /// Show formula information, install state and caveats
    Info,

    /// Show or clear the download cache
    Cache {
        /// Remove all cached downloads
        #[arg(long)]
        clear: bool,
    },

    /// Generate shell completions
    Completions {
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    kefir::colors::init_colors();

    if let Err(err) = run(cli).await {
        match err.downcast_ref::<InstallError>() {
            Some(install_err) => {
                eprintln!("{} [{}] {}", "✗".red(), install_err.stage(), install_err);
                if install_err.leaves_files() {
                    eprintln!(
                        "  {} files were placed but the install is broken",
                        "⚠".yellow()
                    );
                }
            }
            None => eprintln!("{} {:#}", "✗".red(), err),
        }
        std::process::exit(1);
    }

    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let ctx = commands::Context::new(cli.prefix, cli.formula.as_deref())?;

    match cli.command {
        Some(Commands::Install(args)) => commands::install::install(&ctx, &args).await,
        Some(Commands::Resolve(args)) => commands::resolve::resolve(&ctx, &args),
        Some(Commands::Verify { file, sha256 }) => commands::verify::verify(&file, &sha256),
        Some(Commands::Service { json, write, dir }) => {
            commands::services::service(&ctx, json, write, dir.as_deref())
        }
        Some(Commands::Test) => commands::test::test(&ctx).await,
        Some(Commands::Info) => commands::info::info(&ctx),
        Some(Commands::Cache { clear }) => commands::cache::cache(clear),
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(shell, &mut Cli::command(), "kefir", &mut std::io::stdout());
            Ok(())
        }
        None => {
            println!(
                "{} kefir installs the {} collector.",
                "==>".bold().green(),
                ctx.formula.name.bold()
            );
            println!("\nRun {} to see available commands.", "kefir --help".cyan());
            Ok(())
        }
    }
}
