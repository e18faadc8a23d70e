use super::{Context, Selector};
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use kefir::install::{InstallRequest, Installer};
use kefir::platform::Os;
use kefir::services;
use kefir::verify::Verification;
use std::path::PathBuf;

#[derive(Debug, Clone, Args)]
pub struct InstallArgs {
    #[command(flatten)]
    pub selector: Selector,

    /// Skip the post-install --version/--help checks
    #[arg(long)]
    pub skip_test: bool,

    /// Write the background service definition after installing
    #[arg(long)]
    pub register_service: bool,

    /// Directory for the service definition (default: LaunchAgents / systemd user dir)
    #[arg(long, requires = "register_service")]
    pub service_dir: Option<PathBuf>,

    /// Don't read or write the download cache
    #[arg(long)]
    pub no_cache: bool,
}

pub async fn install(ctx: &Context, args: &InstallArgs) -> Result<()> {
    let platform = args.selector.platform()?;
    let strategy = args.selector.strategy()?;

    let mut installer = Installer::new(ctx.formula.clone(), &ctx.prefix)?;
    if args.no_cache {
        installer = installer.with_cache_dir(None);
    }

    let service_dir = match (args.register_service, &args.service_dir) {
        (false, _) => None,
        (true, Some(dir)) => Some(dir.clone()),
        (true, None) => Some(services::default_service_dir(Os::detect()?)),
    };

    let request = InstallRequest {
        platform,
        strategy,
        run_acceptance: !args.skip_test,
        service_dir,
    };

    let source = installer.resolve(platform, &request.strategy)?;
    println!(
        "{} Installing {} {} ({}, {})",
        "==>".bold().green(),
        ctx.formula.name.bold(),
        ctx.formula.version,
        source.strategy.to_string().cyan(),
        platform
    );
    if source.is_development() {
        println!(
            "  {} Development build from an unpinned branch: checksum NOT verified",
            "⚠".yellow()
        );
    }

    let report = installer.install(&request).await?;

    match &report.verification {
        Verification::Passed { sha256 } => {
            println!("  {} Verified sha256 {}", "✓".green(), sha256.dimmed())
        }
        Verification::Waived => println!("  {} Verification waived (no_check)", "⚠".yellow()),
    }
    println!(
        "  {} Installed {}",
        "✓".green(),
        report.layout.binary.display()
    );
    println!(
        "  {} Linked {}",
        "✓".green(),
        report.layout.linked_binary.display()
    );
    if let Some(path) = &report.service_file {
        println!("  {} Wrote service definition {}", "✓".green(), path.display());
    }
    if report.acceptance.is_some() {
        println!("  {} Acceptance checks passed", "✓".green());
    } else {
        println!("  {} Acceptance checks skipped", "ℹ".blue());
    }

    println!(
        "\n{} {} {} installed in {}ms",
        "✓".green().bold(),
        report.formula.bold().green(),
        report.version,
        report.time_ms
    );
    println!();
    super::info::print_caveats(ctx);

    Ok(())
}
