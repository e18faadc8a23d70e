use super::Context;
use anyhow::Result;
use colored::Colorize;
use kefir::formula::StrategyKind;
use kefir::receipt::InstallReceipt;

pub fn info(ctx: &Context) -> Result<()> {
    let formula = &ctx.formula;

    println!(
        "{} {}: {}",
        "==>".bold().green(),
        formula.name.bold(),
        formula.version
    );
    if !formula.desc.is_empty() {
        println!("{}", formula.desc);
    }
    if !formula.homepage.is_empty() {
        println!("{}", formula.homepage.cyan());
    }
    if !formula.license.is_empty() {
        println!("License: {}", formula.license);
    }

    println!("\n{}", "==> Artifacts".bold().green());
    for entry in &formula.artifacts {
        let target = match entry.strategy {
            StrategyKind::SourceBuildBranch => format!("branch {}", formula.head_branch),
            StrategyKind::SourceBuildTag => {
                format!("tag {}", entry.tag.as_deref().unwrap_or("?"))
            }
            StrategyKind::PrebuiltRelease => entry
                .platform
                .map(|p| p.to_string())
                .unwrap_or_default(),
        };
        println!(
            "{:<20} {:<22} {}",
            entry.strategy.to_string(),
            target,
            entry.file_name().dimmed()
        );
    }

    println!("\n{}", "==> Installed".bold().green());
    match InstallReceipt::read(&ctx.layout.receipt) {
        Ok(receipt) => {
            println!("{} ({})", ctx.layout.keg.display(), receipt.time);
            println!(
                "  from {} for {}{}",
                receipt.strategy,
                receipt.platform,
                if receipt.is_development() {
                    " (development build)".yellow().to_string()
                } else {
                    String::new()
                }
            );
            println!("  sha256 {}", receipt.binary_sha256.dimmed());
        }
        Err(_) => println!("Not installed"),
    }

    println!();
    print_caveats(ctx);
    Ok(())
}

/// Post-install notes: how to run it, where it listens, where data goes
pub fn print_caveats(ctx: &Context) {
    let name = &ctx.formula.name;
    let layout = &ctx.layout;

    println!("{}", "==> Caveats".bold().green());
    println!("To start {} in the foreground:", name);
    println!("  {}", name.cyan());
    println!("To run it as a background service:");
    println!("  {}", "kefir service --write".cyan());
    if let Some(endpoint) = &ctx.formula.endpoint {
        println!("The collector listens on:");
        println!("  - HTTP: {} (OTLP/HTTP endpoint)", endpoint);
    }
    println!("Data is stored in:");
    println!("  {}", layout.data_dir.display());
    println!("Logs are written to:");
    println!("  {}", layout.log_file.display());
    println!("Run '{} --help' for configuration flags.", name);
}
