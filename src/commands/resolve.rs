use super::{Context, Selector};
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use kefir::resolve::Location;

#[derive(Debug, Clone, Args)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub selector: Selector,

    /// Print the artifact source as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn resolve(ctx: &Context, args: &ResolveArgs) -> Result<()> {
    let platform = args.selector.platform()?;
    let strategy = args.selector.strategy()?;
    let source = kefir::resolve(&ctx.formula, platform, &strategy)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&source)?);
        return Ok(());
    }

    println!("{} {}", "==>".bold().green(), source.file_name.bold());
    println!("{:<10} {}", "Strategy:".bold(), source.strategy);
    println!("{:<10} {}", "Platform:".bold(), source.platform);
    println!("{:<10} {}", "URL:".bold(), source.url());
    println!("{:<10} {}", "SHA-256:".bold(), source.checksum);
    if let Location::Build { recipe, .. } = &source.location {
        let env = recipe
            .env
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(" ");
        println!("{:<10} {} {}", "Build:".bold(), env, recipe.command.join(" "));
    }
    if source.is_development() {
        println!(
            "{} development source; integrity is not verified",
            "⚠".yellow()
        );
    }

    Ok(())
}
