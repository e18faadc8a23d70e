use anyhow::{Context, Result};
use colored::Colorize;
use kefir::cache;

pub fn cache(clear: bool) -> Result<()> {
    let dir = cache::cache_dir();

    if clear {
        let removed = cache::clear(&dir)
            .with_context(|| format!("Failed to clear {}", dir.display()))?;
        println!(
            "{} Removed {} cached downloads",
            "✓".green(),
            removed.to_string().bold()
        );
        return Ok(());
    }

    println!("{}", dir.display());
    Ok(())
}
