use anyhow::Result;
use colored::Colorize;
use kefir::Checksum;
use kefir::verify::{self, Verification};
use std::path::Path;

pub fn verify(file: &Path, sha256: &str) -> Result<()> {
    let expected = Checksum::parse(sha256)?;
    let name = file.display().to_string();

    match verify::verify_file(file, &expected, &name)? {
        Verification::Passed { sha256 } => {
            println!("{} {} {}", "✓".green(), name.bold(), sha256.dimmed());
        }
        Verification::Waived => {
            println!("{} {}: verification waived", "⚠".yellow(), name.bold());
        }
    }
    Ok(())
}
