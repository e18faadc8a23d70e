use super::Context;
use anyhow::Result;
use colored::Colorize;
use kefir::platform::Os;
use kefir::{ServiceDescriptor, services};
use std::path::Path;

pub fn service(ctx: &Context, json: bool, write: bool, dir: Option<&Path>) -> Result<()> {
    let descriptor = ServiceDescriptor::for_layout(&ctx.layout, &ctx.formula.name);
    let os = Os::detect()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&descriptor)?);
    } else if !write {
        print!("{}", descriptor.render(os));
    }

    if write {
        let dir = dir
            .map(Path::to_path_buf)
            .unwrap_or_else(|| services::default_service_dir(os));
        let path = services::register(&descriptor, os, &dir)?;
        println!("{} Wrote {}", "✓".green(), path.display().to_string().bold());
        println!(
            "Start it with your service manager, e.g. {}",
            start_hint(os, &descriptor, &path).cyan()
        );
    }

    Ok(())
}

fn start_hint(os: Os, descriptor: &ServiceDescriptor, path: &Path) -> String {
    match os {
        Os::MacOs => format!("launchctl load -w {}", path.display()),
        Os::Linux => format!(
            "systemctl --user enable --now {}",
            descriptor.file_name(os)
        ),
    }
}
