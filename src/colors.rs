//! Terminal color policy: NO_COLOR, CLICOLOR and CLICOLOR_FORCE.
//!
//! Precedence, highest first:
//! - `NO_COLOR` set to anything disables color (<https://no-color.org/>)
//! - `CLICOLOR_FORCE` set to non-zero forces color even when piped
//! - `CLICOLOR=0` disables color
//! - otherwise color only on a TTY

use colored::control;
use std::io::IsTerminal;

/// Apply the color policy for the whole process. Call once, early in `main`.
pub fn init_colors() {
    let env = |key: &str| std::env::var(key).ok();
    let enabled = colors_enabled(
        env("NO_COLOR").as_deref(),
        env("CLICOLOR").as_deref(),
        env("CLICOLOR_FORCE").as_deref(),
        std::io::stdout().is_terminal(),
    );
    control::set_override(enabled);
}

fn colors_enabled(
    no_color: Option<&str>,
    clicolor: Option<&str>,
    clicolor_force: Option<&str>,
    is_tty: bool,
) -> bool {
    if no_color.is_some() {
        return false;
    }
    if clicolor_force.is_some_and(|v| v != "0") {
        return true;
    }
    if clicolor == Some("0") {
        return false;
    }
    is_tty
}
