//! Service registration: describe how a supervisor should run the collector.
//!
//! This module only produces a [`ServiceDescriptor`] and renders it into the
//! supervisor's native format (launchd plist on macOS, systemd user unit on
//! Linux). Loading, starting, stopping and restarting belong to the supervisor;
//! nothing here spawns `launchctl` or `systemctl`.

use crate::error::Result;
use crate::layout::InstallationLayout;
use crate::platform::Os;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceDescriptor {
    pub name: String,
    /// Program followed by its arguments (none for the collector)
    pub command: Vec<PathBuf>,
    /// Restart whenever the process exits, including crashes
    pub keep_alive: bool,
    pub log_path: PathBuf,
    pub error_log_path: PathBuf,
    pub working_dir: PathBuf,
}

impl ServiceDescriptor {
    pub fn for_layout(layout: &InstallationLayout, name: &str) -> Self {
        Self {
            name: name.to_string(),
            command: vec![layout.binary.clone()],
            keep_alive: true,
            log_path: layout.log_file.clone(),
            error_log_path: layout.log_file.clone(),
            working_dir: layout.data_dir.clone(),
        }
    }

    /// launchd label
    pub fn label(&self) -> String {
        format!("homebrew.mxcl.{}", self.name)
    }

    /// File name of the rendered definition for `os`
    pub fn file_name(&self, os: Os) -> String {
        match os {
            Os::MacOs => format!("{}.plist", self.label()),
            Os::Linux => format!("homebrew.{}.service", self.name),
        }
    }

    pub fn render(&self, os: Os) -> String {
        match os {
            Os::MacOs => self.to_launchd_plist(),
            Os::Linux => self.to_systemd_unit(),
        }
    }

    pub fn to_launchd_plist(&self) -> String {
        let mut args = String::new();
        for arg in &self.command {
            args.push_str(&format!(
                "\t\t<string>{}</string>\n",
                xml_escape(&arg.to_string_lossy())
            ));
        }

        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
	<key>Label</key>
	<string>{label}</string>
	<key>KeepAlive</key>
	<{keep_alive}/>
	<key>RunAtLoad</key>
	<true/>
	<key>ProgramArguments</key>
	<array>
{args}	</array>
	<key>WorkingDirectory</key>
	<string>{working_dir}</string>
	<key>StandardOutPath</key>
	<string>{log}</string>
	<key>StandardErrorPath</key>
	<string>{error_log}</string>
</dict>
</plist>
"#,
            label = xml_escape(&self.label()),
            keep_alive = self.keep_alive,
            args = args,
            working_dir = xml_escape(&self.working_dir.to_string_lossy()),
            log = xml_escape(&self.log_path.to_string_lossy()),
            error_log = xml_escape(&self.error_log_path.to_string_lossy()),
        )
    }

    pub fn to_systemd_unit(&self) -> String {
        let exec = self
            .command
            .iter()
            .map(|p| systemd_quote(&p.to_string_lossy()))
            .collect::<Vec<_>>()
            .join(" ");
        let restart = if self.keep_alive { "always" } else { "no" };

        format!(
            "[Unit]\n\
             Description=Homebrew generated unit for {name}\n\
             \n\
             [Install]\n\
             WantedBy=default.target\n\
             \n\
             [Service]\n\
             Type=simple\n\
             ExecStart={exec}\n\
             Restart={restart}\n\
             WorkingDirectory={working_dir}\n\
             StandardOutput=append:{log}\n\
             StandardError=append:{error_log}\n",
            name = self.name,
            exec = exec,
            restart = restart,
            working_dir = self.working_dir.display(),
            log = self.log_path.display(),
            error_log = self.error_log_path.display(),
        )
    }
}

/// Default directory the supervisor reads definitions from
pub fn default_service_dir(os: Os) -> PathBuf {
    let home = std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    match os {
        Os::MacOs => home.join("Library/LaunchAgents"),
        Os::Linux => home.join(".config/systemd/user"),
    }
}

/// Write the rendered definition into `dir`, replacing any previous one
/// atomically. Returns the written path.
pub fn register(descriptor: &ServiceDescriptor, os: Os, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(descriptor.file_name(os));

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(descriptor.render(os).as_bytes())?;
    tmp.flush()?;
    tmp.persist(&path).map_err(|e| e.error)?;

    tracing::info!("wrote service definition {}", path.display());
    Ok(path)
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn systemd_quote(s: &str) -> String {
    if s.chars().any(|c| c.is_whitespace() || c == '"' || c == '\\') {
        format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        s.to_string()
    }
}
