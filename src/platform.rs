//! Platform detection for selecting the correct release artifact.
//!
//! The collector ships prebuilt binaries for a fixed set of targets:
//! - **macOS**: ARM64 (Apple Silicon), x86_64 (Intel)
//! - **Linux**: x86_64, ARM64, ARM32
//!
//! # Release Tag Format
//!
//! Release assets are named `<project>-<os>-<arch>`, where the tag part follows the
//! Go toolchain's naming rather than Rust's:
//! - `darwin-arm64`, `darwin-amd64`
//! - `linux-amd64`, `linux-arm64`, `linux-arm`
//!
//! ARM32 exists only on Linux. `linux-arm` and `linux-arm64` are distinct artifacts
//! and must never be confused.
//!
//! # Examples
//!
//! ```no_run
//! use kefir::platform::Platform;
//!
//! fn main() -> anyhow::Result<()> {
//!     let platform = Platform::detect()?;
//!     println!("This system needs: {}", platform);
//!     // Output: "darwin-arm64" on an M3 Mac
//!     Ok(())
//! }
//! ```

use crate::error::{InstallError, Result};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Os {
    MacOs,
    Linux,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Arch {
    X86_64,
    Arm64,
    /// 32-bit ARM (armv6/armv7)
    Arm32,
}

impl Os {
    /// Operating system this process runs on, independent of its architecture.
    /// Service definitions are written for this, not for the install target.
    pub fn detect() -> Result<Self> {
        Self::from_host(std::env::consts::OS)
    }

    fn from_host(os: &str) -> Result<Self> {
        match os {
            "macos" => Ok(Os::MacOs),
            "linux" => Ok(Os::Linux),
            other => Err(InstallError::Resolution(format!(
                "Unsupported operating system: {}",
                other
            ))),
        }
    }

    /// Release tag component (`darwin`, `linux`)
    pub fn tag(self) -> &'static str {
        match self {
            Os::MacOs => "darwin",
            Os::Linux => "linux",
        }
    }
}

impl Arch {
    /// Release tag component (`amd64`, `arm64`, `arm`)
    pub fn tag(self) -> &'static str {
        match self {
            Arch::X86_64 => "amd64",
            Arch::Arm64 => "arm64",
            Arch::Arm32 => "arm",
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            Arch::X86_64 | Arch::Arm64 => 64,
            Arch::Arm32 => 32,
        }
    }
}

/// A supported (OS, CPU architecture) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Platform {
    os: Os,
    arch: Arch,
}

impl Platform {
    /// Every platform with a prebuilt release
    pub const ALL: [Platform; 5] = [
        Platform { os: Os::MacOs, arch: Arch::Arm64 },
        Platform { os: Os::MacOs, arch: Arch::X86_64 },
        Platform { os: Os::Linux, arch: Arch::X86_64 },
        Platform { os: Os::Linux, arch: Arch::Arm64 },
        Platform { os: Os::Linux, arch: Arch::Arm32 },
    ];

    pub fn new(os: Os, arch: Arch) -> Result<Self> {
        if os == Os::MacOs && arch == Arch::Arm32 {
            return Err(InstallError::Resolution(
                "32-bit ARM is only supported on Linux".to_string(),
            ));
        }
        Ok(Self { os, arch })
    }

    pub fn os(&self) -> Os {
        self.os
    }

    pub fn arch(&self) -> Arch {
        self.arch
    }

    /// Detect the platform this process is running on.
    ///
    /// # Errors
    ///
    /// Returns a resolution error on hosts outside the supported matrix
    /// (e.g. Windows, FreeBSD, riscv64).
    pub fn detect() -> Result<Self> {
        Self::from_host(std::env::consts::OS, std::env::consts::ARCH)
    }

    fn from_host(os: &str, arch: &str) -> Result<Self> {
        let os = Os::from_host(os)?;
        // Rust reports "aarch64" where release assets say "arm64"
        let arch = match arch {
            "x86_64" => Arch::X86_64,
            "aarch64" => Arch::Arm64,
            "arm" => Arch::Arm32,
            other => {
                return Err(InstallError::Resolution(format!(
                    "Unsupported architecture: {}",
                    other
                )));
            }
        };
        Self::new(os, arch)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os.tag(), self.arch.tag())
    }
}

impl FromStr for Platform {
    type Err = InstallError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        let (os, arch) = normalized
            .split_once('-')
            .ok_or_else(|| InstallError::Resolution(format!("Invalid platform: {}", s)))?;

        let os = match os {
            "darwin" | "macos" | "osx" => Os::MacOs,
            "linux" => Os::Linux,
            _ => return Err(InstallError::Resolution(format!("Unknown OS in platform: {}", s))),
        };
        let arch = match arch {
            "amd64" | "x86-64" | "x64" => Arch::X86_64,
            "arm64" | "aarch64" => Arch::Arm64,
            "arm" | "armv6" | "armv7" | "arm32" => Arch::Arm32,
            _ => {
                return Err(InstallError::Resolution(format!(
                    "Unknown architecture in platform: {}",
                    s
                )));
            }
        };
        Self::new(os, arch)
    }
}

impl TryFrom<String> for Platform {
    type Error = InstallError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Platform> for String {
    fn from(platform: Platform) -> Self {
        platform.to_string()
    }
}
