//! Library interface for kefir, the sqlite-otel collector installer.
//!
//! The install pipeline, leaf-first:
//! [`resolve`] → [`install`] (via [`download`], [`build`], [`verify`]) →
//! [`prepare`] → [`services`] → [`acceptance`].
//!
//! ```no_run
//! use kefir::{Formula, InstallRequest, Installer, Platform, Strategy};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Release rows (with their published digests) come from a formula file
//!     let formula = Formula::load(Path::new("sqlite-otel-collector-0.8.0.json"))?;
//!     let installer = Installer::new(formula, kefir::layout::detect_prefix())?;
//!     let report = installer
//!         .install(&InstallRequest {
//!             platform: Platform::detect()?,
//!             strategy: Strategy::PrebuiltRelease,
//!             run_acceptance: true,
//!             service_dir: None,
//!         })
//!         .await?;
//!     println!("Installed {} at {}", report.version, report.layout.binary.display());
//!     Ok(())
//! }
//! ```

pub mod acceptance;
pub mod build;
pub mod cache;
pub mod colors;
pub mod download;
pub mod error;
pub mod formula;
pub mod install;
pub mod layout;
pub mod platform;
pub mod prepare;
pub mod receipt;
pub mod resolve;
pub mod services;
pub mod verify;

// Re-export commonly used types
pub use error::{InstallError, Result};
pub use formula::{Checksum, Formula, StrategyKind};
pub use install::{InstallReport, InstallRequest, Installer};
pub use layout::InstallationLayout;
pub use platform::Platform;
pub use resolve::{ArtifactSource, Strategy, resolve};
pub use services::ServiceDescriptor;
