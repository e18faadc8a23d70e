// End-to-end install pipeline tests against local fixtures


use anyhow::Result;
use kefir::formula::StrategyKind;
use kefir::platform::Os;
use kefir::receipt::InstallReceipt;
use kefir::verify::{Verification, sha256_file};
use kefir::{InstallError, InstallRequest, Platform, Strategy};
use std::fs;
use test_helpers::*;

fn darwin_arm64() -> Platform {
    "darwin-arm64".parse().unwrap()
}

fn request(platform: Platform, strategy: Strategy) -> InstallRequest {
    InstallRequest {
        platform,
        strategy,
        run_acceptance: true,
        service_dir: None,
    }
}

#[tokio::test]
async fn test_prebuilt_install_passes_acceptance() -> Result<()> {
    let env = TestEnvironment::new();
    let artifact = env.write_executable("sqlite-otel-darwin-arm64", FAKE_COLLECTOR);
    let formula = local_formula(&[(darwin_arm64(), &artifact)], None, None);
    let installer = env.installer(formula);

    let report = installer
        .install(&request(darwin_arm64(), Strategy::PrebuiltRelease))
        .await?;

    assert_eq!(report.source.file_name, "sqlite-otel-darwin-arm64");
    assert!(matches!(report.verification, Verification::Passed { .. }));
    let layout = installer.layout();
    assert_eq!(fs::read(&layout.binary)?, fs::read(&artifact)?);
    assert!(
        report
            .acceptance
            .as_ref()
            .unwrap()
            .version_output
            .contains("v0.8.0")
    );

    // Runtime directories and the PATH link exist
    assert!(layout.data_dir.is_dir());
    assert!(layout.log_dir.is_dir());
    assert_eq!(fs::read(&layout.linked_binary)?, fs::read(&layout.binary)?);

    let receipt = InstallReceipt::read(&layout.receipt)?;
    assert_eq!(receipt.strategy, StrategyKind::PrebuiltRelease);
    assert_eq!(receipt.binary_sha256, report.binary_sha256);
    Ok(())
}

#[tokio::test]
async fn test_corrupted_checksum_leaves_canonical_path_untouched() -> Result<()> {
    let env = TestEnvironment::new();
    let artifact = env.write_executable("sqlite-otel-darwin-arm64", FAKE_COLLECTOR);
    let mut formula = local_formula(&[(darwin_arm64(), &artifact)], None, None);
    formula.artifacts[0].sha256 = corrupt(&formula.artifacts[0].sha256);
    let installer = env.installer(formula);

    let err = installer
        .install(&request(darwin_arm64(), Strategy::PrebuiltRelease))
        .await
        .unwrap_err();

    assert!(matches!(err, InstallError::Integrity { .. }));
    assert_eq!(err.stage(), "verify");
    assert!(!installer.layout().binary.exists());
    assert!(!installer.layout().linked_binary.exists());
    // Nothing unverified was cached
    assert!(!env.cache.join("sqlite-otel-darwin-arm64").exists());
    Ok(())
}

#[tokio::test]
async fn test_integrity_failure_keeps_previous_binary() -> Result<()> {
    let env = TestEnvironment::new();
    let artifact = env.write_executable("sqlite-otel-darwin-arm64", FAKE_COLLECTOR);
    let good = local_formula(&[(darwin_arm64(), &artifact)], None, None);
    env.installer(good.clone())
        .install(&request(darwin_arm64(), Strategy::PrebuiltRelease))
        .await?;
    let installed = env.prefix.join("Cellar/sqlite-otel-collector/0.8.0/bin/sqlite-otel-collector");
    let before = fs::read(&installed)?;

    // Upstream artifact replaced, declared digest unchanged
    fs::write(&artifact, "#!/bin/sh\necho tampered\n")?;
    let err = env
        .installer(good)
        .with_cache_dir(None)
        .install(&request(darwin_arm64(), Strategy::PrebuiltRelease))
        .await
        .unwrap_err();

    assert!(matches!(err, InstallError::Integrity { .. }));
    assert_eq!(fs::read(&installed)?, before);
    Ok(())
}

#[tokio::test]
async fn test_reinstall_is_idempotent() -> Result<()> {
    let env = TestEnvironment::new();
    let artifact = env.write_executable("sqlite-otel-darwin-arm64", FAKE_COLLECTOR);
    let formula = local_formula(&[(darwin_arm64(), &artifact)], None, None);
    let installer = env.installer(formula);
    let req = request(darwin_arm64(), Strategy::PrebuiltRelease);

    let first = installer.install(&req).await?;
    let first_bytes = fs::read(&installer.layout().binary)?;
    let second = installer.install(&req).await?;

    assert_eq!(first.binary_sha256, second.binary_sha256);
    assert_eq!(fs::read(&installer.layout().binary)?, first_bytes);
    // Second run came from the verified cache
    assert!(env.cache.join("sqlite-otel-darwin-arm64").exists());
    Ok(())
}

#[tokio::test]
async fn test_tag_build_verifies_and_builds_with_native_flag() -> Result<()> {
    let env = TestEnvironment::new();
    let tarball = env.default_source_tarball();
    let formula = local_formula(&[], Some(&tarball), None);
    let installer = env.installer(formula);

    let report = installer
        .install(&request(
            darwin_arm64(),
            Strategy::SourceBuildTag {
                tag: Some("v0.8.0".to_string()),
            },
        ))
        .await?;

    assert_eq!(
        report.verification,
        Verification::Passed {
            sha256: sha256_file(&tarball)?
        }
    );
    let acceptance = report.acceptance.unwrap();
    assert!(acceptance.help_output.contains("Port to listen on"));
    Ok(())
}

#[tokio::test]
async fn test_tag_build_with_bad_tarball_checksum_fails() -> Result<()> {
    let env = TestEnvironment::new();
    let tarball = env.default_source_tarball();
    let mut formula = local_formula(&[], Some(&tarball), None);
    formula.artifacts[0].sha256 = corrupt(&formula.artifacts[0].sha256);
    let installer = env.installer(formula);

    let err = installer
        .install(&request(darwin_arm64(), Strategy::SourceBuildTag { tag: None }))
        .await
        .unwrap_err();

    assert!(matches!(err, InstallError::Integrity { .. }));
    assert!(!installer.layout().binary.exists());
    Ok(())
}

#[tokio::test]
async fn test_branch_build_skips_verification() -> Result<()> {
    let env = TestEnvironment::new();
    let tarball = env.write_source_tarball(
        "main.tar.gz",
        "#!/bin/sh\ncp collector.sh sqlite-otel && chmod 755 sqlite-otel\n",
    );
    let formula = local_formula(&[], None, Some(&tarball));
    let installer = env.installer(formula);

    let report = installer
        .install(&request(
            "linux-amd64".parse()?,
            Strategy::SourceBuildBranch { branch: None },
        ))
        .await?;

    assert_eq!(report.verification, Verification::Waived);
    assert!(report.source.is_development());
    assert!(InstallReceipt::read(&installer.layout().receipt)?.is_development());
    Ok(())
}

#[tokio::test]
async fn test_branch_build_fails_when_build_fails() -> Result<()> {
    let env = TestEnvironment::new();
    let tarball = env.write_source_tarball("main.tar.gz", "#!/bin/sh\necho 'compile error' >&2\nexit 2\n");
    let formula = local_formula(&[], None, Some(&tarball));
    let installer = env.installer(formula);

    let err = installer
        .install(&request(
            "linux-amd64".parse()?,
            Strategy::SourceBuildBranch { branch: None },
        ))
        .await
        .unwrap_err();

    assert_eq!(err.stage(), "acquire");
    assert!(err.to_string().contains("compile error"));
    assert!(!installer.layout().binary.exists());
    Ok(())
}

#[tokio::test]
async fn test_linux_arm_and_arm64_install_distinct_artifacts() -> Result<()> {
    let env = TestEnvironment::new();
    let arm = env.write_executable("sqlite-otel-linux-arm", FAKE_COLLECTOR);
    let arm64 = env.write_executable(
        "sqlite-otel-linux-arm64",
        &FAKE_COLLECTOR.replace("collector running", "collector running (arm64)"),
    );
    let linux_arm: Platform = "linux-arm".parse()?;
    let linux_arm64: Platform = "linux-arm64".parse()?;
    let formula = local_formula(&[(linux_arm, &arm), (linux_arm64, &arm64)], None, None);
    let installer = env.installer(formula);

    let report = installer
        .install(&request(linux_arm, Strategy::PrebuiltRelease))
        .await?;
    assert_eq!(report.source.file_name, "sqlite-otel-linux-arm");
    assert_eq!(fs::read(&installer.layout().binary)?, fs::read(&arm)?);

    let report = installer
        .install(&request(linux_arm64, Strategy::PrebuiltRelease))
        .await?;
    assert_eq!(report.source.file_name, "sqlite-otel-linux-arm64");
    assert_eq!(fs::read(&installer.layout().binary)?, fs::read(&arm64)?);
    Ok(())
}

#[tokio::test]
async fn test_unlisted_platform_has_no_side_effects() -> Result<()> {
    let env = TestEnvironment::new();
    let artifact = env.write_executable("sqlite-otel-darwin-arm64", FAKE_COLLECTOR);
    let formula = local_formula(&[(darwin_arm64(), &artifact)], None, None);
    let installer = env.installer(formula);

    let err = installer
        .install(&request("linux-arm".parse()?, Strategy::PrebuiltRelease))
        .await
        .unwrap_err();

    assert!(matches!(err, InstallError::Resolution(_)));
    assert!(!env.prefix.exists());
    Ok(())
}

#[tokio::test]
async fn test_acceptance_failure_reports_broken_install() -> Result<()> {
    let env = TestEnvironment::new();
    let artifact = env.write_executable(
        "sqlite-otel-darwin-arm64",
        "#!/bin/sh\necho 'sqlite-otel-collector v0.7.0'\n",
    );
    let formula = local_formula(&[(darwin_arm64(), &artifact)], None, None);
    let installer = env.installer(formula);

    let err = installer
        .install(&request(darwin_arm64(), Strategy::PrebuiltRelease))
        .await
        .unwrap_err();

    assert!(matches!(err, InstallError::Acceptance { .. }));
    assert!(err.leaves_files());
    // Files were placed even though the install is reported broken
    assert!(installer.layout().binary.exists());
    Ok(())
}

#[tokio::test]
async fn test_service_definition_follows_host_os() -> Result<()> {
    let env = TestEnvironment::new();
    let host = Os::detect()?;
    // Install for the other OS so the target and host formats differ
    let target: Platform = match host {
        Os::Linux => "darwin-arm64".parse()?,
        Os::MacOs => "linux-amd64".parse()?,
    };
    let artifact = env.write_executable("sqlite-otel-target", FAKE_COLLECTOR);
    let formula = local_formula(&[(target, &artifact)], None, None);
    let installer = env.installer(formula);

    let mut req = request(target, Strategy::PrebuiltRelease);
    req.service_dir = Some(env.service_dir.clone());
    let report = installer.install(&req).await?;

    let written = report.service_file.unwrap();
    assert_eq!(written, env.service_dir.join(report.service.file_name(host)));
    assert_ne!(report.service.file_name(host), report.service.file_name(target.os()));
    let definition = fs::read_to_string(&written)?;
    assert!(definition.contains(&installer.layout().binary.display().to_string()));
    assert!(definition.contains(&installer.layout().data_dir.display().to_string()));
    assert!(report.service.keep_alive);
    Ok(())
}

#[tokio::test]
async fn test_blocked_keg_reports_placement_with_path() -> Result<()> {
    let env = TestEnvironment::new();
    let artifact = env.write_executable("sqlite-otel-darwin-arm64", FAKE_COLLECTOR);
    let formula = local_formula(&[(darwin_arm64(), &artifact)], None, None);
    let installer = env.installer(formula);
    let keg_bin = installer.layout().binary.parent().unwrap().to_path_buf();
    fs::create_dir_all(keg_bin.parent().unwrap())?;
    fs::write(&keg_bin, "not a directory")?;

    let err = installer
        .install(&request(darwin_arm64(), Strategy::PrebuiltRelease))
        .await
        .unwrap_err();

    assert_eq!(err.stage(), "place");
    assert!(err.to_string().contains(&keg_bin.display().to_string()));
    Ok(())
}

#[tokio::test]
async fn test_wrong_declared_digest_keeps_cached_artifact() -> Result<()> {
    let env = TestEnvironment::new();
    let artifact = env.write_executable("sqlite-otel-darwin-arm64", FAKE_COLLECTOR);
    let good = local_formula(&[(darwin_arm64(), &artifact)], None, None);
    env.installer(good.clone())
        .install(&request(darwin_arm64(), Strategy::PrebuiltRelease))
        .await?;
    let cached = env.cache.join("sqlite-otel-darwin-arm64");
    let cached_bytes = fs::read(&cached)?;

    let mut bad = good;
    bad.artifacts[0].sha256 = corrupt(&bad.artifacts[0].sha256);
    let err = env
        .installer(bad)
        .install(&request(darwin_arm64(), Strategy::PrebuiltRelease))
        .await
        .unwrap_err();

    assert!(matches!(err, InstallError::Integrity { .. }));
    assert_eq!(fs::read(&cached)?, cached_bytes);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_installs_are_serialized() -> Result<()> {
    let env = TestEnvironment::new();
    let artifact = env.write_executable("sqlite-otel-darwin-arm64", FAKE_COLLECTOR);
    let formula = local_formula(&[(darwin_arm64(), &artifact)], None, None);
    let a = env.installer(formula.clone()).with_cache_dir(None);
    let b = env.installer(formula).with_cache_dir(None);
    let req = request(darwin_arm64(), Strategy::PrebuiltRelease);

    let (ra, rb) = tokio::join!(a.install(&req), b.install(&req));
    ra?;
    rb?;

    assert_eq!(fs::read(&a.layout().binary)?, fs::read(&artifact)?);
    // Staging directories are gone
    let leftovers = fs::read_dir(&env.prefix)?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with(".kefir-staging-"))
        .count();
    assert_eq!(leftovers, 0);
    Ok(())
}
