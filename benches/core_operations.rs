use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use kefir::formula::{ArtifactEntry, Checksum, StrategyKind};
use kefir::verify::sha256_bytes;
use kefir::{Formula, Platform, Strategy, resolve};

/// Built-in formula plus one prebuilt row per platform (synthetic digests)
fn release_formula() -> Formula {
    let mut formula = Formula::builtin().unwrap();
    for platform in Platform::ALL {
        let asset = format!("sqlite-otel-{}", platform);
        formula.artifacts.push(ArtifactEntry {
            strategy: StrategyKind::PrebuiltRelease,
            platform: Some(platform),
            tag: None,
            url: format!("https://example.invalid/v0.8.0/{}", asset),
            sha256: Checksum::Sha256(sha256_bytes(asset.as_bytes())),
        });
    }
    formula
}

fn bench_formula_parse(c: &mut Criterion) {
    c.bench_function("formula builtin", |b| {
        b.iter(|| black_box(Formula::builtin().unwrap()))
    });
}

fn bench_resolve(c: &mut Criterion) {
    let formula = release_formula();
    let mut group = c.benchmark_group("resolve");

    for platform in Platform::ALL {
        group.bench_with_input(
            BenchmarkId::new("prebuilt", platform),
            &platform,
            |b, platform| {
                b.iter(|| resolve(&formula, black_box(*platform), &Strategy::PrebuiltRelease))
            },
        );
    }

    let branch = Strategy::SourceBuildBranch {
        branch: Some("feature/otlp-grpc".to_string()),
    };
    group.bench_function("branch", |b| {
        b.iter(|| resolve(&formula, black_box(Platform::ALL[0]), &branch))
    });

    group.finish();
}

fn bench_sha256(c: &mut Criterion) {
    let mut group = c.benchmark_group("sha256_bytes");

    // A typical release binary is tens of megabytes; keep the largest case modest
    for size in [4 * 1024, 1024 * 1024, 8 * 1024 * 1024] {
        let data = vec![0xa5u8; size];
        group.bench_with_input(BenchmarkId::from_parameter(size), &data, |b, data| {
            b.iter(|| sha256_bytes(black_box(data)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_formula_parse, bench_resolve, bench_sha256);
criterion_main!(benches);
