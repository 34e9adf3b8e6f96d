//! Benchmarks for depcycle analysis runs.
//!
//! These benchmarks measure the performance of:
//! - Full analysis at different workspace sizes
//! - An incremental run after a single-file edit

// Benchmark code - performance of the benchmark setup is not critical
#![allow(missing_docs)]
#![allow(clippy::format_push_string)]

use std::fs;
use std::path::{Path, PathBuf};

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use depcycle::Analyzer;
use tempfile::TempDir;

/// Generate a workspace of `num_modules` namespaces, each importing the
/// next and pointing back at the previous one so cycles exist at every size.
fn generate_workspace(num_modules: usize) -> Vec<(String, String)> {
    (0..num_modules)
        .map(|i| {
            let next = (i + 1) % num_modules;
            let prev = (i + num_modules - 1) % num_modules;
            let mut code = format!("using Game.M{next};\nnamespace Game.M{i}\n{{\n");
            code.push_str(&format!(
                "    public class Component{i} : MonoBehaviour\n    {{\n\
                         private Component{next} next;\n\
                         void Awake() {{ var p = GetComponent<Component{prev}>(); }}\n    }}\n"
            ));
            code.push_str(&format!(
                "    [UpdateAfter(typeof(Game.M{next}.Step{next}System))]\n\
                 public partial class Step{i}System : SystemBase\n    {{\n    }}\n}}\n"
            ));
            (format!("Assets/M{i}/Module{i}.cs"), code)
        })
        .collect()
}

fn create_workspace(files: &[(String, String)]) -> TempDir {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    for (path, content) in files {
        let full_path = dir.path().join(path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).expect("failed to create parent dirs");
        }
        fs::write(&full_path, content).expect("failed to write file");
    }
    dir
}

fn bench_full_analysis(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_analysis");
    group.sample_size(10);

    for num_modules in &[10usize, 50, 200] {
        let dir = create_workspace(&generate_workspace(*num_modules));
        group.throughput(Throughput::Elements(*num_modules as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(num_modules),
            num_modules,
            |b, _| {
                b.iter(|| {
                    let mut analyzer = Analyzer::new(dir.path()).expect("failed to create analyzer");
                    black_box(analyzer.run_full_analysis().expect("analysis failed"))
                });
            },
        );
    }

    group.finish();
}

fn bench_incremental_edit(c: &mut Criterion) {
    let mut group = c.benchmark_group("incremental_edit");
    group.sample_size(10);

    let files = generate_workspace(200);
    let dir = create_workspace(&files);
    let mut analyzer = Analyzer::new(dir.path()).expect("failed to create analyzer");
    analyzer.run_full_analysis().expect("analysis failed");

    let edited = PathBuf::from(&files[0].0);
    let mut toggle = false;
    group.bench_function("single_file", |b| {
        b.iter(|| {
            toggle = !toggle;
            rewrite(dir.path(), &edited, &files[0].1, toggle);
            black_box(
                analyzer
                    .run_incremental_analysis(std::slice::from_ref(&edited))
                    .expect("incremental analysis failed"),
            )
        });
    });

    group.finish();
}

/// Alternate between the original content and a variant declaring one more type.
fn rewrite(root: &Path, path: &Path, original: &str, variant: bool) {
    let content = if variant {
        original.replacen("{\n", "{\n    public class Extra { }\n", 1)
    } else {
        original.to_string()
    };
    fs::write(root.join(path), content).expect("failed to write file");
}

criterion_group!(benches, bench_full_analysis, bench_incremental_edit);
criterion_main!(benches);
