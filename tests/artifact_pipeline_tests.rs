mod common;

use std::{fs, path::Path};

use common::{fixture_path, temp_dir};
use scriptshell::{
    artifact::format::{ArtifactClass, read_artifact},
    config::HostConfig,
    engine::mini::{EngineOptions, MiniEngine},
    error::ExitStatus,
    pipeline::ExecutionPipeline,
    report::MemoryReporter,
};

fn compile_fixture(fixture: &str, out: &Path, name: &str, class: ArtifactClass) {
    let source = fs::read_to_string(fixture_path("scripts").join(fixture)).unwrap();
    let engine = MiniEngine::new(EngineOptions::default());
    let bytes = engine.compile_artifact(&source, name, class).unwrap();
    fs::write(out, bytes).unwrap();
}

struct Run {
    printed: String,
    reports: Vec<String>,
    status: ExitStatus,
    cached: usize,
}

fn run(config: HostConfig, paths: &[&Path]) -> Run {
    let (engine, printed) = MiniEngine::captured(EngineOptions::from(&config));
    let reporter = MemoryReporter::new();
    let mut pipeline = ExecutionPipeline::new(engine, config)
        .unwrap()
        .with_reporter(reporter.clone());
    for path in paths {
        pipeline.run(Some(path.to_str().unwrap()), None);
    }
    let printed = printed.borrow().clone();
    Run {
        printed,
        reports: reporter.reports(),
        status: pipeline.exit_status(),
        cached: pipeline.cache().len(),
    }
}

#[test]
fn compiled_script_runs_like_its_source() {
    let dir = temp_dir("artifact_run");
    let out = dir.join("fib.shc");
    compile_fixture("fib.js", &out, "fib", ArtifactClass::Script);

    let from_artifact = run(HostConfig::default(), &[&out]);
    let from_source = run(HostConfig::default(), &[&fixture_path("scripts").join("fib.js")]);
    assert_eq!(from_artifact.printed, "fib(15) = 610\n");
    assert_eq!(from_artifact.printed, from_source.printed);
    assert_eq!(from_artifact.status, ExitStatus::Success);
    assert_eq!(from_artifact.cached, 1);
}

#[test]
fn artifact_header_describes_the_unit() {
    let dir = temp_dir("artifact_header");
    let out = dir.join("hello.shc");
    compile_fixture("hello.js", &out, "hello", ArtifactClass::Script);

    let image = read_artifact(&fs::read(&out).unwrap()).unwrap();
    assert_eq!(image.header.name, "hello");
    assert_eq!(image.header.class, ArtifactClass::Script);
    assert!(image.header.host_version.starts_with("mini/"));
}

#[test]
fn library_artifact_is_rejected_and_not_run() {
    let dir = temp_dir("artifact_library");
    let out = dir.join("library.shc");
    compile_fixture("library.js", &out, "library", ArtifactClass::Library);

    let result = run(HostConfig::default(), &[&out]);
    assert_eq!(result.printed, "");
    assert_eq!(result.status, ExitStatus::RuntimeError);
    assert_eq!(
        result.reports,
        vec!["compiled artifact `library` must implement Script (found library)"]
    );
    assert_eq!(result.cached, 0);
}

#[test]
fn corrupted_magic_is_a_loader_failure() {
    let dir = temp_dir("artifact_magic");
    let out = dir.join("hello.shc");
    compile_fixture("hello.js", &out, "hello", ArtifactClass::Script);
    let mut bytes = fs::read(&out).unwrap();
    bytes[0] = b'X';
    fs::write(&out, bytes).unwrap();

    let result = run(HostConfig::default(), &[&out]);
    assert_eq!(result.status, ExitStatus::RuntimeError);
    assert_eq!(
        result.reports,
        vec!["failed to load compiled artifact `hello`: invalid artifact: bad magic number"]
    );
}

#[test]
fn truncated_artifact_fails_to_load() {
    let dir = temp_dir("artifact_truncated");
    let out = dir.join("hello.shc");
    compile_fixture("hello.js", &out, "hello", ArtifactClass::Script);
    let bytes = fs::read(&out).unwrap();
    fs::write(&out, &bytes[..bytes.len() - 3]).unwrap();

    let result = run(HostConfig::default(), &[&out]);
    assert_eq!(result.status, ExitStatus::RuntimeError);
    assert!(result.reports[0].starts_with("failed to load compiled artifact `hello`"));
}

#[test]
fn renamed_artifact_fails_to_link() {
    let dir = temp_dir("artifact_renamed");
    let out = dir.join("renamed.shc");
    compile_fixture("hello.js", &out, "hello", ArtifactClass::Script);

    let result = run(HostConfig::default(), &[&out]);
    assert_eq!(result.status, ExitStatus::RuntimeError);
    assert!(result.reports[0].contains("link error"));
}

#[test]
fn missing_artifact_is_file_not_found() {
    let dir = temp_dir("artifact_missing");
    let result = run(HostConfig::default(), &[&dir.join("nowhere.shc")]);
    assert_eq!(result.status, ExitStatus::FileNotFound);
}

#[test]
fn artifact_extension_is_configurable() {
    let dir = temp_dir("artifact_ext");
    let out = dir.join("hello.bin");
    compile_fixture("hello.js", &out, "hello", ArtifactClass::Script);

    // Under the default extension the file is treated as source and fails
    // to decode or parse.
    let as_source = run(HostConfig::default(), &[&out]);
    assert_ne!(as_source.status, ExitStatus::Success);

    let config = HostConfig {
        artifact_extension: "bin".to_string(),
        ..HostConfig::default()
    };
    let as_artifact = run(config, &[&out]);
    assert_eq!(as_artifact.printed, "hello from fixture\n");
}
