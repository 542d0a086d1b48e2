//! Workspace, restore and recovery behaviour on a real filesystem.

use std::fs;
use std::io::Write;
use std::path::Path;

use chrono::{Local, TimeZone};
use simbench_core::timing::write_compile_timing;
use simbench_core::{
    recover, BackupSlot, BenchError, BenchmarkKind, DeviceKind, Measurement, RunConfiguration,
    RunContext, SweepAxes, TimingLog, TimingRecord, Workspace, WorkspaceError,
};
use tempfile::TempDir;

fn write_source_zip(path: &Path) {
    let file = fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let opts = zip::write::FileOptions::default();
    zip.start_file("pyglasma3d-master/setup.py", opts).unwrap();
    zip.write_all(b"# setup").unwrap();
    zip.start_file("pyglasma3d-master/examples/mv_init_bench.py", opts)
        .unwrap();
    zip.write_all(b"print('init')").unwrap();
    zip.finish().unwrap();
}

fn context(root: &TempDir) -> RunContext {
    let config = RunConfiguration::new(
        DeviceKind::Cuda,
        true,
        2,
        BenchmarkKind::Init,
        SweepAxes::default(),
    )
    .unwrap();
    let started = Local.with_ymd_and_hms(2026, 10, 18, 10, 15, 0).unwrap();
    RunContext::new(
        config,
        &root.path().join("out"),
        &root.path().join("scratch"),
        started,
    )
}

fn measurement() -> Measurement {
    Measurement {
        wall_seconds: 1.0,
        user_seconds: 0.5,
        system_seconds: 0.1,
    }
}

#[test]
fn test_restore_is_idempotent_and_undoes_mutation() {
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("src.zip");
    write_source_zip(&archive);

    let ws = Workspace::create(dir.path().join("ws")).unwrap();
    let source = ws.prepare(&archive).unwrap();
    let pristine = ws.snapshot(BackupSlot::Pristine).unwrap();

    fs::write(source.join("setup.py"), "mutated").unwrap();
    fs::write(source.join("build.log"), "junk").unwrap();
    fs::remove_file(source.join("examples/mv_init_bench.py")).unwrap();

    ws.restore(&pristine).unwrap();
    ws.restore(&pristine).unwrap();

    assert_eq!(fs::read_to_string(source.join("setup.py")).unwrap(), "# setup");
    assert!(source.join("examples/mv_init_bench.py").is_file());
    assert!(!source.join("build.log").exists());
}

#[test]
fn test_baseline_snapshot_replaces_pristine_for_sweep() {
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("src.zip");
    write_source_zip(&archive);

    let ws = Workspace::create(dir.path().join("ws")).unwrap();
    let source = ws.prepare(&archive).unwrap();
    ws.snapshot(BackupSlot::Pristine).unwrap();
    fs::write(source.join("built.so"), "binary").unwrap();
    let baseline = ws.snapshot(BackupSlot::Baseline).unwrap();

    fs::remove_file(source.join("built.so")).unwrap();
    ws.restore(&baseline).unwrap();
    assert!(source.join("built.so").is_file());
}

#[test]
fn test_overlay_copies_scripts_into_source() {
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("src.zip");
    write_source_zip(&archive);
    let scripts = dir.path().join("scripts");
    fs::create_dir_all(&scripts).unwrap();
    fs::write(scripts.join("mv_test_setup.py"), "smoke").unwrap();

    let ws = Workspace::create(dir.path().join("ws")).unwrap();
    let source = ws.prepare(&archive).unwrap();
    let n = ws.overlay(&scripts, Path::new("examples")).unwrap();
    assert_eq!(n, 1);
    assert!(source.join("examples/mv_test_setup.py").is_file());
    assert_eq!(
        ws.overlay(&dir.path().join("absent"), Path::new("examples"))
            .unwrap(),
        0
    );
}

#[test]
fn test_recovery_salvages_and_tags() {
    let root = TempDir::new().unwrap();
    let mut ctx = context(&root);
    let archive = root.path().join("src.zip");
    write_source_zip(&archive);

    let ws = ctx.create_workspace().unwrap();
    ws.prepare(&archive).unwrap();
    ws.snapshot(BackupSlot::Pristine).unwrap();
    ctx.create_output_dir().unwrap();

    let layout = ctx.layout();
    let log = TimingLog::new(&layout.timings(), "init_bench");
    for run in 1..=3 {
        log.append(&TimingRecord::new("device=cuda", run, &measurement()))
            .unwrap();
    }
    write_compile_timing(
        &layout.timings(),
        "init_bench",
        &TimingRecord::new("compile", 1, &measurement()),
    )
    .unwrap();

    let err = BenchError::Invocation("exit status 1".into());
    let report = recover(&mut ctx, &err);

    let failed_ws = report.renamed_to(&ctx.workspace_root).unwrap().to_path_buf();
    let failed_out = report.renamed_to(&ctx.output_dir).unwrap().to_path_buf();
    assert!(failed_ws.to_string_lossy().ends_with("_FAILED"));
    assert!(failed_out.to_string_lossy().ends_with("_FAILED"));
    assert!(!ctx.workspace_root.exists());
    assert!(!ctx.output_dir.exists());

    assert!(!failed_ws.join("source").exists());
    assert!(!failed_ws.join("pristine").exists());
    assert!(failed_ws.join("timings/init_bench.jsonl").is_file());

    let salvaged = TimingLog::new(&failed_out.join("timings"), "init_bench");
    assert_eq!(salvaged.read_all().unwrap().len(), 3);
    assert!(failed_out.join("timings/init_bench_compile.json").is_file());

    let again = recover(&mut ctx, &err);
    assert!(again.is_empty());
    assert!(failed_ws.exists());
    assert!(failed_out.exists());
}

#[test]
fn test_recovery_retains_scratch_with_custom_tag() {
    let root = TempDir::new().unwrap();
    let mut ctx = context(&root)
        .with_retain_scratch(true)
        .with_failure_tag("ABORTED");
    let archive = root.path().join("src.zip");
    write_source_zip(&archive);
    let ws = ctx.create_workspace().unwrap();
    ws.prepare(&archive).unwrap();

    let report = recover(&mut ctx, &BenchError::Interrupted);
    let tagged = report.renamed_to(&ctx.workspace_root).unwrap();
    assert!(tagged.to_string_lossy().ends_with("_ABORTED"));
    assert!(tagged.join("source/setup.py").is_file());
    assert!(report.purged.is_empty());
}

#[test]
fn test_recovery_before_any_state_is_noop_on_disk() {
    let root = TempDir::new().unwrap();
    let mut ctx = context(&root);
    let report = recover(
        &mut ctx,
        &BenchError::InputValidation("repeat must be positive".into()),
    );
    assert!(report.renamed.is_empty());
    assert!(ctx.is_recovered());
}

#[test]
fn test_recovery_leaves_colliding_run_untouched() {
    let root = TempDir::new().unwrap();
    let archive = root.path().join("src.zip");
    write_source_zip(&archive);

    // Another run with the same id already owns both directories.
    let mut other = context(&root);
    let other_ws = other.create_workspace().unwrap();
    other_ws.prepare(&archive).unwrap();
    other.create_output_dir().unwrap();
    fs::write(other_ws.source().join("live.py"), "running").unwrap();

    let mut ctx = context(&root);
    let err = BenchError::from(ctx.create_workspace().unwrap_err());
    assert!(matches!(
        err,
        BenchError::Workspace(WorkspaceError::AlreadyExists(_))
    ));
    let report = recover(&mut ctx, &err);

    assert!(report.is_empty());
    assert!(ctx.is_recovered());
    assert_eq!(
        fs::read_to_string(other_ws.source().join("live.py")).unwrap(),
        "running"
    );
    assert!(other.output_dir.is_dir());
    let names: Vec<_> = fs::read_dir(root.path().join("scratch"))
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(names.len(), 1);
    assert!(!names[0].to_string_lossy().contains("FAILED"));
}
