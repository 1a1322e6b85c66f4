use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant, SystemTime};

const TIMEOUT: Duration = Duration::from_secs(60);

fn repo_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

fn figure_path() -> PathBuf {
    repo_root()
        .join("figures")
        .join("gd_torch_quadratic_diagnostics.png")
}

fn run_binary(binary: &Path) -> Output {
    let mut child = Command::new(binary)
        .current_dir(repo_root())
        .env("RUST_LOG", "warn")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn binary");

    let deadline = Instant::now() + TIMEOUT;
    loop {
        if child.try_wait().expect("failed to poll child").is_some() {
            break;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            panic!("binary did not finish within {TIMEOUT:?}");
        }
        thread::sleep(Duration::from_millis(20));
    }
    child.wait_with_output().expect("failed to collect output")
}

fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "binary failed: {}",
        if output.stderr.is_empty() {
            String::from_utf8_lossy(&output.stdout)
        } else {
            String::from_utf8_lossy(&output.stderr)
        }
    );
}

fn assert_fresh_figure(before: SystemTime) {
    let figure = figure_path();
    assert!(figure.exists(), "figure not produced: {}", figure.display());
    let meta = fs::metadata(&figure).unwrap();
    assert!(meta.len() > 0, "figure is empty");
    // mtimeの分解能が粗いファイルシステムに備えて1秒の余裕を持たせる
    let modified = meta.modified().unwrap();
    assert!(modified + Duration::from_secs(1) >= before, "figure is stale");
}

// 出力先が固定パスなので、シナリオは1つのテストの中で順番に実行する
#[test]
fn binary_runs_and_produces_figure() {
    let binary = PathBuf::from(env!("CARGO_BIN_EXE_gd_quadratic"));
    assert!(binary.exists(), "binary not found: {}", binary.display());

    let figure = figure_path();
    if figure.exists() {
        fs::remove_file(&figure).unwrap();
    }

    // fresh run
    let before = SystemTime::now();
    let output = run_binary(&binary);
    assert_success(&output);
    assert_fresh_figure(before);

    let stdout = String::from_utf8_lossy(&output.stdout);
    let line = stdout.trim_end();
    assert_eq!(line.lines().count(), 1, "unexpected stdout: {stdout}");
    let saved = line.strip_prefix("Saved ").expect("missing Saved prefix");
    assert!(Path::new(saved).is_absolute());
    assert_eq!(
        fs::canonicalize(saved).unwrap(),
        fs::canonicalize(&figure).unwrap()
    );

    // second run overwrites
    let before = SystemTime::now();
    let output = run_binary(&binary);
    assert_success(&output);
    assert_fresh_figure(before);

    // missing output directory is recreated
    fs::remove_dir_all(figure.parent().unwrap()).unwrap();
    let before = SystemTime::now();
    let output = run_binary(&binary);
    assert_success(&output);
    assert_fresh_figure(before);
}
