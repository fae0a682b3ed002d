use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn karlik(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_karlik"))
        .arg("--no-color")
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run karlik")
}

fn scenarios() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("scenarios")
}

fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[test]
fn scenario_corpus_passes() {
    let dir = scenarios();
    let output = karlik(&["test", dir.to_str().unwrap()]);
    let stderr = text(&output.stderr);
    assert!(output.status.success(), "{}", stderr);
    assert!(stderr.contains("test result: ok."), "{}", stderr);
    assert!(!stderr.contains("FAIL"), "{}", stderr);
}

#[test]
fn category_filter_runs_one_folder() {
    let dir = scenarios();
    let output = karlik(&["test", dir.to_str().unwrap(), "-c", "calls"]);
    let stderr = text(&output.stderr);
    assert!(output.status.success(), "{}", stderr);
    assert!(stderr.contains("4 passed, 0 failed"), "{}", stderr);
    assert!(!stderr.contains("tags"), "{}", stderr);
}

#[test]
fn failing_scenario_sets_the_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wrong.test.kar");
    std::fs::write(
        &path,
        "---\nproc = \"AAAAAAAA\"\nexpect_robots = [{ x = 0, y = 0, dir = \"east\" }]\n---\n\
         2 1\n\n0 0\n1\nAAAAAAAA\n1\n0 1\n1\n0 0 0 0\n0\n0\n",
    )
    .unwrap();
    let output = karlik(&["test", path.to_str().unwrap()]);
    let stderr = text(&output.stderr);
    assert!(!output.status.success());
    assert!(stderr.contains("expected (0, 0) facing east, found (1, 0) facing east"), "{}", stderr);
}

#[test]
fn run_reports_and_saves_the_session() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("world.kar");
    let saved = dir.path().join("after.kar");
    std::fs::write(
        &input,
        "3 1\n\n0 0 0\n1\nAAAAAAAA\n1\n0 1\n1\n0 0 0 0\n0\n0\n",
    )
    .unwrap();

    let output = karlik(&[
        "run",
        input.to_str().unwrap(),
        "--proc",
        "AAAAAAAA",
        "--save",
        saved.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "{}", text(&output.stderr));
    let stdout = text(&output.stdout);
    assert!(stdout.contains("1 round(s)"), "{}", stdout);
    assert!(stdout.contains("robot at (1, 0) facing east: idle"), "{}", stdout);

    let after = std::fs::read_to_string(&saved).unwrap();
    assert!(after.ends_with("1\n1 0 0 0\n0\n0\n"), "{}", after);
}

#[test]
fn run_exits_with_failure_when_a_robot_faults() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("world.kar");
    std::fs::write(&input, "1 1\n\n0\n1\nAAAAAAAA\n1\n0 1\n1\n0 0 0 0\n0\n0\n").unwrap();

    let output = karlik(&["run", input.to_str().unwrap(), "--proc", "AAAAAAAA"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(text(&output.stdout).contains("faulted: hit-wall"));
}

#[test]
fn check_renders_load_errors() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("broken.kar");
    std::fs::write(&input, "1 1\n\n7\n0\n0\n").unwrap();

    let output = karlik(&["check", input.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = text(&output.stderr);
    assert!(stderr.contains("tile code 7 out of range"), "{}", stderr);
    assert!(stderr.contains("broken.kar"), "{}", stderr);
}
