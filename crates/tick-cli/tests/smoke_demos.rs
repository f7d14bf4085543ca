use std::path::PathBuf;
use std::process::{Command, Output};

fn demo(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("demos")
        .join(name)
}

fn tick(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tick"))
        .args(args)
        .env("TICK_LOG", "off")
        .output()
        .expect("cli should execute")
}

fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

#[test]
fn run_prints_script_output() {
    let dir = demo("hello");
    let output = tick(&["run", "--scripts-dir", &dir.to_string_lossy()]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(stdout_of(&output), "hello world\nhello tick\n");
}

#[test]
fn run_passes_input_lines() {
    let dir = demo("input");
    let output = tick(&["run", "--scripts-dir", &dir.to_string_lossy(), "--input", "Ada"]);
    assert!(output.status.success());
    assert_eq!(stdout_of(&output), "what is your name?\nhello Ada\n");
}

#[test]
fn run_reports_unhandled_script_error() {
    let dir = demo("errors");
    let output = tick(&["run", "--scripts-dir", &dir.to_string_lossy()]);
    assert_eq!(output.status.code(), Some(1));
    let stdout = stdout_of(&output);
    assert!(stdout.contains("recovered\n"));
    assert!(!stdout.contains("unreachable"));
    assert!(stdout.contains("RESULT:ERROR\n"));
    assert!(stdout.contains("ERROR_CODE:CLI_SCRIPT_ERROR\n"));
    assert!(stdout.contains("ERROR_MSG_JSON:\"fatal\"\n"));
}

#[test]
fn every_demo_without_input_runs() {
    for name in ["hello", "loops", "functions", "tasks", "random"] {
        let dir = demo(name);
        let output = tick(&["run", "--scripts-dir", &dir.to_string_lossy()]);
        assert!(
            output.status.success(),
            "demo {} failed\nstdout:\n{}\nstderr:\n{}",
            name,
            stdout_of(&output),
            String::from_utf8_lossy(&output.stderr)
        );
    }
}

#[test]
fn parse_dumps_script_json() {
    let file = demo("hello").join("main.cfg");
    let output = tick(&["parse", &file.to_string_lossy()]);
    assert!(output.status.success());
    let json: serde_json::Value =
        serde_json::from_str(&stdout_of(&output)).expect("parse output should be json");
    assert_eq!(json.as_array().map(Vec::len), Some(3));
    assert_eq!(json[0][0]["value"], "echo");
}

#[test]
fn parse_text_prints_canonical_script() {
    let dir = std::env::temp_dir().join(format!(
        "tick-smoke-parse-{}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should move forward")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("dir should be created");
    let file = dir.join("main.cfg");
    std::fs::write(&file, "echo   \"two words\";$x | say  \"\\xC3\\xA9\"\n").expect("file should be written");

    let output = tick(&["parse", "--text", &file.to_string_lossy()]);
    assert!(output.status.success());
    assert_eq!(stdout_of(&output), "echo \"two words\"\n(x) | say é\n");
}
