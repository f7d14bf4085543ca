use std::path::Path;
use std::rc::Rc;

use tick_core::Privileges;
use tick_runtime::{LineBuffer, Registry, ScriptLibrary, VirtualMachine, VirtualMachineOptions};

use crate::source::{read_scripts_from_dir, read_test_case};
use crate::{TestCase, TickToolError, CASE_FILE_NAME};

const TICK_SECONDS: f64 = 1.0 / 60.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub output: Vec<String>,
    pub ticks: u64,
}

/// Runs the case's entry script with every `.cfg` under `case_dir` available
/// to `source`, ticking until the entry process and its children are gone.
pub fn run_case(case_dir: &Path, case: &TestCase) -> Result<RunReport, TickToolError> {
    let library = Rc::new(ScriptLibrary::new(read_scripts_from_dir(case_dir)?));
    let entry = library
        .get(&case.entry)
        .map(str::to_string)
        .ok_or_else(|| TickToolError::EntryNotFound {
            entry: case.entry.clone(),
        })?;
    let registry = Registry::builder()
        .with_core_commands()
        .with_script_library(library)
        .build()?;

    let output = Rc::new(LineBuffer::default());
    let mut vm = VirtualMachine::new(
        registry,
        VirtualMachineOptions {
            random_seed: Some(1),
            ..VirtualMachineOptions::default()
        },
    );
    vm.set_output(output.clone());
    vm.set_error_output(output.clone());

    let id = vm.launch_script(&entry, Privileges::ALL);
    if let Some(process) = vm.find_process_mut(id) {
        for line in &case.input {
            process.push_input(line.clone());
        }
    }

    for tick in 1..=case.max_ticks {
        vm.run(TICK_SECONDS);
        if vm.process_count() == 0 {
            return Ok(RunReport {
                output: output.take_lines(),
                ticks: tick,
            });
        }
    }

    Err(TickToolError::TickBudgetExceeded {
        max_ticks: case.max_ticks,
    })
}

/// Loads `case_dir/testcase.json`, runs it and compares output line by line.
pub fn assert_case(case_dir: &Path) -> Result<RunReport, TickToolError> {
    let case = read_test_case(&case_dir.join(CASE_FILE_NAME))?;
    let report = run_case(case_dir, &case)?;

    if report.output.len() != case.expected_output.len() {
        let observed =
            serde_json::to_string_pretty(&report.output).map_err(TickToolError::OutputSerialize)?;
        return Err(TickToolError::OutputCountMismatch {
            expected: case.expected_output.len(),
            actual: report.output.len(),
            observed,
        });
    }

    for (index, (expected, actual)) in case
        .expected_output
        .iter()
        .zip(report.output.iter())
        .enumerate()
    {
        if !expected.matches(actual)? {
            return Err(TickToolError::OutputMismatch {
                index,
                expected: expected.describe(),
                actual: actual.clone(),
            });
        }
    }

    Ok(report)
}

#[cfg(test)]
mod runner_tests {
    use super::*;

    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    use crate::{ExpectedLine, TESTCASE_SCHEMA_V1};

    fn temp_dir(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time should move forward")
            .as_nanos();
        std::env::temp_dir().join(format!("tick-tool-runner-{}-{}", name, nanos))
    }

    fn write_file(path: &Path, content: &str) {
        let parent = path.parent().expect("path should have parent");
        fs::create_dir_all(parent).expect("parent dir should be created");
        fs::write(path, content).expect("file should be written");
    }

    fn simple_case(expected_output: Vec<ExpectedLine>) -> TestCase {
        TestCase {
            schema_version: TESTCASE_SCHEMA_V1.to_string(),
            entry: "main".to_string(),
            input: Vec::new(),
            max_ticks: 50,
            expected_output,
        }
    }

    #[test]
    fn run_case_collects_output_until_processes_finish() {
        let root = temp_dir("waits");
        write_file(
            &root.join("main.cfg"),
            "source lib/greet\ngreet start\nlaunch {wait 2; greet child}\nwait 4\necho done",
        );
        write_file(&root.join("lib").join("greet.cfg"), "alias greet echo hello");

        let report = run_case(&root, &simple_case(Vec::new())).expect("run should pass");
        assert_eq!(report.output, vec!["hello start", "hello child", "done"]);
        assert_eq!(report.ticks, 5);
    }

    #[test]
    fn run_case_feeds_input_lines() {
        let root = temp_dir("input");
        write_file(&root.join("main.cfg"), "echo got (read); echo then (read)");
        let mut case = simple_case(Vec::new());
        case.input = vec!["one".to_string(), "two".to_string()];

        let report = run_case(&root, &case).expect("run should pass");
        assert_eq!(report.output, vec!["got one", "then two"]);
    }

    #[test]
    fn run_case_reports_missing_entry_and_budget() {
        let root = temp_dir("budget");
        write_file(&root.join("main.cfg"), "read");
        let mut case = simple_case(Vec::new());
        case.max_ticks = 3;
        assert!(matches!(
            run_case(&root, &case),
            Err(TickToolError::TickBudgetExceeded { max_ticks: 3 })
        ));

        case.entry = "other".to_string();
        assert!(matches!(
            run_case(&root, &case),
            Err(TickToolError::EntryNotFound { .. })
        ));
    }

    #[test]
    fn assert_case_compares_lines() {
        let root = temp_dir("assert");
        write_file(&root.join("main.cfg"), "echo roll (random 6)\nthrow done");
        write_file(
            &root.join(CASE_FILE_NAME),
            r#"{
  "schemaVersion": "tick-tool-case.v1",
  "expectedOutput": [
    {"kind": "regex", "pattern": "roll [0-5]"},
    {"kind": "literal", "text": "done"}
  ]
}"#,
        );
        assert!(assert_case(&root).is_ok());

        write_file(
            &root.join(CASE_FILE_NAME),
            r#"{"schemaVersion": "tick-tool-case.v1", "expectedOutput": [{"kind": "literal", "text": "x"}]}"#,
        );
        assert!(matches!(
            assert_case(&root),
            Err(TickToolError::OutputCountMismatch {
                expected: 1,
                actual: 2,
                ..
            })
        ));

        write_file(
            &root.join(CASE_FILE_NAME),
            r#"{"schemaVersion": "tick-tool-case.v1", "expectedOutput": [
  {"kind": "regex", "pattern": "roll [0-5]"},
  {"kind": "literal", "text": "finished"}
]}"#,
        );
        match assert_case(&root) {
            Err(TickToolError::OutputMismatch { index, actual, .. }) => {
                assert_eq!(index, 1);
                assert_eq!(actual, "done");
            }
            other => panic!("expected mismatch, got {:?}", other),
        }
    }
}
