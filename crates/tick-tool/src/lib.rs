mod case;
mod runner;
mod source;

pub use case::{ExpectedLine, TestCase, TESTCASE_SCHEMA_V1};
pub use runner::{assert_case, run_case, RunReport};
pub use source::{discover_cases, read_scripts_from_dir, read_test_case, CASE_FILE_NAME};

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TickToolError {
    #[error("Failed to read file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse testcase {path}: {source}")]
    ParseCase {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Invalid testcase schema version \"{found}\", expected \"{expected}\".")]
    InvalidSchemaVersion { expected: String, found: String },
    #[error("No .cfg files under {path}.")]
    SourceEmpty { path: PathBuf },
    #[error("Entry script \"{entry}\" not found.")]
    EntryNotFound { entry: String },
    #[error("Engine error: {0}")]
    Engine(#[from] tick_core::ScriptError),
    #[error("Tick budget exceeded: max_ticks={max_ticks}.")]
    TickBudgetExceeded { max_ticks: u64 },
    #[error("Invalid output pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        source: regex::Error,
    },
    #[error("Expected {expected} output lines, actual {actual}. observed={observed}")]
    OutputCountMismatch {
        expected: usize,
        actual: usize,
        observed: String,
    },
    #[error("Output mismatch at line {index}. expected={expected} actual={actual:?}")]
    OutputMismatch {
        index: usize,
        expected: String,
        actual: String,
    },
    #[error("Failed to serialize output for diff: {0}")]
    OutputSerialize(serde_json::Error),
}
