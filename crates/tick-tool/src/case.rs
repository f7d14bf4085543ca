use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::TickToolError;

pub const TESTCASE_SCHEMA_V1: &str = "tick-tool-case.v1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub schema_version: String,
    #[serde(default = "default_entry")]
    pub entry: String,
    /// Lines queued on the entry process before the first tick.
    #[serde(default)]
    pub input: Vec<String>,
    #[serde(default = "default_max_ticks")]
    pub max_ticks: u64,
    #[serde(default)]
    pub expected_output: Vec<ExpectedLine>,
}

fn default_entry() -> String {
    "main".to_string()
}

fn default_max_ticks() -> u64 {
    1_000
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ExpectedLine {
    Literal { text: String },
    Regex { pattern: String },
}

impl ExpectedLine {
    pub fn matches(&self, line: &str) -> Result<bool, TickToolError> {
        match self {
            Self::Literal { text } => Ok(text == line),
            Self::Regex { pattern } => {
                let regex = Regex::new(&format!("^(?:{})$", pattern)).map_err(|source| {
                    TickToolError::InvalidPattern {
                        pattern: pattern.clone(),
                        source,
                    }
                })?;
                Ok(regex.is_match(line))
            }
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Literal { text } => format!("{:?}", text),
            Self::Regex { pattern } => format!("/{}/", pattern),
        }
    }
}
