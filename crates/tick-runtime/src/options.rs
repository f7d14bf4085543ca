use serde::{Deserialize, Serialize};
use tick_core::ScriptError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VirtualMachineOptions {
    pub max_call_depth: usize,
    pub max_alias_depth: usize,
    pub max_steps_per_run: usize,
    pub await_tick_budget: usize,
    pub random_seed: Option<u32>,
    pub script_cache_size: usize,
}

impl Default for VirtualMachineOptions {
    fn default() -> Self {
        Self {
            max_call_depth: 256,
            max_alias_depth: 32,
            max_steps_per_run: 100_000,
            await_tick_budget: 10_000,
            random_seed: None,
            script_cache_size: 512,
        }
    }
}

impl VirtualMachineOptions {
    pub fn from_json(text: &str) -> Result<Self, ScriptError> {
        serde_json::from_str(text).map_err(|error| {
            ScriptError::new(
                "ENGINE_OPTIONS_INVALID",
                format!("Invalid engine options: {}", error),
            )
        })
    }
}

#[cfg(test)]
mod options_tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let options =
            VirtualMachineOptions::from_json(r#"{"maxCallDepth": 8, "randomSeed": 3}"#)
                .expect("options should parse");
        assert_eq!(options.max_call_depth, 8);
        assert_eq!(options.random_seed, Some(3));
        assert_eq!(options.max_alias_depth, 32);
        assert_eq!(options.max_steps_per_run, 100_000);
    }

    #[test]
    fn malformed_json_is_reported() {
        let error = VirtualMachineOptions::from_json("{").expect_err("should fail");
        assert_eq!(error.code, "ENGINE_OPTIONS_INVALID");
    }
}
