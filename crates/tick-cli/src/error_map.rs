use std::fmt::Display;

use tick_core::ScriptError;

fn map_error(code: &'static str, error: impl Display) -> ScriptError {
    ScriptError::new(code, error.to_string())
}

pub(crate) fn emit_error(error: ScriptError) -> i32 {
    println!("RESULT:ERROR");
    println!("ERROR_CODE:{}", error.code);
    println!(
        "ERROR_MSG_JSON:{}",
        serde_json::to_string(&error.message).unwrap_or_else(|_| "\"Unknown error\"".to_string())
    );
    1
}

pub(crate) fn map_console_io(error: std::io::Error) -> ScriptError {
    map_error("CONSOLE_IO", error)
}

pub(crate) fn map_cli_source_path(error: std::io::Error) -> ScriptError {
    map_error("CLI_SOURCE_PATH", error)
}

pub(crate) fn map_cli_source_read(error: std::io::Error) -> ScriptError {
    map_error("CLI_SOURCE_READ", error)
}

pub(crate) fn map_cli_config_read(error: std::io::Error) -> ScriptError {
    map_error("CLI_CONFIG_READ", error)
}

pub(crate) fn map_cli_json(error: serde_json::Error) -> ScriptError {
    map_error("CLI_JSON", error)
}

#[cfg(test)]
mod error_map_tests {
    use super::*;

    #[test]
    fn emit_error_returns_non_zero_exit_code() {
        let code = emit_error(ScriptError::new("ERR", "failed"));
        assert_eq!(code, 1);
    }

    #[test]
    fn mapping_helpers_keep_error_codes() {
        assert_eq!(map_console_io(std::io::Error::other("io")).code, "CONSOLE_IO");
        assert_eq!(
            map_cli_source_path(std::io::Error::other("path")).code,
            "CLI_SOURCE_PATH"
        );
        assert_eq!(
            map_cli_source_read(std::io::Error::other("read")).code,
            "CLI_SOURCE_READ"
        );
        assert_eq!(
            map_cli_config_read(std::io::Error::other("read")).code,
            "CLI_CONFIG_READ"
        );
        let invalid = serde_json::from_str::<serde_json::Value>("{").expect_err("invalid json");
        assert_eq!(map_cli_json(invalid).code, "CLI_JSON");
    }
}
