use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tick_core::ScriptError;
use tick_runtime::VirtualMachineOptions;
use walkdir::WalkDir;

use crate::{map_cli_config_read, map_cli_source_path, map_cli_source_read};

pub(crate) fn resolve_scripts_dir(scripts_dir: &str) -> Result<PathBuf, ScriptError> {
    let path = PathBuf::from(scripts_dir);
    let absolute = if path.is_absolute() {
        path
    } else {
        std::env::current_dir()
            .map_err(map_cli_source_path)?
            .join(path)
    };

    if !absolute.exists() {
        return Err(ScriptError::new(
            "CLI_SOURCE_NOT_FOUND",
            format!("scripts-dir does not exist: {}", absolute.display()),
        ));
    }

    if !absolute.is_dir() {
        return Err(ScriptError::new(
            "CLI_SOURCE_NOT_DIR",
            format!("scripts-dir is not a directory: {}", absolute.display()),
        ));
    }

    Ok(absolute)
}

pub(crate) fn read_scripts_from_dir(
    scripts_dir: &Path,
) -> Result<BTreeMap<String, String>, ScriptError> {
    let mut scripts = BTreeMap::new();

    for entry in WalkDir::new(scripts_dir)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("cfg") {
            continue;
        }

        let Ok(relative) = path.strip_prefix(scripts_dir) else {
            continue;
        };
        let relative = relative.to_string_lossy().replace('\\', "/");
        let content = fs::read_to_string(path).map_err(map_cli_source_read)?;
        scripts.insert(relative, content);
    }

    if scripts.is_empty() {
        return Err(ScriptError::new(
            "CLI_SOURCE_EMPTY",
            format!("No .cfg files under {}", scripts_dir.display()),
        ));
    }

    Ok(scripts)
}

/// Engine limits from an optional JSON file; defaults when absent.
pub(crate) fn load_options(config: Option<&str>) -> Result<VirtualMachineOptions, ScriptError> {
    let Some(config) = config else {
        return Ok(VirtualMachineOptions::default());
    };
    let raw = fs::read_to_string(config).map_err(map_cli_config_read)?;
    VirtualMachineOptions::from_json(&raw)
}

#[cfg(test)]
mod source_loader_tests {
    use super::*;

    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time should move forward")
            .as_nanos();
        std::env::temp_dir().join(format!("tick-cli-{}-{}", name, nanos))
    }

    fn write_file(path: &Path, content: &str) {
        let parent = path.parent().expect("path should have parent");
        fs::create_dir_all(parent).expect("parent dir should be created");
        fs::write(path, content).expect("file should be written");
    }

    #[test]
    fn resolve_scripts_dir_rejects_missing_and_files() {
        let root = temp_dir("resolve");
        let missing = resolve_scripts_dir(&root.to_string_lossy()).expect_err("missing");
        assert_eq!(missing.code, "CLI_SOURCE_NOT_FOUND");

        let file = root.join("main.cfg");
        write_file(&file, "echo");
        let not_dir = resolve_scripts_dir(&file.to_string_lossy()).expect_err("file");
        assert_eq!(not_dir.code, "CLI_SOURCE_NOT_DIR");
        assert_eq!(
            resolve_scripts_dir(&root.to_string_lossy()).expect("dir"),
            root
        );
    }

    #[test]
    fn read_scripts_from_dir_keeps_relative_names() {
        let root = temp_dir("scan");
        write_file(&root.join("main.cfg"), "echo main");
        write_file(&root.join("lib").join("a.cfg"), "echo a");
        write_file(&root.join("readme.md"), "skip");

        let scripts = read_scripts_from_dir(&root).expect("scan");
        assert_eq!(
            scripts.keys().cloned().collect::<Vec<_>>(),
            vec!["lib/a.cfg".to_string(), "main.cfg".to_string()]
        );

        let empty = temp_dir("scan-empty");
        fs::create_dir_all(&empty).expect("dir");
        assert_eq!(
            read_scripts_from_dir(&empty).expect_err("empty").code,
            "CLI_SOURCE_EMPTY"
        );
    }

    #[test]
    fn load_options_reads_camel_case_json() {
        assert_eq!(load_options(None).expect("defaults"), VirtualMachineOptions::default());

        let root = temp_dir("config");
        let path = root.join("engine.json");
        write_file(&path, r#"{"maxCallDepth": 12, "randomSeed": 7}"#);
        let options = load_options(Some(&path.to_string_lossy())).expect("options");
        assert_eq!(options.max_call_depth, 12);
        assert_eq!(options.random_seed, Some(7));

        write_file(&path, "{");
        assert_eq!(
            load_options(Some(&path.to_string_lossy())).expect_err("invalid").code,
            "ENGINE_OPTIONS_INVALID"
        );
        assert_eq!(
            load_options(Some(&root.join("none.json").to_string_lossy()))
                .expect_err("missing")
                .code,
            "CLI_CONFIG_READ"
        );
    }
}
