use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::{TestCase, TickToolError, TESTCASE_SCHEMA_V1};

pub const CASE_FILE_NAME: &str = "testcase.json";

/// Every `.cfg` file under `dir`, keyed by its `/`-separated relative path.
pub fn read_scripts_from_dir(dir: &Path) -> Result<BTreeMap<String, String>, TickToolError> {
    let mut scripts = BTreeMap::new();

    for entry in WalkDir::new(dir)
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
        let Ok(relative) = path.strip_prefix(dir) else {
            continue;
        };
        let relative = relative.to_string_lossy().replace('\\', "/");

        let content = fs::read_to_string(path).map_err(|source| TickToolError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        scripts.insert(relative, content);
    }

    if scripts.is_empty() {
        return Err(TickToolError::SourceEmpty {
            path: dir.to_path_buf(),
        });
    }

    Ok(scripts)
}

pub fn read_test_case(case_path: &Path) -> Result<TestCase, TickToolError> {
    let raw = fs::read_to_string(case_path).map_err(|source| TickToolError::ReadFile {
        path: case_path.to_path_buf(),
        source,
    })?;
    let parsed: TestCase =
        serde_json::from_str(&raw).map_err(|source| TickToolError::ParseCase {
            path: case_path.to_path_buf(),
            source,
        })?;

    if parsed.schema_version != TESTCASE_SCHEMA_V1 {
        return Err(TickToolError::InvalidSchemaVersion {
            expected: TESTCASE_SCHEMA_V1.to_string(),
            found: parsed.schema_version,
        });
    }

    Ok(parsed)
}

/// Directories under `root` holding a `testcase.json`, sorted.
pub fn discover_cases(root: &Path) -> Vec<PathBuf> {
    let mut cases: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file() && entry.file_name() == CASE_FILE_NAME)
        .filter_map(|entry| entry.path().parent().map(Path::to_path_buf))
        .collect();
    cases.sort();
    cases
}

#[cfg(test)]
mod source_tests {
    use super::*;

    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time should move forward")
            .as_nanos();
        std::env::temp_dir().join(format!("tick-tool-{}-{}", name, nanos))
    }

    fn write_file(path: &Path, content: &str) {
        let parent = path.parent().expect("path should have parent");
        fs::create_dir_all(parent).expect("parent dir should be created");
        fs::write(path, content).expect("file should be written");
    }

    #[test]
    fn read_scripts_collects_cfg_files_recursively() {
        let root = temp_dir("scripts");
        write_file(&root.join("main.cfg"), "echo hi");
        write_file(&root.join("lib").join("util.cfg"), "alias hi echo hi");
        write_file(&root.join("notes.txt"), "skip");

        let files = read_scripts_from_dir(&root).expect("scan should pass");
        assert_eq!(files.len(), 2);
        assert!(files.contains_key("main.cfg"));
        assert!(files.contains_key("lib/util.cfg"));
    }

    #[test]
    fn read_scripts_fails_when_directory_has_none() {
        let root = temp_dir("empty");
        fs::create_dir_all(&root).expect("root should be created");
        let error = read_scripts_from_dir(&root).expect_err("empty dir should fail");
        assert!(matches!(error, TickToolError::SourceEmpty { .. }));
    }

    #[test]
    fn read_test_case_validates_schema() {
        let root = temp_dir("case");
        let good = root.join("good.json");
        let bad = root.join("bad.json");
        let broken = root.join("broken.json");
        write_file(&good, r#"{"schemaVersion":"tick-tool-case.v1"}"#);
        write_file(&bad, r#"{"schemaVersion":"other.v9"}"#);
        write_file(&broken, "{");

        assert_eq!(read_test_case(&good).expect("good").entry, "main");
        assert!(matches!(
            read_test_case(&bad),
            Err(TickToolError::InvalidSchemaVersion { .. })
        ));
        assert!(matches!(
            read_test_case(&broken),
            Err(TickToolError::ParseCase { .. })
        ));
        assert!(matches!(
            read_test_case(&root.join("missing.json")),
            Err(TickToolError::ReadFile { .. })
        ));
    }

    #[test]
    fn discover_cases_finds_case_directories() {
        let root = temp_dir("discover");
        write_file(&root.join("b").join(CASE_FILE_NAME), "{}");
        write_file(&root.join("a").join(CASE_FILE_NAME), "{}");
        write_file(&root.join("c").join("main.cfg"), "echo");

        let cases = discover_cases(&root);
        assert_eq!(cases, vec![root.join("a"), root.join("b")]);
    }
}
