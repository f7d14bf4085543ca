use std::path::Path;

use tick_tool::{assert_case, discover_cases};

#[test]
fn every_demo_case_matches_its_expected_output() {
    let demos = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("demos");
    let cases = discover_cases(&demos);
    assert!(!cases.is_empty(), "expected demo cases under {}", demos.display());

    for case_dir in cases {
        if let Err(error) = assert_case(&case_dir) {
            panic!("demo {} failed: {}", case_dir.display(), error);
        }
    }
}
