//! End-to-end CLI test, exercising the compiled `weaveq` binary as an external process (§6, §11.6).

use std::io::Write;
use std::process::Command;

use predicates::prelude::*;
use predicates::str::contains;

fn weaveq_bin() -> &'static str {
    env!("CARGO_BIN_EXE_weaveq")
}

#[test]
fn eq_pivot_query_against_jsonl_sources_writes_matches_to_output_file() {
    let dir = tempfile::tempdir().unwrap();

    let seed_path = dir.path().join("seed.jsonl");
    let mut seed_file = std::fs::File::create(&seed_path).unwrap();
    writeln!(seed_file, r#"{{"id": 1, "n": "a"}}"#).unwrap();
    writeln!(seed_file, r#"{{"id": 2, "n": "b"}}"#).unwrap();

    let pivot_path = dir.path().join("pivot.jsonl");
    let mut pivot_file = std::fs::File::create(&pivot_path).unwrap();
    writeln!(pivot_file, r#"{{"nid": 1, "c": 10}}"#).unwrap();
    writeln!(pivot_file, r#"{{"nid": 6, "c": 11}}"#).unwrap();

    let query_path = dir.path().join("query.txt");
    std::fs::write(
        &query_path,
        format!(
            r#"#from "jsonl:{}" #as a #pivot-to "jsonl:{}" #as b #where a.id = b.nid"#,
            seed_path.display(),
            pivot_path.display()
        ),
    )
    .unwrap();

    let output_path = dir.path().join("out.jsonl");

    let status = Command::new(weaveq_bin())
        .args(["-q", query_path.to_str().unwrap()])
        .args(["-o", output_path.to_str().unwrap()])
        .status()
        .unwrap();
    assert!(status.success());

    let output_text = std::fs::read_to_string(&output_path).unwrap();
    assert!(contains("\"nid\":1").eval(&output_text));
    assert!(contains("\"c\":10").eval(&output_text));
    assert!(!contains("\"nid\":6").eval(&output_text));
}

#[test]
fn unknown_source_type_exits_with_failure_and_reports_error_on_stderr() {
    let dir = tempfile::tempdir().unwrap();
    let query_path = dir.path().join("query.txt");
    std::fs::write(
        &query_path,
        r#"#from "bogus:wherever" #as a #pivot-to "bogus:elsewhere" #as b #where a.id = b.nid"#,
    )
    .unwrap();

    let output = Command::new(weaveq_bin())
        .args(["-q", query_path.to_str().unwrap()])
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(contains("unknown data source type").eval(&stderr));
}

#[test]
fn missing_query_flag_exits_with_failure() {
    let output = Command::new(weaveq_bin()).output().unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(contains("-q").eval(&stderr));
}
