// End-to-end tests for the `fen` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

fn source_file(dir: &tempfile::TempDir, name: &str, source: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).expect("create source file");
    file.write_all(source.as_bytes()).expect("write source");
    path
}

#[test]
fn run_executes_a_program() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = source_file(
        &dir,
        "s1.fen",
        "let a = 1 + 2 * 3;\necho(int_to_string(a));",
    );

    Command::cargo_bin("fen")
        .expect("binary")
        .arg("run")
        .arg(&path)
        .assert()
        .success()
        .stdout("7\n");
}

#[test]
fn semantic_error_exits_nonzero_with_diagnostic() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = source_file(
        &dir,
        "bad.fen",
        "trait Printable { def show() -> String; }\n\
         def writeln<T: Printable>(t: T) -> Unit { echo(t.show()); }\n\
         writeln(42);",
    );

    Command::cargo_bin("fen")
        .expect("binary")
        .arg("run")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("ConstraintViolation"))
        .stderr(predicate::str::contains("bad.fen"));
}

#[test]
fn syntax_error_reports_span() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = source_file(&dir, "syntax.fen", "let = 3;");

    Command::cargo_bin("fen")
        .expect("binary")
        .arg("run")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("SyntaxError"));
}

#[test]
fn check_compiles_without_executing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = source_file(&dir, "ok.fen", "echo(\"side effect\");");

    Command::cargo_bin("fen")
        .expect("binary")
        .arg("check")
        .arg(&path)
        .assert()
        .success()
        .stdout("");
}

#[test]
fn ast_dumps_json() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = source_file(&dir, "ast.fen", "let a = 1;");

    Command::cargo_bin("fen")
        .expect("binary")
        .arg("ast")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"decls\""));
}
