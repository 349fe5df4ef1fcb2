//! Integration tests for the lsdom CLI
//!
//! These tests run the actual binary against template, data and script
//! files written to a temporary directory.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const TODO_APP: &str = r#"<section><input id="new" model="draft"><button id="add" click="push('todos', {text: draft})">add</button><ul><li for="todo in todos">{todo.text}</li></ul><footer>{todos.length} items</footer></section>"#;

fn lsdom_cmd() -> Command {
    Command::cargo_bin("lsdom").unwrap()
}

fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

// ═══════════════════════════════════════════════════════════════
// General
// ═══════════════════════════════════════════════════════════════

#[test]
fn test_help_flag() {
    lsdom_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("reactive template binding"))
        .stdout(predicate::str::contains("render"))
        .stdout(predicate::str::contains("check"));
}

#[test]
fn test_version_flag() {
    lsdom_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("lsdom"));
}

#[test]
fn test_missing_template_file() {
    lsdom_cmd()
        .args(["render", "/nonexistent/template.html"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("reading template"));
}

// ═══════════════════════════════════════════════════════════════
// render
// ═══════════════════════════════════════════════════════════════

#[test]
fn test_render_with_data() {
    let dir = TempDir::new().unwrap();
    let template = write(&dir, "app.html", TODO_APP);
    let data = write(&dir, "data.json", r#"{"draft": "", "todos": [{"text": "milk"}]}"#);

    lsdom_cmd()
        .arg("render")
        .arg(&template)
        .arg("--data")
        .arg(&data)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "<ul><!--for--><li>milk</li><!--end--></ul>",
        ))
        .stdout(predicate::str::contains("<footer>1 items</footer>"));
}

#[test]
fn test_render_without_data_uses_empty_object() {
    let dir = TempDir::new().unwrap();
    let template = write(&dir, "hello.html", "<p>Hello {name}!</p>");

    lsdom_cmd()
        .arg("render")
        .arg(&template)
        .assert()
        .success()
        .stdout(predicate::str::contains("<p>Hello !</p>"));
}

#[test]
fn test_render_with_config_anchors() {
    let dir = TempDir::new().unwrap();
    let template = write(&dir, "list.html", r#"<ul><li for="n in nums">{n}</li></ul>"#);
    let data = write(&dir, "data.json", r#"{"nums": [1, 2]}"#);
    let config = write(&dir, "lsdom.toml", "[anchors]\nstart = \"list\"\nend = \"/list\"\n");

    lsdom_cmd()
        .arg("render")
        .arg(&template)
        .arg("--data")
        .arg(&data)
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "<ul><!--list--><li>1</li><li>2</li><!--/list--></ul>",
        ));
}

#[test]
fn test_render_invalid_json_data() {
    let dir = TempDir::new().unwrap();
    let template = write(&dir, "app.html", "<p>{a}</p>");
    let data = write(&dir, "data.json", "{not json");

    lsdom_cmd()
        .arg("render")
        .arg(&template)
        .arg("--data")
        .arg(&data)
        .assert()
        .failure()
        .stderr(predicate::str::contains("LSD-042"))
        .stderr(predicate::str::contains("Fix:"));
}

#[test]
fn test_render_malformed_for() {
    let dir = TempDir::new().unwrap();
    let template = write(&dir, "bad.html", r#"<ul><li for="todos">x</li></ul>"#);

    lsdom_cmd()
        .arg("render")
        .arg(&template)
        .assert()
        .failure()
        .stderr(predicate::str::contains("LSD-020"))
        .stderr(predicate::str::contains("item in list.path"));
}

// ═══════════════════════════════════════════════════════════════
// run
// ═══════════════════════════════════════════════════════════════

#[test]
fn test_run_script_replays_steps() {
    let dir = TempDir::new().unwrap();
    let template = write(&dir, "app.html", TODO_APP);
    let data = write(&dir, "data.json", r#"{"draft": "", "todos": []}"#);
    let script = write(
        &dir,
        "script.json",
        r#"[
            {"op": "input", "id": "new", "value": "eggs"},
            {"op": "click", "id": "add"},
            {"op": "push", "path": "todos", "value": {"text": "jam"}},
            {"op": "remove", "path": "todos", "index": 0}
        ]"#,
    );

    lsdom_cmd()
        .arg("run")
        .arg(&template)
        .arg("--data")
        .arg(&data)
        .arg("--script")
        .arg(&script)
        .assert()
        .success()
        .stdout(predicate::str::contains("<li>eggs</li><!--end-->"))
        .stdout(predicate::str::contains("<li>eggs</li><li>jam</li>"))
        .stdout(predicate::str::contains("<!--for--><li>jam</li><!--end-->"))
        .stdout(predicate::str::contains("<footer>1 items</footer>"))
        .stdout(predicate::str::contains("click #add"));
}

#[test]
fn test_run_unknown_element_fails() {
    let dir = TempDir::new().unwrap();
    let template = write(&dir, "app.html", "<p>{a}</p>");
    let script = write(&dir, "script.json", r#"[{"op": "click", "id": "missing"}]"#);

    lsdom_cmd()
        .arg("run")
        .arg(&template)
        .arg("--script")
        .arg(&script)
        .assert()
        .failure()
        .stderr(predicate::str::contains("no element with id 'missing'"));
}

#[test]
fn test_run_rejects_unknown_op() {
    let dir = TempDir::new().unwrap();
    let template = write(&dir, "app.html", "<p>{a}</p>");
    let script = write(&dir, "script.json", r#"[{"op": "explode"}]"#);

    lsdom_cmd()
        .arg("run")
        .arg(&template)
        .arg("--script")
        .arg(&script)
        .assert()
        .failure()
        .stderr(predicate::str::contains("parsing script"));
}

// ═══════════════════════════════════════════════════════════════
// check
// ═══════════════════════════════════════════════════════════════

#[test]
fn test_check_lists_directives_and_keys() {
    let dir = TempDir::new().unwrap();
    let template = write(&dir, "app.html", TODO_APP);

    lsdom_cmd()
        .arg("check")
        .arg(&template)
        .assert()
        .success()
        .stdout(predicate::str::contains("is valid"))
        .stdout(predicate::str::contains("model=\"draft\" -> draft"))
        .stdout(predicate::str::contains("for=\"todo in todos\" -> todos"))
        .stdout(predicate::str::contains("-> todos.0.text"))
        .stdout(predicate::str::contains("-> todos.length"));
}

#[test]
fn test_check_reports_expression_error() {
    let dir = TempDir::new().unwrap();
    let template = write(&dir, "bad.html", "<p>{a + }</p>");

    lsdom_cmd()
        .arg("check")
        .arg(&template)
        .assert()
        .failure()
        .stderr(predicate::str::contains("LSD-010"))
        .stderr(predicate::str::contains("Fix:"));
}

#[test]
fn test_check_reports_unclosed_markup() {
    let dir = TempDir::new().unwrap();
    let template = write(&dir, "bad.html", "<div><p>text</div>");

    lsdom_cmd()
        .arg("check")
        .arg(&template)
        .assert()
        .failure()
        .stderr(predicate::str::contains("LSD-030"));
}
