//! CLI tests for the `installer` binary.
//!
//! Spawns the binary inside a temporary workspace and checks exit codes,
//! stdout, and the resulting store.

use std::io::Write;
use std::process::{Command, Output, Stdio};

use installer::exit_codes;
use installer::io::platform::Platform;
use installer::test_support::TestWorkspace;

const INSTALL_TURN: &str = r#"<!-- SECTSTART -->Adding two categories and a post.<!-- SECTEND -->
<!-- SCHEMAS -->
```json
[{"title": "Categories", "fields": []},
 {"title": "Posts", "fields": [{"key": "category", "type": "relation", "relatedSchema": "categories"}]}]
```
<!-- RECORDS -->
```json
[{"type": "posts", "title": "Hello", "metadata": {"category": "news"}},
 {"type": "categories", "title": "News"}]
```
"#;

fn installer(workspace: &TestWorkspace, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_installer"))
        .current_dir(workspace.path())
        .args(args)
        .stdin(Stdio::null())
        .output()
        .expect("run installer")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn plan_prints_ordered_steps() {
    let workspace = TestWorkspace::new().expect("workspace");
    workspace.write("turn.md", INSTALL_TURN).expect("write");

    let output = installer(&workspace, &["plan", "turn.md"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let lines: Vec<String> = stdout(&output).lines().map(str::to_string).collect();
    assert_eq!(
        lines,
        vec![
            "1. schema Categories (categories, 0 fields)",
            "2. schema Posts (posts, 1 fields)",
            "3. record News [categories]",
            "4. record Hello [posts]",
        ]
    );
}

#[tokio::test]
async fn install_yes_writes_store_and_links_references() {
    let workspace = TestWorkspace::new().expect("workspace");
    workspace.write("turn.md", INSTALL_TURN).expect("write");

    let output = installer(&workspace, &["install", "turn.md", "--yes"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK), "{}", stdout(&output));
    let out = stdout(&output);
    assert!(out.contains("created record News (rec_000001)"));
    assert!(out.contains(
        "schemas: 2 created, 0 skipped, 0 failed; records: 2 created, 0 skipped, 0 failed"
    ));

    let store = workspace.store().expect("store");
    assert_eq!(store.list_schemas().await.expect("schemas").len(), 2);
    let records = store.records().expect("records");
    let hello = records.iter().find(|r| r.title == "Hello").expect("hello");
    assert_eq!(
        hello.field("category").map(|f| f.value.clone()),
        Some(serde_json::json!({"id": "rec_000001"}))
    );

    // Second run: everything already exists.
    let output = installer(&workspace, &["install", "turn.md", "--yes"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert!(stdout(&output).contains(
        "schemas: 0 created, 2 skipped, 0 failed; records: 0 created, 2 skipped, 0 failed"
    ));
}

#[test]
fn install_without_confirmation_is_cancelled() {
    let workspace = TestWorkspace::new().expect("workspace");
    workspace.write("turn.md", INSTALL_TURN).expect("write");

    let mut child = Command::new(env!("CARGO_BIN_EXE_installer"))
        .current_dir(workspace.path())
        .args(["install", "turn.md"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("spawn");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(b"n\n")
        .expect("answer");
    let output = child.wait_with_output().expect("wait");

    assert_eq!(output.status.code(), Some(exit_codes::CANCELLED));
    assert!(!workspace.path().join(".installer/store.json").exists());
}

#[test]
fn prose_transcript_has_nothing_to_install() {
    let workspace = TestWorkspace::new().expect("workspace");
    workspace
        .write("turn.md", "Happy to help! What would you like to build?")
        .expect("write");

    let output = installer(&workspace, &["install", "turn.md", "--yes"]);
    assert_eq!(output.status.code(), Some(exit_codes::NOTHING_TO_DO));
}

#[test]
fn classify_prints_surfaced_text_and_kind() {
    let workspace = TestWorkspace::new().expect("workspace");
    workspace.write("turn.md", INSTALL_TURN).expect("write");

    let output = installer(&workspace, &["classify", "turn.md", "--chunk-size", "3"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(
        stdout(&output),
        "Adding two categories and a post.\nkind: structured_installation\n"
    );

    let output = installer(
        &workspace,
        &["classify", "turn.md", "--mode", "ask", "--chunk-size", "3"],
    );
    assert!(stdout(&output).ends_with("kind: conversational\n"));
}

#[test]
fn act_reports_failures_with_exit_code() {
    let workspace = TestWorkspace::new().expect("workspace");
    workspace
        .write(
            "act.md",
            "Removing it.\n<!-- ACTION -->\n```json\n[{\"action\": \"delete\", \"slug\": \"missing\"}, {\"action\": \"list_schemas\"}]\n```\n",
        )
        .expect("write");

    let output = installer(&workspace, &["act", "act.md"]);
    assert_eq!(output.status.code(), Some(exit_codes::FAILURES));
    let out = stdout(&output);
    assert!(out.contains("failed to delete record missing"));
    assert!(out.contains("0 schemas"));
}

#[test]
fn files_writes_blocks_and_refuses_escapes() {
    let workspace = TestWorkspace::new().expect("workspace");
    workspace
        .write(
            "files.md",
            "```html\n// site/index.html\n<h1>Hi</h1>\n```\n",
        )
        .expect("write");
    let output = installer(&workspace, &["files", "files.md", "--out", "out"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(
        std::fs::read_to_string(workspace.path().join("out/site/index.html")).expect("read"),
        "<h1>Hi</h1>\n"
    );

    workspace
        .write("evil.md", "```sh\n// ../evil.sh\nrm -rf /\n```\n")
        .expect("write");
    let output = installer(&workspace, &["files", "evil.md", "--out", "out"]);
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(!workspace.path().join("evil.sh").exists());
}

#[test]
fn invalid_config_is_rejected() {
    let workspace = TestWorkspace::new().expect("workspace");
    workspace
        .write(
            ".installer/config.toml",
            "[classifier]\nbuffer_threshold_chars = 0\n",
        )
        .expect("write");
    workspace.write("turn.md", "hi").expect("write");
    let output = installer(&workspace, &["classify", "turn.md"]);
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
}
