//! Integration tests for the confmd binary

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn confmd(args: &[&str], cwd: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_confmd"))
        .args(args)
        .current_dir(cwd)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to run confmd")
}

/// Copy the fixtures into a fresh directory so sidecars and outputs stay local
fn workspace() -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    for entry in fs::read_dir(fixtures_dir()).expect("Failed to read fixtures") {
        let path = entry.expect("Failed to read entry").path();
        fs::copy(&path, dir.path().join(path.file_name().unwrap())).expect("Failed to copy");
    }
    dir
}

#[test]
fn test_pull_file() {
    let dir = workspace();
    let output = confmd(&["pull", "design.xhtml"], dir.path());
    assert!(output.status.success(), "{output:?}");
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "design.md");

    let markdown = fs::read_to_string(dir.path().join("design.md")).unwrap();
    insta::assert_snapshot!(markdown, @r#"
    ---
    title: "Design"
    page_id: "42"
    ---

    # Overview

    This page has **bold** text.

    > [!NOTE] Heads up
    > Read this first.

    ![Diagram](_attachments/diagram-20240131-153000.png)
    "#);

    // The timestamp match is a guess and gets reported
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!stderr.contains("ERROR"), "{stderr}");
}

#[test]
fn test_pull_flags() {
    let dir = workspace();
    let output = confmd(
        &[
            "pull",
            "design.xhtml",
            "-o",
            "out/page.md",
            "--no-frontmatter",
            "--title-heading",
            "--attachments-dir",
            "assets",
        ],
        dir.path(),
    );
    assert!(output.status.success(), "{output:?}");

    let markdown = fs::read_to_string(dir.path().join("out/page.md")).unwrap();
    assert!(markdown.starts_with("# Design\n\n# Overview\n"));
    assert!(markdown.contains("![Diagram](assets/diagram-20240131-153000.png)"));
}

#[test]
fn test_push_file() {
    let dir = workspace();
    let output = confmd(&["push", "notes.md", "-q"], dir.path());
    assert!(output.status.success(), "{output:?}");
    assert!(output.stdout.is_empty());

    let storage = fs::read_to_string(dir.path().join("notes.xhtml")).unwrap();
    insta::assert_snapshot!(storage, @r#"<h1>Notes</h1><ac:task-list><ac:task><ac:task-id>1</ac:task-id><ac:task-status>incomplete</ac:task-status><ac:task-body>write docs</ac:task-body></ac:task><ac:task><ac:task-id>2</ac:task-id><ac:task-status>complete</ac:task-status><ac:task-body>ship it</ac:task-body></ac:task></ac:task-list><p><ac:image ac:alt="chart"><ri:attachment ri:filename="chart.png" /></ac:image></p>"#);

    let uploads = fs::read_to_string(dir.path().join("notes.uploads.json")).unwrap();
    let uploads: Vec<String> = serde_json::from_str(&uploads).unwrap();
    assert_eq!(uploads, vec!["_attachments/chart.png".to_string()]);
}

#[test]
fn test_config_file() {
    let dir = workspace();
    fs::write(
        dir.path().join("_confmd.toml"),
        "[markdown]\nfrontmatter = false\n\n[storage]\ntask_ids = false\n",
    )
    .unwrap();

    let output = confmd(&["pull", "design.xhtml"], dir.path());
    assert!(output.status.success(), "{output:?}");
    let markdown = fs::read_to_string(dir.path().join("design.md")).unwrap();
    assert!(markdown.starts_with("# Overview\n"));

    let output = confmd(&["push", "notes.md"], dir.path());
    assert!(output.status.success(), "{output:?}");
    let storage = fs::read_to_string(dir.path().join("notes.xhtml")).unwrap();
    assert!(!storage.contains("ac:task-id"));
}

#[test]
fn test_round_trip() {
    let dir = workspace();
    assert!(confmd(&["pull", "design.xhtml"], dir.path()).status.success());
    assert!(confmd(&["push", "design.md", "-o", "back.xhtml"], dir.path()).status.success());

    let storage = fs::read_to_string(dir.path().join("back.xhtml")).unwrap();
    insta::assert_snapshot!(storage, @r#"<h1>Overview</h1><p>This page has <strong>bold</strong> text.</p><ac:structured-macro ac:name="info"><ac:rich-text-body><p>Heads up</p><p>Read this first.</p></ac:rich-text-body></ac:structured-macro><p><ac:image ac:alt="Diagram"><ri:attachment ri:filename="diagram-20240131-153000.png" /></ac:image></p>"#);
}

#[test]
fn test_directory_conversion() {
    let dir = workspace();
    let output = confmd(&["pull", ".", "-o", "docs", "-q"], dir.path());
    assert!(output.status.success(), "{output:?}");

    let mut files: Vec<_> = fs::read_dir(dir.path().join("docs"))
        .expect("Failed to read output dir")
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect();
    files.sort();

    insta::assert_yaml_snapshot!(files, @r"
    - design.md
    ");
}

#[test]
fn test_directory_failure_is_counted() {
    let dir = workspace();
    fs::write(dir.path().join("broken.page.json"), "{ not json").unwrap();
    fs::write(dir.path().join("broken.xhtml"), "<p>x</p>").unwrap();

    let output = confmd(&["pull", ".", "-o", "docs"], dir.path());
    assert!(!output.status.success());
    assert!(dir.path().join("docs/design.md").exists());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Converted 1 files, 1 failed"), "{stderr}");
}

#[test]
fn test_dump() {
    let dir = workspace();
    let output = confmd(&["dump", "notes.md"], dir.path());
    assert!(output.status.success(), "{output:?}");

    let model: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let types: Vec<&str> = model
        .as_array()
        .unwrap()
        .iter()
        .map(|block| block["type"].as_str().unwrap())
        .collect();
    assert_eq!(types, vec!["heading", "taskList", "image"]);
}

#[test]
fn test_missing_input() {
    let dir = workspace();
    let output = confmd(&["pull", "missing.xhtml"], dir.path());
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("does not exist"));
}

#[test]
fn test_init_config() {
    let dir = tempfile::tempdir().unwrap();
    let output = confmd(&["init", "-q"], dir.path());
    assert!(output.status.success(), "{output:?}");

    let content = fs::read_to_string(dir.path().join("_confmd.toml")).unwrap();
    insta::assert_snapshot!(content, @r#"
    #:schema https://raw.githubusercontent.com/confmd/confmd/main/crates/confmd-cli/schema/confmd.schema.json

    [markdown]
    frontmatter = true
    title_heading = false
    language_hints = true

    [attachments]
    dir = "_attachments"
    fallback = "first"

    [storage]
    task_ids = true
    "#);

    // Refuses to overwrite without --force
    assert!(!confmd(&["init"], dir.path()).status.success());
    assert!(confmd(&["init", "--force", "-q"], dir.path()).status.success());
}

#[test]
fn test_init_schema() {
    let dir = tempfile::tempdir().unwrap();
    let output = confmd(&["init", "--schema"], dir.path());
    assert!(output.status.success(), "{output:?}");

    let schema: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(schema["title"], "Config");
    assert!(schema["properties"]["attachments"].is_object());
}
