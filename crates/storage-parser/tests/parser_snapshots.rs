//! Snapshot tests for the storage parser
//!
//! These tests parse storage-format fixture files and snapshot an outline of
//! the resulting tree to detect unintended changes in parser behavior.

use std::fs;
use std::path::PathBuf;

use storage_parser::{Node, parse, parse_lenient};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn read_fixture(name: &str) -> String {
    let path = fixtures_dir().join(format!("{}.xml", name));
    fs::read_to_string(&path).expect("Failed to read fixture file")
}

/// One line per node, children indented, blank text skipped
fn outline(nodes: &[Node]) -> String {
    let mut out = String::new();
    write_outline(nodes, 0, &mut out);
    out
}

fn write_outline(nodes: &[Node], depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    for node in nodes {
        match node {
            Node::Element(e) => {
                out.push_str(&indent);
                out.push_str(&e.name);
                for (key, value) in &e.attrs {
                    out.push_str(&format!(" {key}=\"{value}\""));
                }
                out.push('\n');
                write_outline(&e.children, depth + 1, out);
            }
            Node::Text { value } if value.trim().is_empty() => {}
            Node::Text { value } => {
                out.push_str(&format!("{indent}\"{}\"\n", show(value)));
            }
            Node::CData { value } => {
                out.push_str(&format!("{indent}cdata \"{}\"\n", show(value)));
            }
        }
    }
}

fn show(text: &str) -> String {
    text.replace('\n', "\\n").replace('\u{a0}', "\\u{a0}")
}

fn parse_fixture(name: &str) -> String {
    let source = read_fixture(name);
    let nodes = parse(&source).expect("Failed to parse fixture");
    outline(&nodes)
}

#[test]
fn basic() {
    insta::assert_snapshot!(parse_fixture("basic"), @r#"
    h1
      "Release notes"
    p
      "Plain "
      strong
        "bold"
      " and "
      em
        "italic"
      "."
    ul
      li
        "one"
      li
        "two"
        br
        "lines"
    "#);
}

#[test]
fn macros() {
    insta::assert_snapshot!(parse_fixture("macros"), @r#"
    ac:structured-macro ac:name="code" ac:schema-version="1"
      ac:parameter ac:name="language"
        "python"
      ac:plain-text-body
        cdata "print("<hi>")"
    ac:structured-macro ac:name="warning"
      ac:rich-text-body
        p
          "Careful"
    "#);
}

#[test]
fn attachments() {
    insta::assert_snapshot!(parse_fixture("attachments"), @r#"
    p
      ac:image ac:alt="Diagram"
        ri:attachment ri:filename="diagram-20240131-153000.png"
    "#);
}

#[test]
fn tasks() {
    insta::assert_snapshot!(parse_fixture("tasks"), @r#"
    ac:task-list
      ac:task
        ac:task-id
          "1"
        ac:task-status
          "complete"
        ac:task-body
          "Ship it"
    "#);
}

#[test]
fn entities() {
    insta::assert_snapshot!(parse_fixture("entities"), @r#"
    p
      "“Quoted” — 5\u{a0}<\u{a0}6 & ✓ &bogus;"
    "#);
}

#[test]
fn malformed() {
    let source = read_fixture("malformed");
    let nodes = parse_lenient(&source);
    insta::assert_snapshot!(outline(&nodes), @r#"
    p
      "Open "
      em
        "never closed\n"
        li
          "stray"
    "#);
}

#[test]
fn json_tree() {
    let nodes = parse(r#"<p a="1">x<![CDATA[y]]></p>"#).unwrap();
    pretty_assertions::assert_eq!(
        serde_json::to_string(&nodes).unwrap(),
        r#"[{"type":"element","name":"p","attrs":[["a","1"]],"children":[{"type":"text","value":"x"},{"type":"cdata","value":"y"}]}]"#
    );
}
