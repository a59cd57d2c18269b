//
// Copyright (c) 2024 Hemi Labs, Inc.
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

use similar_asserts::assert_eq;
use std::io::Write;
use std::process::{Command, Output, Stdio};

const FIXTURES: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");
const CONFIG: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/man.test.conf");

/// Runs man over the fixture tree with the test configuration.
fn run_man(args: &[&str], stdin_data: &str) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_man"))
        .args(["-c", "-P", "-C", CONFIG])
        .args(args)
        .env("MANPATH", FIXTURES)
        .env_remove("MANSECT")
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn man");

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(stdin_data.as_bytes())
            .expect("failed to write stdin");
    }
    child.wait_with_output().expect("failed to wait for man")
}

fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

// -------------------------------------------------------------------------
// formatting
// -------------------------------------------------------------------------
#[test]
fn formats_page_from_stdin() {
    let page = ".TH HELLO 1 2024-05-01 posixutils \"User Commands\"\n\
                .SH NAME\n\
                hello \\- print a greeting\n";
    let output = run_man(&["-"], page);
    assert!(output.status.success());

    let header = format!("HELLO(1){:>29}{:>20}(1)", "User Commands", "HELLO");
    let footer = format!("posixutils{:>25}{:>22}(1)", "2024-05-01", "HELLO");
    assert_eq!(
        stdout_of(&output),
        format!("{header}\n\nNAME\n     hello - print a greeting\n\n\n\n{footer}\n")
    );
}

#[test]
fn formats_page_found_on_manpath() {
    let output = run_man(&["hello"], "");
    assert!(output.status.success(), "{}", stderr_of(&output));

    let text = stdout_of(&output);
    let lines: Vec<&str> = text.lines().collect();
    assert!(lines[0].starts_with("HELLO(1)"));
    assert!(lines[0].ends_with("HELLO(1)"));
    for line in &lines {
        assert!(line.len() <= 60, "line too long: {line:?}");
    }
    for expected in [
        "NAME",
        "     hello - print a greeting",
        "SYNOPSIS",
        "     hello [-n name]",
        "OPTIONS",
        "     -n name",
        "          Greet name instead of the world.",
        "SEE ALSO",
        "     echo(1)",
    ] {
        assert!(lines.contains(&expected), "missing {expected:?} in\n{text}");
    }
    assert!(text.contains("exercise the formatter."));
    assert!(lines[lines.len() - 1].starts_with("posixutils"));
}

#[test]
fn section_operand_restricts_search() {
    let output = run_man(&["1", "hello"], "");
    assert!(output.status.success());
    assert!(stdout_of(&output).starts_with("HELLO(1)"));
}

#[test]
fn preformatted_page_passes_through() {
    let output = run_man(&["pre"], "");
    assert!(output.status.success());
    let expected = std::fs::read_to_string(format!("{FIXTURES}/cat1/pre.1")).unwrap();
    assert_eq!(stdout_of(&output), expected);
}

#[test]
fn direct_path_is_opened() {
    let path = format!("{FIXTURES}/cat1/pre.1");
    let output = run_man(&[&path], "");
    assert!(output.status.success());
    let expected = std::fs::read_to_string(&path).unwrap();
    assert_eq!(stdout_of(&output), expected);
}

#[test]
fn include_renders_target_page() {
    let alias = run_man(&["alias"], "");
    let shared = run_man(&["7", "shared"], "");
    assert!(alias.status.success(), "{}", stderr_of(&alias));
    assert!(shared.status.success());
    assert_eq!(stdout_of(&alias), stdout_of(&shared));
    assert!(stdout_of(&alias).contains("     shared - a page included by other pages\n"));
}

#[test]
fn missing_include_fails() {
    let output = run_man(&["broken"], "");
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(
        stderr_of(&output),
        format!("man: cannot open .so file {FIXTURES}/man7/missing.7\n")
    );
}

#[test]
fn unknown_requests_reported_unless_quiet() {
    let page = ".br\nword\n.XY\nmore\n";

    let verbose = run_man(&["-"], page);
    assert_eq!(
        stdout_of(&verbose),
        "word\n**** Unknown formatter command: .XY\n\nmore\n\n\n\n"
    );

    let quiet = run_man(&["-q", "-"], page);
    assert_eq!(stdout_of(&quiet), "word more\n\n\n\n");
}

#[test]
fn paginates_with_lines_option() {
    let output = run_man(&["-l", "20", "-"], ".TH P 1\n.nf\na\nb\n");
    let text = stdout_of(&output);
    let lines: Vec<&str> = text.split('\n').collect();
    assert_eq!(&lines[..3], &["", "", ""][..]);
    assert!(lines[3].starts_with("P(1)"));
    assert_eq!(lines[6], "     a");
    assert_eq!(lines[7], "     b");
}

// -------------------------------------------------------------------------
// -w
// -------------------------------------------------------------------------
#[test]
fn lists_all_matching_paths() {
    let output = run_man(&["-w", "hello"], "");
    assert!(output.status.success());
    assert_eq!(
        stdout_of(&output),
        format!("{FIXTURES}/man1/hello.1\n{FIXTURES}/cat1/hello.1\n")
    );
}

// -------------------------------------------------------------------------
// errors
// -------------------------------------------------------------------------
#[test]
fn missing_page() {
    let output = run_man(&["nosuch"], "");
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(stderr_of(&output), "man: no manual entry for nosuch\n");
    assert!(output.stdout.is_empty());
}

#[test]
fn missing_page_in_section() {
    let output = run_man(&["4", "hello"], "");
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(
        stderr_of(&output),
        "man: no entry for hello in section 4 of the manual\n"
    );
}

#[test]
fn missing_config_file() {
    let output = Command::new(env!("CARGO_BIN_EXE_man"))
        .args(["-C", "/nonexistent/man.test.conf", "ls"])
        .output()
        .expect("Failed to run man -C");

    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("configuration file was not found"));
}

#[test]
fn name_is_required() {
    let output = Command::new(env!("CARGO_BIN_EXE_man"))
        .output()
        .expect("Failed to run man");
    assert!(!output.status.success());
}
