//! End-to-end tests of `argus run`.

use std::process::{Command, Output};

use serde_json::{Value, json};

fn fixture(name: &str) -> String {
    format!("{}/tests/fixtures/{name}", env!("CARGO_MANIFEST_DIR"))
}

fn argus(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_argus"))
        .env("NO_COLOR", "1")
        .args(args)
        .output()
        .expect("could not start argus")
}

/// Runs argus with JSON output and returns the exit status and the events.
fn events(args: &[&str]) -> (bool, Vec<Value>) {
    let mut all = vec!["run", "--format", "json"];
    all.extend_from_slice(args);
    let output = argus(&all);
    let events = String::from_utf8(output.stdout)
        .expect("stdout is not utf-8")
        .lines()
        .map(|line| serde_json::from_str(line).unwrap_or_else(|err| panic!("bad event {line:?}: {err}")))
        .collect();
    (output.status.success(), events)
}

#[test]
fn breakpoints_report_watches() {
    let file = fixture("add.js");
    let (ok, events) = events(&[&file, "--break", "3", "--watch", "sum"]);
    assert!(ok);

    let hits: Vec<_> = events.iter().filter(|e| e["event"] == "breakpoint").collect();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0]["location"]["function"], "add");
    assert_eq!(hits[0]["location"]["line"], 3);
    assert_eq!(
        hits[0]["watches"],
        json!([{ "expression": "sum", "status": "returned", "value": "3" }])
    );
    assert_eq!(hits[1]["watches"][0]["value"], "42");

    assert_eq!(events[1], json!({ "event": "output", "text": "3" }));
    assert_eq!(
        events.last(),
        Some(&json!({ "event": "completion", "outcome": { "status": "returned", "value": "42" } }))
    );
}

#[test]
fn session_files_add_to_the_command_line() {
    let file = fixture("add.js");
    let session = fixture("session.json");
    let (ok, events) = events(&[&file, "--session", &session, "--watch", "b"]);
    assert!(ok);

    let first = events
        .iter()
        .find(|e| e["event"] == "breakpoint")
        .expect("no breakpoint hit");
    let watched: Vec<_> = first["watches"]
        .as_array()
        .unwrap()
        .iter()
        .map(|w| (w["expression"].as_str().unwrap(), w["value"].as_str().unwrap()))
        .collect();
    assert_eq!(watched, [("b", "2"), ("a", "1"), ("sum", "3")]);
}

#[test]
fn debugger_statements_list_the_stack() {
    let file = fixture("nested.js");
    let (ok, events) = events(&[&file, "--watch", "x"]);
    assert!(ok);

    let stop = &events[0];
    assert_eq!(stop["event"], "debuggerStatement");
    let frames: Vec<_> = stop["frames"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| (f["kind"].as_str().unwrap(), f["function"].as_str(), f["line"].as_u64().unwrap()))
        .collect();
    assert_eq!(
        frames,
        [
            ("call", Some("inner"), 2),
            ("call", Some("outer"), 6),
            ("global", None, 8)
        ]
    );
    assert_eq!(stop["watches"][0]["value"], "5");
}

#[test]
fn exceptions_are_reported_on_request() {
    let file = fixture("fail.js");
    let (ok, events) = events(&[&file, "--report-exceptions"]);
    assert!(!ok);

    let exception = &events[0];
    assert_eq!(exception["event"], "exception");
    assert_eq!(exception["value"], "broken");
    assert_eq!(exception["location"]["function"], "fail");
    assert_eq!(exception["location"]["line"], 2);
    assert_eq!(
        events.last().unwrap()["outcome"],
        json!({ "status": "threw", "value": "Uncaught broken" })
    );

    let (_, quiet) = self::events(&[&file]);
    assert!(quiet.iter().all(|e| e["event"] != "exception"));
}

#[test]
fn text_output_is_readable() {
    let file = fixture("add.js");
    let output = argus(&["run", &file, "-b", "3", "-w", "sum"]);
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let expected = format!("breakpoint at {file}:3\n    sum = 3\n3\nbreakpoint at {file}:3\n    sum = 42\n42\n");
    assert_eq!(stdout, expected);
}

#[test]
fn missing_files_fail_cleanly() {
    let output = argus(&["run", &fixture("missing.js")]);
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("could not read"), "{stderr}");
}
