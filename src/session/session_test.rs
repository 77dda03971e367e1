use std::io;

use super::{InteractiveSession, PromptKind, should_echo};
use crate::{
    config::Prompts,
    console::ScriptedConsole,
    engine::{
        ScriptEngine, SecurityDomain,
        mini::{Builtin, EngineOptions, MiniEngine, Value},
    },
    report::MemoryReporter,
};

struct Run {
    transcript: String,
    printed: String,
    reports: Vec<String>,
    failures: usize,
    history: Vec<String>,
}

fn run_session(lines: &[&str], prompts: Option<Prompts>) -> Run {
    let mut console = ScriptedConsole::new(lines.iter().copied());
    run_with_console(&mut console, prompts)
}

fn run_with_console(console: &mut ScriptedConsole, prompts: Option<Prompts>) -> Run {
    let (engine, printed) = MiniEngine::captured(EngineOptions::default());
    let mut scope = engine.new_scope();
    let reporter = MemoryReporter::new();
    let mut sink = reporter.clone();
    let outcome =
        InteractiveSession::new(prompts).run(&engine, &mut scope, console, &mut sink);
    Run {
        transcript: console.transcript().to_string(),
        printed: printed.borrow().clone(),
        reports: reporter.reports(),
        failures: outcome.failures,
        history: outcome.history,
    }
}

#[test]
fn echo_rules_follow_the_result_and_source() {
    assert!(!should_echo(&Value::Undefined, "x = undefined"));
    assert!(should_echo(&Value::Number(2.0), "1 + 1"));
    assert!(should_echo(&Value::Null, "null"));

    let print = Value::Builtin(Builtin::Print);
    assert!(!should_echo(&print, "  function print() {}"));
    assert!(should_echo(&print, "print"));
}

#[test]
fn transcript_with_prompts() {
    let run = run_session(
        &[
            "1+1",
            "var x = 1",
            "function foo() {",
            "  return x",
            "}",
            "foo()",
        ],
        Some(Prompts::default()),
    );
    insta::assert_snapshot!(run.transcript, @r"
    js> 1+1
    2
    js> var x = 1
    js> function foo() {
      >   return x
      > }
    js> foo()
    1
    js>
    ");
    assert_eq!(run.failures, 0);
    assert!(run.reports.is_empty());
}

#[test]
fn history_holds_successful_units_verbatim() {
    let run = run_session(&["var a = 2", "a * ", "3", "nope()", "a"], None);
    assert_eq!(run.history, vec!["var a = 2\n", "a * \n3\n", "a\n"]);
    assert_eq!(run.failures, 1);
    assert_eq!(run.reports, vec!["<stdin>:4:1: nope is not defined"]);
}

#[test]
fn no_prompts_when_disabled() {
    let run = run_session(&["print('hi')", "7"], None);
    assert_eq!(run.transcript, "print('hi')\n7\n7\n\n");
    assert_eq!(run.printed, "hi\n");
}

#[test]
fn blank_lines_compile_to_nothing() {
    let run = run_session(&["", "   ", "// only a comment"], None);
    assert!(run.history.is_empty());
    assert_eq!(run.failures, 0);
}

#[test]
fn errors_point_at_the_physical_line() {
    let run = run_session(
        &["var a = 1", "function g() {", "  return missing", "}", "g()"],
        None,
    );
    assert_eq!(run.reports, vec!["<stdin>:3:10: missing is not defined"]);
    assert_eq!(run.history.len(), 2);
}

#[test]
fn partial_input_at_end_is_still_compiled() {
    let run = run_session(&["print(1,"], None);
    assert_eq!(run.failures, 1);
    assert_eq!(run.reports.len(), 1);
    assert!(run.reports[0].starts_with("<stdin>:"));
    assert!(run.transcript.ends_with("\n\n"));
}

#[test]
fn rejections_are_printed_after_the_unit() {
    let run = run_session(&["reject('nope'); 5"], None);
    assert_eq!(
        run.transcript,
        "reject('nope'); 5\n5\nUnhandled rejected promise: nope\n\n"
    );
    assert_eq!(run.failures, 1);
    assert_eq!(run.history.len(), 1);
}

#[test]
fn read_errors_end_accumulation_but_not_the_session() {
    let mut console = ScriptedConsole::new(["1 +"]);
    console.push_error(io::ErrorKind::InvalidData, "bad bytes");
    console.push_line("40 + 2");
    let run = run_with_console(&mut console, None);
    assert!(run.transcript.contains("bad bytes\n"));
    assert!(run.transcript.contains("42\n"));
    assert_eq!(run.failures, 1);
}

#[test]
fn interrupted_read_stops_silently() {
    let mut console = ScriptedConsole::new(["1"]);
    console.push_error(io::ErrorKind::Interrupted, "interrupted");
    let run = run_with_console(&mut console, None);
    assert_eq!(run.transcript, "1\n1\n");
}

#[test]
fn prompt_kind_tracks_the_buffer() {
    let session = InteractiveSession::new(None);
    assert_eq!(session.prompt_kind(), PromptKind::Primary);
    assert!(session.history().is_empty());
}

#[test]
fn session_domain_reaches_compiled_units() {
    let (engine, _) = MiniEngine::captured(EngineOptions::default());
    let mut scope = engine.new_scope();
    let reporter = MemoryReporter::new();
    let mut console = ScriptedConsole::new(["defer(function () {})"]);
    let outcome = InteractiveSession::new(None)
        .with_domain(Some(SecurityDomain::sandbox()))
        .run(&engine, &mut scope, &mut console, &mut reporter.clone());
    assert_eq!(outcome.failures, 1);
    assert!(reporter.reports()[0].contains("not permitted in the sandbox"));
}
