mod common;

use common::{
    combined_output, fixture_path, run_scriptshell, stderr, stdout, temp_dir, write_file,
};

fn script(name: &str) -> String {
    fixture_path("scripts")
        .join(name)
        .to_string_lossy()
        .into_owned()
}

#[test]
fn runs_a_script_file() {
    let output = run_scriptshell(&[&script("hello.js")], "");
    assert!(output.status.success(), "{}", combined_output(&output));
    assert_eq!(stdout(&output), "hello from fixture\n");
}

#[test]
fn unreadable_file_in_a_batch_exits_4() {
    let missing = script("does_not_exist.js");
    let output = run_scriptshell(
        &["-f", &script("plain.js"), "-f", &missing, "-f", &script("hello.js")],
        "",
    );
    assert_eq!(output.status.code(), Some(4));
    assert_eq!(stdout(&output), "1\nhello from fixture\n");
    assert!(stderr(&output).contains("does_not_exist.js"));
}

#[test]
fn script_error_exits_3_with_location() {
    let output = run_scriptshell(&[&script("error.js")], "");
    assert_eq!(output.status.code(), Some(3));
    assert!(
        stderr(&output).contains("error.js:2:1: missing is not defined"),
        "{}",
        combined_output(&output)
    );
}

#[test]
fn deeply_nested_file_is_reported_not_fatal() {
    let dir = temp_dir("cli_nested");
    let nested = write_file(
        &dir,
        "nested.js",
        &format!("{}1{}\n", "(".repeat(100_000), ")".repeat(100_000)),
    );
    let output = run_scriptshell(&["-f", nested.to_str().unwrap(), "-f", &script("plain.js")], "");
    assert_eq!(output.status.code(), Some(3), "{}", combined_output(&output));
    assert_eq!(stdout(&output), "1\n");
    assert!(stderr(&output).contains("nested.js:1:"));
}

#[test]
fn inline_scripts_skip_the_interactive_shell() {
    let output = run_scriptshell(&["-e", "print(6 * 7)", "-e", "print('again')"], "1+1\n");
    assert!(output.status.success(), "{}", combined_output(&output));
    assert_eq!(stdout(&output), "42\nagain\n");
}

#[test]
fn inline_script_error_exits_3() {
    let output = run_scriptshell(&["-e", "throw 'inline'"], "");
    assert_eq!(output.status.code(), Some(3));
    assert!(stderr(&output).contains("uncaught exception: inline"));
}

#[test]
fn inline_runs_before_files() {
    let output = run_scriptshell(&["-e", "print('inline')", &script("plain.js")], "");
    assert_eq!(stdout(&output), "inline\n1\n");
}

#[test]
fn shebang_script_runs() {
    let output = run_scriptshell(&[&script("shebang.js")], "");
    assert!(output.status.success());
    assert_eq!(stdout(&output), "1\n");
}

#[test]
fn interactive_shell_on_stdin() {
    let output = run_scriptshell(&[], "1+1\nvar x\nfunction foo() {}\n");
    assert!(output.status.success(), "{}", combined_output(&output));
    assert_eq!(
        stdout(&output),
        format!(
            "mini/{}\njs> 2\njs> js> js> \n",
            env!("CARGO_PKG_VERSION")
        )
    );
}

#[test]
fn interactive_error_sets_exit_3() {
    let output = run_scriptshell(&[], "nope\n'ok'\n");
    assert_eq!(output.status.code(), Some(3));
    assert!(stdout(&output).contains("ok\n"));
    assert!(stderr(&output).contains("<stdin>:1:1: nope is not defined"));
}

#[test]
fn dash_reads_stdin_without_prompts() {
    let output = run_scriptshell(&["-f", "-"], "print('piped')\n");
    assert!(output.status.success());
    assert_eq!(stdout(&output), "piped\n\n");
}

#[test]
fn trailing_arguments_become_the_arguments_global() {
    let output = run_scriptshell(&[&script("args.js"), "one", "--two"], "");
    assert_eq!(stdout(&output), "2 one --two\n");
}

#[test]
fn sandbox_refuses_deferred_work() {
    let output = run_scriptshell(&["--sandbox", &script("defer.js")], "");
    assert_eq!(output.status.code(), Some(3));
    assert!(stderr(&output).contains("not permitted in the sandbox"));
    assert_eq!(stdout(&output), "");
}

#[test]
fn unhandled_rejection_exits_3() {
    let output = run_scriptshell(&[&script("reject.js")], "");
    assert_eq!(output.status.code(), Some(3));
    assert_eq!(
        stdout(&output),
        "after reject\nUnhandled rejected promise: nope\n"
    );
}

#[test]
fn deferred_tasks_run_after_files() {
    let output = run_scriptshell(&[&script("defer.js")], "");
    assert!(output.status.success());
    assert_eq!(stdout(&output), "immediate\ndeferred\n");
}

#[test]
fn negative_opt_level_means_interpreted() {
    let compiled = run_scriptshell(&[&script("strings.js")], "");
    let interpreted = run_scriptshell(&["--opt", "-1", &script("strings.js")], "");
    assert!(interpreted.status.success(), "{}", combined_output(&interpreted));
    assert_eq!(stdout(&compiled), stdout(&interpreted));
}

#[test]
fn usage_errors_exit_1() {
    let output = run_scriptshell(&["--cache-capacity", "lots"], "");
    assert_eq!(output.status.code(), Some(1));

    let output = run_scriptshell(&["--language-version", "123", "-e", "1"], "");
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("unsupported language version 123"));

    let output = run_scriptshell(&["--encoding", "latin-9", "-e", "1"], "");
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn old_language_levels_reject_let() {
    let output = run_scriptshell(&["--language-version", "150", "-e", "let x = 1"], "");
    assert_eq!(output.status.code(), Some(3));
    let output = run_scriptshell(&["--language-version", "180", "-e", "let x = 1"], "");
    assert!(output.status.success());
}

#[test]
fn config_file_sets_prompts() {
    let dir = temp_dir("cli_config");
    let config = write_file(
        &dir,
        "shell.json",
        r#"{ "prompts": { "primary": "? ", "continuation": "… " } }"#,
    );
    let output = run_scriptshell(&["--config", config.to_str().unwrap()], "(1 +\n2)\n");
    let out = stdout(&output);
    assert!(out.contains("? … 3\n? \n"), "{}", out);
}

#[test]
fn verbose_logs_cache_statistics() {
    let output = run_scriptshell(&["--verbose", &script("plain.js")], "");
    assert!(output.status.success());
    let err = stderr(&output);
    assert!(err.contains("cache: stored"), "{}", err);
    assert!(err.contains("CacheStats(hits=0, misses=1"), "{}", err);
}

#[test]
fn compile_subcommand_round_trips() {
    let dir = temp_dir("cli_compile");
    let out = dir.join("fib.shc");
    let output = run_scriptshell(
        &["compile", &script("fib.js"), "-o", out.to_str().unwrap()],
        "",
    );
    assert!(output.status.success(), "{}", combined_output(&output));

    let output = run_scriptshell(&[out.to_str().unwrap()], "");
    assert!(output.status.success(), "{}", combined_output(&output));
    assert_eq!(stdout(&output), "fib(15) = 610\n");
}

#[test]
fn compiled_library_is_rejected_when_run() {
    let dir = temp_dir("cli_library");
    let out = dir.join("library.shc");
    let output = run_scriptshell(
        &[
            "compile",
            &script("library.js"),
            "-o",
            out.to_str().unwrap(),
            "--library",
        ],
        "",
    );
    assert!(output.status.success(), "{}", combined_output(&output));

    let output = run_scriptshell(&[out.to_str().unwrap()], "");
    assert_eq!(output.status.code(), Some(3));
    assert!(stderr(&output).contains("must implement Script (found library)"));
}

#[test]
fn compile_reports_syntax_errors() {
    let dir = temp_dir("cli_compile_error");
    let source = write_file(&dir, "broken.js", "print(1 +* 2)\n");
    let output = run_scriptshell(&["compile", source.to_str().unwrap()], "");
    assert_eq!(output.status.code(), Some(3));
    assert!(stderr(&output).contains("syntax error"));
    assert!(!dir.join("broken.shc").exists());
}
