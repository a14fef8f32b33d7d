//! Host-side test runner: registers a stdout log backend, initializes the
//! heap, drives every registered suite, then exercises the fatal paths that
//! cannot run inside the harness (they panic by contract).

use std::panic;
use std::process::ExitCode;

use tagheap_lib::testing::{TestRunSummary, Verbosity, config_from_args};
use tagheap_lib::tlog::{LogLevel, tlog_register_backend, tlog_set_level};
use tagheap_lib::{log_error, log_info};
use tagheap_mm::{init_tag_heap, tfree, tmalloc};
use tagheap_tests::{tests_register_system_suites, tests_run_all};

fn stdout_backend(args: core::fmt::Arguments<'_>) {
    println!("{}", args);
}

/// Freeing the same block twice must take the process down. Run under
/// `catch_unwind` so the runner can report the outcome.
fn double_free_aborts() -> bool {
    let p = tmalloc(32);
    if p.is_null() {
        log_error!("FATAL-PATH: setup allocation failed");
        return false;
    }
    tfree(p);

    // The second free panics by contract; silence the hook for the duration
    // so the expected abort does not pollute the report.
    let prev_hook = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let outcome = panic::catch_unwind(panic::AssertUnwindSafe(|| tfree(p)));
    panic::set_hook(prev_hook);

    outcome.is_err()
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = config_from_args(args.iter().map(|s| s.as_str()));

    tlog_register_backend(stdout_backend);
    tlog_set_level(match config.verbosity {
        Verbosity::Quiet => LogLevel::Warn,
        Verbosity::Summary => LogLevel::Info,
        Verbosity::Verbose => LogLevel::Debug,
    });

    if !init_tag_heap() {
        log_error!("runner: heap initialization failed");
        return ExitCode::FAILURE;
    }

    tests_register_system_suites();
    let mut summary = TestRunSummary::default();
    let rc = tests_run_all(&config, &mut summary);

    let fatal_ok = double_free_aborts();
    if fatal_ok {
        log_info!("FATAL-PATH: double free aborts as required");
    } else {
        log_error!("FATAL-PATH: double free did NOT abort");
    }

    if rc == 0 && fatal_ok {
        log_info!("RESULT: PASS");
        ExitCode::SUCCESS
    } else {
        log_error!("RESULT: FAIL");
        ExitCode::FAILURE
    }
}
