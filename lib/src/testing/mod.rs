pub mod config;
pub mod harness;

mod assertions;
pub use config::{TestConfig, Verbosity, config_from_args};
pub use harness::{MAX_SUITES, SuiteRunnerFn, TestRunSummary, TestSuiteDesc, TestSuiteResult};

use crate::log_debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TestResult {
    Pass,
    Fail,
    Skipped,
}

impl TestResult {
    #[inline]
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass | Self::Skipped)
    }

    #[inline]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Fail)
    }
}

/// Run one test function, logging its name and outcome at debug level.
///
/// The harness has no exception recovery: a panicking test takes the run
/// down with a diagnostic, which is the desired behavior for an allocator
/// whose fatal paths are themselves panics.
pub fn run_single_test(name: &str, test_fn: impl FnOnce() -> TestResult) -> TestResult {
    log_debug!("TEST RUN: {}", name);
    let result = test_fn();
    match result {
        TestResult::Pass => log_debug!("TEST PASS: {}", name),
        TestResult::Skipped => log_debug!("TEST SKIP: {}", name),
        TestResult::Fail => crate::log_info!("TEST FAIL: {}", name),
    }
    result
}

#[macro_export]
macro_rules! pass {
    () => {
        $crate::testing::TestResult::Pass
    };
}

#[macro_export]
macro_rules! skip {
    () => {
        $crate::testing::TestResult::Skipped
    };
}

#[macro_export]
macro_rules! fail {
    () => {
        $crate::testing::TestResult::Fail
    };
    ($msg:expr) => {{
        $crate::log_info!("TEST FAIL: {}", $msg);
        $crate::testing::TestResult::Fail
    }};
    ($fmt:expr, $($arg:tt)*) => {{
        $crate::log_info!(concat!("TEST FAIL: ", $fmt), $($arg)*);
        $crate::testing::TestResult::Fail
    }};
}

#[macro_export]
macro_rules! run_test {
    ($passed:expr, $total:expr, $test_fn:expr) => {{
        $total += 1;
        let result = $crate::testing::run_single_test(stringify!($test_fn), || $test_fn());
        if result.is_pass() {
            $passed += 1;
        }
        result
    }};

    ($test_fn:expr) => {{ $crate::testing::run_single_test(stringify!($test_fn), || $test_fn()) }};
}

/// Define a suite runner plus its static descriptor from a list of test
/// functions. The descriptor is registered explicitly by the tests crate —
/// see `register_test_suites!`.
#[macro_export]
macro_rules! define_test_suite {
    ($suite_name:ident, [$($test_fn:path),* $(,)?]) => {
        $crate::paste::paste! {
            fn [<run_ $suite_name _suite>](
                out: &mut $crate::testing::TestSuiteResult,
            ) -> i32 {
                let mut passed = 0u32;
                let mut total = 0u32;

                $(
                    $crate::run_test!(passed, total, $test_fn);
                )*

                out.name = stringify!($suite_name);
                out.total = total;
                out.passed = passed;
                out.failed = total.saturating_sub(passed);

                if passed == total { 0 } else { -1 }
            }

            pub static [<$suite_name:upper _SUITE_DESC>]: $crate::testing::TestSuiteDesc =
                $crate::testing::TestSuiteDesc {
                    name: stringify!($suite_name),
                    run: Some([<run_ $suite_name _suite>]),
                };
        }
    };
}

/// Register a list of suite descriptors through a registration function.
#[macro_export]
macro_rules! register_test_suites {
    ($register:path, $($desc:path),* $(,)?) => {{
        $(
            let _ = $register(&$desc);
        )*
    }};
}
