#![no_std]

//! Suite registry for the heap test harness. Suites are defined next to the
//! code they exercise (in `tagheap-mm`); this crate collects their
//! descriptors and drives them in a fixed order — the exhaustion suite runs
//! last because it permanently consumes the segment.

use spin::Once;

use tagheap_lib::testing::{
    MAX_SUITES, TestConfig, TestRunSummary, TestSuiteDesc, TestSuiteResult,
};
use tagheap_lib::{log_info, register_test_suites};

pub use tagheap_lib::testing::{Verbosity, config_from_args};

pub const TESTS_MAX_SUITES: usize = MAX_SUITES;

static mut REGISTRY: [Option<&'static TestSuiteDesc>; TESTS_MAX_SUITES] = [None; TESTS_MAX_SUITES];
static mut REGISTRY_COUNT: usize = 0;
static REGISTER_ONCE: Once<()> = Once::new();

fn registry_mut() -> *mut [Option<&'static TestSuiteDesc>; TESTS_MAX_SUITES] {
    &raw mut REGISTRY
}

fn registry_count_mut() -> *mut usize {
    &raw mut REGISTRY_COUNT
}

pub fn tests_register_suite(desc: &'static TestSuiteDesc) -> i32 {
    if desc.run.is_none() {
        return -1;
    }
    unsafe {
        if *registry_count_mut() >= TESTS_MAX_SUITES {
            return -1;
        }
        (*registry_mut())[*registry_count_mut()] = Some(desc);
        *registry_count_mut() += 1;
    }
    0
}

/// Register every suite the workspace defines. Idempotent.
pub fn tests_register_system_suites() {
    REGISTER_ONCE.call_once(register_all);
}

fn register_all() {
    register_test_suites!(
        tests_register_suite,
        tagheap_mm::tests::BLOCK_SUITE_DESC,
        tagheap_mm::tests::FREE_LIST_SUITE_DESC,
        tagheap_mm::tests::LAYOUT_SUITE_DESC,
        tagheap_mm::tests::HEAP_EXT_SUITE_DESC,
        tagheap_mm::tests::POLICY_SUITE_DESC,
        tagheap_mm::tests::GROWTH_SUITE_DESC,
        tagheap_mm::tests::WALKER_SUITE_DESC,
        tagheap_mm::tests_oom::OOM_SUITE_DESC,
    );
}

/// Run every registered suite in registration order, filling `summary`.
/// Returns 0 when everything passed.
pub fn tests_run_all(config: &TestConfig, summary: &mut TestRunSummary) -> i32 {
    *summary = TestRunSummary::default();
    if !config.enabled {
        log_info!("TESTS: harness disabled");
        return 0;
    }

    let mut rc = 0;
    let count = unsafe { *registry_count_mut() };
    for i in 0..count {
        let desc = match unsafe { (*registry_mut())[i] } {
            Some(desc) => desc,
            None => continue,
        };
        let run = match desc.run {
            Some(run) => run,
            None => continue,
        };

        let mut result = TestSuiteResult {
            name: desc.name,
            ..TestSuiteResult::default()
        };
        if run(&mut result) != 0 {
            rc = -1;
        }
        log_info!(
            "TESTS: suite {:<10} {}/{} passed",
            result.name,
            result.passed,
            result.total
        );
        summary.add_suite_result(&result);
    }

    if summary.all_passed() {
        log_info!("TESTS: all {} tests passed", summary.total_tests);
    } else {
        log_info!(
            "TESTS: {} of {} tests FAILED",
            summary.failed,
            summary.total_tests
        );
    }
    rc
}
