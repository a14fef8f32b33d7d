// Test harness types: TestSuiteResult, TestSuiteDesc, TestRunSummary.
// Suites are defined with define_test_suite! and registered explicitly by
// the tests crate.

/// Maximum number of test suites that can be registered.
pub const MAX_SUITES: usize = 16;

/// Result of executing a single test suite.
#[derive(Clone, Copy)]
pub struct TestSuiteResult {
    pub name: &'static str,
    pub total: u32,
    pub passed: u32,
    pub failed: u32,
}

impl Default for TestSuiteResult {
    fn default() -> Self {
        Self {
            name: "",
            total: 0,
            passed: 0,
            failed: 0,
        }
    }
}

impl TestSuiteResult {
    /// Check if all tests in this suite passed.
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

pub type SuiteRunnerFn = fn(&mut TestSuiteResult) -> i32;

#[derive(Clone, Copy)]
pub struct TestSuiteDesc {
    pub name: &'static str,
    pub run: Option<SuiteRunnerFn>,
}

/// Aggregated results from running all test suites.
#[derive(Clone, Copy)]
pub struct TestRunSummary {
    pub suites: [TestSuiteResult; MAX_SUITES],
    pub suite_count: usize,
    pub total_tests: u32,
    pub passed: u32,
    pub failed: u32,
}

impl Default for TestRunSummary {
    fn default() -> Self {
        Self {
            suites: [TestSuiteResult::default(); MAX_SUITES],
            suite_count: 0,
            total_tests: 0,
            passed: 0,
            failed: 0,
        }
    }
}

impl TestRunSummary {
    /// Add results from a single suite to the summary.
    pub fn add_suite_result(&mut self, result: &TestSuiteResult) {
        if self.suite_count < MAX_SUITES {
            self.suites[self.suite_count] = *result;
            self.suite_count += 1;
        }
        self.total_tests = self.total_tests.saturating_add(result.total);
        self.passed = self.passed.saturating_add(result.passed);
        self.failed = self.failed.saturating_add(result.failed);
    }

    /// Check if all tests across all suites passed.
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}
