use std::collections::BTreeMap;
use tessera_core::state::TestResult;

/// The reserved metric name for elapsed wall-clock seconds.
pub const ELAPSED_KEY: &str = "seconds-elapsed";

/// The synthetic target summarising a build's own status.
pub const OVERALL: &str = "Overall";

/// The metadata key every row entry carries for its display name.
pub const TESTS_NAME_KEY: &str = "Tests name";

/// A build with no finished marker after this long has timed out.
const TIMEOUT_SECS: i64 = 24 * 60 * 60;

///
/// One build's contribution to the grid, after parsing.
///
#[derive(Clone, Debug, Default)]
pub struct Column {
    /// Last path segment of the build prefix.
    pub id: String,

    /// Epoch seconds.
    pub started: i64,

    /// Epoch seconds. Zero while the build is still running.
    pub finished: i64,

    pub passed: bool,

    /// String-valued finished metadata.
    pub metadata: BTreeMap<String, String>,

    /// One target may emit several results within a single build, so each key
    /// holds a list in encounter order.
    pub rows: BTreeMap<String, Vec<RowEntry>>,
}

#[derive(Clone, Debug)]
pub struct RowEntry {
    pub result: TestResult,
    pub metrics: BTreeMap<String, f64>,
    pub metadata: BTreeMap<String, String>,
}

impl RowEntry {
    pub fn new(result: TestResult, name: &str) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert(TESTS_NAME_KEY.to_string(), name.to_string());

        RowEntry { result, metrics: BTreeMap::new(), metadata }
    }
}

impl Column {
    ///
    /// Summarise the build's own status: pass/fail once finished, a timeout
    /// failure if it has been running for over a day, otherwise still running.
    ///
    pub fn overall(&self, now: i64) -> TestResult {
        if self.finished > 0 {
            match self.passed {
                true => TestResult::Pass,
                false => TestResult::Fail,
            }
        } else if self.started < now - TIMEOUT_SECS {
            TestResult::Fail // Timed out.
        } else {
            TestResult::Running
        }
    }

    ///
    /// Append the synthetic Overall row entry. Every column carries exactly one,
    /// and finished builds record their elapsed seconds on it.
    ///
    pub fn add_overall(&mut self, now: i64) {
        let mut entry = RowEntry::new(self.overall(now), OVERALL);

        if self.finished > 0 {
            entry.metrics.insert(ELAPSED_KEY.to_string(), (self.finished - self.started) as f64);
        }

        self.rows.entry(OVERALL.to_string()).or_default().push(entry);
    }

    pub fn append(&mut self, target: &str, entry: RowEntry) {
        self.rows.entry(target.to_string()).or_default().push(entry);
    }

    ///
    /// Total row entries across all targets, used for per-build logging.
    ///
    pub fn entry_count(&self) -> usize {
        self.rows.values().map(Vec::len).sum()
    }
}
