use std::collections::{HashMap, HashSet};
use tessera_core::{config::TestGroup, state::{self, TestResult}};
use crate::model::{column::Column, naming::NameConfig};

///
/// Folds a stream of Columns into the dense serialized Grid.
///
/// The grid is mutable only here, and only for a single group's run. Row lookup
/// is kept out-of-band in a name -> index map, and the placeholder cell-content
/// counter is scoped to one assembler so identical input produces identical
/// bytes.
///
pub struct GridAssembler {
    grid: state::Grid,
    naming: NameConfig,
    headers: Vec<String>,
    row_index: HashMap<String, usize>,
    cell_count: u64,
}

impl GridAssembler {
    pub fn new(group: &TestGroup) -> Self {
        GridAssembler {
            grid: state::Grid::default(),
            naming: NameConfig::new(group.test_name_config.as_ref()),
            headers: group.column_headers.clone(),
            row_index: HashMap::new(),
            cell_count: 0,
        }
    }

    ///
    /// Append one build's column: record the header line, expand every target's
    /// entries into rows (de-duplicating display names within this column), then
    /// pad the rows this build said nothing about.
    ///
    pub fn append(&mut self, column: &Column) {
        let record = self.column_record(column);
        self.grid.columns.push(record);
        let column_count = self.grid.columns.len();

        // Any row not mentioned by this column gets a NO_RESULT pad at the end.
        let mut missing: HashSet<String> = self.row_index.keys().cloned().collect();
        let mut used: HashSet<String> = HashSet::new();

        for (target, entries) in &column.rows {
            for entry in entries {
                let prefix = self.naming.format(&entry.metadata, &column.metadata);

                // Suffix duplicates within this column. The first occurrence keeps
                // the bare name; the same name in a different build shares the row.
                let mut name = prefix.clone();
                let mut suffix = 0;
                while used.contains(&name) {
                    suffix += 1;
                    name = format!("{} [{}]", prefix, suffix);
                }

                used.insert(name.clone());
                missing.remove(&name);

                let idx = self.row_for(&name, target, column_count);
                let row = &mut self.grid.rows[idx];

                append_result(row, entry.result, 1);

                if entry.result != TestResult::NoResult {
                    self.cell_count += 1;
                    row.cell_ids.push(format!("{}", self.cell_count));
                    row.messages.push(format!("message {}", self.cell_count));
                    row.icons.push(format!("icon {}", self.cell_count));

                    let cell = (row.cell_ids.len() - 1) as i32;
                    for (metric, value) in &entry.metrics {
                        append_metric(metric_for(row, metric), cell, *value);
                    }
                }
            }
        }

        for name in missing {
            let idx = self.row_index[&name];
            append_result(&mut self.grid.rows[idx], TestResult::NoResult, 1);
        }
    }

    ///
    /// Consume the assembler, leaving rows in natural name order.
    ///
    pub fn finish(mut self) -> state::Grid {
        self.grid.rows.sort_by(|a, b| natord::compare(&a.name, &b.name));
        self.grid
    }

    pub fn column_count(&self) -> usize {
        self.grid.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.grid.rows.len()
    }

    fn column_record(&self, column: &Column) -> state::Column {
        let mut record = state::Column {
            build: column.id.clone(),
            started: column.started as f64 * 1000.0, // Epoch millis.
            extra: Vec::with_capacity(self.headers.len()),
        };

        for header in &self.headers {
            record.extra.push(self.header_value(column, header));
        }

        record
    }

    ///
    /// Unfinished builds have no metadata yet, so every header is blank. The
    /// Commit header is recorded by jobs as repo-commit and only the short
    /// 9-character form is surfaced.
    ///
    fn header_value(&self, column: &Column, header: &str) -> String {
        if column.finished == 0 {
            return String::new()
        }

        let (key, truncate) = match header {
            "Commit" => ("repo-commit", Some(9)),
            other => (other, None),
        };

        match column.metadata.get(key) {
            Some(value) => {
                let mut value = value.clone();
                if let Some(len) = truncate {
                    value.truncate(len);
                }
                value
            },
            None => {
                log::warn!("Build {} has no {} metadata for column header {}", column.id, key, header);
                "missing".into()
            },
        }
    }

    ///
    /// Find the row with this display name, creating and back-filling it when
    /// the name is new to the grid.
    ///
    fn row_for(&mut self, name: &str, target: &str, column_count: usize) -> usize {
        if let Some(idx) = self.row_index.get(name) {
            return *idx
        }

        let mut row = state::Row {
            name: name.to_string(),
            id: target.to_string(),
            ..state::Row::default()
        };

        // The new row missed every earlier column.
        if column_count > 1 {
            append_result(&mut row, TestResult::NoResult, (column_count - 1) as i32);
        }

        self.grid.rows.push(row);
        let idx = self.grid.rows.len() - 1;
        self.row_index.insert(name.to_string(), idx);
        idx
    }
}

///
/// Extend the row's run-length encoding: either grow the tail run or start a
/// new one, so adjacent runs never share a result code.
///
fn append_result(row: &mut state::Row, result: TestResult, count: i32) {
    let code = result as i32;
    let len = row.results.len();

    if len >= 2 && row.results[len - 2] == code {
        row.results[len - 1] += count;
    } else {
        row.results.push(code);
        row.results.push(count);
    }
}

///
/// Record a metric value for the cell at the given dense index, extending the
/// tail (start, length) run when the cell follows straight on from it.
///
fn append_metric(metric: &mut state::Metric, cell: i32, value: f64) {
    let len = metric.indices.len();

    if len >= 2 && metric.indices[len - 2] + metric.indices[len - 1] == cell {
        metric.indices[len - 1] += 1;
    } else {
        metric.indices.push(cell);
        metric.indices.push(1);
    }

    metric.values.push(value);
}

fn metric_for<'a>(row: &'a mut state::Row, name: &str) -> &'a mut state::Metric {
    if let Some(idx) = row.metrics.iter().position(|metric| metric.name == name) {
        return &mut row.metrics[idx]
    }

    row.metrics.push(state::Metric { name: name.to_string(), ..state::Metric::default() });
    row.metrics.last_mut().expect("metric just added")
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;
    use crate::model::column::{ELAPSED_KEY, OVERALL, RowEntry};

    const PASS: i32 = TestResult::Pass as i32;
    const FAIL: i32 = TestResult::Fail as i32;
    const NONE: i32 = TestResult::NoResult as i32;

    fn group(headers: &[&str]) -> TestGroup {
        TestGroup {
            name: "ci-demo".into(),
            gcs_prefix: "k8s-results/logs/ci-demo".into(),
            column_headers: headers.iter().map(|h| h.to_string()).collect(),
            test_name_config: None,
        }
    }

    fn column(id: &str, results: &[(&str, TestResult)]) -> Column {
        let mut col = Column { id: id.into(), started: 1000, finished: 1060, passed: true, ..Column::default() };
        col.add_overall(2000);

        for (name, result) in results {
            col.append(name, RowEntry::new(*result, name));
        }

        col
    }

    fn row<'a>(grid: &'a state::Grid, name: &str) -> &'a state::Row {
        grid.rows.iter().find(|row| row.name == name).unwrap_or_else(|| panic!("no row named {}", name))
    }

    ///
    /// Every row covers every column, the RLE is canonical, and the parallel
    /// lists agree with the number of cells that hold an actual result.
    ///
    fn assert_invariants(grid: &state::Grid) {
        let columns = grid.columns.len() as i32;
        let mut names = HashSet::new();

        for row in &grid.rows {
            assert!(names.insert(row.name.clone()), "duplicate row name {}", row.name);
            assert_eq!(0, row.results.len() % 2, "row {} has a dangling RLE pair", row.name);

            let mut cells = 0;
            let mut covered = 0;
            for pair in row.results.chunks(2) {
                covered += pair[1];
                if pair[0] != NONE {
                    cells += pair[1];
                }
            }

            assert_eq!(columns, covered, "row {} does not cover every column", row.name);
            assert_eq!(cells as usize, row.cell_ids.len(), "row {} cell_ids out of step", row.name);
            assert_eq!(row.cell_ids.len(), row.messages.len());
            assert_eq!(row.cell_ids.len(), row.icons.len());

            for pair in row.results.windows(4).step_by(2) {
                assert_ne!(pair[0], pair[2], "row {} has adjacent runs with the same code", row.name);
            }

            for metric in &row.metrics {
                let total: i32 = metric.indices.chunks(2).map(|pair| pair[1]).sum();
                assert_eq!(total as usize, metric.values.len(), "metric {} lengths disagree", metric.name);
            }
        }
    }

    #[test]
    fn test_single_passing_build() {
        let mut assembler = GridAssembler::new(&group(&[]));
        assembler.append(&column("1", &[]));
        let grid = assembler.finish();

        assert_eq!(1, grid.columns.len());
        assert_eq!("1", grid.columns[0].build);
        assert_eq!(1_000_000.0, grid.columns[0].started);

        let overall = row(&grid, OVERALL);
        assert_eq!(vec!(PASS, 1), overall.results);
        assert_eq!(ELAPSED_KEY, overall.metrics[0].name);
        assert_eq!(vec!(0, 1), overall.metrics[0].indices);
        assert_eq!(vec!(60.0), overall.metrics[0].values);

        assert_invariants(&grid);
    }

    #[test]
    fn test_rows_align_across_builds() {
        let mut assembler = GridAssembler::new(&group(&[]));

        // Most recent build first: b2 has a and b, the older b1 has a and c.
        assembler.append(&column("b2", &[("a", TestResult::Pass), ("b", TestResult::Fail)]));
        assembler.append(&column("b1", &[("a", TestResult::Pass), ("c", TestResult::Pass)]));
        let grid = assembler.finish();

        assert_eq!(vec!("b2", "b1"), grid.columns.iter().map(|c| c.build.as_str()).collect::<Vec<_>>());

        assert_eq!(vec!(PASS, 2), row(&grid, "a").results);
        assert_eq!(vec!(FAIL, 1, NONE, 1), row(&grid, "b").results);
        assert_eq!(vec!(NONE, 1, PASS, 1), row(&grid, "c").results);
        assert_eq!(vec!(PASS, 2), row(&grid, OVERALL).results);

        // Rows end up in natural name order.
        let names: Vec<&str> = grid.rows.iter().map(|row| row.name.as_str()).collect();
        assert_eq!(vec!(OVERALL, "a", "b", "c"), names);

        assert_invariants(&grid);
    }

    #[test]
    fn test_duplicate_names_within_one_build_are_suffixed() {
        let mut col = column("1", &[]);
        col.append("s.t", RowEntry::new(TestResult::Pass, "s.t"));
        col.append("s.t", RowEntry::new(TestResult::Fail, "s.t"));
        col.append("s.t", RowEntry::new(TestResult::Pass, "s.t"));

        let mut assembler = GridAssembler::new(&group(&[]));
        assembler.append(&col);
        let grid = assembler.finish();

        assert_eq!(vec!(PASS, 1), row(&grid, "s.t").results);
        assert_eq!(vec!(FAIL, 1), row(&grid, "s.t [1]").results);
        assert_eq!(vec!(PASS, 1), row(&grid, "s.t [2]").results);

        // All three share the target id they were parsed from.
        assert!(grid.rows.iter().filter(|row| row.id == "s.t").count() == 3);

        assert_invariants(&grid);
    }

    #[test]
    fn test_same_name_in_different_builds_shares_a_row() {
        let mut assembler = GridAssembler::new(&group(&[]));
        assembler.append(&column("2", &[("a", TestResult::Pass)]));
        assembler.append(&column("1", &[("a", TestResult::Fail)]));
        let grid = assembler.finish();

        assert_eq!(vec!(PASS, 1, FAIL, 1), row(&grid, "a").results);
        assert_invariants(&grid);
    }

    #[test]
    fn test_commit_header_is_rewritten_and_truncated() {
        let mut col = column("1", &[]);
        col.metadata.insert("repo-commit".into(), "0123456789abcdef".into());

        let mut assembler = GridAssembler::new(&group(&["Commit"]));
        assembler.append(&col);
        let grid = assembler.finish();

        assert_eq!(vec!("012345678".to_string()), grid.columns[0].extra);
    }

    #[test]
    fn test_unfinished_columns_have_blank_headers() {
        let mut col = Column { id: "1".into(), started: 1000, ..Column::default() };
        col.metadata.insert("repo-commit".into(), "0123456789abcdef".into());
        col.add_overall(2000);

        let mut assembler = GridAssembler::new(&group(&["Commit", "Infra-Commit"]));
        assembler.append(&col);
        let grid = assembler.finish();

        assert_eq!(vec!(String::new(), String::new()), grid.columns[0].extra);
    }

    #[test]
    fn test_absent_headers_read_missing() {
        let mut assembler = GridAssembler::new(&group(&["Infra-Commit"]));
        assembler.append(&column("1", &[]));
        let grid = assembler.finish();

        assert_eq!(vec!("missing".to_string()), grid.columns[0].extra);
    }

    #[test]
    fn test_metric_runs_extend_over_consecutive_cells() {
        let mut assembler = GridAssembler::new(&group(&[]));
        assembler.append(&column("3", &[]));
        assembler.append(&column("2", &[]));
        assembler.append(&column("1", &[]));
        let grid = assembler.finish();

        // Overall passed in every build, so one elapsed metric run covers all
        // three cells.
        let overall = row(&grid, OVERALL);
        assert_eq!(vec!(PASS, 3), overall.results);
        assert_eq!(vec!(0, 3), overall.metrics[0].indices);
        assert_eq!(vec!(60.0, 60.0, 60.0), overall.metrics[0].values);

        assert_invariants(&grid);
    }

    #[test]
    fn test_assembly_is_deterministic() {
        let build = || {
            let mut col = column("7", &[("a", TestResult::Pass)]);
            col.append("s.t", RowEntry::new(TestResult::Pass, "s.t"));
            col.append("s.t", RowEntry::new(TestResult::Fail, "s.t"));
            col
        };

        let mut first = GridAssembler::new(&group(&[]));
        first.append(&build());
        let mut second = GridAssembler::new(&group(&[]));
        second.append(&build());

        assert_eq!(first.finish().encode_to_vec(), second.finish().encode_to_vec());
    }
}
