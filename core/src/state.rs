///
/// The serialized form of a test group's grid: columns are builds (most recent
/// first), rows are test names. This is the wire schema the dashboard reads, so
/// field tags must never be renumbered.
///

///
/// The outcome recorded for a single cell of the grid.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum TestResult {
    NoResult = 0,
    Pass = 1,
    PassWithSkips = 2,
    Running = 3,
    Fail = 4,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Grid {
    #[prost(message, repeated, tag = "1")]
    pub columns: Vec<Column>,

    #[prost(message, repeated, tag = "2")]
    pub rows: Vec<Row>,
}

///
/// One build's header line: its id, start time and any extra metadata values
/// the group's column_headers surfaced.
///
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Column {
    #[prost(string, tag = "1")]
    pub build: String,

    /// Epoch milliseconds.
    #[prost(double, tag = "2")]
    pub started: f64,

    /// Aligned with the group's column_headers.
    #[prost(string, repeated, tag = "3")]
    pub extra: Vec<String>,
}

///
/// A single test's results across every column.
///
/// results is a flattened run-length encoding - (result code, count) pairs
/// covering every column position exactly once. cell_ids, messages and icons
/// are parallel lists with one entry per cell that holds an actual result.
///
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Row {
    /// Display name, unique within the grid.
    #[prost(string, tag = "1")]
    pub name: String,

    /// The target the parser emitted, before any de-duplication suffix.
    #[prost(string, tag = "2")]
    pub id: String,

    #[prost(int32, repeated, tag = "3")]
    pub results: Vec<i32>,

    #[prost(string, repeated, tag = "4")]
    pub cell_ids: Vec<String>,

    #[prost(string, repeated, tag = "5")]
    pub messages: Vec<String>,

    #[prost(string, repeated, tag = "6")]
    pub icons: Vec<String>,

    #[prost(message, repeated, tag = "7")]
    pub metrics: Vec<Metric>,
}

///
/// A named measurement over a row's cells. indices is a flattened
/// (start cell index, run length) encoding and values holds one float per
/// covered cell, so the run lengths must always sum to values.len().
///
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Metric {
    #[prost(string, tag = "1")]
    pub name: String,

    #[prost(int32, repeated, tag = "2")]
    pub indices: Vec<i32>,

    #[prost(double, repeated, tag = "3")]
    pub values: Vec<f64>,
}
