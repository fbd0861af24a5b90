use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

///
/// The started.json marker a job writes as soon as its build begins.
///
#[derive(Debug, Deserialize)]
pub struct Started {
    /// Epoch seconds.
    pub timestamp: i64,

    #[serde(default, rename = "repo-version")]
    pub repo_version: Option<String>,

    #[serde(default)]
    pub node: Option<String>,

    #[serde(default)]
    pub pull: Option<String>,

    #[serde(default)]
    pub repos: HashMap<String, String>,
}

///
/// The finished.json marker written once the build completes. Absence of this
/// marker is what makes a build "running".
///
#[derive(Debug, Deserialize)]
pub struct Finished {
    /// Epoch seconds.
    pub timestamp: i64,

    #[serde(default)]
    pub passed: bool,

    #[serde(default, rename = "job-version")]
    pub job_version: Option<String>,

    #[serde(default)]
    pub metadata: BTreeMap<String, MetaValue>,
}

///
/// Finished metadata values are heterogeneous: strings, nested maps, or
/// whatever else the job chose to write.
///
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MetaValue {
    String(String),
    Map(BTreeMap<String, MetaValue>),
    Other(serde_json::Value),
}

impl MetaValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetaValue::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, MetaValue>> {
        match self {
            MetaValue::Map(map) => Some(map),
            _ => None,
        }
    }
}

impl Finished {
    ///
    /// The flat string-valued projection of the metadata. Nested maps and other
    /// value types are dropped.
    ///
    pub fn string_metadata(&self) -> BTreeMap<String, String> {
        self.metadata.iter()
            .filter_map(|(key, value)| value.as_str().map(|v| (key.clone(), v.to_string())))
            .collect()
    }
}
