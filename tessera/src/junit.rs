use regex::Regex;
use serde::Deserialize;
use lazy_static::lazy_static;
use quick_xml::events::Event;
use std::collections::BTreeMap;
use tessera_core::state::TestResult;
use crate::{error::UpdateError, model::column::{Column, ELAPSED_KEY, RowEntry}};

lazy_static! {
    // Capture groups: optional context, timestamp and thread, e.g.
    // artifacts/junit_runner_20211201-0537_02.xml
    static ref JUNIT_REGEX: Regex = Regex::new(r".+/junit(_[^_]+)?(_\d+-\d+)?(_\d+)?\.xml$").expect("bad regex for JUNIT_REGEX");
}

///
/// Metadata gleaned from a junit artifact's object name, or None when the
/// object is not a junit file at all.
///
pub fn artifact_metadata(object: &str) -> Option<BTreeMap<String, String>> {
    let captures = JUNIT_REGEX.captures(object)?;

    let mut metadata = BTreeMap::new();
    for (idx, key) in [(1, "Context"), (2, "Timestamp"), (3, "Thread")] {
        if let Some(capture) = captures.get(idx) {
            metadata.insert(key.to_string(), capture.as_str().trim_start_matches('_').to_string());
        }
    }

    Some(metadata)
}

#[derive(Debug, Default, Deserialize)]
pub struct TestSuites {
    #[serde(rename = "testsuite", default)]
    pub suites: Vec<TestSuite>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TestSuite {
    #[serde(rename = "@name", default)]
    pub name: String,

    #[serde(rename = "testcase", default)]
    pub cases: Vec<TestCase>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TestCase {
    #[serde(rename = "@name", default)]
    pub name: String,

    /// Seconds.
    #[serde(rename = "@time", default)]
    pub time: f64,

    pub failure: Option<Failure>,
    pub skipped: Option<Skipped>,

    #[serde(rename = "system-out")]
    pub system_out: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Failure {
    #[serde(rename = "@message", default)]
    pub message: String,

    #[serde(rename = "$text", default)]
    pub text: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct Skipped {
    #[serde(rename = "$text", default)]
    pub text: String,
}

///
/// Decode a junit payload. A <testsuites> document yields all of its suites and
/// a bare <testsuite> root is accepted too; anything else fails with both
/// decode diagnostics.
///
pub fn parse_suites(object: &str, data: &[u8]) -> Result<Vec<TestSuite>, UpdateError> {
    let text = std::str::from_utf8(data)
        .map_err(|source| UpdateError::ArtifactNotUtf8 { object: object.into(), source })?;

    let testsuites_err = match try_decode::<TestSuites>(text, "testsuites") {
        Ok(document) => return Ok(document.suites),
        Err(reason) => reason,
    };

    let testsuite_err = match try_decode::<TestSuite>(text, "testsuite") {
        Ok(suite) => return Ok(vec!(suite)),
        Err(reason) => reason,
    };

    Err(UpdateError::InvalidJunit {
        object: object.into(),
        testsuites: testsuites_err,
        testsuite: testsuite_err,
    })
}

fn try_decode<T: serde::de::DeserializeOwned>(text: &str, root: &str) -> Result<T, String> {
    match root_element(text) {
        Some(name) if name == root => quick_xml::de::from_str(text).map_err(|err| err.to_string()),
        Some(name) => Err(format!("document root is <{}> not <{}>", name, root)),
        None => Err("document has no root element".into()),
    }
}

fn root_element(text: &str) -> Option<String> {
    let mut reader = quick_xml::Reader::from_str(text);

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => return Some(String::from_utf8_lossy(start.name().as_ref()).into_owned()),
            Ok(Event::Empty(empty)) => return Some(String::from_utf8_lossy(empty.name().as_ref()).into_owned()),
            Ok(Event::Eof) | Err(_) => return None,
            Ok(_) => {},
        }
    }
}

///
/// Fold every test case from an artifact into the column's rows.
///
/// Cases flagged skipped without a reason are elided entirely. The rest map to
/// FAIL (a failure element), PASS_WITH_SKIPS (skipped with a reason) or PASS,
/// and a positive time attribute becomes the elapsed-seconds metric.
///
pub fn extend_column(column: &mut Column, suites: Vec<TestSuite>, artifact_meta: &BTreeMap<String, String>) {
    for suite in suites {
        let TestSuite { name: suite_name, cases } = suite;

        for case in cases {
            if let Some(skipped) = &case.skipped {
                if skipped.text.is_empty() {
                    continue
                }
            }

            let name = match suite_name.is_empty() {
                true => case.name.clone(),
                false => format!("{}.{}", suite_name, case.name),
            };

            let result = if case.failure.is_some() {
                TestResult::Fail
            } else if case.skipped.is_some() {
                TestResult::PassWithSkips
            } else {
                TestResult::Pass
            };

            let mut entry = RowEntry::new(result, &name);
            if case.time > 0.0 {
                entry.metrics.insert(ELAPSED_KEY.to_string(), case.time);
            }
            entry.metadata.extend(artifact_meta.iter().map(|(k, v)| (k.clone(), v.clone())));

            column.append(&name, entry);
        }
    }
}
