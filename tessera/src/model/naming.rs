use std::collections::BTreeMap;
use tessera_core::config::TestNameConfig;
use crate::model::column::TESTS_NAME_KEY;

///
/// Derives the display name for a test row from a printf-style format and an
/// ordered list of metadata keys.
///
#[derive(Clone, Debug)]
pub struct NameConfig {
    format: String,
    parts: Vec<String>,
}

impl NameConfig {
    ///
    /// Groups without a test_name_config name rows by their "Tests name"
    /// metadata alone.
    ///
    pub fn new(config: Option<&TestNameConfig>) -> Self {
        match config {
            Some(tnc) => NameConfig {
                format: tnc.name_format.clone(),
                parts: tnc.name_elements.iter().map(|element| element.target_config.clone()).collect(),
            },
            None => NameConfig { format: "%s".into(), parts: vec!(TESTS_NAME_KEY.into()) },
        }
    }

    ///
    /// Substitute each part into the format in order. Parts resolve from the
    /// row entry's own metadata first, falling back to the column's; missing
    /// keys become the empty string.
    ///
    pub fn format(&self, entry: &BTreeMap<String, String>, column: &BTreeMap<String, String>) -> String {
        let mut values = self.parts.iter()
            .map(|part| entry.get(part).or_else(|| column.get(part)).map(String::as_str).unwrap_or(""));

        let mut segments = self.format.split("%s");
        let mut name = String::from(segments.next().unwrap_or(""));

        for segment in segments {
            name.push_str(values.next().unwrap_or(""));
            name.push_str(segment);
        }

        name
    }
}
