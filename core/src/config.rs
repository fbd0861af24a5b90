use std::io::Read;
use prost::Message;
use flate2::read::ZlibDecoder;
use crate::error::Error;

///
/// The declarative dashboard configuration. One TestGroup per grid to maintain.
///
/// The document lives in the object store as a protobuf, either raw or zlib
/// compressed (the same envelope the updater writes its own grids with).
///
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Configuration {
    #[prost(message, repeated, tag = "1")]
    pub test_groups: Vec<TestGroup>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TestGroup {
    /// Unique key, also the filename of the group's serialized grid.
    #[prost(string, tag = "1")]
    pub name: String,

    /// Object-store path of the group's build root, without the gs:// scheme.
    #[prost(string, tag = "2")]
    pub gcs_prefix: String,

    /// Metadata keys surfaced as extra per-column values, in order.
    #[prost(string, repeated, tag = "3")]
    pub column_headers: Vec<String>,

    #[prost(message, optional, tag = "4")]
    pub test_name_config: Option<TestNameConfig>,
}

///
/// How to derive a row's display name: a printf-style format with %s
/// placeholders, filled in order from the named metadata elements.
///
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TestNameConfig {
    #[prost(string, tag = "1")]
    pub name_format: String,

    #[prost(message, repeated, tag = "2")]
    pub name_elements: Vec<TestNameElement>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TestNameElement {
    /// The metadata key whose value fills the corresponding placeholder.
    #[prost(string, tag = "1")]
    pub target_config: String,
}

impl Configuration {
    ///
    /// Decode a configuration document, trying the zlib-wrapped form first and
    /// falling back to a raw protobuf.
    ///
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let mut inflated = Vec::new();
        if ZlibDecoder::new(bytes).read_to_end(&mut inflated).is_ok() {
            if let Ok(config) = Configuration::decode(inflated.as_slice()) {
                return config.validated()
            }
        }

        Configuration::decode(bytes)
            .map_err(|source| Error::InvalidConfiguration { source })?
            .validated()
    }

    pub fn find_group(&self, name: &str) -> Option<&TestGroup> {
        self.test_groups.iter().find(|group| group.name == name)
    }

    fn validated(self) -> Result<Self, Error> {
        for group in &self.test_groups {
            if group.name.is_empty() {
                return Err(Error::ConfigValidationError { reason: "a test group has no name".into() })
            }

            if group.gcs_prefix.is_empty() {
                return Err(Error::ConfigValidationError { reason: format!("test group {} has no gcs_prefix", group.name) })
            }
        }

        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use flate2::{Compression, write::ZlibEncoder};

    fn example() -> Configuration {
        Configuration {
            test_groups: vec!(TestGroup {
                name: "sig-node".into(),
                gcs_prefix: "k8s-results/logs/ci-node".into(),
                column_headers: vec!("Commit".into()),
                test_name_config: None,
            }),
        }
    }

    #[test]
    fn test_decode_raw_and_compressed() {
        let config = example();
        let raw = config.encode_to_vec();

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&raw).unwrap();
        let compressed = encoder.finish().unwrap();

        assert_eq!(config, Configuration::from_bytes(&raw).unwrap());
        assert_eq!(config, Configuration::from_bytes(&compressed).unwrap());
    }

    #[test]
    fn test_group_without_prefix_is_rejected() {
        let mut config = example();
        config.test_groups[0].gcs_prefix.clear();

        match Configuration::from_bytes(&config.encode_to_vec()) {
            Err(Error::ConfigValidationError { .. }) => {},
            other => panic!("Expected a validation error, got: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_find_group() {
        let config = example();
        assert!(config.find_group("sig-node").is_some());
        assert!(config.find_group("sig-storage").is_none());
    }
}
