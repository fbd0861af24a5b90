use thiserror::Error;
use ubyte::ByteUnit;

#[derive(Error, Debug)]
pub enum UpdateError {

    #[error("The reserved config bucket {bucket} cannot be used")]
    ReservedConfigBucket { bucket: String },

    #[error("Unable to read the dashboard configuration from {path}")]
    ConfigReadError { path: String, source: object_store::Error },

    #[error("No test group named {name} is configured")]
    UnknownTestGroup { name: String },

    #[error("Unable to initialise a client for bucket {bucket}")]
    StoreInitError { bucket: String, source: object_store::Error },

    #[error("Unable to list objects under {prefix}")]
    ListObjects { prefix: String, source: object_store::Error },

    #[error("Unable to read {object}")]
    ObjectReadError { object: String, source: object_store::Error },

    #[error("Build {prefix} has not started")]
    BuildNotStarted { prefix: String },

    #[error("Build {prefix} has an unparseable finished marker")]
    BadFinishedMarker { prefix: String, source: serde_json::Error },

    #[error("Artifact {object} is {size}, over the {limit} limit")]
    ArtifactTooLarge { object: String, size: ByteUnit, limit: ByteUnit },

    #[error("Artifact {object} is not valid UTF-8")]
    ArtifactNotUtf8 { object: String, source: std::str::Utf8Error },

    #[error("Artifact {object} is not valid junit. As <testsuites>: {testsuites}. As <testsuite>: {testsuite}")]
    InvalidJunit { object: String, testsuites: String, testsuite: String },

    #[error("Unable to serialize the grid for group {group}")]
    SerializeGrid { group: String, source: std::io::Error },

    #[error("Unable to decode a serialized grid")]
    DecodeGrid { source: prost::DecodeError },

    #[error("Unable to upload {path}")]
    UploadError { path: String, source: object_store::Error },

    #[error("The update was cancelled")]
    Cancelled,

    #[error(transparent)]
    CoreError(#[from] tessera_core::error::Error),

    #[error(transparent)]
    IOError(#[from] std::io::Error),

    #[error(transparent)]
    GeneralError(#[from] anyhow::Error),
}
