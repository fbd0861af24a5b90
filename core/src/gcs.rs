use url::Url;
use std::{fmt, str::FromStr};
use crate::error::Error;

///
/// A validated object-store location in the form gs://bucket/object/path.
///
/// Only the gs scheme is accepted and the authority must be a plain bucket name -
/// no port, no user info. Queries, fragments and opaque (non-base) forms are rejected.
///
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GcsPath {
    bucket: String,
    object: String,
}

impl GcsPath {
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    ///
    /// The object path within the bucket, leading '/' stripped.
    ///
    pub fn object(&self) -> &str {
        &self.object
    }

    ///
    /// Derive a path in the same directory with the final segment replaced.
    ///
    /// e.g. gs://bucket/configs/dashboard + "sig-node" -> gs://bucket/configs/sig-node
    ///
    pub fn sibling(&self, name: &str) -> GcsPath {
        let object = match self.object.rfind('/') {
            Some(idx) => format!("{}/{}", &self.object[..idx], name),
            None => name.to_string(),
        };

        GcsPath { bucket: self.bucket.clone(), object }
    }
}

impl FromStr for GcsPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| Error::InvalidStorePath { url: s.into(), reason: reason.into() };

        let url = Url::parse(s).map_err(|err| Error::InvalidStorePath { url: s.into(), reason: err.to_string() })?;

        if url.cannot_be_a_base() {
            return Err(invalid("the path is opaque"))
        }

        if url.scheme() != "gs" {
            return Err(invalid("the scheme must be gs"))
        }

        if url.port().is_some() {
            return Err(invalid("bucket names cannot contain a port"))
        }

        if !url.username().is_empty() || url.password().is_some() {
            return Err(invalid("bucket names cannot contain user info"))
        }

        if url.query().is_some() {
            return Err(invalid("queries are not allowed"))
        }

        if url.fragment().is_some() {
            return Err(invalid("fragments are not allowed"))
        }

        let bucket = url.host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| invalid("there is no bucket name"))?
            .to_string();

        Ok(GcsPath { bucket, object: url.path().trim_start_matches('/').to_string() })
    }
}

impl fmt::Display for GcsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gs://{}/{}", self.bucket, self.object)
    }
}
