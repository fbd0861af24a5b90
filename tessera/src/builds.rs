use itertools::Itertools;
use object_store::ObjectStore;
use tessera_core::gcs::GcsPath;
use crate::{error::UpdateError, storage};

///
/// A single build directory under a test group's root.
///
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildRef {
    pub bucket: String,
    /// Always ends with '/'.
    pub prefix: String,
}

impl BuildRef {
    ///
    /// The build id is the last path segment, e.g. logs/ci-node/1234/ -> 1234.
    ///
    pub fn id(&self) -> &str {
        self.prefix.trim_end_matches('/').rsplit('/').next().unwrap_or(&self.prefix)
    }
}

///
/// Enumerate the build directories immediately under the group root, most
/// recent (greatest natural-order prefix) first. Natural ordering treats digit
/// runs as numbers, so build9 sorts before build10.
///
pub async fn list_builds(store: &dyn ObjectStore, root: &GcsPath) -> Result<Vec<BuildRef>, UpdateError> {
    let dirs = storage::list_dirs(store, root.object()).await
        .map_err(|source| UpdateError::ListObjects { prefix: root.to_string(), source })?;

    Ok(dirs.into_iter()
        .map(|dir| BuildRef { bucket: root.bucket().to_string(), prefix: format!("{}/", dir) })
        .sorted_by(|a, b| natord::compare(&a.prefix, &b.prefix))
        .rev()
        .collect())
}
