use bytes::Bytes;
use futures::TryStreamExt;
use crate::error::UpdateError;
use std::{collections::HashMap, path::PathBuf, sync::{Arc, Mutex}};
use object_store::{Attribute, AttributeValue, Attributes, ObjectMeta, ObjectStore, PutOptions, gcp::GoogleCloudStorageBuilder, path::Path};

///
/// Hands out an object-store client for each bucket the run touches.
///
/// Implementations must be cheap to call repeatedly and safe to share across
/// worker tasks. The production implementation talks to GCS; the tests swap in
/// in-memory stores.
///
pub trait ObjectClient: Send + Sync {
    fn store(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>, UpdateError>;
}

///
/// GCS-backed client. Stores are built lazily, one per bucket, and cached for
/// the lifetime of the run.
///
pub struct GcsClient {
    service_account: Option<PathBuf>,
    stores: Mutex<HashMap<String, Arc<dyn ObjectStore>>>,
}

impl GcsClient {
    ///
    /// An empty credentials path means ambient credentials (the environment).
    ///
    pub fn new(service_account: Option<PathBuf>) -> Self {
        Self { service_account, stores: Mutex::new(HashMap::new()) }
    }
}

impl ObjectClient for GcsClient {
    fn store(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>, UpdateError> {
        let mut stores = self.stores.lock().expect("gcs store cache poisoned");

        if let Some(store) = stores.get(bucket) {
            return Ok(store.clone())
        }

        let mut builder = GoogleCloudStorageBuilder::from_env().with_bucket_name(bucket);
        if let Some(path) = &self.service_account {
            builder = builder.with_service_account_path(path.to_string_lossy().to_string());
        }

        let store: Arc<dyn ObjectStore> = Arc::new(builder.build()
            .map_err(|source| UpdateError::StoreInitError { bucket: bucket.into(), source })?);

        stores.insert(bucket.to_string(), store.clone());
        Ok(store)
    }
}

///
/// Read an entire object into memory.
///
pub async fn read_object(store: &dyn ObjectStore, object: &str) -> Result<Bytes, object_store::Error> {
    store.get(&Path::from(object)).await?.bytes().await
}

pub fn is_not_found(err: &object_store::Error) -> bool {
    matches!(err, object_store::Error::NotFound { .. })
}

///
/// The immediate child "directories" under a prefix, per delimited listing.
/// Plain objects at this level are ignored.
///
pub async fn list_dirs(store: &dyn ObjectStore, prefix: &str) -> Result<Vec<String>, object_store::Error> {
    let listing = store.list_with_delimiter(Some(&Path::from(prefix))).await?;

    Ok(listing.common_prefixes.iter().map(|dir| dir.as_ref().to_string()).collect())
}

///
/// Every object below the prefix, sorted by name so downstream iteration is
/// deterministic. A listing failure discards any partial results.
///
pub async fn list_objects(store: &dyn ObjectStore, prefix: &str) -> Result<Vec<ObjectMeta>, object_store::Error> {
    let mut objects: Vec<ObjectMeta> = store.list(Some(&Path::from(prefix))).try_collect().await?;
    objects.sort_by(|a, b| a.location.as_ref().cmp(b.location.as_ref()));

    Ok(objects)
}

///
/// Write the payload, recording its Castagnoli checksum against the object so a
/// corrupted upload can be rejected rather than served.
///
pub async fn upload(store: &dyn ObjectStore, object: &str, payload: Vec<u8>, crc32c: u32) -> Result<(), object_store::Error> {
    let mut attributes = Attributes::new();
    attributes.insert(Attribute::Metadata("crc32c".into()), AttributeValue::from(format!("{:08x}", crc32c)));

    let mut options = PutOptions::default();
    options.attributes = attributes;

    store.put_opts(&Path::from(object), payload.into(), options).await?;

    Ok(())
}
