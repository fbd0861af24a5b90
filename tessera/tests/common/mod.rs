use prost::Message;
use tessera::{Context, Options};
use tessera::error::UpdateError;
use tessera::storage::ObjectClient;
use tessera_core::config::{Configuration, TestGroup};
use std::{collections::HashMap, sync::{Arc, Mutex}};
use object_store::{ObjectStore, PutPayload, memory::InMemory, path::Path};

/// Where the seeded dashboard configuration lives; grids are written alongside it.
pub const CONFIG_PATH: &str = "gs://dash/configs/config";

///
/// An in-memory object store per bucket, letting the whole pipeline run without
/// touching a real backend.
///
pub struct MemoryClient {
    buckets: Mutex<HashMap<String, Arc<dyn ObjectStore>>>,
}

impl MemoryClient {
    pub fn new() -> Arc<Self> {
        Arc::new(MemoryClient { buckets: Mutex::new(HashMap::new()) })
    }

    pub fn bucket(&self, name: &str) -> Arc<dyn ObjectStore> {
        self.buckets.lock().expect("bucket cache poisoned")
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(InMemory::new()))
            .clone()
    }
}

impl ObjectClient for MemoryClient {
    fn store(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>, UpdateError> {
        Ok(self.bucket(bucket))
    }
}

///
/// Set up logging for a test run.
///
pub fn init_test() {
    dotenv::dotenv().ok();
    let _ = env_logger::builder().is_test(true).try_init();
}

pub async fn put(store: &dyn ObjectStore, object: &str, bytes: &[u8]) {
    store.put(&Path::from(object), PutPayload::from(bytes.to_vec()))
        .await
        .unwrap_or_else(|err| panic!("Cannot seed object {}: {}", object, err));
}

///
/// Seed one build directory: a started marker, optionally a finished marker,
/// and any (artifact name, payload) pairs under artifacts/.
///
pub async fn seed_build(
    store: &dyn ObjectStore,
    prefix: &str,
    started: &str,
    finished: Option<&str>,
    artifacts: &[(&str, &str)]) {

    put(store, &format!("{}started.json", prefix), started.as_bytes()).await;

    if let Some(finished) = finished {
        put(store, &format!("{}finished.json", prefix), finished.as_bytes()).await;
    }

    for (name, payload) in artifacts {
        put(store, &format!("{}artifacts/{}", prefix, name), payload.as_bytes()).await;
    }
}

pub fn test_group(name: &str, gcs_prefix: &str, headers: &[&str]) -> TestGroup {
    TestGroup {
        name: name.into(),
        gcs_prefix: gcs_prefix.into(),
        column_headers: headers.iter().map(|h| h.to_string()).collect(),
        test_name_config: None,
    }
}

pub fn options(confirm: bool) -> Options {
    Options {
        config: CONFIG_PATH.parse().expect("bad test config path"),
        service_account: None,
        confirm,
        test_group: None,
        group_concurrency: 1,
    }
}

pub fn test_context(client: Arc<MemoryClient>, groups: Vec<TestGroup>, confirm: bool) -> Context {
    Context::new(options(confirm), Configuration { test_groups: groups }, client)
}

///
/// Seed the dashboard configuration proto the way run_with_client loads it.
///
pub async fn seed_config(client: &MemoryClient, config: &Configuration) {
    let store = client.bucket("dash");
    put(&*store, "configs/config", &config.encode_to_vec()).await;
}

///
/// Fetch and decode the grid the updater wrote for the named group.
///
pub async fn written_grid(client: &MemoryClient, group: &str) -> tessera_core::state::Grid {
    let store = client.bucket("dash");
    let bytes = tessera::storage::read_object(&*store, &format!("configs/{}", group))
        .await
        .unwrap_or_else(|err| panic!("No grid was written for {}: {}", group, err));

    tessera::serial::deserialize(&bytes).expect("cannot decode the written grid")
}
