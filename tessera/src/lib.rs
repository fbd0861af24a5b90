pub mod builds;
pub mod error;
pub mod model;
pub mod serial;
pub mod storage;

pub mod junit;

mod reader;

use uuid::Uuid;
use chrono::Utc;
use futures::StreamExt;
use ubyte::ToByteUnit;
use builds::BuildRef;
use error::UpdateError;
use model::grid::GridAssembler;
use object_store::ObjectStore;
use storage::{GcsClient, ObjectClient};
use tokio_util::sync::CancellationToken;
use anyhow::{Context as ErrContext, Result};
use std::{path::PathBuf, str::FromStr, sync::Arc, time::Instant};
use tessera_core::{blue, config::{Configuration, TestGroup}, formatted_duration_rate, gcs::GcsPath, state};

/// Config documents in this bucket belong to the hosted dashboard and must
/// never be targeted by a local run.
pub const RESERVED_CONFIG_BUCKET: &str = "k8s-testgrid";

/// At most this many builds contribute columns to a grid.
const MAX_RESULTS: usize = 50;

/// Builds started before this window are too stale to consume.
const WINDOW_DAYS: i64 = 7;

/// Concurrent build reads within a single group.
const BUILD_READERS: usize = 4;

///
/// Everything the updater was asked to do, parsed from the command line.
///
#[derive(Clone, Debug)]
pub struct Options {
    /// Object-store path of the dashboard configuration proto.
    pub config: GcsPath,

    /// Credentials file. None means ambient credentials.
    pub service_account: Option<PathBuf>,

    /// When false, serialize and log only - never upload.
    pub confirm: bool,

    /// Restrict the run to this group.
    pub test_group: Option<String>,

    /// Worker pool size. Zero means four workers per CPU.
    pub group_concurrency: usize,
}

///
/// Created once per run. Used to pass the main top-level job 'things' around.
///
pub struct Context {
    started: Instant,               // When the run started.
    job_id: Uuid,                   // Each run is given a unique id.
    options: Options,               // The parsed command line.
    config: Configuration,          // The dashboard configuration to update.
    client: Arc<dyn ObjectClient>,  // Object-store access, one store per bucket.
    token: CancellationToken,       // Cooperative cancellation for all I/O.
    now: i64,                       // Wall-clock reference for timeouts and windows.
}

impl Context {
    pub fn new(options: Options, config: Configuration, client: Arc<dyn ObjectClient>) -> Self {
        Self {
            started: Instant::now(),
            job_id: Uuid::new_v4(),
            options,
            config,
            client,
            token: CancellationToken::new(),
            now: Utc::now().timestamp(),
        }
    }

    pub fn started(&self) -> Instant {
        self.started
    }

    pub fn job_id(&self) -> &Uuid {
        &self.job_id
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn client(&self) -> &Arc<dyn ObjectClient> {
        &self.client
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn now(&self) -> i64 {
        self.now
    }

    fn check_cancelled(&self) -> Result<(), UpdateError> {
        match self.token.is_cancelled() {
            true => Err(UpdateError::Cancelled),
            false => Ok(()),
        }
    }
}

///
/// Load the configuration then update every test group through a fixed pool of
/// workers. This is the entry point used by the binary.
///
pub async fn run(options: Options) -> Result<()> {
    if options.config.bucket() == RESERVED_CONFIG_BUCKET {
        return Err(UpdateError::ReservedConfigBucket { bucket: options.config.bucket().into() }.into())
    }

    let client = Arc::new(GcsClient::new(options.service_account.clone()));
    run_with_client(options, client).await
}

///
/// As run, but against any object-store client. This is the seam the tests use.
///
pub async fn run_with_client(options: Options, client: Arc<dyn ObjectClient>) -> Result<()> {
    let config = load_config(&options, &*client).await?;
    let ctx = Arc::new(Context::new(options, config, client));

    log::info!("Starting update run:");
    log::info!("    Job ID: {}", ctx.job_id());
    log::info!("    Config: {} ({} groups)", ctx.options().config, ctx.config().test_groups.len());

    let groups = select_groups(&ctx)?;

    let workers = match ctx.options().group_concurrency {
        0 => 4 * num_cpus::get(),
        concurrency => concurrency,
    };

    // Cancel all in-flight work on ctrl-c.
    let token = ctx.token().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted - cancelling in-flight updates");
            token.cancel();
        }
    });

    // A rendezvous-style queue of groups drained by the worker pool. A failed
    // group is logged and must never abort the others.
    let (sender, receiver) = async_channel::bounded::<TestGroup>(1);

    let handles = (0..workers)
        .map(|_| {
            let ctx = ctx.clone();
            let receiver = receiver.clone();

            tokio::spawn(async move {
                while let Ok(group) = receiver.recv().await {
                    if ctx.token().is_cancelled() {
                        break
                    }

                    if let Err(err) = update_group(&ctx, &group).await {
                        log::error!("Group {} failed: {}", group.name, err);
                    }
                }
            })
        })
        .collect::<Vec<_>>();

    for group in groups {
        sender.send(group).await.context("the worker pool hung up")?;
    }
    drop(sender);

    for handle in handles {
        let _ignore = handle.await;
    }

    let (duration, _rate) = formatted_duration_rate(1, ctx.started().elapsed());
    log::info!("Completed update run {} in {}", ctx.job_id(), blue(&duration));

    Ok(())
}

///
/// The per-group pipeline: list builds, read them most recent first, fold the
/// columns into a grid, then serialize and (when confirmed) upload it.
///
pub async fn update_group(ctx: &Context, group: &TestGroup) -> Result<(), UpdateError> {
    let started = Instant::now();
    ctx.check_cancelled()?;

    let root = GcsPath::from_str(&format!("gs://{}", group.gcs_prefix))?;
    let store = ctx.client().store(root.bucket())?;

    let builds = builds::list_builds(&*store, &root).await?;
    log::info!("Group {}: {} builds under {}", blue(&group.name), builds.len(), root);

    let grid = assemble_group(ctx, group, store, builds).await?;
    let (columns, rows) = (grid.columns.len(), grid.rows.len());

    let encoded = serial::serialize(&grid)
        .map_err(|source| UpdateError::SerializeGrid { group: group.name.clone(), source })?;

    let output = ctx.options().config.sibling(&group.name);

    if !ctx.options().confirm {
        log::info!("Dry-run: {} columns x {} rows for {} would be written to {} ({}, crc32c {:08x})",
            columns, rows, blue(&group.name), output, (encoded.bytes.len() as u64).bytes(), encoded.crc32c);
        return Ok(())
    }

    let out_store = ctx.client().store(output.bucket())?;
    storage::upload(&*out_store, output.object(), encoded.bytes, encoded.crc32c).await
        .map_err(|source| UpdateError::UploadError { path: output.to_string(), source })?;

    let (duration, _rate) = formatted_duration_rate(columns.max(1), started.elapsed());
    log::info!("Updated {}: {} columns x {} rows in {}", blue(&group.name), columns, rows, duration);

    Ok(())
}

///
/// Fold builds into a grid. Reads overlap up to BUILD_READERS deep but columns
/// are consumed strictly in listing order, so the grid never depends on read
/// completion order. Consumption stops at MAX_RESULTS columns or once a build
/// started before the freshness window - that build is still included, and the
/// rest of the stream is dropped along with its in-flight reads.
///
async fn assemble_group(
    ctx: &Context,
    group: &TestGroup,
    store: Arc<dyn ObjectStore>,
    builds: Vec<BuildRef>) -> Result<state::Grid, UpdateError> {

    let now = ctx.now();
    let cutoff = now - WINDOW_DAYS * 24 * 60 * 60;

    let mut columns = futures::stream::iter(builds)
        .map(|build| {
            let store = store.clone();
            async move {
                let column = reader::read_build(&*store, &build, now).await;
                (build, column)
            }
        })
        .buffered(BUILD_READERS);

    let mut assembler = GridAssembler::new(group);

    while let Some((build, result)) = columns.next().await {
        ctx.check_cancelled()?;

        match result {
            Ok(column) => {
                log::info!("  {} build {}: passed={} started={} finished={} entries={}",
                    group.name, blue(build.id()), column.passed, column.started, column.finished, column.entry_count());

                let stale = column.started < cutoff;
                assembler.append(&column);

                if assembler.column_count() >= MAX_RESULTS {
                    log::debug!("Group {} reached the column limit", group.name);
                    break
                }

                if stale {
                    log::debug!("Group {} reached the freshness window", group.name);
                    break
                }
            },
            Err(err @ UpdateError::Cancelled) => return Err(err),
            Err(err) => log::warn!("Skipping build {}: {}", build.prefix, err),
        }
    }

    Ok(assembler.finish())
}

fn select_groups(ctx: &Context) -> Result<Vec<TestGroup>, UpdateError> {
    match &ctx.options().test_group {
        Some(name) => {
            let group = ctx.config().find_group(name)
                .ok_or_else(|| UpdateError::UnknownTestGroup { name: name.clone() })?;

            Ok(vec!(group.clone()))
        },
        None => Ok(ctx.config().test_groups.clone()),
    }
}

async fn load_config(options: &Options, client: &dyn ObjectClient) -> Result<Configuration, UpdateError> {
    let path = &options.config;
    let store = client.store(path.bucket())?;

    let bytes = storage::read_object(&*store, path.object()).await
        .map_err(|source| UpdateError::ConfigReadError { path: path.to_string(), source })?;

    Ok(Configuration::from_bytes(&bytes)?)
}
