use ubyte::ToByteUnit;
use object_store::ObjectStore;
use crate::{builds::BuildRef, error::UpdateError, junit, model::{build::{Finished, Started}, column::Column}, storage};

/// Artifacts above this size fail the whole build rather than risk the memory.
const MAX_ARTIFACT_BYTES: u64 = 50 * 1024 * 1024;

///
/// Read one build into a Column: the started/finished markers plus every junit
/// artifact beneath it.
///
/// Builds with no finished marker are still running and contribute only their
/// Overall row - artifacts are not read until the build completes.
///
pub async fn read_build(store: &dyn ObjectStore, build: &BuildRef, now: i64) -> Result<Column, UpdateError> {
    let started = read_started(store, build).await?;

    let mut column = Column { id: build.id().to_string(), started: started.timestamp, ..Column::default() };

    match read_finished(store, build).await? {
        Some(finished) => {
            column.finished = finished.timestamp;
            column.passed = finished.passed;
            column.metadata = finished.string_metadata();
        },
        None => {
            column.add_overall(now);
            return Ok(column)
        },
    }

    read_artifacts(store, build, &mut column).await?;
    column.add_overall(now);

    Ok(column)
}

///
/// A build without a readable started marker effectively doesn't exist yet.
///
async fn read_started(store: &dyn ObjectStore, build: &BuildRef) -> Result<Started, UpdateError> {
    let object = format!("{}started.json", build.prefix);

    let bytes = storage::read_object(store, &object).await
        .map_err(|_| UpdateError::BuildNotStarted { prefix: build.prefix.clone() })?;

    serde_json::from_slice(&bytes)
        .map_err(|_| UpdateError::BuildNotStarted { prefix: build.prefix.clone() })
}

async fn read_finished(store: &dyn ObjectStore, build: &BuildRef) -> Result<Option<Finished>, UpdateError> {
    let object = format!("{}finished.json", build.prefix);

    let bytes = match storage::read_object(store, &object).await {
        Ok(bytes) => bytes,
        Err(err) if storage::is_not_found(&err) => return Ok(None),
        Err(source) => return Err(UpdateError::ObjectReadError { object, source }),
    };

    let finished = serde_json::from_slice(&bytes)
        .map_err(|source| UpdateError::BadFinishedMarker { prefix: build.prefix.clone(), source })?;

    Ok(Some(finished))
}

async fn read_artifacts(store: &dyn ObjectStore, build: &BuildRef, column: &mut Column) -> Result<(), UpdateError> {
    let prefix = format!("{}artifacts/", build.prefix);

    let artifacts = storage::list_objects(store, &prefix).await
        .map_err(|source| UpdateError::ListObjects { prefix: prefix.clone(), source })?;

    for meta in artifacts {
        let object = meta.location.as_ref().to_string();

        let artifact_meta = match junit::artifact_metadata(&object) {
            Some(artifact_meta) => artifact_meta,
            None => continue,
        };

        let size = meta.size as u64;
        if size > MAX_ARTIFACT_BYTES {
            return Err(UpdateError::ArtifactTooLarge { object, size: size.bytes(), limit: MAX_ARTIFACT_BYTES.bytes() })
        }

        log::debug!("Reading artifact {} ({})", object, size.bytes());

        let bytes = storage::read_object(store, &object).await
            .map_err(|source| UpdateError::ObjectReadError { object: object.clone(), source })?;

        let suites = junit::parse_suites(&object, &bytes)?;
        junit::extend_column(column, suites, &artifact_meta);
    }

    Ok(())
}
