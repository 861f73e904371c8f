//! Export pipeline driver
//!
//! ```text
//! clear stale output ─► open engine ─► settings + baseline size
//!        ─► extend_bounds ─► BEGIN ─► walk_scene ─► indexes ─► COMMIT
//!        ─► ANALYZE ─► close ─► size check
//! ```
//!
//! A failure after the engine is open rolls back the batch and removes the
//! output file together with its journal sidecars. A run that writes no rows
//! leaves the file at its baseline size; it is removed and reported as
//! [`ExportError::EmptyOutput`].

use crate::config::{CollisionPolicy, ExportConfig};
use crate::db::{keys, BatchedWriter, EngineState, StorageEngine, SCHEMA_VERSION};
use crate::error::{DbResult, ExportError, Result};
use crate::progress::{format_number, print_summary, ProgressTracker};
use crate::scene::SceneGraph;
use crate::tessellate::Tessellator;
use crate::walker::{extend_bounds, walk_scene, ExportContext, WalkOptions};
use chrono::{Local, Utc};
use humansize::{format_size, BINARY};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Journal files SQLite may leave next to the database
const SIDECAR_SUFFIXES: &[&str] = &["-wal", "-shm", "-journal"];

/// Outcome of a successful export
#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub models: u64,
    pub instances: u64,
    pub shapes: u64,
    pub materials: u64,
    pub skipped_lines: u64,
    pub file_size: u64,
    pub duration: Duration,
    /// Value written under `SignatureCode`
    pub signature: String,
}

/// Export `graph` to `<stem>.<extension>`
pub fn export_scene(graph: &mut SceneGraph, config: &ExportConfig) -> Result<ExportSummary> {
    export_scene_with(graph, config, None)
}

/// Export with a tessellator for geometries that carry no triangulation
pub fn export_scene_with(
    graph: &mut SceneGraph,
    config: &ExportConfig,
    tessellator: Option<&dyn Tessellator>,
) -> Result<ExportSummary> {
    let start = Instant::now();
    config.validate()?;

    let path = config.output_path();
    clear_existing_output(&path, &config.collision)?;
    info!("Exporting scene to {}", path.display());

    let mut engine = StorageEngine::open(&path, &config.engine)?;

    let name = config.display_name();
    let signature = Uuid::new_v4().to_string();
    let cache_guid = Uuid::new_v4().to_string();
    let schema_version = SCHEMA_VERSION.to_string();
    let created_at = Utc::now().to_rfc3339();
    let settings = engine
        .update_project_settings(&[
            (keys::STORE_GEOMETRY_INFO, "True"),
            (keys::SIGNATURE_CODE, signature.as_str()),
            (keys::CACHE_GUID, cache_guid.as_str()),
            (keys::NAME, name.as_str()),
            (keys::CONTEXT, name.as_str()),
            (keys::SCHEMA_VERSION, schema_version.as_str()),
            (keys::EXPORTER_VERSION, env!("CARGO_PKG_VERSION")),
            (keys::CREATED_AT, created_at.as_str()),
        ])
        .and_then(|_| engine.checkpoint())
        .map_err(ExportError::from)
        .and_then(|_| file_size(&path));
    let baseline = match settings {
        Ok(size) => size,
        Err(e) => {
            error!("Preparing {} failed: {}", path.display(), e);
            abandon(engine);
            discard_output(&path);
            return Err(e);
        }
    };

    let counts = extend_bounds(graph);
    info!(
        "Scene has {} models, {} instances, {} shapes",
        format_number(counts.models),
        format_number(counts.instances),
        format_number(counts.shapes)
    );

    let options = WalkOptions {
        shape_instances: config.shape_instances,
        defer_instance_bounds: config.defer_instance_bounds,
    };
    let progress = ProgressTracker::new(counts.shapes, config.progress_interval, config.show_progress);
    let mut ctx = ExportContext::new(options, progress);
    if let Some(t) = tessellator {
        ctx = ctx.with_tessellator(t);
    }

    if let Err(e) = engine.begin_batch() {
        abandon(engine);
        discard_output(&path);
        return Err(e.into());
    }

    let walked = if config.threaded_writer {
        walk_threaded(engine, &mut ctx, graph, config.channel_size)
    } else {
        walk_direct(engine, &mut ctx, graph)
    };
    let engine = match walked {
        Ok(engine) => engine,
        Err(e) => {
            error!("Export to {} failed: {}", path.display(), e);
            discard_output(&path);
            return Err(e);
        }
    };

    let stats = ctx.finish();
    if let Err(e) = finalize(engine, config.analyze_after_load) {
        error!("Finalizing {} failed: {}", path.display(), e);
        discard_output(&path);
        return Err(e);
    }

    let size = closed_output_size(&path)?;
    if size == baseline {
        warn!("No content exported, removing {}", path.display());
        discard_output(&path);
        return Err(ExportError::EmptyOutput { path });
    }

    let duration = start.elapsed();
    info!(
        "Exported {} shapes to {} ({}) in {:.1}s",
        format_number(stats.shapes),
        path.display(),
        format_size(size, BINARY),
        duration.as_secs_f64()
    );

    let summary = ExportSummary {
        path,
        models: stats.models,
        instances: stats.instances,
        shapes: stats.shapes,
        materials: stats.materials,
        skipped_lines: stats.skipped_lines,
        file_size: size,
        duration,
        signature,
    };
    if config.show_progress {
        print_summary(&summary);
    }
    Ok(summary)
}

fn walk_direct(
    mut engine: StorageEngine,
    ctx: &mut ExportContext<'_>,
    graph: &SceneGraph,
) -> Result<StorageEngine> {
    match walk_scene(ctx, &mut engine, graph) {
        Ok(()) => Ok(engine),
        Err(e) => {
            abandon(engine);
            Err(e)
        }
    }
}

fn walk_threaded(
    engine: StorageEngine,
    ctx: &mut ExportContext<'_>,
    graph: &SceneGraph,
    channel_size: usize,
) -> Result<StorageEngine> {
    let writer = BatchedWriter::spawn(engine, channel_size)?;
    let mut handle = writer.handle();
    let walked = walk_scene(ctx, &mut handle, graph);
    drop(handle);

    match (walked, writer.finish()) {
        (Ok(()), Ok(engine)) => Ok(engine),
        (Err(e), Ok(engine)) => {
            abandon(engine);
            Err(e)
        }
        // The walker only saw a closed channel; the writer knows why
        (_, Err(e)) => Err(e.into()),
    }
}

fn finalize(mut engine: StorageEngine, analyze: bool) -> Result<()> {
    match finish_load(&mut engine, analyze) {
        Ok(()) => Ok(engine.close()?),
        Err(e) => {
            abandon(engine);
            Err(e.into())
        }
    }
}

/// Indexes and statistics are skipped for an empty load so the file stays
/// at its baseline size.
fn finish_load(engine: &mut StorageEngine, analyze: bool) -> DbResult<()> {
    let wrote_rows = engine.stats().rows_written > 0;
    if wrote_rows {
        engine.create_initial_indexes()?;
    }
    engine.end_batch(true)?;
    if wrote_rows && analyze {
        engine.optimize_for_reads()?;
    }
    Ok(())
}

/// Roll back and close after a failure; errors here are secondary
fn abandon(mut engine: StorageEngine) {
    if engine.state() == EngineState::Batching {
        if let Err(e) = engine.end_batch(false) {
            warn!("Rollback failed: {}", e);
        }
    }
    if let Err(e) = engine.close() {
        warn!("Close after failure failed: {}", e);
    }
}

/// `path` with `suffix` appended to the file name
fn sidecar(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// The database file followed by its sidecars
pub fn output_family(path: &Path) -> Vec<PathBuf> {
    std::iter::once(path.to_path_buf())
        .chain(SIDECAR_SUFFIXES.iter().map(|s| sidecar(path, s)))
        .collect()
}

/// Remove or relocate a previous run's output before anything is written
pub fn clear_existing_output(path: &Path, policy: &CollisionPolicy) -> Result<()> {
    for candidate in output_family(path) {
        if !candidate.exists() {
            continue;
        }

        match policy {
            CollisionPolicy::Delete => {
                fs::remove_file(&candidate).map_err(|e| ExportError::Collision {
                    path: candidate.clone(),
                    reason: e.to_string(),
                })?;
                info!("Removed existing {}", candidate.display());
            }
            CollisionPolicy::Trash(dir) => {
                let target = move_to_trash(&candidate, dir.as_deref())?;
                info!("Moved existing {} to {}", candidate.display(), target.display());
            }
        }
    }
    Ok(())
}

fn move_to_trash(path: &Path, dir: Option<&Path>) -> Result<PathBuf> {
    let collision = |e: io::Error| ExportError::Collision {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    let trash_dir = match dir {
        Some(d) => d.to_path_buf(),
        None => path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."))
            .join(".trash"),
    };
    fs::create_dir_all(&trash_dir).map_err(collision)?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stamp = Local::now().format("%Y%m%d-%H%M%S%.3f");
    let target = trash_dir.join(format!("{}.{}", file_name, stamp));

    fs::rename(path, &target).map_err(collision)?;
    Ok(target)
}

/// Best-effort removal of the output and its sidecars
pub fn discard_output(path: &Path) {
    for candidate in output_family(path) {
        match fs::remove_file(&candidate) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Could not remove {}: {}", candidate.display(), e),
        }
    }
}

fn file_size(path: &Path) -> Result<u64> {
    Ok(fs::metadata(path)?.len())
}

/// Size of the closed output; the output family is discarded if it cannot be read
fn closed_output_size(path: &Path) -> Result<u64> {
    file_size(path).map_err(|e| {
        error!("Cannot stat {}: {}", path.display(), e);
        discard_output(path);
        e
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_output_family() {
        let family = output_family(Path::new("/tmp/plant.ewc"));
        assert_eq!(
            family,
            vec![
                PathBuf::from("/tmp/plant.ewc"),
                PathBuf::from("/tmp/plant.ewc-wal"),
                PathBuf::from("/tmp/plant.ewc-shm"),
                PathBuf::from("/tmp/plant.ewc-journal"),
            ]
        );
    }

    #[test]
    fn test_clear_existing_delete() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plant.ewc");
        fs::write(&path, b"old").unwrap();
        fs::write(sidecar(&path, "-wal"), b"old").unwrap();

        clear_existing_output(&path, &CollisionPolicy::Delete).unwrap();
        assert!(!path.exists());
        assert!(!sidecar(&path, "-wal").exists());
    }

    #[test]
    fn test_clear_existing_trash() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plant.ewc");
        fs::write(&path, b"old").unwrap();

        clear_existing_output(&path, &CollisionPolicy::Trash(None)).unwrap();
        assert!(!path.exists());

        let trashed: Vec<_> = fs::read_dir(dir.path().join(".trash"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(trashed.len(), 1);
        assert!(trashed[0].starts_with("plant.ewc."));
    }

    #[test]
    fn test_unreadable_output_is_discarded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plant.ewc");
        fs::write(sidecar(&path, "-wal"), b"partial").unwrap();

        assert!(matches!(closed_output_size(&path), Err(ExportError::Io(_))));
        assert!(!sidecar(&path, "-wal").exists());

        fs::write(&path, b"12345").unwrap();
        assert_eq!(closed_output_size(&path).unwrap(), 5);
        assert!(path.exists());
    }

    #[test]
    fn test_discard_missing_is_quiet() {
        let dir = tempdir().unwrap();
        discard_output(&dir.path().join("never-written.ewc"));
    }
}
