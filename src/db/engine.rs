//! Transactional bulk-load storage engine
//!
//! Owns one SQLite connection for the duration of an export. Row inserts go
//! through statements prepared once at open time and kept in the
//! connection's statement cache. Inserts between [`StorageEngine::begin_batch`]
//! and [`StorageEngine::end_batch`] share one transaction, optionally committed
//! and reopened every `auto_commit_threshold` rows to bound journal size.
//!
//! # State machine
//!
//! ```text
//!   open() ──► Open ──begin_batch──► Batching ──end_batch──► Open ──close()
//!                                      │  ▲
//!                                      └──┘ threshold reached: COMMIT; BEGIN
//! ```

use crate::config::{EngineOptions, JournalMode};
use crate::db::schema;
use crate::db::{
    bbox_columns, AssociationRow, GeometryRow, InstanceRow, MeshRow, ModelRow, RowSink, ShapeRow,
};
use crate::error::{DbError, DbResult};
use crate::material::Material;
use crate::scene::BBox3;
use rusqlite::{params, Connection, Params};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No transaction open; statements autocommit
    Open,
    /// Inside a batch transaction
    Batching,
}

/// Counters kept by the engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Row statements executed (inserts and bounding box patches)
    pub rows_written: u64,

    /// Commits issued, automatic and explicit
    pub batches_committed: u64,

    /// Batches rolled back
    pub batches_rolled_back: u64,
}

pub struct StorageEngine {
    conn: Connection,
    path: PathBuf,
    options: EngineOptions,
    state: EngineState,
    pending: u64,
    stats: EngineStats,
}

impl StorageEngine {
    /// Create the database file, apply tuning and build the schema
    pub fn open(path: &Path, options: &EngineOptions) -> DbResult<Self> {
        let conn = Connection::open(path).map_err(|e| DbError::CreateFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::init(conn, path.to_path_buf(), options)
    }

    /// In-memory engine, mostly for tests
    pub fn open_in_memory(options: &EngineOptions) -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, PathBuf::from(":memory:"), options)
    }

    fn init(conn: Connection, path: PathBuf, options: &EngineOptions) -> DbResult<Self> {
        schema::create_database(&conn, options)?;

        conn.set_prepared_statement_cache_capacity(schema::ROW_STATEMENTS.len() + 4);
        for sql in schema::ROW_STATEMENTS {
            conn.prepare_cached(sql)?;
        }

        debug!(
            "Opened {} (journal={}, page_size={}, auto_commit={})",
            path.display(),
            options.journal_mode,
            options.page_size,
            options.auto_commit_threshold
        );

        Ok(Self {
            conn,
            path,
            options: options.clone(),
            state: EngineState::Open,
            pending: 0,
            stats: EngineStats::default(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    /// Borrow the connection for read-back queries
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn begin_batch(&mut self) -> DbResult<()> {
        if self.state == EngineState::Batching {
            return Err(DbError::InvalidState("a batch is already open"));
        }
        self.conn.execute_batch("BEGIN")?;
        self.state = EngineState::Batching;
        self.pending = 0;
        Ok(())
    }

    /// Commit or roll back the open batch
    pub fn end_batch(&mut self, commit: bool) -> DbResult<()> {
        if self.state != EngineState::Batching {
            return Err(DbError::InvalidState("no batch is open"));
        }

        let sql = if commit { "COMMIT" } else { "ROLLBACK" };
        if let Err(e) = self.conn.execute_batch(sql) {
            if commit {
                if let Err(rollback) = self.conn.execute_batch("ROLLBACK") {
                    warn!("Rollback after failed commit also failed: {}", rollback);
                }
            }
            self.state = EngineState::Open;
            return Err(DbError::Transaction(format!("{} failed: {}", sql, e)));
        }

        if commit {
            self.stats.batches_committed += 1;
        } else {
            self.stats.batches_rolled_back += 1;
            warn!("Rolled back batch with {} pending rows", self.pending);
        }
        self.state = EngineState::Open;
        self.pending = 0;
        Ok(())
    }

    fn row_written(&mut self) -> DbResult<()> {
        self.stats.rows_written += 1;
        if self.state != EngineState::Batching {
            return Ok(());
        }

        self.pending += 1;
        let threshold = self.options.auto_commit_threshold;
        if threshold > 0 && self.pending >= threshold {
            self.conn
                .execute_batch("COMMIT; BEGIN")
                .map_err(|e| DbError::Transaction(format!("Automatic commit failed: {}", e)))?;
            self.stats.batches_committed += 1;
            self.pending = 0;
        }
        Ok(())
    }

    fn execute_row<P: Params>(
        &self,
        table: &'static str,
        id: i64,
        sql: &str,
        params: P,
    ) -> DbResult<()> {
        self.conn
            .prepare_cached(sql)
            .and_then(|mut stmt| stmt.execute(params))
            .map(|_| ())
            .map_err(|source| DbError::RowInsert { table, id, source })
    }

    pub fn add_model(&mut self, row: &ModelRow<'_>) -> DbResult<()> {
        let b = bbox_columns(row.bbox.as_ref());
        self.execute_row(
            "model",
            row.id,
            schema::INSERT_MODEL,
            params![row.id, row.name, b[0], b[1], b[2], b[3], b[4], b[5]],
        )?;
        self.row_written()
    }

    pub fn add_instance(&mut self, row: &InstanceRow<'_>) -> DbResult<()> {
        let b = bbox_columns(row.bbox.as_ref());
        self.execute_row(
            "instance",
            row.id,
            schema::INSERT_INSTANCE,
            params![
                row.id,
                row.class_id,
                row.name,
                row.significant,
                b[0],
                b[1],
                b[2],
                b[3],
                b[4],
                b[5]
            ],
        )?;
        self.row_written()
    }

    pub fn add_association(&mut self, row: &AssociationRow) -> DbResult<()> {
        self.execute_row(
            "association",
            row.child_id,
            schema::INSERT_ASSOCIATION,
            params![row.parent_id, row.child_id, row.asso_type],
        )?;
        self.row_written()
    }

    pub fn add_material(&mut self, material: &Material) -> DbResult<()> {
        let m = material;
        self.execute_row(
            "material",
            m.id,
            schema::INSERT_MATERIAL,
            params![
                m.id,
                m.diffuse[0] as f64,
                m.diffuse[1] as f64,
                m.diffuse[2] as f64,
                m.dissolve as f64,
                m.roughness as f64,
                m.metallic as f64,
                m.diffuse_texname,
                m.alpha_texname,
                m.normal_texname,
                m.metallic_texname,
                m.roughness_texname
            ],
        )?;
        self.row_written()
    }

    pub fn add_shape(&mut self, row: &ShapeRow<'_>) -> DbResult<()> {
        let b = bbox_columns(row.bbox.as_ref());
        self.execute_row(
            "shape",
            row.id,
            schema::INSERT_SHAPE,
            params![
                row.id,
                row.instance_id,
                row.geometry_id,
                row.material_id,
                row.matrix,
                b[0],
                b[1],
                b[2],
                b[3],
                b[4],
                b[5]
            ],
        )?;
        self.row_written()
    }

    pub fn add_geometry(&mut self, row: &GeometryRow<'_>) -> DbResult<()> {
        self.execute_row(
            "geometry",
            row.id,
            schema::INSERT_GEOMETRY,
            params![row.id, row.hashcode, row.geometry_type, row.data],
        )?;
        self.row_written()
    }

    pub fn add_mesh(&mut self, row: &MeshRow<'_>) -> DbResult<()> {
        let b = bbox_columns(row.bbox.as_ref());
        self.execute_row(
            "mesh",
            row.id,
            schema::INSERT_MESH,
            params![
                row.id,
                row.geometry_id,
                row.triangle_count,
                row.data,
                b[0],
                b[1],
                b[2],
                b[3],
                b[4],
                b[5]
            ],
        )?;
        self.row_written()
    }

    /// Patch the bounds of an instance (or model) row.
    ///
    /// Bounds written at insert time win: the same value is a no-op, a
    /// different one is logged and ignored, and only NULL bounds get set.
    pub fn update_bounding_box(&mut self, id: i64, bbox: &BBox3) -> DbResult<()> {
        let (table, update_sql, stored) =
            if let Some(stored) = self.stored_bbox(schema::SELECT_INSTANCE_BBOX, id)? {
                ("instance", schema::UPDATE_INSTANCE_BBOX, stored)
            } else if let Some(stored) = self.stored_bbox(schema::SELECT_MODEL_BBOX, id)? {
                ("model", schema::UPDATE_MODEL_BBOX, stored)
            } else {
                return Err(DbError::RowInsert {
                    table: "instance",
                    id,
                    source: rusqlite::Error::QueryReturnedNoRows,
                });
            };

        let wanted = bbox_columns(Some(bbox));
        if stored == wanted {
            return Ok(());
        }
        if stored.iter().any(Option::is_some) {
            warn!(
                "Bounding box mismatch on {} {}: stored {:?}, update {:?}; keeping stored",
                table, id, stored, wanted
            );
            return Ok(());
        }

        let b = wanted;
        self.execute_row(
            table,
            id,
            update_sql,
            params![id, b[0], b[1], b[2], b[3], b[4], b[5]],
        )?;
        self.row_written()
    }

    fn stored_bbox(&self, sql: &str, id: i64) -> DbResult<Option<[Option<f64>; 6]>> {
        let result = self.conn.prepare_cached(sql).and_then(|mut stmt| {
            stmt.query_row([id], |row| {
                Ok([
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                ])
            })
        });

        match result {
            Ok(b) => Ok(Some(b)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write key/value pairs into the settings table
    pub fn update_project_settings(&mut self, settings: &[(&str, &str)]) -> DbResult<()> {
        for (key, value) in settings {
            schema::set_setting(&self.conn, key, value)?;
        }
        Ok(())
    }

    pub fn setting(&self, key: &str) -> DbResult<Option<String>> {
        schema::get_setting(&self.conn, key)
    }

    /// Build the query indexes; called once after the bulk load
    pub fn create_initial_indexes(&mut self) -> DbResult<()> {
        schema::create_indexes(&self.conn)
    }

    /// Switch to read-friendly pragmas and gather planner statistics
    pub fn optimize_for_reads(&mut self) -> DbResult<()> {
        if self.state == EngineState::Batching {
            return Err(DbError::InvalidState("cannot optimize inside a batch"));
        }
        schema::optimize_for_reads(&self.conn)
    }

    /// Move WAL content into the main file so its size reflects what is stored
    pub fn checkpoint(&mut self) -> DbResult<()> {
        if self.state == EngineState::Batching {
            return Err(DbError::InvalidState("cannot checkpoint inside a batch"));
        }
        if self.options.journal_mode == JournalMode::Wal {
            self.conn
                .query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
        }
        Ok(())
    }

    /// Finalize statements and close the connection
    pub fn close(mut self) -> DbResult<()> {
        if self.state == EngineState::Batching {
            warn!("Closing {} with an open batch; rolling back", self.path.display());
            self.end_batch(false)?;
        }

        let stats = self.stats;
        let path = self.path;
        self.conn.flush_prepared_statement_cache();
        self.conn.close().map_err(|(_, e)| DbError::Sqlite(e))?;

        info!(
            "Closed {} ({} rows, {} commits)",
            path.display(),
            stats.rows_written,
            stats.batches_committed
        );
        Ok(())
    }
}

impl RowSink for StorageEngine {
    fn add_model(&mut self, row: &ModelRow<'_>) -> DbResult<()> {
        StorageEngine::add_model(self, row)
    }

    fn add_instance(&mut self, row: &InstanceRow<'_>) -> DbResult<()> {
        StorageEngine::add_instance(self, row)
    }

    fn add_association(&mut self, row: &AssociationRow) -> DbResult<()> {
        StorageEngine::add_association(self, row)
    }

    fn add_material(&mut self, material: &Material) -> DbResult<()> {
        StorageEngine::add_material(self, material)
    }

    fn add_shape(&mut self, row: &ShapeRow<'_>) -> DbResult<()> {
        StorageEngine::add_shape(self, row)
    }

    fn add_geometry(&mut self, row: &GeometryRow<'_>) -> DbResult<()> {
        StorageEngine::add_geometry(self, row)
    }

    fn add_mesh(&mut self, row: &MeshRow<'_>) -> DbResult<()> {
        StorageEngine::add_mesh(self, row)
    }

    fn update_bounding_box(&mut self, id: i64, bbox: &BBox3) -> DbResult<()> {
        StorageEngine::update_bounding_box(self, id, bbox)
    }
}
