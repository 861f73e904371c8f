//! Database schema definitions and creation
//!
//! This module defines the SQLite schema of an export file and provides
//! functions to create and configure it.

use crate::config::{EngineOptions, JournalMode};
use crate::error::DbResult;
use rusqlite::Connection;
use std::fmt::Write as _;

/// Current schema version
pub const SCHEMA_VERSION: u32 = 1;

/// Instance class of a structural node (model or group)
pub const COMPONENT_CLASS_ID: i64 = 2;

/// Instance class of a per-shape instance
pub const SHAPE_CLASS_ID: i64 = 3;

/// Association type linking a parent to its children
pub const TREE_ASSOCIATION_ID: i64 = 1;

/// Bounding box columns shared by several tables
macro_rules! bbox_columns {
    () => {
        "min_x REAL, min_y REAL, min_z REAL, max_x REAL, max_y REAL, max_z REAL"
    };
}

/// Note: Using INTEGER PRIMARY KEY (without AUTOINCREMENT). Ids are always
/// supplied by the exporter.
const CREATE_TABLES: &[&str] = &[
    concat!(
        "CREATE TABLE IF NOT EXISTS model (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL, ",
        bbox_columns!(),
        ")"
    ),
    concat!(
        "CREATE TABLE IF NOT EXISTS instance (
            id INTEGER PRIMARY KEY,
            class_id INTEGER NOT NULL,   -- 2=component, 3=shape
            name TEXT NOT NULL,
            is_significant INTEGER NOT NULL DEFAULT 0, ",
        bbox_columns!(),
        ")"
    ),
    "CREATE TABLE IF NOT EXISTS association_type (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        description TEXT,
        source_role TEXT,
        target_role TEXT
    )",
    "CREATE TABLE IF NOT EXISTS association (
        parent_id INTEGER NOT NULL,
        child_id INTEGER NOT NULL,
        asso_type INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS material (
        id INTEGER PRIMARY KEY,
        diffuse_r REAL,
        diffuse_g REAL,
        diffuse_b REAL,
        dissolve REAL,
        roughness REAL,
        metallic REAL,
        diffuse_texname TEXT,
        alpha_texname TEXT,
        normal_texname TEXT,
        metallic_texname TEXT,
        roughness_texname TEXT
    )",
    concat!(
        "CREATE TABLE IF NOT EXISTS shape (
            id INTEGER PRIMARY KEY,
            instance_id INTEGER NOT NULL,
            geometry_id INTEGER NOT NULL,
            material_id INTEGER NOT NULL,
            matrix TEXT, ",
        bbox_columns!(),
        ")"
    ),
    "CREATE TABLE IF NOT EXISTS geometry (
        id INTEGER PRIMARY KEY,
        hashcode INTEGER,
        geometry_type INTEGER NOT NULL,  -- kind index + 100
        data BLOB
    )",
    concat!(
        "CREATE TABLE IF NOT EXISTS mesh (
            id INTEGER PRIMARY KEY,
            geometry_id INTEGER NOT NULL,
            triangle_count INTEGER NOT NULL,
            data BLOB, ",
        bbox_columns!(),
        ")"
    ),
    "CREATE TABLE IF NOT EXISTS project_settings (
        key TEXT PRIMARY KEY,
        value TEXT
    )",
];

/// Row statements, prepared once per connection
pub const INSERT_MODEL: &str =
    "INSERT INTO model (id, name, min_x, min_y, min_z, max_x, max_y, max_z)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";

pub const INSERT_INSTANCE: &str =
    "INSERT INTO instance (id, class_id, name, is_significant, min_x, min_y, min_z, max_x, max_y, max_z)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)";

pub const INSERT_ASSOCIATION: &str =
    "INSERT INTO association (parent_id, child_id, asso_type) VALUES (?1, ?2, ?3)";

pub const INSERT_MATERIAL: &str =
    "INSERT INTO material (id, diffuse_r, diffuse_g, diffuse_b, dissolve, roughness, metallic,
                           diffuse_texname, alpha_texname, normal_texname, metallic_texname, roughness_texname)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)";

pub const INSERT_SHAPE: &str =
    "INSERT INTO shape (id, instance_id, geometry_id, material_id, matrix, min_x, min_y, min_z, max_x, max_y, max_z)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)";

pub const INSERT_GEOMETRY: &str =
    "INSERT INTO geometry (id, hashcode, geometry_type, data) VALUES (?1, ?2, ?3, ?4)";

pub const INSERT_MESH: &str =
    "INSERT INTO mesh (id, geometry_id, triangle_count, data, min_x, min_y, min_z, max_x, max_y, max_z)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)";

pub const SELECT_INSTANCE_BBOX: &str =
    "SELECT min_x, min_y, min_z, max_x, max_y, max_z FROM instance WHERE id = ?1";

pub const SELECT_MODEL_BBOX: &str =
    "SELECT min_x, min_y, min_z, max_x, max_y, max_z FROM model WHERE id = ?1";

pub const UPDATE_INSTANCE_BBOX: &str =
    "UPDATE instance SET min_x = ?2, min_y = ?3, min_z = ?4, max_x = ?5, max_y = ?6, max_z = ?7
     WHERE id = ?1";

pub const UPDATE_MODEL_BBOX: &str =
    "UPDATE model SET min_x = ?2, min_y = ?3, min_z = ?4, max_x = ?5, max_y = ?6, max_z = ?7
     WHERE id = ?1";

/// Every statement the engine keeps in its statement cache
pub const ROW_STATEMENTS: &[&str] = &[
    INSERT_MODEL,
    INSERT_INSTANCE,
    INSERT_ASSOCIATION,
    INSERT_MATERIAL,
    INSERT_SHAPE,
    INSERT_GEOMETRY,
    INSERT_MESH,
    SELECT_INSTANCE_BBOX,
    SELECT_MODEL_BBOX,
    UPDATE_INSTANCE_BBOX,
    UPDATE_MODEL_BBOX,
];

/// Indexes built once the bulk load is done
const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_association_parent ON association(parent_id)",
    "CREATE INDEX IF NOT EXISTS idx_association_child ON association(child_id)",
    "CREATE INDEX IF NOT EXISTS idx_instance_class ON instance(class_id)",
    "CREATE INDEX IF NOT EXISTS idx_shape_instance ON shape(instance_id)",
    "CREATE INDEX IF NOT EXISTS idx_shape_material ON shape(material_id)",
    "CREATE INDEX IF NOT EXISTS idx_mesh_geometry ON mesh(geometry_id)",
];

/// SQLite pragmas for read-optimized queries (applied after the load completes)
const READ_PRAGMAS: &str = r#"
PRAGMA synchronous = FULL;
PRAGMA locking_mode = NORMAL;
"#;

/// Build the write pragmas for `options`.
///
/// `page_size` must come before `journal_mode`: a database in WAL mode can no
/// longer change its page size.
pub fn write_pragmas(options: &EngineOptions) -> String {
    let mut sql = String::new();
    let _ = writeln!(sql, "PRAGMA page_size = {};", options.page_size);
    let _ = writeln!(sql, "PRAGMA auto_vacuum = NONE;");
    let _ = writeln!(sql, "PRAGMA journal_mode = {};", options.journal_mode.as_pragma());
    let _ = writeln!(sql, "PRAGMA synchronous = {};", options.synchronous.as_pragma());
    let _ = writeln!(sql, "PRAGMA cache_size = -{};", options.cache_size_kib);
    let _ = writeln!(sql, "PRAGMA temp_store = MEMORY;");
    let _ = writeln!(sql, "PRAGMA mmap_size = {};", options.mmap_size);
    if options.exclusive_locking {
        let _ = writeln!(sql, "PRAGMA locking_mode = EXCLUSIVE;");
    }
    if options.journal_mode == JournalMode::Wal {
        let _ = writeln!(sql, "PRAGMA wal_autocheckpoint = {};", options.wal_autocheckpoint);
    }
    let _ = writeln!(sql, "PRAGMA journal_size_limit = {};", options.journal_size_limit);
    sql
}

/// Create and configure a new database for writing
pub fn create_database(conn: &Connection, options: &EngineOptions) -> DbResult<()> {
    conn.execute_batch(&write_pragmas(options))?;

    for sql in CREATE_TABLES {
        conn.execute(sql, [])?;
    }

    conn.execute(
        "INSERT OR IGNORE INTO association_type (id, name, description, source_role, target_role)
         VALUES (?1, 'tree', 'Structural hierarchy', 'parent', 'child')",
        [TREE_ASSOCIATION_ID],
    )?;

    Ok(())
}

/// Create indexes (called after the load for better insert performance)
pub fn create_indexes(conn: &Connection) -> DbResult<()> {
    for sql in CREATE_INDEXES {
        conn.execute(sql, [])?;
    }
    Ok(())
}

/// Apply read-optimized settings
pub fn optimize_for_reads(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(READ_PRAGMAS)?;

    // Run ANALYZE to update statistics for query planner
    conn.execute("ANALYZE", [])?;

    Ok(())
}

/// Store a project setting
pub fn set_setting(conn: &Connection, key: &str, value: &str) -> DbResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO project_settings (key, value) VALUES (?1, ?2)",
        [key, value],
    )?;
    Ok(())
}

/// Get a project setting
pub fn get_setting(conn: &Connection, key: &str) -> DbResult<Option<String>> {
    let result = conn.query_row(
        "SELECT value FROM project_settings WHERE key = ?1",
        [key],
        |row| row.get(0),
    );

    match result {
        Ok(value) => Ok(Some(value)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Project setting keys written by the exporter
pub mod keys {
    /// Tells viewers that geometry and mesh blobs are stored in the file
    pub const STORE_GEOMETRY_INFO: &str = "StoreGeometryInfo";

    /// Random per-run identifier consumers use to detect a new file
    pub const SIGNATURE_CODE: &str = "SignatureCode";

    /// Random per-run identifier for viewer-side caches
    pub const CACHE_GUID: &str = "cacheguid";

    /// Display name (output stem)
    pub const NAME: &str = "name";

    /// Display context (output stem)
    pub const CONTEXT: &str = "context";

    /// Schema version
    pub const SCHEMA_VERSION: &str = "schema_version";

    /// Exporter version
    pub const EXPORTER_VERSION: &str = "exporter_version";

    /// Timestamp when the export started (RFC 3339)
    pub const CREATED_AT: &str = "created_at";
}
