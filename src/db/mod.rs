//! Storage for exported scenes
//!
//! The walker produces rows; a [`RowSink`] consumes them. Two sinks exist:
//! the [`StorageEngine`] itself, which writes synchronously on the caller's
//! thread, and the [`WriterHandle`] of a [`BatchedWriter`], which forwards
//! rows to an engine running on a dedicated thread.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 Scene walker                        │
//! │  - assigns ids, encodes blobs                       │
//! └─────────────────────┬───────────────────────────────┘
//!                       │ RowSink
//!          ┌────────────┴─────────────┐
//!          ▼                          ▼
//! ┌──────────────────┐     ┌──────────────────────────┐
//! │  StorageEngine   │◄────│  BatchedWriter thread    │
//! │  (same thread)   │     │  (crossbeam bounded)     │
//! └────────┬─────────┘     └──────────────────────────┘
//!          │ prepared statements, batched commits
//!          ▼
//! ┌─────────────────────────────────────────────────────┐
//! │                 SQLite file (.ewc)                  │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod engine;
pub mod schema;
pub mod writer;

pub use engine::{EngineState, EngineStats, StorageEngine};
pub use schema::{keys, SCHEMA_VERSION};
pub use writer::{BatchedWriter, WriterHandle, WriterMessage, WriterStats};

use crate::error::DbResult;
use crate::material::Material;
use crate::scene::BBox3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelRow<'a> {
    pub id: i64,
    pub name: &'a str,
    pub bbox: Option<BBox3>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstanceRow<'a> {
    pub id: i64,
    pub class_id: i64,
    pub name: &'a str,
    pub significant: bool,
    pub bbox: Option<BBox3>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssociationRow {
    pub parent_id: i64,
    pub child_id: i64,
    pub asso_type: i64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeRow<'a> {
    pub id: i64,
    pub instance_id: i64,
    pub geometry_id: i64,
    pub material_id: i64,
    pub bbox: Option<BBox3>,
    /// Empty for the identity transform
    pub matrix: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometryRow<'a> {
    pub id: i64,
    pub hashcode: i64,
    pub geometry_type: u32,
    pub data: &'a [u8],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshRow<'a> {
    pub id: i64,
    pub geometry_id: i64,
    pub triangle_count: u32,
    pub bbox: Option<BBox3>,
    pub data: &'a [u8],
}

/// Destination for exported rows
pub trait RowSink {
    fn add_model(&mut self, row: &ModelRow<'_>) -> DbResult<()>;

    fn add_instance(&mut self, row: &InstanceRow<'_>) -> DbResult<()>;

    fn add_association(&mut self, row: &AssociationRow) -> DbResult<()>;

    fn add_material(&mut self, material: &Material) -> DbResult<()>;

    fn add_shape(&mut self, row: &ShapeRow<'_>) -> DbResult<()>;

    fn add_geometry(&mut self, row: &GeometryRow<'_>) -> DbResult<()>;

    fn add_mesh(&mut self, row: &MeshRow<'_>) -> DbResult<()>;

    /// Set the bounds of an instance or model row written without them
    fn update_bounding_box(&mut self, id: i64, bbox: &BBox3) -> DbResult<()>;
}

/// Flatten an optional box into six nullable columns
pub(crate) fn bbox_columns(bbox: Option<&BBox3>) -> [Option<f64>; 6] {
    match bbox {
        Some(b) => [
            Some(b.min[0] as f64),
            Some(b.min[1] as f64),
            Some(b.min[2] as f64),
            Some(b.max[0] as f64),
            Some(b.max[1] as f64),
            Some(b.max[2] as f64),
        ],
        None => [None; 6],
    }
}
