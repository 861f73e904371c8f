//! ewc-export - Plant Scene Graph Export to SQLite
//!
//! Writes an in-memory plant scene graph (files, models, groups and their
//! primitive shapes) into a single SQLite file that viewers load
//! interactively. Designed for scenes with tens of millions of shapes.
//!
//! # Features
//!
//! - **Deterministic Ids**: A single depth-first walk assigns dense,
//!   monotonically increasing ids to instances, shapes and materials.
//!
//! - **Material Deduplication**: Shapes sharing a color and transparency
//!   share one material row.
//!
//! - **Compact Blobs**: Parametric primitives are stored as small tagged
//!   binary records; triangulated meshes use a versioned mesh format.
//!
//! - **Bulk Loading**: Prepared statements, one long transaction (or
//!   threshold commits), deferred index creation and write-tuned pragmas.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    SceneGraph (arena)                            │
//! │          File ─► Model ─► Group ─► Geometry                      │
//! └─────────────────────────────┬───────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Walker                                   │
//! │  extend_bounds (bottom-up)   walk_scene (pre-order, ids)         │
//! │                              MaterialCache, GeometryEncoder      │
//! └─────────────────────────────┬───────────────────────────────────┘
//!                               │ RowSink
//!                               ▼
//!            ┌──────────────────────────────────────┐
//!            │    StorageEngine                     │
//!            │  - prepared statements               │
//!            │  - batched commits                   │
//!            │  (optionally on a BatchedWriter      │
//!            │   thread)                            │
//!            └──────────────────┬───────────────────┘
//!                               │
//!                               ▼
//!                    ┌──────────────────┐
//!                    │   plant.ewc      │
//!                    └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use ewc_export::scene::{BoxShape, Geometry, NodeKind, Primitive, SceneGraph};
//! use ewc_export::{export_scene, ExportConfig};
//!
//! let mut graph = SceneGraph::new();
//! let file = graph.add_root(NodeKind::File, "/data/plant.rvm");
//! let model = graph.add_child(file, NodeKind::Model, "SITE");
//! let group = graph.add_child(model, NodeKind::Group, "/EQUI-1");
//! graph.add_geometry(group, Geometry::new(Primitive::Box(BoxShape { lengths: [1.0; 3] })));
//!
//! let summary = export_scene(&mut graph, &ExportConfig::new("/tmp/plant"))?;
//! println!("{} shapes in {}", summary.shapes, summary.path.display());
//! # Ok::<(), ewc_export::ExportError>(())
//! ```

pub mod codec;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod material;
pub mod pipeline;
pub mod progress;
pub mod scene;
pub mod tessellate;
pub mod walker;

pub use config::{CollisionPolicy, EngineOptions, ExportConfig, JournalMode, SyncMode};
pub use error::{CodecError, ConfigError, DbError, ExportError, Result};
pub use pipeline::{export_scene, export_scene_with, ExportSummary};
pub use tessellate::Tessellator;
