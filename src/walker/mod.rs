//! Scene walker
//!
//! Two passes over the scene graph:
//!
//! 1. [`extend_bounds`] visits every node bottom-up, stores each node's
//!    aggregated world box and counts what the export will produce.
//! 2. [`walk_scene`] visits it again top-down, assigning ids and handing
//!    rows to a [`RowSink`](crate::db::RowSink).
//!
//! Both passes are sequential; ids depend only on traversal order.

pub mod bounds;
pub mod emit;

pub use bounds::{extend_bounds, SceneCounts};
pub use emit::{
    matrix_string, process_children, process_node, walk_scene, ExportContext, ExportStats,
    IdAllocator, WalkOptions,
};
