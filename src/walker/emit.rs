//! Emitting pass: depth-first walk that assigns ids and writes rows
//!
//! Pre-order: a node's own rows are written before its children's, and
//! every child receives its parent's freshly assigned id. File nodes become
//! model rows; model and group nodes become instance rows linked to their
//! parent; each geometry of a group becomes a shape, a geometry blob and a
//! mesh. Any sink error stops the walk.

use crate::codec::{GeometryEncoder, MeshEncoder};
use crate::db::schema::{COMPONENT_CLASS_ID, SHAPE_CLASS_ID, TREE_ASSOCIATION_ID};
use crate::db::{AssociationRow, GeometryRow, InstanceRow, MeshRow, ModelRow, RowSink, ShapeRow};
use crate::error::Result;
use crate::material::{Material, MaterialCache};
use crate::progress::ProgressTracker;
use crate::scene::{BBox3, Geometry, Mat3x4, Node, NodeId, NodeKind, PrimitiveKind, SceneGraph};
use crate::tessellate::Tessellator;
use std::borrow::Cow;
use std::path::Path;
use tracing::debug;

/// Walk behavior switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkOptions {
    /// Give every shape its own instance row under its group
    pub shape_instances: bool,
    /// Write instance and model rows without bounds, then patch them
    pub defer_instance_bounds: bool,
}

/// Run-scoped id counters. Models and instances share one sequence so that
/// association parent ids are unambiguous.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdAllocator {
    instance: i64,
    shape: i64,
}

impl IdAllocator {
    pub fn next_instance(&mut self) -> i64 {
        self.instance += 1;
        self.instance
    }

    pub fn next_shape(&mut self) -> i64 {
        self.shape += 1;
        self.shape
    }

    pub fn last_instance(&self) -> i64 {
        self.instance
    }

    pub fn last_shape(&self) -> i64 {
        self.shape
    }
}

/// Rows written by a walk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportStats {
    pub models: u64,
    pub instances: u64,
    pub shapes: u64,
    pub materials: u64,
    pub skipped_lines: u64,
    pub tessellated: u64,
}

impl ExportStats {
    pub fn is_empty(&self) -> bool {
        self.models == 0 && self.instances == 0 && self.shapes == 0
    }
}

/// Everything the walk mutates besides the sink
pub struct ExportContext<'t> {
    ids: IdAllocator,
    materials: MaterialCache,
    encoder: GeometryEncoder,
    mesh_encoder: MeshEncoder,
    progress: ProgressTracker,
    options: WalkOptions,
    tessellator: Option<&'t dyn Tessellator>,
    stats: ExportStats,
}

impl<'t> ExportContext<'t> {
    pub fn new(options: WalkOptions, progress: ProgressTracker) -> Self {
        Self {
            ids: IdAllocator::default(),
            materials: MaterialCache::new(),
            encoder: GeometryEncoder::new(),
            mesh_encoder: MeshEncoder::new(),
            progress,
            options,
            tessellator: None,
            stats: ExportStats::default(),
        }
    }

    /// Tessellate geometries that arrive without a triangulation
    pub fn with_tessellator(mut self, tessellator: &'t dyn Tessellator) -> Self {
        self.tessellator = Some(tessellator);
        self
    }

    pub fn ids(&self) -> IdAllocator {
        self.ids
    }

    pub fn stats(&self) -> ExportStats {
        self.stats
    }

    pub fn finish(self) -> ExportStats {
        self.progress.finish();
        self.stats
    }
}

/// Walk the whole graph from its roots
pub fn walk_scene<S: RowSink + ?Sized>(
    ctx: &mut ExportContext<'_>,
    sink: &mut S,
    graph: &SceneGraph,
) -> Result<()> {
    process_children(ctx, sink, graph, graph.roots(), 0, 0)
}

pub fn process_children<S: RowSink + ?Sized>(
    ctx: &mut ExportContext<'_>,
    sink: &mut S,
    graph: &SceneGraph,
    children: &[NodeId],
    level: usize,
    parent_id: i64,
) -> Result<()> {
    for &child in children {
        process_node(ctx, sink, graph, child, level, parent_id)?;
    }
    Ok(())
}

pub fn process_node<S: RowSink + ?Sized>(
    ctx: &mut ExportContext<'_>,
    sink: &mut S,
    graph: &SceneGraph,
    id: NodeId,
    level: usize,
    parent_id: i64,
) -> Result<()> {
    let node = graph.node(id);

    let node_id = match node.kind {
        NodeKind::File => emit_model(ctx, sink, node)?,
        NodeKind::Model | NodeKind::Group => {
            let node_id = emit_instance(
                ctx,
                sink,
                &node.name,
                COMPONENT_CLASS_ID,
                node.bbox_world.non_empty(),
                parent_id,
            )?;
            for (index, &geo) in node.geometries.iter().enumerate() {
                emit_shape(ctx, sink, graph.geometry(geo), index, &node.name, node_id)?;
            }
            node_id
        }
    };

    process_children(ctx, sink, graph, &node.children, level + 1, node_id)
}

fn emit_model<S: RowSink + ?Sized>(
    ctx: &mut ExportContext<'_>,
    sink: &mut S,
    node: &Node,
) -> Result<i64> {
    let id = ctx.ids.next_instance();
    let name = Path::new(&node.name)
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or(Cow::Borrowed(node.name.as_str()));
    let bbox = node.bbox_world.non_empty();

    sink.add_model(&ModelRow {
        id,
        name: &name,
        bbox: if ctx.options.defer_instance_bounds { None } else { bbox },
    })?;
    if let (true, Some(b)) = (ctx.options.defer_instance_bounds, bbox) {
        sink.update_bounding_box(id, &b)?;
    }

    debug!("Model {} '{}'", id, name);
    ctx.stats.models += 1;
    Ok(id)
}

fn emit_instance<S: RowSink + ?Sized>(
    ctx: &mut ExportContext<'_>,
    sink: &mut S,
    name: &str,
    class_id: i64,
    bbox: Option<BBox3>,
    parent_id: i64,
) -> Result<i64> {
    let id = ctx.ids.next_instance();
    let deferred = ctx.options.defer_instance_bounds;

    sink.add_instance(&InstanceRow {
        id,
        class_id,
        name,
        significant: name.starts_with('/'),
        bbox: if deferred { None } else { bbox },
    })?;
    if let (true, Some(b)) = (deferred, bbox) {
        sink.update_bounding_box(id, &b)?;
    }
    sink.add_association(&AssociationRow {
        parent_id,
        child_id: id,
        asso_type: TREE_ASSOCIATION_ID,
    })?;

    ctx.stats.instances += 1;
    Ok(id)
}

fn emit_shape<S: RowSink + ?Sized>(
    ctx: &mut ExportContext<'_>,
    sink: &mut S,
    geometry: &Geometry,
    index: usize,
    owner_name: &str,
    owner_id: i64,
) -> Result<()> {
    let kind = geometry.kind();
    if kind == PrimitiveKind::Line {
        ctx.stats.skipped_lines += 1;
        return Ok(());
    }

    let (material_id, created) = ctx
        .materials
        .get_or_create(geometry.color, geometry.transparency);
    if created {
        sink.add_material(&Material::from_color(
            material_id,
            geometry.color,
            geometry.transparency,
        ))?;
        ctx.stats.materials += 1;
    }

    let instance_id = if ctx.options.shape_instances {
        let name = format!("{} {} of {}", kind, index + 1, owner_name);
        emit_instance(
            ctx,
            sink,
            &name,
            SHAPE_CLASS_ID,
            geometry.bbox_world.non_empty(),
            owner_id,
        )?
    } else {
        owner_id
    };

    let shape_id = ctx.ids.next_shape();
    let matrix = matrix_string(&geometry.transform);
    sink.add_shape(&ShapeRow {
        id: shape_id,
        instance_id,
        geometry_id: shape_id,
        material_id,
        bbox: geometry.bbox_world.non_empty(),
        matrix: &matrix,
    })?;

    let data = ctx.encoder.encode(geometry)?;
    sink.add_geometry(&GeometryRow {
        id: shape_id,
        hashcode: shape_id,
        geometry_type: kind.tag(),
        data,
    })?;

    let tessellated = match (&geometry.triangulation, ctx.tessellator) {
        (None, Some(t)) => t.tessellate(geometry, geometry.transform.scale()),
        _ => None,
    };
    if tessellated.is_some() {
        ctx.stats.tessellated += 1;
    }
    let (triangle_count, data): (u32, &[u8]) =
        match geometry.triangulation.as_ref().or(tessellated.as_ref()) {
            Some(t) => (t.triangle_count() as u32, ctx.mesh_encoder.encode(t)),
            None => (geometry.primitive.nominal_triangle_count().unwrap_or(0), &[][..]),
        };
    sink.add_mesh(&MeshRow {
        id: shape_id,
        geometry_id: shape_id,
        triangle_count,
        bbox: geometry.bbox_local.non_empty(),
        data,
    })?;

    ctx.stats.shapes += 1;
    ctx.progress.tick();
    Ok(())
}

/// Row-major text form of a transform, `[m00,m01,...,m23,0,0,0,1]`.
/// The identity is written as an empty string.
pub fn matrix_string(m: &Mat3x4) -> String {
    if m.is_identity() {
        return String::new();
    }

    let mut out = String::with_capacity(160);
    out.push('[');
    for row in 0..3 {
        for col in 0..4 {
            out.push_str(&format_real(m.at(row, col)));
            out.push(',');
        }
    }
    out.push_str("0,0,0,1]");
    out
}

/// Fixed 15-decimal rendering with trailing zeros removed
fn format_real(v: f32) -> String {
    if v == 0.0 {
        return "0".to_string();
    }
    let s = format!("{:.15}", v as f64);
    let trimmed = s.trim_end_matches('0').trim_end_matches('.');
    trimmed.to_string()
}
