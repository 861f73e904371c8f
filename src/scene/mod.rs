//! In-memory plant scene graph
//!
//! The graph is an arena: nodes and geometries live in two vectors owned by
//! [`SceneGraph`] and refer to each other through [`NodeId`] and
//! [`GeometryId`] handles. A parser builds it top-down with [`SceneGraph::add_root`],
//! [`SceneGraph::add_child`] and [`SceneGraph::add_geometry`]; the exporter
//! only ever writes back each node's aggregated world bounding box.
//!
//! ```text
//! File ──► Model ──► Group ──► Group ...
//!                      │
//!                      └──► Geometry, Geometry, ...
//! ```

pub mod geometry;
pub mod math;

pub use geometry::{
    BoxShape, CircularTorus, Contour, Cylinder, Dish, FacetGroup, Geometry, Line, Polygon,
    Primitive, PrimitiveKind, Pyramid, RectangularTorus, Snout, Sphere, Triangulation,
};
pub use math::{BBox3, Mat3x4};

/// Handle to a node in a [`SceneGraph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

/// Handle to a geometry in a [`SceneGraph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeometryId(pub(crate) usize);

/// Node level in the plant hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// One source file; `name` holds its path
    File,
    /// A model (site or project) inside a file
    Model,
    /// Any structural group below a model; only groups carry geometry
    Group,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub name: String,
    pub bbox_world: BBox3,
    pub children: Vec<NodeId>,
    pub geometries: Vec<GeometryId>,
}

impl Node {
    fn new(kind: NodeKind, name: String) -> Self {
        Self {
            kind,
            name,
            bbox_world: BBox3::EMPTY,
            children: Vec::new(),
            geometries: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SceneGraph {
    nodes: Vec<Node>,
    geometries: Vec<Geometry>,
    roots: Vec<NodeId>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_root(&mut self, kind: NodeKind, name: impl Into<String>) -> NodeId {
        let id = self.push_node(kind, name.into());
        self.roots.push(id);
        id
    }

    pub fn add_child(&mut self, parent: NodeId, kind: NodeKind, name: impl Into<String>) -> NodeId {
        let id = self.push_node(kind, name.into());
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn add_geometry(&mut self, owner: NodeId, geometry: Geometry) -> GeometryId {
        let id = GeometryId(self.geometries.len());
        self.geometries.push(geometry);
        self.nodes[owner.0].geometries.push(id);
        id
    }

    fn push_node(&mut self, kind: NodeKind, name: String) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::new(kind, name));
        id
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn geometry(&self, id: GeometryId) -> &Geometry {
        &self.geometries[id.0]
    }

    pub(crate) fn set_bbox_world(&mut self, id: NodeId, bbox: BBox3) {
        self.nodes[id.0].bbox_world = bbox;
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn geometry_count(&self) -> usize {
        self.geometries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}
