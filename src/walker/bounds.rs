//! Bottom-up bounding box aggregation
//!
//! A node's world box is the union of its children's boxes and the world
//! boxes of its own geometries. Union is commutative, so the result does not
//! depend on child order.

use crate::scene::{BBox3, NodeId, NodeKind, PrimitiveKind, SceneGraph};

/// What the bounds pass found in the graph
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneCounts {
    /// File nodes
    pub models: u64,
    /// Model and group nodes
    pub instances: u64,
    /// Geometries that will become shape rows (everything but lines)
    pub shapes: u64,
    /// All geometries
    pub geometries: u64,
    /// Union of every root
    pub world: BBox3,
}

impl Default for SceneCounts {
    fn default() -> Self {
        Self {
            models: 0,
            instances: 0,
            shapes: 0,
            geometries: 0,
            world: BBox3::EMPTY,
        }
    }
}

/// Aggregate world boxes for every node and count what will be exported
pub fn extend_bounds(graph: &mut SceneGraph) -> SceneCounts {
    let mut counts = SceneCounts::default();
    for i in 0..graph.roots().len() {
        let root = graph.roots()[i];
        let bbox = extend_node(graph, root, &mut counts);
        counts.world.engulf(&bbox);
    }
    counts
}

fn extend_node(graph: &mut SceneGraph, id: NodeId, counts: &mut SceneCounts) -> BBox3 {
    match graph.node(id).kind {
        NodeKind::File => counts.models += 1,
        NodeKind::Model | NodeKind::Group => counts.instances += 1,
    }

    let mut bbox = BBox3::EMPTY;
    for i in 0..graph.node(id).children.len() {
        let child = graph.node(id).children[i];
        let child_bbox = extend_node(graph, child, counts);
        bbox.engulf(&child_bbox);
    }

    for &geo in &graph.node(id).geometries {
        let geometry = graph.geometry(geo);
        bbox.engulf(&geometry.bbox_world);
        counts.geometries += 1;
        if geometry.kind() != PrimitiveKind::Line {
            counts.shapes += 1;
        }
    }

    graph.set_bbox_world(id, bbox);
    bbox
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Geometry, Line, Primitive, Sphere};

    fn sphere_at(min: [f32; 3], max: [f32; 3]) -> Geometry {
        Geometry::new(Primitive::Sphere(Sphere { diameter: 1.0 }))
            .with_bounds(BBox3::new([-0.5; 3], [0.5; 3]), BBox3::new(min, max))
    }

    fn build(swap: bool) -> (SceneGraph, NodeId, NodeId) {
        let mut graph = SceneGraph::new();
        let file = graph.add_root(NodeKind::File, "plant.rvm");
        let model = graph.add_child(file, NodeKind::Model, "SITE");

        let specs = [
            ([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]),
            ([-4.0, 2.0, 0.5], [-3.0, 3.0, 9.0]),
        ];
        let order: Vec<usize> = if swap { vec![1, 0] } else { vec![0, 1] };
        for i in order {
            let group = graph.add_child(model, NodeKind::Group, format!("/G{}", i));
            let inner = graph.add_child(group, NodeKind::Group, format!("/G{}/A", i));
            graph.add_geometry(inner, sphere_at(specs[i].0, specs[i].1));
        }
        (graph, file, model)
    }

    #[test]
    fn test_depth_three_union() {
        let (mut graph, file, model) = build(false);
        let counts = extend_bounds(&mut graph);

        let expected = BBox3::new([-4.0, 0.0, 0.0], [1.0, 3.0, 9.0]);
        assert_eq!(graph.node(model).bbox_world, expected);
        assert_eq!(graph.node(file).bbox_world, expected);
        assert_eq!(counts.world, expected);
        assert_eq!(counts.models, 1);
        assert_eq!(counts.instances, 5);
        assert_eq!(counts.shapes, 2);
    }

    #[test]
    fn test_child_order_independent() {
        let (mut a, _, model_a) = build(false);
        let (mut b, _, model_b) = build(true);
        extend_bounds(&mut a);
        extend_bounds(&mut b);
        assert_eq!(a.node(model_a).bbox_world, b.node(model_b).bbox_world);
    }

    #[test]
    fn test_lines_bounded_not_counted() {
        let mut graph = SceneGraph::new();
        let file = graph.add_root(NodeKind::File, "lines.rvm");
        let group = graph.add_child(file, NodeKind::Group, "/L");
        graph.add_geometry(
            group,
            Geometry::new(Primitive::Line(Line { a: 0.0, b: 1.0 }))
                .with_bounds(BBox3::EMPTY, BBox3::new([0.0; 3], [1.0; 3])),
        );

        let counts = extend_bounds(&mut graph);
        assert_eq!(counts.geometries, 1);
        assert_eq!(counts.shapes, 0);
        assert_eq!(graph.node(group).bbox_world, BBox3::new([0.0; 3], [1.0; 3]));
    }

    #[test]
    fn test_empty_node_stays_empty() {
        let mut graph = SceneGraph::new();
        let file = graph.add_root(NodeKind::File, "empty.rvm");
        let counts = extend_bounds(&mut graph);
        assert!(graph.node(file).bbox_world.is_empty());
        assert!(counts.world.is_empty());
    }
}
