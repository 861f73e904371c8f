//! Geometry records attached to group nodes
//!
//! Each geometry is one parametric primitive placed in the world by a 3x4
//! transform, with a color, a transparency percentage and an optional
//! triangulation computed upstream.

use super::math::{BBox3, Mat3x4};

/// Offset added to the kind index to form the persisted geometry type and
/// the blob tag.
pub const KIND_TAG_BASE: u32 = 100;

/// Primitive kind, in persisted index order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum PrimitiveKind {
    Pyramid = 0,
    Box = 1,
    RectangularTorus = 2,
    CircularTorus = 3,
    EllipticalDish = 4,
    SphericalDish = 5,
    Snout = 6,
    Cylinder = 7,
    Sphere = 8,
    Line = 9,
    FacetGroup = 10,
}

impl PrimitiveKind {
    pub const ALL: [PrimitiveKind; 11] = [
        PrimitiveKind::Pyramid,
        PrimitiveKind::Box,
        PrimitiveKind::RectangularTorus,
        PrimitiveKind::CircularTorus,
        PrimitiveKind::EllipticalDish,
        PrimitiveKind::SphericalDish,
        PrimitiveKind::Snout,
        PrimitiveKind::Cylinder,
        PrimitiveKind::Sphere,
        PrimitiveKind::Line,
        PrimitiveKind::FacetGroup,
    ];

    pub fn index(self) -> u32 {
        self as u32
    }

    pub fn from_index(index: u32) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    /// Persisted geometry type and blob tag
    pub fn tag(self) -> u32 {
        self.index() + KIND_TAG_BASE
    }

    pub fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Pyramid => "Pyramid",
            PrimitiveKind::Box => "Box",
            PrimitiveKind::RectangularTorus => "RectangularTorus",
            PrimitiveKind::CircularTorus => "CircularTorus",
            PrimitiveKind::EllipticalDish => "EllipticalDish",
            PrimitiveKind::SphericalDish => "SphericalDish",
            PrimitiveKind::Snout => "Snout",
            PrimitiveKind::Cylinder => "Cylinder",
            PrimitiveKind::Sphere => "Sphere",
            PrimitiveKind::Line => "Line",
            PrimitiveKind::FacetGroup => "FacetGroup",
        }
    }

    /// Kinds whose blob carries the transform scale and sample start angle
    pub fn has_sampling(self) -> bool {
        !matches!(
            self,
            PrimitiveKind::Pyramid
                | PrimitiveKind::Box
                | PrimitiveKind::Line
                | PrimitiveKind::FacetGroup
        )
    }
}

impl std::fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pyramid {
    pub bottom: [f32; 2],
    pub top: [f32; 2],
    pub offset: [f32; 2],
    pub height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoxShape {
    pub lengths: [f32; 3],
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RectangularTorus {
    pub inner_radius: f32,
    pub outer_radius: f32,
    pub height: f32,
    pub angle: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CircularTorus {
    pub offset: f32,
    pub radius: f32,
    pub angle: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Dish {
    pub base_radius: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Snout {
    pub offset: [f32; 2],
    pub bshear: [f32; 2],
    pub tshear: [f32; 2],
    pub radius_b: f32,
    pub radius_t: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Cylinder {
    pub radius: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Sphere {
    pub diameter: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Line {
    pub a: f32,
    pub b: f32,
}

/// One closed loop of a facet polygon. `vertices` and `normals` are flat
/// xyz triples of equal length.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Contour {
    pub vertices: Vec<f32>,
    pub normals: Vec<f32>,
}

impl Contour {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / 3
    }
}

/// Outer contour first, holes after
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Polygon {
    pub contours: Vec<Contour>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FacetGroup {
    pub polygons: Vec<Polygon>,
}

/// Parametric payload of a geometry
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Pyramid(Pyramid),
    Box(BoxShape),
    RectangularTorus(RectangularTorus),
    CircularTorus(CircularTorus),
    EllipticalDish(Dish),
    SphericalDish(Dish),
    Snout(Snout),
    Cylinder(Cylinder),
    Sphere(Sphere),
    Line(Line),
    FacetGroup(FacetGroup),
}

impl Primitive {
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            Primitive::Pyramid(_) => PrimitiveKind::Pyramid,
            Primitive::Box(_) => PrimitiveKind::Box,
            Primitive::RectangularTorus(_) => PrimitiveKind::RectangularTorus,
            Primitive::CircularTorus(_) => PrimitiveKind::CircularTorus,
            Primitive::EllipticalDish(_) => PrimitiveKind::EllipticalDish,
            Primitive::SphericalDish(_) => PrimitiveKind::SphericalDish,
            Primitive::Snout(_) => PrimitiveKind::Snout,
            Primitive::Cylinder(_) => PrimitiveKind::Cylinder,
            Primitive::Sphere(_) => PrimitiveKind::Sphere,
            Primitive::Line(_) => PrimitiveKind::Line,
            Primitive::FacetGroup(_) => PrimitiveKind::FacetGroup,
        }
    }

    /// Triangle count that needs no tessellation: boxes and pyramids are
    /// always 12 triangles, and a facet polygon with `v` vertices over `c`
    /// contours triangulates into `v + 2(c - 1) - 2` triangles. Curved kinds
    /// depend on the tessellation tolerance and return `None`.
    pub fn nominal_triangle_count(&self) -> Option<u32> {
        match self {
            Primitive::Box(_) | Primitive::Pyramid(_) => Some(12),
            Primitive::FacetGroup(fg) => {
                let total = fg
                    .polygons
                    .iter()
                    .filter(|p| !p.contours.is_empty())
                    .map(|p| {
                        let vertices: usize = p.contours.iter().map(Contour::vertex_count).sum();
                        let holes = p.contours.len() - 1;
                        (vertices + 2 * holes).saturating_sub(2)
                    })
                    .sum::<usize>();
                Some(total as u32)
            }
            _ => None,
        }
    }
}

/// Triangle mesh produced by the tessellator
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Triangulation {
    /// Flat xyz positions
    pub vertices: Vec<f32>,
    /// Flat xyz normals, one per vertex
    pub normals: Vec<f32>,
    /// Three indices per triangle
    pub indices: Vec<u32>,
    /// Maximum deviation from the exact surface
    pub error: f32,
}

impl Triangulation {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / 3
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// A placed primitive
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    pub primitive: Primitive,
    pub transform: Mat3x4,
    pub bbox_local: BBox3,
    pub bbox_world: BBox3,
    /// Packed 0xRRGGBB in the low 24 bits
    pub color: u32,
    /// Percentage, 0 = opaque
    pub transparency: u32,
    pub sample_start_angle: f32,
    pub triangulation: Option<Triangulation>,
}

impl Geometry {
    /// Geometry with identity transform, white, opaque, no triangulation.
    /// Both boxes start empty; callers set them from the source data.
    pub fn new(primitive: Primitive) -> Self {
        Self {
            primitive,
            transform: Mat3x4::IDENTITY,
            bbox_local: BBox3::EMPTY,
            bbox_world: BBox3::EMPTY,
            color: 0x00FF_FFFF,
            transparency: 0,
            sample_start_angle: 0.0,
            triangulation: None,
        }
    }

    pub fn kind(&self) -> PrimitiveKind {
        self.primitive.kind()
    }

    pub fn with_transform(mut self, transform: Mat3x4) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_bounds(mut self, local: BBox3, world: BBox3) -> Self {
        self.bbox_local = local;
        self.bbox_world = world;
        self
    }

    pub fn with_color(mut self, color: u32, transparency: u32) -> Self {
        self.color = color;
        self.transparency = transparency;
        self
    }

    pub fn with_triangulation(mut self, triangulation: Triangulation) -> Self {
        self.triangulation = Some(triangulation);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contour(n: usize) -> Contour {
        Contour {
            vertices: vec![0.0; n * 3],
            normals: vec![0.0; n * 3],
        }
    }

    #[test]
    fn test_kind_tags() {
        assert_eq!(PrimitiveKind::Pyramid.tag(), 100);
        assert_eq!(PrimitiveKind::Box.tag(), 101);
        assert_eq!(PrimitiveKind::FacetGroup.tag(), 110);
        assert_eq!(PrimitiveKind::from_index(9), Some(PrimitiveKind::Line));
        assert_eq!(PrimitiveKind::from_index(11), None);
    }

    #[test]
    fn test_nominal_triangle_counts() {
        let b = Primitive::Box(BoxShape { lengths: [1.0, 1.0, 1.0] });
        assert_eq!(b.nominal_triangle_count(), Some(12));

        let tri = Polygon { contours: vec![contour(3)] };
        let quad = Polygon { contours: vec![contour(4)] };
        let holed = Polygon { contours: vec![contour(4), contour(4)] };
        let fg = Primitive::FacetGroup(FacetGroup {
            polygons: vec![tri, quad, holed],
        });
        assert_eq!(fg.nominal_triangle_count(), Some(1 + 2 + 8));

        let cyl = Primitive::Cylinder(Cylinder { radius: 1.0, height: 2.0 });
        assert_eq!(cyl.nominal_triangle_count(), None);
    }
}
