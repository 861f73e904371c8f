//! Parametric geometry blob codec
//!
//! Layout (native endianness):
//!
//! ```text
//! u32 tag (kind index + 100)
//! Pyramid, Box         parametric fields
//! curved kinds         parametric fields, f32 scale, f32 sample start angle
//! FacetGroup           u32 polygons { u32 contours { u32 n, 3n f32 pos, 3n f32 nrm } }
//! ```
//!
//! Line has no blob form.

use super::cursor::{ByteReader, ByteWriter};
use crate::error::{CodecError, CodecResult};
use crate::scene::geometry::KIND_TAG_BASE;
use crate::scene::{
    BoxShape, CircularTorus, Contour, Cylinder, Dish, FacetGroup, Geometry, Polygon, Primitive,
    PrimitiveKind, Pyramid, RectangularTorus, Snout, Sphere,
};

/// Initial scratch capacity of a [`GeometryEncoder`]
pub const DEFAULT_SCRATCH_CAPACITY: usize = 64 * 1024;

/// Result of decoding a blob.
///
/// `scale` and `sample_start_angle` are only present in the blob for curved
/// kinds; for the others they come back as `1.0` and `0.0`.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedGeometry {
    pub primitive: Primitive,
    pub scale: f32,
    pub sample_start_angle: f32,
}

/// Reusable encoder that owns one scratch buffer.
///
/// The buffer's capacity grows to the largest record seen and is never
/// released, so encoding millions of small records does not allocate.
#[derive(Debug)]
pub struct GeometryEncoder {
    scratch: Vec<u8>,
}

impl GeometryEncoder {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_SCRATCH_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            scratch: Vec::with_capacity(capacity),
        }
    }

    /// Encode `geometry`; the returned bytes are valid until the next call
    pub fn encode(&mut self, geometry: &Geometry) -> CodecResult<&[u8]> {
        self.scratch.clear();
        encode_primitive(
            &mut self.scratch,
            &geometry.primitive,
            geometry.transform.scale(),
            geometry.sample_start_angle,
        )?;
        Ok(&self.scratch)
    }

    pub fn capacity(&self) -> usize {
        self.scratch.capacity()
    }
}

impl Default for GeometryEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Byte length of a fixed-layout record, `None` for variable or unsupported kinds
pub fn fixed_len(kind: PrimitiveKind) -> Option<usize> {
    let fields = match kind {
        PrimitiveKind::Pyramid => 7,
        PrimitiveKind::Box => 3,
        PrimitiveKind::RectangularTorus => 4,
        PrimitiveKind::CircularTorus => 3,
        PrimitiveKind::EllipticalDish | PrimitiveKind::SphericalDish => 2,
        PrimitiveKind::Snout => 9,
        PrimitiveKind::Cylinder => 2,
        PrimitiveKind::Sphere => 1,
        PrimitiveKind::Line | PrimitiveKind::FacetGroup => return None,
    };
    let sampling = if kind.has_sampling() { 2 } else { 0 };
    Some(4 + 4 * (fields + sampling))
}

/// Exact encoded size of `primitive`
pub fn encoded_len(primitive: &Primitive) -> CodecResult<usize> {
    match primitive {
        Primitive::Line(_) => Err(CodecError::Unsupported(PrimitiveKind::Line.name())),
        Primitive::FacetGroup(fg) => {
            let mut len = 8;
            for polygon in &fg.polygons {
                len += 4;
                for contour in &polygon.contours {
                    check_contour(contour)?;
                    len += 4 + 24 * contour.vertex_count();
                }
            }
            Ok(len)
        }
        other => fixed_len(other.kind()).ok_or(CodecError::Unsupported(other.kind().name())),
    }
}

/// A contour must carry whole position triples and one normal per position
fn check_contour(contour: &Contour) -> CodecResult<()> {
    let (vertices, normals) = (contour.vertices.len(), contour.normals.len());
    if vertices % 3 != 0 || normals != vertices {
        return Err(CodecError::MalformedContour { vertices, normals });
    }
    Ok(())
}

/// Append the blob for `primitive` to `buf`.
///
/// Nothing is appended when the primitive cannot be encoded.
pub fn encode_primitive(
    buf: &mut Vec<u8>,
    primitive: &Primitive,
    scale: f32,
    sample_start_angle: f32,
) -> CodecResult<()> {
    buf.reserve(encoded_len(primitive)?);
    let kind = primitive.kind();
    let mut w = ByteWriter::new(buf);
    w.write_u32(kind.tag());

    match primitive {
        Primitive::Pyramid(p) => {
            w.write_f32s(&p.bottom);
            w.write_f32s(&p.top);
            w.write_f32s(&p.offset);
            w.write_f32(p.height);
        }
        Primitive::Box(b) => w.write_f32s(&b.lengths),
        Primitive::RectangularTorus(t) => {
            w.write_f32s(&[t.inner_radius, t.outer_radius, t.height, t.angle]);
        }
        Primitive::CircularTorus(t) => w.write_f32s(&[t.offset, t.radius, t.angle]),
        Primitive::EllipticalDish(d) | Primitive::SphericalDish(d) => {
            w.write_f32s(&[d.base_radius, d.height]);
        }
        Primitive::Snout(s) => {
            w.write_f32s(&s.offset);
            w.write_f32s(&s.bshear);
            w.write_f32s(&s.tshear);
            w.write_f32s(&[s.radius_b, s.radius_t, s.height]);
        }
        Primitive::Cylinder(c) => w.write_f32s(&[c.radius, c.height]),
        Primitive::Sphere(s) => w.write_f32(s.diameter),
        Primitive::Line(_) => return Err(CodecError::Unsupported(kind.name())),
        Primitive::FacetGroup(fg) => {
            w.write_u32(fg.polygons.len() as u32);
            for polygon in &fg.polygons {
                w.write_u32(polygon.contours.len() as u32);
                for contour in &polygon.contours {
                    w.write_u32(contour.vertex_count() as u32);
                    w.write_f32s(&contour.vertices);
                    w.write_f32s(&contour.normals);
                }
            }
        }
    }

    if kind.has_sampling() {
        w.write_f32(scale);
        w.write_f32(sample_start_angle);
    }
    Ok(())
}

/// Decode a blob produced by [`encode_primitive`]
pub fn decode_geometry(bytes: &[u8]) -> CodecResult<DecodedGeometry> {
    if bytes.len() < 4 {
        return Err(CodecError::MissingTag { len: bytes.len() });
    }

    let mut r = ByteReader::new(bytes);
    let tag = r.read_u32()?;
    let kind = tag
        .checked_sub(KIND_TAG_BASE)
        .and_then(PrimitiveKind::from_index)
        .ok_or(CodecError::InvalidTag(tag))?;

    if kind == PrimitiveKind::Line {
        return Err(CodecError::Unsupported(kind.name()));
    }
    if let Some(expected) = fixed_len(kind) {
        if bytes.len() != expected {
            return Err(CodecError::SizeMismatch {
                kind: kind.name(),
                expected,
                actual: bytes.len(),
            });
        }
    }

    let primitive = match kind {
        PrimitiveKind::Pyramid => {
            let [b0, b1, t0, t1, o0, o1, height] = r.read_f32_array::<7>()?;
            Primitive::Pyramid(Pyramid {
                bottom: [b0, b1],
                top: [t0, t1],
                offset: [o0, o1],
                height,
            })
        }
        PrimitiveKind::Box => Primitive::Box(BoxShape {
            lengths: r.read_f32_array::<3>()?,
        }),
        PrimitiveKind::RectangularTorus => {
            let [inner_radius, outer_radius, height, angle] = r.read_f32_array::<4>()?;
            Primitive::RectangularTorus(RectangularTorus {
                inner_radius,
                outer_radius,
                height,
                angle,
            })
        }
        PrimitiveKind::CircularTorus => {
            let [offset, radius, angle] = r.read_f32_array::<3>()?;
            Primitive::CircularTorus(CircularTorus { offset, radius, angle })
        }
        PrimitiveKind::EllipticalDish => Primitive::EllipticalDish(read_dish(&mut r)?),
        PrimitiveKind::SphericalDish => Primitive::SphericalDish(read_dish(&mut r)?),
        PrimitiveKind::Snout => {
            let [o0, o1, b0, b1, t0, t1, radius_b, radius_t, height] = r.read_f32_array::<9>()?;
            Primitive::Snout(Snout {
                offset: [o0, o1],
                bshear: [b0, b1],
                tshear: [t0, t1],
                radius_b,
                radius_t,
                height,
            })
        }
        PrimitiveKind::Cylinder => {
            let [radius, height] = r.read_f32_array::<2>()?;
            Primitive::Cylinder(Cylinder { radius, height })
        }
        PrimitiveKind::Sphere => Primitive::Sphere(Sphere {
            diameter: r.read_f32()?,
        }),
        PrimitiveKind::FacetGroup => Primitive::FacetGroup(read_facet_group(&mut r)?),
        PrimitiveKind::Line => return Err(CodecError::Unsupported(kind.name())),
    };

    let (scale, sample_start_angle) = if kind.has_sampling() {
        (r.read_f32()?, r.read_f32()?)
    } else {
        (1.0, 0.0)
    };

    r.finish()?;

    Ok(DecodedGeometry {
        primitive,
        scale,
        sample_start_angle,
    })
}

fn read_dish(r: &mut ByteReader<'_>) -> CodecResult<Dish> {
    let [base_radius, height] = r.read_f32_array::<2>()?;
    Ok(Dish { base_radius, height })
}

fn read_facet_group(r: &mut ByteReader<'_>) -> CodecResult<FacetGroup> {
    let polygon_count = r.read_u32()?;
    r.check_count(polygon_count, 4)?;

    let mut polygons = Vec::with_capacity(polygon_count as usize);
    for _ in 0..polygon_count {
        let contour_count = r.read_u32()?;
        r.check_count(contour_count, 4)?;

        let mut contours = Vec::with_capacity(contour_count as usize);
        for _ in 0..contour_count {
            let vertex_count = r.read_u32()?;
            r.check_count(vertex_count, 24)?;

            let n = vertex_count as usize * 3;
            let vertices = r.read_f32_vec(n)?;
            let normals = r.read_f32_vec(n)?;
            contours.push(Contour { vertices, normals });
        }
        polygons.push(Polygon { contours });
    }

    Ok(FacetGroup { polygons })
}
