//! Seam to the external tessellator
//!
//! Geometries normally arrive with a triangulation already attached. When one
//! does not, the exporter asks a [`Tessellator`] for it, passing the transform
//! scale so tolerances can be applied in world units. The result is used for
//! the mesh row only; the scene graph is left untouched.

use crate::scene::{Geometry, Triangulation};

pub trait Tessellator {
    /// Triangulate `geometry`, or `None` if the kind cannot be tessellated
    fn tessellate(&self, geometry: &Geometry, scale: f32) -> Option<Triangulation>;
}

impl<F> Tessellator for F
where
    F: Fn(&Geometry, f32) -> Option<Triangulation>,
{
    fn tessellate(&self, geometry: &Geometry, scale: f32) -> Option<Triangulation> {
        self(geometry, scale)
    }
}
