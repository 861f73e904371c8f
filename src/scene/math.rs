//! Bounding boxes and affine transforms used by the scene graph

/// Axis-aligned box in world or local space.
///
/// The empty box has `min = +inf` and `max = -inf` so that any union with a
/// real box yields that box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox3 {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl BBox3 {
    pub const EMPTY: BBox3 = BBox3 {
        min: [f32::INFINITY; 3],
        max: [f32::NEG_INFINITY; 3],
    };

    pub fn new(min: [f32; 3], max: [f32; 3]) -> Self {
        Self { min, max }
    }

    pub fn is_empty(&self) -> bool {
        (0..3).any(|i| self.min[i] > self.max[i])
    }

    /// Grow `self` to contain `other`
    pub fn engulf(&mut self, other: &BBox3) {
        for i in 0..3 {
            self.min[i] = self.min[i].min(other.min[i]);
            self.max[i] = self.max[i].max(other.max[i]);
        }
    }

    pub fn union(mut self, other: &BBox3) -> BBox3 {
        self.engulf(other);
        self
    }

    /// `None` for the empty box, used when persisting nullable columns
    pub fn non_empty(&self) -> Option<BBox3> {
        if self.is_empty() {
            None
        } else {
            Some(*self)
        }
    }
}

impl Default for BBox3 {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// 3x4 affine transform stored column-major: three linear columns followed by
/// the translation column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mat3x4 {
    pub cols: [[f32; 3]; 4],
}

impl Mat3x4 {
    pub const IDENTITY: Mat3x4 = Mat3x4 {
        cols: [
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [0.0, 0.0, 0.0],
        ],
    };

    pub fn from_cols(cols: [[f32; 3]; 4]) -> Self {
        Self { cols }
    }

    pub fn translation(t: [f32; 3]) -> Self {
        let mut m = Self::IDENTITY;
        m.cols[3] = t;
        m
    }

    pub fn uniform_scale(s: f32) -> Self {
        let mut m = Self::IDENTITY;
        m.cols[0][0] = s;
        m.cols[1][1] = s;
        m.cols[2][2] = s;
        m
    }

    /// Element at `row`, `col` of the 3x4 matrix
    pub fn at(&self, row: usize, col: usize) -> f32 {
        self.cols[col][row]
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// Largest column length of the linear part.
    ///
    /// Tessellation tolerances are expressed in world units, so the decoder
    /// needs this factor to reproduce the same sampling.
    pub fn scale(&self) -> f32 {
        self.cols[..3]
            .iter()
            .map(|c| (c[0] * c[0] + c[1] * c[1] + c[2] * c[2]).sqrt())
            .fold(0.0f32, f32::max)
    }
}

impl Default for Mat3x4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}
