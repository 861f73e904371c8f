//! Material deduplication
//!
//! Shapes in a plant model reuse a handful of colors millions of times. The
//! cache maps each (color, transparency) signature to one material id for the
//! whole run; the first caller creates the row, later callers get the id.

use std::collections::HashMap;

pub type MaterialId = i64;

/// Roughness written for every derived material
pub const DEFAULT_ROUGHNESS: f32 = 0.4;

/// Metallic factor written for every derived material
pub const DEFAULT_METALLIC: f32 = 0.6;

/// Signature used as the cache key
pub fn material_key(color: u32, transparency: u32) -> u64 {
    ((color as u64) << 9) | (((transparency as u8) as u64) << 1) | 1
}

/// Material row derived from a color
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub id: MaterialId,
    /// RGB bytes, 0-255
    pub diffuse: [f32; 3],
    /// 0.0 = opaque, 1.0 = fully transparent
    pub dissolve: f32,
    pub roughness: f32,
    pub metallic: f32,
    pub diffuse_texname: String,
    pub alpha_texname: String,
    pub normal_texname: String,
    pub metallic_texname: String,
    pub roughness_texname: String,
}

impl Material {
    pub fn from_color(id: MaterialId, color: u32, transparency: u32) -> Self {
        Self {
            id,
            diffuse: [
                ((color >> 16) & 0xFF) as f32,
                ((color >> 8) & 0xFF) as f32,
                (color & 0xFF) as f32,
            ],
            // Same byte truncation as the cache key
            dissolve: (transparency as u8) as f32 / 100.0,
            roughness: DEFAULT_ROUGHNESS,
            metallic: DEFAULT_METALLIC,
            diffuse_texname: String::new(),
            alpha_texname: String::new(),
            normal_texname: String::new(),
            metallic_texname: String::new(),
            roughness_texname: String::new(),
        }
    }
}

/// Run-scoped signature to id map. Ids start at 1 and are never reused.
#[derive(Debug, Default)]
pub struct MaterialCache {
    ids: HashMap<u64, MaterialId>,
    last_id: MaterialId,
}

impl MaterialCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id for the signature and whether it was just created
    pub fn get_or_create(&mut self, color: u32, transparency: u32) -> (MaterialId, bool) {
        let key = material_key(color, transparency);
        if let Some(&id) = self.ids.get(&key) {
            return (id, false);
        }
        self.last_id += 1;
        self.ids.insert(key, self.last_id);
        (self.last_id, true)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
