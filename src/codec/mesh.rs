//! Triangulated mesh blob codec (format v1)
//!
//! ```text
//! i32 version (1)
//! u32 vertex count, normal count, face count, color count, uv count
//! f64 x3 vertices | f32 x3 normals | u32 x3 faces | f32 x3 colors | f32 x2 uvs
//! ```
//!
//! Positions are widened to f64 on write so large plant coordinates keep
//! their precision in downstream viewers.

use super::cursor::{ByteReader, ByteWriter};
use crate::error::{CodecError, CodecResult};
use crate::scene::Triangulation;

pub const MESH_FORMAT_VERSION: i32 = 1;

const HEADER_LEN: usize = 4 + 5 * 4;

/// Decoded mesh blob
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshBlob {
    pub vertices: Vec<[f64; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub faces: Vec<[u32; 3]>,
    pub colors: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
}

impl MeshBlob {
    pub fn triangle_count(&self) -> usize {
        self.faces.len()
    }
}

/// Reusable mesh encoder, same scratch discipline as the geometry encoder
#[derive(Debug, Default)]
pub struct MeshEncoder {
    scratch: Vec<u8>,
}

impl MeshEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn encode(&mut self, triangulation: &Triangulation) -> &[u8] {
        self.scratch.clear();
        encode_mesh(&mut self.scratch, triangulation);
        &self.scratch
    }
}

/// Append the v1 blob for `triangulation` to `buf`
pub fn encode_mesh(buf: &mut Vec<u8>, triangulation: &Triangulation) {
    let vertex_count = triangulation.vertices.len() / 3;
    let normal_count = triangulation.normals.len() / 3;
    let face_count = triangulation.indices.len() / 3;

    buf.reserve(HEADER_LEN + vertex_count * 24 + normal_count * 12 + face_count * 12);
    let mut w = ByteWriter::new(buf);
    w.write_i32(MESH_FORMAT_VERSION);
    w.write_u32(vertex_count as u32);
    w.write_u32(normal_count as u32);
    w.write_u32(face_count as u32);
    w.write_u32(0);
    w.write_u32(0);

    for &v in &triangulation.vertices[..vertex_count * 3] {
        w.write_f64(v as f64);
    }
    w.write_f32s(&triangulation.normals[..normal_count * 3]);
    w.write_u32s(&triangulation.indices[..face_count * 3]);
}

pub fn decode_mesh(bytes: &[u8]) -> CodecResult<MeshBlob> {
    let mut r = ByteReader::new(bytes);

    let version = r.read_i32()?;
    if version != MESH_FORMAT_VERSION {
        return Err(CodecError::MeshVersion(version));
    }

    let vertex_count = r.read_u32()?;
    let normal_count = r.read_u32()?;
    let face_count = r.read_u32()?;
    let color_count = r.read_u32()?;
    let uv_count = r.read_u32()?;

    r.check_count(vertex_count, 24)?;
    let mut vertices = Vec::with_capacity(vertex_count as usize);
    for _ in 0..vertex_count {
        vertices.push([r.read_f64()?, r.read_f64()?, r.read_f64()?]);
    }

    r.check_count(normal_count, 12)?;
    let mut normals = Vec::with_capacity(normal_count as usize);
    for _ in 0..normal_count {
        normals.push(r.read_f32_array::<3>()?);
    }

    r.check_count(face_count, 12)?;
    let mut faces = Vec::with_capacity(face_count as usize);
    for _ in 0..face_count {
        faces.push([r.read_u32()?, r.read_u32()?, r.read_u32()?]);
    }

    r.check_count(color_count, 12)?;
    let mut colors = Vec::with_capacity(color_count as usize);
    for _ in 0..color_count {
        colors.push(r.read_f32_array::<3>()?);
    }

    r.check_count(uv_count, 8)?;
    let mut uvs = Vec::with_capacity(uv_count as usize);
    for _ in 0..uv_count {
        uvs.push(r.read_f32_array::<2>()?);
    }

    r.finish()?;

    Ok(MeshBlob {
        vertices,
        normals,
        faces,
        colors,
        uvs,
    })
}
