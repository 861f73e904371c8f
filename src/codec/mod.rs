//! Binary codecs for geometry and mesh blobs
//!
//! Both codecs are pure: they read and write byte buffers and never touch the
//! database. Blobs are written in native byte order and are meant to be read
//! back on the same architecture.

pub mod cursor;
pub mod mesh;
pub mod primitive;

pub use cursor::{ByteReader, ByteWriter};
pub use mesh::{decode_mesh, encode_mesh, MeshBlob, MeshEncoder, MESH_FORMAT_VERSION};
pub use primitive::{decode_geometry, encode_primitive, encoded_len, DecodedGeometry, GeometryEncoder};
