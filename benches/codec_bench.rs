//! Benchmarks for ewc-export
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ewc_export::codec::{decode_geometry, GeometryEncoder, MeshEncoder};
use ewc_export::material::MaterialCache;
use ewc_export::scene::{
    BoxShape, Contour, FacetGroup, Geometry, Mat3x4, Polygon, Primitive, Triangulation,
};
use ewc_export::walker::matrix_string;

fn facet_group(polygons: usize) -> Geometry {
    let contour = Contour {
        vertices: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0],
        normals: [0.0, 0.0, 1.0].repeat(4),
    };
    let polygon = Polygon {
        contours: vec![contour],
    };
    Geometry::new(Primitive::FacetGroup(FacetGroup {
        polygons: vec![polygon; polygons],
    }))
}

fn benchmark_encode_box(c: &mut Criterion) {
    let geometry = Geometry::new(Primitive::Box(BoxShape {
        lengths: [2.0, 3.0, 4.0],
    }));
    let mut encoder = GeometryEncoder::new();

    c.bench_function("encode_box", |b| {
        b.iter(|| {
            let bytes = encoder.encode(black_box(&geometry)).unwrap();
            black_box(bytes.len());
        })
    });
}

fn benchmark_facet_group(c: &mut Criterion) {
    let geometry = facet_group(256);
    let mut encoder = GeometryEncoder::new();
    let encoded = encoder.encode(&geometry).unwrap().to_vec();

    c.bench_function("encode_facet_group_256", |b| {
        b.iter(|| {
            let bytes = encoder.encode(black_box(&geometry)).unwrap();
            black_box(bytes.len());
        })
    });

    c.bench_function("decode_facet_group_256", |b| {
        b.iter(|| black_box(decode_geometry(black_box(&encoded)).unwrap()))
    });
}

fn benchmark_mesh_encoding(c: &mut Criterion) {
    let n = 1024u32;
    let triangulation = Triangulation {
        vertices: (0..n * 3).map(|i| i as f32 * 0.5).collect(),
        normals: [0.0, 0.0, 1.0].repeat(n as usize),
        indices: (0..n - 2).flat_map(|i| [i, i + 1, i + 2]).collect(),
        error: 0.01,
    };
    let mut encoder = MeshEncoder::new();

    c.bench_function("encode_mesh_1k_vertices", |b| {
        b.iter(|| black_box(encoder.encode(black_box(&triangulation)).len()))
    });
}

fn benchmark_material_cache(c: &mut Criterion) {
    c.bench_function("material_cache_lookup", |b| {
        let mut cache = MaterialCache::new();
        for color in 0..64u32 {
            cache.get_or_create(color * 0x010101, 0);
        }

        let mut color = 0u32;
        b.iter(|| {
            color = (color + 1) % 64;
            black_box(cache.get_or_create(black_box(color * 0x010101), 0))
        })
    });
}

fn benchmark_matrix_string(c: &mut Criterion) {
    let transform = Mat3x4::from_cols([
        [0.0, 1.0, 0.0],
        [-1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0],
        [1250.5, -87.25, 3.125],
    ]);

    c.bench_function("matrix_string", |b| {
        b.iter(|| black_box(matrix_string(black_box(&transform))))
    });
}

criterion_group!(
    benches,
    benchmark_encode_box,
    benchmark_facet_group,
    benchmark_mesh_encoding,
    benchmark_material_cache,
    benchmark_matrix_string,
);
criterion_main!(benches);
