//! Integration tests for ewc-export
//!
//! Each test builds a scene graph in memory, exports it into a temporary
//! directory and reads the resulting SQLite file back.

use ewc_export::codec::{decode_geometry, decode_mesh};
use ewc_export::db::keys;
use ewc_export::db::schema::{self, COMPONENT_CLASS_ID, SHAPE_CLASS_ID};
use ewc_export::scene::{
    BBox3, BoxShape, Contour, Cylinder, FacetGroup, Geometry, Line, Mat3x4, NodeKind, Polygon,
    Primitive, PrimitiveKind, SceneGraph, Sphere, Triangulation,
};
use ewc_export::{
    export_scene, export_scene_with, CollisionPolicy, ExportConfig, ExportError, Tessellator,
};
use rusqlite::types::Value;
use rusqlite::Connection;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const TABLES: &[&str] = &[
    "model",
    "instance",
    "association",
    "material",
    "shape",
    "geometry",
    "mesh",
];

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
        .unwrap()
}

fn dump(conn: &Connection, table: &str) -> Vec<Vec<Value>> {
    let mut stmt = conn
        .prepare(&format!("SELECT * FROM {} ORDER BY rowid", table))
        .unwrap();
    let columns = stmt.column_count();
    stmt.query_map([], |row| {
        (0..columns).map(|i| row.get::<_, Value>(i)).collect::<Result<Vec<_>, _>>()
    })
    .unwrap()
    .collect::<Result<Vec<_>, _>>()
    .unwrap()
}

fn ids(conn: &Connection, sql: &str) -> Vec<i64> {
    conn.prepare(sql)
        .unwrap()
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

fn unit_box(min: [f32; 3]) -> BBox3 {
    BBox3::new(min, [min[0] + 1.0, min[1] + 1.0, min[2] + 1.0])
}

/// File -> Model -> Group holding a Box [2,3,4] and a one-triangle FacetGroup
fn scenario_graph() -> SceneGraph {
    let mut graph = SceneGraph::new();
    let file = graph.add_root(NodeKind::File, "/projects/site/plant.rvm");
    let model = graph.add_child(file, NodeKind::Model, "SITE-A");
    let group = graph.add_child(model, NodeKind::Group, "/EQUI-100");

    graph.add_geometry(
        group,
        Geometry::new(Primitive::Box(BoxShape { lengths: [2.0, 3.0, 4.0] }))
            .with_bounds(
                BBox3::new([-1.0, -1.5, -2.0], [1.0, 1.5, 2.0]),
                BBox3::new([9.0, -1.5, -2.0], [11.0, 1.5, 2.0]),
            )
            .with_transform(Mat3x4::translation([10.0, 0.0, 0.0]))
            .with_color(0x336699, 0),
    );

    let triangle = FacetGroup {
        polygons: vec![Polygon {
            contours: vec![Contour {
                vertices: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
                normals: vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0],
            }],
        }],
    };
    graph.add_geometry(
        group,
        Geometry::new(Primitive::FacetGroup(triangle))
            .with_bounds(unit_box([0.0; 3]), unit_box([0.0; 3]))
            .with_color(0x336699, 0),
    );
    graph
}

/// Two files, nested groups, several colors, a line and a few curved shapes
fn larger_graph() -> SceneGraph {
    let mut graph = SceneGraph::new();
    let colors = [0xFF0000, 0x00FF00, 0x0000FF];

    for f in 0..2 {
        let file = graph.add_root(NodeKind::File, format!("/data/area{}.rvm", f));
        let model = graph.add_child(file, NodeKind::Model, format!("AREA-{}", f));
        for g in 0..4 {
            let group = graph.add_child(model, NodeKind::Group, format!("/PIPE-{}-{}", f, g));
            let branch = graph.add_child(group, NodeKind::Group, format!("BRANCH {}", g));
            for s in 0..3 {
                let offset = (f * 100 + g * 10 + s) as f32;
                graph.add_geometry(
                    branch,
                    Geometry::new(Primitive::Cylinder(Cylinder { radius: 0.5, height: 2.0 }))
                        .with_transform(Mat3x4::translation([offset, 0.0, 0.0]))
                        .with_bounds(unit_box([0.0; 3]), unit_box([offset, 0.0, 0.0]))
                        .with_color(colors[s], (s * 10) as u32),
                );
            }
            graph.add_geometry(
                group,
                Geometry::new(Primitive::Line(Line { a: 0.0, b: 1.0 }))
                    .with_bounds(unit_box([0.0; 3]), unit_box([0.0; 3])),
            );
            graph.add_geometry(
                group,
                Geometry::new(Primitive::Sphere(Sphere { diameter: 1.0 }))
                    .with_bounds(unit_box([0.0; 3]), unit_box([0.0, 5.0, 0.0]))
                    .with_color(colors[g % 3], 0),
            );
        }
    }
    graph
}

fn config_in(dir: &Path, stem: &str) -> ExportConfig {
    ExportConfig::new(dir.join(stem))
}

#[test]
fn test_scenario_box_and_facet_group() {
    let dir = tempdir().unwrap();
    let mut graph = scenario_graph();
    let config = config_in(dir.path(), "plant");

    let summary = export_scene(&mut graph, &config).unwrap();
    assert_eq!(summary.path, dir.path().join("plant.ewc"));
    assert_eq!(summary.shapes, 2);

    let conn = Connection::open(&summary.path).unwrap();
    assert_eq!(count(&conn, "model"), 1);
    assert_eq!(count(&conn, "instance"), 2);
    assert_eq!(count(&conn, "association"), 2);
    assert_eq!(count(&conn, "material"), 1);
    assert_eq!(count(&conn, "shape"), 2);
    assert_eq!(count(&conn, "geometry"), 2);
    assert_eq!(count(&conn, "mesh"), 2);

    let model_name: String = conn
        .query_row("SELECT name FROM model", [], |row| row.get(0))
        .unwrap();
    assert_eq!(model_name, "plant.rvm");

    // Geometry blobs decode back to the source primitives
    let blobs: Vec<(i64, u32, Vec<u8>)> = conn
        .prepare("SELECT id, geometry_type, data FROM geometry ORDER BY id")
        .unwrap()
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(blobs[0].1, PrimitiveKind::Box.tag());
    assert_eq!(blobs[1].1, PrimitiveKind::FacetGroup.tag());
    assert_eq!(
        decode_geometry(&blobs[0].2).unwrap().primitive,
        Primitive::Box(BoxShape { lengths: [2.0, 3.0, 4.0] })
    );
    match decode_geometry(&blobs[1].2).unwrap().primitive {
        Primitive::FacetGroup(fg) => {
            assert_eq!(fg.polygons.len(), 1);
            assert_eq!(fg.polygons[0].contours[0].vertex_count(), 3);
        }
        other => panic!("expected facet group, got {:?}", other),
    }

    let triangles = ids(&conn, "SELECT triangle_count FROM mesh ORDER BY id");
    assert_eq!(triangles, vec![12, 1]);

    // Box is translated, facet group is not
    let matrices: Vec<String> = conn
        .prepare("SELECT matrix FROM shape ORDER BY id")
        .unwrap()
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(matrices[0], "[1,0,0,10,0,1,0,0,0,0,1,0,0,0,0,1]");
    assert_eq!(matrices[1], "");

    // Instance bounds are the union of the group's geometry
    let (min_x, max_x): (f64, f64) = conn
        .query_row("SELECT min_x, max_x FROM instance WHERE name = '/EQUI-100'", [], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .unwrap();
    assert_eq!((min_x, max_x), (0.0, 11.0));

    assert!(!dir.path().join("plant.ewc-wal").exists());
    assert!(!dir.path().join("plant.ewc-shm").exists());
}

#[test]
fn test_settings_written() {
    let dir = tempdir().unwrap();
    let config = config_in(dir.path(), "unit-7");

    let first = export_scene(&mut scenario_graph(), &config).unwrap();
    let conn = Connection::open(&first.path).unwrap();
    assert_eq!(
        schema::get_setting(&conn, keys::NAME).unwrap(),
        Some("unit-7".to_string())
    );
    assert_eq!(
        schema::get_setting(&conn, keys::CONTEXT).unwrap(),
        Some("unit-7".to_string())
    );
    assert_eq!(
        schema::get_setting(&conn, keys::SIGNATURE_CODE).unwrap(),
        Some(first.signature.clone())
    );
    assert!(schema::get_setting(&conn, keys::CACHE_GUID).unwrap().is_some());
    assert_eq!(
        schema::get_setting(&conn, keys::STORE_GEOMETRY_INFO).unwrap(),
        Some("True".to_string())
    );
    drop(conn);

    // A second run replaces the file and gets a fresh signature
    let second = export_scene(&mut scenario_graph(), &config).unwrap();
    assert_ne!(first.signature, second.signature);
}

#[test]
fn test_ids_dense_and_monotonic() {
    let dir = tempdir().unwrap();
    let summary = export_scene(&mut larger_graph(), &config_in(dir.path(), "large")).unwrap();
    let conn = Connection::open(&summary.path).unwrap();

    let mut instance_space = ids(&conn, "SELECT id FROM model");
    instance_space.extend(ids(&conn, "SELECT id FROM instance"));
    instance_space.sort_unstable();
    let n = instance_space.len() as i64;
    assert_eq!(instance_space, (1..=n).collect::<Vec<_>>());
    // 2 models + 2 models' instances + 8 groups + 8 branches
    assert_eq!(n, 20);

    let shape_ids = ids(&conn, "SELECT id FROM shape ORDER BY rowid");
    assert_eq!(shape_ids, (1..=32).collect::<Vec<_>>());
    let material_ids = ids(&conn, "SELECT id FROM material ORDER BY rowid");
    assert_eq!(material_ids, vec![1, 2, 3, 4, 5]);

    // Every association parent was emitted before its child
    let links: Vec<(i64, i64)> = conn
        .prepare("SELECT parent_id, child_id FROM association")
        .unwrap()
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert!(links.iter().all(|(parent, child)| parent < child));

    let lines: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM geometry WHERE geometry_type = ?1",
            [PrimitiveKind::Line.tag()],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(lines, 0);
    assert_eq!(summary.skipped_lines, 8);
}

#[test]
fn test_batch_modes_equivalent() {
    let dir = tempdir().unwrap();

    let single = config_in(dir.path(), "single");

    let mut per_row = config_in(dir.path(), "per-row");
    per_row.engine.auto_commit_threshold = 1;

    let mut threaded = config_in(dir.path(), "threaded");
    threaded.threaded_writer = true;
    threaded.channel_size = 128;
    threaded.engine.auto_commit_threshold = 7;

    let paths: Vec<_> = [single, per_row, threaded]
        .iter()
        .map(|config| export_scene(&mut larger_graph(), config).unwrap().path)
        .collect();

    let baseline = Connection::open(&paths[0]).unwrap();
    for path in &paths[1..] {
        let other = Connection::open(path).unwrap();
        for table in TABLES {
            assert_eq!(
                dump(&baseline, table),
                dump(&other, table),
                "{} differs in {}",
                table,
                path.display()
            );
        }
    }
}

#[test]
fn test_empty_scene_removed() {
    let dir = tempdir().unwrap();
    let config = config_in(dir.path(), "empty");
    let mut graph = SceneGraph::new();

    match export_scene(&mut graph, &config) {
        Err(ExportError::EmptyOutput { path }) => assert_eq!(path, config.output_path()),
        other => panic!("expected EmptyOutput, got {:?}", other.map(|s| s.path)),
    }

    let leftovers: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
    assert!(leftovers.is_empty(), "left behind {:?}", leftovers);
}

#[test]
fn test_stale_output_replaced() {
    let dir = tempdir().unwrap();
    let config = config_in(dir.path(), "plant");
    let path = config.output_path();
    fs::write(&path, b"not a database").unwrap();
    fs::write(dir.path().join("plant.ewc-wal"), b"stale").unwrap();

    export_scene(&mut scenario_graph(), &config).unwrap();

    let conn = Connection::open(&path).unwrap();
    assert_eq!(count(&conn, "shape"), 2);
    assert!(!dir.path().join("plant.ewc-wal").exists());
}

#[test]
fn test_stale_output_trashed() {
    let dir = tempdir().unwrap();
    let trash = dir.path().join("trash");
    let mut config = config_in(dir.path(), "plant");
    config.collision = CollisionPolicy::Trash(Some(trash.clone()));

    export_scene(&mut scenario_graph(), &config).unwrap();
    export_scene(&mut scenario_graph(), &config).unwrap();

    let trashed: Vec<_> = fs::read_dir(&trash).unwrap().collect();
    assert_eq!(trashed.len(), 1);
    assert!(config.output_path().exists());
}

#[test]
fn test_shape_instances_option() {
    let dir = tempdir().unwrap();
    let mut config = config_in(dir.path(), "shapes");
    config.shape_instances = true;

    let summary = export_scene(&mut scenario_graph(), &config).unwrap();
    let conn = Connection::open(&summary.path).unwrap();

    assert_eq!(count(&conn, "instance"), 4);
    let names: Vec<String> = conn
        .prepare("SELECT name FROM instance WHERE class_id = ?1 ORDER BY id")
        .unwrap()
        .query_map([SHAPE_CLASS_ID], |row| row.get(0))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(names, vec!["Box 1 of /EQUI-100", "FacetGroup 2 of /EQUI-100"]);

    let components: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM instance WHERE class_id = ?1",
            [COMPONENT_CLASS_ID],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(components, 2);

    // Shapes point at their own instance rows
    let orphans: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM shape s JOIN instance i ON i.id = s.instance_id
             WHERE i.class_id != ?1",
            [SHAPE_CLASS_ID],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(orphans, 0);
}

#[test]
fn test_deferred_bounds_match_inline() {
    let dir = tempdir().unwrap();
    let inline = config_in(dir.path(), "inline");
    let mut deferred = config_in(dir.path(), "deferred");
    deferred.defer_instance_bounds = true;

    let a = export_scene(&mut larger_graph(), &inline).unwrap();
    let b = export_scene(&mut larger_graph(), &deferred).unwrap();

    let a = Connection::open(&a.path).unwrap();
    let b = Connection::open(&b.path).unwrap();
    assert_eq!(dump(&a, "instance"), dump(&b, "instance"));
    assert_eq!(dump(&a, "model"), dump(&b, "model"));
}

#[test]
fn test_tessellated_meshes_stored() {
    let dir = tempdir().unwrap();
    let fixture = |geometry: &Geometry, _scale: f32| match geometry.kind() {
        PrimitiveKind::Cylinder => Some(Triangulation {
            vertices: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0],
            normals: [0.0, 0.0, 1.0].repeat(4),
            indices: vec![0, 1, 2, 2, 1, 3],
            error: 0.01,
        }),
        _ => None,
    };

    let summary = export_scene_with(
        &mut larger_graph(),
        &config_in(dir.path(), "meshes"),
        Some(&fixture as &dyn Tessellator),
    )
    .unwrap();
    let conn = Connection::open(&summary.path).unwrap();

    let rows: Vec<(i64, u32, Vec<u8>)> = conn
        .prepare(
            "SELECT m.id, m.triangle_count, m.data FROM mesh m
             JOIN geometry g ON g.id = m.geometry_id
             WHERE g.geometry_type = ?1",
        )
        .unwrap()
        .query_map([PrimitiveKind::Cylinder.tag()], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(rows.len(), 24);
    for (_, triangles, data) in &rows {
        assert_eq!(*triangles, 2);
        let mesh = decode_mesh(data).unwrap();
        assert_eq!(mesh.triangle_count(), 2);
        assert_eq!(mesh.vertices.len(), 4);
    }

    // Spheres had no triangulation and the fixture declined them
    let empty: i64 = conn
        .query_row("SELECT COUNT(*) FROM mesh WHERE length(data) = 0", [], |row| row.get(0))
        .unwrap();
    assert_eq!(empty, 8);
}

#[test]
fn test_invalid_config_rejected_before_io() {
    let dir = tempdir().unwrap();
    let mut config = config_in(dir.path(), "bad");
    config.engine.page_size = 1000;

    assert!(matches!(
        export_scene(&mut scenario_graph(), &config),
        Err(ExportError::Config(_))
    ));
    assert!(!config.output_path().exists());
}
