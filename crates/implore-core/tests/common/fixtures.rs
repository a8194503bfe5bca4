//! In-memory datasets for integration tests

use std::io::{Cursor, Write};

use implore_core::{Dataset, Engine, HeadlessLegend, HeadlessScene, ViewParams};
use implore_io::{ArchiveResolver, DataLocation, MemorySource, NumericArray, StorageOrder};
use zip::write::SimpleFileOptions;

/// Manifest with one field `u` and no stack
pub const FIELD_MANIFEST: &str = r#"{
    "fields": {
        "u": {"nodes": "nodes.npy", "vectors": "u.npy", "unit": "um", "factor": 1.0},
        "broken": {"nodes": "nodes.npy", "vectors": "missing.npy", "unit": "nN"}
    }
}"#;

/// Manifest with a four-slice stack and no fields
pub const STACK_MANIFEST: &str = r#"{
    "stacks": {
        "im_shape": [20, 10, 4],
        "voxel_size": [0.5, 0.5, 2.0],
        "z_slices_count": 4,
        "channels": ["actin"]
    }
}"#;

/// Encode an N x 3 row-major array
pub fn npy(rows: &[[f64; 3]]) -> Vec<u8> {
    let data = rows.iter().flat_map(|r| r.iter().copied()).collect();
    NumericArray::new(data, vec![rows.len(), 3], StorageOrder::RowMajor)
        .unwrap()
        .encode()
        .unwrap()
}

/// Zip `files` into an in-memory archive
pub fn archive(files: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (name, bytes) in files {
        writer.start_file(*name, options).unwrap();
        writer.write_all(bytes).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Node and vector arrays from the two-glyph scenario
pub fn two_glyph_arrays() -> Vec<(&'static str, Vec<u8>)> {
    vec![
        ("nodes.npy", npy(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]])),
        ("u.npy", npy(&[[0.0, 1.0, 0.0], [0.0, 0.0, 1.0]])),
    ]
}

/// `run.zip` holding the field manifest and the two-glyph arrays
pub fn field_archive() -> Vec<u8> {
    let mut files = two_glyph_arrays();
    files.push(("data.json", FIELD_MANIFEST.as_bytes().to_vec()));
    archive(&files)
}

/// `stack/` directory with the stack manifest and one jpg per slice
pub fn stack_directory(source: &MemorySource, skip: &[usize]) {
    source.insert("stack/data.json", STACK_MANIFEST.as_bytes().to_vec());
    for i in 0..4 {
        if !skip.contains(&i) {
            source.insert(format!("stack/stacks/0/actin/{:03}.jpg", i), vec![0xFF, 0xD8, i as u8]);
        }
    }
}

/// Engine over `location` with recording scene and legend
pub async fn engine(
    source: MemorySource,
    location: &str,
    params: ViewParams,
) -> (Engine<MemorySource>, HeadlessScene, HeadlessLegend) {
    let resolver = ArchiveResolver::new(source);
    let dataset = Dataset::load(&resolver, DataLocation::path(location))
        .await
        .unwrap();
    let scene = HeadlessScene::new();
    let legend = HeadlessLegend::new();
    let engine = Engine::new(
        resolver,
        dataset,
        params,
        Box::new(scene.clone()),
        Box::new(legend.clone()),
    );
    (engine, scene, legend)
}

/// View parameters showing `field`
pub fn showing(field: &str) -> ViewParams {
    ViewParams {
        field: field.to_string(),
        position_scale: 1.0,
        ..ViewParams::default()
    }
}
