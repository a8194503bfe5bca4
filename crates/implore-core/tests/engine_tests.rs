//! Engine integration tests
//!
//! Full frame loop over in-memory archives and directories, with the
//! recording scene and legend standing in for the host.

mod common;

use common::fixtures::{archive, engine, field_archive, npy, showing, stack_directory};
use implore_core::{
    Animation, ControlValue, CubeMode, ImageMode, ParamChange, SliceState, ViewParams,
};
use implore_io::{DataLocation, MemorySource};

fn field_source() -> MemorySource {
    let source = MemorySource::new();
    source.insert("run.zip", field_archive());
    source
}

// === Fields ===

#[tokio::test]
async fn test_glyphs_drawn_after_load() {
    let (mut engine, scene, legend) = engine(field_source(), "run.zip", showing("u")).await;
    engine.settle().await;
    engine.frame(0.016, None);

    let state = scene.state();
    assert_eq!(state.drawn_instances().len(), 2);
    assert_eq!(state.frames, 1);

    let legend = legend.state();
    assert!(legend.visible);
    assert_eq!(legend.title, "u (um)");
    assert_eq!(legend.ticks.len(), 5);
    assert_eq!(legend.ticks[0], (0.0, "0.0".to_string()));
    assert_eq!(legend.ticks[2], (0.5, "0.5".to_string()));
    assert_eq!(legend.ticks[4], (1.0, "1.0".to_string()));
}

#[tokio::test]
async fn test_colormap_change_does_not_reload() {
    let (mut engine, scene, legend) = engine(field_source(), "run.zip", showing("u")).await;
    engine.settle().await;
    let generation = engine.field_builder().generation();
    let gradient = legend.state().gradient;

    engine.set_param(ParamChange::Cmap("magma".to_string())).unwrap();
    engine.frame(0.016, None);

    assert!(engine.pending_field().is_none());
    assert_eq!(engine.field_builder().generation(), generation);
    assert_ne!(legend.state().gradient, gradient);
    assert_eq!(scene.state().meshes_created, 1);
}

#[tokio::test]
async fn test_failed_field_keeps_previous_glyphs() {
    let (mut engine, scene, _) = engine(field_source(), "run.zip", showing("u")).await;
    engine.settle().await;
    let drawn = scene.state().drawn_instances();

    engine.set_param(ParamChange::Field("broken".to_string())).unwrap();
    engine.settle().await;
    engine.frame(0.016, None);

    assert_eq!(engine.field_builder().glyphs().len(), 2);
    assert_eq!(scene.state().drawn_instances(), drawn);
}

#[tokio::test]
async fn test_none_field_hides_glyphs_and_legend() {
    let (mut engine, scene, legend) = engine(field_source(), "run.zip", showing("u")).await;
    engine.settle().await;
    assert!(legend.state().visible);

    engine.set_param(ParamChange::Field("none".to_string())).unwrap();
    engine.frame(0.016, None);

    assert!(scene.state().drawn_instances().is_empty());
    assert!(!legend.state().visible);
    // extent survives, so the cube keeps its size
    assert_ne!(scene.state().lines().unwrap().transform.scale, [0.0; 3]);
}

#[tokio::test]
async fn test_cube_modes() {
    let (mut engine, scene, _) = engine(field_source(), "run.zip", showing("u")).await;
    engine.settle().await;

    // extent x in [0, 1] lands on scene z
    assert_eq!(scene.state().lines().unwrap().transform.scale, [0.0, 0.0, 1.0]);

    engine.set_param(ParamChange::Cube(CubeMode::None)).unwrap();
    engine.update_all();
    assert_eq!(scene.state().lines().unwrap().transform.scale, [0.0; 3]);
}

#[tokio::test]
async fn test_out_of_range_param_is_rejected() {
    let (mut engine, scene, _) = engine(field_source(), "run.zip", showing("u")).await;
    engine.settle().await;
    let distance = engine.camera().distance();

    assert!(engine.set_param(ParamChange::Zoom(0.0)).is_err());
    assert!(engine.set_param(ParamChange::Scale(-1.0)).is_err());
    engine.frame(0.016, None);

    assert_eq!(engine.params().zoom, 1.0);
    assert_eq!(engine.params().scale, 1.0);
    assert!((engine.camera().distance() - distance).abs() < 1e-4);
    assert_eq!(scene.state().drawn_instances().len(), 2);
}

// === Dataset replacement ===

#[tokio::test]
async fn test_stale_field_load_is_discarded() {
    let source = field_source();
    let three = archive(&[
        ("nodes.npy", npy(&[[0.0; 3], [1.0; 3], [2.0; 3]])),
        ("u.npy", npy(&[[1.0, 0.0, 0.0]; 3])),
    ]);
    let (mut engine, _, _) = engine(source, "run.zip", showing("u")).await;

    // first load is in flight when the dataset changes
    engine.update_all();
    assert!(engine.pending_field().is_some());
    let dataset = engine.dataset().with_location(DataLocation::blob("three.zip", three));
    let id = dataset.id();
    engine.replace_dataset(dataset);
    engine.settle().await;

    let key = engine.field_builder().key().unwrap();
    assert_eq!(key.dataset, id);
    assert_eq!(engine.field_builder().glyphs().len(), 3);
}

#[tokio::test]
async fn test_drop_archive_with_manifest() {
    let (mut engine, _, _) = engine(
        field_source(),
        "run.zip",
        ViewParams {
            cmap: "plasma".to_string(),
            ..showing("u")
        },
    )
    .await;
    engine.settle().await;
    let before = engine.dataset().id();

    let dropped = archive(&[
        (
            "data.json",
            br#"{"fields": {"u": {"nodes": "n.npy", "vectors": "v.npy", "unit": "pN"}}}"#.to_vec(),
        ),
        ("n.npy", npy(&[[0.0; 3]])),
        ("v.npy", npy(&[[0.0, 0.0, 3.0]])),
    ]);
    engine
        .drop_location(DataLocation::blob("cells.zip", dropped))
        .await
        .unwrap();
    engine.settle().await;

    assert_ne!(engine.dataset().id(), before);
    assert_eq!(engine.dataset().field("u").unwrap().unit, "pN");
    assert_eq!(engine.params().cmap, "plasma");
    assert_eq!(engine.field_builder().max_magnitude(), 3.0);
}

#[tokio::test]
async fn test_drop_archive_without_manifest_keeps_fields() {
    let (mut engine, _, _) = engine(field_source(), "run.zip", showing("u")).await;
    engine.settle().await;

    let dropped = archive(&[
        ("nodes.npy", npy(&[[0.0; 3]])),
        ("u.npy", npy(&[[0.0, 4.0, 0.0]])),
    ]);
    engine
        .drop_location(DataLocation::blob("bare.zip", dropped))
        .await
        .unwrap();
    engine.settle().await;

    assert_eq!(engine.dataset().field("u").unwrap().unit, "um");
    assert_eq!(engine.field_builder().glyphs().len(), 1);
    assert_eq!(engine.field_builder().max_magnitude(), 4.0);
}

#[tokio::test]
async fn test_drop_with_corrupt_manifest_keeps_dataset() {
    let (mut engine, _, _) = engine(field_source(), "run.zip", showing("u")).await;
    engine.settle().await;
    let before = engine.dataset().id();

    let dropped = archive(&[
        ("data.json", b"{not json".to_vec()),
        ("nodes.npy", npy(&[[0.0; 3]])),
    ]);
    let result = engine
        .drop_location(DataLocation::blob("new.zip", dropped))
        .await;

    assert!(result.is_err());
    assert_eq!(engine.dataset().id(), before);
    assert_eq!(engine.dataset().location(), &DataLocation::path("run.zip"));
    assert_eq!(engine.field_builder().glyphs().len(), 2);
}

// === Stack ===

#[tokio::test]
async fn test_depth_scan_shows_slices() {
    let source = MemorySource::new();
    stack_directory(&source, &[]);
    let (mut engine, scene, _) = engine(
        source,
        "stack",
        ViewParams {
            animations: vec![Animation::depth_scan(10.0)],
            ..showing("none")
        },
    )
    .await;

    engine.frame(0.25, None);
    assert_eq!(engine.params().z, 2);
    engine.settle().await;

    let slices = engine.slices().unwrap();
    assert_eq!(slices.shown(), Some(2));
    assert!(matches!(slices.state(3), Some(SliceState::Ready(_))));
    // -depth/2 + z * voxel_z = -4 + 2 * 2
    let plane = scene.state().plane().unwrap().clone();
    assert_eq!(plane.transform.position[1], 0.0);
    assert!(plane.texture.is_some());
}

#[tokio::test]
async fn test_missing_slice_does_not_block_others() {
    let source = MemorySource::new();
    stack_directory(&source, &[1]);
    let (mut engine, scene, _) = engine(source, "stack", showing("none")).await;
    engine.settle().await;

    engine.set_control("z", &ControlValue::Int(1)).unwrap();
    engine.frame(0.016, None);
    let slices = engine.slices().unwrap();
    assert_eq!(slices.state(1), Some(SliceState::Failed));
    assert_eq!(slices.shown(), Some(0));

    engine.set_control("z", &ControlValue::Int(3)).unwrap();
    engine.frame(0.016, None);
    assert_eq!(engine.slices().unwrap().shown(), Some(3));
    assert_eq!(scene.state().textures.len(), 3);
}

#[tokio::test]
async fn test_on_demand_slices() {
    let source = MemorySource::new();
    stack_directory(&source, &[]);
    let (mut engine, scene, _) = engine(
        source,
        "stack",
        ViewParams {
            pre_load_images: false,
            image: ImageMode::Floor,
            ..showing("none")
        },
    )
    .await;
    assert!(!engine.is_loading());

    engine.settle().await;
    assert_eq!(scene.state().textures.len(), 1);
    assert_eq!(engine.slices().unwrap().state(1), Some(SliceState::Idle));
}

#[tokio::test]
async fn test_camera_framed_from_stack() {
    let source = MemorySource::new();
    stack_directory(&source, &[]);
    let (mut engine, scene, _) = engine(source, "stack", showing("none")).await;
    engine.frame(0.016, None);

    // twice the stack width of 20 * 0.5
    assert!((engine.camera().distance() - 20.0).abs() < 1e-3);
    assert!(scene.state().last_camera.is_some());

    let controls: Vec<_> = engine.controls().into_iter().map(|c| c.name).collect();
    assert_eq!(controls, vec!["cube", "image", "z"]);
}

#[tokio::test]
async fn test_auto_rotate_moves_light_with_camera() {
    let (mut engine, scene, _) = engine(
        field_source(),
        "run.zip",
        ViewParams {
            animations: vec![Animation::auto_rotate(90.0)],
            ..showing("u")
        },
    )
    .await;
    engine.settle().await;
    engine.frame(0.0, None);
    let light = scene.state().light.unwrap();

    engine.frame(1.0, None);
    assert_ne!(scene.state().light.unwrap(), light);
    let radius = engine.camera().distance();
    assert!((radius - 4.0).abs() < 1e-3);
}
