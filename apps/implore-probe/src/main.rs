//! implore-probe - headless dataset probe
//!
//! Loads a dataset (archive or directory) the way the viewer does, builds
//! one field against a recording scene and prints what would be shown.
//!
//! ```text
//! implore-probe <location> [field] [params-json]
//! ```

use std::process::ExitCode;

use implore_core::{Engine, HeadlessLegend, HeadlessScene, ImploreResult, ViewParams};
use implore_io::{ArchiveResolver, DataLocation, FsSource};
use tracing::error;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: implore-probe <location> [field] [params-json]";

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let Some(location) = args.next() else {
        eprintln!("{USAGE}");
        return ExitCode::from(2);
    };
    let field = args.next();
    let params = args.next();

    match run(location, field, params).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "probe failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(location: String, field: Option<String>, params: Option<String>) -> ImploreResult<()> {
    let mut params = match params {
        Some(json) => ViewParams::from_json(&json)?,
        None => ViewParams::default(),
    };
    if let Some(field) = field {
        params.field = field;
    }

    let scene = HeadlessScene::new();
    let legend = HeadlessLegend::new();
    let mut engine = Engine::open(
        ArchiveResolver::new(FsSource::new()),
        DataLocation::path(location),
        params,
        Box::new(scene.clone()),
        Box::new(legend.clone()),
    )
    .await?;
    engine.settle().await;
    engine.frame(0.0, None);

    let dataset = engine.dataset();
    println!("location:   {}", dataset.location());
    let fields: Vec<_> = dataset.manifest().field_names().collect();
    println!("fields:     {}", fields.join(", "));
    if let Some(stack) = dataset.stack() {
        let [w, h, d] = stack.physical_size();
        println!(
            "stack:      {} slices, {:.1} x {:.1} x {:.1}",
            stack.z_slices_count, w, h, d
        );
    }

    let builder = engine.field_builder();
    let extent = builder.extent();
    println!("field:      {}", engine.params().field);
    println!("glyphs:     {}", builder.glyphs().len());
    println!("extent min: {:?}", extent.min);
    println!("extent max: {:?}", extent.max);
    println!("max:        {}", builder.max_magnitude());

    let legend = legend.state();
    if legend.visible {
        let ticks: Vec<_> = legend.ticks.iter().map(|(_, label)| label.as_str()).collect();
        println!("legend:     {} [{}]", legend.title, ticks.join(" "));
    } else {
        println!("legend:     hidden");
    }

    let state = scene.state();
    println!("camera:     radius {:.2}", engine.camera().distance());
    if let Some(lines) = state.lines() {
        println!("cube:       {:?}", lines.transform.scale);
    }
    if let Some(slices) = engine.slices() {
        println!("slice:      {:?}", slices.shown());
    }
    Ok(())
}
