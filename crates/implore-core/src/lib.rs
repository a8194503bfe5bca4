//! implore-core - Vector field visualization engine
//!
//! This crate turns simulation output (mesh nodes with a vector per node,
//! plus an optional volumetric image stack) into an interactive 3D scene
//! of colored arrow glyphs.
//!
//! # Key Components
//!
//! - **Dataset**: the `data.json` manifest naming fields and the image stack
//! - **Field**: node/vector arrays to glyph placements, extent and maximum
//! - **Colormap / Legend**: magnitude-to-palette mapping and the synced legend
//! - **Slices**: per-depth background textures on a single plane
//! - **Cube**: wireframe bounds of the field or the stack
//! - **Animation / Camera**: depth scan, auto-rotate and scroll tilt
//! - **View / Panel**: the parameter struct and declarative control descriptors
//! - **Engine**: the non-blocking frame loop tying everything together
//!
//! # Host capabilities
//!
//! The engine never draws on its own. Hosts supply a [`Scene`] (meshes,
//! planes, textures, camera rendering) and a [`LegendSurface`]; the
//! [`HeadlessScene`] and [`HeadlessLegend`] recorders stand in for both in
//! tests and headless runs.

pub mod animation;
pub mod camera;
pub mod colormap;
pub mod cube;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod field;
pub mod legend;
pub mod panel;
pub mod render;
pub mod slices;
pub mod view;

pub use animation::*;
pub use camera::*;
pub use colormap::*;
pub use cube::*;
pub use dataset::*;
pub use engine::Engine;
pub use error::*;
pub use field::*;
pub use legend::*;
pub use panel::*;
pub use render::*;
pub use slices::*;
pub use view::*;
