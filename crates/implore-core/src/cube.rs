//! Bounding cube overlay
//!
//! A unit wireframe box scaled to either the field extent or the image
//! stack. Selecting no cube zeroes the scale instead of removing the box.

use crate::camera::Vec3;
use crate::colormap::Color;
use crate::dataset::StackDescriptor;
use crate::field::{remap, Extent};
use crate::render::{ObjectId, Scene, Transform, WireframeBox};
use crate::view::CubeMode;

/// Cube placement for `mode`
///
/// Field extents are in simulation coordinates and go through the same
/// axis remap as the glyphs. Stack depth runs along scene Y, matching the
/// slice plane.
pub fn cube_transform(
    mode: CubeMode,
    extent: &Extent,
    stack: Option<&StackDescriptor>,
    position_scale: f64,
) -> Transform {
    let hidden = Transform {
        scale: [0.0; 3],
        ..Transform::default()
    };

    match mode {
        CubeMode::None => hidden,
        CubeMode::Field => {
            let span = extent.span();
            let center = remap(extent.center(), position_scale);
            Transform {
                position: center.map(|v| v as f32),
                rotation: [0.0; 3],
                scale: [
                    (span[1] * position_scale) as f32,
                    (span[2] * position_scale) as f32,
                    (span[0] * position_scale) as f32,
                ],
            }
        }
        CubeMode::Stack => match stack {
            Some(stack) => {
                let [w, h, d] = stack.physical_size();
                Transform {
                    scale: [w as f32, d as f32, h as f32],
                    ..Transform::default()
                }
            }
            None => hidden,
        },
    }
}

/// The wireframe box in the scene
#[derive(Debug, Default)]
pub struct BoundingCube {
    object: Option<ObjectId>,
    applied: Option<Transform>,
}

impl BoundingCube {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the box on first use, then keep its transform current
    pub fn update(&mut self, scene: &mut dyn Scene, transform: Transform, color: Color) -> bool {
        let object = match self.object {
            Some(object) => object,
            None => {
                let object = scene.create_lines(&WireframeBox::unit().line_vertices(), color);
                self.object = Some(object);
                object
            }
        };

        if self.applied == Some(transform) {
            return false;
        }
        scene.set_transform(object, &transform);
        self.applied = Some(transform);
        true
    }

    pub fn object(&self) -> Option<ObjectId> {
        self.object
    }

    pub fn scale(&self) -> Vec3 {
        self.applied.map(|t| t.scale).unwrap_or([0.0; 3])
    }
}
