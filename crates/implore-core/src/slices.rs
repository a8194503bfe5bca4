//! Volumetric slice presenter
//!
//! Shows one image of the stack on a horizontal plane. Each depth slice is
//! fetched on its own; a slice that is requested before its image arrives
//! is remembered and installed as soon as that particular fetch completes.

use std::f32::consts::FRAC_PI_2;

use implore_io::{ArchiveResolver, ByteSource};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::dataset::{Dataset, StackDescriptor};
use crate::error::{DatasetError, ImploreResult};
use crate::render::{ObjectId, Scene, TextureId, Transform};
use crate::view::ImageMode;

/// Load state of one depth slice
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SliceState {
    Idle,
    Fetching,
    Ready(TextureId),
    Failed,
}

/// Fetch the image bytes of slice `index`
pub async fn fetch_slice<S: ByteSource>(
    resolver: &ArchiveResolver<S>,
    dataset: &Dataset,
    index: usize,
) -> ImploreResult<Vec<u8>> {
    let path = dataset
        .stack()
        .and_then(|s| s.slice_path(index))
        .ok_or(DatasetError::NoStack)?;
    Ok(resolver.resolve(dataset.location(), &path).await?)
}

/// Plane placement for `mode` at depth `z`
pub fn plane_transform(stack: &StackDescriptor, mode: ImageMode, z: usize) -> Transform {
    let depth = stack.physical_size()[2] as f32;
    let voxel_z = stack.voxel_size[2] as f32;
    let rotation = [-FRAC_PI_2, 0.0, 0.0];

    match mode {
        ImageMode::DepthTracking => Transform {
            position: [0.0, -depth / 2.0 + z as f32 * voxel_z, 0.0],
            rotation,
            scale: [1.0; 3],
        },
        ImageMode::Floor => Transform {
            position: [0.0, -depth / 2.0, 0.0],
            rotation,
            scale: [1.0; 3],
        },
        ImageMode::None => Transform {
            position: [0.0; 3],
            rotation,
            scale: [0.0; 3],
        },
    }
}

/// Background plane plus per-slice textures for one dataset
#[derive(Debug)]
pub struct SlicePresenter {
    dataset: Uuid,
    stack: StackDescriptor,
    plane: ObjectId,
    slices: Vec<SliceState>,
    shown: Option<usize>,
    wanted: Option<usize>,
    applied: Option<Transform>,
}

impl SlicePresenter {
    /// Create the plane for `stack`; the plane starts without a texture
    pub fn new(scene: &mut dyn Scene, dataset: Uuid, stack: &StackDescriptor) -> Self {
        let [w, h, _] = stack.physical_size();
        let plane = scene.create_plane(w as f32, h as f32);
        Self {
            dataset,
            stack: stack.clone(),
            plane,
            slices: vec![SliceState::Idle; stack.z_slices_count],
            shown: None,
            wanted: None,
            applied: None,
        }
    }

    pub fn dataset(&self) -> Uuid {
        self.dataset
    }

    pub fn plane(&self) -> ObjectId {
        self.plane
    }

    pub fn slice_count(&self) -> usize {
        self.slices.len()
    }

    pub fn state(&self, index: usize) -> Option<SliceState> {
        self.slices.get(index).copied()
    }

    /// Slice whose texture is on the plane
    pub fn shown(&self) -> Option<usize> {
        self.shown
    }

    /// Slice waiting for its fetch before it can be shown
    pub fn wanted(&self) -> Option<usize> {
        self.wanted
    }

    /// Mark every idle slice as fetching and return their indices
    pub fn begin_prefetch(&mut self) -> Vec<usize> {
        self.slices
            .iter_mut()
            .enumerate()
            .filter(|(_, s)| **s == SliceState::Idle)
            .map(|(i, s)| {
                *s = SliceState::Fetching;
                i
            })
            .collect()
    }

    /// Place the plane and show slice `z`
    ///
    /// Returns a slice index the caller should start fetching, when `z`
    /// has not been requested yet.
    pub fn update(&mut self, scene: &mut dyn Scene, mode: ImageMode, z: usize) -> Option<usize> {
        let transform = plane_transform(&self.stack, mode, z);
        if self.applied != Some(transform) {
            scene.set_transform(self.plane, &transform);
            self.applied = Some(transform);
        }

        let index = z.min(self.slices.len().checked_sub(1)?);
        match self.slices[index] {
            SliceState::Ready(texture) => {
                self.wanted = None;
                self.show(scene, index, texture);
                None
            }
            SliceState::Fetching => {
                self.wanted = Some(index);
                None
            }
            SliceState::Idle => {
                self.slices[index] = SliceState::Fetching;
                self.wanted = Some(index);
                Some(index)
            }
            SliceState::Failed => {
                self.wanted = None;
                None
            }
        }
    }

    /// Record the outcome of slice `index`'s fetch
    ///
    /// Shows it right away if it is the slice waiting to be shown.
    pub fn install(
        &mut self,
        scene: &mut dyn Scene,
        index: usize,
        texture: ImploreResult<TextureId>,
    ) -> bool {
        let Some(slot) = self.slices.get_mut(index) else {
            return false;
        };

        match texture {
            Ok(texture) => {
                *slot = SliceState::Ready(texture);
                if self.wanted == Some(index) {
                    self.wanted = None;
                    self.show(scene, index, texture);
                    return true;
                }
            }
            Err(e) => {
                warn!(index, error = %e, "slice image unavailable");
                *slot = SliceState::Failed;
                if self.wanted == Some(index) {
                    self.wanted = None;
                }
            }
        }
        false
    }

    /// Remove the plane from the scene
    pub fn remove(self, scene: &mut dyn Scene) {
        scene.remove(self.plane);
    }

    fn show(&mut self, scene: &mut dyn Scene, index: usize, texture: TextureId) {
        if self.shown != Some(index) {
            debug!(index, "showing slice");
            scene.set_texture(self.plane, Some(texture));
            self.shown = Some(index);
        }
    }
}
