//! Scene capability and render primitives
//!
//! The engine never talks to a GPU API directly. It drives a [`Scene`]:
//! an opaque host object exposing meshes, instanced meshes, line sets,
//! textured planes, a light and orbit controls. [`HeadlessScene`] records
//! everything it is asked to do and is what tests and the probe use.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::camera::{vec_cross, vec_length, vec_normalize, vec_scale, vec_sub, Camera, Mat4, Vec3};
use crate::colormap::{Color, Palette};
use crate::error::{ImploreError, ImploreResult};
use crate::field::GlyphInstance;

/// Handle to an object owned by a scene
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObjectId(pub u64);

/// Handle to a texture owned by a scene
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureId(pub u64);

/// Placement of a scene object
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    /// Euler angles (XYZ order), radians
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            rotation: [0.0; 3],
            scale: [1.0; 3],
        }
    }
}

/// Arrow mesh pointing along +Z: a cone head on a cylinder shaft
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ArrowGeometry {
    pub head_radius: f32,
    pub head_length: f32,
    pub shaft_radius: f32,
    pub shaft_length: f32,
    pub radial_segments: u32,
}

impl Default for ArrowGeometry {
    fn default() -> Self {
        Self {
            head_radius: 0.5,
            head_length: 1.0,
            shaft_radius: 0.2,
            shaft_length: 2.0,
            radial_segments: 6,
        }
    }
}

impl ArrowGeometry {
    pub fn total_length(&self) -> f32 {
        self.head_length + self.shaft_length
    }
}

/// Host rendering capability
pub trait Scene: Send {
    /// Create an instanced arrow mesh with room for `capacity` instances
    fn create_instanced_mesh(&mut self, geometry: &ArrowGeometry, capacity: usize) -> ObjectId;

    /// Number of instances actually drawn
    fn set_instance_count(&mut self, mesh: ObjectId, count: usize);

    fn set_instance(&mut self, mesh: ObjectId, index: usize, matrix: &Mat4, color: Color);

    /// Create a line segment set (pairs of vertices)
    fn create_lines(&mut self, vertices: &[Vec3], color: Color) -> ObjectId;

    /// Create a `width` x `height` plane in its local XY plane
    fn create_plane(&mut self, width: f32, height: f32) -> ObjectId;

    fn set_transform(&mut self, object: ObjectId, transform: &Transform);

    fn remove(&mut self, object: ObjectId);

    /// Upload encoded image bytes as a texture
    fn create_texture(&mut self, bytes: &[u8]) -> ImploreResult<TextureId>;

    fn set_texture(&mut self, object: ObjectId, texture: Option<TextureId>);

    /// Position the fill light
    fn set_light(&mut self, position: Vec3);

    /// Turn pointer-driven orbiting on or off
    fn enable_orbit_controls(&mut self, _enabled: bool) {}

    /// Let the host apply pending pointer input to the camera
    fn update_orbit_controls(&mut self, _camera: &mut Camera) {}

    fn render(&mut self, camera: &Camera);
}

// MARK: - Glyph instances

/// Instance matrix for a glyph arrow
///
/// Column-major. The arrow's +Z axis points from `position` to `target` and
/// the arrow is scaled uniformly by `magnitude * scale`.
pub fn instance_matrix(glyph: &GlyphInstance, scale: f32) -> Mat4 {
    let direction = vec_sub(glyph.target, glyph.position);
    let z = if vec_length(direction) > 0.0 {
        vec_scale(direction, 1.0 / vec_length(direction))
    } else {
        [0.0, 0.0, 1.0]
    };

    let mut x = vec_cross([0.0, 1.0, 0.0], z);
    if vec_length(x) < 1e-6 {
        // pointing straight up or down
        x = vec_cross([1.0, 0.0, 0.0], z);
    }
    let x = vec_normalize(x);
    let y = vec_cross(z, x);

    let s = glyph.magnitude * scale;
    let p = glyph.position;
    [
        [x[0] * s, x[1] * s, x[2] * s, 0.0],
        [y[0] * s, y[1] * s, y[2] * s, 0.0],
        [z[0] * s, z[1] * s, z[2] * s, 0.0],
        [p[0], p[1], p[2], 1.0],
    ]
}

#[derive(Clone, Debug, PartialEq)]
struct GlyphSync {
    generation: u64,
    palette: &'static str,
    scale: f32,
}

/// The instanced arrow mesh showing the current glyphs
#[derive(Debug, Default)]
pub struct GlyphLayer {
    geometry: ArrowGeometry,
    mesh: Option<ObjectId>,
    capacity: usize,
    count: usize,
    synced: Option<GlyphSync>,
}

impl GlyphLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push glyphs to the scene
    ///
    /// The mesh is only recreated when the glyph count outgrows it, and
    /// instances are only rewritten when glyphs, palette or scale changed.
    /// Returns whether instances were rewritten.
    pub fn sync(
        &mut self,
        scene: &mut dyn Scene,
        glyphs: &[GlyphInstance],
        generation: u64,
        palette: &Palette,
        max_magnitude: f32,
        scale: f32,
    ) -> bool {
        let wanted = GlyphSync {
            generation,
            palette: palette.name(),
            scale,
        };
        if self.synced.as_ref() == Some(&wanted) {
            return false;
        }

        if glyphs.len() > self.capacity || (self.mesh.is_none() && !glyphs.is_empty()) {
            if let Some(mesh) = self.mesh.take() {
                scene.remove(mesh);
            }
            self.mesh = Some(scene.create_instanced_mesh(&self.geometry, glyphs.len()));
            self.capacity = glyphs.len();
            self.count = self.capacity;
            debug!(capacity = self.capacity, "created glyph mesh");
        }

        if let Some(mesh) = self.mesh {
            if self.count != glyphs.len() {
                scene.set_instance_count(mesh, glyphs.len());
                self.count = glyphs.len();
            }
            for (i, glyph) in glyphs.iter().enumerate() {
                let color = palette.color_for(glyph.magnitude, max_magnitude);
                scene.set_instance(mesh, i, &instance_matrix(glyph, scale), color);
            }
        }

        self.synced = Some(wanted);
        true
    }

    pub fn mesh(&self) -> Option<ObjectId> {
        self.mesh
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of instances currently drawn
    pub fn count(&self) -> usize {
        self.count
    }
}

// MARK: - Wireframe box

/// Box outline as line segments
#[derive(Clone, Debug, PartialEq)]
pub struct WireframeBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl WireframeBox {
    /// Unit box centered at the origin
    pub fn unit() -> Self {
        Self {
            min: [-0.5, -0.5, -0.5],
            max: [0.5, 0.5, 0.5],
        }
    }

    fn corners(&self) -> [Vec3; 8] {
        let [x0, y0, z0] = self.min;
        let [x1, y1, z1] = self.max;
        [
            [x0, y0, z0],
            [x1, y0, z0],
            [x1, y1, z0],
            [x0, y1, z0],
            [x0, y0, z1],
            [x1, y0, z1],
            [x1, y1, z1],
            [x0, y1, z1],
        ]
    }

    /// 24 vertices: each of the 12 edges as a pair
    pub fn line_vertices(&self) -> Vec<Vec3> {
        const EDGES: [(usize, usize); 12] = [
            (0, 1),
            (1, 2),
            (2, 3),
            (3, 0),
            (4, 5),
            (5, 6),
            (6, 7),
            (7, 4),
            (0, 4),
            (1, 5),
            (2, 6),
            (3, 7),
        ];
        let corners = self.corners();
        EDGES
            .iter()
            .flat_map(|&(i, j)| [corners[i], corners[j]])
            .collect()
    }
}

impl Default for WireframeBox {
    fn default() -> Self {
        Self::unit()
    }
}

// MARK: - Headless scene

/// What a [`HeadlessScene`] object is
#[derive(Clone, Debug, PartialEq)]
pub enum ObjectKind {
    InstancedMesh {
        capacity: usize,
        count: usize,
        instances: Vec<(Mat4, Color)>,
    },
    Lines {
        vertices: Vec<Vec3>,
        color: Color,
    },
    Plane {
        width: f32,
        height: f32,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct SceneObject {
    pub kind: ObjectKind,
    pub transform: Transform,
    pub texture: Option<TextureId>,
}

/// Everything a [`HeadlessScene`] has been told
#[derive(Clone, Debug, Default)]
pub struct SceneState {
    pub objects: HashMap<ObjectId, SceneObject>,
    pub textures: HashMap<TextureId, usize>,
    pub light: Option<Vec3>,
    pub orbit_controls: bool,
    pub last_camera: Option<Camera>,
    pub frames: usize,
    pub meshes_created: usize,
    pub instance_writes: usize,
    next_id: u64,
}

impl SceneState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn add(&mut self, kind: ObjectKind) -> ObjectId {
        let id = ObjectId(self.next_id());
        self.objects.insert(
            id,
            SceneObject {
                kind,
                transform: Transform::default(),
                texture: None,
            },
        );
        id
    }

    /// The live instanced mesh, if any
    pub fn instanced_mesh(&self) -> Option<(ObjectId, &SceneObject)> {
        self.objects
            .iter()
            .find(|(_, o)| matches!(o.kind, ObjectKind::InstancedMesh { .. }))
            .map(|(id, o)| (*id, o))
    }

    /// Instances currently drawn by the live instanced mesh
    pub fn drawn_instances(&self) -> Vec<(Mat4, Color)> {
        match self.instanced_mesh().map(|(_, o)| &o.kind) {
            Some(ObjectKind::InstancedMesh {
                count, instances, ..
            }) => instances.iter().take(*count).cloned().collect(),
            _ => Vec::new(),
        }
    }

    pub fn lines(&self) -> Option<&SceneObject> {
        self.objects
            .values()
            .find(|o| matches!(o.kind, ObjectKind::Lines { .. }))
    }

    pub fn plane(&self) -> Option<&SceneObject> {
        self.objects
            .values()
            .find(|o| matches!(o.kind, ObjectKind::Plane { .. }))
    }
}

/// Recording scene for tests and headless runs
///
/// Clones share state. Textures are accepted as long as they are non-empty.
#[derive(Clone, Debug, Default)]
pub struct HeadlessScene {
    state: Arc<Mutex<SceneState>>,
}

impl HeadlessScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SceneState {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SceneState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Scene for HeadlessScene {
    fn create_instanced_mesh(&mut self, _geometry: &ArrowGeometry, capacity: usize) -> ObjectId {
        let mut state = self.lock();
        state.meshes_created += 1;
        state.add(ObjectKind::InstancedMesh {
            capacity,
            count: capacity,
            instances: vec![([[0.0; 4]; 4], Color::default()); capacity],
        })
    }

    fn set_instance_count(&mut self, mesh: ObjectId, count: usize) {
        if let Some(SceneObject {
            kind: ObjectKind::InstancedMesh {
                capacity,
                count: current,
                ..
            },
            ..
        }) = self.lock().objects.get_mut(&mesh)
        {
            *current = count.min(*capacity);
        }
    }

    fn set_instance(&mut self, mesh: ObjectId, index: usize, matrix: &Mat4, color: Color) {
        let mut state = self.lock();
        if let Some(SceneObject {
            kind: ObjectKind::InstancedMesh { instances, .. },
            ..
        }) = state.objects.get_mut(&mesh)
        {
            if let Some(slot) = instances.get_mut(index) {
                *slot = (*matrix, color);
            }
        }
        state.instance_writes += 1;
    }

    fn create_lines(&mut self, vertices: &[Vec3], color: Color) -> ObjectId {
        self.lock().add(ObjectKind::Lines {
            vertices: vertices.to_vec(),
            color,
        })
    }

    fn create_plane(&mut self, width: f32, height: f32) -> ObjectId {
        self.lock().add(ObjectKind::Plane { width, height })
    }

    fn set_transform(&mut self, object: ObjectId, transform: &Transform) {
        if let Some(o) = self.lock().objects.get_mut(&object) {
            o.transform = *transform;
        }
    }

    fn remove(&mut self, object: ObjectId) {
        self.lock().objects.remove(&object);
    }

    fn create_texture(&mut self, bytes: &[u8]) -> ImploreResult<TextureId> {
        if bytes.is_empty() {
            return Err(ImploreError::Scene("empty image".to_string()));
        }
        let mut state = self.lock();
        let id = TextureId(state.next_id());
        state.textures.insert(id, bytes.len());
        Ok(id)
    }

    fn set_texture(&mut self, object: ObjectId, texture: Option<TextureId>) {
        if let Some(o) = self.lock().objects.get_mut(&object) {
            o.texture = texture;
        }
    }

    fn set_light(&mut self, position: Vec3) {
        self.lock().light = Some(position);
    }

    fn enable_orbit_controls(&mut self, enabled: bool) {
        self.lock().orbit_controls = enabled;
    }

    fn render(&mut self, camera: &Camera) {
        let mut state = self.lock();
        state.frames += 1;
        state.last_camera = Some(camera.clone());
    }
}
