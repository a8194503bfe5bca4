//! Camera for the glyph scene
//!
//! A perspective camera orbiting a target, positioned in spherical
//! coordinates. Angles follow the usual y-up convention: the polar angle
//! `phi` is measured from +Y and the azimuth `theta` around +Y from +Z.

use serde::{Deserialize, Serialize};

/// 3D vector type
pub type Vec3 = [f32; 3];

/// 4x4 matrix type (column-major)
pub type Mat4 = [[f32; 4]; 4];

/// Vertical field of view of the scene camera, in degrees
pub const DEFAULT_FOV_DEGREES: f32 = 20.0;

/// Initial azimuth, in degrees
pub const DEFAULT_THETA_DEGREES: f32 = 30.0;

/// Initial polar angle, in degrees
pub const DEFAULT_PHI_DEGREES: f32 = 60.0;

/// Azimuth offset of the fill light from the camera, in degrees
pub const LIGHT_OFFSET_DEGREES: f32 = 30.0;

/// Spherical coordinates around a center
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Spherical {
    pub radius: f32,
    /// Polar angle from +Y, radians
    pub phi: f32,
    /// Azimuth around +Y from +Z, radians
    pub theta: f32,
}

impl Spherical {
    pub fn new(radius: f32, phi: f32, theta: f32) -> Self {
        Self { radius, phi, theta }
    }

    /// Spherical coordinates of an offset vector
    pub fn from_vec3(v: Vec3) -> Self {
        let radius = vec_length(v);
        if radius == 0.0 {
            return Self::new(0.0, 0.0, 0.0);
        }
        Self {
            radius,
            theta: v[0].atan2(v[2]),
            phi: (v[1] / radius).clamp(-1.0, 1.0).acos(),
        }
    }

    /// Offset vector for these coordinates
    pub fn to_vec3(&self) -> Vec3 {
        let sin_phi_radius = self.phi.sin() * self.radius;
        [
            sin_phi_radius * self.theta.sin(),
            self.phi.cos() * self.radius,
            sin_phi_radius * self.theta.cos(),
        ]
    }
}

/// Camera configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Camera {
    /// Camera position in world space
    pub position: Vec3,

    /// Look-at target
    pub target: Vec3,

    /// Up vector (usually [0, 1, 0])
    pub up: Vec3,

    /// Vertical field of view in radians
    pub fov: f32,

    /// Near clipping plane
    pub near: f32,

    /// Far clipping plane
    pub far: f32,

    /// Aspect ratio (width / height)
    pub aspect_ratio: f32,
}

impl Camera {
    /// Create a new perspective camera
    pub fn perspective(position: Vec3, target: Vec3, fov_degrees: f32, aspect: f32) -> Self {
        Self {
            position,
            target,
            up: [0.0, 1.0, 0.0],
            fov: fov_degrees.to_radians(),
            near: 0.1,
            far: 10000.0,
            aspect_ratio: aspect,
        }
    }

    /// Get the view matrix (world to camera space)
    pub fn view_matrix(&self) -> Mat4 {
        look_at(self.position, self.target, self.up)
    }

    /// Get the projection matrix
    pub fn projection_matrix(&self) -> Mat4 {
        perspective(self.fov, self.aspect_ratio, self.near, self.far)
    }

    /// Get combined view-projection matrix
    pub fn view_projection_matrix(&self) -> Mat4 {
        mat4_multiply(self.projection_matrix(), self.view_matrix())
    }

    /// Get camera forward direction
    pub fn forward(&self) -> Vec3 {
        vec_normalize(vec_sub(self.target, self.position))
    }

    /// Get distance from camera to target
    pub fn distance(&self) -> f32 {
        vec_length(vec_sub(self.target, self.position))
    }

    /// Position relative to the target, in spherical coordinates
    pub fn spherical(&self) -> Spherical {
        Spherical::from_vec3(vec_sub(self.position, self.target))
    }

    /// Place the camera at `spherical` around its target and look at it
    pub fn set_spherical(&mut self, spherical: Spherical) {
        self.position = vec_add(self.target, spherical.to_vec3());
        // far plane grows with the orbit radius
        self.far = self.far.max(spherical.radius * 4.0);
    }

    /// Orbit to the given angles (degrees), keeping the radius unless one is given
    pub fn orbit_to(&mut self, radius: Option<f32>, theta_degrees: f32, phi_degrees: f32) {
        let radius = radius.unwrap_or_else(|| self.distance());
        self.set_spherical(Spherical::new(
            radius,
            phi_degrees.to_radians(),
            theta_degrees.to_radians(),
        ));
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::perspective([0.0, 0.0, 5.0], [0.0, 0.0, 0.0], DEFAULT_FOV_DEGREES, 1.0)
    }
}

/// Fill light position: on the camera's sphere, rotated 30° in azimuth
pub fn light_position(camera: &Camera) -> Vec3 {
    let mut spherical = camera.spherical();
    spherical.theta += LIGHT_OFFSET_DEGREES.to_radians();
    vec_add(camera.target, spherical.to_vec3())
}

// MARK: - Math utilities

pub(crate) fn vec_add(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

pub(crate) fn vec_sub(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

pub(crate) fn vec_scale(v: Vec3, s: f32) -> Vec3 {
    [v[0] * s, v[1] * s, v[2] * s]
}

pub(crate) fn vec_dot(a: Vec3, b: Vec3) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

pub(crate) fn vec_cross(a: Vec3, b: Vec3) -> Vec3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

pub(crate) fn vec_length(v: Vec3) -> f32 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

pub(crate) fn vec_normalize(v: Vec3) -> Vec3 {
    let len = vec_length(v);
    if len > 0.0001 {
        vec_scale(v, 1.0 / len)
    } else {
        v
    }
}

fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
    let f = vec_normalize(vec_sub(target, eye));
    let s = vec_normalize(vec_cross(f, up));
    let u = vec_cross(s, f);

    [
        [s[0], u[0], -f[0], 0.0],
        [s[1], u[1], -f[1], 0.0],
        [s[2], u[2], -f[2], 0.0],
        [-vec_dot(s, eye), -vec_dot(u, eye), vec_dot(f, eye), 1.0],
    ]
}

fn perspective(fov: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
    let tan_half_fov = (fov / 2.0).tan();

    let mut m = [[0.0; 4]; 4];
    m[0][0] = 1.0 / (aspect * tan_half_fov);
    m[1][1] = 1.0 / tan_half_fov;
    m[2][2] = -(far + near) / (far - near);
    m[2][3] = -1.0;
    m[3][2] = -(2.0 * far * near) / (far - near);

    m
}

pub(crate) fn mat4_multiply(a: Mat4, b: Mat4) -> Mat4 {
    let mut result = [[0.0; 4]; 4];

    for i in 0..4 {
        for j in 0..4 {
            for k in 0..4 {
                result[i][j] += a[k][j] * b[i][k];
            }
        }
    }

    result
}
