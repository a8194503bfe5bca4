//! Time-based animations
//!
//! Each active animation advances independently every frame from the wall
//! clock delta. Animations only report what they changed; the engine
//! decides what to recompute.

use serde::{Deserialize, Serialize};

use crate::camera::Camera;

fn default_scan_speed() -> f64 {
    10.0
}

fn default_rotate_speed() -> f32 {
    10.0
}

fn default_tilt_top() -> f32 {
    120.0
}

fn default_tilt_bottom() -> f32 {
    30.0
}

/// One entry of `ViewParams::animations`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Animation {
    /// Step through the image stack, `speed` slices per second
    #[serde(alias = "scan")]
    DepthScan {
        #[serde(default = "default_scan_speed")]
        speed: f64,
        #[serde(skip)]
        position: f64,
    },

    /// Orbit the camera around the vertical axis, `speed` degrees per second
    #[serde(alias = "rotate")]
    AutoRotate {
        #[serde(default = "default_rotate_speed")]
        speed: f32,
    },

    /// Tilt the camera with the page scroll position
    ///
    /// `top` is the polar angle (degrees) when the view has scrolled out at
    /// the top of the window, `bottom` when it sits at the bottom.
    #[serde(alias = "tilt")]
    ScrollTilt {
        #[serde(default = "default_tilt_top")]
        top: f32,
        #[serde(default = "default_tilt_bottom")]
        bottom: f32,
        #[serde(skip)]
        last_top: Option<f32>,
    },
}

impl Animation {
    pub fn depth_scan(speed: f64) -> Self {
        Animation::DepthScan {
            speed,
            position: 0.0,
        }
    }

    pub fn auto_rotate(speed: f32) -> Self {
        Animation::AutoRotate { speed }
    }

    pub fn scroll_tilt(top: f32, bottom: f32) -> Self {
        Animation::ScrollTilt {
            top,
            bottom,
            last_top: None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Animation::DepthScan { .. } => "depth-scan",
            Animation::AutoRotate { .. } => "auto-rotate",
            Animation::ScrollTilt { .. } => "scroll-tilt",
        }
    }
}

/// Where the host view sits in the window, in pixels
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    /// Top edge relative to the window top (negative once scrolled past)
    pub top: f32,
    pub height: f32,
    pub window_height: f32,
}

impl Viewport {
    /// 0.0 when the view has scrolled out at the top, 1.0 at the bottom
    pub fn scroll_progress(&self) -> f32 {
        let total = self.window_height + self.height;
        if total <= 0.0 {
            return 0.0;
        }
        (self.top + self.height) / total
    }
}

/// What the animations changed this frame
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameEffects {
    /// New depth index written by a depth scan
    pub depth: Option<usize>,
}

/// Advance every animation by `dt` seconds
pub fn step_animations(
    animations: &mut [Animation],
    dt: f32,
    slice_count: usize,
    camera: &mut Camera,
    viewport: Option<&Viewport>,
) -> FrameEffects {
    let mut effects = FrameEffects::default();

    for animation in animations.iter_mut() {
        match animation {
            Animation::DepthScan { speed, position } => {
                if slice_count == 0 {
                    continue;
                }
                *position += *speed * dt as f64;
                let wrapped = position.rem_euclid(slice_count as f64);
                effects.depth = Some((wrapped.floor() as usize).min(slice_count - 1));
            }
            Animation::AutoRotate { speed } => {
                let mut spherical = camera.spherical();
                spherical.theta += speed.to_radians() * dt;
                camera.set_spherical(spherical);
            }
            Animation::ScrollTilt {
                top,
                bottom,
                last_top,
            } => {
                let Some(viewport) = viewport else {
                    continue;
                };
                if *last_top == Some(viewport.top) {
                    continue;
                }
                let factor = viewport.scroll_progress();
                let mut spherical = camera.spherical();
                spherical.phi = (*top * (1.0 - factor) + *bottom * factor).to_radians();
                camera.set_spherical(spherical);
                *last_top = Some(viewport.top);
            }
        }
    }

    effects
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_defaults() {
        let animations: Vec<Animation> = serde_json::from_str(
            r#"[{"type": "depth-scan"}, {"type": "rotate", "speed": 5}, {"type": "scroll-tilt", "top": 90}]"#,
        )
        .unwrap();
        assert_eq!(
            animations,
            vec![
                Animation::depth_scan(10.0),
                Animation::auto_rotate(5.0),
                Animation::scroll_tilt(90.0, 30.0),
            ]
        );
    }

    #[test]
    fn test_depth_scan_wraps() {
        let mut animations = vec![Animation::depth_scan(10.0)];
        let mut camera = Camera::default();

        let effects = step_animations(&mut animations, 0.25, 4, &mut camera, None);
        assert_eq!(effects.depth, Some(2));
        assert_eq!(camera.spherical(), Camera::default().spherical());

        let effects = step_animations(&mut animations, 0.25, 4, &mut camera, None);
        assert_eq!(effects.depth, Some(1));
    }

    #[test]
    fn test_depth_scan_without_stack() {
        let mut animations = vec![Animation::depth_scan(10.0)];
        let mut camera = Camera::default();
        let effects = step_animations(&mut animations, 1.0, 0, &mut camera, None);
        assert_eq!(effects.depth, None);
    }

    #[test]
    fn test_auto_rotate_advances_azimuth() {
        let mut animations = vec![Animation::auto_rotate(10.0)];
        let mut camera = Camera::default();
        camera.orbit_to(Some(10.0), 30.0, 60.0);

        let effects = step_animations(&mut animations, 2.0, 0, &mut camera, None);
        assert_eq!(effects.depth, None);
        let s = camera.spherical();
        assert!((s.theta - 50.0_f32.to_radians()).abs() < 1e-4);
        assert!((s.radius - 10.0).abs() < 1e-3);
        assert!((s.phi - 60.0_f32.to_radians()).abs() < 1e-4);
    }

    #[test]
    fn test_scroll_tilt_only_on_scroll() {
        let mut animations = vec![Animation::scroll_tilt(120.0, 30.0)];
        let mut camera = Camera::default();
        camera.orbit_to(Some(10.0), 30.0, 60.0);

        // View centered in an 800px window: progress 0.5
        let viewport = Viewport {
            top: 300.0,
            height: 200.0,
            window_height: 800.0,
        };
        step_animations(&mut animations, 0.016, 0, &mut camera, Some(&viewport));
        assert!((camera.spherical().phi - 75.0_f32.to_radians()).abs() < 1e-4);

        // an unchanged viewport leaves a manual tilt alone
        camera.orbit_to(Some(10.0), 30.0, 45.0);
        step_animations(&mut animations, 0.016, 0, &mut camera, Some(&viewport));
        assert!((camera.spherical().phi - 45.0_f32.to_radians()).abs() < 1e-4);
    }
}
