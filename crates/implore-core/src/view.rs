//! View parameters
//!
//! This module defines:
//! - ViewParams: the shared configuration read by every scene component
//! - ParamChange: the single way to mutate it
//! - ChangeSet: which dependents a mutation made stale

use serde::{Deserialize, Serialize};

use crate::animation::Animation;
use crate::dataset::NONE_FIELD;
use crate::error::{ImploreError, ImploreResult};

/// Which bounds the wireframe cube shows
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CubeMode {
    None,
    /// Extent of the displayed field
    #[default]
    Field,
    /// Physical size of the image stack
    Stack,
}

impl CubeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CubeMode::None => "none",
            CubeMode::Field => "field",
            CubeMode::Stack => "stack",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "none" => Some(CubeMode::None),
            "field" => Some(CubeMode::Field),
            "stack" => Some(CubeMode::Stack),
            _ => None,
        }
    }
}

/// How the stack image plane is placed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImageMode {
    /// Plane collapsed
    None,
    /// Plane follows the current depth index
    #[default]
    #[serde(alias = "z-pos")]
    DepthTracking,
    /// Plane pinned to the bottom of the stack
    Floor,
}

impl ImageMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageMode::None => "none",
            ImageMode::DepthTracking => "depth-tracking",
            ImageMode::Floor => "floor",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "none" => Some(ImageMode::None),
            "depth-tracking" | "z-pos" => Some(ImageMode::DepthTracking),
            "floor" => Some(ImageMode::Floor),
            _ => None,
        }
    }
}

/// Engine configuration
///
/// Absent keys in the initial JSON keep their defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewParams {
    /// Glyph size multiplier
    pub scale: f32,

    /// Displayed field, or "none"
    pub field: String,

    /// Palette name
    pub cmap: String,

    pub cube: CubeMode,

    pub image: ImageMode,

    /// Current depth index into the image stack
    pub z: usize,

    /// Divides the initial camera radius
    pub zoom: f32,

    pub animations: Vec<Animation>,

    /// Whether the host shows the parameter panel
    pub show_controls: bool,

    pub show_colormap: bool,

    /// Pointer-driven orbit controls
    pub mouse_control: bool,

    /// Fetch every slice image up front instead of on demand
    pub pre_load_images: bool,

    /// Node position units to scene units (metres to micrometres)
    pub position_scale: f64,

    /// Wireframe cube color, `0xRRGGBB`
    pub cube_color: u32,
}

impl Default for ViewParams {
    fn default() -> Self {
        Self {
            scale: 1.0,
            field: "fitted deformations".to_string(),
            cmap: "turbo".to_string(),
            cube: CubeMode::default(),
            image: ImageMode::default(),
            z: 0,
            zoom: 1.0,
            animations: Vec::new(),
            show_controls: true,
            show_colormap: true,
            mouse_control: true,
            pre_load_images: true,
            position_scale: 1e6,
            cube_color: 0x000000,
        }
    }
}

impl ViewParams {
    /// Parse initial parameters from a JSON object
    pub fn from_json(json: &str) -> ImploreResult<Self> {
        let params: Self = serde_json::from_str(json)
            .map_err(|e| ImploreError::InvalidConfig(e.to_string()))?;
        params.validate()?;
        Ok(params)
    }

    /// Check invariants that serde cannot express
    pub fn validate(&self) -> ImploreResult<()> {
        check_scale(self.scale)?;
        check_zoom(self.zoom)?;
        if !(self.position_scale.is_finite() && self.position_scale > 0.0) {
            return Err(ImploreError::InvalidConfig(format!(
                "position_scale must be positive, got {}",
                self.position_scale
            )));
        }
        Ok(())
    }

    pub fn has_field(&self) -> bool {
        self.field != NONE_FIELD
    }

    /// Apply one change and report what it made stale
    ///
    /// Setting a parameter to its current value changes nothing. A value
    /// that breaks an invariant is rejected and leaves the parameters as
    /// they were.
    pub fn apply(&mut self, change: ParamChange) -> ImploreResult<ChangeSet> {
        change.validate()?;
        Ok(self.apply_checked(change))
    }

    fn apply_checked(&mut self, change: ParamChange) -> ChangeSet {
        match change {
            ParamChange::Scale(scale) => {
                if self.scale == scale {
                    return ChangeSet::none();
                }
                self.scale = scale;
                ChangeSet {
                    glyphs: true,
                    ..ChangeSet::none()
                }
            }
            ParamChange::Field(field) => {
                if self.field == field {
                    return ChangeSet::none();
                }
                self.field = field;
                ChangeSet {
                    field: true,
                    glyphs: true,
                    legend: true,
                    cube: true,
                    ..ChangeSet::none()
                }
            }
            ParamChange::Cmap(cmap) => {
                if self.cmap == cmap {
                    return ChangeSet::none();
                }
                self.cmap = cmap;
                ChangeSet {
                    glyphs: true,
                    legend: true,
                    ..ChangeSet::none()
                }
            }
            ParamChange::Cube(cube) => {
                if self.cube == cube {
                    return ChangeSet::none();
                }
                self.cube = cube;
                ChangeSet {
                    cube: true,
                    ..ChangeSet::none()
                }
            }
            ParamChange::Image(image) => {
                if self.image == image {
                    return ChangeSet::none();
                }
                self.image = image;
                ChangeSet {
                    image: true,
                    ..ChangeSet::none()
                }
            }
            ParamChange::Z(z) => {
                if self.z == z {
                    return ChangeSet::none();
                }
                self.z = z;
                ChangeSet {
                    image: true,
                    ..ChangeSet::none()
                }
            }
            ParamChange::ShowColormap(show) => {
                if self.show_colormap == show {
                    return ChangeSet::none();
                }
                self.show_colormap = show;
                ChangeSet {
                    legend: true,
                    ..ChangeSet::none()
                }
            }
            ParamChange::Zoom(zoom) => {
                if self.zoom == zoom {
                    return ChangeSet::none();
                }
                self.zoom = zoom;
                ChangeSet {
                    camera: true,
                    ..ChangeSet::none()
                }
            }
            ParamChange::MouseControl(enabled) => {
                if self.mouse_control == enabled {
                    return ChangeSet::none();
                }
                self.mouse_control = enabled;
                ChangeSet {
                    camera: true,
                    ..ChangeSet::none()
                }
            }
            ParamChange::Animations(animations) => {
                // Animations are read every frame; nothing else depends on them
                self.animations = animations;
                ChangeSet::none()
            }
        }
    }
}

/// A single parameter mutation
#[derive(Clone, Debug, PartialEq)]
pub enum ParamChange {
    Scale(f32),
    Field(String),
    Cmap(String),
    Cube(CubeMode),
    Image(ImageMode),
    Z(usize),
    ShowColormap(bool),
    Zoom(f32),
    MouseControl(bool),
    Animations(Vec<Animation>),
}

impl ParamChange {
    /// Check the new value on its own, before it touches any parameters
    pub fn validate(&self) -> ImploreResult<()> {
        match self {
            ParamChange::Scale(scale) => check_scale(*scale),
            ParamChange::Zoom(zoom) => check_zoom(*zoom),
            _ => Ok(()),
        }
    }
}

fn check_scale(scale: f32) -> ImploreResult<()> {
    if !scale.is_finite() || scale < 0.0 {
        return Err(ImploreError::InvalidConfig(format!(
            "scale must be non-negative, got {}",
            scale
        )));
    }
    Ok(())
}

fn check_zoom(zoom: f32) -> ImploreResult<()> {
    if !(zoom.is_finite() && zoom > 0.0) {
        return Err(ImploreError::InvalidConfig(format!(
            "zoom must be positive, got {}",
            zoom
        )));
    }
    Ok(())
}

/// Dependents made stale by parameter or dataset changes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Field arrays must be (re)loaded
    pub field: bool,
    /// Glyph instances must be rewritten
    pub glyphs: bool,
    pub legend: bool,
    pub cube: bool,
    pub image: bool,
    pub camera: bool,
}

impl ChangeSet {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Self {
            field: true,
            glyphs: true,
            legend: true,
            cube: true,
            image: true,
            camera: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::none()
    }

    pub fn merge(&mut self, other: ChangeSet) {
        self.field |= other.field;
        self.glyphs |= other.glyphs;
        self.legend |= other.legend;
        self.cube |= other.cube;
        self.image |= other.image;
        self.camera |= other.camera;
    }
}
