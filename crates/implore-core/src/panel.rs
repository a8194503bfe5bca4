//! Parameter panel descriptors
//!
//! The panel is described declaratively: a list of controls with their
//! kind, range or options and current value, rebuilt from the dataset each
//! time. The host renders them with whatever widget toolkit it has and
//! feeds edits back through [`parse_control`] (or `Engine::set_control`).

use serde::{Deserialize, Serialize};

use crate::colormap::palette_names;
use crate::dataset::{Dataset, NONE_FIELD};
use crate::error::{validation, PanelError, PanelResult};
use crate::view::{CubeMode, ImageMode, ParamChange, ViewParams};

/// Upper bound of the glyph scale slider
pub const MAX_SCALE: f64 = 10.0;

/// Kind of a control, with its constraints
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ControlKind {
    /// Numeric slider
    Slider {
        min: f64,
        max: f64,
        step: Option<f64>,
    },

    /// Choice from a list of options
    Choice { options: Vec<String> },

    /// Boolean checkbox
    Toggle,
}

/// Value of a control
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ControlValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl ControlValue {
    /// Try to extract as f64
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ControlValue::Float(v) => Some(*v),
            ControlValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Try to extract as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ControlValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to extract as string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ControlValue::String(v) => Some(v),
            _ => None,
        }
    }
}

impl From<f64> for ControlValue {
    fn from(v: f64) -> Self {
        ControlValue::Float(v)
    }
}

impl From<bool> for ControlValue {
    fn from(v: bool) -> Self {
        ControlValue::Bool(v)
    }
}

impl From<&str> for ControlValue {
    fn from(v: &str) -> Self {
        ControlValue::String(v.to_string())
    }
}

/// One control on the panel
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ControlDescriptor {
    /// Parameter the control is bound to
    pub name: String,
    pub label: String,
    pub kind: ControlKind,
    pub value: ControlValue,
}

impl ControlDescriptor {
    fn slider(name: &str, label: &str, min: f64, max: f64, step: Option<f64>, value: f64) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            kind: ControlKind::Slider { min, max, step },
            value: ControlValue::Float(value),
        }
    }

    fn choice(name: &str, label: &str, options: Vec<String>, value: &str) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            kind: ControlKind::Choice { options },
            value: ControlValue::String(value.to_string()),
        }
    }

    fn toggle(name: &str, label: &str, value: bool) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            kind: ControlKind::Toggle,
            value: ControlValue::Bool(value),
        }
    }

    /// Options of a choice control
    pub fn options(&self) -> Option<&[String]> {
        match &self.kind {
            ControlKind::Choice { options } => Some(options),
            _ => None,
        }
    }
}

/// Controls offered for `dataset` under the current `params`
///
/// Field controls only appear when the dataset defines fields; image and
/// depth controls only when it has a stack.
pub fn build_controls(dataset: &Dataset, params: &ViewParams) -> Vec<ControlDescriptor> {
    let manifest = dataset.manifest();
    let has_fields = manifest.has_fields();
    let stack = dataset.stack();
    let mut controls = Vec::new();

    if has_fields {
        let mut fields = vec![NONE_FIELD.to_string()];
        fields.extend(manifest.field_names().map(str::to_string));

        controls.push(ControlDescriptor::slider(
            "scale",
            "Scale",
            0.0,
            MAX_SCALE,
            None,
            params.scale as f64,
        ));
        controls.push(ControlDescriptor::choice("field", "Field", fields, &params.field));
        controls.push(ControlDescriptor::choice(
            "cmap",
            "Colormap",
            palette_names().into_iter().map(str::to_string).collect(),
            &params.cmap,
        ));
    }

    let mut cubes = vec![CubeMode::None];
    if has_fields {
        cubes.push(CubeMode::Field);
    }
    if stack.is_some() {
        cubes.push(CubeMode::Stack);
    }
    controls.push(ControlDescriptor::choice(
        "cube",
        "Cube",
        cubes.iter().map(|c| c.as_str().to_string()).collect(),
        params.cube.as_str(),
    ));

    if stack.is_some() {
        controls.push(ControlDescriptor::choice(
            "image",
            "Image",
            [ImageMode::None, ImageMode::DepthTracking, ImageMode::Floor]
                .iter()
                .map(|m| m.as_str().to_string())
                .collect(),
            params.image.as_str(),
        ));
    }

    if has_fields {
        controls.push(ControlDescriptor::toggle(
            "show_colormap",
            "Show colormap",
            params.show_colormap,
        ));
    }

    if let Some(stack) = stack {
        controls.push(ControlDescriptor::slider(
            "z",
            "Depth",
            0.0,
            stack.z_slices_count.saturating_sub(1) as f64,
            Some(1.0),
            params.z as f64,
        ));
    }

    controls
}

/// Validate an edit of control `name` and turn it into a parameter change
pub fn parse_control(
    controls: &[ControlDescriptor],
    name: &str,
    value: &ControlValue,
) -> PanelResult<ParamChange> {
    let control = controls
        .iter()
        .find(|c| c.name == name)
        .ok_or_else(|| PanelError::UnknownControl {
            name: name.to_string(),
        })?;
    let mismatch = |expected: &str| PanelError::TypeMismatch {
        name: name.to_string(),
        expected: expected.to_string(),
    };

    match &control.kind {
        ControlKind::Slider { min, max, .. } => {
            let v = value.as_float().ok_or_else(|| mismatch("numeric"))?;
            validation::validate_range(name, v, *min, *max)?;
            match name {
                "scale" => Ok(ParamChange::Scale(v as f32)),
                "z" => Ok(ParamChange::Z(v.round() as usize)),
                _ => Err(PanelError::UnknownControl {
                    name: name.to_string(),
                }),
            }
        }
        ControlKind::Choice { options } => {
            let v = value.as_str().ok_or_else(|| mismatch("string"))?;
            validation::validate_option(name, v, options)?;
            let invalid = || PanelError::InvalidOption {
                name: name.to_string(),
                value: v.to_string(),
            };
            match name {
                "field" => Ok(ParamChange::Field(v.to_string())),
                "cmap" => Ok(ParamChange::Cmap(v.to_string())),
                "cube" => CubeMode::from_name(v).map(ParamChange::Cube).ok_or_else(invalid),
                "image" => ImageMode::from_name(v)
                    .map(ParamChange::Image)
                    .ok_or_else(invalid),
                _ => Err(PanelError::UnknownControl {
                    name: name.to_string(),
                }),
            }
        }
        ControlKind::Toggle => {
            let v = value.as_bool().ok_or_else(|| mismatch("boolean"))?;
            match name {
                "show_colormap" => Ok(ParamChange::ShowColormap(v)),
                _ => Err(PanelError::UnknownControl {
                    name: name.to_string(),
                }),
            }
        }
    }
}
