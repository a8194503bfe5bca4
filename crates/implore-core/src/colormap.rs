//! Colormaps for glyph coloring
//!
//! Built-in maps are defined by a handful of color stops and expanded into
//! fixed-size [`Palette`]s. Glyphs pick a palette entry by normalized
//! magnitude; the legend shows the same palette as a gradient.

use serde::{Deserialize, Serialize};

/// Number of entries in every palette
pub const PALETTE_SIZE: usize = 256;

/// A color in RGBA format (0.0 to 1.0)
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Create a color from RGB (alpha = 1.0)
    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Create a color from a packed `0xRRGGBB` value
    pub fn from_u32(rgb: u32) -> Self {
        Self::rgb(
            ((rgb >> 16) & 0xFF) as f32 / 255.0,
            ((rgb >> 8) & 0xFF) as f32 / 255.0,
            (rgb & 0xFF) as f32 / 255.0,
        )
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        let byte = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        format!("#{:02X}{:02X}{:02X}", byte(self.r), byte(self.g), byte(self.b))
    }

    /// Linear interpolation between two colors
    pub fn lerp(a: &Color, b: &Color, t: f32) -> Color {
        let t = t.clamp(0.0, 1.0);
        Color {
            r: a.r + (b.r - a.r) * t,
            g: a.g + (b.g - a.g) * t,
            b: a.b + (b.b - a.b) * t,
            a: a.a + (b.a - a.a) * t,
        }
    }

    pub fn to_array(&self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::rgb(0.5, 0.5, 0.5)
    }
}

/// A continuous colormap defined by evenly spaced stops
#[derive(Clone, Debug)]
pub struct Colormap {
    pub name: &'static str,
    stops: Vec<Color>,
}

impl Colormap {
    pub fn from_colors(name: &'static str, stops: Vec<Color>) -> Self {
        Self { name, stops }
    }

    /// Sample the colormap at a position (0.0 to 1.0)
    pub fn sample(&self, t: f32) -> Color {
        match self.stops.len() {
            0 => return Color::default(),
            1 => return self.stops[0],
            _ => {}
        }

        let scaled = t.clamp(0.0, 1.0) * (self.stops.len() - 1) as f32;
        let lower = (scaled.floor() as usize).min(self.stops.len() - 2);
        Color::lerp(&self.stops[lower], &self.stops[lower + 1], scaled - lower as f32)
    }

    /// Generate a lookup table of the specified size
    pub fn generate_lut(&self, size: usize) -> Vec<Color> {
        (0..size)
            .map(|i| self.sample(i as f32 / (size - 1).max(1) as f32))
            .collect()
    }
}

// MARK: - Built-in Colormaps

/// Rainbow-like map with perceptually smooth transitions (the default)
pub fn turbo() -> Colormap {
    Colormap::from_colors(
        "turbo",
        vec![
            Color::rgb(0.188, 0.071, 0.231),
            Color::rgb(0.275, 0.384, 0.843),
            Color::rgb(0.212, 0.667, 0.976),
            Color::rgb(0.102, 0.894, 0.714),
            Color::rgb(0.447, 0.996, 0.369),
            Color::rgb(0.784, 0.937, 0.204),
            Color::rgb(0.980, 0.729, 0.224),
            Color::rgb(0.965, 0.420, 0.098),
            Color::rgb(0.796, 0.165, 0.016),
            Color::rgb(0.478, 0.016, 0.012),
        ],
    )
}

/// Perceptually uniform, colorblind-safe
pub fn viridis() -> Colormap {
    Colormap::from_colors(
        "viridis",
        vec![
            Color::rgb(0.267, 0.005, 0.329),
            Color::rgb(0.282, 0.141, 0.458),
            Color::rgb(0.254, 0.265, 0.530),
            Color::rgb(0.207, 0.372, 0.553),
            Color::rgb(0.164, 0.471, 0.558),
            Color::rgb(0.128, 0.567, 0.551),
            Color::rgb(0.135, 0.659, 0.518),
            Color::rgb(0.267, 0.749, 0.441),
            Color::rgb(0.478, 0.821, 0.318),
            Color::rgb(0.741, 0.873, 0.150),
            Color::rgb(0.993, 0.906, 0.144),
        ],
    )
}

pub fn plasma() -> Colormap {
    Colormap::from_colors(
        "plasma",
        vec![
            Color::rgb(0.050, 0.030, 0.528),
            Color::rgb(0.294, 0.012, 0.615),
            Color::rgb(0.494, 0.012, 0.658),
            Color::rgb(0.665, 0.138, 0.614),
            Color::rgb(0.798, 0.280, 0.470),
            Color::rgb(0.898, 0.396, 0.304),
            Color::rgb(0.973, 0.558, 0.154),
            Color::rgb(0.992, 0.748, 0.159),
            Color::rgb(0.940, 0.975, 0.131),
        ],
    )
}

pub fn inferno() -> Colormap {
    Colormap::from_colors(
        "inferno",
        vec![
            Color::rgb(0.001, 0.000, 0.014),
            Color::rgb(0.133, 0.047, 0.263),
            Color::rgb(0.341, 0.063, 0.429),
            Color::rgb(0.550, 0.161, 0.506),
            Color::rgb(0.735, 0.216, 0.330),
            Color::rgb(0.878, 0.392, 0.102),
            Color::rgb(0.978, 0.557, 0.035),
            Color::rgb(0.992, 0.772, 0.247),
            Color::rgb(0.988, 0.998, 0.645),
        ],
    )
}

pub fn magma() -> Colormap {
    Colormap::from_colors(
        "magma",
        vec![
            Color::rgb(0.001, 0.000, 0.014),
            Color::rgb(0.116, 0.042, 0.232),
            Color::rgb(0.271, 0.051, 0.404),
            Color::rgb(0.461, 0.098, 0.495),
            Color::rgb(0.665, 0.176, 0.515),
            Color::rgb(0.844, 0.295, 0.461),
            Color::rgb(0.962, 0.507, 0.454),
            Color::rgb(0.992, 0.738, 0.600),
            Color::rgb(0.987, 0.991, 0.750),
        ],
    )
}

/// Diverging blue-white-red
pub fn coolwarm() -> Colormap {
    Colormap::from_colors(
        "coolwarm",
        vec![
            Color::rgb(0.230, 0.299, 0.754),
            Color::rgb(0.552, 0.691, 0.996),
            Color::rgb(0.865, 0.865, 0.865),
            Color::rgb(0.957, 0.647, 0.510),
            Color::rgb(0.706, 0.016, 0.150),
        ],
    )
}

/// Names of all built-in palettes, in panel order
pub fn palette_names() -> Vec<&'static str> {
    vec!["turbo", "viridis", "plasma", "inferno", "magma", "coolwarm"]
}

/// Get a built-in colormap by name
pub fn get_colormap(name: &str) -> Option<Colormap> {
    match name.to_lowercase().as_str() {
        "turbo" => Some(turbo()),
        "viridis" => Some(viridis()),
        "plasma" => Some(plasma()),
        "inferno" => Some(inferno()),
        "magma" => Some(magma()),
        "coolwarm" => Some(coolwarm()),
        _ => None,
    }
}

// MARK: - Palette

/// A named, fixed-size color table
#[derive(Clone, Debug, PartialEq)]
pub struct Palette {
    name: &'static str,
    colors: Vec<Color>,
}

impl Palette {
    /// Expand a colormap into a [`PALETTE_SIZE`]-entry table
    pub fn from_colormap(colormap: &Colormap) -> Self {
        Self {
            name: colormap.name,
            colors: colormap.generate_lut(PALETTE_SIZE),
        }
    }

    /// Look up a built-in palette
    pub fn by_name(name: &str) -> Option<Self> {
        get_colormap(name).map(|c| Self::from_colormap(&c))
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn colors(&self) -> &[Color] {
        &self.colors
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Palette index for `magnitude` relative to `max`
    ///
    /// Always in `[0, len - 1]`: the exact maximum maps to the last entry,
    /// and a non-positive or non-finite maximum maps everything to 0.
    pub fn index_for(&self, magnitude: f32, max: f32) -> usize {
        let last = self.colors.len().saturating_sub(1);
        if max.is_nan() || max <= 0.0 || !magnitude.is_finite() {
            return 0;
        }
        let scaled = (magnitude / max * last as f32).floor().max(0.0);
        (scaled as usize).min(last)
    }

    pub fn color_for(&self, magnitude: f32, max: f32) -> Color {
        self.colors
            .get(self.index_for(magnitude, max))
            .copied()
            .unwrap_or_default()
    }

    /// Left-to-right gradient of the palette as a CSS value
    pub fn gradient_css(&self) -> String {
        const STOPS: usize = 16;
        let last = self.colors.len().saturating_sub(1);
        let stops: Vec<String> = (0..=STOPS)
            .filter_map(|i| {
                let color = self.colors.get(i * last / STOPS)?;
                Some(format!("{} {}%", color.to_hex(), i * 100 / STOPS))
            })
            .collect();
        format!("linear-gradient(to right, {})", stops.join(", "))
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::from_colormap(&turbo())
    }
}
