//! Vector field builder
//!
//! Turns a field's node and vector arrays into glyph placements. Simulation
//! output uses a different axis convention from the scene, so every point
//! and vector goes through [`remap`] on its way in.

use implore_io::{ArchiveResolver, ByteSource, NumericArray};
use tracing::{debug, info};
use uuid::Uuid;

use crate::dataset::{Dataset, NONE_FIELD};
use crate::error::{DatasetError, ImploreResult};

/// Map simulation axes onto scene axes: `(x, y, z) -> (-y, z, -x)`, scaled
pub fn remap(p: [f64; 3], factor: f64) -> [f64; 3] {
    [-p[1] * factor, p[2] * factor, -p[0] * factor]
}

/// One arrow: where it sits, where it points, how long it is
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GlyphInstance {
    pub position: [f32; 3],
    pub target: [f32; 3],
    pub magnitude: f32,
}

impl GlyphInstance {
    /// Direction vector from position to target
    pub fn direction(&self) -> [f32; 3] {
        [
            self.target[0] - self.position[0],
            self.target[1] - self.position[1],
            self.target[2] - self.position[2],
        ]
    }
}

/// Axis-aligned bounds of raw node positions
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Extent {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl Default for Extent {
    fn default() -> Self {
        Self {
            min: [0.0; 3],
            max: [1.0; 3],
        }
    }
}

impl Extent {
    /// Degenerate extent around a single point
    pub fn at(p: [f64; 3]) -> Self {
        Self { min: p, max: p }
    }

    /// Grow to include `p`
    pub fn include(&mut self, p: [f64; 3]) {
        for axis in 0..3 {
            self.min[axis] = self.min[axis].min(p[axis]);
            self.max[axis] = self.max[axis].max(p[axis]);
        }
    }

    pub fn span(&self) -> [f64; 3] {
        [
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        ]
    }

    pub fn center(&self) -> [f64; 3] {
        [
            (self.min[0] + self.max[0]) / 2.0,
            (self.min[1] + self.max[1]) / 2.0,
            (self.min[2] + self.max[2]) / 2.0,
        ]
    }

    /// Largest absolute coordinate on any axis
    pub fn max_abs(&self) -> f64 {
        self.min
            .iter()
            .chain(self.max.iter())
            .fold(0.0, |acc: f64, v| acc.max(v.abs()))
    }

    pub fn contains(&self, p: [f64; 3]) -> bool {
        (0..3).all(|axis| self.min[axis] <= p[axis] && p[axis] <= self.max[axis])
    }
}

/// Result of building one field
#[derive(Clone, Debug, PartialEq)]
pub struct FieldBuild {
    pub field: String,
    pub glyphs: Vec<GlyphInstance>,
    pub extent: Extent,
    pub max_magnitude: f32,
}

/// Memoization key: a build is redone only when one of these changes
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldKey {
    pub dataset: Uuid,
    pub field: String,
    pub location: String,
}

impl FieldKey {
    pub fn new(dataset: &Dataset, field: &str) -> Self {
        Self {
            dataset: dataset.id(),
            field: field.to_string(),
            location: dataset.location().cache_key(),
        }
    }

    pub fn is_none(&self) -> bool {
        self.field == NONE_FIELD
    }
}

/// Resolve, decode and build one field of `dataset`
pub async fn load_field<S: ByteSource>(
    resolver: &ArchiveResolver<S>,
    dataset: &Dataset,
    field: &str,
    position_scale: f64,
) -> ImploreResult<FieldBuild> {
    let descriptor = dataset
        .field(field)
        .ok_or_else(|| DatasetError::FieldNotFound {
            field: field.to_string(),
        })?;

    debug!(field, nodes = %descriptor.nodes, vectors = %descriptor.vectors, "loading field");
    let location = dataset.location();
    let (nodes, vectors) = tokio::join!(
        resolver.resolve(location, &descriptor.nodes),
        resolver.resolve(location, &descriptor.vectors),
    );
    let nodes = NumericArray::decode(&nodes?)?;
    let vectors = NumericArray::decode(&vectors?)?;

    let build = build_glyphs(field, &nodes, &vectors, descriptor.factor, position_scale)?;
    info!(
        field,
        glyphs = build.glyphs.len(),
        max_magnitude = build.max_magnitude,
        "built field"
    );
    Ok(build)
}

/// Build glyphs from decoded node and vector arrays
///
/// One glyph per node row. Vector rows beyond the node count are ignored;
/// fewer vector rows than nodes is an error.
pub fn build_glyphs(
    field: &str,
    nodes: &NumericArray,
    vectors: &NumericArray,
    factor: f64,
    position_scale: f64,
) -> ImploreResult<FieldBuild> {
    let invalid = |message: String| DatasetError::InvalidField {
        field: field.to_string(),
        message,
    };

    let nodes = nodes.matrix()?;
    let vectors = vectors.matrix()?;
    if nodes.ncols() < 3 || vectors.ncols() < 3 {
        return Err(invalid(format!(
            "expected 3 columns, got {} nodes x {} vectors",
            nodes.ncols(),
            vectors.ncols()
        ))
        .into());
    }
    if vectors.nrows() < nodes.nrows() {
        return Err(invalid(format!(
            "{} nodes but only {} vectors",
            nodes.nrows(),
            vectors.nrows()
        ))
        .into());
    }

    let count = nodes.nrows();
    let mut glyphs = Vec::with_capacity(count);
    let mut extent: Option<Extent> = None;
    let mut max_magnitude = 0.0f32;

    for i in 0..count {
        let raw = [nodes[[i, 0]], nodes[[i, 1]], nodes[[i, 2]]];
        let vector = [vectors[[i, 0]], vectors[[i, 1]], vectors[[i, 2]]];

        match extent.as_mut() {
            Some(e) => e.include(raw),
            None => extent = Some(Extent::at(raw)),
        }

        let position = remap(raw, position_scale);
        let direction = remap(vector, factor);
        let magnitude = (direction[0] * direction[0]
            + direction[1] * direction[1]
            + direction[2] * direction[2])
            .sqrt() as f32;
        max_magnitude = max_magnitude.max(magnitude);

        glyphs.push(GlyphInstance {
            position: position.map(|v| v as f32),
            target: [
                (position[0] + direction[0]) as f32,
                (position[1] + direction[1]) as f32,
                (position[2] + direction[2]) as f32,
            ],
            magnitude,
        });
    }

    Ok(FieldBuild {
        field: field.to_string(),
        glyphs,
        extent: extent.unwrap_or_default(),
        max_magnitude,
    })
}

// MARK: - FieldBuilder

/// Holds the displayed field and decides when it must be rebuilt
///
/// Extent and maximum magnitude outlive the glyphs: selecting no field
/// empties the glyph list but keeps both.
#[derive(Debug, Default)]
pub struct FieldBuilder {
    key: Option<FieldKey>,
    glyphs: Vec<GlyphInstance>,
    extent: Extent,
    max_magnitude: f32,
    loaded: bool,
    generation: u64,
}

impl FieldBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `key` is what is currently displayed
    pub fn is_current(&self, key: &FieldKey) -> bool {
        self.key.as_ref() == Some(key)
    }

    /// Install a finished build under `key`
    pub fn install(&mut self, key: FieldKey, build: FieldBuild) {
        self.glyphs = build.glyphs;
        self.extent = build.extent;
        self.max_magnitude = build.max_magnitude;
        self.loaded = true;
        self.key = Some(key);
        self.generation += 1;
    }

    /// Show no glyphs under `key`, keeping extent and maximum
    pub fn clear_glyphs(&mut self, key: FieldKey) {
        if !self.glyphs.is_empty() {
            self.glyphs.clear();
            self.generation += 1;
        }
        self.key = Some(key);
    }

    /// Rebuild `field` of `dataset` unless it is already displayed
    ///
    /// Returns whether anything changed. On error the previous glyphs stay.
    pub async fn build<S: ByteSource>(
        &mut self,
        resolver: &ArchiveResolver<S>,
        dataset: &Dataset,
        field: &str,
        position_scale: f64,
    ) -> ImploreResult<bool> {
        let key = FieldKey::new(dataset, field);
        if self.is_current(&key) {
            return Ok(false);
        }
        if key.is_none() {
            self.clear_glyphs(key);
            return Ok(true);
        }

        let build = load_field(resolver, dataset, field, position_scale).await?;
        self.install(key, build);
        Ok(true)
    }

    pub fn key(&self) -> Option<&FieldKey> {
        self.key.as_ref()
    }

    pub fn glyphs(&self) -> &[GlyphInstance] {
        &self.glyphs
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    pub fn max_magnitude(&self) -> f32 {
        self.max_magnitude
    }

    /// Whether any field has ever been installed
    pub fn has_loaded(&self) -> bool {
        self.loaded
    }

    /// Bumped whenever the glyph list changes
    pub fn generation(&self) -> u64 {
        self.generation
    }
}
