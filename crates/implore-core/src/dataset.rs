//! Dataset manifest model
//!
//! A dataset is a location (archive or plain directory) plus the manifest
//! found at `data.json` inside it. The manifest names the available vector
//! fields and, optionally, a volumetric image stack.

use std::collections::BTreeMap;

use implore_io::{ArchiveResolver, ByteSource, DataLocation};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DatasetError, DatasetResult, ImploreResult};

/// Manifest file name, relative to the dataset location
pub const MANIFEST_FILE: &str = "data.json";

/// Field name that selects no field at all
pub const NONE_FIELD: &str = "none";

fn default_factor() -> f64 {
    1.0
}

/// One vector field: node positions plus one vector per node
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Path of the node position array (N x 3)
    pub nodes: String,
    /// Path of the vector array (N x 3)
    pub vectors: String,
    /// Unit label shown in the legend
    #[serde(default)]
    pub unit: String,
    /// Converts the field's native unit into render-space magnitude
    #[serde(default = "default_factor")]
    pub factor: f64,
}

impl FieldDescriptor {
    /// Legend title for this field
    pub fn label(&self, name: &str) -> String {
        format!("{} ({})", name, self.unit)
    }
}

/// Volumetric image stack accompanying a dataset
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StackDescriptor {
    /// Image shape in voxels (x, y, z)
    pub im_shape: [usize; 3],
    /// Voxel size per axis
    pub voxel_size: [f64; 3],
    /// Number of depth slices with an image
    pub z_slices_count: usize,
    /// Channel names; the first one is displayed
    #[serde(default)]
    pub channels: Vec<String>,
}

impl StackDescriptor {
    /// Physical size of the stack per axis
    pub fn physical_size(&self) -> [f64; 3] {
        [
            self.im_shape[0] as f64 * self.voxel_size[0],
            self.im_shape[1] as f64 * self.voxel_size[1],
            self.im_shape[2] as f64 * self.voxel_size[2],
        ]
    }

    /// Whether the stack has slice images to show
    pub fn has_images(&self) -> bool {
        self.z_slices_count > 0 && !self.channels.is_empty()
    }

    /// Archive path of the image for depth slice `index`
    pub fn slice_path(&self, index: usize) -> Option<String> {
        let channel = self.channels.first()?;
        Some(format!("stacks/0/{}/{:03}.jpg", channel, index))
    }
}

/// Parsed `data.json`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub fields: BTreeMap<String, FieldDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stacks: Option<StackDescriptor>,
}

impl Manifest {
    /// Parse a manifest from JSON text
    pub fn from_json(json: &str) -> DatasetResult<Self> {
        serde_json::from_str(json).map_err(|e| DatasetError::InvalidManifest {
            message: e.to_string(),
        })
    }

    /// Parse a manifest from raw bytes
    pub fn from_slice(bytes: &[u8]) -> DatasetResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| DatasetError::InvalidManifest {
            message: e.to_string(),
        })
    }

    /// Field names in display order
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.get(name)
    }

    pub fn has_fields(&self) -> bool {
        !self.fields.is_empty()
    }
}

/// A loaded dataset
///
/// Datasets are never mutated in place; switching data produces a new
/// `Dataset` with a fresh identity.
#[derive(Clone, Debug)]
pub struct Dataset {
    id: Uuid,
    location: DataLocation,
    manifest: Manifest,
}

impl Dataset {
    pub fn new(location: DataLocation, manifest: Manifest) -> Self {
        Self {
            id: Uuid::new_v4(),
            location,
            manifest,
        }
    }

    /// Fetch and parse the manifest at `location`
    ///
    /// Archives are searched for `data.json`; plain directories fall back
    /// to fetching `<location>/data.json` directly.
    pub async fn load<S: ByteSource>(
        resolver: &ArchiveResolver<S>,
        location: DataLocation,
    ) -> ImploreResult<Self> {
        let bytes = resolver
            .resolve(&location, MANIFEST_FILE)
            .await
            .map_err(|e| DatasetError::ManifestUnavailable {
                location: location.to_string(),
                message: e.to_string(),
            })?;
        let manifest = Manifest::from_slice(&bytes)?;

        info!(
            location = %location,
            fields = manifest.fields.len(),
            stack = manifest.stacks.is_some(),
            "loaded dataset manifest"
        );
        Ok(Self::new(location, manifest))
    }

    /// Build the dataset that replaces `self` after a drop of `location`
    ///
    /// An archive carrying its own manifest brings it along; otherwise the
    /// current manifest is kept and only the location changes. An embedded
    /// manifest that cannot be read or parsed fails the drop.
    pub async fn from_drop<S: ByteSource>(
        &self,
        resolver: &ArchiveResolver<S>,
        location: DataLocation,
    ) -> ImploreResult<Self> {
        let index = match resolver.index(&location).await {
            Ok(index) if index.contains(MANIFEST_FILE) => index,
            _ => {
                debug!(location = %location, "keeping current manifest for dropped data");
                return Ok(self.with_location(location));
            }
        };

        let bytes = index
            .read(MANIFEST_FILE)
            .map_err(|e| DatasetError::ManifestUnavailable {
                location: location.to_string(),
                message: e.to_string(),
            })?;
        let manifest = Manifest::from_slice(&bytes)?;

        info!(location = %location, "dropped archive carries its own manifest");
        Ok(Self::new(location, manifest))
    }

    /// Same manifest at a new location, under a new identity
    pub fn with_location(&self, location: DataLocation) -> Self {
        Self::new(location, self.manifest.clone())
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn location(&self) -> &DataLocation {
        &self.location
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.manifest.field(name)
    }

    pub fn stack(&self) -> Option<&StackDescriptor> {
        self.manifest.stacks.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use implore_io::MemorySource;

    const MANIFEST: &str = r#"{
        "fields": {
            "forces": {"nodes": "nodes.npy", "vectors": "forces.npy", "unit": "pN", "factor": 0.5},
            "displacements": {"nodes": "nodes.npy", "vectors": "u.npy"}
        },
        "stacks": {
            "im_shape": [100, 80, 20],
            "voxel_size": [0.5, 0.5, 2.0],
            "z_slices_count": 20,
            "channels": ["actin", "beads"]
        }
    }"#;

    #[test]
    fn test_manifest_parse() {
        let manifest = Manifest::from_json(MANIFEST).unwrap();
        let names: Vec<_> = manifest.field_names().collect();
        assert_eq!(names, vec!["displacements", "forces"]);

        let forces = manifest.field("forces").unwrap();
        assert_eq!(forces.factor, 0.5);
        assert_eq!(forces.label("forces"), "forces (pN)");

        let u = manifest.field("displacements").unwrap();
        assert_eq!(u.factor, 1.0);
        assert_eq!(u.unit, "");
    }

    #[test]
    fn test_manifest_without_stack() {
        let manifest = Manifest::from_json(r#"{"fields": {}}"#).unwrap();
        assert!(manifest.stacks.is_none());
        assert!(!manifest.has_fields());
    }

    #[test]
    fn test_manifest_rejects_garbage() {
        assert!(matches!(
            Manifest::from_json("{\"fields\": 3}"),
            Err(DatasetError::InvalidManifest { .. })
        ));
    }

    #[test]
    fn test_stack_geometry() {
        let manifest = Manifest::from_json(MANIFEST).unwrap();
        let stack = manifest.stacks.unwrap();
        assert_eq!(stack.physical_size(), [50.0, 40.0, 40.0]);
        assert_eq!(stack.slice_path(7).unwrap(), "stacks/0/actin/007.jpg");
        assert!(stack.has_images());
    }

    #[tokio::test]
    async fn test_load_from_directory() {
        let source = MemorySource::new();
        source.insert("run1/data.json", MANIFEST.as_bytes().to_vec());
        let resolver = ArchiveResolver::new(source);

        let dataset = Dataset::load(&resolver, DataLocation::path("run1"))
            .await
            .unwrap();
        assert_eq!(dataset.manifest().fields.len(), 2);
        assert!(dataset.stack().is_some());
    }

    #[tokio::test]
    async fn test_load_missing_manifest() {
        let resolver = ArchiveResolver::new(MemorySource::new());
        let err = Dataset::load(&resolver, DataLocation::path("nowhere"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::ImploreError::DatasetLoad(DatasetError::ManifestUnavailable { .. })
        ));
    }

    #[test]
    fn test_with_location_mints_new_identity() {
        let dataset = Dataset::new(
            DataLocation::path("a"),
            Manifest::from_json(MANIFEST).unwrap(),
        );
        let moved = dataset.with_location(DataLocation::path("b"));
        assert_ne!(dataset.id(), moved.id());
        assert_eq!(moved.location(), &DataLocation::path("b"));
        assert_eq!(moved.manifest(), dataset.manifest());
    }

    #[tokio::test]
    async fn test_drop_without_manifest_keeps_fields() {
        let resolver = ArchiveResolver::new(MemorySource::new());
        let dataset = Dataset::new(
            DataLocation::path("a"),
            Manifest::from_json(MANIFEST).unwrap(),
        );
        let dropped = dataset
            .from_drop(&resolver, DataLocation::blob("raw.bin", vec![1, 2, 3]))
            .await
            .unwrap();
        assert_eq!(dropped.manifest().fields.len(), 2);
        assert_ne!(dropped.id(), dataset.id());
    }

    #[tokio::test]
    async fn test_drop_with_corrupt_manifest_fails() {
        use std::io::{Cursor, Write};

        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file(MANIFEST_FILE, zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"{not json").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let resolver = ArchiveResolver::new(MemorySource::new());
        let dataset = Dataset::new(
            DataLocation::path("a"),
            Manifest::from_json(MANIFEST).unwrap(),
        );
        let err = dataset
            .from_drop(&resolver, DataLocation::blob("new.zip", bytes))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::ImploreError::DatasetLoad(DatasetError::InvalidManifest { .. })
        ));
    }
}
