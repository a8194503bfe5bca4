//! Scene engine
//!
//! Composes the dataset, field builder, glyph layer, legend, bounding cube,
//! slice presenter and camera behind the host's [`Scene`] and
//! [`LegendSurface`].
//!
//! # Scheduling
//!
//! [`Engine::frame`] never awaits. Field loads and slice fetches run as
//! spawned tasks and report back over a channel; each frame drains what has
//! arrived, applies it, and renders. A frame may therefore show stale
//! glyphs while a load is outstanding.
//!
//! Every load is tagged with what it was issued for (field key or dataset
//! identity). Results whose tag no longer matches the current state are
//! dropped, so swapping datasets mid-load cannot overwrite the new one.
//!
//! All methods that start loads must run inside a tokio runtime.

use std::sync::Arc;
use std::time::Instant;

use implore_io::{ArchiveResolver, ByteSource, DataLocation};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::animation::{step_animations, Viewport};
use crate::camera::{light_position, Camera, DEFAULT_PHI_DEGREES, DEFAULT_THETA_DEGREES};
use crate::colormap::{Color, Palette};
use crate::cube::{cube_transform, BoundingCube};
use crate::dataset::Dataset;
use crate::error::{validation, ImploreResult};
use crate::field::{load_field, FieldBuild, FieldBuilder, FieldKey};
use crate::legend::{Legend, LegendSurface};
use crate::panel::{build_controls, parse_control, ControlDescriptor, ControlValue};
use crate::render::{GlyphLayer, Scene};
use crate::slices::{fetch_slice, SlicePresenter};
use crate::view::{ChangeSet, ParamChange, ViewParams};

/// Result of a spawned load, delivered to the frame loop
#[derive(Debug)]
enum LoadEvent {
    Field {
        key: FieldKey,
        result: ImploreResult<FieldBuild>,
    },
    Slice {
        dataset: Uuid,
        index: usize,
        result: ImploreResult<Vec<u8>>,
    },
}

/// The visualization engine for one view
pub struct Engine<S: ByteSource> {
    resolver: ArchiveResolver<S>,
    dataset: Arc<Dataset>,
    params: ViewParams,

    scene: Box<dyn Scene>,
    legend_surface: Box<dyn LegendSurface>,

    fields: FieldBuilder,
    pending_field: Option<FieldKey>,
    glyphs: GlyphLayer,
    legend: Legend,
    cube: BoundingCube,
    slices: Option<SlicePresenter>,

    camera: Camera,
    /// Zoom the camera was last framed with
    framed_zoom: Option<f32>,

    dirty: ChangeSet,
    events_tx: mpsc::UnboundedSender<LoadEvent>,
    events_rx: mpsc::UnboundedReceiver<LoadEvent>,
    in_flight: usize,
    last_frame: Option<Instant>,
}

impl<S: ByteSource> Engine<S> {
    /// Load the manifest at `location` and build an engine around it
    pub async fn open(
        resolver: ArchiveResolver<S>,
        location: DataLocation,
        params: ViewParams,
        scene: Box<dyn Scene>,
        legend_surface: Box<dyn LegendSurface>,
    ) -> ImploreResult<Self> {
        let dataset = Dataset::load(&resolver, location).await?;
        Ok(Self::new(resolver, dataset, params, scene, legend_surface))
    }

    /// Build an engine for an already loaded dataset
    ///
    /// Nothing is drawn until the first frame; slice prefetches start
    /// right away when enabled.
    pub fn new(
        resolver: ArchiveResolver<S>,
        dataset: Dataset,
        params: ViewParams,
        scene: Box<dyn Scene>,
        legend_surface: Box<dyn LegendSurface>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let mut engine = Self {
            resolver,
            dataset: Arc::new(dataset),
            params,
            scene,
            legend_surface,
            fields: FieldBuilder::new(),
            pending_field: None,
            glyphs: GlyphLayer::new(),
            legend: Legend::new(),
            cube: BoundingCube::new(),
            slices: None,
            camera: Camera::default(),
            framed_zoom: None,
            dirty: ChangeSet::all(),
            events_tx,
            events_rx,
            in_flight: 0,
            last_frame: None,
        };

        info!(
            dataset = %engine.dataset.id(),
            location = %engine.dataset.location(),
            field = %engine.params.field,
            "engine created"
        );
        engine.install_slices();
        engine
    }

    // MARK: - Accessors

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn params(&self) -> &ViewParams {
        &self.params
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn resolver(&self) -> &ArchiveResolver<S> {
        &self.resolver
    }

    pub fn field_builder(&self) -> &FieldBuilder {
        &self.fields
    }

    pub fn glyph_layer(&self) -> &GlyphLayer {
        &self.glyphs
    }

    pub fn slices(&self) -> Option<&SlicePresenter> {
        self.slices.as_ref()
    }

    pub fn legend_visible(&self) -> bool {
        self.legend.is_visible()
    }

    /// Field load currently in flight, if any
    pub fn pending_field(&self) -> Option<&FieldKey> {
        self.pending_field.as_ref()
    }

    /// Whether any spawned load has not reported back yet
    pub fn is_loading(&self) -> bool {
        self.in_flight > 0
    }

    /// Panel controls for the current dataset and parameters
    pub fn controls(&self) -> Vec<ControlDescriptor> {
        build_controls(&self.dataset, &self.params)
    }

    // MARK: - Interaction

    /// Apply a parameter change; stale dependents are refreshed next frame
    pub fn set_param(&mut self, change: ParamChange) -> ImploreResult<ChangeSet> {
        let changes = self.params.apply(change)?;
        self.dirty.merge(changes);
        Ok(changes)
    }

    /// Apply an edit coming from panel control `name`
    pub fn set_control(&mut self, name: &str, value: &ControlValue) -> ImploreResult<ChangeSet> {
        let change = parse_control(&self.controls(), name, value)?;
        self.set_param(change)
    }

    /// Switch to `dataset`, keeping every view parameter and the camera
    ///
    /// The current glyphs stay on screen until the new field arrives.
    pub fn replace_dataset(&mut self, dataset: Dataset) {
        info!(
            dataset = %dataset.id(),
            location = %dataset.location(),
            "replacing dataset"
        );
        if let Some(slices) = self.slices.take() {
            slices.remove(self.scene.as_mut());
        }
        self.dataset = Arc::new(dataset);
        self.pending_field = None;
        self.install_slices();
        self.dirty.merge(ChangeSet {
            camera: false,
            ..ChangeSet::all()
        });
    }

    /// Replace the dataset with a dropped file or archive
    ///
    /// A drop whose embedded manifest is unusable leaves the current
    /// dataset in place.
    pub async fn drop_location(&mut self, location: DataLocation) -> ImploreResult<()> {
        match self.dataset.from_drop(&self.resolver, location).await {
            Ok(dataset) => {
                self.replace_dataset(dataset);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "rejected dropped data, keeping current dataset");
                Err(e)
            }
        }
    }

    /// Match the camera to a host view of `width` x `height` pixels
    ///
    /// Empty sizes (a hidden or collapsed view) are ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.camera.aspect_ratio = width as f32 / height as f32;
        debug!(width, height, aspect = self.camera.aspect_ratio, "resized view");
    }

    // MARK: - Frame loop

    /// Advance one frame by `dt` seconds and render
    pub fn frame(&mut self, dt: f32, viewport: Option<Viewport>) {
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
        }

        if self.params.mouse_control {
            self.scene.update_orbit_controls(&mut self.camera);
        }

        let slice_count = self.slices.as_ref().map_or(0, |s| s.slice_count());
        let effects = step_animations(
            &mut self.params.animations,
            dt,
            slice_count,
            &mut self.camera,
            viewport.as_ref(),
        );
        if let Some(depth) = effects.depth {
            if let Err(e) = self.set_param(ParamChange::Z(depth)) {
                warn!(error = %e, depth, "depth scan step rejected");
            }
        }

        self.update_all();

        self.scene.set_light(light_position(&self.camera));
        self.scene.render(&self.camera);
    }

    /// Advance by the wall-clock time since the previous tick and render
    pub fn tick(&mut self, viewport: Option<Viewport>) {
        let now = Instant::now();
        let dt = self
            .last_frame
            .map_or(0.0, |last| now.duration_since(last).as_secs_f32());
        self.last_frame = Some(now);
        self.frame(dt, viewport);
    }

    /// Wait for every outstanding load and apply it, without rendering
    pub async fn settle(&mut self) {
        loop {
            self.update_all();
            if self.in_flight == 0 {
                break;
            }
            match self.events_rx.recv().await {
                Some(event) => self.handle_event(event),
                None => break,
            }
        }
    }

    /// Bring every stale dependent up to date
    pub fn update_all(&mut self) {
        let changes = std::mem::take(&mut self.dirty);

        if changes.field {
            self.request_field();
        }

        let palette = if changes.glyphs || changes.legend {
            Some(self.palette())
        } else {
            None
        };

        if let (true, Some(palette)) = (changes.glyphs, palette.as_ref()) {
            self.glyphs.sync(
                self.scene.as_mut(),
                self.fields.glyphs(),
                self.fields.generation(),
                palette,
                self.fields.max_magnitude(),
                self.params.scale,
            );
        }

        if let (true, Some(palette)) = (changes.legend, palette.as_ref()) {
            let max = if self.params.show_colormap && !self.fields.glyphs().is_empty() {
                self.fields.max_magnitude()
            } else {
                0.0
            };
            let title = self
                .dataset
                .field(&self.params.field)
                .map(|d| d.label(&self.params.field))
                .unwrap_or_default();
            self.legend
                .update(self.legend_surface.as_mut(), palette, max, &title);
        }

        if changes.cube {
            let transform = cube_transform(
                self.params.cube,
                &self.fields.extent(),
                self.dataset.stack(),
                self.params.position_scale,
            );
            self.cube.update(
                self.scene.as_mut(),
                transform,
                Color::from_u32(self.params.cube_color),
            );
        }

        if changes.image {
            let (mode, z) = (self.params.image, self.params.z);
            let fetch = self
                .slices
                .as_mut()
                .and_then(|s| s.update(self.scene.as_mut(), mode, z));
            if let Some(index) = fetch {
                self.spawn_slice(index);
            }
        }

        if changes.camera {
            self.scene.enable_orbit_controls(self.params.mouse_control);
        }
        // first framing waits for the initial field so its extent is known
        let framing_due = match self.framed_zoom {
            Some(zoom) => zoom != self.params.zoom,
            None => self.pending_field.is_none(),
        };
        if framing_due {
            self.frame_camera();
        }
    }

    // MARK: - Loads

    fn request_field(&mut self) {
        let key = FieldKey::new(&self.dataset, &self.params.field);
        if self.fields.is_current(&key) {
            // a load for some other field may still be in flight
            self.pending_field = None;
            return;
        }
        if self.pending_field.as_ref() == Some(&key) {
            return;
        }

        if key.is_none() {
            self.pending_field = None;
            self.fields.clear_glyphs(key);
            return;
        }
        if let Err(e) =
            validation::validate_field_exists(&key.field, self.dataset.manifest().field_names())
        {
            warn!(error = %e, "keeping current glyphs");
            self.pending_field = None;
            return;
        }

        debug!(field = %key.field, dataset = %key.dataset, "requesting field");
        self.pending_field = Some(key.clone());
        self.in_flight += 1;

        let resolver = self.resolver.clone();
        let dataset = self.dataset.clone();
        let tx = self.events_tx.clone();
        let position_scale = self.params.position_scale;
        tokio::spawn(async move {
            let result = load_field(&resolver, &dataset, &key.field, position_scale).await;
            let _ = tx.send(LoadEvent::Field { key, result });
        });
    }

    fn spawn_slice(&mut self, index: usize) {
        self.in_flight += 1;

        let resolver = self.resolver.clone();
        let dataset = self.dataset.clone();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = fetch_slice(&resolver, &dataset, index).await;
            let _ = tx.send(LoadEvent::Slice {
                dataset: dataset.id(),
                index,
                result,
            });
        });
    }

    fn install_slices(&mut self) {
        let dataset = self.dataset.clone();
        let Some(stack) = dataset.stack().filter(|s| s.has_images()) else {
            return;
        };

        let mut presenter = SlicePresenter::new(self.scene.as_mut(), dataset.id(), stack);
        if self.params.pre_load_images {
            let indices = presenter.begin_prefetch();
            debug!(slices = indices.len(), "prefetching slice images");
            for index in indices {
                self.spawn_slice(index);
            }
        }
        self.slices = Some(presenter);
    }

    fn handle_event(&mut self, event: LoadEvent) {
        self.in_flight = self.in_flight.saturating_sub(1);

        match event {
            LoadEvent::Field { key, result } => {
                if self.pending_field.as_ref() != Some(&key) {
                    debug!(field = %key.field, dataset = %key.dataset, "discarding stale field load");
                    return;
                }
                self.pending_field = None;

                match result {
                    Ok(build) => {
                        self.fields.install(key, build);
                        self.dirty.merge(ChangeSet {
                            glyphs: true,
                            legend: true,
                            cube: true,
                            ..ChangeSet::none()
                        });
                    }
                    Err(e) => {
                        warn!(field = %key.field, error = %e, "field load failed, keeping current glyphs");
                    }
                }
            }
            LoadEvent::Slice {
                dataset,
                index,
                result,
            } => {
                let Some(slices) = self.slices.as_mut().filter(|s| s.dataset() == dataset) else {
                    debug!(%dataset, index, "discarding slice for replaced dataset");
                    return;
                };
                let texture = result.and_then(|bytes| self.scene.create_texture(&bytes));
                slices.install(self.scene.as_mut(), index, texture);
            }
        }
    }

    // MARK: - Helpers

    fn palette(&self) -> Palette {
        Palette::by_name(&self.params.cmap).unwrap_or_else(|| {
            warn!(cmap = %self.params.cmap, "unknown colormap, using default");
            Palette::default()
        })
    }

    /// Place the camera so the whole field (or stack) is in view
    fn frame_camera(&mut self) {
        let radius = if self.fields.has_loaded() {
            4.0 * self.fields.extent().max_abs() * self.params.position_scale
        } else if let Some(stack) = self.dataset.stack() {
            2.0 * stack.physical_size()[0]
        } else {
            0.0
        };

        let radius = (radius > 0.0).then(|| radius as f32 / self.params.zoom);
        self.camera
            .orbit_to(radius, DEFAULT_THETA_DEGREES, DEFAULT_PHI_DEGREES);
        self.framed_zoom = Some(self.params.zoom);
        debug!(radius = self.camera.distance(), "framed camera");
    }
}
