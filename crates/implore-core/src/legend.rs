//! Colormap legend
//!
//! The legend is a gradient swatch with five evenly spaced tick labels and
//! a title. [`Legend`] remembers what it last pushed to the surface and
//! only touches the parts whose inputs changed.

use std::sync::{Arc, Mutex};

use tracing::trace;

use crate::colormap::Palette;

/// Number of tick labels under the gradient
pub const TICK_COUNT: usize = 5;

/// Host-side legend widget
pub trait LegendSurface: Send {
    fn set_visible(&mut self, visible: bool);

    /// Set the gradient swatch, as a CSS gradient value
    fn set_gradient(&mut self, gradient: &str);

    /// Place tick `index` at `position` (0.0 left to 1.0 right)
    fn set_tick(&mut self, index: usize, position: f32, label: &str);

    fn set_title(&mut self, title: &str);
}

/// Which parts of the legend an update touched
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LegendUpdate {
    pub visibility: bool,
    pub gradient: bool,
    pub ticks: bool,
    pub title: bool,
}

impl LegendUpdate {
    pub fn is_empty(&self) -> bool {
        !(self.visibility || self.gradient || self.ticks || self.title)
    }
}

/// Tick values for a legend spanning `[0, max]`
pub fn tick_values(max: f32) -> [f32; TICK_COUNT] {
    let mut ticks = [0.0; TICK_COUNT];
    for (i, tick) in ticks.iter_mut().enumerate() {
        *tick = i as f32 / (TICK_COUNT - 1) as f32 * max;
    }
    ticks
}

/// Format a tick value with one decimal
pub fn tick_label(value: f32) -> String {
    format!("{:.1}", value)
}

/// Last state applied to a [`LegendSurface`]
#[derive(Debug, Default)]
pub struct Legend {
    visible: Option<bool>,
    palette: Option<&'static str>,
    max: Option<f32>,
    title: Option<String>,
}

impl Legend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bring `surface` in line with the given palette, maximum and title
    ///
    /// A maximum of zero hides the legend; hidden legends are not otherwise
    /// updated until they become visible again.
    pub fn update(
        &mut self,
        surface: &mut dyn LegendSurface,
        palette: &Palette,
        max: f32,
        title: &str,
    ) -> LegendUpdate {
        let mut update = LegendUpdate::default();

        let visible = max != 0.0;
        if self.visible != Some(visible) {
            surface.set_visible(visible);
            self.visible = Some(visible);
            update.visibility = true;
        }
        if !visible {
            return update;
        }

        if self.palette != Some(palette.name()) {
            surface.set_gradient(&palette.gradient_css());
            self.palette = Some(palette.name());
            update.gradient = true;
        }

        if self.max != Some(max) {
            for (i, value) in tick_values(max).into_iter().enumerate() {
                let position = i as f32 / (TICK_COUNT - 1) as f32;
                surface.set_tick(i, position, &tick_label(value));
            }
            self.max = Some(max);
            update.ticks = true;
        }

        if self.title.as_deref() != Some(title) {
            surface.set_title(title);
            self.title = Some(title.to_string());
            update.title = true;
        }

        if !update.is_empty() {
            trace!(?update, max, title, "legend updated");
        }
        update
    }

    pub fn is_visible(&self) -> bool {
        self.visible.unwrap_or(false)
    }
}

// MARK: - Headless surface

/// Snapshot of a [`HeadlessLegend`]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LegendState {
    pub visible: bool,
    pub gradient: String,
    pub ticks: Vec<(f32, String)>,
    pub title: String,
    /// Number of setter calls received
    pub mutations: usize,
}

/// Legend surface that records what it is told
///
/// Clones share state, so a host can keep one to inspect after handing
/// the other to the engine.
#[derive(Clone, Debug, Default)]
pub struct HeadlessLegend {
    state: Arc<Mutex<LegendState>>,
}

impl HeadlessLegend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> LegendState {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LegendState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl LegendSurface for HeadlessLegend {
    fn set_visible(&mut self, visible: bool) {
        let mut state = self.lock();
        state.visible = visible;
        state.mutations += 1;
    }

    fn set_gradient(&mut self, gradient: &str) {
        let mut state = self.lock();
        state.gradient = gradient.to_string();
        state.mutations += 1;
    }

    fn set_tick(&mut self, index: usize, position: f32, label: &str) {
        let mut state = self.lock();
        if state.ticks.len() <= index {
            state.ticks.resize(index + 1, (0.0, String::new()));
        }
        state.ticks[index] = (position, label.to_string());
        state.mutations += 1;
    }

    fn set_title(&mut self, title: &str) {
        let mut state = self.lock();
        state.title = title.to_string();
        state.mutations += 1;
    }
}
