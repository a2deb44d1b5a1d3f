//! Test doubles for the render manager
//!
//! - [`RecordingDevice`]: keeps every property pushed to each surface and the
//!   draw commands of the last paint
//! - [`ManualFrameScheduler`]: frames only run when the test says so
//!
//! Enabled under `cfg(test)` and by the `testing` feature.

use rustc_hash::FxHashMap;
use trellis_core::{AffineTransform, Camera, Canvas, Color, Rect, Size, ViewId};

use crate::device::{GraphicsDevice, GraphicsSurface};
use crate::display::Display;
use crate::frame::{FrameScheduler, FrameTask};

/// Frames run per [`Display::run_jobs`] call at most
const MAX_FRAMES: usize = 64;

/// One call made on a [`RecordingCanvas`]
#[derive(Clone, Debug, PartialEq)]
pub enum DrawCommand {
    Clear,
    FillRect { rect: Rect, color: Color },
    StrokeRect { rect: Rect, color: Color, thickness: f64 },
    PushTransform(AffineTransform),
    PopTransform,
    PushClip(Rect),
    PopClip,
    PushOpacity(f32),
    PopOpacity,
}

/// Canvas that records the calls made on it
#[derive(Clone, Debug, Default)]
pub struct RecordingCanvas {
    size: Size,
    commands: Vec<DrawCommand>,
}

impl RecordingCanvas {
    pub fn new(size: Size) -> Self {
        Self {
            size,
            commands: Vec::new(),
        }
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn into_commands(self) -> Vec<DrawCommand> {
        self.commands
    }
}

impl Canvas for RecordingCanvas {
    fn size(&self) -> Size {
        self.size
    }

    fn clear(&mut self) {
        self.commands.push(DrawCommand::Clear);
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.commands.push(DrawCommand::FillRect { rect, color });
    }

    fn stroke_rect(&mut self, rect: Rect, color: Color, thickness: f64) {
        self.commands.push(DrawCommand::StrokeRect {
            rect,
            color,
            thickness,
        });
    }

    fn push_transform(&mut self, transform: AffineTransform) {
        self.commands.push(DrawCommand::PushTransform(transform));
    }

    fn pop_transform(&mut self) {
        self.commands.push(DrawCommand::PopTransform);
    }

    fn push_clip(&mut self, rect: Rect) {
        self.commands.push(DrawCommand::PushClip(rect));
    }

    fn pop_clip(&mut self) {
        self.commands.push(DrawCommand::PopClip);
    }

    fn push_opacity(&mut self, opacity: f32) {
        self.commands.push(DrawCommand::PushOpacity(opacity));
    }

    fn pop_opacity(&mut self) {
        self.commands.push(DrawCommand::PopOpacity);
    }
}

/// Surface remembering the last value of every property
#[derive(Clone, Debug, Default)]
pub struct RecordingSurface {
    pub view: ViewId,
    pub parent: Option<ViewId>,
    pub bounds: Option<Rect>,
    pub transform: Option<AffineTransform>,
    pub camera: Option<Camera>,
    pub opacity: Option<f32>,
    pub z_order: Option<i32>,
    pub index: Option<usize>,
    pub visible: Option<bool>,
    pub clip_canvas_to_bounds: Option<bool>,
    pub mirrored: Option<bool>,
    pub render_count: usize,
    /// Draw commands of the last paint
    pub commands: Vec<DrawCommand>,
}

impl RecordingSurface {
    fn new(view: ViewId, parent: Option<ViewId>) -> Self {
        Self {
            view,
            parent,
            ..Self::default()
        }
    }
}

impl GraphicsSurface for RecordingSurface {
    fn set_bounds(&mut self, bounds: Rect) {
        self.bounds = Some(bounds);
    }

    fn set_transform(&mut self, transform: AffineTransform) {
        self.transform = Some(transform);
    }

    fn set_camera(&mut self, camera: Camera) {
        self.camera = Some(camera);
    }

    fn set_opacity(&mut self, opacity: f32) {
        self.opacity = Some(opacity);
    }

    fn set_z_order(&mut self, z_order: i32) {
        self.z_order = Some(z_order);
    }

    fn set_index(&mut self, index: usize) {
        self.index = Some(index);
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = Some(visible);
    }

    fn set_clip_canvas_to_bounds(&mut self, clip: bool) {
        self.clip_canvas_to_bounds = Some(clip);
    }

    fn set_mirrored(&mut self, mirrored: bool) {
        self.mirrored = Some(mirrored);
    }

    fn render(&mut self, paint: &mut dyn FnMut(&mut dyn Canvas)) {
        let size = self.bounds.map_or(Size::ZERO, |b| b.size());
        let mut canvas = RecordingCanvas::new(size);
        paint(&mut canvas);
        self.commands = canvas.into_commands();
        self.render_count += 1;
    }
}

/// Graphics device backed by [`RecordingSurface`]s
#[derive(Debug, Default)]
pub struct RecordingDevice {
    surfaces: FxHashMap<ViewId, RecordingSurface>,
    releases: FxHashMap<ViewId, usize>,
    paints: FxHashMap<ViewId, usize>,
}

impl RecordingDevice {
    pub fn surface_of(&self, view: ViewId) -> Option<&RecordingSurface> {
        self.surfaces.get(&view)
    }

    pub fn has_surface(&self, view: ViewId) -> bool {
        self.surfaces.contains_key(&view)
    }

    pub fn surface_count(&self) -> usize {
        self.surfaces.len()
    }

    /// How often the surface of `view` was released
    pub fn release_count(&self, view: ViewId) -> usize {
        self.releases.get(&view).copied().unwrap_or(0)
    }

    /// Paints of `view` across all of its surfaces
    pub fn render_count(&self, view: ViewId) -> usize {
        let live = self.surfaces.get(&view).map_or(0, |s| s.render_count);
        self.paints.get(&view).copied().unwrap_or(0) + live
    }
}

impl GraphicsDevice for RecordingDevice {
    type Surface = RecordingSurface;

    fn surface(&mut self, view: ViewId, parent: Option<ViewId>) -> &mut RecordingSurface {
        self.surfaces
            .entry(view)
            .or_insert_with(|| RecordingSurface::new(view, parent))
    }

    fn release(&mut self, view: ViewId) {
        if let Some(surface) = self.surfaces.remove(&view) {
            *self.paints.entry(view).or_default() += surface.render_count;
        }
        *self.releases.entry(view).or_default() += 1;
    }
}

/// Frame scheduler driven by the test
#[derive(Debug, Default)]
pub struct ManualFrameScheduler {
    requests: usize,
    current: Option<FrameTask>,
}

impl ManualFrameScheduler {
    /// Frames requested so far
    pub fn requests(&self) -> usize {
        self.requests
    }

    pub fn has_pending_frame(&self) -> bool {
        self.current.as_ref().is_some_and(FrameTask::is_pending)
    }

    /// Cancel the requested frame, as a host going idle would
    pub fn cancel_pending(&mut self) {
        if let Some(task) = self.current.take() {
            task.cancel();
        }
    }
}

impl FrameScheduler for ManualFrameScheduler {
    fn request_frame(&mut self) -> FrameTask {
        self.requests += 1;
        let task = FrameTask::new();
        self.current = Some(task.clone());
        task
    }
}

impl<D: GraphicsDevice> Display<D, ManualFrameScheduler> {
    /// Run the requested frame, if there is one
    pub fn run_frame(&mut self) -> bool {
        if !self.scheduler().has_pending_frame() {
            return false;
        }
        self.on_frame();
        true
    }

    /// Run frames until none is requested, returning how many ran
    pub fn run_jobs(&mut self) -> usize {
        let mut frames = 0;
        while frames < MAX_FRAMES && self.run_frame() {
            frames += 1;
        }
        frames
    }
}

#[cfg(test)]
pub(crate) fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
