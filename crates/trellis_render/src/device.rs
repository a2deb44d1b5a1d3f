//! Graphics device and surface contracts
//!
//! The render manager never draws pixels itself. It asks a
//! [`GraphicsDevice`] for the persistent surface backing each view, pushes
//! geometry and visual properties to it, and hands the view's behavior a
//! [`Canvas`] through [`GraphicsSurface::render`].

use trellis_core::{AffineTransform, Camera, Canvas, Rect, ViewId};

/// Persistent drawing surface of one view
pub trait GraphicsSurface {
    /// Position and size within the parent surface
    fn set_bounds(&mut self, bounds: Rect);

    fn set_transform(&mut self, transform: AffineTransform);

    fn set_camera(&mut self, camera: Camera);

    fn set_opacity(&mut self, opacity: f32);

    fn set_z_order(&mut self, z_order: i32);

    /// Position among the sibling surfaces
    fn set_index(&mut self, index: usize);

    fn set_visible(&mut self, visible: bool);

    fn set_clip_canvas_to_bounds(&mut self, clip: bool);

    /// Flip content horizontally
    fn set_mirrored(&mut self, mirrored: bool);

    /// Replace the surface content with whatever `paint` draws
    fn render(&mut self, paint: &mut dyn FnMut(&mut dyn Canvas));
}

/// Maps views to surfaces
pub trait GraphicsDevice {
    type Surface: GraphicsSurface;

    /// Surface of `view`, created nested under `parent`'s on first use
    fn surface(&mut self, view: ViewId, parent: Option<ViewId>) -> &mut Self::Surface;

    /// Drop the surface of `view`, if any
    fn release(&mut self, view: ViewId);
}
