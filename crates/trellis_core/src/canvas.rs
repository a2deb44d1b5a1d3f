//! Drawing context handed to behaviors while a view paints
//!
//! Surfaces implement [`Canvas`] for their own backend. Coordinates are in
//! the painting view's local space.

use crate::geometry::{AffineTransform, Color, Rect, Size};

/// Immediate-mode drawing interface for a single view surface
pub trait Canvas {
    /// Size of the area being painted
    fn size(&self) -> Size;

    /// Remove everything previously drawn on this surface
    fn clear(&mut self);

    fn fill_rect(&mut self, rect: Rect, color: Color);

    fn stroke_rect(&mut self, rect: Rect, color: Color, thickness: f64);

    // Stacked state

    fn push_transform(&mut self, transform: AffineTransform);

    fn pop_transform(&mut self);

    fn push_clip(&mut self, rect: Rect);

    fn pop_clip(&mut self);

    fn push_opacity(&mut self, opacity: f32);

    fn pop_opacity(&mut self);
}
