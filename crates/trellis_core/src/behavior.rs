//! Pluggable paint and role strategy for views
//!
//! Views carry no paint logic of their own. A [`Behavior`] attached through
//! [`ViewTree::set_behavior`](crate::tree::ViewTree::set_behavior) decides
//! what a view draws and which accessibility role it exposes. Swapping the
//! behavior repaints the view.

use crate::canvas::Canvas;
use crate::view::ViewNode;

/// Accessibility role advertised by a behavior
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    Generic,
    Button,
    CheckBox,
    Label,
    List,
    ListItem,
    Slider,
    Tab,
    TabList,
    TextField,
    Tree,
    TreeItem,
}

/// Paint/role strategy attached to a view
pub trait Behavior {
    /// Paint `view` onto `canvas`
    fn render(&mut self, view: &ViewNode, canvas: &mut dyn Canvas);

    /// Role exposed to assistive technology
    fn role(&self) -> Option<Role> {
        None
    }
}

/// Behavior that fills the view with a solid color
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FillBehavior {
    pub color: crate::geometry::Color,
}

impl FillBehavior {
    pub fn new(color: crate::geometry::Color) -> Self {
        Self { color }
    }
}

impl Behavior for FillBehavior {
    fn render(&mut self, view: &ViewNode, canvas: &mut dyn Canvas) {
        canvas.fill_rect(view.size().to_rect(), self.color);
    }
}
