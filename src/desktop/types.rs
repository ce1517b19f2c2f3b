use serde::{Deserialize, Serialize};

use crate::models::ControlType;

/// Opaque platform handle for a window or element
/// - Windows: HWND for windows, UIA runtime id for elements
pub type Handle = String;

/// Screen point in absolute coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

/// Bounding rectangle in screen coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl ScreenRect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn center(&self) -> Point {
        Point::new(
            self.x + (self.width / 2) as i32,
            self.y + (self.height / 2) as i32,
        )
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x
            && p.y >= self.y
            && p.x < self.x + self.width as i32
            && p.y < self.y + self.height as i32
    }

    pub fn is_visible(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// A top-level window or dialog of the target process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowInfo {
    pub title: String,
    pub bounds: ScreenRect,
    pub handle: Option<Handle>,
    /// Accessibility "friendly class" (`Dialog` for standard dialog boxes)
    pub friendly_class: String,
}

impl WindowInfo {
    pub fn new(title: impl Into<String>, bounds: ScreenRect) -> Self {
        Self {
            title: title.into(),
            bounds,
            handle: None,
            friendly_class: String::new(),
        }
    }

    pub fn is_dialog(&self) -> bool {
        self.friendly_class == "Dialog"
    }
}

/// Live properties of an element as reported by the accessibility tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementInfo {
    pub handle: Handle,
    pub control_type: ControlType,
    pub name: String,
    pub auto_id: String,
    pub bounds: ScreenRect,
    pub is_enabled: bool,
    pub has_focus: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_center() {
        let rect = ScreenRect::new(100, 200, 50, 30);
        assert_eq!(rect.center(), Point::new(125, 215));
    }

    #[test]
    fn test_rect_contains_is_half_open() {
        let rect = ScreenRect::new(0, 0, 10, 10);
        assert!(rect.contains(Point::new(9, 9)));
        assert!(!rect.contains(Point::new(10, 0)));
    }

    #[test]
    fn test_dialog_classification() {
        let mut w = WindowInfo::new("Find Invoices", ScreenRect::new(0, 0, 300, 200));
        assert!(!w.is_dialog());
        w.friendly_class = "Dialog".into();
        assert!(w.is_dialog());
    }
}
