use anyhow::Result;

use super::types::{ElementInfo, WindowInfo};
use crate::models::ElementDescriptor;

#[cfg(target_os = "windows")]
pub mod windows;

/// Platform-specific accessibility provider trait
/// Abstracts the OS accessibility tree of the target process
pub trait AccessibilityProvider {
    /// Windows and dialogs of the target process, topmost first.
    /// Child windows hosted inside the main window come right before it.
    fn windows(&self) -> Result<Vec<WindowInfo>>;

    /// Resolve a descriptor against the live tree of every target window.
    /// Returns the first match in window order.
    fn resolve(&self, descriptor: &ElementDescriptor) -> Result<Option<ElementInfo>>;

    /// Give keyboard focus to an element
    fn focus(&self, element: &ElementInfo) -> Result<()>;

    /// Replace the value of an editable element
    fn set_text(&self, element: &ElementInfo, text: &str) -> Result<()>;

    /// Current value of an editable element, falling back to its name
    fn read_text(&self, element: &ElementInfo) -> Result<Option<String>>;

    /// Bring a window to the foreground
    fn focus_window(&self, window: &WindowInfo) -> Result<()>;

    /// Ask a window to close
    fn close_window(&self, window: &WindowInfo) -> Result<()>;
}

/// Create the platform-specific accessibility provider bound to the process
/// whose main window title contains `main_title`
pub fn create_provider(main_title: &str) -> Result<Box<dyn AccessibilityProvider>> {
    #[cfg(target_os = "windows")]
    {
        Ok(Box::new(windows::WindowsAccessibility::new(main_title)?))
    }

    #[cfg(not(target_os = "windows"))]
    {
        Err(anyhow::anyhow!(
            "UI Automation is only available on Windows (looking for `{}`)",
            main_title
        ))
    }
}
