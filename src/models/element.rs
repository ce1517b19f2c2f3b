use std::fmt;

use crate::error::{ExportError, Result};

/// Accessibility control types the engine addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlType {
    Window,
    Pane,
    Edit,
    Button,
}

impl ControlType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlType::Window => "Window",
            ControlType::Pane => "Pane",
            ControlType::Edit => "Edit",
            ControlType::Button => "Button",
        }
    }
}

/// Static address of a UI element: control type plus caption and/or
/// automation id.
///
/// Descriptors are plain data. They are resolved against the live
/// accessibility tree on every use because the target application recreates
/// its elements for each dialog instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementDescriptor {
    control_type: ControlType,
    title: Option<String>,
    auto_id: Option<String>,
}

impl ElementDescriptor {
    /// Build a descriptor. At least one of `title` / `auto_id` is required.
    pub fn new(
        control_type: ControlType,
        title: Option<&str>,
        auto_id: Option<&str>,
    ) -> Result<Self> {
        if title.is_none() && auto_id.is_none() {
            return Err(ExportError::InvalidArgument(format!(
                "{} descriptor needs a title or an automation id",
                control_type.as_str()
            )));
        }
        Ok(Self {
            control_type,
            title: title.map(str::to_string),
            auto_id: auto_id.map(str::to_string),
        })
    }

    /// Descriptor addressed by caption only
    pub fn titled(control_type: ControlType, title: &str) -> Self {
        Self {
            control_type,
            title: Some(title.to_string()),
            auto_id: None,
        }
    }

    /// Descriptor addressed by automation id only
    pub fn with_auto_id(control_type: ControlType, auto_id: &str) -> Self {
        Self {
            control_type,
            title: None,
            auto_id: Some(auto_id.to_string()),
        }
    }

    /// Descriptor addressed by both caption and automation id
    pub fn exact(control_type: ControlType, title: &str, auto_id: &str) -> Self {
        Self {
            control_type,
            title: Some(title.to_string()),
            auto_id: Some(auto_id.to_string()),
        }
    }

    pub fn control_type(&self) -> ControlType {
        self.control_type
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn auto_id(&self) -> Option<&str> {
        self.auto_id.as_deref()
    }

    /// Whether a live element with these properties is described by `self`.
    /// Unset descriptor fields match anything.
    pub fn matches(&self, control_type: ControlType, title: &str, auto_id: &str) -> bool {
        control_type == self.control_type
            && self.title.as_deref().map_or(true, |t| t == title)
            && self.auto_id.as_deref().map_or(true, |a| a == auto_id)
    }
}

impl fmt::Display for ElementDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.control_type.as_str())?;
        if let Some(title) = &self.title {
            write!(f, " \"{}\"", title)?;
        }
        if let Some(auto_id) = &self.auto_id {
            write!(f, " #{}", auto_id)?;
        }
        Ok(())
    }
}
