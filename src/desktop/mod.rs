//! Desktop automation layer
//!
//! Provides the OS-level primitives the export workflows are built from.
//! Every platform service sits behind a trait so the workflows can run
//! against a simulated desktop in tests.
//!
//! ## Architecture
//!
//! - `DesktopSession` - high-level interface used by the workflows
//! - `WindowTracker` - window/dialog queries and return-to-home recovery
//! - `AccessibilityProvider` - platform abstraction for the UI tree
//! - `InputInjector` / `InputBackend` - keyboard and mouse
//! - `ScreenCapture`, `OcrEngine` - pixels and text for visual checks
//!
//! ## Supported Platforms
//!
//! - **Windows**: UI Automation, Windows.Media.Ocr, enigo, xcap
//!
//! ## Example
//!
//! ```rust,ignore
//! use quickbooks_export::{config::EngineConfig, desktop::DesktopSession};
//!
//! let mut session = DesktopSession::connect(EngineConfig::from_env())?;
//! println!("Top window: {}", session.tracker().top_dialog()?);
//! session.press("ctrl+i")?;
//! ```

pub mod input;
pub mod ocr;
pub mod platform;
pub mod screenshot;
pub mod session;
pub mod tracker;
pub mod types;

// Re-export main types
pub use input::{EnigoBackend, InputBackend, InputInjector, KeyChord, KeyCode, MouseButton};
pub use ocr::{create_engine, OcrEngine};
pub use platform::{create_provider, AccessibilityProvider};
pub use screenshot::{ScreenCapture, XcapCapture};
pub use session::DesktopSession;
pub use tracker::{HomeOutcome, ResolvedElement, WindowTracker};
pub use types::{ElementInfo, Handle, Point, ScreenRect, WindowInfo};
