//! Window and dialog state of the target process
//!
//! Nothing here is cached: every query goes back to the accessibility tree,
//! because the target application recreates its dialogs constantly and
//! identifiers from one instance are useless for the next.

use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;

use super::platform::AccessibilityProvider;
use super::types::{ElementInfo, Point, WindowInfo};
use crate::error::{RecoverableError, Result};
use crate::models::ElementDescriptor;

/// Result of a [`WindowTracker::home`] run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct HomeOutcome {
    /// Whether the canonical window set was observed
    pub reached: bool,
    /// Close attempts spent
    pub attempts: u32,
    /// Attempts that failed and were logged
    pub failures: u32,
}

/// A live element found for a descriptor.
///
/// Borrows the tracker, so it cannot outlive the polling attempt that
/// produced it or be held across input injection.
pub struct ResolvedElement<'t> {
    tracker: &'t WindowTracker,
    info: ElementInfo,
}

impl ResolvedElement<'_> {
    pub fn info(&self) -> &ElementInfo {
        &self.info
    }

    /// Enabled and on screen
    pub fn is_active(&self) -> bool {
        self.info.is_enabled && self.info.bounds.is_visible()
    }

    pub fn center(&self) -> Point {
        self.info.bounds.center()
    }

    pub fn focus(&self) -> anyhow::Result<()> {
        self.tracker.provider.focus(&self.info)
    }

    pub fn set_text(&self, text: &str) -> anyhow::Result<()> {
        self.tracker.provider.set_text(&self.info, text)
    }

    pub fn read_text(&self) -> anyhow::Result<Option<String>> {
        self.tracker.provider.read_text(&self.info)
    }
}

/// Queries windows of the target process through an [`AccessibilityProvider`]
pub struct WindowTracker {
    provider: Box<dyn AccessibilityProvider>,
    main_title: String,
    poll_interval: Duration,
}

impl WindowTracker {
    /// `main_title` is a fragment of the main window's title
    pub fn new(provider: Box<dyn AccessibilityProvider>, main_title: impl Into<String>, poll_interval: Duration) -> Self {
        Self {
            provider,
            main_title: main_title.into(),
            poll_interval,
        }
    }

    pub fn main_title(&self) -> &str {
        &self.main_title
    }

    pub fn is_main_title(&self, title: &str) -> bool {
        title.contains(&self.main_title)
    }

    /// All windows of the process, topmost first
    pub fn windows(&self) -> Result<Vec<WindowInfo>> {
        Ok(self.provider.windows()?)
    }

    pub fn all_dialog_titles(&self) -> Result<Vec<String>> {
        Ok(self.windows()?.into_iter().map(|w| w.title).collect())
    }

    pub fn top_window(&self) -> Result<Option<WindowInfo>> {
        Ok(self.windows()?.into_iter().next())
    }

    /// Title of the topmost window, empty if the process shows none
    pub fn top_dialog(&self) -> Result<String> {
        Ok(self.top_window()?.map(|w| w.title).unwrap_or_default())
    }

    /// Like [`top_dialog`](Self::top_dialog) but for diagnostics, never failing
    pub fn top_dialog_lossy(&self) -> String {
        self.top_dialog()
            .unwrap_or_else(|e| format!("<unavailable: {}>", e))
    }

    pub fn resolve(&self, descriptor: &ElementDescriptor) -> Result<Option<ResolvedElement<'_>>> {
        Ok(self
            .provider
            .resolve(descriptor)?
            .map(|info| ResolvedElement { tracker: self, info }))
    }

    /// Poll until `descriptor` resolves to an enabled, visible element.
    /// With `attempt_focus` the element must also accept focus.
    pub fn is_element_active(
        &self,
        descriptor: &ElementDescriptor,
        timeout: Duration,
        poll_interval: Duration,
        attempt_focus: bool,
    ) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            match self.resolve(descriptor) {
                Ok(Some(element)) if element.is_active() => {
                    if !attempt_focus {
                        return true;
                    }
                    match element.focus() {
                        Ok(()) => return true,
                        Err(e) => tracing::debug!("Focus on {} failed: {}", descriptor, e),
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::debug!("Resolving {} failed: {}", descriptor, e),
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(poll_interval);
        }
    }

    /// Bring the main window to the foreground
    pub fn focus_main(&self) -> Result<()> {
        let windows = self.windows()?;
        let main = windows
            .iter()
            .find(|w| self.is_main_title(&w.title))
            .ok_or_else(|| anyhow::anyhow!("Main window `{}` is not open", self.main_title))?;
        self.provider.focus_window(main)?;
        Ok(())
    }

    /// Focus the topmost window with exactly `title`. `false` if none is open.
    pub fn focus_window_titled(&self, title: &str) -> Result<bool> {
        match self.windows()?.into_iter().find(|w| w.title == title) {
            Some(window) => {
                self.provider.focus_window(&window)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Close the topmost window with exactly `title`. `false` if none is open.
    pub fn close_titled(&self, title: &str) -> Result<bool> {
        match self.windows()?.into_iter().find(|w| w.title == title) {
            Some(window) => {
                self.provider.close_window(&window)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Poll until the topmost title satisfies `predicate`
    pub fn wait_for_top(&self, predicate: impl Fn(&str) -> bool, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            if predicate(&self.top_dialog()?) {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            thread::sleep(self.poll_interval);
        }
    }

    /// Poll until the open titles (topmost first) satisfy `predicate`
    pub fn wait_for_titles(&self, predicate: impl Fn(&[String]) -> bool, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            if predicate(&self.all_dialog_titles()?) {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            thread::sleep(self.poll_interval);
        }
    }

    /// Close the topmost window unless it is the main window.
    /// Returns the title that was closed.
    pub fn close_top(&self) -> std::result::Result<String, RecoverableError> {
        let top = self
            .provider
            .windows()
            .map_err(|source| RecoverableError::Close {
                title: String::new(),
                source,
            })?
            .into_iter()
            .next()
            .ok_or(RecoverableError::NothingOpen)?;

        if self.is_main_title(&top.title) {
            return Err(RecoverableError::NothingOpen);
        }

        self.provider
            .close_window(&top)
            .map_err(|source| RecoverableError::Close {
                title: top.title.clone(),
                source,
            })?;
        Ok(top.title)
    }

    /// Close topmost windows until `canonical` accepts the open titles or
    /// `max_attempts` closes have been spent. Never fails: close errors are
    /// logged and counted, and running out of attempts only logs a warning.
    pub fn home(&self, canonical: impl Fn(&[String]) -> bool, max_attempts: u32) -> HomeOutcome {
        let mut outcome = HomeOutcome::default();

        if let Err(e) = self.focus_main() {
            tracing::debug!("Could not focus main window before going home: {}", e);
        }

        loop {
            match self.all_dialog_titles() {
                Ok(titles) if canonical(&titles) => {
                    outcome.reached = true;
                    break;
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Failed to list windows while going home: {}", e),
            }

            if outcome.attempts >= max_attempts {
                tracing::warn!(
                    "Home not reached after {} attempts ({} failed), top window is `{}`",
                    outcome.attempts,
                    outcome.failures,
                    self.top_dialog_lossy()
                );
                break;
            }

            outcome.attempts += 1;
            match self.close_top() {
                Ok(title) => tracing::debug!(
                    "Closed `{}`, attempt {}/{}",
                    title,
                    outcome.attempts,
                    max_attempts
                ),
                Err(e) => {
                    outcome.failures += 1;
                    tracing::warn!("Home attempt {}/{}: {}", outcome.attempts, max_attempts, e);
                }
            }
            thread::sleep(self.poll_interval);
        }

        outcome
    }
}
