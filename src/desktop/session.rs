use std::thread;
use std::time::{Duration, Instant};

use super::input::{EnigoBackend, InputBackend, InputInjector, KeyChord};
use super::ocr::{create_engine, OcrEngine};
use super::platform::{create_provider, AccessibilityProvider};
use super::screenshot::{ScreenCapture, XcapCapture};
use super::tracker::WindowTracker;
use crate::config::EngineConfig;
use crate::error::{ExportError, Result};
use crate::models::{Color, ElementDescriptor};
use crate::vision::{
    isolate_multiple_regions, isolate_region, line_test, MatchResult, Region, TextVerifier,
    VerifyMode,
};

/// One automation session against a running application instance
///
/// Coordinates the window tracker, input injection, screen capture and OCR.
/// Everything that sends input takes `&mut self`, so a session can only be
/// driven from one place at a time.
pub struct DesktopSession {
    tracker: WindowTracker,
    input: InputInjector,
    capture: Box<dyn ScreenCapture>,
    verifier: TextVerifier,
    config: EngineConfig,
}

impl DesktopSession {
    pub fn new(
        provider: Box<dyn AccessibilityProvider>,
        input: Box<dyn InputBackend>,
        capture: Box<dyn ScreenCapture>,
        ocr: Box<dyn OcrEngine>,
        config: EngineConfig,
    ) -> Self {
        Self {
            tracker: WindowTracker::new(provider, config.main_window_title.clone(), config.poll_interval),
            input: InputInjector::new(input),
            capture,
            verifier: TextVerifier::new(ocr),
            config,
        }
    }

    /// Session over the real desktop: UI Automation, enigo, xcap and the
    /// platform OCR engine
    pub fn connect(config: EngineConfig) -> Result<Self> {
        let provider = create_provider(&config.main_window_title)?;
        let input = EnigoBackend::new()?;
        let ocr = create_engine(&config.ocr_language)?;
        tracing::info!("Connected to window `{}`", config.main_window_title);
        Ok(Self::new(
            provider,
            Box::new(input),
            Box::new(XcapCapture::new()),
            ocr,
            config,
        ))
    }

    pub fn tracker(&self) -> &WindowTracker {
        &self.tracker
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn element_timeout(&self, descriptor: &ElementDescriptor, timeout: Duration) -> ExportError {
        ExportError::ElementTimeout {
            element: descriptor.to_string(),
            timeout,
            top_dialog: self.tracker.top_dialog_lossy(),
        }
    }

    // ============ Element Operations ============

    /// Wait for `descriptor` to become active and focus it
    pub fn focus(&mut self, descriptor: &ElementDescriptor, timeout: Duration) -> Result<()> {
        if self
            .tracker
            .is_element_active(descriptor, timeout, self.config.poll_interval, true)
        {
            Ok(())
        } else {
            Err(self.element_timeout(descriptor, timeout))
        }
    }

    /// Wait for `descriptor` to become active and click its center
    pub fn click(&mut self, descriptor: &ElementDescriptor, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let target = loop {
            if let Some(element) = self.tracker.resolve(descriptor)? {
                if element.is_active() {
                    break element.center();
                }
            }
            if Instant::now() >= deadline {
                return Err(self.element_timeout(descriptor, timeout));
            }
            thread::sleep(self.config.poll_interval);
        };
        tracing::debug!("Clicking {} at ({}, {})", descriptor, target.x, target.y);
        self.input.mouse(target, true)?;
        thread::sleep(self.config.navigation_delay);
        Ok(())
    }

    /// Write `text` into an edit field and make sure it took. Falls back to
    /// select-all and per-character typing when the value does not read back.
    pub fn set_text_verified(&mut self, descriptor: &ElementDescriptor, text: &str) -> Result<()> {
        let timeout = self.config.dialog_load_delay;
        self.focus(descriptor, timeout)?;

        let direct = match self.tracker.resolve(descriptor)? {
            Some(element) => element
                .set_text(text)
                .and_then(|_| element.read_text())
                .map_err(|e| tracing::debug!("Value pattern write to {} failed: {}", descriptor, e))
                .ok()
                .flatten(),
            None => return Err(self.element_timeout(descriptor, timeout)),
        };
        if direct.as_deref() == Some(text) {
            return Ok(());
        }

        tracing::warn!(
            "{} reads back {:?} instead of {:?}, retyping",
            descriptor,
            direct,
            text
        );
        self.focus(descriptor, timeout)?;
        self.press("ctrl+a")?;
        self.type_text(text, true)?;

        let observed = self
            .tracker
            .resolve(descriptor)?
            .ok_or_else(|| self.element_timeout(descriptor, timeout))?
            .read_text()?;
        if observed.as_deref() == Some(text) {
            Ok(())
        } else {
            Err(ExportError::Platform(anyhow::anyhow!(
                "{} holds {:?} after retyping {:?}",
                descriptor,
                observed,
                text
            )))
        }
    }

    // ============ Input ============

    /// Send a chord once, then wait the navigation delay
    pub fn press(&mut self, chord: &str) -> Result<()> {
        self.press_times(chord, 1)
    }

    pub fn press_times(&mut self, chord: &str, times: u32) -> Result<()> {
        let chord: KeyChord = chord.parse()?;
        self.input
            .send_keys(&chord, times, self.config.navigation_delay)?;
        Ok(())
    }

    pub fn type_text(&mut self, text: &str, char_at_a_time: bool) -> Result<()> {
        let delay = if char_at_a_time {
            self.config.poll_interval
        } else {
            self.config.navigation_delay
        };
        self.input.send_text(text, char_at_a_time, 1, delay)?;
        Ok(())
    }

    // ============ Visual Verification ============

    /// Capture `root`, isolate text drawn on `color`, OCR it and compare with
    /// `target`. In multi mode every connected block is read and the best
    /// score wins. A capture without any `color` scores 0.
    pub fn verify_on_screen(
        &mut self,
        root: &ElementDescriptor,
        color: Color,
        tolerance: u8,
        target: &str,
        threshold: f64,
        mode: VerifyMode,
    ) -> Result<MatchResult> {
        let timeout = self.config.dialog_load_delay;
        if !self
            .tracker
            .is_element_active(root, timeout, self.config.poll_interval, false)
        {
            return Err(self.element_timeout(root, timeout));
        }
        let bounds = self
            .tracker
            .resolve(root)?
            .ok_or_else(|| self.element_timeout(root, timeout))?
            .info()
            .bounds;

        let capture = self.capture.capture(bounds)?;
        let isolated = match mode {
            VerifyMode::Single => isolate_region(&capture, color, tolerance).map(|r| vec![r]),
            VerifyMode::Multi => {
                isolate_multiple_regions(&capture, color, tolerance, self.config.min_region_area)
            }
        };
        // No highlight on screen means nothing was confirmed, same as a bad read
        let regions: Vec<Region> = match isolated {
            Ok(regions) => regions.into_iter().map(trimmed).collect(),
            Err(ExportError::RegionNotFound { color }) => {
                tracing::warn!("No {} highlight in {}", color, root);
                Vec::new()
            }
            Err(e) => return Err(e),
        };
        let result = self
            .verifier
            .best_of(&regions, target, threshold)?
            .unwrap_or(MatchResult {
                matched: false,
                observed_text: String::new(),
                confidence: 0.0,
            });

        tracing::info!(
            "On-screen check in {}: read `{}` for `{}` ({:.1}, matched: {})",
            root,
            result.observed_text,
            target,
            result.confidence,
            result.matched
        );
        Ok(result)
    }
}

/// Strip the solid highlight border around text, keeping the region as is
/// when there is nothing to strip
fn trimmed(region: Region) -> Region {
    match line_test(&region, true, true) {
        Ok(inner) => inner,
        Err(e) => {
            tracing::debug!("Border trim skipped: {}", e);
            region
        }
    }
}
