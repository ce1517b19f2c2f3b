//! Screen capture using xcap

use anyhow::Context;
use image::RgbaImage;
use xcap::Monitor;

use super::types::{Point, ScreenRect};
use crate::vision::Region;

/// Raw pixel capture of a screen rectangle
pub trait ScreenCapture {
    /// Capture `rect`. The returned region is anchored at the screen position
    /// of its top-left pixel, which may differ from `rect` if it was clipped
    /// to the monitor.
    fn capture(&self, rect: ScreenRect) -> anyhow::Result<Region>;
}

/// Captures through xcap, one monitor grab per call
#[derive(Debug, Default)]
pub struct XcapCapture;

impl XcapCapture {
    pub fn new() -> Self {
        Self
    }
}

impl ScreenCapture for XcapCapture {
    fn capture(&self, rect: ScreenRect) -> anyhow::Result<Region> {
        if !rect.is_visible() {
            anyhow::bail!("Cannot capture empty rectangle {:?}", rect);
        }
        let monitors = Monitor::all().context("Failed to get monitors")?;

        let center = rect.center();
        let monitor = monitors
            .iter()
            .find(|m| {
                ScreenRect::new(m.x(), m.y(), m.width(), m.height()).contains(center)
            })
            .or(monitors.first())
            .context("No monitor found")?;

        let screen = monitor.capture_image().context("Failed to capture screen")?;
        let bounds = ScreenRect::new(monitor.x(), monitor.y(), screen.width(), screen.height());
        let (origin, image) = clip(&screen, bounds, rect)
            .with_context(|| format!("{:?} lies outside monitor {:?}", rect, bounds))?;
        Ok(Region::captured(origin, image))
    }
}

/// Cut the part of `rect` that lies on `monitor` out of its full-screen grab
fn clip(screen: &RgbaImage, monitor: ScreenRect, rect: ScreenRect) -> Option<(Point, RgbaImage)> {
    let left = rect.x.max(monitor.x);
    let top = rect.y.max(monitor.y);
    let right = (rect.x + rect.width as i32).min(monitor.x + monitor.width as i32);
    let bottom = (rect.y + rect.height as i32).min(monitor.y + monitor.height as i32);
    if right <= left || bottom <= top {
        return None;
    }
    let image = image::imageops::crop_imm(
        screen,
        (left - monitor.x) as u32,
        (top - monitor.y) as u32,
        (right - left) as u32,
        (bottom - top) as u32,
    )
    .to_image();
    Some((Point::new(left, top), image))
}
