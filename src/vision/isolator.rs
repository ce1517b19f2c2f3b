//! Pixel-level isolation of colored regions
//!
//! The target application draws selected rows and status text in a fixed
//! accent color. Everything here works by masking that color, then cropping
//! to what the mask covers, so downstream OCR sees only the interesting text.

use image::{GrayImage, Luma, Rgba, RgbaImage};
use imageproc::region_labelling::{connected_components, Connectivity};

use super::region::Region;
use crate::error::{ExportError, Result};
use crate::models::Color;

const MASK_ON: Luma<u8> = Luma([u8::MAX]);
const MASK_OFF: Luma<u8> = Luma([0]);

/// Which pixels [`modify_color`] rewrites
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    /// Replace pixels matching the target
    Whitelist,
    /// Replace every pixel that does not match the target
    Blacklist,
}

/// Inclusive bounding box of a set of pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Bounds {
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
    area: u64,
}

impl Bounds {
    fn at(x: u32, y: u32) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
            area: 1,
        }
    }

    fn include(&mut self, x: u32, y: u32) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
        self.area += 1;
    }

    fn crop(&self, region: &Region) -> Region {
        region.sub_region(
            self.min_x,
            self.min_y,
            self.max_x - self.min_x + 1,
            self.max_y - self.min_y + 1,
        )
    }
}

/// Whether `pixel` is within `tolerance` of `color` on every RGB channel.
/// Alpha must be fully opaque.
pub fn pixel_matches(pixel: &Rgba<u8>, color: Color, tolerance: u8) -> bool {
    let [r, g, b, a] = pixel.0;
    a == u8::MAX
        && r.abs_diff(color.r) <= tolerance
        && g.abs_diff(color.g) <= tolerance
        && b.abs_diff(color.b) <= tolerance
}

/// Binary mask (255 = match) of the pixels matching `color`
pub fn color_mask(image: &RgbaImage, color: Color, tolerance: u8) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        if pixel_matches(image.get_pixel(x, y), color, tolerance) {
            MASK_ON
        } else {
            MASK_OFF
        }
    })
}

/// Crop `region` to the minimal rectangle covering every pixel of `color`
pub fn isolate_region(region: &Region, color: Color, tolerance: u8) -> Result<Region> {
    let mask = color_mask(region.image(), color, tolerance);

    let mut bounds: Option<Bounds> = None;
    for (x, y, px) in mask.enumerate_pixels() {
        if *px == MASK_ON {
            match bounds.as_mut() {
                Some(b) => b.include(x, y),
                None => bounds = Some(Bounds::at(x, y)),
            }
        }
    }

    let bounds = bounds.ok_or_else(|| ExportError::RegionNotFound { color: color.hex() })?;
    tracing::debug!(
        "Isolated {} region at ({}, {}) covering {} pixels",
        color,
        bounds.min_x,
        bounds.min_y,
        bounds.area
    );
    Ok(bounds.crop(region))
}

/// One region per 8-connected blob of `color` with at least `min_area`
/// pixels, in component label order.
pub fn isolate_multiple_regions(
    region: &Region,
    color: Color,
    tolerance: u8,
    min_area: u64,
) -> Result<Vec<Region>> {
    let mask = color_mask(region.image(), color, tolerance);
    let labels = connected_components(&mask, Connectivity::Eight, MASK_OFF);

    // Index 0 is the background label
    let mut components: Vec<Option<Bounds>> = Vec::new();
    for (x, y, label) in labels.enumerate_pixels() {
        let label = label.0[0] as usize;
        if label == 0 {
            continue;
        }
        if components.len() <= label {
            components.resize(label + 1, None);
        }
        match components[label].as_mut() {
            Some(b) => b.include(x, y),
            None => components[label] = Some(Bounds::at(x, y)),
        }
    }

    let total = components.iter().flatten().count();
    let regions: Vec<Region> = components
        .iter()
        .flatten()
        .filter(|b| b.area >= min_area)
        .map(|b| b.crop(region))
        .collect();

    tracing::debug!(
        "Found {} {} components, {} at or above {} pixels",
        total,
        color,
        regions.len(),
        min_area
    );

    if regions.is_empty() {
        return Err(ExportError::RegionNotFound { color: color.hex() });
    }
    Ok(regions)
}

/// Remove pixel margins from each edge
pub fn crop(region: &Region, top: u32, bottom: u32, left: u32, right: u32) -> Result<Region> {
    let (width, height) = (region.width(), region.height());

    let rows = top.saturating_add(bottom);
    if rows >= height {
        return Err(ExportError::InvalidCropDimensions {
            axis: "rows",
            removed: rows,
            available: height,
        });
    }
    let cols = left.saturating_add(right);
    if cols >= width {
        return Err(ExportError::InvalidCropDimensions {
            axis: "columns",
            removed: cols,
            available: width,
        });
    }

    if rows == 0 && cols == 0 {
        tracing::debug!("Crop with all margins zero, returning region unchanged");
        return Ok(region.clone());
    }

    Ok(region.sub_region(left, top, width - cols, height - rows))
}

/// Replace matching (whitelist) or non-matching (blacklist) pixels with
/// `replacement`. The image keeps its full size and each pixel its alpha.
pub fn modify_color(
    mut region: Region,
    target: Color,
    replacement: Color,
    tolerance: u8,
    mode: ColorMode,
) -> Region {
    let mut replaced = 0u64;
    for px in region.image_mut().pixels_mut() {
        let hit = pixel_matches(px, target, tolerance);
        let rewrite = match mode {
            ColorMode::Whitelist => hit,
            ColorMode::Blacklist => !hit,
        };
        if rewrite {
            let alpha = px.0[3];
            *px = Rgba([replacement.r, replacement.g, replacement.b, alpha]);
            replaced += 1;
        }
    }
    tracing::debug!("Replaced {} pixels with {} ({:?})", replaced, replacement, mode);
    region
}

/// Trim uniform-color border columns (`trim_vertical`) and/or rows
/// (`trim_horizontal`) from every edge inward.
///
/// An axis that is uniform all the way through is left as is.
pub fn line_test(region: &Region, trim_vertical: bool, trim_horizontal: bool) -> Result<Region> {
    if !trim_vertical && !trim_horizontal {
        return Err(ExportError::InvalidArgument(
            "line test needs at least one trim direction".to_string(),
        ));
    }

    let mut current = region.clone();

    if trim_vertical {
        let img = current.image();
        let uniform = |x: u32| {
            let first = img.get_pixel(x, 0);
            (0..img.height()).all(|y| img.get_pixel(x, y) == first)
        };
        match trim_span(img.width(), uniform) {
            Some((start, len)) => {
                current = current.sub_region(start, 0, len, current.height());
            }
            None => tracing::warn!("Every column is uniform, skipping vertical trim"),
        }
    }

    if trim_horizontal {
        let img = current.image();
        let uniform = |y: u32| {
            let first = img.get_pixel(0, y);
            (0..img.width()).all(|x| img.get_pixel(x, y) == first)
        };
        match trim_span(img.height(), uniform) {
            Some((start, len)) => {
                current = current.sub_region(0, start, current.width(), len);
            }
            None => tracing::warn!("Every row is uniform, skipping horizontal trim"),
        }
    }

    Ok(current)
}

/// First non-uniform index and span length, scanning from both ends
fn trim_span(len: u32, uniform: impl Fn(u32) -> bool) -> Option<(u32, u32)> {
    let start = (0..len).find(|&i| !uniform(i))?;
    let end = (start..len).rev().find(|&i| !uniform(i))?;
    Some((start, end - start + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    const GREEN: Color = Color::rgb(0x4e, 0x9e, 0x19);
    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

    fn canvas(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_pixel(w, h, WHITE)
    }

    fn paint(img: &mut RgbaImage, x: u32, y: u32, w: u32, h: u32, c: Color) {
        for yy in y..y + h {
            for xx in x..x + w {
                img.put_pixel(xx, yy, Rgba([c.r, c.g, c.b, 255]));
            }
        }
    }

    #[test]
    fn test_isolate_region_exact_bounds() {
        let mut img = canvas(60, 40);
        paint(&mut img, 10, 5, 3, 2, GREEN);
        img.put_pixel(30, 20, Rgba([GREEN.r, GREEN.g, GREEN.b, 255]));

        let out = isolate_region(&Region::synthetic(img), GREEN, 0).unwrap();
        assert_eq!(out.offset(), crate::desktop::types::Point::new(10, 5));
        assert_eq!((out.width(), out.height()), (21, 16));
    }

    #[test]
    fn test_isolate_region_not_found() {
        let err = isolate_region(&Region::synthetic(canvas(10, 10)), GREEN, 0).unwrap_err();
        assert!(matches!(err, ExportError::RegionNotFound { .. }));
    }

    #[test]
    fn test_alpha_must_be_opaque() {
        let mut img = canvas(10, 10);
        img.put_pixel(2, 2, Rgba([GREEN.r, GREEN.g, GREEN.b, 128]));
        assert!(isolate_region(&Region::synthetic(img), GREEN, 255).is_err());
    }

    #[test]
    fn test_mask_grows_with_tolerance() {
        let mut img = canvas(16, 16);
        for i in 0..16u32 {
            let shade = (i * 8) as u8;
            img.put_pixel(i, i, Rgba([GREEN.r.saturating_add(shade), GREEN.g, GREEN.b, 255]));
        }
        let mut previous = color_mask(&img, GREEN, 0);
        for tol in [4u8, 16, 64, 255] {
            let next = color_mask(&img, GREEN, tol);
            for (a, b) in previous.pixels().zip(next.pixels()) {
                assert!(*a == MASK_OFF || *b == MASK_ON, "tolerance {} lost a pixel", tol);
            }
            previous = next;
        }
    }

    #[test]
    fn test_multiple_regions_respects_min_area() {
        let mut img = canvas(100, 50);
        paint(&mut img, 5, 5, 20, 10, GREEN); // 200 px
        paint(&mut img, 50, 5, 20, 10, GREEN); // 200 px
        paint(&mut img, 90, 40, 2, 2, GREEN); // 4 px noise

        let regions = isolate_multiple_regions(&Region::synthetic(img.clone()), GREEN, 0, 50).unwrap();
        assert_eq!(regions.len(), 2);
        assert!(regions.iter().all(|r| r.area() >= 50));

        let all = isolate_multiple_regions(&Region::synthetic(img), GREEN, 0, 1).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_diagonal_pixels_join_one_component() {
        let mut img = canvas(10, 10);
        paint(&mut img, 2, 2, 1, 1, GREEN);
        paint(&mut img, 3, 3, 1, 1, GREEN);
        let regions = isolate_multiple_regions(&Region::synthetic(img), GREEN, 0, 1).unwrap();
        assert_eq!(regions.len(), 1);
        assert_eq!((regions[0].width(), regions[0].height()), (2, 2));
    }

    #[test]
    fn test_multiple_regions_none_survive() {
        let mut img = canvas(10, 10);
        paint(&mut img, 1, 1, 2, 2, GREEN);
        let err = isolate_multiple_regions(&Region::synthetic(img), GREEN, 0, 10).unwrap_err();
        assert!(matches!(err, ExportError::RegionNotFound { .. }));
    }

    #[test]
    fn test_crop_composes() {
        let mut img = canvas(30, 30);
        paint(&mut img, 0, 12, 30, 1, GREEN);
        let base = Region::synthetic(img);

        let twice = crop(&crop(&base, 5, 0, 0, 0).unwrap(), 5, 0, 0, 0).unwrap();
        let once = crop(&base, 10, 0, 0, 0).unwrap();
        assert_eq!(twice, once);
    }

    #[test]
    fn test_crop_rejects_inverted_dimensions() {
        let base = Region::synthetic(canvas(10, 10));
        assert!(matches!(
            crop(&base, 5, 5, 0, 0),
            Err(ExportError::InvalidCropDimensions { axis: "rows", .. })
        ));
        assert!(matches!(
            crop(&base, 0, 0, 11, 0),
            Err(ExportError::InvalidCropDimensions { axis: "columns", .. })
        ));
    }

    #[test]
    fn test_crop_zero_is_noop() {
        let base = Region::synthetic(canvas(10, 10));
        assert_eq!(crop(&base, 0, 0, 0, 0).unwrap(), base);
    }

    #[test]
    fn test_modify_color_modes() {
        let mut img = canvas(4, 1);
        paint(&mut img, 0, 0, 1, 1, GREEN);
        let black = Color::rgb(0, 0, 0);

        let white_listed = modify_color(Region::synthetic(img.clone()), GREEN, black, 0, ColorMode::Whitelist);
        assert_eq!(white_listed.image().get_pixel(0, 0), &Rgba([0, 0, 0, 255]));
        assert_eq!(white_listed.image().get_pixel(1, 0), &WHITE);

        let black_listed = modify_color(Region::synthetic(img), GREEN, black, 0, ColorMode::Blacklist);
        assert_eq!(black_listed.width(), 4);
        assert_eq!(black_listed.image().get_pixel(0, 0), &Rgba([GREEN.r, GREEN.g, GREEN.b, 255]));
        assert_eq!(black_listed.image().get_pixel(3, 0), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_line_test_strips_solid_border() {
        let mut img = RgbaImage::from_pixel(20, 10, Rgba([GREEN.r, GREEN.g, GREEN.b, 255]));
        img.put_pixel(4, 3, WHITE);
        img.put_pixel(12, 6, WHITE);

        let out = line_test(&Region::synthetic(img), true, true).unwrap();
        assert_eq!(out.offset(), crate::desktop::types::Point::new(4, 3));
        assert_eq!((out.width(), out.height()), (9, 4));
    }

    #[test]
    fn test_line_test_single_direction() {
        let mut img = RgbaImage::from_pixel(20, 10, Rgba([GREEN.r, GREEN.g, GREEN.b, 255]));
        img.put_pixel(4, 3, WHITE);

        let out = line_test(&Region::synthetic(img), true, false).unwrap();
        assert_eq!((out.width(), out.height()), (1, 10));
    }

    #[test]
    fn test_line_test_requires_direction() {
        let err = line_test(&Region::synthetic(canvas(5, 5)), false, false).unwrap_err();
        assert!(matches!(err, ExportError::InvalidArgument(_)));
    }

    #[test]
    fn test_line_test_uniform_image_unchanged() {
        let base = Region::synthetic(canvas(5, 5));
        assert_eq!(line_test(&base, true, true).unwrap(), base);
    }
}
