use image::RgbaImage;

use crate::desktop::types::{Point, ScreenRect};

/// Rectangular pixel buffer with its position tracked through every crop.
///
/// `anchor` is the screen position of the capture this region was derived
/// from (`None` for synthetic images); `offset` is the region's position
/// inside that root capture. Cropping only ever adds to `offset`, so the
/// screen origin is always `anchor + offset`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    anchor: Option<Point>,
    offset: Point,
    image: RgbaImage,
}

impl Region {
    /// Region straight from a screen capture at `origin`
    pub fn captured(origin: Point, image: RgbaImage) -> Self {
        Self {
            anchor: Some(origin),
            offset: Point::default(),
            image,
        }
    }

    /// Region with no screen position (test fixtures, decoded files)
    pub fn synthetic(image: RgbaImage) -> Self {
        Self {
            anchor: None,
            offset: Point::default(),
            image,
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut RgbaImage {
        &mut self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    /// Position relative to the root capture
    pub fn offset(&self) -> Point {
        self.offset
    }

    /// Absolute screen position, if the chain started at a real capture
    pub fn screen_origin(&self) -> Option<Point> {
        self.anchor.map(|a| a.offset(self.offset.x, self.offset.y))
    }

    pub fn screen_rect(&self) -> Option<ScreenRect> {
        self.screen_origin()
            .map(|o| ScreenRect::new(o.x, o.y, self.width(), self.height()))
    }

    /// Copy out the `width` x `height` block at (`x`, `y`) of this region.
    /// Callers guarantee the block lies inside the image.
    pub(crate) fn sub_region(&self, x: u32, y: u32, width: u32, height: u32) -> Region {
        let image = image::imageops::crop_imm(&self.image, x, y, width, height).to_image();
        Region {
            anchor: self.anchor,
            offset: self.offset.offset(x as i32, y as i32),
            image,
        }
    }
}
