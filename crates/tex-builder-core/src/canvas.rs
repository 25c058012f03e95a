use image::RgbaImage;
use tracing::trace;

use crate::compositing::{blit_rgba, resize_canvas};
use crate::model::{next_pow2, sort_by_area_desc, Rect, SubImage};

/// One atlas page under construction.
///
/// A canvas starts small: its virtual size is the smallest power of two that holds the first
/// asset tried against it, and it doubles along one axis at a time until the configured maximum.
/// The pixel buffer always matches the virtual size.
#[derive(Debug, Clone)]
pub struct Canvas {
    max_size: (u32, u32),
    virtual_size: (u32, u32),
    initialized: bool,
    single_image: bool,
    free: Vec<Rect>,
    sub_images: Vec<SubImage>,
    rgba: RgbaImage,
}

impl Canvas {
    /// Empty canvas that may grow up to `max_size` (both extents powers of two).
    pub fn new(max_size: (u32, u32)) -> Self {
        Self {
            max_size,
            virtual_size: (0, 0),
            initialized: false,
            single_image: false,
            free: Vec::new(),
            sub_images: Vec::new(),
            rgba: RgbaImage::new(0, 0),
        }
    }

    /// Canvas holding exactly one asset copied unrotated at the origin. Used for assets larger
    /// than the maximum canvas size; no further placement is attempted on it.
    pub fn single(key: String, name: String, image: RgbaImage) -> Self {
        let (w, h) = image.dimensions();
        Self {
            max_size: (w, h),
            virtual_size: (w, h),
            initialized: true,
            single_image: true,
            free: Vec::new(),
            sub_images: vec![SubImage {
                key,
                name,
                rect: Rect::new(0, 0, w, h),
                rotated: false,
            }],
            rgba: image,
        }
    }

    pub fn virtual_size(&self) -> (u32, u32) {
        self.virtual_size
    }
    pub fn max_size(&self) -> (u32, u32) {
        self.max_size
    }
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
    pub fn is_single_image(&self) -> bool {
        self.single_image
    }
    /// Free rectangles in scan order (descending area).
    pub fn free_rects(&self) -> &[Rect] {
        &self.free
    }
    pub fn sub_images(&self) -> &[SubImage] {
        &self.sub_images
    }
    pub fn rgba(&self) -> &RgbaImage {
        &self.rgba
    }
    pub fn into_parts(self) -> (Vec<SubImage>, RgbaImage) {
        (self.sub_images, self.rgba)
    }

    /// Seed the canvas for the first asset attempted against it.
    pub fn init_virtual_size(&mut self, asset_w: u32, asset_h: u32) {
        debug_assert!(!self.initialized, "virtual size initialised twice");
        self.virtual_size = (next_pow2(asset_w), next_pow2(asset_h));
        self.free = vec![Rect::new(0, 0, self.virtual_size.0, self.virtual_size.1)];
        self.rgba = RgbaImage::new(self.virtual_size.0, self.virtual_size.1);
        self.initialized = true;
        trace!(w = self.virtual_size.0, h = self.virtual_size.1, "canvas initialised");
    }

    /// Max right/bottom edge over all placed sub-images.
    pub fn extremes(&self) -> (u32, u32) {
        self.sub_images.iter().fold((0, 0), |(x, y), s| {
            (x.max(s.rect.right()), y.max(s.rect.bottom()))
        })
    }

    /// Double the virtual size along the axis that leaves the larger usable area.
    /// Returns false when both axes are already at the maximum.
    pub fn grow_virtual_size(&mut self) -> bool {
        let (vw, vh) = self.virtual_size;
        let (max_w, max_h) = self.max_size;
        if self.single_image || (vw >= max_w && vh >= max_h) {
            return false;
        }

        let (extreme_x, extreme_y) = self.extremes();
        let spare_w = vw - extreme_x;
        let spare_h = vh - extreme_y;

        let grow_width = if vw >= max_w {
            false
        } else if vh >= max_h {
            true
        } else {
            let width_volume = (vw as u64 * 2 + spare_w as u64) * vh as u64;
            let height_volume = (vh as u64 * 2 + spare_h as u64) * vw as u64;
            height_volume > width_volume
        };

        let new_rect = if grow_width {
            Rect::new(extreme_x, 0, vw + spare_w, vh)
        } else {
            Rect::new(0, extreme_y, vw, vh + spare_h)
        };
        self.virtual_size = if grow_width { (vw * 2, vh) } else { (vw, vh * 2) };

        // Free space now covered by the new block is either dropped or clipped to the part
        // left of / above it.
        self.free.retain_mut(|r| {
            if new_rect.contains(r) {
                return false;
            }
            if new_rect.intersects(r) {
                if r.x < new_rect.x {
                    r.w = new_rect.x - r.x;
                } else if r.y < new_rect.y {
                    r.h = new_rect.y - r.y;
                } else {
                    return false;
                }
            }
            r.is_valid()
        });
        self.free.push(new_rect);
        sort_by_area_desc(&mut self.free);

        self.rgba = resize_canvas(&self.rgba, self.virtual_size.0, self.virtual_size.1);
        trace!(
            w = self.virtual_size.0,
            h = self.virtual_size.1,
            grow_width,
            "canvas grown"
        );
        true
    }

    /// Copy asset pixels into the canvas at `(dx, dy)`, rotated 90° when `rotated`.
    pub fn copy_asset_into(&mut self, image: &RgbaImage, dx: u32, dy: u32, rotated: bool) {
        blit_rgba(image, &mut self.rgba, dx, dy, rotated);
    }

    pub(crate) fn take_free_rect(&mut self, idx: usize) -> Rect {
        self.free.remove(idx)
    }

    pub(crate) fn push_free_rect(&mut self, r: Rect) {
        if r.is_valid() {
            self.free.push(r);
        }
    }

    pub(crate) fn sort_free_rects(&mut self) {
        sort_by_area_desc(&mut self.free);
    }

    pub(crate) fn push_sub_image(&mut self, sub: SubImage) {
        self.sub_images.push(sub);
    }

    /// Trim the buffer to the power-of-two extents actually occupied. Single-image canvases
    /// keep their exact size. Returns the final page size.
    pub fn finalize(&mut self) -> (u32, u32) {
        if self.single_image {
            return self.rgba.dimensions();
        }
        let (ex, ey) = self.extremes();
        let (cw, ch) = self.rgba.dimensions();
        let w = next_pow2(ex).min(cw);
        let h = next_pow2(ey).min(ch);
        if (w, h) != (cw, ch) {
            self.rgba = resize_canvas(&self.rgba, w, h);
        }
        (w, h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn place(c: &mut Canvas, rect: Rect) {
        c.push_sub_image(SubImage {
            key: format!("{:?}", rect),
            name: String::new(),
            rect,
            rotated: false,
        });
    }

    #[test]
    fn init_uses_asset_size_not_maximum() {
        let mut c = Canvas::new((2048, 2048));
        c.init_virtual_size(40, 100);
        assert_eq!(c.virtual_size(), (64, 128));
        assert_eq!(c.free_rects(), &[Rect::new(0, 0, 64, 128)]);
        assert_eq!(c.rgba().dimensions(), (64, 128));
    }

    #[test]
    fn grow_square_canvas_prefers_height_on_tie() {
        let mut c = Canvas::new((256, 256));
        c.init_virtual_size(64, 64);
        let _ = c.take_free_rect(0);
        place(&mut c, Rect::new(0, 0, 64, 64));
        assert!(c.grow_virtual_size());
        assert_eq!(c.virtual_size(), (64, 128));
        assert_eq!(c.free_rects(), &[Rect::new(0, 64, 64, 64)]);
    }

    #[test]
    fn grow_clips_overlapping_free_space() {
        let mut c = Canvas::new((256, 128));
        c.init_virtual_size(64, 128);
        let _ = c.take_free_rect(0);
        place(&mut c, Rect::new(0, 0, 32, 128));
        c.push_free_rect(Rect::new(32, 0, 32, 128));
        // height is maxed, so width grows from the extreme x (32)
        assert!(c.grow_virtual_size());
        assert_eq!(c.virtual_size(), (128, 128));
        assert_eq!(c.free_rects(), &[Rect::new(32, 0, 96, 128)]);
    }

    #[test]
    fn grow_shrinks_rect_straddling_new_block() {
        let mut c = Canvas::new((128, 128));
        c.init_virtual_size(64, 64);
        let _ = c.take_free_rect(0);
        place(&mut c, Rect::new(0, 0, 40, 20));
        c.push_free_rect(Rect::new(40, 0, 24, 64));
        c.push_free_rect(Rect::new(0, 20, 40, 44));
        // spare (24, 44): width volume (128+24)*64 < height volume (128+44)*64
        assert!(c.grow_virtual_size());
        assert_eq!(c.virtual_size(), (128, 64));
        let free = c.free_rects();
        assert!(free.contains(&Rect::new(40, 0, 88, 64)));
        assert!(free.contains(&Rect::new(0, 20, 40, 44)));
        assert_eq!(free.len(), 2);
    }

    #[test]
    fn grow_refused_at_maximum() {
        let mut c = Canvas::new((64, 64));
        c.init_virtual_size(64, 64);
        assert!(!c.grow_virtual_size());
    }

    #[test]
    fn finalize_trims_to_pow2_extremes() {
        let mut c = Canvas::new((512, 512));
        c.init_virtual_size(256, 256);
        place(&mut c, Rect::new(0, 0, 70, 20));
        assert_eq!(c.finalize(), (128, 32));
        assert_eq!(c.rgba().dimensions(), (128, 32));
    }
}
