use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle (pixels). `x,y` is top-left; `w,h` are sizes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }
    /// Exclusive right edge coordinate (`x + w`).
    pub fn right(&self) -> u32 {
        self.x + self.w
    }
    /// Exclusive bottom edge coordinate (`y + h`).
    pub fn bottom(&self) -> u32 {
        self.y + self.h
    }
    pub fn area(&self) -> u64 {
        self.w as u64 * self.h as u64
    }
    /// A rectangle is usable free space only when both sides are non-zero.
    pub fn is_valid(&self) -> bool {
        self.w > 0 && self.h > 0
    }
    /// Returns true if `r` is fully inside `self`.
    pub fn contains(&self, r: &Rect) -> bool {
        r.x >= self.x && r.y >= self.y && r.right() <= self.right() && r.bottom() <= self.bottom()
    }
    /// Returns true if the interiors of `self` and `r` share at least one pixel.
    pub fn intersects(&self, r: &Rect) -> bool {
        self.x < r.right() && r.x < self.right() && self.y < r.bottom() && r.y < self.bottom()
    }
}

/// Stable sort by descending area. Every placement scan walks free space in this order,
/// so equal-area rectangles must keep their insertion order.
pub fn sort_by_area_desc(rects: &mut [Rect]) {
    rects.sort_by(|a, b| b.area().cmp(&a.area()));
}

/// Smallest power of two `>= v` (`1` for `0`).
pub fn next_pow2(v: u32) -> u32 {
    v.max(1).next_power_of_two()
}

/// Largest power of two `<= v` (`0` for `0`).
pub fn prev_pow2(v: u32) -> u32 {
    if v == 0 { 0 } else { 1 << (31 - v.leading_zeros()) }
}

pub fn is_pow2(v: u32) -> bool {
    v != 0 && (v & (v - 1)) == 0
}

/// A placed sub-image within a canvas.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubImage {
    /// Asset key as supplied by the caller (usually the source path).
    pub key: String,
    /// Key relative to the configured root directory; what runtimes look up.
    pub name: String,
    /// Placed rectangle (post-rotation width/height, origin after padding).
    pub rect: Rect,
    /// True if the asset was rotated 90° when placed.
    pub rotated: bool,
}

/// A finished atlas page (logical record).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub id: usize,
    /// Output file name, `<name>_<id:03>.png`.
    pub filename: String,
    pub width: u32,
    pub height: u32,
    /// True when the page holds a single oversized asset copied verbatim.
    pub single_image: bool,
    pub sub_images: Vec<SubImage>,
}

/// Statistics about atlas packing efficiency.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PackStats {
    pub num_pages: usize,
    pub num_sub_images: usize,
    /// Total area of all pages (sum of width * height for each page).
    pub total_page_area: u64,
    /// Total area covered by placed sub-images.
    pub used_area: u64,
    /// used_area / total_page_area (0.0 to 1.0).
    pub occupancy: f64,
    pub num_rotated: usize,
    pub num_single_image_pages: usize,
}

impl PackStats {
    pub fn from_pages(pages: &[Page]) -> Self {
        let mut num_sub_images = 0;
        let mut total_page_area = 0u64;
        let mut used_area = 0u64;
        let mut num_rotated = 0;
        let mut num_single_image_pages = 0;

        for page in pages {
            total_page_area += page.width as u64 * page.height as u64;
            if page.single_image {
                num_single_image_pages += 1;
            }
            for sub in &page.sub_images {
                num_sub_images += 1;
                used_area += sub.rect.area();
                if sub.rotated {
                    num_rotated += 1;
                }
            }
        }

        let occupancy = if total_page_area > 0 {
            used_area as f64 / total_page_area as f64
        } else {
            0.0
        };

        PackStats {
            num_pages: pages.len(),
            num_sub_images,
            total_page_area,
            used_area,
            occupancy,
            num_rotated,
            num_single_image_pages,
        }
    }

    /// Returns a human-readable summary of the statistics.
    pub fn summary(&self) -> String {
        format!(
            "Pages: {} ({} single-image), Sub-images: {}, Occupancy: {:.2}%, Total Area: {} px², Used Area: {} px², Rotated: {}",
            self.num_pages,
            self.num_single_image_pages,
            self.num_sub_images,
            self.occupancy * 100.0,
            self.total_page_area,
            self.used_area,
            self.num_rotated,
        )
    }

    /// Returns wasted space in pixels.
    pub fn wasted_area(&self) -> u64 {
        self.total_page_area.saturating_sub(self.used_area)
    }
}
