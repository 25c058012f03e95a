use image::RgbaImage;
use tracing::{debug, warn};

use crate::canvas::Canvas;
use crate::config::Settings;
use crate::error::Result;
use crate::model::{Rect, SubImage};

pub mod guillotine;

/// An asset ready for placement: key, display name and decoded RGBA pixels.
pub struct PackItem {
    pub key: String,
    pub name: String,
    pub rgba: RgbaImage,
}

impl PackItem {
    pub fn new(key: impl Into<String>, name: impl Into<String>, rgba: RgbaImage) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            rgba,
        }
    }
    pub fn width(&self) -> u32 {
        self.rgba.width()
    }
    pub fn height(&self) -> u32 {
        self.rgba.height()
    }
    fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }
}

/// Where an asset will go inside a free rectangle.
#[derive(Debug, Clone, Copy)]
struct Fit {
    idx: usize,
    rotated: bool,
    pad_w: u32,
    pad_h: u32,
    /// Block taken from the free rectangle: placed size plus applied padding.
    used_w: u32,
    used_h: u32,
}

/// Places assets into a growing list of canvases.
///
/// Assets are tried against every existing canvas without growth first, then with growth,
/// and only then is a new canvas opened. Assets larger than the maximum canvas on either
/// axis get a dedicated single-image canvas.
pub struct Packer {
    settings: Settings,
    max_size: (u32, u32),
    canvases: Vec<Canvas>,
}

impl Packer {
    pub fn new(settings: Settings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            max_size: settings.max_canvas_size(),
            settings,
            canvases: Vec::new(),
        })
    }

    pub fn canvases(&self) -> &[Canvas] {
        &self.canvases
    }

    pub fn into_canvases(self) -> Vec<Canvas> {
        self.canvases
    }

    /// Place one asset. The pixel buffer is consumed and dropped once copied.
    pub fn insert(&mut self, item: PackItem) {
        let (w, h) = (item.width(), item.height());
        if w > self.max_size.0 || h > self.max_size.1 {
            debug!(key = %item.key, w, h, "oversized asset gets its own canvas");
            self.canvases.push(Canvas::single(item.key, item.name, item.rgba));
            return;
        }

        if self.place_in_existing(&item) {
            return;
        }
        self.canvases.push(Canvas::new(self.max_size));
        debug!(canvas = self.canvases.len() - 1, "opened canvas");
        if !self.place_in_existing(&item) {
            warn!(key = %item.key, w, h, "asset could not be placed on a fresh canvas");
        }
    }

    fn place_in_existing(&mut self, item: &PackItem) -> bool {
        for allow_grow in [false, true] {
            for idx in 0..self.canvases.len() {
                if self.try_place(item, idx, allow_grow) {
                    return true;
                }
            }
        }
        false
    }

    /// Try to place `item` on canvas `idx`, growing it when allowed until it either fits or
    /// reaches the maximum size.
    pub fn try_place(&mut self, item: &PackItem, idx: usize, allow_grow: bool) -> bool {
        let settings = self.settings;
        let canvas = &mut self.canvases[idx];
        if canvas.is_single_image() {
            return false;
        }
        if !canvas.is_initialized() {
            canvas.init_virtual_size(item.width(), item.height());
        }
        loop {
            let found = find_fit(&settings, canvas.free_rects(), item.width(), item.height());
            if let Some(fit) = found {
                place(canvas, item, fit);
                debug!(key = %item.key, canvas = idx, rotated = fit.rotated, "placed");
                return true;
            }
            if !allow_grow || !canvas.grow_virtual_size() {
                return false;
            }
        }
    }
}

/// Padding applies only on edges that do not touch the canvas border.
fn padding_for(settings: &Settings, r: &Rect) -> (u32, u32) {
    let pad_w = if r.x == 0 { 0 } else { settings.padding_width };
    let pad_h = if r.y == 0 { 0 } else { settings.padding_height };
    (pad_w, pad_h)
}

/// First free rectangle (in scan order) that holds a `w x h` asset plus padding.
/// A padded size that overflows `u32` never fits.
fn find_fit(settings: &Settings, free: &[Rect], w: u32, h: u32) -> Option<Fit> {
    free.iter().enumerate().find_map(|(idx, r)| {
        let (pad_w, pad_h) = padding_for(settings, r);
        let fits = |w: u32, h: u32| {
            let used_w = w.checked_add(pad_w).filter(|&uw| uw <= r.w)?;
            let used_h = h.checked_add(pad_h).filter(|&uh| uh <= r.h)?;
            Some((used_w, used_h))
        };
        let (rotated, (used_w, used_h)) = match fits(w, h) {
            Some(used) => (false, used),
            None if settings.allow_rotation => (true, fits(h, w)?),
            None => return None,
        };
        Some(Fit {
            idx,
            rotated,
            pad_w,
            pad_h,
            used_w,
            used_h,
        })
    })
}

fn place(canvas: &mut Canvas, item: &PackItem, fit: Fit) {
    let fr = canvas.take_free_rect(fit.idx);
    let (w, h) = if fit.rotated {
        (item.height(), item.width())
    } else {
        (item.width(), item.height())
    };
    let dx = fr.x + fit.pad_w;
    let dy = fr.y + fit.pad_h;
    canvas.copy_asset_into(&item.rgba, dx, dy, fit.rotated);

    let (a, b) = guillotine::split(&fr, fit.used_w, fit.used_h);
    for r in [a, b].into_iter().flatten() {
        canvas.push_free_rect(r);
    }
    canvas.push_sub_image(SubImage {
        key: item.key.clone(),
        name: item.name.clone(),
        rect: Rect::new(dx, dy, w, h),
        rotated: fit.rotated,
    });
    canvas.sort_free_rects();
}

/// Pack `items` into canvases. Zero-sized items are dropped; the rest are placed largest
/// first (stable on ties).
pub fn pack(items: Vec<PackItem>, settings: Settings) -> Result<Vec<Canvas>> {
    let mut packer = Packer::new(settings)?;

    let mut items: Vec<PackItem> = items
        .into_iter()
        .filter(|it| {
            let ok = it.width() > 0 && it.height() > 0;
            if !ok {
                warn!(key = %it.key, "dropping zero-sized asset");
            }
            ok
        })
        .collect();
    items.sort_by(|a, b| b.area().cmp(&a.area()));

    for item in items {
        packer.insert(item);
    }
    Ok(packer.into_canvases())
}
