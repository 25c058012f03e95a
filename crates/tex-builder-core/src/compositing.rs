use image::RgbaImage;

const BPP: usize = 4;

/// Blit `src` into `canvas` with its top-left at (dx, dy).
///
/// Unrotated copies move whole rows at once. Rotated copies turn the source 90° so that
/// destination `(x, y)` takes source `(src_w - 1 - y, x)`; the rendered size is then
/// `(src_h, src_w)`. The caller guarantees the destination area lies inside `canvas`.
pub fn blit_rgba(src: &RgbaImage, canvas: &mut RgbaImage, dx: u32, dy: u32, rotated: bool) {
    let (sw, sh) = src.dimensions();
    let (rw, rh) = if rotated { (sh, sw) } else { (sw, sh) };
    let (cw, ch) = canvas.dimensions();
    debug_assert!(dx + rw <= cw && dy + rh <= ch, "blit outside canvas");

    if !rotated {
        let row_len = sw as usize * BPP;
        let src_raw = src.as_raw();
        let dst: &mut [u8] = canvas;
        for line in 0..sh as usize {
            let s = line * row_len;
            let d = ((dy as usize + line) * cw as usize + dx as usize) * BPP;
            dst[d..d + row_len].copy_from_slice(&src_raw[s..s + row_len]);
        }
        return;
    }

    for x in 0..rw {
        for y in 0..rh {
            let px = *src.get_pixel(sw - y - 1, x);
            canvas.put_pixel(dx + x, dy + y, px);
        }
    }
}

/// Returns a copy of `canvas` resized to `w x h`: content is kept at the origin, new area is
/// transparent and anything beyond the new extents is cut off.
pub fn resize_canvas(canvas: &RgbaImage, w: u32, h: u32) -> RgbaImage {
    let (cw, ch) = canvas.dimensions();
    let mut out = RgbaImage::new(w, h);
    let copy_w = cw.min(w) as usize * BPP;
    let src_raw = canvas.as_raw();
    let dst: &mut [u8] = &mut out;
    for line in 0..ch.min(h) as usize {
        let s = line * cw as usize * BPP;
        let d = line * w as usize * BPP;
        dst[d..d + copy_w].copy_from_slice(&src_raw[s..s + copy_w]);
    }
    out
}
