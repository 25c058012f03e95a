use crate::model::Rect;

/// Split free rectangle `fr` after a `(w, h)` block (placed size plus applied padding) has
/// been taken from its top-left corner.
///
/// Two guillotine cuts are possible:
/// - A: wide right remainder (full height) + short bottom remainder (below the block only)
/// - B: wide bottom remainder (full width) + short right remainder (beside the block only)
///
/// A is kept when any of its areas beats the competing area of B; otherwise B.
/// Zero-area remainders come back as `None`.
pub fn split(fr: &Rect, w: u32, h: u32) -> (Option<Rect>, Option<Rect>) {
    let rem_w = fr.w.saturating_sub(w);
    let rem_h = fr.h.saturating_sub(h);

    let right_large = Rect::new(fr.x + w, fr.y, rem_w, fr.h);
    let bottom_small = Rect::new(fr.x, fr.y + h, fr.w - rem_w, rem_h);
    let bottom_large = Rect::new(fr.x, fr.y + h, fr.w, rem_h);
    let right_small = Rect::new(fr.x + w, fr.y, rem_w, fr.h - rem_h);

    let keep_right_large = right_large.area() > bottom_large.area()
        || bottom_small.area() > right_small.area()
        || right_large.area() > right_small.area()
        || bottom_small.area() > bottom_large.area();

    let (a, b) = if keep_right_large {
        (right_large, bottom_small)
    } else {
        (bottom_large, right_small)
    };
    (a.is_valid().then_some(a), b.is_valid().then_some(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_fit_leaves_nothing() {
        assert_eq!(split(&Rect::new(0, 0, 64, 64), 64, 64), (None, None));
    }

    #[test]
    fn wide_rect_keeps_full_height_right_part() {
        let (a, b) = split(&Rect::new(0, 0, 128, 64), 32, 32);
        assert_eq!(a, Some(Rect::new(32, 0, 96, 64)));
        assert_eq!(b, Some(Rect::new(0, 32, 32, 32)));
    }

    #[test]
    fn full_width_block_leaves_bottom_strip() {
        let (a, b) = split(&Rect::new(0, 0, 64, 64), 64, 16);
        assert_eq!(a, None);
        assert_eq!(b, Some(Rect::new(0, 16, 64, 48)));
    }

    #[test]
    fn remainders_never_overlap_block() {
        let fr = Rect::new(10, 20, 50, 70);
        let block = Rect::new(10, 20, 17, 33);
        let (a, b) = split(&fr, block.w, block.h);
        for r in [a, b].into_iter().flatten() {
            assert!(fr.contains(&r));
            assert!(!r.intersects(&block));
        }
        if let (Some(a), Some(b)) = (a, b) {
            assert!(!a.intersects(&b));
        }
    }
}
