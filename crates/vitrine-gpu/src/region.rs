//! Integer rectangles in device pixels.
//!
//! Used for damage/opaque regions and scissor state. Always axis-aligned,
//! origin top-left.

/// Rectangle in device pixels.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub struct DeviceRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl DeviceRect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rect covering a full `width` x `height` target.
    pub const fn covering(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    const fn right(&self) -> u32 {
        self.x.saturating_add(self.width)
    }

    const fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }

    /// Intersection of two rects. `None` if they do not overlap; rects that
    /// merely share an edge have a zero-area overlap and also return `None`.
    pub fn intersect(&self, other: DeviceRect) -> Option<DeviceRect> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());

        if x0 >= x1 || y0 >= y1 {
            return None;
        }

        Some(DeviceRect::new(x0, y0, x1 - x0, y1 - y0))
    }

    /// Clamps this rect to fit inside a `width` x `height` target.
    ///
    /// Scissor rects handed to a backend must not exceed the render target;
    /// a rect entirely outside clamps to empty.
    pub fn clamped_to(&self, width: u32, height: u32) -> DeviceRect {
        self.intersect(DeviceRect::covering(width, height))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(x: u32, y: u32, w: u32, h: u32) -> DeviceRect {
        DeviceRect::new(x, y, w, h)
    }

    #[test]
    fn intersect_overlapping() {
        let i = r(0, 0, 10, 10).intersect(r(5, 5, 10, 10)).unwrap();
        assert_eq!(i, r(5, 5, 5, 5));
    }

    #[test]
    fn intersect_contained() {
        let outer = r(0, 0, 100, 100);
        let inner = r(10, 10, 20, 20);
        assert_eq!(outer.intersect(inner).unwrap(), inner);
    }

    #[test]
    fn intersect_touching_edge_returns_none() {
        assert!(r(0, 0, 10, 10).intersect(r(10, 0, 10, 10)).is_none());
    }

    #[test]
    fn intersect_disjoint_returns_none() {
        assert!(r(0, 0, 5, 5).intersect(r(20, 20, 5, 5)).is_none());
    }

    #[test]
    fn clamp_inside_is_identity() {
        assert_eq!(r(2, 3, 4, 5).clamped_to(100, 100), r(2, 3, 4, 5));
    }

    #[test]
    fn clamp_overhanging_shrinks() {
        assert_eq!(r(90, 90, 20, 20).clamped_to(100, 100), r(90, 90, 10, 10));
    }

    #[test]
    fn clamp_outside_is_empty() {
        assert!(r(200, 200, 10, 10).clamped_to(100, 100).is_empty());
    }
}
