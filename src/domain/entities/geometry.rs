//! Pixel geometry shared by requests and results.

use std::fmt;

/// Width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Size {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Size {
    /// Creates a new size.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Largest power-of-two downsampling factor that keeps this size at or
    /// above the target. A zero target dimension is unconstrained.
    #[must_use]
    pub fn sample_size_for(&self, target_width: u32, target_height: u32) -> u32 {
        if target_width == 0 && target_height == 0 {
            return 1;
        }
        let mut sample = 1u32;
        loop {
            let next = sample.saturating_mul(2);
            let fits_width = target_width == 0 || self.width / next >= target_width;
            let fits_height = target_height == 0 || self.height / next >= target_height;
            if next == sample || !fits_width || !fits_height {
                return sample;
            }
            sample = next;
        }
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Axis-aligned rectangle in source pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect {
    /// Left edge.
    pub left: u32,
    /// Top edge.
    pub top: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Rect {
    /// Creates a rectangle from its origin and extent.
    #[must_use]
    pub const fn new(left: u32, top: u32, width: u32, height: u32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Rectangle covering a whole image of the given size.
    #[must_use]
    pub const fn full(size: Size) -> Self {
        Self::new(0, 0, size.width, size.height)
    }

    /// Exclusive right edge.
    #[must_use]
    pub const fn right(&self) -> u32 {
        self.left.saturating_add(self.width)
    }

    /// Exclusive bottom edge.
    #[must_use]
    pub const fn bottom(&self) -> u32 {
        self.top.saturating_add(self.height)
    }

    /// Returns true if the rectangle lies entirely inside `size`.
    #[must_use]
    pub const fn fits_within(&self, size: Size) -> bool {
        self.width > 0 && self.height > 0 && self.right() <= size.width && self.bottom() <= size.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_edges() {
        let rect = Rect::new(10, 20, 30, 40);
        assert_eq!(rect.right(), 40);
        assert_eq!(rect.bottom(), 60);
    }

    #[test]
    fn test_sample_size_for() {
        let size = Size::new(1000, 800);
        assert_eq!(size.sample_size_for(0, 0), 1);
        assert_eq!(size.sample_size_for(1000, 800), 1);
        assert_eq!(size.sample_size_for(500, 400), 2);
        assert_eq!(size.sample_size_for(200, 100), 4);
        assert_eq!(size.sample_size_for(100, 0), 8);
        assert_eq!(size.sample_size_for(2000, 2000), 1);
    }

    #[test]
    fn test_rect_fits_within() {
        let size = Size::new(100, 100);
        assert!(Rect::new(0, 0, 100, 100).fits_within(size));
        assert!(!Rect::new(50, 50, 51, 10).fits_within(size));
        assert!(!Rect::new(0, 0, 0, 10).fits_within(size));
    }
}
