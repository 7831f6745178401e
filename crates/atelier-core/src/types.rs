//! Core engine types.

use serde::{Deserialize, Serialize};

/// A 2D surface extent in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Extent2d {
    pub width: u32,
    pub height: u32,
}

impl Extent2d {
    /// Create a new extent.
    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns true if either dimension is zero (e.g. a minimized window).
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Aspect ratio (width / height), or 1.0 for an empty extent.
    pub fn aspect_ratio(&self) -> f32 {
        if self.is_empty() {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

/// Monotonically increasing frame counter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct FrameNumber(pub u64);

impl FrameNumber {
    /// The frame before any rendering has happened.
    pub const ZERO: Self = Self(0);

    /// Advance to the next frame.
    #[inline]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extent_empty() {
        assert!(Extent2d::new(0, 720).is_empty());
        assert!(Extent2d::new(1280, 0).is_empty());
        assert!(!Extent2d::new(1280, 720).is_empty());
    }

    #[test]
    fn extent_aspect_ratio() {
        let extent = Extent2d::new(1920, 1080);
        assert!((extent.aspect_ratio() - 16.0 / 9.0).abs() < 1e-6);
        assert!((Extent2d::default().aspect_ratio() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn frame_number_advances() {
        let frame = FrameNumber::ZERO;
        assert_eq!(frame.next(), FrameNumber(1));
        assert_eq!(frame.next().next(), FrameNumber(2));
    }
}
