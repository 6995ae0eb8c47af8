use image::{ImageBuffer, Rgb};
use serde::{Deserialize, Serialize};

/// One RGB8 video frame, the unit of work for every extension.
pub type Frame = ImageBuffer<Rgb<u8>, Vec<u8>>;

/// A point in frame pixel coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f32,
    pub y: f32,
}

impl Point2D {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// True if the rect has a non-negative origin and extent and ends inside a
    /// `width` x `height` frame.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        let values = [self.x, self.y, self.width, self.height];
        values.iter().all(|v| v.is_finite() && *v >= 0.0)
            && self.right() <= width as f32
            && self.bottom() <= height as f32
    }
}

/// Rec. 601 luma of one pixel.
pub fn luma(pixel: &Rgb<u8>) -> u8 {
    let [r, g, b] = pixel.0;
    let y = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
    y.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_fits_within() {
        assert!(Rect::new(0.0, 0.0, 10.0, 10.0).fits_within(10, 10));
        assert!(Rect::new(2.0, 3.0, 4.0, 5.0).fits_within(10, 10));
        assert!(!Rect::new(5.0, 0.0, 6.0, 1.0).fits_within(10, 10));
        assert!(!Rect::new(-1.0, 0.0, 1.0, 1.0).fits_within(10, 10));
        assert!(!Rect::new(0.0, 0.0, f32::NAN, 1.0).fits_within(10, 10));
    }

    #[test]
    fn test_luma() {
        assert_eq!(luma(&Rgb([0, 0, 0])), 0);
        assert_eq!(luma(&Rgb([255, 255, 255])), 255);
        assert_eq!(luma(&Rgb([0, 255, 0])), 150);
    }
}
