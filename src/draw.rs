//! Pixel-level overlay primitives for `draw_overlay` implementations.
//!
//! Everything clips silently at the frame border.

use image::Rgb;

use crate::types::{Frame, Point2D, Rect};

pub const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
pub const CYAN: Rgb<u8> = Rgb([0, 255, 255]);
pub const RED: Rgb<u8> = Rgb([255, 0, 0]);
pub const GOLD: Rgb<u8> = Rgb([255, 215, 0]);

pub fn put(frame: &mut Frame, x: i64, y: i64, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u64) < frame.width() as u64 && (y as u64) < frame.height() as u64 {
        frame.put_pixel(x as u32, y as u32, color);
    }
}

/// Straight segment sampled in small parametric steps
pub fn line(frame: &mut Frame, from: Point2D, to: Point2D, color: Rgb<u8>) {
    if !from.is_finite() || !to.is_finite() {
        return;
    }
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let steps = dx.abs().max(dy.abs()).ceil().max(1.0) as u32;
    for i in 0..=steps {
        let t = i as f32 / steps as f32;
        let px = from.x + dx * t;
        let py = from.y + dy * t;
        put(frame, px.round() as i64, py.round() as i64, color);
    }
}

pub fn rect_outline(frame: &mut Frame, rect: &Rect, thickness: u32, color: Rgb<u8>) {
    let x0 = rect.x.floor() as i64;
    let y0 = rect.y.floor() as i64;
    let x1 = rect.right().ceil() as i64 - 1;
    let y1 = rect.bottom().ceil() as i64 - 1;
    for t in 0..thickness as i64 {
        for x in x0..=x1 {
            put(frame, x, y0 + t, color);
            put(frame, x, y1 - t, color);
        }
        for y in y0..=y1 {
            put(frame, x0 + t, y, color);
            put(frame, x1 - t, y, color);
        }
    }
}

pub fn fill_rect(frame: &mut Frame, rect: &Rect, color: Rgb<u8>) {
    let x0 = rect.x.floor() as i64;
    let y0 = rect.y.floor() as i64;
    let x1 = rect.right().ceil() as i64;
    let y1 = rect.bottom().ceil() as i64;
    for y in y0..y1 {
        for x in x0..x1 {
            put(frame, x, y, color);
        }
    }
}

/// Filled disc
pub fn dot(frame: &mut Frame, center: Point2D, radius: i64, color: Rgb<u8>) {
    let cx = center.x.round() as i64;
    let cy = center.y.round() as i64;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                put(frame, cx + dx, cy + dy, color);
            }
        }
    }
}
