//! Annotated overlay rendering: landmark dots and connecting lines drawn
//! over the analyzed photo, returned as JPEG bytes.

use crate::types::{LandmarkSet, Point};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use thiserror::Error;

const MARK_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const DOT_RADIUS: i64 = 1;

#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("overlay encode failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Draw `landmarks` and `connections` onto a copy of `image` and encode it
/// as JPEG. Connections referencing a missing landmark are skipped.
pub fn render_overlay(
    image: &RgbImage,
    landmarks: &LandmarkSet,
    connections: &[(usize, usize)],
) -> Result<Vec<u8>, OverlayError> {
    let canvas = draw_overlay(image, landmarks, connections);
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(canvas).write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)?;
    Ok(buf)
}

/// Draw without encoding.
pub fn draw_overlay(
    image: &RgbImage,
    landmarks: &LandmarkSet,
    connections: &[(usize, usize)],
) -> RgbImage {
    let mut canvas = image.clone();

    for point in &landmarks.points {
        draw_dot(&mut canvas, point);
    }

    for &(start, end) in connections {
        if let (Some(a), Some(b)) = (landmarks.get(start), landmarks.get(end)) {
            draw_line(&mut canvas, a, b);
        }
    }

    canvas
}

fn put_pixel(canvas: &mut RgbImage, x: i64, y: i64) {
    if x >= 0 && y >= 0 && x < canvas.width() as i64 && y < canvas.height() as i64 {
        canvas.put_pixel(x as u32, y as u32, MARK_COLOR);
    }
}

/// Filled disc of `DOT_RADIUS` around the point. Points that are not finite
/// or lie wholly off the canvas are skipped.
fn draw_dot(canvas: &mut RgbImage, p: &Point) {
    let reach = DOT_RADIUS as f64 + 1.0;
    if !p.x.is_finite()
        || !p.y.is_finite()
        || p.x < -reach
        || p.y < -reach
        || p.x > canvas.width() as f64 + reach
        || p.y > canvas.height() as f64 + reach
    {
        return;
    }

    let (cx, cy) = (p.x.round() as i64, p.y.round() as i64);
    for dy in -DOT_RADIUS..=DOT_RADIUS {
        for dx in -DOT_RADIUS..=DOT_RADIUS {
            if dx * dx + dy * dy <= DOT_RADIUS * DOT_RADIUS {
                put_pixel(canvas, cx + dx, cy + dy);
            }
        }
    }
}

/// One-pixel Bresenham line, clipped to the canvas.
fn draw_line(canvas: &mut RgbImage, a: &Point, b: &Point) {
    let Some((a, b)) = clip_segment(a, b, canvas.width() as f64, canvas.height() as f64) else {
        return;
    };

    let (mut x0, mut y0) = (a.x.round() as i64, a.y.round() as i64);
    let (x1, y1) = (b.x.round() as i64, b.y.round() as i64);

    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        put_pixel(canvas, x0, y0);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

/// Liang-Barsky clip of segment `a`-`b` to `[-1, width] x [-1, height]`.
/// Returns `None` for non-finite endpoints or a segment entirely outside.
fn clip_segment(a: &Point, b: &Point, width: f64, height: f64) -> Option<(Point, Point)> {
    if !(a.x.is_finite() && a.y.is_finite() && b.x.is_finite() && b.y.is_finite()) {
        return None;
    }

    let (dx, dy) = (b.x - a.x, b.y - a.y);
    if !(dx.is_finite() && dy.is_finite()) {
        return None;
    }

    let (mut t0, mut t1) = (0.0f64, 1.0f64);
    let edges = [
        (-dx, a.x + 1.0),
        (dx, width - a.x),
        (-dy, a.y + 1.0),
        (dy, height - a.y),
    ];
    for (p, q) in edges {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let t = q / p;
        if p < 0.0 {
            t0 = t0.max(t);
        } else {
            t1 = t1.min(t);
        }
        if t0 > t1 {
            return None;
        }
    }

    // Rounding at large magnitudes can land slightly outside the window.
    let at = |t: f64| {
        Point::new(
            (a.x + t * dx).clamp(-1.0, width),
            (a.y + t * dy).clamp(-1.0, height),
        )
    };
    Some((at(t0), at(t1)))
}
