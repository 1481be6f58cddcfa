//! Grayscale resampling shared by the detector and the landmark regressor.

/// Sample `src` at a fractional position with bilinear interpolation.
/// Positions outside the image sample as 0 (black).
fn sample_bilinear(src: &[u8], width: usize, height: usize, sx: f32, sy: f32) -> f32 {
    let x0 = sx.floor() as i64;
    let y0 = sy.floor() as i64;
    let fx = sx - x0 as f32;
    let fy = sy - y0 as f32;

    let px = |x: i64, y: i64| -> f32 {
        if x >= 0 && y >= 0 && (x as usize) < width && (y as usize) < height {
            src[y as usize * width + x as usize] as f32
        } else {
            0.0
        }
    };

    px(x0, y0) * (1.0 - fx) * (1.0 - fy)
        + px(x0 + 1, y0) * fx * (1.0 - fy)
        + px(x0, y0 + 1) * (1.0 - fx) * fy
        + px(x0 + 1, y0 + 1) * fx * fy
}

/// Resize a full frame to `out_w × out_h`, clamping samples to the edge.
pub fn resize(src: &[u8], width: usize, height: usize, out_w: usize, out_h: usize) -> Vec<u8> {
    let mut out = vec![0u8; out_w * out_h];
    if width == 0 || height == 0 || src.len() < width * height {
        return out;
    }
    let sx_scale = width as f32 / out_w as f32;
    let sy_scale = height as f32 / out_h as f32;

    for y in 0..out_h {
        let sy = ((y as f32 + 0.5) * sy_scale - 0.5).clamp(0.0, (height - 1) as f32);
        for x in 0..out_w {
            let sx = ((x as f32 + 0.5) * sx_scale - 0.5).clamp(0.0, (width - 1) as f32);
            // Clamped to the last row/column, so the +1 neighbour may be
            // out of bounds only with zero weight.
            let v = sample_bilinear(src, width, height, sx, sy);
            out[y * out_w + x] = v.round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

/// Crop the square `[x0, x0+side) × [y0, y0+side)` (may extend past the
/// frame; outside pixels are black) and resample it to `out × out`.
pub fn crop_square(
    src: &[u8],
    width: usize,
    height: usize,
    x0: f32,
    y0: f32,
    side: f32,
    out: usize,
) -> Vec<u8> {
    let mut crop = vec![0u8; out * out];
    if src.len() < width * height || side <= 0.0 {
        return crop;
    }
    let step = side / out as f32;
    for y in 0..out {
        let sy = y0 + (y as f32 + 0.5) * step - 0.5;
        for x in 0..out {
            let sx = x0 + (x as f32 + 0.5) * step - 0.5;
            let v = sample_bilinear(src, width, height, sx, sy);
            crop[y * out + x] = v.round().clamp(0.0, 255.0) as u8;
        }
    }
    crop
}
