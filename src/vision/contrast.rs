use crate::model::{ContrastMap, Frame};

/// Computes a Sobel-gradient-magnitude contrast map, normalized to [0,1]
/// (C5). Border pixels (no full 3x3 neighborhood) are left at zero.
pub fn compute_contrast_map(frame: &Frame) -> Result<ContrastMap, crate::error::NavError> {
    if frame.pixels.len() != frame.expected_len() {
        return Err(crate::error::NavError::InvalidArgument {
            field: "frame.pixels".into(),
            message: format!(
                "expected {} bytes for a {}x{} RGBA frame, got {}",
                frame.expected_len(),
                frame.width,
                frame.height,
                frame.pixels.len()
            ),
        });
    }

    let width = frame.width as usize;
    let height = frame.height as usize;

    let mut gray = vec![0.0f32; width * height];
    for (i, chunk) in frame.pixels.chunks_exact(4).enumerate() {
        gray[i] = super::luminance_u8(chunk[0], chunk[1], chunk[2]) as f32;
    }

    let mut magnitude = vec![0.0f32; width * height];
    let mut max_magnitude = 0.0f32;

    if width >= 3 && height >= 3 {
        for y in 1..height - 1 {
            for x in 1..width - 1 {
                let gx = sobel_gx(&gray, width, x, y);
                let gy = sobel_gy(&gray, width, x, y);
                let mag = (gx * gx + gy * gy).sqrt();
                magnitude[y * width + x] = mag;
                if mag > max_magnitude {
                    max_magnitude = mag;
                }
            }
        }
    }

    let values = if max_magnitude > 0.0 {
        magnitude.iter().map(|&m| m / max_magnitude).collect()
    } else {
        magnitude
    };

    Ok(ContrastMap {
        width: frame.width,
        height: frame.height,
        values,
    })
}

#[inline]
fn sample(gray: &[f32], width: usize, x: usize, y: usize) -> f32 {
    gray[y * width + x]
}

#[inline]
fn sobel_gx(gray: &[f32], width: usize, x: usize, y: usize) -> f32 {
    sample(gray, width, x + 1, y - 1) + 2. * sample(gray, width, x + 1, y) + sample(gray, width, x + 1, y + 1)
        - sample(gray, width, x - 1, y - 1)
        - 2. * sample(gray, width, x - 1, y)
        - sample(gray, width, x - 1, y + 1)
}

#[inline]
fn sobel_gy(gray: &[f32], width: usize, x: usize, y: usize) -> f32 {
    sample(gray, width, x - 1, y + 1) + 2. * sample(gray, width, x, y + 1) + sample(gray, width, x + 1, y + 1)
        - sample(gray, width, x - 1, y - 1)
        - 2. * sample(gray, width, x, y - 1)
        - sample(gray, width, x + 1, y - 1)
}
