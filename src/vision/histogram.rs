use crate::{
    error::NavError,
    model::{BrightnessHistogram, Frame},
};

/// Computes the 256-bin luminance histogram of a frame (C1).
///
/// Luminance uses the integer BT.601 weighting `(299R + 587G + 114B) / 1000`,
/// accumulated in a single pass over the pixel buffer.
pub fn compute_histogram(frame: &Frame) -> Result<BrightnessHistogram, NavError> {
    if frame.pixels.len() != frame.expected_len() {
        return Err(NavError::InvalidArgument {
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

    let mut bins = Box::new([0u32; 256]);
    let pixel_count = frame.pixel_count();

    let mut sum: u64 = 0;
    let mut sum_sq: u64 = 0;

    for chunk in frame.pixels.chunks_exact(4) {
        let [r, g, b, _a] = [chunk[0], chunk[1], chunk[2], chunk[3]];
        let y = luminance(r, g, b);
        bins[y as usize] += 1;
        sum += y as u64;
        sum_sq += (y as u64) * (y as u64);
    }

    let n = pixel_count as f64;
    let mean = if pixel_count == 0 {
        0.0
    } else {
        sum as f64 / n
    };
    let mean_sq = if pixel_count == 0 {
        0.0
    } else {
        sum_sq as f64 / n
    };
    let stdev = (mean_sq - mean * mean).max(0.0).sqrt();
    let median = compute_median(&bins, pixel_count);

    Ok(BrightnessHistogram {
        bins,
        mean,
        median,
        stdev,
    })
}

#[inline]
fn luminance(r: u8, g: u8, b: u8) -> u8 {
    let y = (299 * r as u32 + 587 * g as u32 + 114 * b as u32) / 1000;
    y.min(255) as u8
}

/// First bin index `i` where the cumulative count reaches `N/2`.
fn compute_median(bins: &[u32; 256], pixel_count: usize) -> f64 {
    if pixel_count == 0 {
        return 0.0;
    }
    let half = pixel_count as f64 / 2.0;
    let mut cumulative = 0u64;
    for (i, &count) in bins.iter().enumerate() {
        cumulative += count as u64;
        if cumulative as f64 >= half {
            return i as f64;
        }
    }
    255.0
}
