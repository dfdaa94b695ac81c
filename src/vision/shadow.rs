use crate::model::{BrightnessHistogram, Frame, PixelRect, ShadowReport};

use super::histogram::compute_histogram;

/// Detects shadow coverage and shadow regions from a frame (C2).
///
/// The luminance threshold below which a pixel counts as shadow mixes a
/// fixed cutoff (for frames that are already near-black, where a quartile
/// would be meaningless) and an adaptive lower-quartile cutoff otherwise.
/// The intermediate mapping is left to this heuristic; only the documented
/// extremes are load-bearing (all-black > 0.5 coverage, all-white < 0.2).
pub fn detect_shadows(frame: &Frame) -> Result<ShadowReport, crate::error::NavError> {
    let hist = compute_histogram(frame)?;
    let threshold = shadow_threshold(&hist);

    let width = frame.width as usize;
    let height = frame.height as usize;
    let mut luminance = vec![0u8; width * height];
    for (i, chunk) in frame.pixels.chunks_exact(4).enumerate() {
        luminance[i] = super::luminance_u8(chunk[0], chunk[1], chunk[2]);
    }

    let mut visited = vec![false; width * height];
    let mut regions = Vec::new();
    let mut shadow_pixels: u64 = 0;

    for start in 0..luminance.len() {
        if visited[start] || luminance[start] as f64 >= threshold {
            continue;
        }
        let (rect, count) = flood_fill(&luminance, &mut visited, width, height, start, threshold);
        shadow_pixels += count;
        if rect.area() > 0 {
            regions.push(rect);
        }
    }

    let total = (width * height).max(1) as f64;
    let coverage = (shadow_pixels as f64 / total).clamp(0.0, 1.0);

    Ok(ShadowReport { coverage, regions })
}

fn shadow_threshold(hist: &BrightnessHistogram) -> f64 {
    const NEAR_BLACK_CUTOFF: f64 = 50.0;
    if hist.mean < 10.0 {
        return NEAR_BLACK_CUTOFF;
    }
    lower_quartile(&hist.bins)
}

fn lower_quartile(bins: &[u32; 256]) -> f64 {
    let total: u64 = bins.iter().map(|&c| c as u64).sum();
    if total == 0 {
        return 0.0;
    }
    let quarter = total as f64 / 4.0;
    let mut cumulative = 0u64;
    for (i, &count) in bins.iter().enumerate() {
        cumulative += count as u64;
        if cumulative as f64 >= quarter {
            return i as f64;
        }
    }
    255.0
}

/// Iterative 4-connected flood fill from `start`, returning the bounding box
/// and pixel count of the connected shadow region.
fn flood_fill(
    luminance: &[u8],
    visited: &mut [bool],
    width: usize,
    height: usize,
    start: usize,
    threshold: f64,
) -> (PixelRect, u64) {
    let mut stack = vec![start];
    visited[start] = true;

    let (mut min_x, mut max_x) = (start % width, start % width);
    let (mut min_y, mut max_y) = (start / width, start / width);
    let mut count = 0u64;

    while let Some(idx) = stack.pop() {
        count += 1;
        let x = idx % width;
        let y = idx / width;
        min_x = min_x.min(x);
        max_x = max_x.max(x);
        min_y = min_y.min(y);
        max_y = max_y.max(y);

        let neighbors = [
            (x.checked_sub(1), Some(y)),
            (Some(x + 1).filter(|&v| v < width), Some(y)),
            (Some(x), y.checked_sub(1)),
            (Some(x), Some(y + 1).filter(|&v| v < height)),
        ];
        for (nx, ny) in neighbors {
            if let (Some(nx), Some(ny)) = (nx, ny) {
                let nidx = ny * width + nx;
                if !visited[nidx] && (luminance[nidx] as f64) < threshold {
                    visited[nidx] = true;
                    stack.push(nidx);
                }
            }
        }
    }

    let rect = PixelRect {
        x: min_x as u32,
        y: min_y as u32,
        width: (max_x - min_x + 1) as u32,
        height: (max_y - min_y + 1) as u32,
    };
    (rect, count)
}
