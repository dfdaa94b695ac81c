use crate::model::{ContrastMap, Frame, HazardDetection, HazardKind, PixelRect};

/// Caps the number of cells a single region-growing pass may visit, bounding
/// per-frame cost regardless of how large a connected region turns out to be.
/// A region that hits this cap is reported as a detector failure rather than
/// silently truncated, since its size/confidence would no longer be accurate.
const MAX_REGION_GROWTH_ITERATIONS: usize = 8_192;

const OBSTACLE_MIN_REGION_SIZE: usize = 12;
const OBSTACLE_EDGE_DENSITY_THRESHOLD: f32 = 0.4;

const UNEVEN_VARIANCE_THRESHOLD: f64 = 500.0;
const UNEVEN_MIN_REGION_SIZE: usize = 6;

const DROP_OFF_STRIDE: u32 = 8;
const DROP_OFF_SAMPLE_OFFSET: u32 = 10;
const DROP_OFF_LUMINANCE_DIFF_THRESHOLD: i32 = 100;

/// Runs the three rule-based hazard detectors over a frame (C6). Each
/// detector is isolated: a failure in one does not prevent the others from
/// producing output. Returns the detections plus the name of any detector
/// that failed this frame, so the caller can track consecutive failures.
pub fn detect_hazards(frame: &Frame, contrast: &ContrastMap) -> (Vec<HazardDetection>, Vec<&'static str>) {
    let mut next_id = 0u32;
    let mut out = Vec::new();
    let mut failed = Vec::new();

    match detect_obstacles(frame, contrast, &mut next_id) {
        Ok(mut hazards) => out.append(&mut hazards),
        Err(err) => {
            tracing::warn!(detector = "obstacle", %err, "hazard detector failed");
            failed.push("obstacle");
        }
    }
    match detect_uneven_surfaces(frame, &mut next_id) {
        Ok(mut hazards) => out.append(&mut hazards),
        Err(err) => {
            tracing::warn!(detector = "uneven_surface", %err, "hazard detector failed");
            failed.push("uneven_surface");
        }
    }
    match detect_drop_offs(frame, &mut next_id) {
        Ok(mut hazards) => out.append(&mut hazards),
        Err(err) => {
            tracing::warn!(detector = "drop_off", %err, "hazard detector failed");
            failed.push("drop_off");
        }
    }

    (out, failed)
}

fn luminance_grid(frame: &Frame) -> Vec<u8> {
    frame
        .pixels
        .chunks_exact(4)
        .map(|c| super::luminance_u8(c[0], c[1], c[2]))
        .collect()
}

/// Averages an `src_w x src_h` grid down by `factor` in each dimension.
fn downsample_avg(src: &[f32], src_w: usize, src_h: usize, factor: usize) -> (Vec<f32>, usize, usize) {
    let dst_w = (src_w / factor).max(1);
    let dst_h = (src_h / factor).max(1);
    let mut dst = vec![0.0f32; dst_w * dst_h];
    for dy in 0..dst_h {
        for dx in 0..dst_w {
            let mut sum = 0.0f32;
            let mut count = 0u32;
            for sy in (dy * factor)..((dy * factor + factor).min(src_h)) {
                for sx in (dx * factor)..((dx * factor + factor).min(src_w)) {
                    sum += src[sy * src_w + sx];
                    count += 1;
                }
            }
            dst[dy * dst_w + dx] = if count > 0 { sum / count as f32 } else { 0.0 };
        }
    }
    (dst, dst_w, dst_h)
}

/// Bounded 4-connected flood fill. Returns the visited cell count, the
/// bounding box in the grid's own coordinate space, and whether the region
/// was still growing when the iteration cap cut it off.
fn grow_region(
    mask: &[bool],
    visited: &mut [bool],
    width: usize,
    height: usize,
    start: usize,
) -> (PixelRect, usize, bool) {
    let mut stack = vec![start];
    visited[start] = true;
    let (mut min_x, mut max_x) = (start % width, start % width);
    let (mut min_y, mut max_y) = (start / width, start / width);
    let mut count = 0usize;
    let mut capped = false;

    while let Some(idx) = stack.pop() {
        if count >= MAX_REGION_GROWTH_ITERATIONS {
            capped = true;
            break;
        }
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
                if !visited[nidx] && mask[nidx] {
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
    (rect, count, capped)
}

fn detect_obstacles(
    frame: &Frame,
    contrast: &ContrastMap,
    next_id: &mut u32,
) -> Result<Vec<HazardDetection>, crate::error::NavError> {
    let width = frame.width as usize;
    let height = frame.height as usize;
    if width == 0 || height == 0 {
        return Ok(Vec::new());
    }

    let (down, dw, dh) = downsample_avg(&contrast.values, width, height, 2);
    let mask: Vec<bool> = down.iter().map(|&v| v > OBSTACLE_EDGE_DENSITY_THRESHOLD).collect();
    let mut visited = vec![false; mask.len()];
    let total_pixels = (width * height) as f64;

    let mut out = Vec::new();
    for start in 0..mask.len() {
        if visited[start] || !mask[start] {
            continue;
        }
        let (rect_down, size, capped) = grow_region(&mask, &mut visited, dw, dh, start);
        if capped {
            return Err(crate::error::NavError::TransientProcessingError {
                component: "hazard_obstacle_region_growth".into(),
                message: format!(
                    "region exceeded the {MAX_REGION_GROWTH_ITERATIONS}-iteration growth budget"
                ),
            });
        }
        if size < OBSTACLE_MIN_REGION_SIZE {
            continue;
        }
        let bbox = rescale_rect(rect_down, 2, width as u32, height as u32);
        let confidence = (size as f64 / (total_pixels * 0.1)).min(1.0);
        out.push(HazardDetection {
            id: *next_id,
            kind: HazardKind::Obstacle,
            confidence,
            bbox,
            world_position: None,
        });
        *next_id += 1;
    }
    Ok(out)
}

fn detect_uneven_surfaces(
    frame: &Frame,
    next_id: &mut u32,
) -> Result<Vec<HazardDetection>, crate::error::NavError> {
    let width = frame.width as usize;
    let height = frame.height as usize;
    if width == 0 || height == 0 {
        return Ok(Vec::new());
    }

    let luminance = luminance_grid(frame);
    let variance = local_variance_map(&luminance, width, height);
    let (down, dw, dh) = downsample_avg(&variance, width, height, 4);
    let mask: Vec<bool> = down
        .iter()
        .map(|&v| v as f64 > UNEVEN_VARIANCE_THRESHOLD)
        .collect();
    let mut visited = vec![false; mask.len()];
    let total_pixels = (width * height) as f64;

    let mut out = Vec::new();
    for start in 0..mask.len() {
        if visited[start] || !mask[start] {
            continue;
        }
        let (rect_down, size, capped) = grow_region(&mask, &mut visited, dw, dh, start);
        if capped {
            return Err(crate::error::NavError::TransientProcessingError {
                component: "hazard_uneven_surface_region_growth".into(),
                message: format!(
                    "region exceeded the {MAX_REGION_GROWTH_ITERATIONS}-iteration growth budget"
                ),
            });
        }
        if size < UNEVEN_MIN_REGION_SIZE {
            continue;
        }
        let bbox = rescale_rect(rect_down, 4, width as u32, height as u32);
        let confidence = (size as f64 / (total_pixels * 0.05)).min(1.0);
        out.push(HazardDetection {
            id: *next_id,
            kind: HazardKind::UnevenSurface,
            confidence,
            bbox,
            world_position: None,
        });
        *next_id += 1;
    }
    Ok(out)
}

/// Variance over a centred 3x3 window, in the source grid's own resolution.
fn local_variance_map(luminance: &[u8], width: usize, height: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; width * height];
    for y in 0..height {
        for x in 0..width {
            let mut sum = 0.0f64;
            let mut sum_sq = 0.0f64;
            let mut count = 0u32;
            for dy in -1i32..=1 {
                for dx in -1i32..=1 {
                    let sx = x as i32 + dx;
                    let sy = y as i32 + dy;
                    if sx >= 0 && sy >= 0 && (sx as usize) < width && (sy as usize) < height {
                        let v = luminance[sy as usize * width + sx as usize] as f64;
                        sum += v;
                        sum_sq += v * v;
                        count += 1;
                    }
                }
            }
            let n = count as f64;
            let mean = sum / n;
            let mean_sq = sum_sq / n;
            out[y * width + x] = (mean_sq - mean * mean).max(0.0) as f32;
        }
    }
    out
}

fn rescale_rect(rect: PixelRect, factor: u32, frame_width: u32, frame_height: u32) -> PixelRect {
    let x = (rect.x * factor).min(frame_width.saturating_sub(1));
    let y = (rect.y * factor).min(frame_height.saturating_sub(1));
    let width = (rect.width * factor).min(frame_width - x).max(1);
    let height = (rect.height * factor).min(frame_height - y).max(1);
    PixelRect {
        x,
        y,
        width,
        height,
    }
}

fn detect_drop_offs(
    frame: &Frame,
    next_id: &mut u32,
) -> Result<Vec<HazardDetection>, crate::error::NavError> {
    let width = frame.width;
    let height = frame.height;
    if width == 0 || height == 0 {
        return Ok(Vec::new());
    }
    let luminance = luminance_grid(frame);
    let lower_half_start = height / 2;

    let mut out = Vec::new();
    let mut y = lower_half_start;
    while y + DROP_OFF_SAMPLE_OFFSET < height {
        let mut x = 0;
        while x < width {
            let here = luminance[(y * width + x) as usize] as i32;
            let below = luminance[((y + DROP_OFF_SAMPLE_OFFSET) * width + x) as usize] as i32;
            let diff = (here - below).abs();
            if diff > DROP_OFF_LUMINANCE_DIFF_THRESHOLD {
                let confidence = (diff as f64 / 255.0).min(1.0);
                let bbox_w = 40u32.min(width);
                let bbox_h = 20u32.min(height);
                let bx = x.saturating_sub(bbox_w / 2).min(width.saturating_sub(bbox_w));
                let by = y.saturating_sub(bbox_h).min(height.saturating_sub(bbox_h));
                out.push(HazardDetection {
                    id: *next_id,
                    kind: HazardKind::DropOff,
                    confidence,
                    bbox: PixelRect {
                        x: bx,
                        y: by,
                        width: bbox_w,
                        height: bbox_h,
                    },
                    world_position: None,
                });
                *next_id += 1;
            }
            x += DROP_OFF_STRIDE;
        }
        y += DROP_OFF_STRIDE;
    }
    Ok(out)
}
