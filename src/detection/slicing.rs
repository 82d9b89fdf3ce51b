//! Sliding-window geometry and cross-window merging.

use crate::models::Detection;

/// A slice of the full image in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceWindow {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Overlapping windows covering an image.
///
/// Consecutive windows overlap by `floor(ratio * slice)` pixels. Windows that
/// would cross the right or bottom edge are shifted back inside the image, so
/// every window is full-size unless the image itself is smaller.
pub fn slice_windows(
    image_width: u32,
    image_height: u32,
    slice_width: u32,
    slice_height: u32,
    overlap_width_ratio: f32,
    overlap_height_ratio: f32,
) -> Vec<SliceWindow> {
    let mut windows = Vec::new();
    if image_width == 0 || image_height == 0 || slice_width == 0 || slice_height == 0 {
        return windows;
    }

    let x_overlap = (overlap_width_ratio * slice_width as f32) as u32;
    let y_overlap = (overlap_height_ratio * slice_height as f32) as u32;
    // Overlap must leave room to advance
    let x_overlap = x_overlap.min(slice_width - 1);
    let y_overlap = y_overlap.min(slice_height - 1);

    let mut y_min = 0u32;
    let mut y_max = 0u32;
    while y_max < image_height {
        y_max = y_min + slice_height;
        let mut x_min = 0u32;
        let mut x_max = 0u32;
        while x_max < image_width {
            x_max = x_min + slice_width;
            if y_max > image_height || x_max > image_width {
                let xmax = x_max.min(image_width);
                let ymax = y_max.min(image_height);
                let xmin = xmax.saturating_sub(slice_width);
                let ymin = ymax.saturating_sub(slice_height);
                windows.push(SliceWindow { x: xmin, y: ymin, width: xmax - xmin, height: ymax - ymin });
            } else {
                windows.push(SliceWindow { x: x_min, y: y_min, width: slice_width, height: slice_height });
            }
            x_min = x_max - x_overlap;
        }
        y_min = y_max - y_overlap;
    }

    windows
}

/// Class-aware non-maximum suppression by IoU
pub fn nms(mut detections: Vec<Detection>, iou_threshold: f64) -> Vec<Detection> {
    detections.sort_by(|a, b| b.score.total_cmp(&a.score));
    let mut kept: Vec<Detection> = Vec::new();
    for det in detections {
        let suppressed = kept
            .iter()
            .any(|k| k.label == det.label && k.iou(&det) > iou_threshold);
        if !suppressed {
            kept.push(det);
        }
    }
    kept
}

/// Greedy non-maximum merging across slices.
///
/// Highest score first; same-label boxes whose intersection-over-smaller with
/// the current box reaches `threshold` are folded into it (union box, max
/// score). A candidate that no longer matches the grown box is still dropped.
pub fn greedy_merge(mut detections: Vec<Detection>, threshold: f64) -> Vec<Detection> {
    detections.sort_by(|a, b| b.score.total_cmp(&a.score));
    let mut used = vec![false; detections.len()];
    let mut merged = Vec::new();

    for i in 0..detections.len() {
        if used[i] {
            continue;
        }
        used[i] = true;
        let anchor = &detections[i];
        let mut keep = anchor.clone();

        for j in (i + 1)..detections.len() {
            if used[j] || detections[j].label != anchor.label {
                continue;
            }
            if anchor.ios(&detections[j]) < threshold {
                continue;
            }
            used[j] = true;
            let other = &detections[j];
            if keep.ios(other) >= threshold {
                keep.minx = keep.minx.min(other.minx);
                keep.miny = keep.miny.min(other.miny);
                keep.maxx = keep.maxx.max(other.maxx);
                keep.maxy = keep.maxy.max(other.maxy);
                keep.score = keep.score.max(other.score);
            }
        }
        merged.push(keep);
    }

    merged
}
