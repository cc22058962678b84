//! Slice rendering to PNG.

use super::colormap::Colormap;
use crate::volume::{Axis, Slice, Volume};
use anyhow::{Context, Result};
use image::{GrayImage, Luma, Rgb, RgbImage};
use std::path::{Path, PathBuf};

const MONTAGE_GAP: u32 = 4;
const COLORBAR_WIDTH: u32 = 16;

/// The four slices around the centre: the volume is cut in ninths and
/// segments 3 to 6 are shown.
pub fn central_indices(len: usize) -> [usize; 4] {
    [3, 4, 5, 6].map(|i| i * len / 9)
}

/// Zero-based index for a 1-based slice number; negative selects the middle.
pub fn selected_index(len: usize, slice_number: i64) -> usize {
    let idx = if slice_number < 0 {
        len / 2
    } else {
        (slice_number as usize).saturating_sub(1)
    };
    idx.min(len.saturating_sub(1))
}

/// Grayscale rendering stretched to the slice's own min..max.
pub fn gray_image(slice: &Slice) -> GrayImage {
    let (lo, hi) = slice
        .values
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let span = if hi > lo { hi - lo } else { 1.0 };
    let mut img = GrayImage::new(slice.width as u32, slice.height as u32);
    for row in 0..slice.height {
        for col in 0..slice.width {
            let v = ((slice.get(col, row) - lo) / span * 255.0).round() as u8;
            img.put_pixel(col as u32, row as u32, Luma([v]));
        }
    }
    img
}

/// Colored rendering with a fixed value range `lowest..highest`.
pub fn color_image(slice: &Slice, cmap: &Colormap, lowest: f32, highest: f32) -> RgbImage {
    let span = if highest > lowest { highest - lowest } else { 1.0 };
    let mut img = RgbImage::new(slice.width as u32, slice.height as u32);
    for row in 0..slice.height {
        for col in 0..slice.width {
            let t = (slice.get(col, row) - lowest) / span;
            img.put_pixel(col as u32, row as u32, cmap.sample(t));
        }
    }
    img
}

/// Tile equally sized images `cols` per row and append a vertical color bar.
pub fn montage(images: &[RgbImage], cols: u32, cmap: &Colormap) -> RgbImage {
    let (w, h) = images
        .first()
        .map(|i| i.dimensions())
        .unwrap_or((1, 1));
    let cols = cols.max(1);
    let rows = (images.len() as u32).div_ceil(cols).max(1);
    let grid_w = cols * w + (cols - 1) * MONTAGE_GAP;
    let grid_h = rows * h + (rows - 1) * MONTAGE_GAP;
    let mut out = RgbImage::from_pixel(
        grid_w + MONTAGE_GAP + COLORBAR_WIDTH,
        grid_h,
        Rgb([255, 255, 255]),
    );
    for (i, img) in images.iter().enumerate() {
        let (c, r) = (i as u32 % cols, i as u32 / cols);
        let (ox, oy) = (c * (w + MONTAGE_GAP), r * (h + MONTAGE_GAP));
        for (x, y, p) in img.enumerate_pixels() {
            if x < w && y < h {
                out.put_pixel(ox + x, oy + y, *p);
            }
        }
    }
    // Top of the bar is the highest value.
    let bar_x = grid_w + MONTAGE_GAP;
    for y in 0..grid_h {
        let t = 1.0 - y as f32 / (grid_h.max(2) - 1) as f32;
        let color = cmap.sample(t);
        for x in 0..COLORBAR_WIDTH {
            out.put_pixel(bar_x + x, y, color);
        }
    }
    out
}

fn file_name(name: &str, axis: Axis, index: usize) -> String {
    format!("{name}_{}{:03}.png", axis.as_str(), index + 1)
}

/// Central grayscale slice of `volume`, written into `out_dir`.
pub fn save_gray_slice(
    volume: &Volume,
    name: &str,
    axis: Axis,
    out_dir: &Path,
) -> Result<PathBuf> {
    let index = selected_index(volume.axis_len(axis), -1);
    let slice = volume
        .slice(axis, index)
        .with_context(|| format!("slice {index} out of range"))?;
    let path = out_dir.join(file_name(name, axis, index));
    gray_image(&slice)
        .save(&path)
        .with_context(|| format!("write {}", path.display()))?;
    Ok(path)
}

/// 2x2 montage of the central slices, colored in `lowest..highest`.
pub fn save_color_montage(
    volume: &Volume,
    name: &str,
    axis: Axis,
    cmap: &Colormap,
    range: (f32, f32),
    out_dir: &Path,
) -> Result<PathBuf> {
    let images = central_indices(volume.axis_len(axis))
        .iter()
        .filter_map(|&i| volume.slice(axis, i))
        .map(|s| color_image(&s, cmap, range.0, range.1))
        .collect::<Vec<_>>();
    let path = out_dir.join(format!("{name}_{}_slices.png", axis.as_str()));
    montage(&images, 2, cmap)
        .save(&path)
        .with_context(|| format!("write {}", path.display()))?;
    Ok(path)
}

/// One colored slice; `slice_number` is 1-based, negative for the middle.
pub fn save_color_slice(
    volume: &Volume,
    name: &str,
    axis: Axis,
    slice_number: i64,
    cmap: &Colormap,
    range: (f32, f32),
    out_dir: &Path,
) -> Result<PathBuf> {
    let index = selected_index(volume.axis_len(axis), slice_number);
    let slice = volume
        .slice(axis, index)
        .with_context(|| format!("slice {} out of range", index + 1))?;
    let img = color_image(&slice, cmap, range.0, range.1);
    let path = out_dir.join(file_name(&format!("{name}_color"), axis, index));
    montage(&[img], 1, cmap)
        .save(&path)
        .with_context(|| format!("write {}", path.display()))?;
    Ok(path)
}
