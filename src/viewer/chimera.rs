//! ChimeraX command scripts (`.cxc`).

use super::colormap::Colormap;
use anyhow::{Context, Result};
use log::info;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

pub const CONFIDENCE_SCRIPT: &str = "show_confidence_map.cxc";
pub const LOCAL_RES_SCRIPT: &str = "localres_chimera.cxc";
pub const CHIMERAX_BIN_VAR: &str = "CHIMERAX_BIN";

const KEY_STEPS: usize = 13;

/// `steps + 1` evenly spaced values from `min` to `max`, rounded to two decimals.
pub fn split_range(min: f64, max: f64, steps: usize) -> Vec<f64> {
    let delta = (max - min) / steps as f64;
    (0..=steps)
        .map(|i| ((min + i as f64 * delta) * 100.0).round() / 100.0)
        .collect()
}

/// Color key command and `value,color:` palette, both ordered high to low.
pub fn color_key(cmap: &Colormap) -> (String, String) {
    let mut steps = split_range(0.0, 1.0, KEY_STEPS);
    let mut colors = cmap.hex_list(steps.len());
    steps.reverse();
    colors.reverse();

    let mut key = String::new();
    let mut palette = Vec::with_capacity(steps.len());
    for (step, color) in steps.iter().zip(&colors) {
        let _ = write!(key, " {color}:{step:?}");
        palette.push(format!("{step:?},{color}"));
    }
    (
        format!("key{key} fontSize 15 size 0.025,0.4 pos 0.01,0.3"),
        palette.join(":"),
    )
}

/// Map geometry needed to place a volume at the origin.
#[derive(Debug, Clone, Copy)]
pub struct Placement {
    pub dims: (usize, usize, usize),
    pub sampling_rate: f64,
}

impl Placement {
    fn write_volume(&self, out: &mut String, model: u32) {
        let (x, y, z) = self.dims;
        let sr = self.sampling_rate;
        let _ = writeln!(out, "volume #{model} voxelSize {sr:.6}");
        let _ = writeln!(
            out,
            "volume #{model} origin {:.6},{:.6},{:.6}",
            -(x as f64) / 2.0 * sr,
            -(y as f64) / 2.0 * sr,
            -(z as f64) / 2.0 * sr
        );
    }
}

/// Script colouring either a structure or the original map by the confidence map.
pub fn confidence_map_script(
    confidence_map: &Path,
    original_map: &Path,
    structure: Option<&Path>,
    placement: Placement,
    cmap: &Colormap,
) -> String {
    let (key, palette) = color_key(cmap);
    let mut s = String::new();
    let _ = writeln!(s, "open {}", confidence_map.display());
    placement.write_volume(&mut s, 1);
    s.push_str("hide #1\n");

    match structure {
        Some(model) => {
            let _ = writeln!(s, "open {}", model.display());
            s.push_str("show cartoons\n");
            s.push_str("cartoon style width 1.5 thick 1.5\n");
            s.push_str("style stick\n");
            s.push_str("measure mapvalues #1 atoms #2 attribute confidence\n");
            let _ = writeln!(s, "color byattribute confidence palette {palette}");
            let _ = writeln!(s, "{key}");
            s.push_str("view\n");
            let _ = writeln!(s, "open {}", original_map.display());
            placement.write_volume(&mut s, 4);
            s.push_str("hide #4\n");
        }
        None => {
            let _ = writeln!(s, "open {}", original_map.display());
            placement.write_volume(&mut s, 2);
            let _ = writeln!(s, "color sample #2 map #1 palette {palette}");
            let _ = writeln!(s, "{key}");
            s.push_str("view\n");
        }
    }
    s
}

/// Script colouring half map one by its local resolution map.
pub fn local_resolution_script(half_map: &Path, local_res_map: &Path, sampling_rate: f64) -> String {
    let mut s = String::new();
    let _ = writeln!(s, "open {}", half_map.display());
    let _ = writeln!(s, "open {}", local_res_map.display());
    let _ = writeln!(s, "volume #1 voxelSize {sampling_rate:?}");
    let _ = writeln!(s, "volume #2 voxelSize {sampling_rate:?}");
    s.push_str("vol #2 hide\n");
    s.push_str("color sample #1 map #2 palette rainbow\n");
    s.push_str("view\n");
    s
}

pub fn write_script(path: &Path, script: &str) -> Result<PathBuf> {
    std::fs::write(path, script).with_context(|| format!("write {}", path.display()))?;
    info!("wrote ChimeraX script {}", path.display());
    Ok(path.to_path_buf())
}

/// Start ChimeraX on `script` without waiting for it to exit.
pub fn launch(chimerax: &str, script: &Path) -> Result<()> {
    tokio::process::Command::new(chimerax)
        .arg(script)
        .spawn()
        .with_context(|| format!("failed to start {chimerax}"))?;
    Ok(())
}
