//! Viewers over a finished run.
//!
//! Each viewer reads the run record, never the SPOC logs, and either writes
//! files (PNG slices, ChimeraX scripts) or returns data for the terminal.

pub mod chimera;
pub mod colormap;
pub mod fsc;
pub mod histogram;
pub mod slices;

use crate::model::{ProtocolKind, RunRecord, VolumeOutput};
use crate::volume::{Axis, Volume};
use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use colormap::Colormap;
use log::info;
use std::path::{Path, PathBuf};

pub const VIEWS_DIR: &str = "views";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Viewer {
    /// Central slices of the confidence and -log10(FDR) maps
    Slices,
    /// Central slice of the original input map
    OriginalSlices,
    /// Histogram of confidence values above 0.1
    Histogram,
    /// 2x2 colored slices around the centre
    ColorSlices,
    /// One colored slice (--slice-number)
    Slice,
    /// ChimeraX script coloring the map or a structure by confidence
    Chimera,
    /// FSC curve with the 0.143 threshold
    Fsc,
    /// ChimeraX script coloring half map one by local resolution
    LocalRes,
}

impl Viewer {
    pub fn protocol(self) -> ProtocolKind {
        match self {
            Viewer::Fsc | Viewer::LocalRes => ProtocolKind::FscFdrControl,
            _ => ProtocolKind::ConfidenceMap,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ViewOptions {
    pub axis: Axis,
    pub colormap: String,
    pub lowest: f32,
    pub highest: f32,
    pub slice_number: i64,
    pub structure: Option<PathBuf>,
    pub launch: bool,
    pub chimerax: String,
    /// Output directory for PNGs, or the script path for ChimeraX viewers.
    pub out: Option<PathBuf>,
}

/// What a viewer produced.
#[derive(Debug)]
pub enum Rendered {
    Files(Vec<PathBuf>),
    Histogram {
        hist: histogram::Histogram,
        metrics: Option<(f64, f64, f64, f64)>,
    },
    Fsc(fsc::FscView),
}

impl Rendered {
    pub fn lines(&self) -> Vec<String> {
        match self {
            Rendered::Files(paths) => paths
                .iter()
                .map(|p| format!("Wrote {}", p.display()))
                .collect(),
            Rendered::Histogram { hist, metrics } => {
                let mut lines = vec![format!(
                    "Confidence histogram ({} voxels above {})",
                    hist.total(),
                    histogram::CONFIDENCE_FLOOR
                )];
                lines.extend(hist.lines());
                if let Some((mean, median, p25, p75)) = metrics {
                    lines.push(format!(
                        "avg {mean:.3} med {median:.3} p25 {p25:.3} p75 {p75:.3}"
                    ));
                }
                lines
            }
            Rendered::Fsc(view) => view.lines(),
        }
    }
}

fn volume_output<'a>(record: &'a RunRecord, name: &str) -> Result<&'a VolumeOutput> {
    record
        .volume(name)
        .with_context(|| format!("run {} has no output {name}", record.run_id))
}

fn read_volume(path: &Path) -> Result<Volume> {
    Volume::read_mrc(path).with_context(|| format!("read {}", path.display()))
}

fn png_dir(record: &RunRecord, opts: &ViewOptions) -> Result<PathBuf> {
    let dir = opts
        .out
        .clone()
        .unwrap_or_else(|| record.run_dir.join(VIEWS_DIR));
    std::fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

fn absolute(path: &Path) -> Result<PathBuf> {
    path.canonicalize()
        .with_context(|| format!("resolve {}", path.display()))
}

/// Run `viewer` against `record`.
pub fn render(record: &RunRecord, viewer: Viewer, opts: &ViewOptions) -> Result<Rendered> {
    if viewer.protocol() != record.protocol {
        bail!(
            "viewer {:?} needs a {} run, but {} is a {} run",
            viewer,
            viewer.protocol(),
            record.run_id,
            record.protocol
        );
    }
    let cmap = Colormap::by_name(&opts.colormap).with_context(|| {
        format!(
            "unknown colormap {}; available: {}",
            opts.colormap,
            Colormap::names().collect::<Vec<_>>().join(", ")
        )
    })?;
    let range = (opts.lowest, opts.highest);
    info!("{viewer:?} viewer on {}", record.run_dir.display());

    match viewer {
        Viewer::Slices => {
            let dir = png_dir(record, opts)?;
            let mut files = Vec::new();
            for name in ["confidenceMap", "confidenceMap_log10FDR"] {
                let vol = read_volume(volume_output(record, name)?.path())?;
                files.push(slices::save_gray_slice(&vol, name, opts.axis, &dir)?);
            }
            Ok(Rendered::Files(files))
        }
        Viewer::OriginalSlices => {
            let input = record
                .input("inputMap")
                .context("run has no input map")?;
            let vol = read_volume(&input.source)?;
            let dir = png_dir(record, opts)?;
            Ok(Rendered::Files(vec![slices::save_gray_slice(
                &vol, "inputMap", opts.axis, &dir,
            )?]))
        }
        Viewer::Histogram => {
            let vol = read_volume(volume_output(record, "confidenceMap")?.path())?;
            let (hist, metrics) = histogram::confidence_histogram(&vol)
                .context("confidence map has no voxels above 0.1")?;
            Ok(Rendered::Histogram { hist, metrics })
        }
        Viewer::ColorSlices => {
            let vol = read_volume(volume_output(record, "confidenceMap")?.path())?;
            let dir = png_dir(record, opts)?;
            Ok(Rendered::Files(vec![slices::save_color_montage(
                &vol,
                "confidenceMap",
                opts.axis,
                &cmap,
                range,
                &dir,
            )?]))
        }
        Viewer::Slice => {
            let vol = read_volume(volume_output(record, "confidenceMap")?.path())?;
            let dir = png_dir(record, opts)?;
            Ok(Rendered::Files(vec![slices::save_color_slice(
                &vol,
                "confidenceMap",
                opts.axis,
                opts.slice_number,
                &cmap,
                range,
                &dir,
            )?]))
        }
        Viewer::Chimera => {
            let confidence = volume_output(record, "confidenceMap")?;
            let input = record
                .input("inputMap")
                .context("run has no input map")?;
            let vol = read_volume(confidence.path())?;
            let placement = chimera::Placement {
                dims: vol.dims(),
                sampling_rate: input.sampling_rate,
            };
            let structure = opts.structure.as_deref().map(absolute).transpose()?;
            let script = chimera::confidence_map_script(
                &absolute(confidence.path())?,
                &absolute(&input.source)?,
                structure.as_deref(),
                placement,
                &cmap,
            );
            let path = opts
                .out
                .clone()
                .unwrap_or_else(|| record.run_dir.join("extra").join(chimera::CONFIDENCE_SCRIPT));
            finish_script(&path, &script, opts)
        }
        Viewer::Fsc => {
            let out = record.fsc().context("run has no FSC curve")?;
            Ok(Rendered::Fsc(fsc::FscView::new(
                out.curve().clone(),
                record.fdr_fsc_resolution,
            )))
        }
        Viewer::LocalRes => {
            let local = volume_output(record, "localResolutionMap")
                .context("rerun fsc-fdr with --local-res")?;
            let half = record.input("halfOne").context("run has no half map one")?;
            let half_path = half.converted.as_deref().unwrap_or(&half.source);
            let script = chimera::local_resolution_script(
                &absolute(half_path)?,
                &absolute(local.path())?,
                half.sampling_rate,
            );
            let path = opts
                .out
                .clone()
                .unwrap_or_else(|| record.run_dir.join(chimera::LOCAL_RES_SCRIPT));
            finish_script(&path, &script, opts)
        }
    }
}

fn finish_script(path: &Path, script: &str, opts: &ViewOptions) -> Result<Rendered> {
    let path = chimera::write_script(path, script)?;
    if opts.launch {
        chimera::launch(&opts.chimerax, &path)?;
    }
    Ok(Rendered::Files(vec![path]))
}
