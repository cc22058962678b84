//! Wrapping of SPOC output files into typed outputs.

use crate::model::{
    FscCurve, FscOutput, OutputArtifact, SourceRelation, VolumeInput, VolumeOutput,
};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Base name of the converted confidence-map input (`tmp/inputMap.mrc`).
pub const INPUT_MAP_BASE: &str = "inputMap";
pub const CONFIDENCE_MAP_SUFFIX: &str = "_confidenceMap.mrc";
pub const LOG10_FDR_SUFFIX: &str = "_-log10FDR.mrc";
pub const FILTERED_MAP_SUFFIX: &str = "_locFilt.mrc";
pub const FSC_FILE: &str = "FSC.txt";
pub const LOCAL_RESOLUTION_FILE: &str = "halfone_localResolutions.mrc";

#[derive(Debug, Error, PartialEq)]
pub enum FscParseError {
    #[error("line {line}: '{token}' is not a number")]
    NotANumber { line: usize, token: String },
    #[error("line {line}: expected {expected} values, found {found}")]
    RowLength {
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("no numeric rows")]
    Empty,
}

impl FscCurve {
    /// Parse SPOC's `FSC.txt`.
    ///
    /// The canonical layout is two whitespace separated columns (resolution,
    /// correlation), one row per shell. A file of exactly two rows with more
    /// than two values each is the transposed layout and is read row-wise.
    pub fn parse(text: &str) -> Result<Self, FscParseError> {
        let mut rows: Vec<Vec<f64>> = Vec::new();
        let mut width = None;
        for (i, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let row = line
                .split_whitespace()
                .map(|tok| {
                    tok.parse::<f64>().map_err(|_| FscParseError::NotANumber {
                        line: i + 1,
                        token: tok.to_string(),
                    })
                })
                .collect::<Result<Vec<f64>, _>>()?;
            let expected = *width.get_or_insert(row.len());
            if row.len() != expected {
                return Err(FscParseError::RowLength {
                    line: i + 1,
                    expected,
                    found: row.len(),
                });
            }
            rows.push(row);
        }

        match (rows.len(), width) {
            (0, _) | (_, None) => Err(FscParseError::Empty),
            (2, Some(w)) if w > 2 => {
                let correlation = rows.pop().unwrap_or_default();
                let resolution = rows.pop().unwrap_or_default();
                Ok(Self {
                    resolution,
                    correlation,
                })
            }
            (_, Some(2)) => {
                let (resolution, correlation) = rows.iter().map(|r| (r[0], r[1])).unzip();
                Ok(Self {
                    resolution,
                    correlation,
                })
            }
            (_, Some(w)) => Err(FscParseError::RowLength {
                line: 1,
                expected: 2,
                found: w,
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.resolution.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolution.is_empty()
    }

    /// Resolution in Å where the correlation first drops below `threshold`,
    /// linearly interpolated between the bracketing shells.
    pub fn resolution_at(&self, threshold: f64) -> Option<f64> {
        let pts: Vec<(f64, f64)> = self
            .resolution
            .iter()
            .copied()
            .zip(self.correlation.iter().copied())
            .collect();
        for w in pts.windows(2) {
            let ((f0, c0), (f1, c1)) = (w[0], w[1]);
            if c0 >= threshold && c1 < threshold {
                let t = if (c0 - c1).abs() > f64::EPSILON {
                    (c0 - threshold) / (c0 - c1)
                } else {
                    0.0
                };
                let freq = f0 + t * (f1 - f0);
                return (freq > 0.0).then(|| 1.0 / freq);
            }
        }
        None
    }
}

/// Read and parse an FSC curve file.
pub fn read_fsc_curve(path: &Path) -> Result<FscCurve> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read FSC curve {}", path.display()))?;
    FscCurve::parse(&text).with_context(|| format!("parse FSC curve {}", path.display()))
}

/// Outputs plus the provenance links recorded for them.
#[derive(Debug, Default)]
pub struct WrappedOutputs {
    pub outputs: Vec<OutputArtifact>,
    pub relations: Vec<SourceRelation>,
}

impl WrappedOutputs {
    fn push(&mut self, output: OutputArtifact, sources: &[&str]) {
        for s in sources {
            self.relations.push(SourceRelation {
                source: (*s).to_string(),
                output: output.name().to_string(),
            });
        }
        self.outputs.push(output);
    }
}

fn first_existing(candidates: &[PathBuf]) -> Option<&PathBuf> {
    candidates.iter().find(|p| p.is_file())
}

/// Wrap the maps written by `FDRcontrol.py` in `extra`.
pub fn wrap_confidence_map(
    extra: &Path,
    input: &VolumeInput,
    loc_res_filter: bool,
) -> Result<WrappedOutputs> {
    let sr = input.sampling_rate;
    let mut wrapped = WrappedOutputs::default();

    let conf = extra.join(format!("{INPUT_MAP_BASE}{CONFIDENCE_MAP_SUFFIX}"));
    wrapped.push(
        OutputArtifact::Volume(VolumeOutput::from_existing("confidenceMap", &conf, sr)?),
        &[input.name.as_str()],
    );

    let conf_stem = CONFIDENCE_MAP_SUFFIX.trim_end_matches(".mrc");
    let log10_candidates = [
        extra.join(format!("{INPUT_MAP_BASE}{conf_stem}{LOG10_FDR_SUFFIX}")),
        extra.join(format!("{INPUT_MAP_BASE}{LOG10_FDR_SUFFIX}")),
    ];
    let log10 = first_existing(&log10_candidates).unwrap_or(&log10_candidates[0]);
    wrapped.push(
        OutputArtifact::Volume(VolumeOutput::from_existing("confidenceMap_log10FDR", log10, sr)?),
        &[input.name.as_str()],
    );

    if loc_res_filter {
        let filt = extra.join(format!("{INPUT_MAP_BASE}{FILTERED_MAP_SUFFIX}"));
        wrapped.push(
            OutputArtifact::Volume(VolumeOutput::from_existing("localfiltMap", &filt, sr)?),
            &[input.name.as_str()],
        );
    }

    Ok(wrapped)
}

/// Wrap `FSC.txt` and, when requested, the local resolution map.
pub fn wrap_fsc_fdr(
    extra: &Path,
    half_one: &VolumeInput,
    half_two: &VolumeInput,
    local_res: bool,
) -> Result<WrappedOutputs> {
    let mut wrapped = WrappedOutputs::default();
    let sources = [half_one.name.as_str(), half_two.name.as_str()];

    let fsc_path = extra.join(FSC_FILE);
    if !fsc_path.is_file() {
        anyhow::bail!("output outputFSC: expected file {} does not exist", fsc_path.display());
    }
    let curve = read_fsc_curve(&fsc_path)?;
    wrapped.push(
        OutputArtifact::Fsc(FscOutput::from_existing("outputFSC", &fsc_path, curve)?),
        &sources,
    );

    if local_res {
        let path = extra.join(LOCAL_RESOLUTION_FILE);
        wrapped.push(
            OutputArtifact::Volume(VolumeOutput::from_existing(
                "localResolutionMap",
                &path,
                half_one.sampling_rate,
            )?),
            &sources,
        );
    }

    Ok(wrapped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(name: &str) -> VolumeInput {
        VolumeInput {
            name: name.into(),
            source: format!("/data/{name}.mrc").into(),
            converted: None,
            sampling_rate: 1.2,
        }
    }

    #[test]
    fn parses_two_columns() {
        let text = "0.0 1.0\n0.05 0.98\n0.1 0.7\n0.15 0.1\n";
        let curve = FscCurve::parse(text).unwrap();
        assert_eq!(curve.len(), 4);
        assert_eq!(curve.correlation.len(), 4);
        assert_eq!(curve.resolution[2], 0.1);
        assert_eq!(curve.correlation[3], 0.1);
    }

    #[test]
    fn parses_transposed_rows() {
        let text = "# freq\n0.0 0.1 0.2\n\n1.0 0.5 0.0\n";
        let curve = FscCurve::parse(text).unwrap();
        assert_eq!(curve.resolution, vec![0.0, 0.1, 0.2]);
        assert_eq!(curve.correlation, vec![1.0, 0.5, 0.0]);
    }

    #[test]
    fn rejects_malformed_files() {
        assert_eq!(FscCurve::parse(""), Err(FscParseError::Empty));
        assert!(matches!(
            FscCurve::parse("0.1 0.9\n0.2 abc\n"),
            Err(FscParseError::NotANumber { line: 2, .. })
        ));
        assert!(matches!(
            FscCurve::parse("0.1 0.9\n0.2\n"),
            Err(FscParseError::RowLength {
                line: 2,
                expected: 2,
                found: 1
            })
        ));
        assert!(FscCurve::parse("1 2 3\n4 5 6\n7 8 9\n").is_err());
    }

    #[test]
    fn threshold_crossing_is_interpolated() {
        let curve = FscCurve {
            resolution: vec![0.1, 0.2, 0.3],
            correlation: vec![1.0, 0.5, 0.0],
        };
        let res = curve.resolution_at(0.25).unwrap();
        assert!((res - 1.0 / 0.25).abs() < 1e-9);
        assert_eq!(curve.resolution_at(-0.5), None);
    }

    #[test]
    fn confidence_map_outputs_need_files() {
        let dir = tempfile::tempdir().unwrap();
        let extra = dir.path();
        assert!(wrap_confidence_map(extra, &input("inputMap"), false).is_err());

        std::fs::write(extra.join("inputMap_confidenceMap.mrc"), b"c").unwrap();
        std::fs::write(extra.join("inputMap_-log10FDR.mrc"), b"l").unwrap();
        let wrapped = wrap_confidence_map(extra, &input("inputMap"), false).unwrap();
        assert_eq!(wrapped.outputs.len(), 2);
        assert_eq!(
            wrapped.outputs[1].path(),
            extra.join("inputMap_-log10FDR.mrc").as_path()
        );
        assert!(wrapped.relations.iter().all(|r| r.source == "inputMap"));

        // Filtering requested but no filtered map written.
        assert!(wrap_confidence_map(extra, &input("inputMap"), true).is_err());
        std::fs::write(extra.join("inputMap_locFilt.mrc"), b"f").unwrap();
        let wrapped = wrap_confidence_map(extra, &input("inputMap"), true).unwrap();
        assert_eq!(wrapped.outputs[2].name(), "localfiltMap");
    }

    #[test]
    fn log10_map_prefers_confidence_map_stem() {
        let dir = tempfile::tempdir().unwrap();
        let extra = dir.path();
        std::fs::write(extra.join("inputMap_confidenceMap.mrc"), b"c").unwrap();
        std::fs::write(extra.join("inputMap_confidenceMap_-log10FDR.mrc"), b"l").unwrap();
        let wrapped = wrap_confidence_map(extra, &input("inputMap"), false).unwrap();
        assert_eq!(
            wrapped.outputs[1].path(),
            extra.join("inputMap_confidenceMap_-log10FDR.mrc").as_path()
        );
    }

    #[test]
    fn fsc_outputs_relate_to_both_halves() {
        let dir = tempfile::tempdir().unwrap();
        let extra = dir.path();
        std::fs::write(extra.join(FSC_FILE), "0.0 1.0\n0.5 0.0\n").unwrap();
        let wrapped = wrap_fsc_fdr(extra, &input("halfOne"), &input("halfTwo"), false).unwrap();
        assert_eq!(wrapped.outputs.len(), 1);
        let sources: Vec<&str> = wrapped.relations.iter().map(|r| r.source.as_str()).collect();
        assert_eq!(sources, vec!["halfOne", "halfTwo"]);

        assert!(wrap_fsc_fdr(extra, &input("halfOne"), &input("halfTwo"), true).is_err());
    }
}
