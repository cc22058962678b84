//! Extraction of the resolution SPOC reports on stdout.
//!
//! SPOC prints no structured result, only a line such as
//! `Resolution at 1 % FDR-FSC: 2.0 Angstrom`. The value is pulled out once,
//! right after the run, and stored in the run record.

use anyhow::{Context, Result};
use std::path::Path;

pub const FDR_FSC_MARKER: &str = "Resolution at 1 % FDR-FSC";

/// First float after the marker on the last matching line, if any.
pub fn extract_fdr_fsc_resolution(text: &str) -> Option<f64> {
    text.lines()
        .filter_map(|line| {
            let (_, rest) = line.split_once(FDR_FSC_MARKER)?;
            rest.split_whitespace()
                .map(|tok| tok.trim_matches(|c: char| c == ':' || c == ','))
                .find_map(|tok| tok.parse::<f64>().ok().filter(|v| v.is_finite()))
        })
        .last()
}

/// Scan a captured log file. A missing file is an error; a missing marker is `None`.
pub fn scan_log(path: &Path) -> Result<Option<f64>> {
    let bytes = std::fs::read(path).with_context(|| format!("read log {}", path.display()))?;
    Ok(extract_fdr_fsc_resolution(&String::from_utf8_lossy(&bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_reported_resolution() {
        let log = "Calculating FSC ...\nResolution at 1 % FDR-FSC: 2.0 Angstrom\nDone.\n";
        assert_eq!(extract_fdr_fsc_resolution(log), Some(2.0));
    }

    #[test]
    fn missing_marker_is_none() {
        assert_eq!(extract_fdr_fsc_resolution("Resolution at 0.143: 3.1\n"), None);
        assert_eq!(extract_fdr_fsc_resolution(""), None);
    }

    #[test]
    fn last_report_wins() {
        let log = "Resolution at 1 % FDR-FSC: 4.5 Angstrom\nResolution at 1 % FDR-FSC: 3.25 Angstrom\n";
        assert_eq!(extract_fdr_fsc_resolution(log), Some(3.25));
    }

    #[test]
    fn marker_without_number_is_skipped() {
        let log = "Resolution at 1 % FDR-FSC: 2.8 Angstrom\nResolution at 1 % FDR-FSC: undetermined\n";
        assert_eq!(extract_fdr_fsc_resolution(log), Some(2.8));
    }

    #[test]
    fn non_finite_values_are_not_resolutions() {
        assert_eq!(extract_fdr_fsc_resolution("Resolution at 1 % FDR-FSC: nan Angstrom\n"), None);
        let log = "Resolution at 1 % FDR-FSC: 3.1 Angstrom\nResolution at 1 % FDR-FSC: inf\n";
        assert_eq!(extract_fdr_fsc_resolution(log), Some(3.1));
    }

    #[test]
    fn scan_log_tolerates_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("run.stdout");
        std::fs::write(&log, b"\xc5 noise\nResolution at 1 % FDR-FSC: 2.5 Angstrom\n").unwrap();
        assert_eq!(scan_log(&log).unwrap(), Some(2.5));
    }

    #[test]
    fn scan_log_requires_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(scan_log(&dir.path().join("run.stdout")).is_err());
        std::fs::write(dir.path().join("run.stdout"), "Resolution at 1 % FDR-FSC: 2.0 Angstrom\n")
            .unwrap();
        assert_eq!(scan_log(&dir.path().join("run.stdout")).unwrap(), Some(2.0));
    }
}
