//! Post-run processing utilities.
//!
//! Handles saving `run.json` and the optional JSON/CSV exports after a run completes.

use crate::model::RunRecord;
use crate::storage;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Export targets requested on the command line.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Exports<'a> {
    pub json: Option<&'a Path>,
    pub csv: Option<&'a Path>,
}

/// Result of post-run processing, ready for presentation layers.
pub(crate) struct ProcessedRun {
    pub saved_path: PathBuf,
    pub export_messages: Vec<String>,
}

/// Process a completed run: save the record, then export.
///
/// A failed save is an error; failed exports are reported as messages so the
/// record on disk stays the source of truth.
pub(crate) fn process_run_completion(
    record: &RunRecord,
    exports: Exports<'_>,
) -> Result<ProcessedRun> {
    let saved_path = storage::save_run(record).context("failed to save run record")?;

    let mut export_messages = Vec::new();
    if let Some(export_path) = exports.json {
        match storage::export_json(export_path, record) {
            Ok(_) => export_messages.push(format!("Exported JSON: {}", export_path.display())),
            Err(e) => export_messages.push(format!("Export JSON failed: {e:#}")),
        }
    }
    if let Some(export_path) = exports.csv {
        match record.fsc() {
            Some(fsc) => match storage::export_fsc_csv(export_path, fsc.curve()) {
                Ok(_) => export_messages.push(format!("Exported CSV: {}", export_path.display())),
                Err(e) => export_messages.push(format!("Export CSV failed: {e:#}")),
            },
            None => export_messages.push("Export CSV skipped: run has no FSC curve".into()),
        }
    }

    Ok(ProcessedRun {
        saved_path,
        export_messages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CommandLine, ConfidenceMapParams, ProtocolKind, ProtocolParams};
    use std::time::Duration;

    fn record(dir: &Path) -> RunRecord {
        RunRecord {
            run_id: "42".into(),
            timestamp_utc: "2026-01-01T00:00:00Z".into(),
            protocol: ProtocolKind::ConfidenceMap,
            params: ProtocolParams::ConfidenceMap(ConfidenceMapParams {
                input_map: "map.mrc".into(),
                sampling_rate: Some(1.0),
                x_center: None,
                y_center: None,
                z_center: None,
                box_size: None,
                loc_res_filter: false,
                res_map: None,
            }),
            run_dir: dir.to_path_buf(),
            command: CommandLine {
                executable: "python".into(),
                script: "FDRcontrol.py".into(),
                args: vec![],
            },
            elapsed: Duration::from_secs(3),
            inputs: vec![],
            outputs: vec![],
            relations: vec![],
            fdr_fsc_resolution: None,
            summary: vec!["Confidence map estimated".into()],
            methods: vec![],
        }
    }

    #[test]
    fn saves_record_and_exports_json() {
        let dir = tempfile::tempdir().unwrap();
        let export = dir.path().join("out/copy.json");
        let processed = process_run_completion(
            &record(dir.path()),
            Exports {
                json: Some(&export),
                csv: None,
            },
        )
        .unwrap();
        assert!(processed.saved_path.is_file());
        assert!(export.is_file());
        assert_eq!(processed.export_messages.len(), 1);
        assert!(processed.export_messages[0].starts_with("Exported JSON"));
    }

    #[test]
    fn csv_export_without_curve_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("fsc.csv");
        let processed = process_run_completion(
            &record(dir.path()),
            Exports {
                json: None,
                csv: Some(&csv),
            },
        )
        .unwrap();
        assert!(!csv.exists());
        assert!(processed.export_messages[0].contains("no FSC curve"));
    }
}
