//! Run directory layout, run record persistence and exports.

use crate::model::{FscCurve, ProtocolKind, RunRecord};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub const RECORD_FILE: &str = "run.json";

/// Paths inside a run directory.
#[derive(Debug, Clone)]
pub struct RunPaths {
    root: PathBuf,
}

impl RunPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Working directory of the external program; outputs land here.
    pub fn extra(&self) -> PathBuf {
        self.root.join("extra")
    }

    pub fn tmp(&self) -> PathBuf {
        self.root.join("tmp")
    }

    pub fn logs(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn stdout_log(&self) -> PathBuf {
        self.logs().join("run.stdout")
    }

    pub fn stderr_log(&self) -> PathBuf {
        self.logs().join("run.stderr")
    }

    pub fn record(&self) -> PathBuf {
        self.root.join(RECORD_FILE)
    }

    pub fn create_all(&self) -> Result<()> {
        for dir in [self.extra(), self.tmp(), self.logs()] {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("create run directory {}", dir.display()))?;
        }
        Ok(())
    }
}

/// Default run directory: `spoc-runs/<protocol>-<utc timestamp>-<id>`.
pub fn default_run_dir(base: &Path, kind: ProtocolKind, run_id: &str) -> PathBuf {
    let stamp = time::OffsetDateTime::now_utc()
        .format(time::macros::format_description!(
            "[year][month][day]-[hour][minute][second]"
        ))
        .unwrap_or_else(|_| "now".into());
    base.join(format!("{}-{}-{}", kind.slug(), stamp, run_id))
}

/// Persist the record as `run.json` in its run directory.
pub fn save_run(record: &RunRecord) -> Result<PathBuf> {
    let path = RunPaths::new(&record.run_dir).record();
    export_json(&path, record)?;
    Ok(path)
}

/// Load a record from a run directory or directly from a `run.json` path.
pub fn load_run(path: &Path) -> Result<RunRecord> {
    let file = if path.is_dir() {
        RunPaths::new(path).record()
    } else {
        path.to_path_buf()
    };
    let data = std::fs::read_to_string(&file)
        .with_context(|| format!("read run record {}", file.display()))?;
    serde_json::from_str(&data).with_context(|| format!("parse run record {}", file.display()))
}

pub fn export_json(path: &Path, record: &RunRecord) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let data = serde_json::to_string_pretty(record)?;
    std::fs::write(path, data).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// Write an FSC curve as CSV with a `resolution,correlation` header.
pub fn export_fsc_csv(path: &Path, curve: &FscCurve) -> Result<()> {
    let mut w = csv::Writer::from_path(path).with_context(|| format!("create {}", path.display()))?;
    w.write_record(["resolution", "correlation"])?;
    for (r, c) in curve.resolution.iter().zip(&curve.correlation) {
        w.write_record([r.to_string(), c.to_string()])?;
    }
    w.flush().with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CommandLine, FscFdrParams, ProtocolParams};
    use std::time::Duration;

    fn record(dir: &Path) -> RunRecord {
        RunRecord {
            run_id: "abc".into(),
            timestamp_utc: "2026-01-01T00:00:00Z".into(),
            protocol: ProtocolKind::FscFdrControl,
            params: ProtocolParams::FscFdrControl(FscFdrParams::default()),
            run_dir: dir.to_path_buf(),
            command: CommandLine {
                executable: "python".into(),
                script: "FSC_FDRcontrol.py".into(),
                args: vec![],
            },
            elapsed: Duration::from_millis(1500),
            inputs: vec![],
            outputs: vec![],
            relations: vec![],
            fdr_fsc_resolution: Some(2.0),
            summary: vec![],
            methods: vec![],
        }
    }

    #[test]
    fn save_and_load_run_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_run(&record(dir.path())).unwrap();
        assert_eq!(path, dir.path().join(RECORD_FILE));

        let from_dir = load_run(dir.path()).unwrap();
        assert_eq!(from_dir.fdr_fsc_resolution, Some(2.0));
        assert_eq!(from_dir.elapsed, Duration::from_millis(1500));
        let from_file = load_run(&path).unwrap();
        assert_eq!(from_file.run_id, "abc");
    }

    #[test]
    fn fsc_csv_has_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fsc.csv");
        let curve = FscCurve {
            resolution: vec![0.0, 0.25],
            correlation: vec![1.0, 0.5],
        };
        export_fsc_csv(&path, &curve).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "resolution,correlation\n0,1\n0.25,0.5\n");
    }

    #[test]
    fn run_paths_layout() {
        let p = RunPaths::new("/runs/r1");
        assert_eq!(p.stdout_log(), PathBuf::from("/runs/r1/logs/run.stdout"));
        assert_eq!(p.extra(), PathBuf::from("/runs/r1/extra"));
    }
}
