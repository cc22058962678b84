//! SPOC installation: location, versions and program commands.

mod install;

pub use install::install;

use crate::model::{CommandLine, ProtocolKind};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub const SPOC_HOME_VAR: &str = "SPOC_HOME";

/// Stable release.
pub const V1_0: &str = "1.0";

// Continuous-build version: '<stable version>_<yymmdd of the pinned commit>'.
// Bump COMMIT and V_CB together after testing a newer SPOC revision.
pub const COMMIT: &str = "55b4f82";
pub const V_CB: &str = "1.0_220105";

pub const SUPPORTED_VERSIONS: &[&str] = &[V1_0, V_CB];

/// Directory the SPOC archive is unpacked into, below the home.
pub const SOURCE_DIR: &str = "spoc-source";

pub const REPOSITORY_URL: &str = "https://github.com/MaximilianBeckers/SPOC";
pub const PLUGIN_URL: &str = "https://github.com/scipion-em/scipion-em-spoc";

pub const REFERENCE_KEY: &str = "Beckers2019";
pub const REFERENCE_BIBTEX: &str = r#"@article{Beckers2019,
title = "Thresholding of cryo-EM density maps by false discovery rate control",
journal = "IUCr Journal 6",
volume = "6",
number = "1",
pages = "18 - 33",
year = "2019",
note = "Software tools for macromolecular microscopy ",
issn = "2052-2525",
doi = "https://doi.org/10.1107/S2052252518014434",
url = "https://journals.iucr.org/m/issues/2019/01/00/pw5002/",
author = "Maximilian Beckers and Arjen J. Jakobia and Carsten Sachsea",
keywords = "electron cryo-microscopy; signal detection, false discovery rate, cryo-EM density, subtomogram averaging, local resolution, ligand binding"}"#;

#[derive(Debug, Clone)]
pub struct Plugin {
    home: PathBuf,
    python: String,
}

impl Plugin {
    /// `home` falls back to `<data dir>/spoc-cli/spoc-<V_CB>`.
    pub fn new(home: Option<PathBuf>, python: impl Into<String>) -> Result<Self> {
        let home = match home {
            Some(h) => h,
            None => dirs::data_dir()
                .context("no data directory available; set SPOC_HOME")?
                .join("spoc-cli")
                .join(format!("spoc-{V_CB}")),
        };
        Ok(Self {
            home,
            python: python.into(),
        })
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn python(&self) -> &str {
        &self.python
    }

    pub fn source_dir(&self) -> PathBuf {
        self.home.join(SOURCE_DIR)
    }

    /// Version encoded in the home directory name (`spoc-<version>`), if supported.
    pub fn active_version(&self) -> Option<&'static str> {
        active_version_of(&self.home, SUPPORTED_VERSIONS)
    }

    pub fn script(&self, kind: ProtocolKind) -> PathBuf {
        self.source_dir().join(kind.program())
    }

    /// Command for `kind` with the given arguments.
    pub fn command(&self, kind: ProtocolKind, args: Vec<String>) -> CommandLine {
        CommandLine {
            executable: self.python.clone(),
            script: self.script(kind),
            args,
        }
    }

    pub fn archive_url() -> String {
        format!("{REPOSITORY_URL}/archive/{COMMIT}.tar.gz")
    }
}

fn active_version_of(home: &Path, versions: &[&'static str]) -> Option<&'static str> {
    let name = home.file_name()?.to_str()?;
    let current = name.rsplit('-').next()?;
    versions.iter().copied().find(|v| *v == current)
}
