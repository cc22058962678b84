use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The two SPOC protocols this tool can launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolKind {
    ConfidenceMap,
    FscFdrControl,
}

impl ProtocolKind {
    pub fn label(self) -> &'static str {
        match self {
            ProtocolKind::ConfidenceMap => "confidence maps",
            ProtocolKind::FscFdrControl => "FSC-FDR control",
        }
    }

    /// Script name inside the SPOC source tree.
    pub fn program(self) -> &'static str {
        match self {
            ProtocolKind::ConfidenceMap => "FDRcontrol.py",
            ProtocolKind::FscFdrControl => "FSC_FDRcontrol.py",
        }
    }

    /// Short name used for run directory prefixes.
    pub fn slug(self) -> &'static str {
        match self {
            ProtocolKind::ConfidenceMap => "confidence-map",
            ProtocolKind::FscFdrControl => "fsc-fdr",
        }
    }
}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfidenceMapParams {
    pub input_map: PathBuf,
    /// Overrides the voxel size stored in the input header.
    #[serde(default)]
    pub sampling_rate: Option<f64>,
    #[serde(default)]
    pub x_center: Option<f64>,
    #[serde(default)]
    pub y_center: Option<f64>,
    #[serde(default)]
    pub z_center: Option<f64>,
    /// Size of the noise estimation box.
    #[serde(default)]
    pub box_size: Option<f64>,
    pub loc_res_filter: bool,
    #[serde(default)]
    pub res_map: Option<PathBuf>,
}

impl ConfidenceMapParams {
    /// Noise box centre, only when all three coordinates are given.
    pub fn noise_box_center(&self) -> Option<(f64, f64, f64)> {
        match (self.x_center, self.y_center, self.z_center) {
            (Some(x), Some(y), Some(z)) => Some((x, y, z)),
            _ => None,
        }
    }
}

/// Parameters of the FSC-FDR control protocol.
///
/// Numeric options are `None` when unset. Negative values are treated as
/// unset as well, matching the `-1` convention of the command line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FscFdrParams {
    pub half_one: PathBuf,
    pub half_two: PathBuf,
    #[serde(default)]
    pub sampling_rate: Option<f64>,
    pub local_res: bool,
    #[serde(default)]
    pub low_res: Option<f64>,
    #[serde(default)]
    pub step_size: Option<i64>,
    pub sym: String,
    #[serde(default)]
    pub num_asym_units: Option<i64>,
    #[serde(default)]
    pub bfactor: Option<f64>,
    #[serde(default)]
    pub mask: Option<PathBuf>,
}

impl Default for FscFdrParams {
    fn default() -> Self {
        Self {
            half_one: PathBuf::new(),
            half_two: PathBuf::new(),
            sampling_rate: None,
            local_res: false,
            low_res: None,
            step_size: None,
            sym: "c1".into(),
            num_asym_units: None,
            bfactor: None,
            mask: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "protocol", rename_all = "snake_case")]
pub enum ProtocolParams {
    ConfidenceMap(ConfidenceMapParams),
    FscFdrControl(FscFdrParams),
}

impl ProtocolParams {
    pub fn kind(&self) -> ProtocolKind {
        match self {
            ProtocolParams::ConfidenceMap(_) => ProtocolKind::ConfidenceMap,
            ProtocolParams::FscFdrControl(_) => ProtocolKind::FscFdrControl,
        }
    }
}

/// A fully resolved external invocation: interpreter, script, arguments.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandLine {
    pub executable: String,
    pub script: PathBuf,
    pub args: Vec<String>,
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.executable, self.script.display())?;
        for a in &self.args {
            write!(f, " {a}")?;
        }
        Ok(())
    }
}

/// Stages of a protocol run, always executed in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    ConvertInput,
    Compute,
    CreateOutput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stream {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum JobEvent {
    PhaseStarted { phase: Phase },
    Output { stream: Stream, line: String },
    Info(String),
}

/// An input volume as it was handed to the external program.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VolumeInput {
    pub name: String,
    pub source: PathBuf,
    /// Converted copy inside the run directory, when one was made.
    #[serde(default)]
    pub converted: Option<PathBuf>,
    pub sampling_rate: f64,
}

/// A volume written by the external program.
///
/// Only constructible through [`VolumeOutput::from_existing`], so a value in
/// memory always referred to a file present at construction time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VolumeOutput {
    name: String,
    path: PathBuf,
    sampling_rate: f64,
}

impl VolumeOutput {
    pub fn from_existing(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        sampling_rate: f64,
    ) -> anyhow::Result<Self> {
        let path = path.into();
        let name = name.into();
        if !path.is_file() {
            anyhow::bail!("output {name}: expected file {} does not exist", path.display());
        }
        Ok(Self {
            name,
            path,
            sampling_rate,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sampling_rate(&self) -> f64 {
        self.sampling_rate
    }
}

/// Resolution-vs-correlation curve.
///
/// `resolution` is the spatial frequency axis in 1/Å, as SPOC writes it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct FscCurve {
    pub resolution: Vec<f64>,
    pub correlation: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FscOutput {
    name: String,
    path: PathBuf,
    curve: FscCurve,
}

impl FscOutput {
    pub fn from_existing(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        curve: FscCurve,
    ) -> anyhow::Result<Self> {
        let path = path.into();
        let name = name.into();
        if !path.is_file() {
            anyhow::bail!("output {name}: expected file {} does not exist", path.display());
        }
        Ok(Self { name, path, curve })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn curve(&self) -> &FscCurve {
        &self.curve
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputArtifact {
    Volume(VolumeOutput),
    Fsc(FscOutput),
}

impl OutputArtifact {
    pub fn name(&self) -> &str {
        match self {
            OutputArtifact::Volume(v) => v.name(),
            OutputArtifact::Fsc(f) => f.name(),
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            OutputArtifact::Volume(v) => v.path(),
            OutputArtifact::Fsc(f) => f.path(),
        }
    }
}

/// Provenance link: `source` input produced `output`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceRelation {
    pub source: String,
    pub output: String,
}

/// Everything known about one protocol invocation; persisted as `run.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    #[serde(default)]
    pub timestamp_utc: String,
    pub protocol: ProtocolKind,
    pub params: ProtocolParams,
    pub run_dir: PathBuf,
    pub command: CommandLine,
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
    pub inputs: Vec<VolumeInput>,
    pub outputs: Vec<OutputArtifact>,
    pub relations: Vec<SourceRelation>,
    /// Reported by SPOC on stdout as "Resolution at 1 % FDR-FSC".
    #[serde(default)]
    pub fdr_fsc_resolution: Option<f64>,
    #[serde(default)]
    pub summary: Vec<String>,
    #[serde(default)]
    pub methods: Vec<String>,
}

impl RunRecord {
    pub fn output(&self, name: &str) -> Option<&OutputArtifact> {
        self.outputs.iter().find(|o| o.name() == name)
    }

    pub fn volume(&self, name: &str) -> Option<&VolumeOutput> {
        match self.output(name) {
            Some(OutputArtifact::Volume(v)) => Some(v),
            _ => None,
        }
    }

    pub fn fsc(&self) -> Option<&FscOutput> {
        self.outputs.iter().find_map(|o| match o {
            OutputArtifact::Fsc(f) => Some(f),
            _ => None,
        })
    }

    pub fn input(&self, name: &str) -> Option<&VolumeInput> {
        self.inputs.iter().find(|i| i.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_output_requires_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("inputMap_confidenceMap.mrc");
        assert!(VolumeOutput::from_existing("confidenceMap", &missing, 1.0).is_err());

        std::fs::write(&missing, b"x").unwrap();
        let out = VolumeOutput::from_existing("confidenceMap", &missing, 1.5).unwrap();
        assert_eq!(out.name(), "confidenceMap");
        assert_eq!(out.sampling_rate(), 1.5);
    }

    #[test]
    fn noise_box_center_needs_all_coordinates() {
        let mut p = ConfidenceMapParams {
            input_map: "map.mrc".into(),
            sampling_rate: None,
            x_center: Some(10.0),
            y_center: Some(20.0),
            z_center: None,
            box_size: Some(30.0),
            loc_res_filter: false,
            res_map: None,
        };
        assert_eq!(p.noise_box_center(), None);
        p.z_center = Some(5.0);
        assert_eq!(p.noise_box_center(), Some((10.0, 20.0, 5.0)));
    }

    #[test]
    fn command_line_display_joins_arguments() {
        let cmd = CommandLine {
            executable: "python".into(),
            script: "/opt/spoc/FSC_FDRcontrol.py".into(),
            args: vec!["--apix".into(), "1.000000".into()],
        };
        assert_eq!(cmd.to_string(), "python /opt/spoc/FSC_FDRcontrol.py --apix 1.000000");
    }
}
