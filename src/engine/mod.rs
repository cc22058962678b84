pub mod args;
mod convert;
pub mod job;
pub mod outputs;
mod preflight;
pub mod resolution;

use crate::model::{
    JobEvent, Phase, ProtocolKind, ProtocolParams, RunRecord, VolumeInput,
};
use crate::plugin::Plugin;
use crate::storage::RunPaths;
use anyhow::{bail, Context, Result};
use log::info;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::sync::mpsc;

pub use preflight::validate;

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub run_id: String,
    pub run_dir: PathBuf,
    pub params: ProtocolParams,
    pub plugin: Plugin,
    /// Require the SPOC script to exist before launching.
    pub check_script: bool,
}

pub struct ProtocolEngine {
    cfg: RunConfig,
}

fn absolute(path: &Path) -> Result<PathBuf> {
    path.canonicalize()
        .with_context(|| format!("resolve {}", path.display()))
}

async fn convert_blocking(
    name: &'static str,
    source: PathBuf,
    dest: PathBuf,
    rate: Option<f64>,
) -> Result<VolumeInput> {
    let source = absolute(&source)?;
    tokio::task::spawn_blocking(move || convert::convert_input(name, &source, &dest, rate))
        .await
        .context("conversion task failed")?
}

/// Outcome of the compute and output stages, before the record is assembled.
struct StageResult {
    command: crate::model::CommandLine,
    inputs: Vec<VolumeInput>,
    wrapped: outputs::WrappedOutputs,
    fdr_fsc_resolution: Option<f64>,
}

impl ProtocolEngine {
    pub fn new(cfg: RunConfig) -> Self {
        Self { cfg }
    }

    /// Run the three stages (convert input, compute, create output) in order.
    pub async fn run(self, event_tx: mpsc::UnboundedSender<JobEvent>) -> Result<RunRecord> {
        let errors = validate(&self.cfg.params, &self.cfg.plugin, self.cfg.check_script);
        if !errors.is_empty() {
            bail!("invalid parameters:\n  {}", errors.join("\n  "));
        }

        RunPaths::new(&self.cfg.run_dir).create_all()?;
        // Records stay valid when read from another working directory.
        let paths = RunPaths::new(absolute(&self.cfg.run_dir)?);
        let kind = self.cfg.params.kind();
        info!("{} run {} in {}", kind, self.cfg.run_id, paths.root().display());

        let timestamp_utc = time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| "now".into());
        let start = Instant::now();

        let stage = match &self.cfg.params {
            ProtocolParams::ConfidenceMap(p) => {
                let _ = event_tx.send(JobEvent::PhaseStarted {
                    phase: Phase::ConvertInput,
                });
                let dest = paths
                    .tmp()
                    .join(format!("{}.mrc", outputs::INPUT_MAP_BASE));
                let input = convert_blocking(
                    "inputMap",
                    p.input_map.clone(),
                    dest.clone(),
                    p.sampling_rate,
                )
                .await?;
                let res_map = match (&p.res_map, p.loc_res_filter) {
                    (Some(m), true) => Some(absolute(m)?),
                    _ => None,
                };

                let args = args::confidence_map_args(
                    p,
                    &absolute(&dest)?,
                    input.sampling_rate,
                    res_map.as_deref(),
                );
                let command = self.compute(kind, args, &paths, &event_tx).await?;

                let _ = event_tx.send(JobEvent::PhaseStarted {
                    phase: Phase::CreateOutput,
                });
                let wrapped =
                    outputs::wrap_confidence_map(&paths.extra(), &input, p.loc_res_filter)?;
                let mut inputs = vec![input];
                if let Some(m) = res_map {
                    inputs.push(convert::reference_input("resMap", &m)?);
                }
                StageResult {
                    command,
                    inputs,
                    wrapped,
                    fdr_fsc_resolution: None,
                }
            }
            ProtocolParams::FscFdrControl(p) => {
                let _ = event_tx.send(JobEvent::PhaseStarted {
                    phase: Phase::ConvertInput,
                });
                let half_one = convert_blocking(
                    "halfOne",
                    p.half_one.clone(),
                    paths.extra().join(args::HALF_ONE_FILE),
                    p.sampling_rate,
                )
                .await?;
                let half_two = convert_blocking(
                    "halfTwo",
                    p.half_two.clone(),
                    paths.extra().join(args::HALF_TWO_FILE),
                    p.sampling_rate,
                )
                .await?;
                let mask = p.mask.as_deref().map(absolute).transpose()?;

                let args = args::fsc_fdr_args(p, half_one.sampling_rate, mask.as_deref());
                let command = self.compute(kind, args, &paths, &event_tx).await?;
                let fdr_fsc_resolution = resolution::scan_log(&paths.stdout_log())?;
                match fdr_fsc_resolution {
                    Some(r) => info!("resolution at 1% FDR-FSC: {r} A"),
                    None => log::warn!("SPOC did not report a resolution at 1% FDR-FSC"),
                }

                let _ = event_tx.send(JobEvent::PhaseStarted {
                    phase: Phase::CreateOutput,
                });
                let wrapped =
                    outputs::wrap_fsc_fdr(&paths.extra(), &half_one, &half_two, p.local_res)?;
                let mut inputs = vec![half_one, half_two];
                if let Some(m) = mask {
                    inputs.push(convert::reference_input("mask", &m)?);
                }
                StageResult {
                    command,
                    inputs,
                    wrapped,
                    fdr_fsc_resolution,
                }
            }
        };

        let summary =
            crate::text_summary::protocol_summary(kind, true, stage.fdr_fsc_resolution);
        Ok(RunRecord {
            run_id: self.cfg.run_id.clone(),
            timestamp_utc,
            protocol: kind,
            params: self.cfg.params.clone(),
            run_dir: paths.root().to_path_buf(),
            command: stage.command,
            elapsed: start.elapsed(),
            inputs: stage.inputs,
            outputs: stage.wrapped.outputs,
            relations: stage.wrapped.relations,
            fdr_fsc_resolution: stage.fdr_fsc_resolution,
            summary,
            methods: crate::text_summary::protocol_methods(kind),
        })
    }

    async fn compute(
        &self,
        kind: ProtocolKind,
        args: Vec<String>,
        paths: &RunPaths,
        event_tx: &mpsc::UnboundedSender<JobEvent>,
    ) -> Result<crate::model::CommandLine> {
        let _ = event_tx.send(JobEvent::PhaseStarted {
            phase: Phase::Compute,
        });
        let command = self.cfg.plugin.command(kind, args);
        let _ = event_tx.send(JobEvent::Info(format!("Running: {command}")));
        job::run_job(
            &command,
            &paths.extra(),
            &paths.stdout_log(),
            &paths.stderr_log(),
            event_tx,
        )
        .await
        .with_context(|| format!("{kind} failed; see {}", paths.logs().display()))?;
        Ok(command)
    }
}
