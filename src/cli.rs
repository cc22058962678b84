use crate::engine::{ProtocolEngine, RunConfig};
use crate::model::{
    ConfidenceMapParams, FscFdrParams, JobEvent, ProtocolKind, ProtocolParams, RunRecord, Stream,
};
use crate::orchestrator::{self, Exports};
use crate::plugin::{self, Plugin};
use crate::viewer::{self, ViewOptions, Viewer};
use crate::volume::Axis;
use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use rand::RngCore;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "spoc-cli",
    version,
    about = "Confidence maps and FDR-controlled FSC resolution with SPOC"
)]
pub struct Cli {
    /// Print the run record as JSON (no progress text)
    #[arg(long, global = true)]
    pub json: bool,

    /// Plain text progress and summary
    #[arg(long, global = true)]
    pub text: bool,

    /// Run silently: suppress all output except errors (requires --json)
    #[arg(long, global = true)]
    pub silent: bool,

    /// SPOC installation directory
    #[arg(long, env = plugin::SPOC_HOME_VAR, global = true)]
    pub spoc_home: Option<PathBuf>,

    /// Interpreter used to launch the SPOC scripts
    #[arg(long, default_value = "python", global = true)]
    pub python: String,

    /// Raise log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Estimate a confidence map with FDRcontrol.py
    ConfidenceMap(ConfidenceMapArgs),
    /// FDR-controlled FSC analysis of two half maps with FSC_FDRcontrol.py
    FscFdr(FscFdrArgs),
    /// Print summary and methods of an existing run
    Summary {
        /// Run directory or run.json
        run: PathBuf,
    },
    /// Render results of an existing run
    View(ViewArgs),
    /// Download and unpack the pinned SPOC sources
    Install,
    /// Plugin information (home, active version, references)
    Info,
}

#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    /// Run directory (default ./spoc-runs/<protocol>-<timestamp>-<id>)
    #[arg(long)]
    pub run_dir: Option<PathBuf>,

    /// Export the run record as JSON
    #[arg(long)]
    pub export_json: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct ConfidenceMapArgs {
    /// Map to analyse
    #[arg(long)]
    pub input_map: PathBuf,

    /// Pixel size in A (defaults to the map header)
    #[arg(long)]
    pub sampling_rate: Option<f64>,

    /// Noise box centre, x (pixels)
    #[arg(long)]
    pub x_center: Option<f64>,

    /// Noise box centre, y (pixels)
    #[arg(long)]
    pub y_center: Option<f64>,

    /// Noise box centre, z (pixels)
    #[arg(long)]
    pub z_center: Option<f64>,

    /// Noise box size (pixels)
    #[arg(long = "box")]
    pub box_size: Option<f64>,

    /// Use --loc-res-filter true or --loc-res-filter false to override
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub loc_res_filter: bool,

    /// Local resolution map used for filtering
    #[arg(long)]
    pub res_map: Option<PathBuf>,

    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Debug, Args, Clone)]
pub struct FscFdrArgs {
    /// First half map
    #[arg(long)]
    pub half_one: PathBuf,

    /// Second half map
    #[arg(long)]
    pub half_two: PathBuf,

    /// Pixel size in A (defaults to the header of half map one)
    #[arg(long)]
    pub sampling_rate: Option<f64>,

    /// Also compute a local resolution map
    #[arg(long)]
    pub local_res: bool,

    /// Low resolution limit in A; negative leaves SPOC's default
    #[arg(long, default_value_t = -1.0, allow_hyphen_values = true)]
    pub low_res: f64,

    /// Local resolution window size; negative leaves SPOC's default
    #[arg(long, default_value_t = -1, allow_hyphen_values = true)]
    pub step_size: i64,

    /// Point group symmetry
    #[arg(long, default_value = "c1")]
    pub sym: String,

    /// Number of asymmetric units; negative leaves SPOC's default
    #[arg(long, default_value_t = -1, allow_hyphen_values = true)]
    pub num_asym_units: i64,

    /// B-factor; negative leaves SPOC's default
    #[arg(long, default_value_t = -1.0, allow_hyphen_values = true)]
    pub bfactor: f64,

    /// Mask applied before the FSC
    #[arg(long)]
    pub mask: Option<PathBuf>,

    /// Export the FSC curve as CSV
    #[arg(long)]
    pub export_csv: Option<PathBuf>,

    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Debug, Args, Clone)]
pub struct ViewArgs {
    #[arg(value_enum)]
    pub viewer: Viewer,

    /// Run directory or run.json
    pub run: PathBuf,

    /// Slice axis
    #[arg(long, value_enum, default_value = "z")]
    pub axis: Axis,

    /// Colormap for colored slices and ChimeraX keys (suffix _r reverses)
    #[arg(long, default_value = "jet")]
    pub colormap: String,

    /// Lowest value of the color scale
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub lowest: f32,

    /// Highest value of the color scale
    #[arg(long, default_value_t = 1.0, allow_hyphen_values = true)]
    pub highest: f32,

    /// Slice to show, 1-based; negative selects the middle
    #[arg(long, default_value_t = -1, allow_hyphen_values = true)]
    pub slice_number: i64,

    /// Atomic structure to color instead of the map
    #[arg(long)]
    pub structure: Option<PathBuf>,

    /// Start ChimeraX on the written script
    #[arg(long)]
    pub launch: bool,

    /// ChimeraX executable
    #[arg(long, env = viewer::chimera::CHIMERAX_BIN_VAR, default_value = "chimerax")]
    pub chimerax: String,

    /// PNG output directory, or script path for ChimeraX viewers
    #[arg(long)]
    pub out: Option<PathBuf>,
}

pub async fn run(args: Cli) -> Result<()> {
    // Validate that --silent can only be used with --json
    if args.silent && !args.json {
        return Err(anyhow::anyhow!(
            "--silent can only be used with --json. Use --silent --json together."
        ));
    }

    match args.command.clone() {
        Command::ConfidenceMap(a) => {
            let params = ProtocolParams::ConfidenceMap(confidence_map_params(&a));
            run_protocol(&args, params, &a.run, None).await
        }
        Command::FscFdr(a) => {
            let params = ProtocolParams::FscFdrControl(fsc_fdr_params(&a));
            run_protocol(&args, params, &a.run, a.export_csv.as_deref()).await
        }
        Command::Summary { run } => run_summary(&args, &run).await,
        Command::View(v) => run_view(&args, v).await,
        Command::Install => run_install(&args).await,
        Command::Info => run_info(&args).await,
    }
}

/// Generate a random run ID.
fn gen_run_id() -> String {
    let mut b = [0u8; 4];
    rand::thread_rng().fill_bytes(&mut b);
    format!("{:08x}", u32::from_le_bytes(b))
}

fn non_negative(v: f64) -> Option<f64> {
    (v >= 0.0).then_some(v)
}

fn confidence_map_params(a: &ConfidenceMapArgs) -> ConfidenceMapParams {
    ConfidenceMapParams {
        input_map: a.input_map.clone(),
        sampling_rate: a.sampling_rate,
        x_center: a.x_center,
        y_center: a.y_center,
        z_center: a.z_center,
        box_size: a.box_size,
        loc_res_filter: a.loc_res_filter,
        res_map: a.res_map.clone(),
    }
}

fn fsc_fdr_params(a: &FscFdrArgs) -> FscFdrParams {
    FscFdrParams {
        half_one: a.half_one.clone(),
        half_two: a.half_two.clone(),
        sampling_rate: a.sampling_rate,
        local_res: a.local_res,
        low_res: non_negative(a.low_res),
        step_size: (a.step_size >= 0).then_some(a.step_size),
        sym: a.sym.clone(),
        num_asym_units: (a.num_asym_units >= 0).then_some(a.num_asym_units),
        bfactor: non_negative(a.bfactor),
        mask: a.mask.clone(),
    }
}

fn plugin_from(args: &Cli) -> Result<Plugin> {
    Plugin::new(args.spoc_home.clone(), args.python.clone())
}

/// Only a python interpreter needs the SPOC script on disk beforehand.
fn is_python_launcher(python: &str) -> bool {
    Path::new(python)
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with("python"))
}

/// Build a `RunConfig` from CLI arguments.
pub fn build_config(args: &Cli, params: ProtocolParams, run: &RunArgs) -> Result<RunConfig> {
    let run_id = gen_run_id();
    let kind: ProtocolKind = params.kind();
    let run_dir = run
        .run_dir
        .clone()
        .unwrap_or_else(|| crate::storage::default_run_dir(Path::new("spoc-runs"), kind, &run_id));
    Ok(RunConfig {
        run_id,
        run_dir,
        params,
        plugin: plugin_from(args)?,
        check_script: is_python_launcher(&args.python),
    })
}

/// Run one protocol and process the result.
/// Progress goes to stderr in text mode; JSON and silent mode only consume events.
async fn run_protocol(
    args: &Cli,
    params: ProtocolParams,
    run: &RunArgs,
    export_csv: Option<&Path>,
) -> Result<()> {
    let cfg = build_config(args, params, run)?;
    let verbose_progress = !args.json && !args.silent;
    let (out_tx, out_handle) = if args.silent {
        (None, None)
    } else {
        let (tx, handle) = spawn_output_writer();
        (Some(tx), Some(handle))
    };

    let (evt_tx, mut evt_rx) = mpsc::unbounded_channel::<JobEvent>();
    let engine = ProtocolEngine::new(cfg);
    let handle = tokio::spawn(async move { engine.run(evt_tx).await });

    while let Some(ev) = evt_rx.recv().await {
        let Some(tx) = out_tx.as_ref().filter(|_| verbose_progress) else {
            continue;
        };
        let msg = match ev {
            JobEvent::PhaseStarted { phase } => format!("== {phase:?} =="),
            JobEvent::Output {
                stream: Stream::Stdout,
                line,
            } => format!("  {line}"),
            JobEvent::Output {
                stream: Stream::Stderr,
                line,
            } => format!("  ! {line}"),
            JobEvent::Info(info) => info,
        };
        let _ = tx.send(OutputLine::Stderr(msg));
    }

    let record = handle.await.context("protocol task failed")??;
    let processed = orchestrator::process_run_completion(
        &record,
        Exports {
            json: run.export_json.as_deref(),
            csv: export_csv,
        },
    )?;

    if let Some(tx) = out_tx.as_ref() {
        if args.json {
            let out = serde_json::to_string_pretty(&record)?;
            let _ = tx.send(OutputLine::Stdout(out));
        } else {
            for line in crate::text_summary::build_text_summary(&record).lines {
                let _ = tx.send(OutputLine::Stdout(line));
            }
        }
        for msg in processed.export_messages {
            let _ = tx.send(OutputLine::Stderr(msg));
        }
        let _ = tx.send(OutputLine::Stderr(format!(
            "Saved: {}",
            processed.saved_path.display()
        )));
    }

    drop(out_tx);
    if let Some(handle) = out_handle {
        let _ = handle.await;
    }
    Ok(())
}

/// Send lines to stdout through the writer task and wait for it to drain.
async fn print_lines(lines: Vec<String>) {
    let (tx, handle) = spawn_output_writer();
    for line in lines {
        let _ = tx.send(OutputLine::Stdout(line));
    }
    drop(tx);
    let _ = handle.await;
}

async fn print_json(value: &impl serde::Serialize) -> Result<()> {
    print_lines(vec![serde_json::to_string_pretty(value)?]).await;
    Ok(())
}

async fn run_summary(args: &Cli, run: &Path) -> Result<()> {
    let record: RunRecord = crate::storage::load_run(run)?;
    if args.silent {
        return Ok(());
    }
    if args.json {
        return print_json(&serde_json::json!({
            "run_id": record.run_id,
            "protocol": record.protocol,
            "summary": record.summary,
            "methods": record.methods,
            "fdr_fsc_resolution": record.fdr_fsc_resolution,
            "citations": [plugin::REFERENCE_KEY],
        }))
        .await;
    }
    print_lines(crate::text_summary::build_text_summary(&record).lines).await;
    Ok(())
}

async fn run_view(args: &Cli, v: ViewArgs) -> Result<()> {
    let record = crate::storage::load_run(&v.run)?;
    let opts = ViewOptions {
        axis: v.axis,
        colormap: v.colormap,
        lowest: v.lowest,
        highest: v.highest,
        slice_number: v.slice_number,
        structure: v.structure,
        launch: v.launch,
        chimerax: v.chimerax,
        out: v.out,
    };
    let viewer = v.viewer;
    let (record, rendered) = tokio::task::spawn_blocking(move || {
        let rendered = viewer::render(&record, viewer, &opts);
        (record, rendered)
    })
    .await
    .context("viewer task failed")?;
    let rendered = rendered?;

    if args.silent {
        return Ok(());
    }
    if args.json {
        return print_json(&serde_json::json!({
            "run_id": record.run_id,
            "viewer": format!("{viewer:?}"),
            "lines": rendered.lines(),
        }))
        .await;
    }

    #[cfg(feature = "tui")]
    {
        if !args.text && crate::tui::is_interactive(&rendered) {
            let title = format!(
                "{} {} ({})",
                record.protocol,
                record.run_id,
                viewer_title(&rendered)
            );
            return tokio::task::spawn_blocking(move || crate::tui::show(title, &rendered))
                .await
                .context("TUI thread panicked")?;
        }
    }

    print_lines(rendered.lines()).await;
    Ok(())
}

#[cfg(feature = "tui")]
fn viewer_title(rendered: &viewer::Rendered) -> &'static str {
    match rendered {
        viewer::Rendered::Fsc(_) => "FSC",
        viewer::Rendered::Histogram { .. } => "histogram",
        viewer::Rendered::Files(_) => "files",
    }
}

async fn run_install(args: &Cli) -> Result<()> {
    let plugin = plugin_from(args)?;
    let (tx, handle) = spawn_output_writer();
    let progress_tx = tx.clone();
    let silent = args.silent;
    let res = plugin::install(&plugin, move |msg| {
        if !silent {
            let _ = progress_tx.send(OutputLine::Stderr(msg));
        }
    })
    .await;

    if let Ok(path) = res.as_ref() {
        if args.json && !silent {
            let out = serde_json::to_string_pretty(&serde_json::json!({
                "home": plugin.home(),
                "source_dir": path,
                "version": plugin::V_CB,
            }))?;
            let _ = tx.send(OutputLine::Stdout(out));
        } else if !silent {
            let _ = tx.send(OutputLine::Stdout(format!("SPOC installed at {}", path.display())));
        }
    }
    drop(tx);
    let _ = handle.await;
    res.map(|_| ())
}

/// Plugin information lines.
fn info_lines(plugin: &Plugin) -> Vec<String> {
    let mut lines = vec![
        format!("SPOC home: {}", plugin.home().display()),
        format!(
            "Sources: {} ({})",
            plugin.source_dir().display(),
            if plugin.source_dir().is_dir() {
                "installed"
            } else {
                "not installed; run `spoc-cli install`"
            }
        ),
        format!(
            "Active version: {}",
            plugin.active_version().unwrap_or("unknown")
        ),
        format!(
            "Supported versions: {}",
            plugin::SUPPORTED_VERSIONS.join(", ")
        ),
        format!("Python: {}", plugin.python()),
    ];
    for kind in [ProtocolKind::ConfidenceMap, ProtocolKind::FscFdrControl] {
        lines.push(format!("{}: {}", kind.label(), plugin.script(kind).display()));
    }
    lines.push(format!("Repository: {}", plugin::REPOSITORY_URL));
    lines.push(format!("Plugin: {}", plugin::PLUGIN_URL));
    lines.push(String::new());
    lines.push(format!("Reference ({}):", plugin::REFERENCE_KEY));
    lines.extend(plugin::REFERENCE_BIBTEX.lines().map(str::to_string));
    lines
}

async fn run_info(args: &Cli) -> Result<()> {
    let plugin = plugin_from(args)?;
    if args.silent {
        return Ok(());
    }
    if args.json {
        return print_json(&serde_json::json!({
            "home": plugin.home(),
            "source_dir": plugin.source_dir(),
            "installed": plugin.source_dir().is_dir(),
            "active_version": plugin.active_version(),
            "supported_versions": plugin::SUPPORTED_VERSIONS,
            "python": plugin.python(),
            "repository": plugin::REPOSITORY_URL,
            "references": [plugin::REFERENCE_KEY],
        }))
        .await;
    }
    print_lines(info_lines(&plugin)).await;
    Ok(())
}
