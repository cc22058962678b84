//! Text summary builder for CLI output.
//!
//! Formats the human-readable lines for text mode and the `summary` command
//! from a run record.

use crate::model::{OutputArtifact, ProtocolKind, RunRecord};
use crate::plugin::REFERENCE_KEY;

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

/// Summary lines stored in the run record.
pub(crate) fn protocol_summary(
    kind: ProtocolKind,
    finished: bool,
    fdr_fsc_resolution: Option<f64>,
) -> Vec<String> {
    match kind {
        ProtocolKind::ConfidenceMap if finished => vec!["Confidence map estimated".into()],
        ProtocolKind::ConfidenceMap => vec!["Confidence map not ready yet.".into()],
        ProtocolKind::FscFdrControl if !finished => {
            vec!["FDR-FSC information not ready yet.".into()]
        }
        ProtocolKind::FscFdrControl => match fdr_fsc_resolution {
            Some(res) => vec![format!("Resolution at 1 % FDR-FSC: {res:.2} Angstrom")],
            None => vec!["Resolution at 1 % FDR-FSC: not reported by SPOC".into()],
        },
    }
}

pub(crate) fn protocol_methods(kind: ProtocolKind) -> Vec<String> {
    match kind {
        ProtocolKind::ConfidenceMap => vec!["Confidence Map estimation".into()],
        ProtocolKind::FscFdrControl => vec!["Significance analysis of FSC curves".into()],
    }
}

/// Build a text summary from a finished run.
pub(crate) fn build_text_summary(record: &RunRecord) -> TextSummary {
    let mut lines = Vec::new();

    lines.push(format!("Protocol: {} ({})", record.protocol, record.run_id));
    lines.push(format!("Run directory: {}", record.run_dir.display()));
    lines.push(format!("Command: {}", record.command));
    lines.push(format!(
        "Elapsed: {}",
        humantime::format_duration(std::time::Duration::from_secs(record.elapsed.as_secs()))
    ));

    for input in &record.inputs {
        lines.push(format!(
            "Input {}: {} ({:.3} A/px)",
            input.name,
            input.source.display(),
            input.sampling_rate
        ));
    }
    for output in &record.outputs {
        match output {
            OutputArtifact::Volume(v) => lines.push(format!(
                "Output {}: {} ({:.3} A/px)",
                v.name(),
                v.path().display(),
                v.sampling_rate()
            )),
            OutputArtifact::Fsc(f) => lines.push(format!(
                "Output {}: {} ({} shells)",
                f.name(),
                f.path().display(),
                f.curve().len()
            )),
        }
    }
    for r in &record.relations {
        lines.push(format!("Relation: {} -> {}", r.source, r.output));
    }

    lines.extend(record.summary.iter().cloned());
    for m in &record.methods {
        lines.push(format!("Methods: {m}"));
    }
    lines.push(format!("Please cite: {REFERENCE_KEY}"));

    TextSummary { lines }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fsc_summary_formats_resolution() {
        assert_eq!(
            protocol_summary(ProtocolKind::FscFdrControl, true, Some(2.0)),
            vec!["Resolution at 1 % FDR-FSC: 2.00 Angstrom"]
        );
        assert!(protocol_summary(ProtocolKind::FscFdrControl, true, None)[0].contains("not reported"));
        assert_eq!(
            protocol_summary(ProtocolKind::FscFdrControl, false, Some(2.0)),
            vec!["FDR-FSC information not ready yet."]
        );
    }

    #[test]
    fn confidence_map_summary() {
        assert_eq!(
            protocol_summary(ProtocolKind::ConfidenceMap, true, None),
            vec!["Confidence map estimated"]
        );
        assert_eq!(
            protocol_methods(ProtocolKind::ConfidenceMap),
            vec!["Confidence Map estimation"]
        );
    }
}
