//! Checks run before anything is written or launched.

use crate::model::{ConfidenceMapParams, FscFdrParams, ProtocolKind, ProtocolParams};
use crate::plugin::Plugin;
use std::path::Path;

fn check_file(errors: &mut Vec<String>, label: &str, path: &Path) {
    if path.as_os_str().is_empty() {
        errors.push(format!("You must provide {label}"));
    } else if !path.is_file() {
        errors.push(format!("{label} {} does not exist", path.display()));
    }
}

fn check_confidence_map(p: &ConfidenceMapParams, errors: &mut Vec<String>) {
    check_file(errors, "an input map", &p.input_map);
    if p.loc_res_filter {
        match &p.res_map {
            Some(m) => check_file(errors, "the local resolution map", m),
            None => errors.push(
                "Local resolution filtering needs a local resolution map (--res-map)".into(),
            ),
        }
    }
    if let Some(r) = p.sampling_rate.filter(|r| r.is_nan() || *r <= 0.0) {
        errors.push(format!("Sampling rate must be positive, got {r}"));
    }
    if let Some(b) = p.box_size.filter(|b| b.is_nan() || *b <= 0.0) {
        errors.push(format!("Noise box size must be positive, got {b}"));
    }
    for (axis, c) in [("x", p.x_center), ("y", p.y_center), ("z", p.z_center)] {
        if let Some(c) = c.filter(|c| !c.is_finite()) {
            errors.push(format!("Noise box {axis} centre must be a finite number, got {c}"));
        }
    }
}

fn check_fsc_fdr(p: &FscFdrParams, errors: &mut Vec<String>) {
    check_file(errors, "the first half map", &p.half_one);
    check_file(errors, "the second half map", &p.half_two);
    if let Some(mask) = &p.mask {
        check_file(errors, "the mask", mask);
    }
    if p.sym.trim().is_empty() {
        errors.push("Volume symmetry must not be empty".into());
    }
    if let Some(r) = p.sampling_rate.filter(|r| r.is_nan() || *r <= 0.0) {
        errors.push(format!("Sampling rate must be positive, got {r}"));
    }
}

/// Collect every validation message for `params`; empty means ready to run.
///
/// The SPOC script must exist unless a custom launcher replaces the
/// interpreter (`check_script == false`).
pub fn validate(params: &ProtocolParams, plugin: &Plugin, check_script: bool) -> Vec<String> {
    let mut errors = Vec::new();
    match params {
        ProtocolParams::ConfidenceMap(p) => check_confidence_map(p, &mut errors),
        ProtocolParams::FscFdrControl(p) => check_fsc_fdr(p, &mut errors),
    }
    if check_script {
        let kind: ProtocolKind = params.kind();
        let script = plugin.script(kind);
        if !script.is_file() {
            errors.push(format!(
                "{} not found; run `spoc-cli install` or set SPOC_HOME",
                script.display()
            ));
        }
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plugin(dir: &Path) -> Plugin {
        Plugin::new(Some(dir.to_path_buf()), "python").unwrap()
    }

    #[test]
    fn missing_input_map_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let params = ProtocolParams::ConfidenceMap(ConfidenceMapParams {
            input_map: "".into(),
            sampling_rate: None,
            x_center: None,
            y_center: None,
            z_center: None,
            box_size: None,
            loc_res_filter: true,
            res_map: None,
        });
        let errors = validate(&params, &plugin(dir.path()), false);
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("You must provide an input map"));
        assert!(errors[1].contains("--res-map"));
    }

    #[test]
    fn fsc_inputs_and_script_are_checked() {
        let dir = tempfile::tempdir().unwrap();
        let half = dir.path().join("half.mrc");
        std::fs::write(&half, b"").unwrap();
        let params = ProtocolParams::FscFdrControl(FscFdrParams {
            half_one: half.clone(),
            half_two: half,
            mask: Some(dir.path().join("nomask.mrc")),
            ..Default::default()
        });
        let errors = validate(&params, &plugin(dir.path()), true);
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("the mask"));
        assert!(errors[1].contains("FSC_FDRcontrol.py"));
    }

    #[test]
    fn nan_numbers_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let map = dir.path().join("map.mrc");
        std::fs::write(&map, b"").unwrap();
        let params = ProtocolParams::ConfidenceMap(ConfidenceMapParams {
            input_map: map,
            sampling_rate: Some(f64::NAN),
            x_center: Some(f64::NAN),
            y_center: Some(3.0),
            z_center: Some(3.0),
            box_size: Some(f64::NAN),
            loc_res_filter: false,
            res_map: None,
        });
        let errors = validate(&params, &plugin(dir.path()), false);
        assert_eq!(errors.len(), 3);
        assert!(errors[0].contains("Sampling rate"));
        assert!(errors[1].contains("Noise box size"));
        assert!(errors[2].contains("x centre"));
    }
}
