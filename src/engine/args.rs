//! Command-line construction for the SPOC scripts.
//!
//! Flags are appended in the order the SPOC tools document them. An option
//! that is not set contributes nothing, leaving SPOC's own default in effect.

use crate::model::{ConfidenceMapParams, FscFdrParams};
use std::path::Path;

/// Converted half maps are always written under these names in `extra/`.
pub const HALF_ONE_FILE: &str = "halfone.mrc";
pub const HALF_TWO_FILE: &str = "halftwo.mrc";

fn float_arg(v: f64) -> String {
    format!("{v:.6}")
}

/// Integer rendering for options SPOC reads as ints; fractional input is truncated.
fn int_arg(v: f64) -> String {
    format!("{}", v.trunc() as i64)
}

fn is_set_f(v: Option<f64>) -> Option<f64> {
    v.filter(|x| *x >= 0.0)
}

fn is_set_i(v: Option<i64>) -> Option<i64> {
    v.filter(|x| *x >= 0)
}

/// Arguments for `FDRcontrol.py`.
///
/// `input_map` is the converted map in the scratch directory and
/// `res_map` the absolute path of the local resolution map.
pub fn confidence_map_args(
    params: &ConfidenceMapParams,
    input_map: &Path,
    sampling_rate: f64,
    res_map: Option<&Path>,
) -> Vec<String> {
    let mut args = vec![
        "-em".to_string(),
        input_map.display().to_string(),
        "-p".to_string(),
        float_arg(sampling_rate),
    ];

    // The noise box centre is only meaningful together with a box size.
    if let Some(size) = params.box_size {
        args.push("-w".into());
        args.push(int_arg(size));
        if let Some((x, y, z)) = params.noise_box_center() {
            args.push("-noiseBox".into());
            args.push(int_arg(x));
            args.push(int_arg(y));
            args.push(int_arg(z));
        }
    }

    if params.loc_res_filter {
        if let Some(p) = res_map {
            args.push("-locResMap".into());
            args.push(p.display().to_string());
        }
    }

    args
}

/// Arguments for `FSC_FDRcontrol.py`, run with `extra/` as working directory.
pub fn fsc_fdr_args(params: &FscFdrParams, sampling_rate: f64, mask: Option<&Path>) -> Vec<String> {
    let mut args = vec![
        "--halfmap1".to_string(),
        HALF_ONE_FILE.to_string(),
        "--halfmap2".to_string(),
        HALF_TWO_FILE.to_string(),
        "--apix".to_string(),
        float_arg(sampling_rate),
        "--symmetry".to_string(),
        params.sym.trim().to_uppercase(),
    ];

    if params.local_res {
        args.push("-localResolutions".into());
    }
    if let Some(v) = is_set_f(params.low_res) {
        args.push("-lowRes".into());
        args.push(float_arg(v));
    }
    if let Some(v) = is_set_i(params.step_size) {
        args.push("--window_size".into());
        args.push(v.to_string());
    }
    if let Some(v) = is_set_i(params.num_asym_units) {
        args.push("--numAsymUnits".into());
        args.push(v.to_string());
    }
    if let Some(v) = is_set_f(params.bfactor) {
        args.push("--bFactor".into());
        args.push(float_arg(v));
    }
    if let Some(m) = mask {
        args.push("--mask".into());
        args.push(m.display().to_string());
    }

    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn cm_params() -> ConfidenceMapParams {
        ConfidenceMapParams {
            input_map: "in.mrc".into(),
            sampling_rate: None,
            x_center: None,
            y_center: None,
            z_center: None,
            box_size: None,
            loc_res_filter: false,
            res_map: None,
        }
    }

    fn has_flag(args: &[String], flag: &str) -> bool {
        args.iter().any(|a| a == flag)
    }

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        let i = args.iter().position(|a| a == flag)?;
        args.get(i + 1).map(|s| s.as_str())
    }

    #[test]
    fn confidence_map_minimal() {
        let args = confidence_map_args(&cm_params(), Path::new("/run/tmp/inputMap.mrc"), 1.0, None);
        assert_eq!(args, vec!["-em", "/run/tmp/inputMap.mrc", "-p", "1.000000"]);
    }

    #[test]
    fn noise_box_requires_box_size() {
        let mut p = cm_params();
        p.x_center = Some(10.0);
        p.y_center = Some(11.0);
        p.z_center = Some(12.0);
        let args = confidence_map_args(&p, Path::new("m.mrc"), 1.2, None);
        assert!(!has_flag(&args, "-noiseBox"));
        assert!(!has_flag(&args, "-w"));

        p.box_size = Some(40.9);
        let args = confidence_map_args(&p, Path::new("m.mrc"), 1.2, None);
        assert_eq!(value_after(&args, "-w"), Some("40"));
        let i = args.iter().position(|a| a == "-noiseBox").unwrap();
        assert_eq!(&args[i + 1..i + 4], ["10", "11", "12"]);
    }

    #[test]
    fn partial_noise_box_centre_is_dropped() {
        let mut p = cm_params();
        p.box_size = Some(30.0);
        p.x_center = Some(1.0);
        let args = confidence_map_args(&p, Path::new("m.mrc"), 1.0, None);
        assert!(has_flag(&args, "-w"));
        assert!(!has_flag(&args, "-noiseBox"));
    }

    #[test]
    fn loc_res_map_follows_filter_flag() {
        let res = PathBuf::from("/data/locres.mrc");
        let mut p = cm_params();
        let args = confidence_map_args(&p, Path::new("m.mrc"), 1.0, Some(&res));
        assert!(!has_flag(&args, "-locResMap"));

        p.loc_res_filter = true;
        let args = confidence_map_args(&p, Path::new("m.mrc"), 1.0, Some(&res));
        assert_eq!(value_after(&args, "-locResMap"), Some("/data/locres.mrc"));
    }

    #[test]
    fn fsc_defaults_only_emit_required_flags() {
        let args = fsc_fdr_args(&FscFdrParams::default(), 1.0, None);
        assert_eq!(
            args,
            vec![
                "--halfmap1",
                "halfone.mrc",
                "--halfmap2",
                "halftwo.mrc",
                "--apix",
                "1.000000",
                "--symmetry",
                "C1"
            ]
        );
    }

    #[test]
    fn symmetry_is_upper_cased() {
        for sym in ["d7", "i2", "C4", "o"] {
            let p = FscFdrParams {
                sym: sym.into(),
                ..Default::default()
            };
            let args = fsc_fdr_args(&p, 1.0, None);
            assert_eq!(value_after(&args, "--symmetry"), Some(sym.to_uppercase().as_str()));
        }
    }

    #[test]
    fn negative_values_are_unset() {
        let p = FscFdrParams {
            low_res: Some(-1.0),
            step_size: Some(-1),
            num_asym_units: Some(-1),
            bfactor: Some(-1.0),
            ..Default::default()
        };
        let args = fsc_fdr_args(&p, 1.0, None);
        for flag in ["-lowRes", "--window_size", "--numAsymUnits", "--bFactor", "--mask"] {
            assert!(!has_flag(&args, flag), "{flag} should be absent");
        }
    }

    #[test]
    fn every_present_option_is_emitted_in_order() {
        let mask = PathBuf::from("/data/mask.mrc");
        let p = FscFdrParams {
            local_res: true,
            low_res: Some(8.5),
            step_size: Some(5),
            num_asym_units: Some(12),
            bfactor: Some(0.0),
            sym: "d2".into(),
            ..Default::default()
        };
        let args = fsc_fdr_args(&p, 0.83, Some(&mask));
        assert_eq!(value_after(&args, "--apix"), Some("0.830000"));
        assert_eq!(value_after(&args, "-lowRes"), Some("8.500000"));
        assert_eq!(value_after(&args, "--window_size"), Some("5"));
        assert_eq!(value_after(&args, "--numAsymUnits"), Some("12"));
        assert_eq!(value_after(&args, "--bFactor"), Some("0.000000"));
        assert_eq!(value_after(&args, "--mask"), Some("/data/mask.mrc"));

        let order: Vec<usize> = [
            "--symmetry",
            "-localResolutions",
            "-lowRes",
            "--window_size",
            "--numAsymUnits",
            "--bFactor",
            "--mask",
        ]
        .iter()
        .map(|f| args.iter().position(|a| a == f).unwrap())
        .collect();
        assert!(order.windows(2).all(|w| w[0] < w[1]));
    }
}
