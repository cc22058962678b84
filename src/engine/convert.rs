use crate::model::VolumeInput;
use crate::volume::Volume;
use anyhow::{Context, Result};
use log::info;
use std::path::Path;

/// Read `source` and write it as a float32 MRC at `dest`.
///
/// The sampling rate comes from `override_rate` when given, otherwise from
/// the source header, and is also written into the converted header.
pub fn convert_input(
    name: &str,
    source: &Path,
    dest: &Path,
    override_rate: Option<f64>,
) -> Result<VolumeInput> {
    let mut vol = Volume::read_mrc(source)
        .with_context(|| format!("convert input {name} ({})", source.display()))?;
    if let Some(rate) = override_rate {
        vol.sampling_rate = rate;
    }
    vol.write_mrc(dest)
        .with_context(|| format!("write converted {name}"))?;

    let (nx, ny, nz) = vol.dims();
    info!(
        "converted {name}: {} -> {} ({nx}x{ny}x{nz}, {:.3} A/px)",
        source.display(),
        dest.display(),
        vol.sampling_rate
    );

    Ok(VolumeInput {
        name: name.to_string(),
        source: source.to_path_buf(),
        converted: Some(dest.to_path_buf()),
        sampling_rate: vol.sampling_rate,
    })
}

/// Sampling rate of a volume that is passed through unconverted (masks, maps given by path).
pub fn reference_input(name: &str, source: &Path) -> Result<VolumeInput> {
    let vol = Volume::read_mrc(source).with_context(|| format!("read {name}"))?;
    Ok(VolumeInput {
        name: name.to_string(),
        source: source.to_path_buf(),
        converted: None,
        sampling_rate: vol.sampling_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_applies_sampling_override() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.mrc");
        let dst = dir.path().join("inputMap.mrc");
        Volume::new(2, 2, 2, 3.0).write_mrc(&src).unwrap();

        let input = convert_input("inputMap", &src, &dst, None).unwrap();
        assert!((input.sampling_rate - 3.0).abs() < 1e-6);

        let input = convert_input("inputMap", &src, &dst, Some(1.25)).unwrap();
        assert_eq!(input.sampling_rate, 1.25);
        let back = Volume::read_mrc(&dst).unwrap();
        assert!((back.sampling_rate - 1.25).abs() < 1e-6);
    }

    #[test]
    fn unreadable_input_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("broken.mrc");
        std::fs::write(&src, b"not an mrc").unwrap();
        assert!(convert_input("inputMap", &src, &dir.path().join("o.mrc"), None).is_err());
    }
}
