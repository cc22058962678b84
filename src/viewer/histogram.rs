use crate::metrics;
use crate::volume::Volume;

/// Voxels at or below this value are background and left out of the histogram.
pub const CONFIDENCE_FLOOR: f64 = 0.1;
pub const DEFAULT_BINS: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    /// `counts.len() + 1` bin edges.
    pub edges: Vec<f64>,
    pub counts: Vec<u64>,
}

impl Histogram {
    /// Equal-width bins over the value range; the last bin is closed.
    pub fn from_values(values: &[f64], bins: usize) -> Option<Self> {
        if values.is_empty() || bins == 0 {
            return None;
        }
        let (mut lo, mut hi) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        if hi <= lo {
            lo -= 0.5;
            hi += 0.5;
        }
        let width = (hi - lo) / bins as f64;
        let edges = (0..=bins).map(|i| lo + i as f64 * width).collect();
        let mut counts = vec![0u64; bins];
        for &v in values {
            let i = (((v - lo) / width) as usize).min(bins - 1);
            counts[i] += 1;
        }
        Some(Self { edges, counts })
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    pub fn lines(&self) -> Vec<String> {
        let max = self.counts.iter().copied().max().unwrap_or(0).max(1);
        self.counts
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                let bar = "#".repeat((c * 40 / max) as usize);
                format!(
                    "{:>6.3} - {:>6.3} | {:>9} {}",
                    self.edges[i],
                    self.edges[i + 1],
                    c,
                    bar
                )
            })
            .collect()
    }
}

/// Voxel values above [`CONFIDENCE_FLOOR`].
pub fn confidence_values(vol: &Volume) -> Vec<f64> {
    vol.data
        .iter()
        .map(|&v| f64::from(v))
        .filter(|&v| v > CONFIDENCE_FLOOR)
        .collect()
}

/// Histogram of significant voxels plus mean/median/p25/p75 of the same values.
pub fn confidence_histogram(
    vol: &Volume,
) -> Option<(Histogram, Option<(f64, f64, f64, f64)>)> {
    let values = confidence_values(vol);
    let hist = Histogram::from_values(&values, DEFAULT_BINS)?;
    Some((hist, metrics::compute_metrics(&values)))
}
