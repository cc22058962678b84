use crate::model::FscCurve;

/// Conventional gold-standard FSC cut-off.
pub const FSC_THRESHOLD: f64 = 0.143;

#[derive(Debug, Clone)]
pub struct FscView {
    pub curve: FscCurve,
    pub threshold: f64,
    /// Resolution where the curve crosses `threshold`, in Å.
    pub at_threshold: Option<f64>,
    /// Resolution SPOC reported at 1 % FDR, in Å.
    pub fdr_fsc: Option<f64>,
}

impl FscView {
    pub fn new(curve: FscCurve, fdr_fsc: Option<f64>) -> Self {
        let at_threshold = curve.resolution_at(FSC_THRESHOLD);
        Self {
            curve,
            threshold: FSC_THRESHOLD,
            at_threshold,
            fdr_fsc,
        }
    }

    /// (spatial frequency, correlation) pairs for plotting.
    pub fn points(&self) -> Vec<(f64, f64)> {
        self.curve
            .resolution
            .iter()
            .copied()
            .zip(self.curve.correlation.iter().copied())
            .collect()
    }

    pub fn headline(&self) -> Vec<String> {
        let mut lines = Vec::new();
        match self.at_threshold {
            Some(r) => lines.push(format!("Resolution at FSC {}: {r:.2} Angstrom", self.threshold)),
            None => lines.push(format!("FSC never crosses {}", self.threshold)),
        }
        match self.fdr_fsc {
            Some(r) => lines.push(format!("Resolution at 1 % FDR-FSC: {r:.2} Angstrom")),
            None => lines.push("Resolution at 1 % FDR-FSC: not reported by SPOC".into()),
        }
        lines
    }

    pub fn lines(&self) -> Vec<String> {
        let mut lines = self.headline();
        lines.push(String::new());
        lines.push(format!("{:>10} {:>10} {:>10}", "1/A", "A", "FSC"));
        for (freq, corr) in self.points() {
            let res = if freq > 0.0 {
                format!("{:>10.2}", 1.0 / freq)
            } else {
                format!("{:>10}", "inf")
            };
            lines.push(format!("{freq:>10.4} {res} {corr:>10.4}"));
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn curve() -> FscCurve {
        FscCurve {
            resolution: vec![0.0, 0.1, 0.2, 0.3],
            correlation: vec![1.0, 0.9, 0.1, 0.0],
        }
    }

    #[test]
    fn crossing_and_reported_resolution() {
        let view = FscView::new(curve(), Some(2.0));
        let at = view.at_threshold.unwrap();
        assert!(at > 1.0 / 0.2 && at < 1.0 / 0.1);
        let head = view.headline();
        assert_eq!(head[1], "Resolution at 1 % FDR-FSC: 2.00 Angstrom");
    }

    #[test]
    fn table_has_one_row_per_shell() {
        let view = FscView::new(curve(), None);
        let lines = view.lines();
        assert_eq!(lines.len(), 2 + 2 + 4);
        assert!(lines[4].contains("inf"));
        assert!(lines[1].contains("not reported"));
    }
}
