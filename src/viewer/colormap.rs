use image::Rgb;

/// Named colormaps, sampled by piecewise-linear interpolation between stops.
/// A `_r` suffix reverses any map, as in matplotlib.
#[derive(Debug, Clone)]
pub struct Colormap {
    stops: &'static [(f32, [u8; 3])],
    reversed: bool,
}

const JET: &[(f32, [u8; 3])] = &[
    (0.0, [0, 0, 128]),
    (0.125, [0, 0, 255]),
    (0.375, [0, 255, 255]),
    (0.625, [255, 255, 0]),
    (0.875, [255, 0, 0]),
    (1.0, [128, 0, 0]),
];

const VIRIDIS: &[(f32, [u8; 3])] = &[
    (0.0, [68, 1, 84]),
    (0.25, [59, 82, 139]),
    (0.5, [33, 145, 140]),
    (0.75, [94, 201, 98]),
    (1.0, [253, 231, 37]),
];

const RAINBOW: &[(f32, [u8; 3])] = &[
    (0.0, [128, 0, 255]),
    (0.25, [0, 181, 236]),
    (0.5, [128, 255, 180]),
    (0.75, [255, 181, 98]),
    (1.0, [255, 0, 0]),
];

const HOT: &[(f32, [u8; 3])] = &[
    (0.0, [10, 0, 0]),
    (0.365, [255, 0, 0]),
    (0.746, [255, 255, 0]),
    (1.0, [255, 255, 255]),
];

const COOLWARM: &[(f32, [u8; 3])] = &[
    (0.0, [59, 76, 192]),
    (0.5, [221, 221, 221]),
    (1.0, [180, 4, 38]),
];

const GRAY: &[(f32, [u8; 3])] = &[(0.0, [0, 0, 0]), (1.0, [255, 255, 255])];

const NAMED: &[(&str, &[(f32, [u8; 3])])] = &[
    ("jet", JET),
    ("viridis", VIRIDIS),
    ("rainbow", RAINBOW),
    ("hot", HOT),
    ("coolwarm", COOLWARM),
    ("gray", GRAY),
];

impl Colormap {
    pub fn by_name(name: &str) -> Option<Self> {
        let (base, reversed) = match name.strip_suffix("_r") {
            Some(b) => (b, true),
            None => (name, false),
        };
        NAMED
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(base))
            .map(|(_, stops)| Self {
                stops: *stops,
                reversed,
            })
    }

    pub fn names() -> impl Iterator<Item = &'static str> {
        NAMED.iter().map(|(n, _)| *n)
    }

    pub fn sample(&self, val01: f32) -> Rgb<u8> {
        let mut x = val01.clamp(0.0, 1.0);
        if self.reversed {
            x = 1.0 - x;
        }
        let c = self.stops;
        let mut i = 0;
        while i + 2 < c.len() && x > c[i + 1].0 {
            i += 1;
        }
        let (x0, c0) = c[i];
        let (x1, c1) = c[i + 1];
        let t = if x1 > x0 { ((x - x0) / (x1 - x0)).clamp(0.0, 1.0) } else { 0.0 };
        let lerp = |a: u8, b: u8| -> u8 { (a as f32 + t * (b as f32 - a as f32)).round() as u8 };
        Rgb([lerp(c0[0], c1[0]), lerp(c0[1], c1[1]), lerp(c0[2], c1[2])])
    }

    pub fn hex(&self, val01: f32) -> String {
        let Rgb([r, g, b]) = self.sample(val01);
        format!("#{r:02x}{g:02x}{b:02x}")
    }

    /// `n` evenly spaced colors from the low end to the high end.
    pub fn hex_list(&self, n: usize) -> Vec<String> {
        match n {
            0 => Vec::new(),
            1 => vec![self.hex(0.0)],
            _ => (0..n)
                .map(|i| self.hex(i as f32 / (n - 1) as f32))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_and_reversal() {
        let jet = Colormap::by_name("jet").unwrap();
        assert_eq!(jet.hex(0.0), "#000080");
        assert_eq!(jet.hex(1.0), "#800000");
        let jet_r = Colormap::by_name("jet_r").unwrap();
        assert_eq!(jet_r.hex(0.0), "#800000");
        assert!(Colormap::by_name("nope").is_none());
    }

    #[test]
    fn interpolates_between_stops() {
        let gray = Colormap::by_name("gray").unwrap();
        assert_eq!(gray.sample(0.5), Rgb([128, 128, 128]));
        assert_eq!(gray.hex_list(3), vec!["#000000", "#808080", "#ffffff"]);
    }
}
