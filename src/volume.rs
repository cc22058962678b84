//! Minimal MRC 2014 volume reader/writer.
//!
//! Reads little-endian files in modes 0, 1, 2 and 6 into `f32` voxels and
//! writes mode 2. Axis order is assumed to be the standard x-fastest layout.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

const HEADER_LEN: usize = 1024;

#[derive(Debug, Error)]
pub enum MrcError {
    #[error("failed to access {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{}: file is shorter than the {expected} bytes its header declares", .path.display())]
    Truncated { path: PathBuf, expected: usize },
    #[error("{}: unsupported MRC data mode {mode}", .path.display())]
    UnsupportedMode { path: PathBuf, mode: i32 },
    #[error("{}: big-endian MRC files are not supported", .path.display())]
    BigEndian { path: PathBuf },
    #[error("{}: invalid dimensions {nx}x{ny}x{nz}", .path.display())]
    InvalidDimensions {
        path: PathBuf,
        nx: i32,
        ny: i32,
        nz: i32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn as_str(self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        }
    }
}

/// A 2-D section of a volume, row-major.
#[derive(Debug, Clone)]
pub struct Slice {
    pub width: usize,
    pub height: usize,
    pub values: Vec<f32>,
}

impl Slice {
    pub fn get(&self, col: usize, row: usize) -> f32 {
        self.values[row * self.width + col]
    }
}

#[derive(Debug, Clone)]
pub struct Volume {
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
    /// Voxel size in Å.
    pub sampling_rate: f64,
    pub data: Vec<f32>,
}

fn word_i32(h: &[u8], word: usize) -> i32 {
    let o = word * 4;
    i32::from_le_bytes([h[o], h[o + 1], h[o + 2], h[o + 3]])
}

fn put_i32(h: &mut [u8], word: usize, v: i32) {
    h[word * 4..word * 4 + 4].copy_from_slice(&v.to_le_bytes());
}

fn word_f32(h: &[u8], word: usize) -> f32 {
    let o = word * 4;
    f32::from_le_bytes([h[o], h[o + 1], h[o + 2], h[o + 3]])
}

impl Volume {
    pub fn new(nx: usize, ny: usize, nz: usize, sampling_rate: f64) -> Self {
        Self {
            nx,
            ny,
            nz,
            sampling_rate,
            data: vec![0.0; nx * ny * nz],
        }
    }

    pub fn dims(&self) -> (usize, usize, usize) {
        (self.nx, self.ny, self.nz)
    }

    fn index(&self, x: usize, y: usize, z: usize) -> usize {
        x + self.nx * (y + self.ny * z)
    }

    pub fn get(&self, x: usize, y: usize, z: usize) -> f32 {
        self.data[self.index(x, y, z)]
    }

    pub fn set(&mut self, x: usize, y: usize, z: usize, v: f32) {
        let i = self.index(x, y, z);
        self.data[i] = v;
    }

    pub fn axis_len(&self, axis: Axis) -> usize {
        match axis {
            Axis::X => self.nx,
            Axis::Y => self.ny,
            Axis::Z => self.nz,
        }
    }

    /// Section perpendicular to `axis`. Rows run along z for x/y sections.
    pub fn slice(&self, axis: Axis, index: usize) -> Option<Slice> {
        if index >= self.axis_len(axis) {
            return None;
        }
        let (width, height) = match axis {
            Axis::Z => (self.nx, self.ny),
            Axis::Y => (self.nx, self.nz),
            Axis::X => (self.ny, self.nz),
        };
        let mut values = Vec::with_capacity(width * height);
        for row in 0..height {
            for col in 0..width {
                let v = match axis {
                    Axis::Z => self.get(col, row, index),
                    Axis::Y => self.get(col, index, row),
                    Axis::X => self.get(index, col, row),
                };
                values.push(v);
            }
        }
        Some(Slice {
            width,
            height,
            values,
        })
    }

    pub fn min_max(&self) -> (f32, f32) {
        self.data
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            })
    }

    pub fn read_mrc(path: &Path) -> Result<Self, MrcError> {
        let io_err = |source| MrcError::Io {
            path: path.to_path_buf(),
            source,
        };
        let mut reader = BufReader::new(File::open(path).map_err(io_err)?);
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).map_err(io_err)?;
        Self::from_bytes(path, &bytes)
    }

    fn from_bytes(path: &Path, bytes: &[u8]) -> Result<Self, MrcError> {
        if bytes.len() < HEADER_LEN {
            return Err(MrcError::Truncated {
                path: path.to_path_buf(),
                expected: HEADER_LEN,
            });
        }
        let h = &bytes[..HEADER_LEN];
        // MACHST: 0x44 0x44 little-endian, 0x11 0x11 big-endian; zero in old files.
        if h[212] == 0x11 && h[213] == 0x11 {
            return Err(MrcError::BigEndian {
                path: path.to_path_buf(),
            });
        }

        let (nx, ny, nz) = (word_i32(h, 0), word_i32(h, 1), word_i32(h, 2));
        if nx <= 0 || ny <= 0 || nz <= 0 {
            return Err(MrcError::InvalidDimensions {
                path: path.to_path_buf(),
                nx,
                ny,
                nz,
            });
        }
        let mode = word_i32(h, 3);
        let mx = word_i32(h, 7);
        let cella_x = word_f32(h, 10);
        let nsymbt = word_i32(h, 23).max(0) as usize;

        let sampling_rate = if mx > 0 && cella_x > 0.0 {
            f64::from(cella_x) / f64::from(mx)
        } else {
            1.0
        };

        let width = match mode {
            0 => 1,
            1 | 6 => 2,
            2 => 4,
            _ => {
                return Err(MrcError::UnsupportedMode {
                    path: path.to_path_buf(),
                    mode,
                })
            }
        };
        let invalid = || MrcError::InvalidDimensions {
            path: path.to_path_buf(),
            nx,
            ny,
            nz,
        };
        let data_len = (nx as usize)
            .checked_mul(ny as usize)
            .and_then(|n| n.checked_mul(nz as usize))
            .and_then(|n| n.checked_mul(width))
            .ok_or_else(invalid)?;
        let start = HEADER_LEN + nsymbt;
        let end = start.checked_add(data_len).ok_or_else(invalid)?;
        if bytes.len() < end {
            return Err(MrcError::Truncated {
                path: path.to_path_buf(),
                expected: end,
            });
        }
        let raw = &bytes[start..end];
        let data: Vec<f32> = match mode {
            0 => raw.iter().map(|&b| f32::from(b as i8)).collect(),
            1 => raw
                .chunks_exact(2)
                .map(|c| f32::from(i16::from_le_bytes([c[0], c[1]])))
                .collect(),
            6 => raw
                .chunks_exact(2)
                .map(|c| f32::from(u16::from_le_bytes([c[0], c[1]])))
                .collect(),
            _ => raw
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        };

        Ok(Self {
            nx: nx as usize,
            ny: ny as usize,
            nz: nz as usize,
            sampling_rate,
            data,
        })
    }

    fn header(&self) -> Vec<u8> {
        let mut h = vec![0u8; HEADER_LEN];
        let (nx, ny, nz) = (self.nx as i32, self.ny as i32, self.nz as i32);
        put_i32(&mut h, 0, nx);
        put_i32(&mut h, 1, ny);
        put_i32(&mut h, 2, nz);
        put_i32(&mut h, 3, 2);
        put_i32(&mut h, 7, nx);
        put_i32(&mut h, 8, ny);
        put_i32(&mut h, 9, nz);
        put_i32(&mut h, 16, 1);
        put_i32(&mut h, 17, 2);
        put_i32(&mut h, 18, 3);
        put_i32(&mut h, 22, 1);
        put_i32(&mut h, 27, 20140);

        let sr = self.sampling_rate as f32;
        let (lo, hi) = self.min_max();
        let mean = if self.data.is_empty() {
            0.0
        } else {
            (self.data.iter().map(|&v| f64::from(v)).sum::<f64>() / self.data.len() as f64) as f32
        };
        let floats = [
            (10, nx as f32 * sr),
            (11, ny as f32 * sr),
            (12, nz as f32 * sr),
            (13, 90.0),
            (14, 90.0),
            (15, 90.0),
            (19, lo),
            (20, hi),
            (21, mean),
        ];
        for (word, v) in floats {
            h[word * 4..word * 4 + 4].copy_from_slice(&v.to_le_bytes());
        }
        h[208..212].copy_from_slice(b"MAP ");
        h[212] = 0x44;
        h[213] = 0x44;
        h
    }

    /// Write as a mode 2 (float32) MRC file.
    pub fn write_mrc(&self, path: &Path) -> Result<(), MrcError> {
        let io_err = |source| MrcError::Io {
            path: path.to_path_buf(),
            source,
        };
        let mut w = BufWriter::new(File::create(path).map_err(io_err)?);
        w.write_all(&self.header()).map_err(io_err)?;
        for v in &self.data {
            w.write_all(&v.to_le_bytes()).map_err(io_err)?;
        }
        w.flush().map_err(io_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(nx: usize, ny: usize, nz: usize) -> Volume {
        let mut v = Volume::new(nx, ny, nz, 1.5);
        for z in 0..nz {
            for y in 0..ny {
                for x in 0..nx {
                    v.set(x, y, z, (x + 10 * y + 100 * z) as f32);
                }
            }
        }
        v
    }

    #[test]
    fn write_then_read_keeps_voxels_and_sampling() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ramp.mrc");
        let v = ramp(4, 3, 2);
        v.write_mrc(&path).unwrap();

        let back = Volume::read_mrc(&path).unwrap();
        assert_eq!(back.dims(), (4, 3, 2));
        assert!((back.sampling_rate - 1.5).abs() < 1e-6);
        assert_eq!(back.get(3, 2, 1), 123.0);
    }

    #[test]
    fn oversized_dimensions_are_rejected() {
        let mut bytes = ramp(2, 2, 1).header();
        for word in 0..3 {
            put_i32(&mut bytes, word, i32::MAX);
        }
        let err = Volume::from_bytes(Path::new("huge.mrc"), &bytes).unwrap_err();
        assert!(matches!(err, MrcError::InvalidDimensions { .. } | MrcError::Truncated { .. }));
    }

    #[test]
    fn reads_int16_mode() {
        let mut bytes = ramp(2, 2, 1).header();
        bytes[12..16].copy_from_slice(&1i32.to_le_bytes());
        for v in [-3i16, 7, 300, -1] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let v = Volume::from_bytes(Path::new("m.mrc"), &bytes).unwrap();
        assert_eq!(v.data, vec![-3.0, 7.0, 300.0, -1.0]);
    }

    #[test]
    fn rejects_truncated_data() {
        let mut bytes = ramp(4, 4, 4).header();
        bytes.extend_from_slice(&[0u8; 16]);
        let err = Volume::from_bytes(Path::new("short.mrc"), &bytes).unwrap_err();
        assert!(matches!(err, MrcError::Truncated { .. }));
    }

    #[test]
    fn rejects_unknown_mode() {
        let mut bytes = ramp(1, 1, 1).header();
        bytes[12..16].copy_from_slice(&4i32.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 8]);
        let err = Volume::from_bytes(Path::new("c.mrc"), &bytes).unwrap_err();
        assert!(matches!(err, MrcError::UnsupportedMode { mode: 4, .. }));
    }

    #[test]
    fn slices_follow_axis_convention() {
        let v = ramp(4, 3, 2);
        let z = v.slice(Axis::Z, 1).unwrap();
        assert_eq!((z.width, z.height), (4, 3));
        assert_eq!(z.get(2, 1), 112.0);

        let x = v.slice(Axis::X, 3).unwrap();
        assert_eq!((x.width, x.height), (3, 2));
        assert_eq!(x.get(2, 1), 123.0);

        assert!(v.slice(Axis::Y, 3).is_none());
    }
}
