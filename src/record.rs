//! On-disk trajectory records.
//!
//! A record is a JSON object with `image` (or `rgb`), `position`,
//! `rotation` and `action` fields, optionally gzip-compressed when the
//! file name ends in `.gz`. Records are validated into a [`TrajectoryRecord`]
//! once, so decoders never look fields up by name.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use ndarray::{Array1, Array2, Array4, ArrayView1};
use serde::Deserialize;

use crate::error::{DataError, Result};

/// A recorded frame, `[H][W][3]`.
pub type Frame = Vec<Vec<[f32; 3]>>;

#[derive(Clone, Debug, Deserialize)]
pub struct RawTrajectory {
    #[serde(alias = "rgb")]
    pub image: Vec<Frame>,
    #[serde(default)]
    pub position: Vec<[f32; 3]>,
    #[serde(default)]
    pub rotation: Vec<Vec<f32>>,
    pub action: Vec<i64>,
}

impl RawTrajectory {
    /// Keeps at most the first `len` steps of every sequence.
    pub fn truncate(&mut self, len: usize) {
        self.image.truncate(len);
        self.position.truncate(len);
        self.rotation.truncate(len);
        self.action.truncate(len);
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Pose {
    pub position: Array1<f32>,
    pub rotation: Array1<f32>,
}

/// A validated trajectory. `images` is `(T, H, W, 3)`.
#[derive(Clone, Debug)]
pub struct TrajectoryRecord {
    pub path: PathBuf,
    pub images: Array4<f32>,
    pub positions: Option<Array2<f32>>,
    pub rotations: Option<Array2<f32>>,
    pub actions: Vec<i64>,
}

impl TrajectoryRecord {
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Reads and validates the record at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_truncated(path, usize::MAX)
    }

    /// Reads the record at `path`, keeping only the first `len` steps.
    pub fn load_truncated(path: impl AsRef<Path>, len: usize) -> Result<Self> {
        let path = path.as_ref();
        let mut raw = read_raw(path)?;
        raw.truncate(len);
        Self::from_raw(path, raw)
    }

    pub fn from_raw(path: impl Into<PathBuf>, raw: RawTrajectory) -> Result<Self> {
        let path = path.into();
        let steps = raw.image.len();

        if raw.action.len() != steps {
            return Err(DataError::malformed(
                path,
                format!("{} actions for {} frames", raw.action.len(), steps),
            ));
        }

        let images = stack_frames(&path, raw.image)?;
        let positions = if raw.position.is_empty() {
            None
        } else {
            let rows: Vec<Vec<f32>> = raw.position.iter().map(|p| p.to_vec()).collect();
            Some(stack_rows(&path, "position", rows, steps)?)
        };
        let rotations = if raw.rotation.is_empty() {
            None
        } else {
            Some(stack_rows(&path, "rotation", raw.rotation, steps)?)
        };

        Ok(Self {
            path,
            images,
            positions,
            rotations,
            actions: raw.action,
        })
    }

    /// Pose at step `index`; fails if the record carries no poses.
    pub fn pose(&self, index: usize) -> Result<Pose> {
        let (positions, rotations) = match (&self.positions, &self.rotations) {
            (Some(positions), Some(rotations)) => (positions, rotations),
            _ => return Err(DataError::malformed(&self.path, "record has no poses")),
        };
        if index >= self.len() {
            return Err(DataError::malformed(
                &self.path,
                format!("no pose at step {index} of {}", self.len()),
            ));
        }
        Ok(Pose {
            position: row(positions, index),
            rotation: row(rotations, index),
        })
    }
}

fn row(array: &Array2<f32>, index: usize) -> Array1<f32> {
    let view: ArrayView1<f32> = array.row(index);
    view.to_owned()
}

/// Reads the raw record, inflating it first when the name ends in `.gz`.
pub fn read_raw(path: &Path) -> Result<RawTrajectory> {
    let file = File::open(path).map_err(|err| DataError::from_io(path, err))?;
    let reader: Box<dyn Read> = if is_gzip(path) {
        Box::new(GzDecoder::new(BufReader::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };
    serde_json::from_reader(reader).map_err(|err| {
        if err.is_io() {
            DataError::Io {
                path: path.to_path_buf(),
                source: err.into(),
            }
        } else {
            DataError::malformed(path, err.to_string())
        }
    })
}

fn is_gzip(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == "gz")
}

fn stack_frames(path: &Path, frames: Vec<Frame>) -> Result<Array4<f32>> {
    let steps = frames.len();
    let height = frames.first().map_or(0, |frame| frame.len());
    let width = frames
        .first()
        .and_then(|frame| frame.first())
        .map_or(0, |line| line.len());

    let mut values = Vec::with_capacity(steps * height * width * 3);
    for (t, frame) in frames.into_iter().enumerate() {
        if frame.len() != height || frame.iter().any(|line| line.len() != width) {
            return Err(DataError::malformed(
                path,
                format!("frame {t} does not match the {height}x{width} shape of frame 0"),
            ));
        }
        for line in frame {
            for pixel in line {
                values.extend_from_slice(&pixel);
            }
        }
    }

    Array4::from_shape_vec((steps, height, width, 3), values)
        .map_err(|err| DataError::malformed(path, err.to_string()))
}

fn stack_rows(path: &Path, field: &str, rows: Vec<Vec<f32>>, steps: usize) -> Result<Array2<f32>> {
    if rows.len() != steps {
        return Err(DataError::malformed(
            path,
            format!("{} {field} entries for {steps} frames", rows.len()),
        ));
    }
    let width = rows.first().map_or(0, |r| r.len());
    if rows.iter().any(|r| r.len() != width) {
        return Err(DataError::malformed(path, format!("ragged {field} rows")));
    }
    let values = rows.into_iter().flatten().collect();
    Array2::from_shape_vec((steps, width), values)
        .map_err(|err| DataError::malformed(path, err.to_string()))
}
