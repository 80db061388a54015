use std::fs;
use std::path::{Path, PathBuf};

use image::RgbImage;
use ndarray::{s, Array4};
use tracing::info;

use crate::error::{DataError, Result};

/// Writes each `(H, W, 3)` frame of `frames` to `<dir>/<prefix>_<t>.png`.
///
/// Values are rounded and clamped to `0..=255`, so pass frames as stored
/// (e.g. `DemoItem::images_orig`) rather than normalized ones.
pub fn export_frames(frames: &Array4<f32>, dir: impl AsRef<Path>, prefix: &str) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let (steps, height, width, channels) = frames.dim();
    if channels != 3 {
        return Err(DataError::malformed(
            dir,
            format!("expected RGB frames, got {channels} channels"),
        ));
    }
    let (Ok(image_width), Ok(image_height)) = (u32::try_from(width), u32::try_from(height)) else {
        return Err(DataError::malformed(
            dir,
            format!("{height}x{width} frames are too large to export"),
        ));
    };
    fs::create_dir_all(dir).map_err(|err| DataError::from_io(dir, err))?;

    let mut written = Vec::with_capacity(steps);
    for t in 0..steps {
        let pixels: Vec<u8> = frames
            .slice(s![t, .., .., ..])
            .iter()
            .map(|&value| value.round().clamp(0.0, 255.0) as u8)
            .collect();
        let path = dir.join(format!("{prefix}_{t}.png"));
        let image = RgbImage::from_raw(image_width, image_height, pixels)
            .ok_or_else(|| DataError::malformed(&path, "frame buffer does not match its size"))?;
        image
            .save(&path)
            .map_err(|source| DataError::Export {
                path: path.clone(),
                source,
            })?;
        written.push(path);
    }

    info!("Exported {} frames to {}", written.len(), dir.display());
    Ok(written)
}
