//! Follower trajectories paired with the demonstration they imitate.
//!
//! Follower tensors are fixed to `max_follow_length` steps so trajectories
//! of unequal length batch together: shorter ones are zero-padded with
//! labels set to [`IGNORE_LABEL`], longer ones are truncated. Truncation is
//! intentional and not reported as an error.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use burn::data::dataset::Dataset;
use ndarray::{s, Array1, Array2, Array4, ArrayView1};
use tracing::debug;

use crate::action::{collapse, one_hot, IGNORE_LABEL};
use crate::config::HabitatDataConfig;
use crate::data_list::DataList;
use crate::dataset::escalate;
use crate::error::{DataError, Result};
use crate::record::TrajectoryRecord;
use crate::transform::{to_channel_first, ImageTransform};

/// Replaces the `train`/`valid` segment in a follower path.
pub const COMPANION_MARKER: &str = "DEMON";
pub const RECORD_SUFFIX: &str = ".dat.gz";
pub const COMPANION_SUFFIX: &str = "0.dat.gz";

/// Path of the demonstration recorded for the follower at `follower`.
///
/// `<root>/train/apt_3_2.dat.gz` maps to `<root>/DEMON/apt_3_0.dat.gz`: the
/// mode (`train` if it appears anywhere in the path, `valid` otherwise) is
/// replaced everywhere by [`COMPANION_MARKER`] and the character before
/// [`RECORD_SUFFIX`] is swapped for `0`. Returns `None` if the path is not
/// UTF-8 or has nothing before the suffix.
pub fn companion_path(follower: &Path) -> Option<PathBuf> {
    let name = follower.to_str()?;
    let mode = if name.contains("train") { "train" } else { "valid" };
    let name = name.replace(mode, COMPANION_MARKER);

    let stem = &name[..name.find(RECORD_SUFFIX)?];
    let (cut, _) = stem.char_indices().last()?;
    Some(PathBuf::from(format!("{}{COMPANION_SUFFIX}", &stem[..cut])))
}

#[derive(Clone, Debug)]
pub struct PairedItem {
    /// `(T, 3, H, W)`
    pub demo_images: Array4<f32>,
    /// `(T, action_dim)`
    pub demo_actions: Array2<f32>,
    /// `(max_follow_length, 3, img_size, img_size)`, zero past `follower_length`.
    pub follower_images: Array4<f32>,
    /// `(max_follow_length,)` class labels, [`IGNORE_LABEL`] past `follower_length`.
    pub follower_labels: Array1<f32>,
    pub follower_length: usize,
}

impl PairedItem {
    pub fn into_parts(self) -> (Array4<f32>, Array2<f32>, Array4<f32>, Array1<f32>) {
        (
            self.demo_images,
            self.demo_actions,
            self.follower_images,
            self.follower_labels,
        )
    }
}

#[derive(Clone)]
pub struct PairedSampleDecoder {
    img_size: usize,
    action_dim: usize,
    max_follow_length: usize,
    transform: Option<Arc<dyn ImageTransform>>,
}

impl PairedSampleDecoder {
    pub fn new(config: &HabitatDataConfig) -> Self {
        Self {
            img_size: config.img_size,
            action_dim: config.action_dim,
            max_follow_length: config.max_follow_length,
            transform: None,
        }
    }

    pub fn with_transform(mut self, transform: impl ImageTransform + 'static) -> Self {
        self.transform = Some(Arc::new(transform));
        self
    }

    pub fn decode(&self, path: impl AsRef<Path>) -> Result<PairedItem> {
        let path = path.as_ref();
        let follower = TrajectoryRecord::load(path)?;

        let demo_path = companion_path(path).ok_or_else(|| DataError::CompanionNotFound {
            path: path.to_path_buf(),
        })?;
        let demo = TrajectoryRecord::load(&demo_path).map_err(|err| match err {
            DataError::FileNotFound { path } => DataError::CompanionNotFound { path },
            other => other,
        })?;
        if demo.is_empty() {
            return Err(DataError::malformed(&demo_path, "demonstration has no frames"));
        }

        let follower_steps = follower.len();
        let follower_images = self.prepare(follower.images);
        let demo_images = self.prepare(demo.images);

        // Follower actions stay scalar labels; only the demonstration is one-hot.
        let follower_labels: Vec<f32> = follower
            .actions
            .iter()
            .map(|&code| collapse(code) as f32)
            .collect();
        let demo_actions = one_hot(&demo.actions, self.action_dim, collapse)?;

        let (follower_images, follower_labels, follower_length) =
            self.fix_length(path, follower_images, &follower_labels)?;

        debug!(
            "decoded follower {} ({} of {} steps kept) with demonstration {} ({} steps)",
            path.display(),
            follower_length,
            follower_steps,
            demo_path.display(),
            demo_actions.nrows()
        );

        Ok(PairedItem {
            demo_images,
            demo_actions,
            follower_images,
            follower_labels,
            follower_length,
        })
    }

    fn prepare(&self, images: Array4<f32>) -> Array4<f32> {
        let images = match &self.transform {
            Some(transform) => transform.apply(images),
            None => images,
        };
        to_channel_first(images)
    }

    /// Copies the first `min(T, max_follow_length)` steps into zero/ignore-filled buffers.
    fn fix_length(
        &self,
        path: &Path,
        images: Array4<f32>,
        labels: &[f32],
    ) -> Result<(Array4<f32>, Array1<f32>, usize)> {
        let (steps, channels, height, width) = images.dim();
        let expected = (3, self.img_size, self.img_size);
        if steps > 0 && (channels, height, width) != expected {
            return Err(DataError::malformed(
                path,
                format!("follower frames are {channels}x{height}x{width}, expected {expected:?}"),
            ));
        }

        let length = steps.min(self.max_follow_length);
        if steps > self.max_follow_length {
            debug!(
                "truncating follower {} from {steps} to {length} steps",
                path.display()
            );
        }

        let mut images_out = Array4::zeros((self.max_follow_length, 3, self.img_size, self.img_size));
        let mut labels_out = Array1::from_elem(self.max_follow_length, IGNORE_LABEL);
        if length > 0 {
            images_out
                .slice_mut(s![..length, .., .., ..])
                .assign(&images.slice(s![..length, .., .., ..]));
            labels_out
                .slice_mut(s![..length])
                .assign(&ArrayView1::from(&labels[..length]));
        }

        Ok((images_out, labels_out, length))
    }
}

/// Follower records indexed by a [`DataList`], each decoded with its demonstration.
pub struct PairedDataset {
    data_list: DataList,
    decoder: PairedSampleDecoder,
}

impl PairedDataset {
    pub fn new(config: &HabitatDataConfig, data_list: impl Into<DataList>) -> Self {
        Self {
            data_list: data_list.into(),
            decoder: PairedSampleDecoder::new(config),
        }
    }

    pub fn with_transform(mut self, transform: impl ImageTransform + 'static) -> Self {
        self.decoder = self.decoder.with_transform(transform);
        self
    }

    pub fn try_get(&self, index: usize) -> Result<PairedItem> {
        let path = self.data_list.path(index)?;
        self.decoder.decode(path)
    }
}

impl Dataset<PairedItem> for PairedDataset {
    fn get(&self, index: usize) -> Option<PairedItem> {
        escalate(index, self.try_get(index))
    }

    fn len(&self) -> usize {
        self.data_list.len()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde_json::json;

    use super::*;
    use crate::error::ErrorKind;
    use crate::record::tests::{record_json, write_record};

    const IMG: usize = 2;

    fn config(max_follow_length: usize) -> HabitatDataConfig {
        HabitatDataConfig::new()
            .with_img_size(IMG)
            .with_action_dim(3)
            .with_max_follow_length(max_follow_length)
    }

    /// Writes `<root>/train/apt_1.dat.gz` and its demonstration `<root>/DEMON/apt_0.dat.gz`.
    fn write_pair(root: &Path, follower_actions: &[i64], demo_actions: &[i64]) -> PathBuf {
        fs::create_dir_all(root.join("train")).unwrap();
        fs::create_dir_all(root.join(COMPANION_MARKER)).unwrap();

        let follower = root.join("train").join("apt_1.dat.gz");
        write_record(
            &follower,
            &record_json("rgb", follower_actions.len(), IMG, follower_actions),
        );
        write_record(
            &root.join(COMPANION_MARKER).join("apt_0.dat.gz"),
            &record_json("rgb", demo_actions.len(), IMG, demo_actions),
        );
        follower
    }

    #[test]
    fn companion_for_train_and_valid() {
        assert_eq!(
            companion_path(Path::new("/data/train/apt_3_2.dat.gz")),
            Some(PathBuf::from("/data/DEMON/apt_3_0.dat.gz"))
        );
        assert_eq!(
            companion_path(Path::new("/data/valid/apt_3_7.dat.gz")),
            Some(PathBuf::from("/data/DEMON/apt_3_0.dat.gz"))
        );
        // every occurrence of the mode is replaced
        assert_eq!(
            companion_path(Path::new("train/trainhouse_5.dat.gz")),
            Some(PathBuf::from("DEMON/DEMONhouse_0.dat.gz"))
        );
    }

    #[test]
    fn companion_needs_suffix() {
        assert_eq!(companion_path(Path::new("/data/train/apt_1.json")), None);
        assert_eq!(companion_path(Path::new(".dat.gz")), None);
    }

    #[test]
    fn short_follower_is_padded() {
        let root = tempfile::tempdir().unwrap();
        let actions: Vec<i64> = (0..10).map(|t| 6 + t % 3).collect();
        let follower = write_pair(root.path(), &actions, &[6, 7, 8]);

        let item = PairedSampleDecoder::new(&config(20)).decode(&follower).unwrap();
        assert_eq!(item.follower_images.dim(), (20, 3, IMG, IMG));
        assert_eq!(item.follower_labels.len(), 20);
        assert_eq!(item.follower_length, 10);

        for t in 0..10 {
            assert!(item.follower_images.slice(s![t, .., .., ..]).iter().all(|&v| v == t as f32));
            assert_eq!(item.follower_labels[t], (t % 3) as f32);
        }
        for t in 10..20 {
            assert!(item.follower_images.slice(s![t, .., .., ..]).iter().all(|&v| v == 0.0));
            assert_eq!(item.follower_labels[t], IGNORE_LABEL);
        }
    }

    #[test]
    fn long_follower_is_truncated() {
        let root = tempfile::tempdir().unwrap();
        let follower = write_pair(root.path(), &[1, 2, 3, 1, 2, 3, 1], &[1]);

        let item = PairedSampleDecoder::new(&config(4)).decode(&follower).unwrap();
        assert_eq!(item.follower_images.dim(), (4, 3, IMG, IMG));
        assert_eq!(item.follower_length, 4);
        assert_eq!(item.follower_labels.to_vec(), vec![0.0, 1.0, 2.0, 0.0]);
        assert_eq!(item.follower_images[[3, 2, 1, 1]], 3.0);
    }

    #[test]
    fn exact_length_follower() {
        let root = tempfile::tempdir().unwrap();
        let follower = write_pair(root.path(), &[1, 2, 3], &[1]);

        let item = PairedSampleDecoder::new(&config(3)).decode(&follower).unwrap();
        assert!(item.follower_labels.iter().all(|&label| label != IGNORE_LABEL));
    }

    #[test]
    fn demonstration_is_one_hot() {
        let root = tempfile::tempdir().unwrap();
        let follower = write_pair(root.path(), &[1], &[6, 7, 8, 1]);

        let item = PairedSampleDecoder::new(&config(5)).decode(&follower).unwrap();
        assert_eq!(item.demo_images.dim(), (4, 3, IMG, IMG));
        assert_eq!(item.demo_actions.dim(), (4, 3));
        let hot: Vec<usize> = item
            .demo_actions
            .rows()
            .into_iter()
            .map(|row| row.iter().position(|&v| v == 1.0).unwrap())
            .collect();
        assert_eq!(hot, vec![0, 1, 2, 0]);
    }

    #[test]
    fn transform_applies_to_both_records() {
        let root = tempfile::tempdir().unwrap();
        let follower = write_pair(root.path(), &[1, 1], &[1, 1]);

        let decoder = PairedSampleDecoder::new(&config(3)).with_transform(|frames: Array4<f32>| frames + 1.0);
        let item = decoder.decode(&follower).unwrap();
        assert_eq!(item.follower_images[[1, 0, 0, 0]], 2.0);
        assert_eq!(item.follower_images[[2, 0, 0, 0]], 0.0);
        assert_eq!(item.demo_images[[0, 0, 0, 0]], 1.0);
    }

    #[test]
    fn missing_companion() {
        let root = tempfile::tempdir().unwrap();
        let follower = write_pair(root.path(), &[1], &[1]);
        fs::remove_file(root.path().join(COMPANION_MARKER).join("apt_0.dat.gz")).unwrap();

        let err = PairedSampleDecoder::new(&config(3)).decode(&follower).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CompanionNotFound);
    }

    #[test]
    fn missing_follower() {
        let root = tempfile::tempdir().unwrap();
        let err = PairedSampleDecoder::new(&config(3))
            .decode(root.path().join("train").join("apt_1.dat.gz"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileNotFound);
    }

    #[test]
    fn wrong_follower_frame_size() {
        let root = tempfile::tempdir().unwrap();
        let follower = write_pair(root.path(), &[1, 2], &[1]);

        let err = PairedSampleDecoder::new(&config(3).with_img_size(4))
            .decode(&follower)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedRecord);
    }

    #[test]
    fn invalid_demonstration_code() {
        let root = tempfile::tempdir().unwrap();
        let follower = write_pair(root.path(), &[1], &[4]);

        let err = PairedSampleDecoder::new(&config(3)).decode(&follower).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidActionCode);
    }

    #[test]
    fn empty_follower_is_all_padding() {
        let root = tempfile::tempdir().unwrap();
        let follower = write_pair(root.path(), &[1], &[1]);
        write_record(&follower, &json!({ "rgb": [], "action": [] }));

        let item = PairedSampleDecoder::new(&config(3)).decode(&follower).unwrap();
        assert_eq!(item.follower_length, 0);
        assert!(item.follower_labels.iter().all(|&label| label == IGNORE_LABEL));
    }

    #[test]
    fn empty_demonstration_is_malformed() {
        let root = tempfile::tempdir().unwrap();
        let follower = write_pair(root.path(), &[1], &[]);

        let err = PairedSampleDecoder::new(&config(3)).decode(&follower).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedRecord);
    }

    #[test]
    fn dataset_len_and_get() {
        let root = tempfile::tempdir().unwrap();
        let follower = write_pair(root.path(), &[1, 2], &[1]);

        let dataset = PairedDataset::new(&config(3), vec![follower]);
        assert_eq!(dataset.len(), 1);
        let (_, demo_actions, follower_images, labels) = dataset.get(0).unwrap().into_parts();
        assert_eq!(demo_actions.dim(), (1, 3));
        assert_eq!(follower_images.dim(), (3, 3, IMG, IMG));
        assert_eq!(labels.to_vec(), vec![0.0, 1.0, IGNORE_LABEL]);
        assert!(dataset.get(1).is_none());
    }
}
