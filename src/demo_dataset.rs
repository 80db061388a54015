use std::path::Path;
use std::sync::Arc;

use burn::data::dataset::Dataset;
use ndarray::{Array1, Array2, Array4};
use tracing::debug;

use crate::action::{one_hot, rebase};
use crate::config::HabitatDataConfig;
use crate::data_list::DataList;
use crate::dataset::escalate;
use crate::error::{DataError, Result};
use crate::record::{Pose, TrajectoryRecord};
use crate::transform::{to_channel_first, ImageTransform};

/// One decoded demonstration.
#[derive(Clone, Debug)]
pub struct DemoItem {
    /// Transformed frames, `(T, 3, H, W)`.
    pub images: Array4<f32>,
    /// Frames as stored, `(T, H, W, 3)`, without the transform.
    pub images_orig: Array4<f32>,
    /// One-hot actions, `(T, action_dim)`.
    pub actions: Array2<f32>,
    pub start: Pose,
    pub end: Pose,
    pub scene: String,
}

impl DemoItem {
    pub fn len(&self) -> usize {
        self.actions.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[allow(clippy::type_complexity)]
    pub fn into_parts(
        self,
    ) -> (
        Array4<f32>,
        Array4<f32>,
        Array2<f32>,
        Array1<f32>,
        Array1<f32>,
        Array1<f32>,
        Array1<f32>,
        String,
    ) {
        (
            self.images,
            self.images_orig,
            self.actions,
            self.start.position,
            self.start.rotation,
            self.end.position,
            self.end.rotation,
            self.scene,
        )
    }
}

/// Scene identifier: the file name up to its first underscore.
pub fn scene_name(path: &Path) -> Option<&str> {
    path.file_name()?.to_str()?.split('_').next()
}

#[derive(Clone)]
pub struct DemoSampleDecoder {
    demo_length: usize,
    action_dim: usize,
    transform: Option<Arc<dyn ImageTransform>>,
}

impl DemoSampleDecoder {
    pub fn new(config: &HabitatDataConfig) -> Self {
        Self {
            demo_length: config.demo_length,
            action_dim: config.action_dim,
            transform: None,
        }
    }

    pub fn with_transform(mut self, transform: impl ImageTransform + 'static) -> Self {
        self.transform = Some(Arc::new(transform));
        self
    }

    /// Loads the demonstration at `path`, keeping at most `demo_length` steps.
    /// Shorter demonstrations are returned as they are.
    pub fn decode(&self, path: impl AsRef<Path>) -> Result<DemoItem> {
        let path = path.as_ref();
        let record = TrajectoryRecord::load_truncated(path, self.demo_length)?;
        if record.is_empty() {
            return Err(DataError::malformed(path, "demonstration has no frames"));
        }

        let scene = scene_name(path)
            .ok_or_else(|| DataError::malformed(path, "file name has no scene prefix"))?
            .to_owned();
        let start = record.pose(0)?;
        let end = record.pose(record.len() - 1)?;
        let actions = one_hot(&record.actions, self.action_dim, rebase)?;

        let images_orig = record.images.clone();
        let images = match &self.transform {
            Some(transform) => transform.apply(record.images),
            None => record.images,
        };
        let images = to_channel_first(images);

        debug!(
            "decoded demonstration {} ({} steps, scene {scene})",
            path.display(),
            actions.nrows()
        );

        Ok(DemoItem {
            images,
            images_orig,
            actions,
            start,
            end,
            scene,
        })
    }
}

/// Demonstration records indexed by a [`DataList`].
pub struct DemoDataset {
    data_list: DataList,
    decoder: DemoSampleDecoder,
}

impl DemoDataset {
    pub fn new(config: &HabitatDataConfig, data_list: impl Into<DataList>) -> Self {
        Self {
            data_list: data_list.into(),
            decoder: DemoSampleDecoder::new(config),
        }
    }

    pub fn with_transform(mut self, transform: impl ImageTransform + 'static) -> Self {
        self.decoder = self.decoder.with_transform(transform);
        self
    }

    pub fn try_get(&self, index: usize) -> Result<DemoItem> {
        let path = self.data_list.path(index)?;
        self.decoder.decode(path)
    }
}

impl Dataset<DemoItem> for DemoDataset {
    fn get(&self, index: usize) -> Option<DemoItem> {
        escalate(index, self.try_get(index))
    }

    fn len(&self) -> usize {
        self.data_list.len()
    }
}
