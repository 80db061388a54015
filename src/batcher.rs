use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};
use ndarray::{Array, Array1, Dimension};

use crate::demo_dataset::DemoItem;
use crate::paired_dataset::PairedItem;

/// Stacks demonstrations into a [`DemoBatch`].
///
/// Items in one batch must share frame size and rotation width; only their
/// step counts may differ. A mismatch panics.
#[derive(Clone, Debug)]
pub struct DemoBatcher<B: Backend> {
    device: B::Device,
}

#[derive(Clone, Debug)]
pub struct DemoBatch<B: Backend> {
    /// `[N, T, 3, H, W]`, zero past each demonstration's length.
    pub images: Tensor<B, 5>,
    /// `[N, T, H, W, 3]`
    pub images_orig: Tensor<B, 5>,
    /// `[N, T, action_dim]`
    pub actions: Tensor<B, 3>,
    pub start_positions: Tensor<B, 2>,
    pub start_rotations: Tensor<B, 2>,
    pub end_positions: Tensor<B, 2>,
    pub end_rotations: Tensor<B, 2>,
    pub scenes: Vec<String>,
    pub lengths: Vec<usize>,
}

impl<B: Backend> DemoBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<DemoItem, DemoBatch<B>> for DemoBatcher<B> {
    fn batch(&self, items: Vec<DemoItem>) -> DemoBatch<B> {
        let lengths: Vec<usize> = items.iter().map(DemoItem::len).collect();
        let steps = lengths.iter().copied().max().unwrap_or(0);
        let device = &self.device;
        check_frame_shape("demonstration", items.iter().map(|item| item.images.shape()));

        // demonstrations may be shorter than demo_length; pad them to the longest
        let images = items
            .iter()
            .map(|item| item_tensor::<B, 4, _>(&item.images, steps, device).unsqueeze::<5>())
            .collect();
        let images_orig = items
            .iter()
            .map(|item| item_tensor::<B, 4, _>(&item.images_orig, steps, device).unsqueeze::<5>())
            .collect();
        let actions = items
            .iter()
            .map(|item| item_tensor::<B, 2, _>(&item.actions, steps, device).unsqueeze::<3>())
            .collect();

        DemoBatch {
            images: Tensor::cat(images, 0),
            images_orig: Tensor::cat(images_orig, 0),
            actions: Tensor::cat(actions, 0),
            start_positions: stack_rows(&items, |item| &item.start.position, device),
            start_rotations: stack_rows(&items, |item| &item.start.rotation, device),
            end_positions: stack_rows(&items, |item| &item.end.position, device),
            end_rotations: stack_rows(&items, |item| &item.end.rotation, device),
            scenes: items.iter().map(|item| item.scene.clone()).collect(),
            lengths,
        }
    }
}

/// Stacks paired samples into a [`PairedBatch`].
///
/// Demonstrations in one batch must share frame size. A mismatch panics.
#[derive(Clone, Debug)]
pub struct PairedBatcher<B: Backend> {
    device: B::Device,
}

#[derive(Clone, Debug)]
pub struct PairedBatch<B: Backend> {
    /// `[N, T, 3, H, W]`, zero past each demonstration's length.
    pub demo_images: Tensor<B, 5>,
    /// `[N, T, action_dim]`
    pub demo_actions: Tensor<B, 3>,
    /// `[N, max_follow_length, 3, img_size, img_size]`
    pub follower_images: Tensor<B, 5>,
    /// `[N, max_follow_length]`
    pub follower_labels: Tensor<B, 2>,
    pub demo_lengths: Vec<usize>,
    pub follower_lengths: Vec<usize>,
}

impl<B: Backend> PairedBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<PairedItem, PairedBatch<B>> for PairedBatcher<B> {
    fn batch(&self, items: Vec<PairedItem>) -> PairedBatch<B> {
        let demo_lengths: Vec<usize> = items.iter().map(|item| item.demo_actions.nrows()).collect();
        let steps = demo_lengths.iter().copied().max().unwrap_or(0);
        let device = &self.device;
        check_frame_shape("demonstration", items.iter().map(|item| item.demo_images.shape()));

        let demo_images = items
            .iter()
            .map(|item| item_tensor::<B, 4, _>(&item.demo_images, steps, device).unsqueeze::<5>())
            .collect();
        let demo_actions = items
            .iter()
            .map(|item| item_tensor::<B, 2, _>(&item.demo_actions, steps, device).unsqueeze::<3>())
            .collect();

        // follower tensors already have a fixed length
        let follower_images = items
            .iter()
            .map(|item| {
                let steps = item.follower_images.shape()[0];
                item_tensor::<B, 4, _>(&item.follower_images, steps, device).unsqueeze::<5>()
            })
            .collect();
        let follower_labels = items
            .iter()
            .map(|item| {
                let steps = item.follower_labels.len();
                item_tensor::<B, 1, _>(&item.follower_labels, steps, device).unsqueeze::<2>()
            })
            .collect();

        PairedBatch {
            demo_images: Tensor::cat(demo_images, 0),
            demo_actions: Tensor::cat(demo_actions, 0),
            follower_images: Tensor::cat(follower_images, 0),
            follower_labels: Tensor::cat(follower_labels, 0),
            demo_lengths,
            follower_lengths: items.iter().map(|item| item.follower_length).collect(),
        }
    }
}

/// Panics unless every shape agrees with the first past the step axis.
fn check_frame_shape<'a>(what: &str, shapes: impl IntoIterator<Item = &'a [usize]>) {
    let mut shapes = shapes.into_iter();
    let Some(first) = shapes.next() else {
        return;
    };
    for shape in shapes {
        assert!(
            shape[1..] == first[1..],
            "{what} frames in one batch differ: {:?} vs {:?}",
            &first[1..],
            &shape[1..]
        );
    }
}

/// Stacks one pose vector per item into `[N, len]`.
fn stack_rows<B: Backend>(
    items: &[DemoItem],
    select: impl Fn(&DemoItem) -> &Array1<f32>,
    device: &B::Device,
) -> Tensor<B, 2> {
    if let Some(first) = items.first() {
        let width = select(first).len();
        for item in items {
            let len = select(item).len();
            assert!(
                len == width,
                "pose vectors in one batch differ in width: {width} vs {len} (scene {})",
                item.scene
            );
        }
    }

    let rows = items
        .iter()
        .map(|item| {
            let row = select(item);
            item_tensor::<B, 1, _>(row, row.len(), device).unsqueeze::<2>()
        })
        .collect();
    Tensor::cat(rows, 0)
}

/// Builds a tensor from `array`, zero-padding its first axis out to `steps`.
fn item_tensor<B: Backend, const D: usize, Dim: Dimension>(
    array: &Array<f32, Dim>,
    steps: usize,
    device: &B::Device,
) -> Tensor<B, D> {
    let mut shape = [0; D];
    shape.copy_from_slice(array.shape());
    shape[0] = steps;

    let mut values: Vec<f32> = array.iter().copied().collect();
    values.resize(shape.iter().product(), 0.0);

    let data = Data::new(values, Shape::new(shape));
    Tensor::<B, D>::from_data(data.convert::<B::FloatElem>(), device)
}
