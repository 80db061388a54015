use ndarray::Array4;

/// Per-trajectory image preprocessing, applied to `(T, H, W, C)` frames
/// before they are reordered to channel-first.
pub trait ImageTransform: Send + Sync {
    fn apply(&self, frames: Array4<f32>) -> Array4<f32>;
}

impl<F> ImageTransform for F
where
    F: Fn(Array4<f32>) -> Array4<f32> + Send + Sync,
{
    fn apply(&self, frames: Array4<f32>) -> Array4<f32> {
        self(frames)
    }
}

/// `(T, H, W, C)` -> `(T, C, H, W)`, in standard layout.
pub fn to_channel_first(frames: Array4<f32>) -> Array4<f32> {
    frames
        .permuted_axes([0, 3, 1, 2])
        .as_standard_layout()
        .into_owned()
}
