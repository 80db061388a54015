use tracing::error;

use crate::error::{DataError, Result};

/// Adapts a decode result to burn's `Option`-returning `Dataset::get`.
///
/// Only an out-of-range index yields `None`. Any other failure panics so a
/// broken record stops the loader instead of quietly shortening the epoch.
pub(crate) fn escalate<I>(index: usize, sample: Result<I>) -> Option<I> {
    match sample {
        Ok(item) => Some(item),
        Err(DataError::IndexOutOfRange { .. }) => None,
        Err(err) => {
            error!("failed to load sample {index}: {err}");
            panic!("failed to load sample {index}: {err}");
        }
    }
}
