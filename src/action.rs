//! Action label handling.
//!
//! Stored action codes are 1-indexed. Paired (follower/demonstration)
//! recordings additionally use a duplicated range where `6 = forward`,
//! `7 = rotate left` and `8 = rotate right`; [`collapse`] folds those back
//! onto `0, 1, 2`.

use ndarray::Array2;

use crate::error::{DataError, Result};

/// Subtracted from every stored code.
pub const CODE_BASE: i64 = 1;

/// Rebased codes at or above this value belong to the duplicated range.
pub const DUPLICATE_OFFSET: i64 = 5;

/// Label used for padded follower steps; excluded from the loss.
pub const IGNORE_LABEL: f32 = -100.0;

pub fn rebase(code: i64) -> i64 {
    code - CODE_BASE
}

pub fn collapse(code: i64) -> i64 {
    let label = rebase(code);
    if label >= DUPLICATE_OFFSET {
        label - DUPLICATE_OFFSET
    } else {
        label
    }
}

/// Expands stored `codes` to one-hot rows after mapping each through `to_label`.
pub fn one_hot(codes: &[i64], action_dim: usize, to_label: fn(i64) -> i64) -> Result<Array2<f32>> {
    let mut out = Array2::zeros((codes.len(), action_dim));
    for (row, &code) in codes.iter().enumerate() {
        let label = to_label(code);
        let index = usize::try_from(label)
            .ok()
            .filter(|&index| index < action_dim)
            .ok_or(DataError::InvalidActionCode {
                code,
                index: label,
                action_dim,
            })?;
        out[[row, index]] = 1.0;
    }
    Ok(out)
}
