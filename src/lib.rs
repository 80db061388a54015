pub mod action;
pub mod batcher;
pub mod config;
pub mod data_list;
mod dataset;
pub mod demo_dataset;
pub mod error;
pub mod frames;
pub mod paired_dataset;
pub mod record;
pub mod transform;

pub use error::{DataError, ErrorKind, Result};
