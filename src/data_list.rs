use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{DataError, Result};

/// Ordered list of record files backing a dataset.
#[derive(Clone, Debug, Default)]
pub struct DataList {
    paths: Vec<PathBuf>,
}

impl DataList {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }

    /// Collects the regular files directly inside `dir` whose name ends with
    /// `suffix`, sorted by path.
    pub fn scan(dir: impl AsRef<Path>, suffix: &str) -> Result<Self> {
        let dir = dir.as_ref();
        let entries = fs::read_dir(dir).map_err(|err| DataError::from_io(dir, err))?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| DataError::from_io(dir, err))?;
            let path = entry.path();
            let matches = path
                .file_name()
                .and_then(|name| name.to_str())
                .map_or(false, |name| name.ends_with(suffix));
            if path.is_file() && matches {
                paths.push(path);
            }
        }
        paths.sort();

        info!("Found {} records under {}", paths.len(), dir.display());
        Ok(Self { paths })
    }

    /// Drops every path for which `keep` returns false.
    pub fn retain(mut self, keep: impl FnMut(&PathBuf) -> bool) -> Self {
        self.paths.retain(keep);
        self
    }

    pub fn path(&self, index: usize) -> Result<&Path> {
        self.paths
            .get(index)
            .map(PathBuf::as_path)
            .ok_or(DataError::IndexOutOfRange {
                index,
                len: self.paths.len(),
            })
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl From<Vec<PathBuf>> for DataList {
    fn from(paths: Vec<PathBuf>) -> Self {
        Self::new(paths)
    }
}
