//! # File Listing
//!
//! Resolves a source folder into the flat list of files to convert. The
//! selection itself is a plain predicate over `(path, depth)`, where depth 1
//! is a direct child of the folder.

use std::path::{Path, PathBuf};

use log::debug;
use walkdir::WalkDir;

use crate::BatchError;

/// Predicate selecting the files of a listing.
pub type FileFilter<'a> = dyn Fn(&Path, usize) -> bool + 'a;

/// Lists the files below a folder.
pub trait FileLister {
    fn list(&self, root: &Path, filter: &FileFilter<'_>) -> Result<Vec<PathBuf>, BatchError>;
}

/// [`FileLister`] walking the local filesystem.
///
/// Files are returned sorted by name within each folder. Symbolic links are
/// not followed.
#[derive(Debug, Clone, Copy, Default)]
pub struct WalkDirLister {
    include_subfolders: bool,
}

impl WalkDirLister {
    pub fn new(include_subfolders: bool) -> Self {
        Self { include_subfolders }
    }
}

impl FileLister for WalkDirLister {
    fn list(&self, root: &Path, filter: &FileFilter<'_>) -> Result<Vec<PathBuf>, BatchError> {
        let max_depth = if self.include_subfolders { usize::MAX } else { 1 };
        let mut files = Vec::new();

        for entry in WalkDir::new(root)
            .min_depth(1)
            .max_depth(max_depth)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| BatchError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            if filter(entry.path(), entry.depth()) {
                files.push(entry.into_path());
            } else {
                debug!("Skipping {}", entry.path().display());
            }
        }

        Ok(files)
    }
}
