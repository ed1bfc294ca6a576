//! Flat-file upload store.
//!
//! Stored files live directly under one root directory and are addressed by
//! the client-supplied name appended to that root.

use std::ffi::OsString;
use std::io;
use std::path::{MAIN_SEPARATOR, Path, PathBuf};

use crate::error::TransferError;

#[derive(Debug, Clone)]
pub(crate) struct UploadStore {
    root: OsString,
    strict_file_names: bool,
}

impl UploadStore {
    /// Build a store rooted at `root`.
    ///
    /// The root always ends with a separator so that names are appended, not
    /// spliced onto the last path component.
    pub(crate) fn new(root: &Path, strict_file_names: bool) -> Self {
        let mut root = root.as_os_str().to_os_string();
        if !root.to_string_lossy().ends_with(['/', MAIN_SEPARATOR]) {
            root.push(MAIN_SEPARATOR.to_string());
        }
        Self {
            root,
            strict_file_names,
        }
    }

    pub(crate) fn root(&self) -> &Path {
        Path::new(&self.root)
    }

    /// Create the root directory if it is missing.
    pub(crate) fn ensure_root(&self) -> io::Result<()> {
        std::fs::create_dir_all(self.root())
    }

    /// Map a file name to its on-disk path.
    ///
    /// Without strict naming the name is appended verbatim, so `..` segments
    /// and nested paths resolve wherever the filesystem takes them.
    pub(crate) fn resolve(&self, file_name: &str) -> Result<PathBuf, TransferError> {
        if self.strict_file_names && !is_plain_file_name(file_name) {
            return Err(TransferError::InvalidFileName);
        }
        let mut path = self.root.clone();
        path.push(file_name);
        Ok(PathBuf::from(path))
    }
}

/// A single path component that cannot leave the directory it is joined to.
fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}
