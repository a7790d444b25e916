//! Staged workspaces: a private, disposable copy of the skeleton per request.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use walkdir::WalkDir;

use crate::error::{PipelineError, Result};

/// Names never copied out of the skeleton, wherever they appear in the tree:
/// installed dependencies, build output, VCS metadata, and this service's own
/// directory when the skeleton checkout contains it.
pub const EXCLUDED_NAMES: [&str; 4] = ["node_modules", "dist", ".git", "sitegen-agent"];

/// Subdirectory of the temp root that holds the staged skeleton.
pub const STAGED_DIR_NAME: &str = "skeleton";

/// Prefix for per-request temp roots.
pub const TEMP_PREFIX: &str = "sitegen-";

/// A uniquely named temp root holding one staged skeleton.
///
/// The whole temp root is removed when this value is dropped, whichever way
/// the pipeline exits.
#[derive(Debug)]
pub struct StagedWorkspace {
    root: TempDir,
    staged: PathBuf,
}

impl StagedWorkspace {
    /// Copy `skeleton` into a fresh temp root under `temp_base` (or the OS
    /// temp dir).
    ///
    /// Nothing is created when `skeleton` is not a directory.
    pub fn stage(skeleton: &Path, temp_base: Option<&Path>) -> Result<Self> {
        if !skeleton.is_dir() {
            return Err(PipelineError::InvalidSkeleton(skeleton.to_path_buf()));
        }

        let mut builder = tempfile::Builder::new();
        builder.prefix(TEMP_PREFIX);
        let root = match temp_base {
            Some(base) => builder.tempdir_in(base),
            None => builder.tempdir(),
        }
        .map_err(|e| {
            let base = temp_base.map(Path::to_path_buf).unwrap_or_else(std::env::temp_dir);
            PipelineError::io("failed to create temp workspace", base, e)
        })?;

        let staged = root.path().join(STAGED_DIR_NAME);
        let copied = copy_tree(skeleton, &staged)?;
        tracing::debug!(
            skeleton = %skeleton.display(),
            staged = %staged.display(),
            files = copied,
            "Staged skeleton"
        );

        Ok(Self { root, staged })
    }

    /// The staged skeleton; every build and deploy command runs here.
    pub fn path(&self) -> &Path {
        &self.staged
    }

    /// The temp root that gets deleted on drop.
    pub fn root(&self) -> &Path {
        self.root.path()
    }
}

fn is_excluded(name: &std::ffi::OsStr) -> bool {
    EXCLUDED_NAMES.iter().any(|excluded| name == std::ffi::OsStr::new(excluded))
}

/// Recursively copy `src` into `dest`, skipping [`EXCLUDED_NAMES`].
///
/// Existing directories under `dest` are reused and existing files
/// overwritten, so copying onto a partial earlier copy is fine. Returns the
/// number of files copied.
pub fn copy_tree(src: &Path, dest: &Path) -> Result<usize> {
    let mut files = 0;
    let walker = WalkDir::new(src)
        .follow_links(true)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_excluded(entry.file_name()));

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(src).to_path_buf();
            PipelineError::io("failed to read skeleton", path, e.into())
        })?;
        let Ok(rel) = entry.path().strip_prefix(src) else {
            continue;
        };
        let target = dest.join(rel);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)
                .map_err(|e| PipelineError::io("failed to create staged directory", &target, e))?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| PipelineError::io("failed to create staged directory", parent, e))?;
            }
            std::fs::copy(entry.path(), &target)
                .map_err(|e| PipelineError::io("failed to copy skeleton file", entry.path(), e))?;
            files += 1;
        }
    }
    Ok(files)
}
