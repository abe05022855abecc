use crate::batch::types::WorkItem;
use crate::error::BatchError;
use globset::{GlobBuilder, GlobMatcher};
use ignore::WalkBuilder;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Extensions recognized as input images (matched case-insensitively)
pub const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

/// Directory - turns an input directory into an ordered batch of work items
///
/// Only the top level of the directory is listed. Hidden files and ignore
/// files get no special treatment: every regular file with a recognized
/// extension becomes a work item, ordered by file name.
pub struct Directory {
    matcher: GlobMatcher,
}

impl Directory {
    pub fn new() -> Self {
        let pattern = format!("*.{{{}}}", IMAGE_EXTENSIONS.join(","));
        let matcher = GlobBuilder::new(&pattern)
            .case_insensitive(true)
            .literal_separator(true)
            .build()
            .expect("built-in image extension glob is valid")
            .compile_matcher();
        Self { matcher }
    }

    /// Whether a file name carries a recognized image extension
    pub fn is_image(&self, file_name: &Path) -> bool {
        self.matcher.is_match(file_name)
    }

    /// Collect work items from `dir`
    ///
    /// A directory without matching files yields an empty batch. A directory
    /// that cannot be listed is a whole-batch fault.
    pub fn collect_work_items(&self, dir: &Path) -> Result<Vec<WorkItem>, BatchError> {
        let enumeration_error = |source| BatchError::Enumeration {
            path: dir.to_path_buf(),
            source,
        };

        let root = dir.canonicalize().map_err(enumeration_error)?;
        if !root.is_dir() {
            return Err(enumeration_error(std::io::Error::new(
                std::io::ErrorKind::NotADirectory,
                "not a directory",
            )));
        }

        let walker = WalkBuilder::new(&root)
            .max_depth(Some(1))
            .standard_filters(false)
            .follow_links(true)
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        let mut items = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                // The root itself could not be read
                Err(e) if e.depth().unwrap_or(0) == 0 => {
                    return Err(enumeration_error(into_io_error(e)));
                }
                Err(e) => {
                    tracing::debug!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };

            if entry.depth() == 0 || !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }

            let path = entry.path();
            let Some(file_name) = path.file_name() else {
                continue;
            };
            if !self.is_image(Path::new(file_name)) {
                tracing::trace!("Ignoring non-image file: {}", path.display());
                continue;
            }

            let name = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default();
            items.push(WorkItem::new(path.to_path_buf(), name));
        }

        tracing::debug!("Found {} image(s) in {}", items.len(), root.display());
        Ok(items)
    }
}

impl Default for Directory {
    fn default() -> Self {
        Self::new()
    }
}

/// Reject batches where two items would write into the same output directory
///
/// Names are compared case-insensitively so `A.jpg` and `a.png` collide on
/// case-insensitive filesystems too.
pub fn ensure_unique_names(items: &[WorkItem]) -> Result<(), BatchError> {
    let mut seen: HashMap<String, &PathBuf> = HashMap::with_capacity(items.len());
    for item in items {
        if let Some(first) = seen.insert(item.name.to_lowercase(), &item.source_path) {
            return Err(BatchError::DuplicateName {
                name: item.name.clone(),
                first: first.clone(),
                second: item.source_path.clone(),
            });
        }
    }
    Ok(())
}

fn into_io_error(error: ignore::Error) -> std::io::Error {
    match error.into_io_error() {
        Some(io) => io,
        None => std::io::Error::other("directory walk failed"),
    }
}
