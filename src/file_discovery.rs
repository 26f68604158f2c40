use crate::error::{ConvertError, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// Extension of input documents, matched case-insensitively
const INPUT_EXTENSION: &str = "xml";

/// Async input discovery: `*.xml` files directly inside one directory
#[derive(Debug, Clone, Default)]
pub struct FileDiscovery;

impl FileDiscovery {
    pub fn new() -> Self {
        Self
    }

    /// Input documents in `dir`, sorted by path. Subdirectories are not entered.
    pub async fn discover_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let discovery_error = |source| ConvertError::Discovery {
            path: dir.to_path_buf(),
            source,
        };

        let mut files = Vec::new();
        let mut read_dir = fs::read_dir(dir).await.map_err(discovery_error)?;

        while let Some(entry) = read_dir.next_entry().await.map_err(discovery_error)? {
            let path = entry.path();
            if !self.should_process(&path) {
                continue;
            }

            // Follows symlinks, so a linked document is still picked up.
            match fs::metadata(&path).await {
                Ok(metadata) if metadata.is_file() => files.push(path),
                Ok(_) => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable entry");
                }
            }
        }

        files.sort();
        debug!(root = %dir.display(), found = files.len(), "discovered input files");
        Ok(files)
    }

    /// Check if a file should be processed based on its extension (case-insensitive)
    pub fn should_process(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(INPUT_EXTENSION))
    }
}
