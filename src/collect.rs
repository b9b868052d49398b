//! Loading source files into descriptors ahead of packaging.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use tokio::fs;

use crate::error::{Error, Result};
use crate::io::{Phase, PhaseSink, Progress, READ_STEP, read_chunked};
use crate::package::{Descriptor, MAX_TOTAL_SIZE, check_name_fields};

/// Files ready to package, plus the ones that were turned away.
#[derive(Debug, Default)]
pub struct Collection {
    pub descriptors: VecDeque<Descriptor>,
    pub rejected: Vec<(PathBuf, Error)>,
}

/// Reads source files into [`Descriptor`]s.
pub struct Collector {
    limit: u64,
    step: usize,
}

impl Default for Collector {
    fn default() -> Self {
        Self {
            limit: MAX_TOTAL_SIZE,
            step: READ_STEP,
        }
    }
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the largest aggregate size accepted for one run.
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_step(mut self, step: usize) -> Self {
        self.step = step;
        self
    }

    /// Load every path, in order.
    ///
    /// Fails with [`Error::OversizedTotal`] before reading anything if the
    /// files together exceed the limit. Files whose name or extension is too
    /// long, or that cannot be read, are returned in `rejected`.
    pub async fn collect(
        &self,
        paths: &[PathBuf],
        progress: &mut dyn Progress,
    ) -> Result<Collection> {
        let mut total = 0u64;
        for path in paths {
            // Unreadable files surface as rejections below.
            if let Ok(meta) = fs::metadata(path).await {
                total = total.saturating_add(meta.len());
            }
        }
        if total > self.limit {
            tracing::error!(total, limit = self.limit, "Total file size too large to package");
            return Err(Error::OversizedTotal {
                total,
                limit: self.limit,
            });
        }

        tracing::info!("Reading {} file(s)", paths.len());

        let mut collection = Collection::default();
        for path in paths {
            match self.load(path, progress).await {
                Ok(descriptor) => collection.descriptors.push_back(descriptor),
                Err(e) => {
                    tracing::warn!("Not packaging {}: {}", path.display(), e);
                    collection.rejected.push((path.clone(), e));
                }
            }
        }

        Ok(collection)
    }

    async fn load(&self, path: &Path, progress: &mut dyn Progress) -> Result<Descriptor> {
        let (name, ext) = split_file_name(path);
        check_name_fields(&name, &ext)?;

        let mut file = fs::File::open(path).await?;
        let len = file.metadata().await?.len();
        let len = usize::try_from(len).map_err(|_| Error::OversizedTotal {
            total: len,
            limit: usize::MAX as u64,
        })?;

        let file_name = format!("{name}{ext}");
        let mut data = vec![0u8; len];
        let read = read_chunked(
            &mut file,
            &mut data,
            self.step,
            &mut PhaseSink::new(progress, Phase::Reading, &file_name),
        )
        .await?;
        if read < len {
            tracing::warn!("{} shrank while reading ({} of {} bytes)", path.display(), read, len);
            data.truncate(read);
        }

        Descriptor::new(name, ext, data)
    }
}

/// Split a path into its base name and its extension with the leading dot.
///
/// `notes.tar.gz` gives `("notes.tar", ".gz")`; `README` gives `("README", "")`.
pub fn split_file_name(path: &Path) -> (String, String) {
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    (name, ext)
}
