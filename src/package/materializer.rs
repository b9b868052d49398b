//! Writing recovered files to disk.

use std::path::{Component, Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::structures::RecoveredDescriptor;
use crate::error::{Error, Result};
use crate::io::{Phase, PhaseSink, Progress, WRITE_STEP, write_chunked};

/// Default output directory, relative to the working directory.
pub const OUTPUT_DIR: &str = "package";

/// Outcome of writing recovered files to disk
#[derive(Debug, Default)]
pub struct MaterializeReport {
    pub written: Vec<PathBuf>,
    /// Files that could not be written, with the reason
    pub failed: Vec<(String, Error)>,
}

/// Writes recovered descriptors out as files.
pub struct Materializer {
    output_dir: PathBuf,
    step: usize,
}

impl Materializer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            step: WRITE_STEP,
        }
    }

    /// Materializer targeting `dir` resolved against the working directory.
    ///
    /// An absolute `dir` is used as is; [`OUTPUT_DIR`] gives `<cwd>/package`.
    pub fn in_current_dir(dir: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(std::env::current_dir()?.join(dir)))
    }

    pub fn with_step(mut self, step: usize) -> Self {
        self.step = step;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write every descriptor as `name + ext` under the output directory.
    ///
    /// Each descriptor is consumed whether or not its write succeeds. A
    /// failure on one file does not stop the rest.
    pub async fn materialize(
        &self,
        descriptors: Vec<RecoveredDescriptor>,
        progress: &mut dyn Progress,
    ) -> Result<MaterializeReport> {
        let mut report = MaterializeReport::default();
        if descriptors.is_empty() {
            return Ok(report);
        }

        fs::create_dir_all(&self.output_dir).await?;

        for mut descriptor in descriptors {
            let file_name = descriptor.file_name();
            match self.write_one(&mut descriptor, &file_name, progress).await {
                Ok(path) => {
                    tracing::debug!("Saved {}", path.display());
                    report.written.push(path);
                }
                Err(e) => {
                    tracing::error!("Could not write {}: {}", file_name, e);
                    report.failed.push((file_name, e));
                }
            }
        }

        Ok(report)
    }

    async fn write_one(
        &self,
        descriptor: &mut RecoveredDescriptor,
        file_name: &str,
        progress: &mut dyn Progress,
    ) -> Result<PathBuf> {
        if !is_plain_file_name(file_name) {
            return Err(Error::UnsafeName(file_name.to_string()));
        }

        let path = self.output_dir.join(file_name);
        let mut file = fs::File::create(&path).await?;
        write_chunked(
            &mut file,
            descriptor.data(),
            self.step,
            &mut PhaseSink::new(progress, Phase::Saving, file_name),
        )
        .await?;
        file.flush().await?;
        descriptor.mark_written();

        Ok(path)
    }
}

/// True if `name` is a single normal path component.
fn is_plain_file_name(name: &str) -> bool {
    if name.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
