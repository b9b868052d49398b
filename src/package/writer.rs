//! Packaging pipeline.
//!
//! Drains a queue of loaded [`Descriptor`]s front to back: each one is
//! compressed, framed into the package and dropped before the next is
//! touched, so only one file and its compressed counterpart are resident at
//! a time.

use std::collections::VecDeque;
use std::path::Path;

use tokio::fs;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};

use super::entry::write_entry;
use super::structures::{Descriptor, Header, write_header};
use crate::codec::Codec;
use crate::error::{Error, Result};
use crate::io::{Phase, PhaseSink, Progress, WRITE_STEP};

/// Sizes recorded for one packaged file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedEntry {
    pub file_name: String,
    pub raw_size: u64,
    pub compressed_size: u64,
}

/// Summary of a packaging run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackReport {
    pub entries: Vec<PackedEntry>,
    /// Sum of the raw file sizes
    pub data_size: u64,
    /// Sum of the entry framing written ahead of each payload
    pub header_size: u64,
}

impl PackReport {
    pub fn total_size(&self) -> u64 {
        self.data_size + self.header_size
    }

    pub fn compressed_size(&self) -> u64 {
        self.entries.iter().map(|e| e.compressed_size).sum()
    }
}

/// Writes packages with a given [`Codec`].
pub struct PackageWriter<C: Codec> {
    codec: C,
    header: Header,
    step: usize,
}

impl<C: Codec> PackageWriter<C> {
    pub fn new(codec: C) -> Self {
        Self {
            codec,
            header: Header::default(),
            step: WRITE_STEP,
        }
    }

    /// Override the bounded write step used for payloads.
    pub fn with_step(mut self, step: usize) -> Self {
        self.step = step;
        self
    }

    /// Create `path` and package every queued descriptor into it.
    ///
    /// Nothing is written if the file cannot be created.
    pub async fn write_file(
        &self,
        path: &Path,
        queue: VecDeque<Descriptor>,
        progress: &mut dyn Progress,
    ) -> Result<PackReport> {
        let file = fs::File::create(path).await.map_err(|e| {
            tracing::error!("Could not open {} for writing: {}", path.display(), e);
            Error::Io(e)
        })?;

        tracing::info!("Packaging {} file(s) into {}", queue.len(), path.display());

        let mut sink = BufWriter::new(file);
        let report = self.write_to(&mut sink, queue, progress).await?;
        sink.flush().await?;
        sink.into_inner().sync_all().await?;

        tracing::info!(
            data = report.data_size,
            header = report.header_size,
            "Packaging complete"
        );
        Ok(report)
    }

    /// Write the header followed by one entry per queued descriptor.
    pub async fn write_to<W>(
        &self,
        sink: &mut W,
        mut queue: VecDeque<Descriptor>,
        progress: &mut dyn Progress,
    ) -> Result<PackReport>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        write_header(sink, &self.header).await?;

        let mut report = PackReport::default();

        while let Some(mut descriptor) = queue.pop_front() {
            let file_name = descriptor.file_name();
            let raw_size = descriptor.size();

            let compressed = self
                .codec
                .compress(
                    descriptor.data(),
                    &mut PhaseSink::new(progress, Phase::Compressing, &file_name),
                )
                .map_err(|source| Error::CompressFailure {
                    entry: file_name.clone(),
                    source,
                })?;
            descriptor.replace_compressed(compressed);

            write_entry(
                sink,
                &self.header,
                &descriptor,
                self.step,
                &mut PhaseSink::new(progress, Phase::Writing, &file_name),
            )
            .await?;
            descriptor.mark_written();

            tracing::debug!(
                file = %file_name,
                raw = raw_size,
                compressed = descriptor.size(),
                "Packed entry"
            );

            report.data_size += raw_size;
            report.header_size += self.header.entry_overhead() as u64;
            report.entries.push(PackedEntry {
                file_name,
                raw_size,
                compressed_size: descriptor.size(),
            });
        }

        Ok(report)
    }
}
