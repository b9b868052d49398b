//! Unpackaging pipeline.
//!
//! Parses the header, then reads entries until the terminator, decompressing
//! each payload in place. Field widths always come from the package's own
//! header, never from this build's constants.

use std::path::Path;

use tokio::fs;
use tokio::io::{AsyncRead, BufReader};

use super::entry::{EntryRead, read_entry};
use super::structures::{Header, MAX_TOTAL_SIZE, RecoveredDescriptor, read_header};
use crate::codec::Codec;
use crate::error::{Error, Result};
use crate::io::{Phase, Progress, ProgressEvent, READ_STEP};

/// Reads packages with a given [`Codec`].
pub struct PackageReader<C: Codec> {
    codec: C,
    step: usize,
    limit: u64,
}

impl<C: Codec> PackageReader<C> {
    pub fn new(codec: C) -> Self {
        Self {
            codec,
            step: READ_STEP,
            limit: MAX_TOTAL_SIZE,
        }
    }

    /// Override the bounded read step used for payloads.
    pub fn with_step(mut self, step: usize) -> Self {
        self.step = step;
        self
    }

    /// Override the largest package size this reader accepts.
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    /// Open `path` and recover every file it contains.
    pub async fn read_file(
        &self,
        path: &Path,
        progress: &mut dyn Progress,
    ) -> Result<Vec<RecoveredDescriptor>> {
        let file = fs::File::open(path).await.map_err(|e| {
            tracing::error!("Could not open package {} for reading: {}", path.display(), e);
            Error::Io(e)
        })?;

        let len = file.metadata().await?.len();
        if len > self.limit {
            return Err(Error::OversizedTotal {
                total: len,
                limit: self.limit,
            });
        }

        tracing::info!("Reading package {} ({} bytes)", path.display(), len);

        let mut source = BufReader::new(file);
        let recovered = self.read_from(&mut source, Some(len), progress).await?;

        tracing::info!(
            "Recovered {} file(s) from {}",
            recovered.len(),
            path.display()
        );
        Ok(recovered)
    }

    /// Recover every file from a package stream.
    ///
    /// `len` is the total stream length, when known. On any error the files
    /// recovered so far are dropped with it.
    pub async fn read_from<R>(
        &self,
        source: &mut R,
        len: Option<u64>,
        progress: &mut dyn Progress,
    ) -> Result<Vec<RecoveredDescriptor>>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let Some(header) = read_header(source).await? else {
            tracing::debug!("Package ends before its header, no entries");
            return Ok(Vec::new());
        };

        let mut consumed = Header::SIZE as u64;
        let mut recovered = Vec::new();

        loop {
            let remaining = len.map(|len| len.saturating_sub(consumed));
            let read = read_entry(
                source,
                &header,
                remaining,
                self.limit,
                self.step,
                progress,
            )
            .await?;
            let EntryRead::Entry(mut entry) = read else {
                break;
            };
            consumed += header.entry_overhead() as u64 + entry.size();

            let file_name = entry.file_name();
            let packed_size = entry.size();

            let contents = self.codec.decompress(entry.data()).map_err(|source| {
                tracing::error!("Decompression failed for {}: {}", file_name, source);
                Error::DecompressFailure {
                    entry: file_name.clone(),
                    source,
                }
            })?;
            entry.replace_decompressed(contents);

            progress.update(&ProgressEvent {
                phase: Phase::Decompressing,
                file: &file_name,
                completed: entry.size(),
                total: entry.size(),
            });
            tracing::debug!(
                file = %file_name,
                packed = packed_size,
                size = entry.size(),
                "Recovered entry"
            );

            recovered.push(entry);
        }

        Ok(recovered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ZlibCodec;
    use crate::io::NoProgress;
    use crate::package::structures::{Descriptor, RecoveredStage};
    use crate::package::writer::PackageWriter;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use std::io::Cursor;

    async fn package(files: &[(&str, &str, &str)]) -> Vec<u8> {
        let queue: VecDeque<_> = files
            .iter()
            .map(|(name, ext, data)| {
                Descriptor::new(*name, *ext, data.as_bytes().to_vec()).unwrap()
            })
            .collect();
        let mut sink: Vec<u8> = Vec::new();
        PackageWriter::new(ZlibCodec)
            .write_to(&mut sink, queue, &mut NoProgress)
            .await
            .unwrap();
        sink
    }

    #[tokio::test]
    async fn recovers_files_in_order() {
        let bytes = package(&[("c", ".txt", "third but first"), ("a", "", "alpha"), ("b", ".md", "")])
            .await;
        let len = bytes.len() as u64;

        let recovered = PackageReader::new(ZlibCodec)
            .read_from(&mut Cursor::new(bytes), Some(len), &mut NoProgress)
            .await
            .unwrap();

        let files: Vec<_> = recovered
            .iter()
            .map(|d| (d.file_name(), String::from_utf8(d.data().to_vec()).unwrap()))
            .collect();
        assert_eq!(
            files,
            vec![
                ("c.txt".to_string(), "third but first".to_string()),
                ("a".to_string(), "alpha".to_string()),
                ("b.md".to_string(), String::new()),
            ]
        );
        assert!(
            recovered
                .iter()
                .all(|d| d.stage() == RecoveredStage::Decompressed)
        );
    }

    #[tokio::test]
    async fn header_only_package_is_empty() {
        let bytes = package(&[]).await;
        assert_eq!(bytes.len(), Header::SIZE);

        let recovered = PackageReader::new(ZlibCodec)
            .read_from(&mut Cursor::new(bytes), None, &mut NoProgress)
            .await
            .unwrap();
        assert!(recovered.is_empty());
    }

    #[tokio::test]
    async fn empty_stream_is_empty_package() {
        let recovered = PackageReader::new(ZlibCodec)
            .read_from(&mut Cursor::new(Vec::<u8>::new()), Some(0), &mut NoProgress)
            .await
            .unwrap();
        assert!(recovered.is_empty());
    }

    #[tokio::test]
    async fn version_mismatch_recovers_nothing() {
        let mut bytes = package(&[("a", ".txt", "hello")]).await;
        bytes[0..4].copy_from_slice(b"2\0\0\0");

        let err = PackageReader::new(ZlibCodec)
            .read_from(&mut Cursor::new(bytes), None, &mut NoProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::IncompatibleVersion { .. }));
    }

    #[tokio::test]
    async fn corrupt_payload_discards_package() {
        let mut bytes = package(&[("a", ".txt", "hello"), ("b", ".txt", "world")]).await;
        let first = ZlibCodec.compress(b"hello", &mut NoProgress).unwrap().len();
        let overhead = Header::default().entry_overhead();
        // Clobber the zlib header byte of the second payload.
        bytes[Header::SIZE + overhead + first + overhead] = 0xff;

        let err = PackageReader::new(ZlibCodec)
            .read_from(&mut Cursor::new(bytes), None, &mut NoProgress)
            .await
            .unwrap_err();
        match err {
            Error::DecompressFailure { entry, .. } => assert_eq!(entry, "b.txt"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn honours_wider_fields_from_header() {
        let header = Header {
            name_width: 300,
            ext_width: 50,
            size_width: 20,
            ..Header::default()
        };
        let payload = ZlibCodec.compress(b"wide", &mut NoProgress).unwrap();

        let mut bytes = header.to_bytes().unwrap().to_vec();
        let mut framing = vec![0u8; header.entry_overhead()];
        let name = "n".repeat(200);
        framing[..200].copy_from_slice(name.as_bytes());
        framing[300..304].copy_from_slice(b".dat");
        let size = payload.len().to_string();
        framing[350..350 + size.len()].copy_from_slice(size.as_bytes());
        bytes.extend_from_slice(&framing);
        bytes.extend_from_slice(&payload);

        let recovered = PackageReader::new(ZlibCodec)
            .read_from(&mut Cursor::new(bytes), None, &mut NoProgress)
            .await
            .unwrap();

        assert_eq!(recovered.len(), 1);
        assert_eq!(recovered[0].name, name);
        assert_eq!(recovered[0].ext, ".dat");
        assert_eq!(recovered[0].data(), b"wide");
    }

    fn package_declaring(size: &str) -> Vec<u8> {
        let header = Header::default();
        let mut bytes = header.to_bytes().unwrap().to_vec();
        let mut framing = vec![0u8; header.entry_overhead()];
        framing[..1].copy_from_slice(b"a");
        framing[128..132].copy_from_slice(b".bin");
        framing[160..160 + size.len()].copy_from_slice(size.as_bytes());
        bytes.extend_from_slice(&framing);
        bytes.extend_from_slice(b"tiny");
        bytes
    }

    #[tokio::test]
    async fn huge_declared_size_is_an_error_without_known_length() {
        let bytes = package_declaring(&u64::MAX.to_string());

        let err = PackageReader::new(ZlibCodec)
            .read_from(&mut Cursor::new(bytes), None, &mut NoProgress)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::OversizedTotal {
                total: u64::MAX,
                limit: MAX_TOTAL_SIZE
            }
        ));
    }

    #[tokio::test]
    async fn declared_size_above_reader_limit_is_refused() {
        let bytes = package_declaring("1000");

        let err = PackageReader::new(ZlibCodec)
            .with_limit(100)
            .read_from(&mut Cursor::new(bytes), None, &mut NoProgress)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::OversizedTotal {
                total: 1000,
                limit: 100
            }
        ));
    }

    #[tokio::test]
    async fn oversized_package_is_refused_before_reading() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("package.bin");
        tokio::fs::write(&path, package(&[("a", ".txt", "hello")]).await)
            .await
            .unwrap();

        let err = PackageReader::new(ZlibCodec)
            .with_limit(16)
            .read_file(&path, &mut NoProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::OversizedTotal { limit: 16, .. }));
    }
}
