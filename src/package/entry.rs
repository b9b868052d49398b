//! Framing for a single package entry.
//!
//! An entry is `name[name_width] ext[ext_width] size[size_width] payload[size]`
//! with the widths taken from the package [`Header`]. There is no entry count:
//! a size field that is empty or not a number marks the end of the package,
//! and so does end of file while reading the fixed fields.

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use super::structures::{
    Descriptor, Header, RecoveredDescriptor, decode_text, encode_decimal, encode_text,
    parse_decimal,
};
use crate::error::{Error, Result};
use crate::io::{
    NoProgress, Phase, PhaseSink, Progress, ProgressSink, read_chunked, write_chunked,
};

/// Result of reading one entry's framing.
#[derive(Debug)]
pub enum EntryRead {
    /// A complete entry; payload is still compressed.
    Entry(RecoveredDescriptor),
    /// The package has no more entries.
    End,
}

/// Write one entry. `descriptor` must already hold its compressed payload.
pub async fn write_entry<W>(
    sink: &mut W,
    header: &Header,
    descriptor: &Descriptor,
    step: usize,
    progress: &mut dyn ProgressSink,
) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut framing = vec![0u8; header.entry_overhead()];
    let (name, rest) = framing.split_at_mut(header.name_width);
    let (ext, size) = rest.split_at_mut(header.ext_width);

    encode_text("name", descriptor.name(), name)?;
    encode_text("ext", descriptor.ext(), ext)?;
    encode_decimal("size", descriptor.size(), size)?;

    sink.write_all(&framing).await?;
    write_chunked(sink, descriptor.data(), step, progress).await
}

/// Read the next entry, or detect the end of the package.
///
/// `remaining` is the number of bytes left in the package after the fixed
/// fields, when known; a declared size beyond it fails before any
/// allocation. A declared size above `limit` fails with
/// [`Error::OversizedTotal`], whether or not `remaining` is known.
pub async fn read_entry<R>(
    source: &mut R,
    header: &Header,
    remaining: Option<u64>,
    limit: u64,
    step: usize,
    progress: &mut dyn Progress,
) -> Result<EntryRead>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let overhead = header.entry_overhead();
    let mut framing = vec![0u8; overhead];
    let n = read_chunked(source, &mut framing, overhead, &mut NoProgress).await?;
    if n < overhead {
        if n > 0 {
            tracing::debug!(bytes = n, "package ends inside entry framing");
        }
        return Ok(EntryRead::End);
    }

    let (name, rest) = framing.split_at(header.name_width);
    let (ext, size) = rest.split_at(header.ext_width);
    let name = decode_text(name);
    let ext = decode_text(ext);

    let size = match parse_decimal(size) {
        Ok(Some(size)) => size,
        Ok(None) => return Ok(EntryRead::End),
        Err(value) => {
            tracing::warn!(%value, "non-numeric size field, treating as end of package");
            return Ok(EntryRead::End);
        }
    };

    let entry = format!("{name}{ext}");
    if size > limit {
        tracing::error!(entry = %entry, size, limit, "Entry size exceeds the limit");
        return Err(Error::OversizedTotal { total: size, limit });
    }
    if let Some(remaining) = remaining.map(|r| r.saturating_sub(overhead as u64)) {
        if size > remaining {
            return Err(Error::Truncated {
                entry,
                expected: size,
                found: remaining,
            });
        }
    }

    let oversized = || Error::OversizedTotal { total: size, limit };
    let len = usize::try_from(size).map_err(|_| oversized())?;
    let mut payload = Vec::new();
    payload.try_reserve_exact(len).map_err(|_| oversized())?;
    payload.resize(len, 0);
    let read = read_chunked(
        source,
        &mut payload,
        step,
        &mut PhaseSink::new(progress, Phase::Unpacking, &entry),
    )
    .await?;
    if read < len {
        return Err(Error::Truncated {
            entry,
            expected: size,
            found: read as u64,
        });
    }

    Ok(EntryRead::Entry(RecoveredDescriptor::new(name, ext, payload)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::structures::{MAX_TOTAL_SIZE, RecoveredStage, write_header};
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn compressed(name: &str, ext: &str, payload: &[u8]) -> Descriptor {
        let mut descriptor = Descriptor::new(name, ext, Vec::new()).unwrap();
        descriptor.replace_compressed(payload.to_vec());
        descriptor
    }

    #[tokio::test]
    async fn entry_layout_uses_header_widths() {
        let header = Header {
            name_width: 8,
            ext_width: 6,
            size_width: 4,
            ..Header::default()
        };
        let mut sink: Vec<u8> = Vec::new();

        write_entry(&mut sink, &header, &compressed("ab", ".c", b"xyz"), 2, &mut NoProgress)
            .await
            .unwrap();

        assert_eq!(sink, b"ab\0\0\0\0\0\0.c\0\0\0\x003\0\0\0xyz".to_vec());
    }

    #[tokio::test]
    async fn reads_back_written_entries() {
        let header = Header::default();
        let mut sink: Vec<u8> = Vec::new();
        write_entry(&mut sink, &header, &compressed("one", ".txt", b"111"), 64, &mut NoProgress)
            .await
            .unwrap();
        write_entry(&mut sink, &header, &compressed("two", "", b"22"), 64, &mut NoProgress)
            .await
            .unwrap();

        let mut source = Cursor::new(sink);
        let mut names = Vec::new();
        while let EntryRead::Entry(entry) =
            read_entry(&mut source, &header, None, MAX_TOTAL_SIZE, 64, &mut NoProgress)
                .await
                .unwrap()
        {
            assert_eq!(entry.stage(), RecoveredStage::Read);
            names.push((entry.file_name(), entry.data().to_vec()));
        }

        assert_eq!(
            names,
            vec![
                ("one.txt".to_string(), b"111".to_vec()),
                ("two".to_string(), b"22".to_vec()),
            ]
        );
    }

    #[tokio::test]
    async fn empty_size_field_ends_package() {
        let header = Header::default();
        let mut source = Cursor::new(vec![0u8; header.entry_overhead()]);

        let read = read_entry(&mut source, &header, None, MAX_TOTAL_SIZE, 64, &mut NoProgress)
            .await
            .unwrap();
        assert!(matches!(read, EntryRead::End));
    }

    #[tokio::test]
    async fn non_numeric_size_field_ends_package() {
        let header = Header::default();
        let mut framing = vec![0u8; header.entry_overhead()];
        framing[..1].copy_from_slice(b"x");
        framing[160..163].copy_from_slice(b"zzz");

        let read = read_entry(
            &mut Cursor::new(framing),
            &header,
            None,
            MAX_TOTAL_SIZE,
            64,
            &mut NoProgress,
        )
        .await
        .unwrap();
        assert!(matches!(read, EntryRead::End));
    }

    #[tokio::test]
    async fn end_of_file_inside_framing_ends_package() {
        let header = Header::default();
        let mut source = Cursor::new(b"partial".to_vec());

        let read = read_entry(&mut source, &header, None, MAX_TOTAL_SIZE, 64, &mut NoProgress)
            .await
            .unwrap();
        assert!(matches!(read, EntryRead::End));
    }

    #[tokio::test]
    async fn short_payload_is_truncated() {
        let header = Header::default();
        let mut sink: Vec<u8> = Vec::new();
        write_entry(&mut sink, &header, &compressed("a", ".b", b"123456"), 64, &mut NoProgress)
            .await
            .unwrap();
        sink.truncate(sink.len() - 2);

        let err = read_entry(
            &mut Cursor::new(sink),
            &header,
            None,
            MAX_TOTAL_SIZE,
            64,
            &mut NoProgress,
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Truncated {
                expected: 6,
                found: 4,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn declared_size_beyond_remaining_fails_early() {
        let header = Header::default();
        let mut sink: Vec<u8> = Vec::new();
        write_entry(&mut sink, &header, &compressed("a", ".b", b"123456"), 64, &mut NoProgress)
            .await
            .unwrap();
        let remaining = sink.len() as u64 - 3;

        let err = read_entry(
            &mut Cursor::new(sink),
            &header,
            Some(remaining),
            MAX_TOTAL_SIZE,
            64,
            &mut NoProgress,
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Truncated {
                expected: 6,
                found: 3,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn declared_size_above_limit_fails_before_allocating() {
        let header = Header::default();
        let mut sink: Vec<u8> = Vec::new();
        write_entry(&mut sink, &header, &compressed("a", ".b", b"123456"), 64, &mut NoProgress)
            .await
            .unwrap();

        let err = read_entry(&mut Cursor::new(sink), &header, None, 5, 64, &mut NoProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::OversizedTotal { total: 6, limit: 5 }));
    }

    #[tokio::test]
    async fn header_then_entries_in_one_stream() {
        let header = Header::default();
        let mut sink: Vec<u8> = Vec::new();
        write_header(&mut sink, &header).await.unwrap();
        write_entry(&mut sink, &header, &compressed("a", ".txt", b"p"), 64, &mut NoProgress)
            .await
            .unwrap();

        assert_eq!(sink.len(), Header::SIZE + header.entry_overhead() + 1);
        assert_eq!(&sink[..4], b"1\0\0\0");
        assert_eq!(&sink[Header::SIZE..Header::SIZE + 1], b"a");
    }
}
