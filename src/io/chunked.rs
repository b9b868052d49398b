//! Bounded-step transfer loops.
//!
//! Every read or write of a payload goes through these helpers so that no
//! single syscall moves more than `step` bytes, and so that progress can be
//! reported between steps. They do not bound memory: the caller owns the
//! whole buffer for the duration of the transfer.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::ProgressSink;
use crate::error::{Error, Result};

/// Largest single read issued while loading payloads (25 MiB).
pub const READ_STEP: usize = 26_214_400;

/// Largest single write issued while storing payloads (25 MiB).
pub const WRITE_STEP: usize = 26_214_400;

/// Fill `buf` from `source` in steps of at most `step` bytes.
///
/// Returns the number of bytes read. This is shorter than `buf.len()` only if
/// the source reached end-of-stream first; the caller decides whether that is
/// an error.
pub async fn read_chunked<R>(
    source: &mut R,
    buf: &mut [u8],
    step: usize,
    progress: &mut dyn ProgressSink,
) -> Result<usize>
where
    R: AsyncRead + Unpin + ?Sized,
{
    if step == 0 {
        return Err(Error::InvalidStep);
    }

    let total = buf.len();
    let mut done = 0;

    while done < total {
        let end = (done + step).min(total);

        // A single read may return fewer bytes than asked; keep going until
        // this step is full or the source runs dry.
        while done < end {
            let n = source.read(&mut buf[done..end]).await?;
            if n == 0 {
                return Ok(done);
            }
            done += n;
        }

        progress.report(done as u64, total as u64);
    }

    Ok(done)
}

/// Write all of `data` to `sink` in steps of at most `step` bytes.
pub async fn write_chunked<W>(
    sink: &mut W,
    data: &[u8],
    step: usize,
    progress: &mut dyn ProgressSink,
) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    if step == 0 {
        return Err(Error::InvalidStep);
    }

    let total = data.len();
    let mut done = 0;

    while done < total {
        let end = (done + step).min(total);
        sink.write_all(&data[done..end]).await?;
        done = end;
        progress.report(done as u64, total as u64);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::NoProgress;
    use std::io::Cursor;

    #[tokio::test]
    async fn read_clips_final_step() {
        let data: Vec<u8> = (0..10u8).collect();
        let mut source = Cursor::new(data.clone());
        let mut buf = vec![0u8; 10];
        let mut reports = Vec::new();

        let n = read_chunked(&mut source, &mut buf, 4, &mut |done: u64, total: u64| {
            reports.push((done, total))
        })
        .await
        .unwrap();

        assert_eq!(n, 10);
        assert_eq!(buf, data);
        assert_eq!(reports, vec![(4, 10), (8, 10), (10, 10)]);
    }

    #[tokio::test]
    async fn read_stops_short_at_end_of_stream() {
        let mut source = Cursor::new(vec![1u8, 2, 3]);
        let mut buf = vec![0u8; 8];

        let n = read_chunked(&mut source, &mut buf, 2, &mut NoProgress)
            .await
            .unwrap();

        assert_eq!(n, 3);
        assert_eq!(&buf[..3], &[1, 2, 3]);
    }

    #[tokio::test]
    async fn write_reports_each_step() {
        let mut sink: Vec<u8> = Vec::new();
        let mut reports = Vec::new();

        write_chunked(&mut sink, b"abcdefg", 3, &mut |done: u64, total: u64| {
            reports.push((done, total))
        })
        .await
        .unwrap();

        assert_eq!(sink, b"abcdefg");
        assert_eq!(reports, vec![(3, 7), (6, 7), (7, 7)]);
    }

    #[tokio::test]
    async fn empty_transfer_reports_nothing() {
        let mut sink: Vec<u8> = Vec::new();
        let mut calls = 0;

        write_chunked(&mut sink, &[], 3, &mut |_: u64, _: u64| calls += 1)
            .await
            .unwrap();

        assert!(sink.is_empty());
        assert_eq!(calls, 0);
    }

    #[tokio::test]
    async fn zero_step_is_rejected() {
        let mut sink: Vec<u8> = Vec::new();
        let err = write_chunked(&mut sink, b"x", 0, &mut NoProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidStep));
    }
}
