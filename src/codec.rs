//! Payload compression.
//!
//! The package pipelines only see the whole-buffer [`Codec`] contract. The
//! shipped [`ZlibCodec`] drives `flate2` as a push/pull stream: input is fed
//! in bounded chunks and output lands in a buffer that doubles when full and
//! is trimmed once at the end.

use flate2::{
    Compress, CompressError, Compression, Decompress, DecompressError, FlushCompress,
    FlushDecompress, Status,
};
use thiserror::Error;

use crate::io::ProgressSink;

/// Input chunk fed to the compression engine per call.
pub const CODEC_CHUNK: usize = 64 * 1024;

/// Errors reported by a [`Codec`].
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("compression backend error: {0}")]
    Compress(#[from] CompressError),

    #[error("decompression backend error: {0}")]
    Backend(#[from] DecompressError),

    /// The engine accepted no input and produced no output.
    #[error("codec stalled")]
    Stalled,

    /// Input ran out before the end of the compressed stream.
    #[error("compressed stream ended early")]
    TruncatedStream,
}

/// Whole-buffer compression contract used by the package pipelines.
pub trait Codec {
    /// Compress `input`, reporting `(consumed, total)` input bytes as it goes.
    fn compress(
        &self,
        input: &[u8],
        progress: &mut dyn ProgressSink,
    ) -> Result<Vec<u8>, CodecError>;

    /// Decompress a buffer produced by [`Codec::compress`].
    fn decompress(&self, input: &[u8]) -> Result<Vec<u8>, CodecError>;
}

/// zlib codec backed by `flate2`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZlibCodec;

impl Codec for ZlibCodec {
    fn compress(
        &self,
        input: &[u8],
        progress: &mut dyn ProgressSink,
    ) -> Result<Vec<u8>, CodecError> {
        let mut engine = Compress::new(Compression::default(), true);
        let mut output = Vec::with_capacity(CODEC_CHUNK);
        let total = input.len() as u64;

        loop {
            let consumed = engine.total_in() as usize;
            let end = (consumed + CODEC_CHUNK).min(input.len());
            let flush = if end == input.len() {
                FlushCompress::Finish
            } else {
                FlushCompress::None
            };

            ensure_spare(&mut output);
            let before = (engine.total_in(), engine.total_out());
            let status = engine.compress_vec(&input[consumed..end], &mut output, flush)?;
            progress.report(engine.total_in(), total);

            if status == Status::StreamEnd {
                break;
            }
            if (engine.total_in(), engine.total_out()) == before {
                return Err(CodecError::Stalled);
            }
        }

        output.shrink_to_fit();
        Ok(output)
    }

    fn decompress(&self, input: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut engine = Decompress::new(true);
        let mut output = Vec::with_capacity(CODEC_CHUNK);

        loop {
            let consumed = engine.total_in() as usize;
            let end = (consumed + CODEC_CHUNK).min(input.len());

            ensure_spare(&mut output);
            let before = (engine.total_in(), engine.total_out());
            let status =
                engine.decompress_vec(&input[consumed..end], &mut output, FlushDecompress::None)?;

            if status == Status::StreamEnd {
                break;
            }
            if (engine.total_in(), engine.total_out()) == before {
                // Output had room, so the engine is waiting for input.
                return Err(if consumed == input.len() {
                    CodecError::TruncatedStream
                } else {
                    CodecError::Stalled
                });
            }
        }

        output.shrink_to_fit();
        Ok(output)
    }
}

/// Make sure `output` has spare capacity, doubling it when full.
fn ensure_spare(output: &mut Vec<u8>) {
    if output.len() == output.capacity() {
        let additional = output.capacity().max(CODEC_CHUNK);
        output.reserve_exact(additional);
    }
}
