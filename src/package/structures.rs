use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};
use crate::io::{NoProgress, read_chunked};

/// Format version written by, and the only version accepted by, this build.
pub const MAJOR_VERSION: u32 = 1;
pub const MINOR_VERSION: u32 = 1;

/// Entry name field width; names must be strictly shorter.
pub const NAME_LIMIT: usize = 128;
/// Entry extension field width; extensions must be strictly shorter.
pub const EXT_LIMIT: usize = 32;
/// Entry size field width.
pub const SIZE_LIMIT: usize = 32;

/// Largest field width accepted from a package header.
pub const MAX_FIELD_WIDTH: usize = 4096;

/// Width of each version field in the header.
const VERSION_WIDTH: usize = 4;
/// Width of each field-width field in the header.
const WIDTH_WIDTH: usize = 8;

/// Largest aggregate payload this build will package or unpackage.
#[cfg(target_pointer_width = "32")]
pub const MAX_TOTAL_SIZE: u64 = 2_140_000_000;
#[cfg(not(target_pointer_width = "32"))]
pub const MAX_TOTAL_SIZE: u64 = i64::MAX as u64;

/// Package header - 32 bytes of decimal ASCII
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub major_version: u32,
    pub minor_version: u32,
    pub name_width: usize,
    pub ext_width: usize,
    pub size_width: usize,
}

impl Default for Header {
    fn default() -> Self {
        Self {
            major_version: MAJOR_VERSION,
            minor_version: MINOR_VERSION,
            name_width: NAME_LIMIT,
            ext_width: EXT_LIMIT,
            size_width: SIZE_LIMIT,
        }
    }
}

impl Header {
    pub const SIZE: usize = 2 * VERSION_WIDTH + 3 * WIDTH_WIDTH;

    /// Encode the header into its on-disk form.
    pub fn to_bytes(&self) -> Result<[u8; Self::SIZE]> {
        let mut buf = [0u8; Self::SIZE];
        let mut at = 0;

        for (field, value, width) in [
            ("major version", self.major_version as u64, VERSION_WIDTH),
            ("minor version", self.minor_version as u64, VERSION_WIDTH),
            ("name width", self.name_width as u64, WIDTH_WIDTH),
            ("ext width", self.ext_width as u64, WIDTH_WIDTH),
            ("size width", self.size_width as u64, WIDTH_WIDTH),
        ] {
            encode_decimal(field, value, &mut buf[at..at + width])?;
            at += width;
        }

        Ok(buf)
    }

    /// Parse a header and check that this build can read the package.
    pub fn from_bytes(data: &[u8; Self::SIZE]) -> Result<Self> {
        let major = decode_decimal("major version", &data[0..4])?;
        let minor = decode_decimal("minor version", &data[4..8])?;

        if major != MAJOR_VERSION as u64 || minor != MINOR_VERSION as u64 {
            return Err(Error::IncompatibleVersion {
                found: format!("{major}.{minor}"),
                expected: format!("{MAJOR_VERSION}.{MINOR_VERSION}"),
            });
        }

        Ok(Self {
            major_version: MAJOR_VERSION,
            minor_version: MINOR_VERSION,
            name_width: decode_width("name width", &data[8..16])?,
            ext_width: decode_width("ext width", &data[16..24])?,
            size_width: decode_width("size width", &data[24..32])?,
        })
    }

    /// Bytes of framing each entry carries ahead of its payload.
    pub fn entry_overhead(&self) -> usize {
        self.name_width + self.ext_width + self.size_width
    }
}

/// Write the header once at the start of a package.
pub async fn write_header<W>(sink: &mut W, header: &Header) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    sink.write_all(&header.to_bytes()?).await?;
    Ok(())
}

/// Read and validate a package header.
///
/// Returns `Ok(None)` if the source is empty or ends inside the header.
pub async fn read_header<R>(source: &mut R) -> Result<Option<Header>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buf = [0u8; Header::SIZE];
    let n = read_chunked(source, &mut buf, Header::SIZE, &mut NoProgress).await?;
    if n < Header::SIZE {
        return Ok(None);
    }
    Header::from_bytes(&buf).map(Some)
}

/// Write `value` as decimal ASCII followed by NUL padding.
///
/// At least one NUL always follows the digits.
pub(crate) fn encode_decimal(field: &'static str, value: u64, out: &mut [u8]) -> Result<()> {
    encode_text(field, &value.to_string(), out)
}

/// Write `text` into a fixed-width field, NUL-padded.
pub(crate) fn encode_text(field: &'static str, text: &str, out: &mut [u8]) -> Result<()> {
    let bytes = text.as_bytes();
    if bytes.len() >= out.len() {
        return Err(Error::FieldOverflow {
            field,
            value: text.to_string(),
            width: out.len(),
        });
    }
    out[..bytes.len()].copy_from_slice(bytes);
    out[bytes.len()..].fill(0);
    Ok(())
}

/// The bytes of a fixed-width field up to its first NUL.
pub(crate) fn field_bytes(raw: &[u8]) -> &[u8] {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    &raw[..end]
}

/// Decode a fixed-width text field.
pub(crate) fn decode_text(raw: &[u8]) -> String {
    String::from_utf8_lossy(field_bytes(raw)).into_owned()
}

/// Parse a fixed-width decimal field.
///
/// Returns `Ok(None)` if the field is empty.
pub(crate) fn parse_decimal(raw: &[u8]) -> std::result::Result<Option<u64>, String> {
    let text = String::from_utf8_lossy(field_bytes(raw));
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<u64>()
        .map(Some)
        .map_err(|_| trimmed.to_string())
}

fn decode_decimal(field: &'static str, raw: &[u8]) -> Result<u64> {
    match parse_decimal(raw) {
        Ok(Some(value)) => Ok(value),
        Ok(None) => Err(Error::MalformedField {
            field,
            value: String::new(),
        }),
        Err(value) => Err(Error::MalformedField { field, value }),
    }
}

fn decode_width(field: &'static str, raw: &[u8]) -> Result<usize> {
    let width = decode_decimal(field, raw)?;
    if width == 0 || width > MAX_FIELD_WIDTH as u64 {
        return Err(Error::MalformedField {
            field,
            value: width.to_string(),
        });
    }
    Ok(width as usize)
}

/// Check that a base name and extension fit their entry fields.
pub fn check_name_fields(name: &str, ext: &str) -> Result<()> {
    if name.len() >= NAME_LIMIT {
        return Err(Error::NameTooLong {
            name: name.to_string(),
            len: name.len(),
        });
    }
    if ext.len() >= EXT_LIMIT {
        return Err(Error::ExtTooLong {
            ext: ext.to_string(),
            len: ext.len(),
        });
    }
    Ok(())
}

/// Lifecycle of a packaging-side [`Descriptor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Raw file contents are in memory.
    Loaded,
    /// `data` holds the compressed payload.
    Compressed,
    /// The entry has been written to the package.
    Written,
}

/// In-memory record of one source file on its way into a package.
///
/// `size()` always equals the length of the buffer currently held, so the
/// declared size and the payload can never disagree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    name: String,
    ext: String,
    data: Vec<u8>,
    stage: Stage,
}

impl Descriptor {
    /// Create a descriptor for raw file contents.
    ///
    /// Fails if the name or extension does not fit its entry field.
    pub fn new(name: impl Into<String>, ext: impl Into<String>, data: Vec<u8>) -> Result<Self> {
        let name = name.into();
        let ext = ext.into();
        check_name_fields(&name, &ext)?;

        Ok(Self {
            name,
            ext,
            data,
            stage: Stage::Loaded,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ext(&self) -> &str {
        &self.ext
    }

    /// `name + ext`, the file name this descriptor materializes as.
    pub fn file_name(&self) -> String {
        format!("{}{}", self.name, self.ext)
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Swap in the compressed payload, releasing the raw buffer.
    pub(crate) fn replace_compressed(&mut self, compressed: Vec<u8>) {
        self.data = compressed;
        self.stage = Stage::Compressed;
    }

    pub(crate) fn mark_written(&mut self) {
        self.stage = Stage::Written;
    }
}

/// Lifecycle of an unpackaging-side [`RecoveredDescriptor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveredStage {
    /// `data` holds the compressed payload as read from the package.
    Read,
    /// `data` holds the original file contents.
    Decompressed,
    /// The file has been written to disk.
    Written,
}

/// One file recovered from a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveredDescriptor {
    pub name: String,
    pub ext: String,
    data: Vec<u8>,
    stage: RecoveredStage,
}

impl RecoveredDescriptor {
    pub(crate) fn new(name: String, ext: String, payload: Vec<u8>) -> Self {
        Self {
            name,
            ext,
            data: payload,
            stage: RecoveredStage::Read,
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}{}", self.name, self.ext)
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn stage(&self) -> RecoveredStage {
        self.stage
    }

    /// Swap in the decompressed contents, releasing the compressed buffer.
    pub(crate) fn replace_decompressed(&mut self, contents: Vec<u8>) {
        self.data = contents;
        self.stage = RecoveredStage::Decompressed;
    }

    pub(crate) fn mark_written(&mut self) {
        self.stage = RecoveredStage::Written;
    }
}
