//! Package format and pipelines.
//!
//! A package is a 32-byte header followed by concatenated entries:
//!
//! | Section | Width | Content |
//! |---|---|---|
//! | major | 4 | format major version |
//! | minor | 4 | format minor version |
//! | name width | 8 | width of every entry's name field |
//! | ext width | 8 | width of every entry's extension field |
//! | size width | 8 | width of every entry's size field |
//! | name | name width | NUL-padded base name |
//! | ext | ext width | NUL-padded extension, with its dot |
//! | size | size width | compressed payload length |
//! | payload | size | compressed bytes |
//!
//! All numbers are decimal ASCII padded with NULs. There is no entry count:
//! the entry list ends at the first size field that is empty or not a number,
//! or at end of file.
//!
//! ## Architecture
//!
//! - [`structures`]: header, field encoding and descriptor types
//! - [`entry`]: framing for a single entry
//! - [`writer`]: packaging pipeline
//! - [`reader`]: unpackaging pipeline
//! - [`materializer`]: writes recovered files to disk
//!
//! ## Limitations
//!
//! - Entries are flat; directory structure is not kept
//! - No index, so entries can only be read in order
//! - No encryption

pub mod entry;
mod materializer;
mod reader;
pub mod structures;
mod writer;

pub use entry::{EntryRead, read_entry, write_entry};
pub use materializer::{MaterializeReport, Materializer, OUTPUT_DIR};
pub use reader::PackageReader;
pub use structures::*;
pub use writer::{PackReport, PackageWriter, PackedEntry};
