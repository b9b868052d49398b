//! # binpress
//!
//! Bundle files into a single compressed package, and unpack packages back
//! into files.
//!
//! A package is a small fixed header followed by one entry per file. Every
//! entry carries the file's base name, its extension and the length of its
//! compressed payload in fixed-width decimal fields, so a package can be read
//! front to back without an index.
//!
//! ## Features
//!
//! - Package any number of files, including whole directory trees
//! - Per-file zlib compression with streaming progress
//! - Version-checked header; packages from another format version are refused
//! - Entry framing is self-describing: field widths live in the header
//! - Failures are confined to the file or package that caused them
//!
//! ## Example
//!
//! ```no_run
//! use std::path::{Path, PathBuf};
//! use binpress::{Collector, Materializer, NoProgress, PackageReader, PackageWriter, ZlibCodec};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     // Load and package two files
//!     let paths = vec![PathBuf::from("notes.txt"), PathBuf::from("photo.jpg")];
//!     let collection = Collector::new().collect(&paths, &mut NoProgress).await?;
//!     let report = PackageWriter::new(ZlibCodec)
//!         .write_file(Path::new("package.bin"), collection.descriptors, &mut NoProgress)
//!         .await?;
//!     println!("{} bytes written", report.total_size());
//!
//!     // Unpack them again
//!     let files = PackageReader::new(ZlibCodec)
//!         .read_file(Path::new("package.bin"), &mut NoProgress)
//!         .await?;
//!     Materializer::new("restored").materialize(files, &mut NoProgress).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod codec;
pub mod collect;
pub mod error;
pub mod inputs;
pub mod io;
pub mod package;

pub use cli::Cli;
pub use codec::{Codec, CodecError, ZlibCodec};
pub use collect::{Collection, Collector};
pub use error::{Error, Result};
pub use inputs::Inputs;
pub use io::{NoProgress, Phase, Progress, ProgressEvent, ProgressSink};
pub use package::{
    Descriptor, Header, MAJOR_VERSION, MINOR_VERSION, MaterializeReport, Materializer,
    PackReport, PackageReader, PackageWriter, RecoveredDescriptor,
};
