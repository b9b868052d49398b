//! Main entry point for the binpress CLI application.
//!
//! Source files are packaged first, then any `.bin` packages named on the
//! command line are unpacked. Every failure is reported and the run carries
//! on with whatever work remains.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use binpress::{
    Cli, Collector, Inputs, MAJOR_VERSION, MINOR_VERSION, Materializer, PackageReader,
    PackageWriter, Phase, Progress, ProgressEvent, ZlibCodec,
};

/// Application entry point.
///
/// Runs on a single-threaded runtime; every pipeline step completes before
/// the next begins.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    if !cli.is_very_quiet() {
        println!("binpress - v{MAJOR_VERSION}.{MINOR_VERSION}");
        println!("{}", "-".repeat(34));
    }

    let inputs = Inputs::classify(&cli.paths);
    for path in &inputs.missing {
        eprintln!("Skipping: {} (no such file or directory)", path.display());
    }

    let mut not_packaged = Vec::new();
    if !inputs.files.is_empty() {
        not_packaged = package_files(&inputs.files, &cli).await;
    }

    if !inputs.packages.is_empty() {
        match Materializer::in_current_dir(&cli.dest) {
            Ok(materializer) => {
                for package in &inputs.packages {
                    unpack_package(package, &materializer, &cli).await;
                }
            }
            Err(e) => eprintln!("ERROR: could not resolve {}: {}", cli.dest.display(), e),
        }
    }

    if !not_packaged.is_empty() && !cli.is_very_quiet() {
        println!();
        println!("Files not packaged:");
        println!("--------");
        for path in &not_packaged {
            println!("{}", path.display());
        }
    }

    Ok(())
}

/// Set up `tracing` output on stderr, honouring `RUST_LOG`.
fn init_logging(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Load, compress and write every source file into the output package.
///
/// Returns the paths that did not make it into the package.
async fn package_files(files: &[PathBuf], cli: &Cli) -> Vec<PathBuf> {
    let mut progress = ConsoleProgress::new(cli);

    status(cli, "Reading file(s)...");
    let collection = match Collector::new().collect(files, &mut progress).await {
        Ok(collection) => collection,
        Err(e) => {
            progress.finish();
            eprintln!("ERROR: {e}");
            status(cli, "Packaging canceled.");
            return files.to_vec();
        }
    };
    progress.finish();

    for (path, e) in &collection.rejected {
        eprintln!("ERROR: {}: {}", path.display(), e);
    }
    let mut not_packaged: Vec<PathBuf> =
        collection.rejected.into_iter().map(|(path, _)| path).collect();

    if collection.descriptors.is_empty() {
        return not_packaged;
    }

    if cli.verbose {
        for descriptor in &collection.descriptors {
            println!("Name: {}", descriptor.name());
            println!("Size: {} bytes", descriptor.size());
            println!("File Type: {}", descriptor.ext());
            println!("{}", "-".repeat(51));
        }
    }

    status(cli, "Packaging file(s)...");
    let pending = collection.descriptors.len();
    let result = PackageWriter::new(ZlibCodec)
        .write_file(&cli.output, collection.descriptors, &mut progress)
        .await;
    progress.finish();

    match result {
        Ok(report) => {
            if !cli.is_very_quiet() {
                for entry in &report.entries {
                    println!(
                        "  {}: {} -> {}",
                        entry.file_name,
                        format_size(entry.raw_size),
                        format_size(entry.compressed_size)
                    );
                }
                println!();
                println!("Packaging complete: {}", cli.output.display());
                println!("Data size: {} bytes.", report.data_size);
                println!("Header size: {} bytes.", report.header_size);
                println!("Total size: {} bytes.", report.total_size());
            }
        }
        Err(e) => {
            eprintln!("ERROR: could not write {}: {}", cli.output.display(), e);
            tracing::error!(pending, "Packaging failed");
            let unwritten: Vec<PathBuf> = files
                .iter()
                .filter(|path| !not_packaged.contains(*path))
                .cloned()
                .collect();
            not_packaged.extend(unwritten);
        }
    }

    not_packaged
}

/// Recover one package and write its files with `materializer`.
///
/// A failure here only affects this package.
async fn unpack_package(package: &Path, materializer: &Materializer, cli: &Cli) {
    let mut progress = ConsoleProgress::new(cli);

    status(cli, &format!("Reading package {}...", package.display()));
    let recovered = PackageReader::new(ZlibCodec)
        .read_file(package, &mut progress)
        .await;
    progress.finish();

    let recovered = match recovered {
        Ok(recovered) => recovered,
        Err(e) => {
            eprintln!("ERROR: could not unpack {}: {}", package.display(), e);
            return;
        }
    };

    if recovered.is_empty() {
        status(cli, "Package is empty.");
        return;
    }

    status(cli, "Saving unpackaged file(s)...");
    let result = materializer.materialize(recovered, &mut progress).await;
    progress.finish();

    match result {
        Ok(report) => {
            for (name, e) in &report.failed {
                eprintln!("ERROR: could not write {name}: {e}");
            }
            status(
                cli,
                &format!(
                    "Unpackaging complete: {} file(s) in {}",
                    report.written.len(),
                    materializer.output_dir().display()
                ),
            );
        }
        Err(e) => eprintln!(
            "ERROR: could not create {}: {}",
            materializer.output_dir().display(),
            e
        ),
    }
}

fn status(cli: &Cli, line: &str) {
    if !cli.is_very_quiet() {
        println!("{line}");
    }
}

/// Renders pipeline progress as one bar per file and phase.
struct ConsoleProgress {
    enabled: bool,
    bar: Option<ProgressBar>,
    current: Option<(Phase, String)>,
}

impl ConsoleProgress {
    fn new(cli: &Cli) -> Self {
        Self {
            enabled: !cli.is_quiet(),
            bar: None,
            current: None,
        }
    }

    fn style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("[{prefix:>13} {percent:>3}%] [{bar:30.cyan/blue}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-")
    }

    /// Leave the last bar on screen and start fresh.
    fn finish(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish();
        }
        self.current = None;
    }
}

impl Progress for ConsoleProgress {
    fn update(&mut self, event: &ProgressEvent<'_>) {
        if !self.enabled {
            return;
        }

        let same = self
            .current
            .as_ref()
            .is_some_and(|(phase, file)| *phase == event.phase && file == event.file);
        if !same {
            self.finish();
            let bar = ProgressBar::new(event.total.max(1));
            bar.set_style(Self::style());
            bar.set_prefix(event.phase.as_str());
            bar.set_message(event.file.to_string());
            self.bar = Some(bar);
            self.current = Some((event.phase, event.file.to_string()));
        }

        if let Some(bar) = &self.bar {
            if event.total == 0 {
                bar.set_position(1);
            } else {
                bar.set_position(event.completed);
            }
        }
    }
}

/// Byte count in the largest fitting unit, e.g. `1.50 KB`.
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
