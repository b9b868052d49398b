use std::path::PathBuf;

use clap::Parser;

use crate::package::OUTPUT_DIR;

/// Package written when source files are given.
pub const DEFAULT_PACKAGE: &str = "package.bin";

#[derive(Parser, Debug)]
#[command(name = "binpress")]
#[command(version)]
#[command(about = "Bundle files into a compressed package, or unpack packages", long_about = None)]
#[command(after_help = "Paths ending in .bin are unpacked; other files are packaged, and \
  directories are searched recursively.\n\n\
Examples:\n  \
  binpress notes.txt images/          package both into package.bin\n  \
  binpress package.bin                unpack into ./package/\n  \
  binpress -o docs.bin docs/ -q       package docs/ into docs.bin without progress bars")]
pub struct Cli {
    /// Files, directories, or .bin packages
    #[arg(value_name = "PATHS", required = true)]
    pub paths: Vec<PathBuf>,

    /// Package to write
    #[arg(short = 'o', long = "output", value_name = "FILE", default_value = DEFAULT_PACKAGE)]
    pub output: PathBuf,

    /// Directory to unpack into, relative to the working directory
    #[arg(short = 'd', long = "dest", value_name = "DIR", default_value = OUTPUT_DIR)]
    pub dest: PathBuf,

    /// List loaded files before packaging and log pipeline steps
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,
}

impl Cli {
    /// Hide progress bars.
    pub fn is_quiet(&self) -> bool {
        self.quiet > 0
    }

    /// Hide status lines as well.
    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }

    /// Default log filter when `RUST_LOG` is not set.
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "info" } else { "warn" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["binpress", "a.txt"]).unwrap();
        assert_eq!(cli.output, PathBuf::from("package.bin"));
        assert_eq!(cli.dest, PathBuf::from("package"));
        assert!(!cli.is_quiet());
        assert_eq!(cli.log_level(), "warn");
    }

    #[test]
    fn quiet_levels() {
        let cli = Cli::try_parse_from(["binpress", "-qq", "-v", "a.txt"]).unwrap();
        assert!(cli.is_quiet());
        assert!(cli.is_very_quiet());
        assert_eq!(cli.log_level(), "info");
    }

    #[test]
    fn paths_are_required() {
        assert!(Cli::try_parse_from(["binpress"]).is_err());
    }
}
