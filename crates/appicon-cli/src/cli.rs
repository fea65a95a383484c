use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueHint};

#[derive(Parser)]
#[command(
    author,
    version,
    about,
    help_template = "{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}",
    arg_required_else_help = true
)]
pub struct Args {
    /// Set output verbosity
    #[arg(short = 'v', long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress outputs
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output as json
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Disable colors in output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Provide custom config file
    #[arg(short, long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<String>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show what the extractor finds inside a file
    #[command(arg_required_else_help = true)]
    Inspect {
        /// AppImage to inspect
        #[arg(required = true, value_hint = ValueHint::FilePath)]
        path: PathBuf,
    },

    /// Write the icon of an AppImage to a file
    #[command(arg_required_else_help = true)]
    #[clap(name = "extract", visible_alias = "x")]
    Extract {
        /// AppImage to read
        #[arg(required = true, value_hint = ValueHint::FilePath)]
        path: PathBuf,

        /// Output file (default: <name>.<ext> in the current directory)
        #[arg(required = false, short, long, value_hint = ValueHint::FilePath)]
        output: Option<PathBuf>,
    },

    /// Write a thumbnail-sized icon of an AppImage
    #[command(arg_required_else_help = true)]
    Thumbnail {
        /// AppImage to read
        #[arg(required = true, value_hint = ValueHint::FilePath)]
        path: PathBuf,

        /// Output file (default: <name>.<ext> in the current directory)
        #[arg(required = false, short, long, value_hint = ValueHint::FilePath)]
        output: Option<PathBuf>,

        /// Largest edge in pixels, overriding the configuration
        #[arg(required = false, short, long)]
        size: Option<u32>,
    },

    /// Extract icons from many AppImages in parallel
    #[command(arg_required_else_help = true)]
    Batch {
        /// AppImages to read
        #[arg(required = true, value_hint = ValueHint::FilePath)]
        paths: Vec<PathBuf>,

        /// Directory to write icons into
        #[arg(required = false, short = 'd', long, value_hint = ValueHint::DirPath)]
        output_dir: Option<PathBuf>,

        /// Number of worker threads (default: number of CPUs)
        #[arg(required = false, short = 'J', long)]
        jobs: Option<usize>,
    },

    /// Print the effective configuration
    Config {
        /// Write an annotated default configuration file instead
        #[arg(required = false, long)]
        generate: bool,
    },
}
