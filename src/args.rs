use clap::Parser;
use std::path::PathBuf;

/// Base flags of the demo binary. Extensions add their own on top.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Image files to feed through the enabled extensions, one frame each
    #[arg(short, long, num_args = 1..)]
    pub input: Vec<PathBuf>,

    /// Write annotated frames here
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Validate every result and fail if one is rejected
    #[arg(long, default_value_t = false)]
    pub check: bool,

    /// Print each result as a JSON line
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Mirror frames before processing
    #[arg(long, default_value_t = false)]
    pub mirror: bool,

    /// List registered extensions and exit
    #[arg(long)]
    pub list: bool,
}
