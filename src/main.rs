//! flacpress - FLAC to AAC batch converter.
//!
//! Mirrors a lossless FLAC tree into a lossy AAC tree, carrying tags and
//! album artwork across and computing loudness normalization tags. Albums
//! are processed one at a time; tracks within an album transcode in
//! parallel on a bounded worker pool.

pub mod artwork;
pub mod cli;
pub mod config;
pub mod encoder;
pub mod error;
pub mod loudness;
pub mod metadata;
pub mod pipeline;
pub mod scanner;
#[cfg(test)]
pub mod test_utils;

use clap::Parser;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args = cli::Cli::parse();

    match cli::run(&args) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Fatal error: {e:#}");
            ExitCode::from(1)
        }
    }
}
