mod download;
mod loop_apng;

use clap::Subcommand;
pub use download::*;
pub use loop_apng::*;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Download a sticker package: static PNGs, looping APNGs and GIFs,
    /// plus an index.html to browse them.
    Download(DownloadOptions),

    /// Patch animated PNG files in place so that they loop forever.
    Loop(LoopOptions),
}
