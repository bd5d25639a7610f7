use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Args;
use log::{error, info, warn};

use crate::{
    apng::{loop_file, ApngError},
    options::Global,
    report::error_chain,
};

#[derive(Debug, Args)]
pub struct LoopOptions {
    /// The animated PNG files to patch.
    #[clap(required = true)]
    pub paths: Vec<PathBuf>,
}

pub async fn loop_apng(_: Global, options: LoopOptions) -> Result<()> {
    let mut failed = 0;

    for path in &options.paths {
        match loop_file(path) {
            Ok(()) => info!("{} ... done", path.display()),
            Err(ApngError::ChunkNotFound) => {
                warn!("{} ... not animated, left unchanged", path.display())
            }
            Err(err) => {
                error!("{} ... {}", path.display(), error_chain(&err));
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} files could not be patched", failed, options.paths.len());
    }

    Ok(())
}
