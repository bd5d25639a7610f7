use std::env;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;
use log::{info, warn};
use resolve_path::PathResolveExt;

use crate::{
    convert::{Converter, ExternalConverter, DEFAULT_CONVERTER},
    data::Formats,
    options::Global,
    pipeline::{self, Context, Settings},
    sticker_shop::{get_store, StoreConfig},
};

#[derive(Debug, Args)]
pub struct DownloadOptions {
    /// The ID of the sticker package, as seen in its store URL.
    pub package_id: u64,

    /// Skip the static PNG stickers.
    #[clap(long)]
    pub no_png: bool,

    /// Don't keep the animated PNG stickers. They are still downloaded when
    /// GIFs are requested, then removed once converted.
    #[clap(long)]
    pub no_apng: bool,

    /// Skip converting animated stickers to GIF.
    #[clap(long)]
    pub no_gif: bool,

    /// The directory to create the package folder in. Defaults to the
    /// current directory.
    #[clap(long = "dir", short = 'd')]
    pub base_dir: Option<PathBuf>,

    /// The name of the package folder. Defaults to "<id> - <title>".
    #[clap(long = "folder", short = 'f')]
    pub folder_name: Option<String>,

    /// The program used to turn APNGs into GIFs. It is invoked as
    /// `<converter> <input.png> <output.gif>`.
    #[clap(long, env("STICKERDL_CONVERTER"), default_value = DEFAULT_CONVERTER)]
    pub converter: PathBuf,

    /// How many stickers to download or convert at the same time.
    #[clap(long, short = 'j', default_value_t = 1, value_parser = clap::value_parser!(u16).range(1..))]
    pub jobs: u16,
}

pub async fn download(global: Global, options: DownloadOptions) -> Result<()> {
    let base_dir = match options.base_dir {
        Some(path) => path.try_resolve()?.into_owned(),
        None => env::current_dir()?,
    };

    let formats = Formats {
        png: !options.no_png,
        apng: !options.no_apng,
        gif: !options.no_gif,
    };

    let context = Context {
        store: get_store(StoreConfig {
            proxy: global.proxy,
        })?,
        converter: if formats.gif {
            find_converter(&options.converter)
        } else {
            None
        },
    };

    let settings = Settings {
        package_id: options.package_id,
        formats,
        base_dir,
        folder_name: options.folder_name,
        jobs: usize::from(options.jobs),
    };

    let folder = pipeline::run(&context, &settings).await?;
    info!("Sticker package saved to {}", folder.display());

    Ok(())
}

fn find_converter(program: &Path) -> Option<Box<dyn Converter>> {
    match ExternalConverter::locate(program) {
        Some(converter) => {
            log::debug!("converting with {}", converter.program().display());
            Some(Box::new(converter))
        }
        None => {
            warn!(
                "{} was not found, so no GIFs will be made.
Download apng2gif from https://sourceforge.net/projects/apng2gif/ and place it next to this program or on your PATH.",
                program.display()
            );
            None
        }
    }
}
