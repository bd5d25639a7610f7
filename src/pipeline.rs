//! Drives a sticker package from store metadata to a browsable folder.
//!
//! A run walks through a fixed sequence of [`Stage`]s. Stages whose format is
//! disabled do nothing, and a sticker that fails in one stage never stops the
//! others: failures are reported and the run moves on. Only problems with the
//! package as a whole (no metadata, an unusable output folder) end a run.

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};

use futures::{stream, Stream, StreamExt};
use log::{debug, info};
use thiserror::Error;

use crate::apng::{self, ApngError};
use crate::convert::{ConvertError, Converter};
use crate::data::{AssetFormat, AssetKind, AssetRequest, Formats, Package};
use crate::report::report_pass;
use crate::sticker_shop::{StickerStore, StoreError};
use crate::viewer::{render_index, INDEX_FILE_NAME};

/// Collaborators shared by every stage of a run.
pub struct Context {
    pub store: Box<dyn StickerStore>,

    /// `None` when no converter could be found, which turns GIF output off
    /// for the whole run.
    pub converter: Option<Box<dyn Converter>>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub package_id: u64,
    pub formats: Formats,
    pub base_dir: PathBuf,

    /// Overrides the folder name derived from the package title.
    pub folder_name: Option<String>,

    /// How many stickers of a pass may be in flight at once.
    pub jobs: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    MetadataFetched,
    StaticDone,
    AnimatedDone,
    ConvertedDone,
    Cleanup,
    IndexGenerated,
    Terminal,
}

impl Stage {
    fn next(self) -> Stage {
        match self {
            Stage::Init => Stage::MetadataFetched,
            Stage::MetadataFetched => Stage::StaticDone,
            Stage::StaticDone => Stage::AnimatedDone,
            Stage::AnimatedDone => Stage::ConvertedDone,
            Stage::ConvertedDone => Stage::Cleanup,
            Stage::Cleanup => Stage::IndexGenerated,
            Stage::IndexGenerated | Stage::Terminal => Stage::Terminal,
        }
    }
}

/// Errors that end a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("could not fetch metadata for sticker package {package_id}")]
    MetadataUnavailable {
        package_id: u64,
        source: StoreError,
    },

    #[error(transparent)]
    Filesystem(#[from] io::Error),
}

/// Why a single sticker could not be saved in some format.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("download failed")]
    Download(#[source] StoreError),

    #[error("conversion failed")]
    Convert(#[source] ConvertError),

    #[error("animated sticker was not downloaded, nothing to convert")]
    SourceMissing,
}

#[derive(Debug)]
pub enum Saved {
    Complete,

    /// The animated sticker was saved but could not be patched to loop, so
    /// it plays however many times the store says. It is still converted.
    NotLooped(ApngError),
}

/// The result of producing one sticker in one format.
#[derive(Debug)]
pub struct AssetOutcome {
    pub sticker_id: u64,
    pub format: AssetFormat,
    pub result: Result<Saved, AssetError>,
}

/// Paths inside a package's output folder.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dir(&self, format: AssetFormat) -> PathBuf {
        self.root.join(format.dir_name())
    }

    pub fn asset_path(&self, format: AssetFormat, sticker_id: u64) -> PathBuf {
        self.dir(format).join(format.file_name(sticker_id))
    }

    pub fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE_NAME)
    }
}

/// Fetches the package named in `settings` and runs every stage for it.
/// Returns the folder the package was written to.
pub async fn run(context: &Context, settings: &Settings) -> Result<PathBuf, PipelineError> {
    let mut stage = Stage::Init;
    debug!("fetching metadata for sticker package {}", settings.package_id);

    let package = context
        .store
        .fetch_package(settings.package_id)
        .await
        .map_err(|source| PipelineError::MetadataUnavailable {
            package_id: settings.package_id,
            source,
        })?;

    debug!(
        "package {} has {} stickers (animation: {}, sound: {}, resource type: {})",
        package.package_id,
        package.stickers.len(),
        package.has_animation,
        package.has_sound,
        package.sticker_resource_type.as_deref().unwrap_or("unknown")
    );
    debug!(
        "on sale: {}, price: {}, valid for {} days",
        package.on_sale,
        package.display_price().as_deref().unwrap_or("none"),
        package.valid_days
    );

    let mut package_run = PackageRun::new(context, settings, package);
    info!("{}", package_run.folder_name());

    stage = stage.next();
    while stage != Stage::Terminal {
        stage = stage.next();
        debug!("entering stage {stage:?}");
        package_run.enter(stage).await?;
    }

    Ok(package_run.layout.root().to_owned())
}

/// The state of a run once the package metadata is known.
pub struct PackageRun<'a> {
    context: &'a Context,
    package: Package,
    formats: Formats,
    folder_name: String,
    layout: OutputLayout,
    jobs: usize,

    /// Stickers whose animated asset was saved during this run. Only these
    /// are handed to the converter.
    animated: BTreeSet<u64>,
}

impl<'a> PackageRun<'a> {
    pub fn new(context: &'a Context, settings: &Settings, package: Package) -> Self {
        let mut formats = settings.formats.for_package(&package);
        formats.gif &= context.converter.is_some();

        let folder_name = settings
            .folder_name
            .clone()
            .unwrap_or_else(|| package.default_folder_name());
        let layout = OutputLayout::new(settings.base_dir.join(&folder_name));

        Self {
            context,
            package,
            formats,
            folder_name,
            layout,
            jobs: settings.jobs.max(1),
            animated: BTreeSet::new(),
        }
    }

    pub fn folder_name(&self) -> &str {
        &self.folder_name
    }

    /// Does the work that completes `stage`.
    async fn enter(&mut self, stage: Stage) -> Result<(), PipelineError> {
        match stage {
            Stage::Init | Stage::MetadataFetched | Stage::Terminal => {}

            Stage::StaticDone => {
                if self.formats.png {
                    fs_err::tokio::create_dir_all(self.layout.dir(AssetFormat::Png)).await?;
                    report_pass(self.download_pass(AssetKind::Static)).await;
                }
            }

            Stage::AnimatedDone => {
                if self.formats.apng || self.formats.gif {
                    fs_err::tokio::create_dir_all(self.layout.dir(AssetFormat::Apng)).await?;
                    let report = report_pass(self.download_pass(AssetKind::Animated)).await;
                    self.animated = report.succeeded.into_iter().collect();
                }
            }

            Stage::ConvertedDone => {
                let converter = self.context.converter.as_deref();
                if let Some(converter) = converter.filter(|_| self.formats.gif) {
                    fs_err::tokio::create_dir_all(self.layout.dir(AssetFormat::Gif)).await?;
                    report_pass(self.convert_pass(converter)).await;
                }
            }

            Stage::Cleanup => {
                if self.formats.gif && !self.formats.apng {
                    info!("removing intermediate APNG files");
                    fs_err::tokio::remove_dir_all(self.layout.dir(AssetFormat::Apng)).await?;
                }
            }

            Stage::IndexGenerated => {
                let html = render_index(&self.package, self.formats);
                fs_err::tokio::write(self.layout.index_path(), html).await?;
                info!("wrote {}", self.layout.index_path().display());
            }
        }

        Ok(())
    }

    /// Downloads `kind` for every sticker of the package, in package order.
    /// Each call starts a fresh pass.
    pub fn download_pass(&self, kind: AssetKind) -> impl Stream<Item = AssetOutcome> + '_ {
        stream::iter(&self.package.stickers)
            .map(move |sticker| {
                self.download_one(AssetRequest {
                    sticker_id: sticker.id,
                    kind,
                })
            })
            .buffered(self.jobs)
    }

    /// Converts the animated assets saved earlier in this run.
    pub fn convert_pass<'s>(
        &'s self,
        converter: &'s dyn Converter,
    ) -> impl Stream<Item = AssetOutcome> + 's {
        stream::iter(&self.package.stickers)
            .map(move |sticker| self.convert_one(converter, sticker.id))
            .buffered(self.jobs)
    }

    async fn download_one(&self, request: AssetRequest) -> AssetOutcome {
        let format = request.kind.format();
        let dest = self.layout.asset_path(format, request.sticker_id);

        AssetOutcome {
            sticker_id: request.sticker_id,
            format,
            result: self.fetch_asset(request, &dest).await,
        }
    }

    async fn fetch_asset(&self, request: AssetRequest, dest: &Path) -> Result<Saved, AssetError> {
        let written = self
            .context
            .store
            .download_asset(self.package.package_id, request, dest)
            .await
            .map_err(AssetError::Download)?;
        debug!("saved {} bytes to {}", written, dest.display());

        if request.kind == AssetKind::Animated {
            if let Err(err) = apng::loop_file(dest) {
                return Ok(Saved::NotLooped(err));
            }
        }

        Ok(Saved::Complete)
    }

    async fn convert_one(&self, converter: &dyn Converter, sticker_id: u64) -> AssetOutcome {
        let result = if self.animated.contains(&sticker_id) {
            let source = self.layout.asset_path(AssetFormat::Apng, sticker_id);
            let dest = self.layout.asset_path(AssetFormat::Gif, sticker_id);

            converter
                .convert(&source, &dest)
                .await
                .map(|()| Saved::Complete)
                .map_err(AssetError::Convert)
        } else {
            Err(AssetError::SourceMissing)
        };

        AssetOutcome {
            sticker_id,
            format: AssetFormat::Gif,
            result,
        }
    }
}
