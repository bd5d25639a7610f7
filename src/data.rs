//! The sticker package model, as served by the LINE sticker store, and the
//! formats the tool writes to disk.

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;

/// Locale key used for the title and author shown in folder names and the
/// generated viewer.
pub const DEFAULT_LOCALE: &str = "en";

/// Characters that are replaced with an underscore when a folder name is
/// derived from a package title.
const INVALID_FILE_NAME_CHARS: &[char] = &[
    '"', '<', '>', '|', '\u{0}', '\u{1}', '\u{2}', '\u{3}', '\u{4}', '\u{5}', '\u{6}', '\u{7}',
    '\u{8}', '\t', '\n', '\u{b}', '\u{c}', '\r', '\u{e}', '\u{f}', '\u{10}', '\u{11}', '\u{12}',
    '\u{13}', '\u{14}', '\u{15}', '\u{16}', '\u{17}', '\u{18}', '\u{19}', '\u{1a}', '\u{1b}',
    '\u{1c}', '\u{1d}', '\u{1e}', '\u{1f}', ':', '*', '?', '\\', '/',
];

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    pub package_id: u64,

    #[serde(default)]
    pub on_sale: bool,

    #[serde(default)]
    pub valid_days: u32,

    #[serde(default)]
    pub title: BTreeMap<String, String>,

    #[serde(default)]
    pub author: BTreeMap<String, String>,

    #[serde(default)]
    pub price: Vec<Price>,

    #[serde(default)]
    pub stickers: Vec<Sticker>,

    #[serde(default)]
    pub has_animation: bool,

    #[serde(default)]
    pub has_sound: bool,

    #[serde(default)]
    pub sticker_resource_type: Option<String>,
}

impl Package {
    /// The package title in the default locale, or an empty string if the
    /// store did not provide one.
    pub fn title(&self) -> &str {
        self.title.get(DEFAULT_LOCALE).map_or("", String::as_str)
    }

    pub fn author(&self) -> &str {
        self.author.get(DEFAULT_LOCALE).map_or("", String::as_str)
    }

    /// The first listed price, formatted like `$0.99 (USD, US)`.
    pub fn display_price(&self) -> Option<String> {
        self.price.first().map(|price| {
            format!(
                "{}{} ({}, {})",
                price.symbol, price.price, price.currency, price.country
            )
        })
    }

    /// The folder name used when the user did not pick one.
    pub fn default_folder_name(&self) -> String {
        normalize_file_name(&format!("{} - {}", self.package_id, self.title()))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Price {
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub price: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Sticker {
    pub id: u64,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

/// The two kinds of asset the store serves for every sticker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Static,
    Animated,
}

impl AssetKind {
    /// The format a downloaded asset of this kind is stored as.
    pub fn format(self) -> AssetFormat {
        match self {
            AssetKind::Static => AssetFormat::Png,
            AssetKind::Animated => AssetFormat::Apng,
        }
    }
}

/// A single asset to fetch from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AssetRequest {
    pub sticker_id: u64,
    pub kind: AssetKind,
}

/// Formats that end up in the output folder. Each one has its own
/// directory and its own tab in the generated viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AssetFormat {
    Png,
    Apng,
    Gif,
}

impl AssetFormat {
    pub fn dir_name(self) -> &'static str {
        match self {
            AssetFormat::Png => "PNG",
            AssetFormat::Apng => "APNG",
            AssetFormat::Gif => "GIF",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            AssetFormat::Png | AssetFormat::Apng => "png",
            AssetFormat::Gif => "gif",
        }
    }

    /// File name of a sticker's asset in this format, relative to the
    /// format's directory.
    pub fn file_name(self, sticker_id: u64) -> String {
        format!("{}.{}", sticker_id, self.extension())
    }
}

impl fmt::Display for AssetFormat {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str(self.dir_name())
    }
}

/// Which formats a run produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Formats {
    pub png: bool,
    pub apng: bool,
    pub gif: bool,
}

impl Formats {
    /// Narrows the requested formats down to what the package can provide.
    /// Packages without animation have nothing to retain or convert.
    pub fn for_package(self, package: &Package) -> Self {
        Self {
            png: self.png,
            apng: self.apng && package.has_animation,
            gif: self.gif && package.has_animation,
        }
    }

    pub fn contains(self, format: AssetFormat) -> bool {
        match format {
            AssetFormat::Png => self.png,
            AssetFormat::Apng => self.apng,
            AssetFormat::Gif => self.gif,
        }
    }

    /// Enabled formats in the order the viewer lists them.
    pub fn viewer_order(self) -> impl Iterator<Item = AssetFormat> {
        [AssetFormat::Apng, AssetFormat::Gif, AssetFormat::Png]
            .into_iter()
            .filter(move |format| self.contains(*format))
    }
}

/// Replaces characters that are not allowed in file names with underscores
/// and trims surrounding whitespace.
pub fn normalize_file_name(name: &str) -> String {
    name.replace(INVALID_FILE_NAME_CHARS, "_").trim().to_owned()
}
