mod line;

use std::io;
use std::path::Path;

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

use crate::data::{AssetRequest, Package};

pub use self::line::LineStore;

#[derive(Clone, Debug, Default)]
pub struct StoreConfig {
    /// Proxy to send every request through. A bare `host:port` is treated as
    /// a SOCKS5 proxy that resolves host names itself.
    pub proxy: Option<String>,
}

/// Source of sticker package metadata and sticker images.
#[async_trait]
pub trait StickerStore: Send + Sync {
    async fn fetch_package(&self, package_id: u64) -> Result<Package, StoreError>;

    /// Downloads one asset of `package_id` to `dest`, replacing whatever is
    /// there, and returns the number of bytes written.
    async fn download_asset(
        &self,
        package_id: u64,
        request: AssetRequest,
        dest: &Path,
    ) -> Result<u64, StoreError>;
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sticker store HTTP error")]
    Http {
        #[from]
        source: reqwest::Error,
    },

    #[error("sticker store returned HTTP {status} for {url}")]
    ResponseError { status: StatusCode, url: String },

    #[error("sticker store returned malformed package metadata: {body}")]
    BadResponseJson {
        body: String,
        source: serde_json::Error,
    },

    #[error("could not write downloaded asset")]
    Io {
        #[from]
        source: io::Error,
    },

    #[error("invalid proxy address {address:?}")]
    InvalidProxy {
        address: String,
        source: reqwest::Error,
    },
}

pub fn get_store(config: StoreConfig) -> Result<Box<dyn StickerStore>, StoreError> {
    Ok(Box::new(LineStore::new(config)?))
}
