use std::fmt;
use std::io;
use std::path::Path;

use async_trait::async_trait;
use futures::TryStreamExt;
use log::debug;
use reqwest::{Client, Proxy, Response};

use crate::data::{AssetKind, AssetRequest, Package};
use crate::download::save_stream;

use super::{StickerStore, StoreConfig, StoreError};

const METADATA_HOST: &str = "http://dl.stickershop.line.naver.jp";
const ASSET_HOST: &str = "http://sdl-stickershop.line.naver.jp";

/// Client for the public LINE sticker shop CDN.
pub struct LineStore {
    client: Client,
    metadata_host: String,
    asset_host: String,
}

impl fmt::Debug for LineStore {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "LineStore")
    }
}

impl LineStore {
    pub fn new(config: StoreConfig) -> Result<Self, StoreError> {
        let mut builder = Client::builder();

        if let Some(address) = config.proxy {
            let proxy = Proxy::all(proxy_url(&address)).map_err(|source| {
                StoreError::InvalidProxy {
                    address: address.clone(),
                    source,
                }
            })?;
            debug!("sending requests through proxy {address}");
            builder = builder.proxy(proxy);
        }

        Ok(Self {
            client: builder.build()?,
            metadata_host: METADATA_HOST.to_owned(),
            asset_host: ASSET_HOST.to_owned(),
        })
    }

    /// Points the store at other hosts, bypassing any proxy from the
    /// environment.
    #[cfg(test)]
    fn with_hosts(metadata_host: String, asset_host: String) -> Self {
        Self {
            client: Client::builder()
                .no_proxy()
                .build()
                .expect("failed to build test client"),
            metadata_host,
            asset_host,
        }
    }

    async fn get(&self, url: &str) -> Result<Response, StoreError> {
        debug!("GET {url}");
        let response = self.client.get(url).send().await?;

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(StoreError::ResponseError {
                status: response.status(),
                url: url.to_owned(),
            })
        }
    }
}

#[async_trait]
impl StickerStore for LineStore {
    async fn fetch_package(&self, package_id: u64) -> Result<Package, StoreError> {
        let response = self.get(&metadata_url(&self.metadata_host, package_id)).await?;
        let body = response.text().await?;

        match serde_json::from_str(&body) {
            Ok(package) => Ok(package),
            Err(source) => Err(StoreError::BadResponseJson { body, source }),
        }
    }

    async fn download_asset(
        &self,
        package_id: u64,
        request: AssetRequest,
        dest: &Path,
    ) -> Result<u64, StoreError> {
        let response = self.get(&asset_url(&self.asset_host, package_id, request)).await?;
        let body = response
            .bytes_stream()
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err));

        Ok(save_stream(body, dest).await?)
    }
}

fn metadata_url(host: &str, package_id: u64) -> String {
    format!("{host}/products/0/0/1/{package_id}/android/productInfo.meta")
}

fn asset_url(host: &str, package_id: u64, request: AssetRequest) -> String {
    let folder = match request.kind {
        AssetKind::Static => "stickers",
        AssetKind::Animated => "animation",
    };

    format!(
        "{}/products/0/0/1/{}/android/{}/{}.png",
        host, package_id, folder, request.sticker_id
    )
}

/// Addresses without a scheme are SOCKS5 proxies, like `127.0.0.1:1080`.
/// Host names are resolved by the proxy, not locally.
fn proxy_url(address: &str) -> String {
    if address.contains("://") {
        address.to_owned()
    } else {
        format!("socks5h://{address}")
    }
}
