use std::fs::File;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use clap::ValueEnum;
use regex::Regex;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Serialize;

use crate::config::ArchiveSettings;
use crate::error::CatalogError;

static ANCHOR_HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<a\s[^>]*?href\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#)
        .expect("anchor pattern is valid")
});

pub trait ArchiveClient: Send + Sync {
    fn download(&self, url: &str, destination: &Path) -> Result<(), CatalogError>;
    fn fetch_text(&self, url: &str) -> Result<String, CatalogError>;
}

#[derive(Clone)]
pub struct ArchiveHttpClient {
    client: Client,
}

impl ArchiveHttpClient {
    pub fn new(timeout: Duration) -> Result<Self, CatalogError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("halocat/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| CatalogError::ArchiveHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| CatalogError::ArchiveHttp(err.to_string()))?;
        Ok(Self { client })
    }

    fn get(&self, url: &str) -> Result<reqwest::blocking::Response, CatalogError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| CatalogError::ArchiveHttp(err.to_string()))?;
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "archive request failed".to_string());
        Err(CatalogError::ArchiveStatus { status, message })
    }
}

impl ArchiveClient for ArchiveHttpClient {
    fn download(&self, url: &str, destination: &Path) -> Result<(), CatalogError> {
        let mut response = self.get(url)?;
        let mut file =
            File::create(destination).map_err(|err| CatalogError::Filesystem(err.to_string()))?;
        std::io::copy(&mut response, &mut file)
            .map_err(|err| CatalogError::ArchiveHttp(err.to_string()))?;
        Ok(())
    }

    fn fetch_text(&self, url: &str) -> Result<String, CatalogError> {
        self.get(url)?
            .text()
            .map_err(|err| CatalogError::ArchiveHttp(err.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ListingKind {
    #[value(alias = "halo")]
    Halos,
    #[value(alias = "particle")]
    Particles,
    #[value(alias = "tree")]
    Trees,
}

pub fn join_url(base: &str, filename: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), filename.trim_start_matches('/'))
}

pub fn extract_links(html: &str) -> Vec<String> {
    ANCHOR_HREF
        .captures_iter(html)
        .filter_map(|captures| {
            captures
                .get(1)
                .or_else(|| captures.get(2))
                .or_else(|| captures.get(3))
                .map(|value| value.as_str().to_string())
        })
        .collect()
}

pub fn filter_listing(
    url: &str,
    kind: ListingKind,
    links: Vec<String>,
    archives: &ArchiveSettings,
) -> Result<Vec<String>, CatalogError> {
    if same_url(url, &archives.behroozi_url) {
        let prefix = match kind {
            ListingKind::Halos => "hlist_",
            ListingKind::Trees => "tree_",
            ListingKind::Particles => {
                return Err(CatalogError::InvalidRequest(
                    "catalog type must either be halos or trees for this archive".to_string(),
                ));
            }
        };
        return Ok(links
            .into_iter()
            .filter(|link| link.starts_with(prefix))
            .collect());
    }

    if same_url(url, &archives.default_url) {
        let suffix = match kind {
            ListingKind::Halos => "halos.fits",
            ListingKind::Particles => "particles.fits",
            ListingKind::Trees => ".fits",
        };
        return Ok(links
            .into_iter()
            .filter(|link| link.ends_with(suffix))
            .collect());
    }

    Ok(links)
}

pub fn list_remote_catalogs<C: ArchiveClient>(
    client: &C,
    url: &str,
    kind: ListingKind,
    archives: &ArchiveSettings,
) -> Result<Vec<String>, CatalogError> {
    let html = client.fetch_text(url)?;
    filter_listing(url, kind, extract_links(&html), archives)
}

fn same_url(a: &str, b: &str) -> bool {
    a.trim_end_matches('/') == b.trim_end_matches('/')
}
