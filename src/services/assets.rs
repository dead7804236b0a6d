//! Image asset migration onto the controlled origin.
//!
//! Every image is stored once under a flat uploads directory as
//! `<identifier>.<format>` and referenced as
//! `<origin>/static/uploads/images/<file>`.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use md5::{Digest, Md5};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::models::{Article, BlockKind, ContentBlock, ImageVariant, ImageVariants};
use crate::utils::url::{extract_image_id, is_on_origin};

/// Path prefix the controlled origin serves uploads from.
pub const UPLOADS_PATH: &str = "/static/uploads/images";

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";
const KNOWN_FORMATS: [&str; 4] = ["webp", "jpg", "png", "gif"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetConfig {
    /// Download every variant instead of `desktop_webp` + `fallback`.
    #[serde(default)]
    pub download_all_formats: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            download_all_formats: false,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: StatusCode },

    #[error("empty response body from {url}")]
    Empty { url: String },

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Content identifier: `imageId`, numeric filename stem, else MD5 of the URL.
pub fn image_identifier(url: &str) -> String {
    if let Some(id) = extract_image_id(url) {
        return id;
    }
    let stem = Url::parse(url).ok().and_then(|u| {
        u.path_segments()
            .and_then(|mut s| s.next_back().map(str::to_string))
            .and_then(|name| name.split('.').next().map(str::to_string))
    });
    match stem {
        Some(stem) if !stem.is_empty() && stem.chars().all(|c| c.is_ascii_digit()) => stem,
        _ => hex::encode(Md5::digest(url.as_bytes())),
    }
}

fn normalize_format(raw: &str) -> Option<&'static str> {
    match raw.to_ascii_lowercase().as_str() {
        "webp" => Some("webp"),
        "jpg" | "jpeg" => Some("jpg"),
        "png" => Some("png"),
        "gif" => Some("gif"),
        _ => None,
    }
}

/// Format from the `format=` query parameter, then the path extension.
pub fn format_hint(url: &str) -> Option<&'static str> {
    let parsed = Url::parse(url).ok()?;
    if let Some((_, value)) = parsed.query_pairs().find(|(k, _)| k == "format") {
        if let Some(format) = normalize_format(&value) {
            return Some(format);
        }
    }
    let last = parsed.path_segments()?.next_back()?.to_string();
    let (_, ext) = last.rsplit_once('.')?;
    normalize_format(ext)
}

/// Downloads images into the uploads directory and rewrites their URLs.
pub struct AssetFetcher {
    client: Client,
    uploads_dir: PathBuf,
    origin: String,
    download_all_formats: bool,
}

impl AssetFetcher {
    pub fn new(
        config: &AssetConfig,
        uploads_dir: impl Into<PathBuf>,
        origin: &str,
    ) -> Result<Self, AssetError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|source| AssetError::Request {
                url: origin.to_string(),
                source,
            })?;
        Ok(Self {
            client,
            uploads_dir: uploads_dir.into(),
            origin: origin.trim_end_matches('/').to_string(),
            download_all_formats: config.download_all_formats,
        })
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    /// Public URL of a stored file.
    pub fn public_url(&self, filename: &str) -> String {
        format!("{}{}/{}", self.origin, UPLOADS_PATH, filename)
    }

    fn existing_file(&self, id: &str, format: Option<&str>) -> Option<String> {
        let candidates: Vec<&str> = match format {
            Some(f) => vec![f],
            None => KNOWN_FORMATS.to_vec(),
        };
        candidates
            .into_iter()
            .map(|ext| format!("{}.{}", id, ext))
            .find(|name| self.uploads_dir.join(name).is_file())
    }

    /// Store `url` locally (if not already stored) and return its new URL.
    ///
    /// URLs already on the controlled origin are returned unchanged.
    pub async fn fetch(&self, url: &str) -> Result<String, AssetError> {
        if is_on_origin(url, &self.origin) {
            return Ok(url.to_string());
        }

        let id = image_identifier(url);
        let hint = format_hint(url);
        if let Some(name) = self.existing_file(&id, hint) {
            debug!("Image {} already stored", name);
            return Ok(self.public_url(&name));
        }

        let filename = self.download(url, &id, hint).await?;
        Ok(self.public_url(&filename))
    }

    async fn download(
        &self,
        url: &str,
        id: &str,
        hint: Option<&'static str>,
    ) -> Result<String, AssetError> {
        let request_err = |source| AssetError::Request {
            url: url.to_string(),
            source,
        };
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| AssetError::Io { path, source }
        };

        let mut response = self.client.get(url).send().await.map_err(request_err)?;
        if !response.status().is_success() {
            return Err(AssetError::Status {
                url: url.to_string(),
                status: response.status(),
            });
        }

        tokio::fs::create_dir_all(&self.uploads_dir)
            .await
            .map_err(io_err(&self.uploads_dir))?;
        let mut temp = tempfile::Builder::new()
            .prefix(".download-")
            .tempfile_in(&self.uploads_dir)
            .map_err(io_err(&self.uploads_dir))?;

        let mut head: Vec<u8> = Vec::new();
        let mut written = 0usize;
        while let Some(chunk) = response.chunk().await.map_err(request_err)? {
            if head.len() < 64 {
                head.extend_from_slice(&chunk[..chunk.len().min(64 - head.len())]);
            }
            temp.write_all(&chunk).map_err(io_err(temp.path()))?;
            written += chunk.len();
        }
        if written == 0 {
            return Err(AssetError::Empty {
                url: url.to_string(),
            });
        }

        let format = hint
            .or_else(|| infer::get(&head).and_then(|kind| normalize_format(kind.extension())))
            .unwrap_or("webp");
        let filename = format!("{}.{}", id, format);
        let target = self.uploads_dir.join(&filename);
        temp.persist(&target)
            .map_err(|e| AssetError::Io {
                path: target.clone(),
                source: e.error,
            })?;

        debug!("Stored {} ({} bytes) from {}", filename, written, url);
        Ok(filename)
    }

    /// Rewrite the variants of one image. Returns the number of URLs changed.
    ///
    /// Failed downloads keep their source URL.
    pub async fn localize<I: ImageVariants + ?Sized>(&self, image: &mut I) -> usize {
        let variants: &[ImageVariant] = if self.download_all_formats {
            &ImageVariant::ALL
        } else {
            &ImageVariant::PRIMARY
        };

        let mut changed = 0;
        for variant in variants {
            let Some(source) = image.variant(*variant).map(str::to_string) else {
                continue;
            };
            if source.is_empty() {
                continue;
            }
            match self.fetch(&source).await {
                Ok(local) => {
                    if local != source {
                        changed += 1;
                    }
                    image.set_variant(*variant, local);
                }
                Err(e) => warn!("Keeping source image URL {}: {}", source, e),
            }
        }

        if !self.download_all_formats {
            changed += self.backfill(image);
        }
        changed
    }

    /// Point the non-primary variants at the stored primary image.
    fn backfill<I: ImageVariants + ?Sized>(&self, image: &mut I) -> usize {
        let local = |v: ImageVariant, image: &I| {
            image
                .variant(v)
                .filter(|u| is_on_origin(u, &self.origin))
                .map(str::to_string)
        };
        let Some(source) = local(ImageVariant::DesktopWebp, image)
            .or_else(|| local(ImageVariant::Fallback, image))
        else {
            return 0;
        };

        let mut changed = 0;
        for variant in ImageVariant::BACKFILLED {
            if image.variant(variant) != Some(source.as_str()) {
                image.set_variant(variant, source.clone());
                changed += 1;
            }
        }
        changed
    }

    /// Rewrite every image of a card, including slider item images.
    pub async fn localize_article(&self, article: &mut Article) -> usize {
        let mut changed = 0;
        for image in article.images_mut() {
            changed += self.localize(image).await;
        }
        changed
    }

    /// Rewrite image blocks in place.
    pub async fn localize_blocks(&self, blocks: &mut [ContentBlock]) -> usize {
        let mut changed = 0;
        for block in blocks.iter_mut() {
            if let BlockKind::Image(image) = &mut block.kind {
                changed += self.localize(&mut image.image_sources).await;
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ImageData;
    use tempfile::tempdir;

    const ORIGIN: &str = "https://www.sermitsiaq.com";

    fn fetcher(dir: &Path, all: bool) -> AssetFetcher {
        let config = AssetConfig {
            download_all_formats: all,
            timeout_secs: 2,
        };
        AssetFetcher::new(&config, dir, ORIGIN).unwrap()
    }

    #[test]
    fn test_identifier_precedence() {
        assert_eq!(
            image_identifier("https://image.src/x.webp?imageId=2329660"),
            "2329660"
        );
        assert_eq!(image_identifier("https://image.src/123.jpg"), "123");
        assert_eq!(image_identifier("https://image.src/4567"), "4567");
        let hashed = image_identifier("https://image.src/photo.jpg");
        assert_eq!(hashed.len(), 32);
        assert_eq!(hashed, image_identifier("https://image.src/photo.jpg"));
    }

    #[test]
    fn test_format_hint() {
        assert_eq!(format_hint("https://i/1.webp?imageId=1&format=jpg"), Some("jpg"));
        assert_eq!(format_hint("https://i/1.jpeg"), Some("jpg"));
        assert_eq!(format_hint("https://i/1.png?width=10"), Some("png"));
        assert_eq!(format_hint("https://i/1?imageId=1"), None);
    }

    #[tokio::test]
    async fn test_partial_coverage_backfills_from_desktop_webp() {
        let dir = tempdir().unwrap();
        // Files already present means no network access is needed.
        std::fs::write(dir.path().join("2329660.webp"), b"RIFF").unwrap();
        std::fs::write(dir.path().join("2329660.jpg"), b"\xff\xd8").unwrap();

        let mut image = ImageData {
            desktop_webp: Some("https://image.src/2329660.webp?imageId=2329660".into()),
            fallback: Some("https://image.src/2329660.webp?imageId=2329660&format=jpg".into()),
            ..Default::default()
        };
        let fetcher = fetcher(dir.path(), false);
        fetcher.localize(&mut image).await;

        let webp = "https://www.sermitsiaq.com/static/uploads/images/2329660.webp";
        assert_eq!(image.desktop_webp.as_deref(), Some(webp));
        assert_eq!(
            image.fallback.as_deref(),
            Some("https://www.sermitsiaq.com/static/uploads/images/2329660.jpg")
        );
        assert_eq!(image.desktop_jpeg.as_deref(), Some(webp));
        assert_eq!(image.mobile_webp.as_deref(), Some(webp));
        assert_eq!(image.mobile_jpeg.as_deref(), Some(webp));

        // A second pass is a fixed point.
        let before = image.clone();
        assert_eq!(fetcher.localize(&mut image).await, 0);
        assert_eq!(image, before);
    }

    #[tokio::test]
    async fn test_failed_download_keeps_source() {
        let dir = tempdir().unwrap();
        let source = "http://127.0.0.1:9/55.webp";
        let mut image = ImageData {
            fallback: Some(source.into()),
            ..Default::default()
        };
        fetcher(dir.path(), false).localize(&mut image).await;
        assert_eq!(image.fallback.as_deref(), Some(source));
        assert_eq!(image.mobile_webp, None);
    }
}
