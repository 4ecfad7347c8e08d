//! Box archive downloads.
//!
//! Sources are classified by their scheme:
//!
//! | Source                     | Handling                                  |
//! |----------------------------|-------------------------------------------|
//! | `http://`, `https://`      | streamed with `reqwest`                   |
//! | `file://`                  | copied from the local path                |
//! | no scheme                  | treated as a local path                   |
//! | anything else              | [`BoxError::UnsupportedUrl`]              |
//!
//! Every byte written is also fed to a SHA-256 hasher, so the checksum recorded in
//! the catalog describes exactly what landed on disk.

use crate::constants::DOWNLOAD_CONNECT_TIMEOUT;
use crate::core::BoxError;
use crate::ui::Ui;
use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// TLS and timeout settings for one download.
#[derive(Debug, Clone, Default)]
pub struct DownloadOptions {
    /// Extra CA certificate (PEM) to trust.
    pub ca_cert: Option<PathBuf>,
    /// Client certificate and key (PEM) to present.
    pub client_cert: Option<PathBuf>,
    /// Accept invalid server certificates.
    pub insecure: bool,
    /// Overall request timeout. `None` means no limit.
    pub timeout: Option<Duration>,
}

/// Size and checksum of a completed download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Downloaded {
    /// Bytes written.
    pub size: u64,
    /// Hex-encoded SHA-256 of the bytes written.
    pub sha256: String,
}

enum Source {
    Http(String),
    Local(PathBuf),
}

fn classify(url: &str) -> Result<Source, BoxError> {
    match url.split_once("://") {
        Some((scheme, _)) if scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https") => {
            Ok(Source::Http(url.to_string()))
        }
        Some((scheme, _)) if scheme.eq_ignore_ascii_case("file") => {
            let parsed = reqwest::Url::parse(url).map_err(|e| BoxError::DownloadFailed {
                url: url.to_string(),
                reason: format!("invalid file URL: {e}"),
            })?;
            let path = parsed.to_file_path().map_err(|()| BoxError::DownloadFailed {
                url: url.to_string(),
                reason: "file URL does not name a local path".to_string(),
            })?;
            Ok(Source::Local(path))
        }
        Some(_) => Err(BoxError::UnsupportedUrl {
            url: url.to_string(),
        }),
        None => Ok(Source::Local(PathBuf::from(shellexpand::tilde(url).as_ref()))),
    }
}

/// Fetches a box archive from a URL or local path into a file.
#[derive(Debug, Clone, Default)]
pub struct Downloader {
    options: DownloadOptions,
}

impl Downloader {
    /// Create a downloader with the given options.
    pub fn new(options: DownloadOptions) -> Self {
        Self {
            options,
        }
    }

    /// Download `url` into `dest`, reporting progress through `ui`.
    ///
    /// `dest` is created or truncated.
    ///
    /// # Errors
    ///
    /// - [`BoxError::UnsupportedUrl`] for schemes other than http, https and file
    /// - [`BoxError::DownloadFailed`] for missing sources, non-success HTTP
    ///   statuses, unreadable certificates and transport errors
    /// - IO errors writing `dest`
    pub async fn fetch(&self, url: &str, dest: &Path, ui: &dyn Ui, label: &str) -> Result<Downloaded> {
        let downloaded = match classify(url)? {
            Source::Http(url) => self.fetch_http(&url, dest, ui, label).await?,
            Source::Local(path) => copy_local(url, &path, dest, ui, label).await?,
        };
        tracing::debug!(
            target: "boxcache::fetch",
            "Fetched {} ({} bytes, sha256 {})",
            url,
            downloaded.size,
            downloaded.sha256
        );
        Ok(downloaded)
    }

    async fn client(&self, url: &str) -> Result<reqwest::Client> {
        let failed = |reason: String| BoxError::DownloadFailed {
            url: url.to_string(),
            reason,
        };

        // Identity::from_pem produces a rustls identity.
        let mut builder = reqwest::Client::builder()
            .use_rustls_tls()
            .connect_timeout(DOWNLOAD_CONNECT_TIMEOUT)
            .danger_accept_invalid_certs(self.options.insecure);
        if let Some(timeout) = self.options.timeout {
            builder = builder.timeout(timeout);
        }

        if let Some(ca_cert) = &self.options.ca_cert {
            let pem = fs::read(ca_cert).await.map_err(|e| {
                failed(format!("cannot read CA certificate {}: {e}", ca_cert.display()))
            })?;
            let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                failed(format!("invalid CA certificate {}: {e}", ca_cert.display()))
            })?;
            builder = builder.add_root_certificate(cert);
        }

        if let Some(client_cert) = &self.options.client_cert {
            let pem = fs::read(client_cert).await.map_err(|e| {
                failed(format!("cannot read client certificate {}: {e}", client_cert.display()))
            })?;
            let identity = reqwest::Identity::from_pem(&pem).map_err(|e| {
                failed(format!("invalid client certificate {}: {e}", client_cert.display()))
            })?;
            builder = builder.identity(identity);
        }

        builder.build().context("Failed to build HTTP client")
    }

    async fn fetch_http(&self, url: &str, dest: &Path, ui: &dyn Ui, label: &str) -> Result<Downloaded> {
        let failed = |reason: String| BoxError::DownloadFailed {
            url: url.to_string(),
            reason,
        };

        let client = self.client(url).await?;
        let mut response = client.get(url).send().await.map_err(|e| failed(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(failed(format!("HTTP {status}")).into());
        }

        let bar = ui.download_progress(label, response.content_length());
        let mut sink = HashingWriter::create(dest).await?;
        while let Some(chunk) = response.chunk().await.map_err(|e| failed(e.to_string()))? {
            sink.write(&chunk).await?;
            bar.inc(chunk.len() as u64);
        }
        bar.finish_and_clear();
        sink.finish().await
    }
}

async fn copy_local(url: &str, source: &Path, dest: &Path, ui: &dyn Ui, label: &str) -> Result<Downloaded> {
    let mut file = File::open(source).await.map_err(|e| BoxError::DownloadFailed {
        url: url.to_string(),
        reason: format!("cannot open {}: {e}", source.display()),
    })?;
    let total = file.metadata().await.ok().map(|m| m.len());

    let bar = ui.download_progress(label, total);
    let mut sink = HashingWriter::create(dest).await?;
    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
    loop {
        let read = file
            .read(&mut buffer)
            .await
            .with_context(|| format!("Failed to read {}", source.display()))?;
        if read == 0 {
            break;
        }
        sink.write(&buffer[..read]).await?;
        bar.inc(read as u64);
    }
    bar.finish_and_clear();
    sink.finish().await
}

struct HashingWriter {
    file: File,
    path: PathBuf,
    hasher: Sha256,
    size: u64,
}

impl HashingWriter {
    async fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .await
            .with_context(|| format!("Failed to create {}", path.display()))?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
            hasher: Sha256::new(),
            size: 0,
        })
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.hasher.update(bytes);
        self.file
            .write_all(bytes)
            .await
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        self.size += bytes.len() as u64;
        Ok(())
    }

    async fn finish(mut self) -> Result<Downloaded> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        Ok(Downloaded {
            size: self.size,
            sha256: hex::encode(self.hasher.finalize()),
        })
    }
}
