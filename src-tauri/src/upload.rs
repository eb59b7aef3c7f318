//! Upload collaborator client
//!
//! Files are stored by an external upload service that hands back a URL.
//! Images are referenced by that URL; HTML snapshots are fetched from it as
//! text and stored on the POM. Files picked locally are checked against the
//! same kind and size limits; a local screenshot is kept as a data URL.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Serialize;
use std::time::Duration;

use crate::config::AppConfig;
use crate::domain::{DomainError, DomainResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum UploadKind {
    /// Screenshot
    Image,
    /// HTML (or plain text) snapshot
    Html,
}

impl UploadKind {
    /// Classify an upload by its file name
    pub fn classify(file_name: &str) -> DomainResult<Self> {
        let mime = mime_guess::from_path(file_name)
            .first()
            .ok_or_else(|| DomainError::InvalidInput(format!("Unknown file type: {}", file_name)))?;

        match (mime.type_().as_str(), mime.subtype().as_str()) {
            ("image", _) => Ok(Self::Image),
            ("text", "html") | ("text", "plain") => Ok(Self::Html),
            _ => Err(DomainError::InvalidInput(format!(
                "Unsupported upload type {} for {}",
                mime, file_name
            ))),
        }
    }

    pub fn max_bytes(&self, config: &AppConfig) -> usize {
        match self {
            Self::Image => config.max_image_bytes,
            Self::Html => config.max_html_bytes,
        }
    }

    /// Classify and enforce the configured size limit
    pub fn check(file_name: &str, size: usize, config: &AppConfig) -> DomainResult<Self> {
        let kind = Self::classify(file_name)?;
        let limit = kind.max_bytes(config);
        if size > limit {
            return Err(DomainError::InvalidInput(format!(
                "{} is {} bytes, limit is {} bytes",
                file_name, size, limit
            )));
        }
        Ok(kind)
    }
}

/// Whether `url` plausibly points at an image: a `data:image/` URL, or a
/// path whose extension is an image type
pub fn is_image_url(url: &str) -> bool {
    let url = url.trim();
    if url.is_empty() {
        return false;
    }
    if url.get(..11).is_some_and(|p| p.eq_ignore_ascii_case("data:image/")) {
        return true;
    }
    let path = url.split(['?', '#']).next().unwrap_or(url);
    mime_guess::from_path(path)
        .first()
        .is_some_and(|mime| mime.type_() == mime_guess::mime::IMAGE)
}

/// Screenshot URLs must point at an image; inline `data:` images count
/// against the image size limit
pub fn check_screenshot_url(url: &str, config: &AppConfig) -> DomainResult<()> {
    if !is_image_url(url) {
        return Err(DomainError::InvalidInput(format!("Not an image URL: {}", url)));
    }
    if let Some(size) = data_url_size(url)? {
        if size > config.max_image_bytes {
            return Err(DomainError::InvalidInput(format!(
                "Screenshot is {} bytes, limit is {} bytes",
                size, config.max_image_bytes
            )));
        }
    }
    Ok(())
}

/// Decoded payload size of a base64 `data:` URL, `None` for other URLs
fn data_url_size(url: &str) -> DomainResult<Option<usize>> {
    let url = url.trim();
    if !url.get(..5).is_some_and(|p| p.eq_ignore_ascii_case("data:")) {
        return Ok(None);
    }
    let Some((header, payload)) = url.split_once(',') else {
        return Err(DomainError::InvalidInput("Malformed data URL".to_string()));
    };
    if !header.to_ascii_lowercase().ends_with(";base64") {
        return Ok(Some(payload.len()));
    }
    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| DomainError::InvalidInput(format!("Failed to decode base64: {}", e)))?;
    Ok(Some(bytes.len()))
}

/// Inline a local image file as a `data:` URL
pub fn image_data_url(file_name: &str, bytes: &[u8]) -> String {
    let mime = mime_guess::from_path(file_name).first_or_octet_stream();
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// Fetches uploaded HTML snapshots
#[derive(Debug, Clone)]
pub struct SnapshotFetcher {
    client: reqwest::Client,
    max_bytes: usize,
}

impl SnapshotFetcher {
    pub fn new(max_bytes: usize) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self::with_client(client, max_bytes)
    }

    pub fn with_client(client: reqwest::Client, max_bytes: usize) -> Self {
        Self { client, max_bytes }
    }

    /// Download `url` as text, refusing bodies over the size limit
    pub async fn fetch(&self, url: &str) -> DomainResult<String> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?;

        if let Some(length) = response.content_length() {
            if length > self.max_bytes as u64 {
                return Err(self.too_large(url));
            }
        }

        let mut body: Vec<u8> = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > self.max_bytes {
                return Err(self.too_large(url));
            }
            body.extend_from_slice(&chunk);
        }

        log::info!("Fetched snapshot from {} ({} bytes)", url, body.len());
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    fn too_large(&self, url: &str) -> DomainError {
        DomainError::InvalidInput(format!(
            "Snapshot at {} exceeds {} bytes",
            url, self.max_bytes
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one HTTP response on a local port
    async fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
        });
        format!("http://{}/snapshot.html", addr)
    }

    fn fetcher(max_bytes: usize) -> SnapshotFetcher {
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        SnapshotFetcher::with_client(client, max_bytes)
    }

    #[test]
    fn test_classify() {
        assert_eq!(UploadKind::classify("shot.PNG").unwrap(), UploadKind::Image);
        assert_eq!(UploadKind::classify("page.html").unwrap(), UploadKind::Html);
        assert_eq!(UploadKind::classify("page.txt").unwrap(), UploadKind::Html);
        assert!(UploadKind::classify("archive.zip").is_err());
        assert!(UploadKind::classify("noextension").is_err());
    }

    #[test]
    fn test_size_limits() {
        let config = AppConfig::default();
        assert!(UploadKind::check("page.html", 1024, &config).is_ok());
        assert!(UploadKind::check("page.html", 2 * 1024 * 1024, &config).is_err());
        assert!(UploadKind::check("shot.jpg", 2 * 1024 * 1024, &config).is_ok());
    }

    #[test]
    fn test_is_image_url() {
        assert!(is_image_url("https://cdn.example.com/shots/login.png?v=2"));
        assert!(is_image_url("data:image/png;base64,AAAA"));
        assert!(!is_image_url("https://cdn.example.com/page.html"));
        assert!(!is_image_url(""));
    }

    #[test]
    fn test_screenshot_url_size_limit() {
        let config = AppConfig { max_image_bytes: 8, ..AppConfig::default() };
        assert!(check_screenshot_url("https://cdn.example.com/a.png", &config).is_ok());
        assert!(check_screenshot_url("https://cdn.example.com/a.html", &config).is_err());

        let small = image_data_url("dot.png", &[1, 2, 3]);
        assert!(small.starts_with("data:image/png;base64,"));
        assert!(check_screenshot_url(&small, &config).is_ok());

        let large = image_data_url("big.png", &[0u8; 9]);
        let err = check_screenshot_url(&large, &config).unwrap_err();
        assert!(err.to_string().contains("9 bytes"));

        assert!(check_screenshot_url("data:image/png;base64,@@@", &config).is_err());
    }

    #[tokio::test]
    async fn test_fetch_snapshot() {
        let url = serve_once("200 OK", "<html><body><p id=\"a\">hi</p></body></html>").await;
        let html = fetcher(1024).fetch(&url).await.unwrap();
        assert!(html.contains("<p id=\"a\">hi</p>"));
    }

    #[tokio::test]
    async fn test_fetch_rejects_oversized_body() {
        let url = serve_once("200 OK", "<html><body>0123456789</body></html>").await;
        let err = fetcher(8).fetch(&url).await.unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn test_fetch_error_status() {
        let url = serve_once("404 Not Found", "missing").await;
        let err = fetcher(1024).fetch(&url).await.unwrap_err();
        assert_eq!(err.status_code(), 500);
    }
}
