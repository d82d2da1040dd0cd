//! Reference image download and decoding.

use std::path::PathBuf;
use std::time::Duration;

use image::RgbImage;
use reqwest::Client;
use tracing::{debug, info};
use url::Url;

use crate::error::{MediaError, MediaResult};

/// Default time bound for a single image fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches and decodes reference images. One attempt per call, no retries.
#[derive(Debug, Clone)]
pub struct ImageFetcher {
    client: Client,
}

impl ImageFetcher {
    /// Create a fetcher whose requests are bounded by `timeout`.
    pub fn new(timeout: Duration) -> MediaResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Download `url` and decode it into an RGB image.
    pub async fn fetch(&self, url: &Url) -> MediaResult<RgbImage> {
        debug!("Fetching image from {}", url);

        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(MediaError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await?;
        let image = image::load_from_memory(&bytes)?.to_rgb8();
        info!(
            width = image.width(),
            height = image.height(),
            "Image downloaded ({} bytes)",
            bytes.len()
        );
        Ok(image)
    }
}

/// Write the decoded image to `path`. The format follows the extension.
pub async fn save_snapshot(image: RgbImage, path: PathBuf) -> MediaResult<()> {
    tokio::task::spawn_blocking(move || image.save(&path))
        .await
        .map_err(|e| MediaError::Io(std::io::Error::other(e)))??;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb};
    use std::io::Cursor;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn png_bytes() -> Vec<u8> {
        let img = RgbImage::from_pixel(4, 3, Rgb([200, 10, 10]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[tokio::test]
    async fn test_fetch_decodes_image() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/img.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(png_bytes()))
            .mount(&server)
            .await;

        let fetcher = ImageFetcher::new(DEFAULT_FETCH_TIMEOUT).unwrap();
        let url = Url::parse(&format!("{}/img.png", server.uri())).unwrap();
        let image = fetcher.fetch(&url).await.unwrap();
        assert_eq!(image.dimensions(), (4, 3));
        assert_eq!(image.get_pixel(0, 0), &Rgb([200, 10, 10]));
    }

    #[tokio::test]
    async fn test_fetch_reports_http_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = ImageFetcher::new(DEFAULT_FETCH_TIMEOUT).unwrap();
        let url = Url::parse(&format!("{}/missing.png", server.uri())).unwrap();
        let err = fetcher.fetch(&url).await.unwrap_err();
        assert!(matches!(err, MediaError::HttpStatus { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_fetch_rejects_non_image() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>nope</html>"))
            .mount(&server)
            .await;

        let fetcher = ImageFetcher::new(DEFAULT_FETCH_TIMEOUT).unwrap();
        let url = Url::parse(&format!("{}/page", server.uri())).unwrap();
        assert!(matches!(
            fetcher.fetch(&url).await.unwrap_err(),
            MediaError::Decode(_)
        ));
    }

    #[tokio::test]
    async fn test_fetch_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(png_bytes())
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let fetcher = ImageFetcher::new(Duration::from_millis(50)).unwrap();
        let url = Url::parse(&format!("{}/slow.png", server.uri())).unwrap();
        assert!(matches!(
            fetcher.fetch(&url).await.unwrap_err(),
            MediaError::Request(_)
        ));
    }

    #[tokio::test]
    async fn test_save_snapshot_writes_jpeg() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("input.jpg");
        save_snapshot(RgbImage::from_pixel(8, 8, Rgb([1, 2, 3])), path.clone())
            .await
            .unwrap();
        let reloaded = image::open(&path).unwrap();
        assert_eq!(reloaded.width(), 8);
    }
}
