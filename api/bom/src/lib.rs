use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use image::DynamicImage;
use log::*;
use reqwest::Client;

/// Default host for radar imagery and transparencies
pub const DEFAULT_BASE_URL: &str = "http://www.bom.gov.au";

// The image host rejects requests without a browser-like agent.
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) radar-loop/0.1";

/// Static overlays published for every radar station
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transparency {
    Legend,
    Background,
    Topography,
    Range,
    Locations,
}

impl Transparency {
    /// All transparencies, in the order they are requested
    pub const ALL: [Transparency; 5] = [
        Transparency::Legend,
        Transparency::Background,
        Transparency::Topography,
        Transparency::Range,
        Transparency::Locations,
    ];

    /// Get the human-readable name for this transparency
    pub fn name(&self) -> &'static str {
        match self {
            Transparency::Legend => "legend",
            Transparency::Background => "background",
            Transparency::Topography => "topography",
            Transparency::Range => "range",
            Transparency::Locations => "locations",
        }
    }

    /// The legend is shared by all stations, everything else is per station
    pub fn is_shared(&self) -> bool {
        matches!(self, Transparency::Legend)
    }

    /// Parse a transparency from its name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }
}

/// Format a radar time the way loop image names expect it (e.g. "202108100455")
pub fn radar_time_string(time: &DateTime<Utc>) -> String {
    time.format("%Y%m%d%H%M").to_string()
}

/// URL scheme of the radar image host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadarUrls {
    base_url: String,
}

impl RadarUrls {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build the URL of a static transparency for a station
    pub fn transparency(&self, station: &str, transparency: Transparency) -> String {
        if transparency.is_shared() {
            format!("{}/products/radar_transparencies/IDR.legend.0.png", self.base_url)
        } else {
            format!(
                "{}/products/radar_transparencies/{}.{}.png",
                self.base_url,
                station,
                transparency.name()
            )
        }
    }

    /// Build the URL of one loop image; `radar_time` is the compact 12 digit form
    pub fn loop_frame(&self, station: &str, radar_time: &str) -> String {
        format!("{}/radar/{}.T.{}.png", self.base_url, station, radar_time)
    }
}

impl Default for RadarUrls {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

/// Bureau of Meteorology radar image client
pub struct BomRadarAPI {
    client: Client,
    urls: RadarUrls,
}

impl BomRadarAPI {
    /// Create a new client against the public image host
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Create a new client against a mirror of the image host
    pub fn with_base_url(base_url: &str) -> Result<Self> {
        // No request timeout: a stalled request stalls its caller.
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            client,
            urls: RadarUrls::new(base_url),
        })
    }

    pub fn urls(&self) -> &RadarUrls {
        &self.urls
    }

    /// Fetch raw image bytes, failing on any non-success status
    pub async fn fetch_image_bytes(&self, url: &str) -> Result<Vec<u8>> {
        info!("Fetching image from: {}", url);

        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!("HTTP {}: {}", response.status(), url));
        }

        let bytes = response.bytes().await?;
        debug!("Fetched {} bytes from {}", bytes.len(), url);

        Ok(bytes.to_vec())
    }

    /// Fetch and decode an image
    pub async fn fetch_image(&self, url: &str) -> Result<DynamicImage> {
        let bytes = self.fetch_image_bytes(url).await?;
        Ok(image::load_from_memory(&bytes)?)
    }

    /// Fetch one of a station's transparencies
    pub async fn fetch_transparency(&self, station: &str, transparency: Transparency) -> Result<DynamicImage> {
        let url = self.urls.transparency(station, transparency);
        self.fetch_image(&url).await
    }

    /// Fetch the loop image for a station at the given radar time
    pub async fn fetch_loop_frame(&self, station: &str, time: &DateTime<Utc>) -> Result<DynamicImage> {
        let url = self.urls.loop_frame(station, &radar_time_string(time));
        self.fetch_image(&url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use image::{GenericImageView, Rgba, RgbaImage};
    use std::io::Cursor;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn png_bytes() -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 3, Rgba([10, 20, 30, 255])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageOutputFormat::Png)
            .unwrap();
        buf
    }

    /// Serve `body` with 200 on `path`, 404 on anything else
    async fn serve_once(path: &'static str, body: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut request = vec![0u8; 2048];
                let n = socket.read(&mut request).await.unwrap_or(0);
                let request = String::from_utf8_lossy(&request[..n]);
                let requested = request.split_whitespace().nth(1).unwrap_or("");
                let (status, payload) = if requested == path {
                    ("200 OK", body.clone())
                } else {
                    ("404 Not Found", Vec::new())
                };
                let head = format!(
                    "HTTP/1.1 {}\r\nContent-Type: image/png\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    status,
                    payload.len()
                );
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(&payload).await;
                let _ = socket.shutdown().await;
            }
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_radar_time_string() {
        let time = Utc.with_ymd_and_hms(2021, 8, 10, 4, 55, 0).unwrap();
        assert_eq!(radar_time_string(&time), "202108100455");

        let time = Utc.with_ymd_and_hms(2024, 1, 2, 3, 5, 0).unwrap();
        assert_eq!(radar_time_string(&time), "202401020305");
    }

    #[test]
    fn test_transparency_urls() {
        let urls = RadarUrls::default();
        assert_eq!(
            urls.transparency("IDR703", Transparency::Legend),
            "http://www.bom.gov.au/products/radar_transparencies/IDR.legend.0.png"
        );
        assert_eq!(
            urls.transparency("IDR703", Transparency::Background),
            "http://www.bom.gov.au/products/radar_transparencies/IDR703.background.png"
        );
        assert_eq!(
            urls.transparency("IDR023", Transparency::Locations),
            "http://www.bom.gov.au/products/radar_transparencies/IDR023.locations.png"
        );
    }

    #[test]
    fn test_loop_frame_url() {
        let urls = RadarUrls::new("http://mirror.local/");
        assert_eq!(
            urls.loop_frame("IDR703", "202108100455"),
            "http://mirror.local/radar/IDR703.T.202108100455.png"
        );
    }

    #[test]
    fn test_transparency_names() {
        for t in Transparency::ALL {
            assert_eq!(Transparency::from_name(t.name()), Some(t));
        }
        assert_eq!(Transparency::from_name("satellite"), None);
        assert!(Transparency::Legend.is_shared());
        assert!(!Transparency::Range.is_shared());
    }

    #[tokio::test]
    async fn test_fetch_image_decodes() {
        let base = serve_once("/radar/IDR703.T.202108100455.png", png_bytes()).await;
        let api = BomRadarAPI::with_base_url(&base).unwrap();
        let time = Utc.with_ymd_and_hms(2021, 8, 10, 4, 55, 0).unwrap();

        let image = api.fetch_loop_frame("IDR703", &time).await.unwrap();
        assert_eq!(image.dimensions(), (4, 3));
    }

    #[tokio::test]
    async fn test_fetch_missing_image_fails() {
        let base = serve_once("/radar/other.png", png_bytes()).await;
        let api = BomRadarAPI::with_base_url(&base).unwrap();

        let result = api.fetch_transparency("IDR703", Transparency::Topography).await;
        let message = result.unwrap_err().to_string();
        assert!(message.contains("404"), "unexpected error: {}", message);
    }

    #[tokio::test]
    async fn test_fetch_garbage_fails_to_decode() {
        let base = serve_once("/products/radar_transparencies/IDR.legend.0.png", b"not a png".to_vec()).await;
        let api = BomRadarAPI::with_base_url(&base).unwrap();

        assert!(api.fetch_transparency("IDR703", Transparency::Legend).await.is_err());
    }
}
